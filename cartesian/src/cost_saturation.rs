//! §4.14 Cost saturation: combine several CEGAR abstractions additively by
//! peeling saturated per-operator costs off a shared remaining-cost vector,
//! grounded on `original_source/src/search/cegar/cost_saturation.cc`.

use sas_collections::ref_store::RefVec;
use sas_task::dtg::Dtg;
use sas_task::ids::OpId;
use sas_task::model::{Fact, Task};

use crate::abstract_search::AbstractSearch;
use crate::abstraction::Abstraction;
use crate::cegar::{self, CegarConfig, MemoryReserve};
use crate::cost::{saturating_sub, Cost, INFINITE_COST, NEG_INFINITE_COST};
use crate::heuristic::ComponentHeuristic;

/// Describes one subtask to build an abstraction for — in the simplest case
/// (per spec.md §4.14's example) one subtask per goal fact.
pub struct SubtaskGoal {
    pub goal: Vec<Fact>,
}

/// `sat(o) = max over transitions (s, op=o, s') of (h(s) - h(s'))`, restricted
/// to transitions whose source and target both have finite `h`; `NEG_INFINITE_COST`
/// if no such transition exists (spec.md §4.14).
fn saturated_costs(task: &Task, abstraction: &Abstraction, search: &AbstractSearch) -> RefVec<OpId, Cost> {
    let mut sat: RefVec<OpId, Cost> = RefVec::with_values(task.operators.len(), NEG_INFINITE_COST);
    for (s, op, t) in abstraction.all_transitions() {
        let h_s = search.h_value(s);
        let h_t = search.h_value(t);
        if h_s == INFINITE_COST || h_t == INFINITE_COST {
            continue;
        }
        let delta = h_s - h_t;
        if delta > sat[op] {
            sat[op] = delta;
        }
    }
    // A self-loop is a valid transition too, contributing h(s) - h(s) = 0 —
    // an operator that never leaves a state is still "used" at zero cost,
    // distinct from an operator absent from the abstraction entirely.
    for (s, op) in abstraction.all_loop_transitions() {
        if search.h_value(s) == INFINITE_COST {
            continue;
        }
        if 0 > sat[op] {
            sat[op] = 0;
        }
    }
    sat
}

fn reduce_remaining_costs(remaining: &mut RefVec<OpId, Cost>, sat: &RefVec<OpId, Cost>) {
    for op in remaining.keys() {
        remaining[op] = saturating_sub(remaining[op], sat[op]);
    }
}

/// Runs CEGAR once per subtask, in order, deducting each abstraction's
/// saturated costs from the shared remaining-cost vector before the next
/// subtask is built. Returns the per-component heuristics to retain
/// (`init_h > 0` only) plus whether the search stopped early.
pub fn build_additive_heuristics<'a>(task: &'a Task, dtgs: &'a [Dtg], subtasks: Vec<SubtaskGoal>, config: &CegarConfig) -> Vec<ComponentHeuristic<'a>> {
    let mut remaining: RefVec<OpId, Cost> = RefVec::new();
    for (_, op) in task.operators.entries() {
        remaining.push(op.cost as Cost);
    }

    let mut components = Vec::new();
    let mut total_states = 0usize;
    let num_subtasks = subtasks.len();
    let mut reserve = MemoryReserve::new(config.memory_padding_mb);
    let overall_timer = std::time::Instant::now();
    let overall_budget = std::time::Duration::from_secs_f64(config.max_time_seconds.max(0.0));

    for (i, subtask) in subtasks.into_iter().enumerate() {
        let remaining_subtasks = num_subtasks - i;
        let time_left = overall_budget.saturating_sub(overall_timer.elapsed()).as_secs_f64();
        let per_subtask_config = CegarConfig {
            max_states: ((config.max_states.saturating_sub(total_states)) / remaining_subtasks).max(1),
            max_time_seconds: time_left / remaining_subtasks as f64,
            ..config.clone()
        };

        let result = cegar::run(task, dtgs, subtask.goal.clone(), &remaining, &per_subtask_config);
        total_states += result.abstraction.num_states();

        let sat = saturated_costs(task, &result.abstraction, &result.search);
        reduce_remaining_costs(&mut remaining, &sat);

        let init_h = result.search.h_value(result.abstraction.init_state());
        if init_h > 0 {
            components.push(ComponentHeuristic::new(result.abstraction, result.search));
        }

        if total_states >= config.max_states || overall_timer.elapsed() >= overall_budget || reserve.is_released() {
            break;
        }
        if components.iter().any(|c| c.value(&task.initial_state) == INFINITE_COST) {
            break;
        }
    }
    if !reserve.is_released() {
        reserve.release();
    }
    components
}
