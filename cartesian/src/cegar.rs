//! §4.13 CEGAR driver: builds one Cartesian abstraction for a subtask under
//! a state/transition/time/memory budget, grounded on
//! `original_source/src/search/cegar/cegar.cc`.

use sas_env_param::EnvParam;
use sas_task::dtg::Dtg;
use sas_task::ids::{OpId, Value, VarId};
use sas_task::model::{Fact, Task};
use std::time::{Duration, Instant};

use crate::abstract_search::AbstractSearch;
use crate::abstraction::Abstraction;
use crate::cost::Cost;
use crate::flaw::find_flaw;
use crate::split_selector::{PickSplit, SplitSelector};

/// Default size (MiB) of the memory-reserve canary buffer, matching the
/// original's `memory_padding_in_mb = 75`.
pub static CEGAR_MEMORY_PADDING_MB: EnvParam<u64> = EnvParam::new("SAS_CEGAR_MEMORY_PADDING_MB", "75");

/// A one-shot allocation released explicitly (never from an allocator
/// callback — spec.md §9's redesign flag) when the driver decides memory is
/// getting tight. `can_continue` composes this with the wall-clock budget so
/// every loop iteration has one place to ask "should I keep going?".
pub struct MemoryReserve {
    canary: Option<Vec<u8>>,
}

impl MemoryReserve {
    pub fn new(mb: u64) -> Self {
        MemoryReserve { canary: Some(vec![0u8; (mb as usize) * 1024 * 1024]) }
    }

    pub fn is_released(&self) -> bool {
        self.canary.is_none()
    }

    pub fn release(&mut self) {
        self.canary = None;
    }
}

struct Timer {
    start: Instant,
    max: Duration,
}

impl Timer {
    fn new(max_seconds: f64) -> Self {
        Timer { start: Instant::now(), max: Duration::from_secs_f64(max_seconds.max(0.0)) }
    }

    fn is_expired(&self) -> bool {
        self.start.elapsed() >= self.max
    }
}

/// Mirrors the constructor parameters of the original's `CEGAR`/`CostSaturation`
/// one-to-one, so an external CLI (out of scope here) has an obvious place to
/// plug in parsed values.
#[derive(Debug, Clone)]
pub struct CegarConfig {
    pub max_states: usize,
    pub max_non_loop_transitions: usize,
    pub max_time_seconds: f64,
    pub memory_padding_mb: u64,
    pub pick_split: PickSplit,
    pub random_seed: u64,
}

impl Default for CegarConfig {
    fn default() -> Self {
        CegarConfig {
            max_states: 10_000,
            max_non_loop_transitions: 100_000,
            max_time_seconds: 60.0,
            memory_padding_mb: CEGAR_MEMORY_PADDING_MB.get(),
            pick_split: PickSplit::MaxRefined,
            random_seed: 2_026,
        }
    }
}

/// The product of one CEGAR run: the abstraction itself plus the cached
/// abstract-search heuristic values (the "refinement hierarchy plus
/// per-abstract-state goal distances" of spec.md §4.13's contract).
pub struct CegarResult<'a> {
    pub abstraction: Abstraction<'a>,
    pub search: AbstractSearch,
}

fn can_continue(abstraction: &Abstraction, config: &CegarConfig, timer: &Timer, reserve: &MemoryReserve) -> bool {
    abstraction.num_states() < config.max_states
        && abstraction.non_loop_transition_count() < config.max_non_loop_transitions
        && !timer.is_expired()
        && !reserve.is_released()
}

/// Values of variable `var` from which the goal value `goal_value` is
/// reachable, tracked purely through `dtg`'s value-graph (ignoring the
/// context other variables must satisfy — a deliberately conservative
/// over-approximation, see DESIGN.md).
fn values_reaching(dtg: &Dtg, domain_size: usize, goal_value: Value) -> Vec<Value> {
    let mut reachable = vec![false; domain_size];
    reachable[goal_value as usize] = true;
    let mut changed = true;
    while changed {
        changed = false;
        for (from, transitions) in dtg.by_source.iter().enumerate() {
            if reachable[from] {
                continue;
            }
            if transitions.iter().any(|t| reachable[t.to as usize]) {
                reachable[from] = true;
                changed = true;
            }
        }
    }
    (0..domain_size as Value).filter(|&v| !reachable[v as usize]).collect()
}

/// Separates facts unreachable before the goal from reachable ones, when the
/// subtask has exactly one goal fact (spec.md §4.13 Initialization;
/// `separate_facts_unreachable_before_goal` in the original).
fn separate_facts_unreachable_before_goal(abstraction: &mut Abstraction, dtgs: &[Dtg]) {
    let goal = abstraction.goal_facts().to_vec();
    if goal.len() != 1 {
        return;
    }
    let goal_fact = goal[0];
    let task = abstraction.task();
    for var_idx in 0..task.num_variables() {
        let var = VarId::from(var_idx);
        let domain_size = task.domain_size(var) as usize;
        let unreachable = if var == goal_fact.var {
            values_reaching(&dtgs[var_idx], domain_size, goal_fact.value)
        } else {
            Vec::new()
        };
        if unreachable.is_empty() {
            continue;
        }
        let mut wanted = fixedbitset::FixedBitSet::with_capacity(domain_size);
        for v in unreachable {
            wanted.insert(v as usize);
        }
        abstraction.refine(abstraction.init_state(), var, &wanted);
    }
}

/// Runs the full refinement loop for a subtask: `task`/`dtgs` describe the
/// (possibly cost-reduced) planning problem, `goal` its partial goal, and
/// `op_costs` the per-operator remaining cost used by abstract search.
pub fn run<'a>(task: &'a Task, dtgs: &'a [Dtg], goal: Vec<Fact>, op_costs: &sas_collections::ref_store::RefVec<OpId, Cost>, config: &CegarConfig) -> CegarResult<'a> {
    let mut abstraction = Abstraction::new(task, dtgs, goal.clone());
    let mut search = AbstractSearch::new();
    let mut split_selector = SplitSelector::new(task, config.pick_split, config.random_seed);
    let timer = Timer::new(config.max_time_seconds);
    let mut reserve = MemoryReserve::new(config.memory_padding_mb);

    if goal.len() == 1 {
        separate_facts_unreachable_before_goal(&mut abstraction, dtgs);
    }

    while can_continue(&abstraction, config, &timer, &reserve) {
        let Some(solution) = search.find_solution(&abstraction, op_costs) else {
            tracing::debug!("abstract problem proven unsolvable; stopping refinement");
            break;
        };
        let Some(flaw) = find_flaw(task, &abstraction, &solution.path) else {
            tracing::debug!("concrete plan found; abstraction is exact on this path");
            break;
        };
        let splits = flaw.possible_splits(&abstraction);
        let state = abstraction.state(flaw.current_abstract_state).clone();
        let split = split_selector.pick_split(&state, task, splits);
        let mut wanted = fixedbitset::FixedBitSet::with_capacity(task.domain_size(split.var) as usize);
        for v in &split.values {
            wanted.insert(*v as usize);
        }
        abstraction.refine(flaw.current_abstract_state, split.var, &wanted);

        if abstraction.num_states() % 1000 == 0 {
            tracing::info!(
                states = abstraction.num_states(),
                max_states = config.max_states,
                transitions = abstraction.non_loop_transition_count(),
                max_transitions = config.max_non_loop_transitions,
                "refinement progress"
            );
        }
        if !reserve.is_released() && allocation_looks_tight(&abstraction, config) {
            reserve.release();
        }
    }

    CegarResult { abstraction, search }
}

/// A conservative proxy for "about to run out of memory": once the state
/// count is within one split of the configured cap, free the canary so
/// `can_continue` reports false on the next loop check rather than
/// overshooting the budget.
fn allocation_looks_tight(abstraction: &Abstraction, config: &CegarConfig) -> bool {
    abstraction.num_states() + 1 >= config.max_states
}
