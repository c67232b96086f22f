//! §4.12 Split selection: when a flaw admits more than one candidate split,
//! pick one of six ways. Grounded on
//! `original_source/src/search/cegar/split_selector.cc`'s exact rating
//! formulas and its strict `rating > max_rating` tie-breaking (first split
//! with the current-best rating wins).

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use sas_task::ids::{Value, VarId};
use sas_task::model::Task;

use crate::cartesian_state::CartesianState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickSplit {
    Random,
    MinUnwanted,
    MaxUnwanted,
    MinRefined,
    MaxRefined,
    MinHadd,
    MaxHadd,
}

/// A candidate split: carve `values` out of `var`'s current subset.
#[derive(Debug, Clone)]
pub struct Split {
    pub var: VarId,
    pub values: Vec<Value>,
}

/// Relaxed-plan (delete-relaxation) additive cost per fact, computed once
/// from the task's initial state — `h^add` in the sense of Bonet & Geffner,
/// used only to rate `MIN_HADD`/`MAX_HADD` splits.
struct AdditiveHeuristic {
    cost: Vec<Vec<i64>>,
}

const UNREACHABLE: i64 = i64::MAX;

impl AdditiveHeuristic {
    fn compute(task: &Task) -> Self {
        let mut cost: Vec<Vec<i64>> = (0..task.num_variables())
            .map(|v| vec![UNREACHABLE; task.domain_size(VarId::from(v)) as usize])
            .collect();
        for (var, &value) in task.initial_state.iter().enumerate() {
            cost[var][value as usize] = 0;
        }

        let fact_cost = |cost: &Vec<Vec<i64>>, var: VarId, value: Value| -> i64 { cost[usize::from(var)][value as usize] };

        loop {
            let mut changed = false;
            for (_, op) in task.operators.entries() {
                let mut base = 0i64;
                let mut reachable = true;
                for pre in &op.preconditions {
                    let c = fact_cost(&cost, pre.var, pre.value);
                    if c == UNREACHABLE {
                        reachable = false;
                        break;
                    }
                    base += c;
                }
                if !reachable {
                    continue;
                }
                for effect in &op.effects {
                    let mut total = base;
                    let mut effect_reachable = true;
                    if let Some(pre) = effect.precondition_value {
                        let c = fact_cost(&cost, effect.fact.var, pre);
                        if c == UNREACHABLE {
                            effect_reachable = false;
                        } else {
                            total += c;
                        }
                    }
                    for cond in &effect.conditions {
                        if !effect_reachable {
                            break;
                        }
                        let c = fact_cost(&cost, cond.var, cond.value);
                        if c == UNREACHABLE {
                            effect_reachable = false;
                        } else {
                            total += c;
                        }
                    }
                    if !effect_reachable {
                        continue;
                    }
                    total += op.cost as i64;
                    let slot = &mut cost[usize::from(effect.fact.var)][effect.fact.value as usize];
                    if total < *slot {
                        *slot = total;
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }

        AdditiveHeuristic { cost }
    }

    fn value(&self, var: VarId, value: Value) -> i64 {
        self.cost[usize::from(var)][value as usize]
    }
}

pub struct SplitSelector {
    pick: PickSplit,
    additive_heuristic: Option<AdditiveHeuristic>,
    rng: SmallRng,
}

impl SplitSelector {
    pub fn new(task: &Task, pick: PickSplit, seed: u64) -> Self {
        let additive_heuristic = matches!(pick, PickSplit::MinHadd | PickSplit::MaxHadd).then(|| AdditiveHeuristic::compute(task));
        SplitSelector { pick, additive_heuristic, rng: SmallRng::seed_from_u64(seed) }
    }

    fn num_unwanted_values(&self, state: &CartesianState, split: &Split) -> i64 {
        let unwanted = state.count(split.var) as i64 - split.values.len() as i64;
        debug_assert!(unwanted >= 1);
        unwanted
    }

    fn refinedness(&self, state: &CartesianState, task: &Task, var: VarId) -> f64 {
        let all_values = task.domain_size(var) as f64;
        let remaining = state.count(var) as f64;
        -(remaining / all_values)
    }

    fn min_hadd_value(&self, var: VarId, values: &[Value]) -> i64 {
        let h = self.additive_heuristic.as_ref().expect("hadd requested without additive heuristic");
        values.iter().map(|&v| h.value(var, v)).min().unwrap_or(UNREACHABLE)
    }

    fn max_hadd_value(&self, var: VarId, values: &[Value]) -> i64 {
        let h = self.additive_heuristic.as_ref().expect("hadd requested without additive heuristic");
        values.iter().map(|&v| h.value(var, v)).max().unwrap_or(-1)
    }

    fn rate_split(&self, state: &CartesianState, task: &Task, split: &Split) -> f64 {
        match self.pick {
            PickSplit::Random => 0.0,
            PickSplit::MinUnwanted => -(self.num_unwanted_values(state, split) as f64),
            PickSplit::MaxUnwanted => self.num_unwanted_values(state, split) as f64,
            PickSplit::MinRefined => -self.refinedness(state, task, split.var),
            PickSplit::MaxRefined => self.refinedness(state, task, split.var),
            PickSplit::MinHadd => -(self.min_hadd_value(split.var, &split.values) as f64),
            PickSplit::MaxHadd => self.max_hadd_value(split.var, &split.values) as f64,
        }
    }

    /// Picks one of `splits` (must be non-empty). `RANDOM` draws uniformly;
    /// every other policy keeps the first split with a strictly higher
    /// rating than all before it.
    pub fn pick_split(&mut self, state: &CartesianState, task: &Task, splits: Vec<Split>) -> Split {
        assert!(!splits.is_empty());
        if splits.len() == 1 {
            return splits.into_iter().next().unwrap();
        }
        if self.pick == PickSplit::Random {
            let idx = self.rng.gen_range(0..splits.len());
            return splits.into_iter().nth(idx).unwrap();
        }
        let mut best_rating = f64::MIN;
        let mut best_index = 0;
        for (i, split) in splits.iter().enumerate() {
            let rating = self.rate_split(state, task, split);
            if rating > best_rating {
                best_rating = rating;
                best_index = i;
            }
        }
        splits.into_iter().nth(best_index).unwrap()
    }
}
