//! §4.11 Flaw detection: trace an abstract solution concretely from the
//! task's initial state and find where reality departs from the abstraction,
//! grounded on `original_source/src/search/cegar/cegar.cc`'s `find_flaw` and
//! `Flaw::get_possible_splits`.

use crate::abstraction::Abstraction;
use crate::cartesian_state::CartesianState;
use crate::ids::AbstractStateId;
use crate::split_selector::Split;
use sas_task::ids::Value;
use sas_task::model::Task;
use sas_task::state;

/// A point where the concrete trace of an abstract solution diverges from
/// the abstraction, carrying enough information to propose splits that
/// would rule the divergence out.
pub struct Flaw {
    pub concrete_state: Vec<Value>,
    pub current_abstract_state: AbstractStateId,
    pub desired_abstract_state: CartesianState,
}

impl Flaw {
    /// For each fact of the concrete state not contained in the desired
    /// Cartesian set, propose splitting that fact's variable into the values
    /// shared by the current and desired sets ("wanted") versus the rest.
    pub fn possible_splits(&self, abstraction: &Abstraction) -> Vec<Split> {
        let current = abstraction.state(self.current_abstract_state);
        let task = abstraction.task();
        let mut splits = Vec::new();
        for (var_idx, &value) in self.concrete_state.iter().enumerate() {
            let var = sas_task::ids::VarId::from(var_idx);
            if self.desired_abstract_state.test(var, value) {
                continue;
            }
            let domain = task.domain_size(var);
            let wanted: Vec<Value> = (0..domain).filter(|&v| current.test(var, v) && self.desired_abstract_state.test(var, v)).collect();
            debug_assert!(!wanted.is_empty());
            splits.push(Split { var, values: wanted });
        }
        debug_assert!(!splits.is_empty());
        splits
    }
}

/// Walks `path` (an abstract solution from `abstraction`'s initial state to
/// a goal state) concretely, starting from `task`'s initial state. Returns
/// `None` if the concrete trace reaches an actual goal state (the abstract
/// solution is a real plan), otherwise the first flaw encountered.
pub fn find_flaw(task: &Task, abstraction: &Abstraction, path: &[(AbstractStateId, sas_task::ids::OpId, AbstractStateId)]) -> Option<Flaw> {
    let mut abstract_state = abstraction.init_state();
    let mut concrete_state: Vec<Value> = task.initial_state.clone();

    for &(_, op_id, target) in path {
        let operator = &task.operators[op_id];
        let applicable = operator.preconditions.iter().all(|f| concrete_state[usize::from(f.var)] == f.value);
        if applicable {
            let next_concrete = state::successor(task, op_id, &concrete_state);
            let next_abstract = abstraction.state(target);
            if !next_abstract.includes_state(&next_concrete) {
                return Some(Flaw {
                    concrete_state,
                    current_abstract_state: abstract_state,
                    desired_abstract_state: next_abstract.regress(task, operator),
                });
            }
            abstract_state = target;
            concrete_state = next_concrete;
        } else {
            return Some(Flaw {
                concrete_state,
                current_abstract_state: abstract_state,
                desired_abstract_state: CartesianState::from_facts(task, &operator.preconditions),
            });
        }
    }

    let reached_goal = task.goal.iter().all(|f| concrete_state[usize::from(f.var)] == f.value);
    if reached_goal {
        None
    } else {
        Some(Flaw {
            concrete_state,
            current_abstract_state: abstract_state,
            desired_abstract_state: CartesianState::from_facts(task, abstraction.goal_facts()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abstraction::Abstraction;
    use sas_collections::ref_store::RefStore;
    use sas_task::model::{Effect, Fact, Operator, Variable};

    fn var(domain: u32) -> Variable {
        Variable {
            name: "v".into(),
            domain_size: domain,
            axiom_layer: -1,
            default_value: 0,
            level: -1,
            necessary: true,
            value_names: vec![],
        }
    }

    fn chain_task() -> Task {
        let mut variables = RefStore::new();
        let v0 = variables.push(var(3));
        let mut operators = RefStore::new();
        operators.push(Operator {
            name: "o0".into(),
            preconditions: vec![],
            effects: vec![Effect { fact: Fact::new(v0, 1), precondition_value: Some(0), conditions: vec![] }],
            cost: 1,
        });
        operators.push(Operator {
            name: "o1".into(),
            preconditions: vec![],
            effects: vec![Effect { fact: Fact::new(v0, 2), precondition_value: Some(1), conditions: vec![] }],
            cost: 1,
        });
        Task::new(variables, operators, RefStore::new(), vec![], vec![0], vec![Fact::new(v0, 2)], false).unwrap()
    }

    #[test]
    fn trivial_abstraction_reports_goal_test_flaw_until_goal_value_is_split_off() {
        let task = chain_task();
        let dtgs = vec![sas_task::dtg::build_dtg(&task, sas_task::ids::VarId::from(0usize))];
        let abs = Abstraction::new(&task, &dtgs, task.goal.clone());
        let init = abs.init_state();
        // A one-step path o0: init -> init (trivial abstraction is a single state).
        let path = vec![(init, sas_task::ids::OpId::from(0usize), init)];
        let flaw = find_flaw(&task, &abs, &path).expect("goal not actually reached");
        assert_eq!(flaw.concrete_state, vec![1]);
        assert!(flaw.desired_abstract_state.test(sas_task::ids::VarId::from(0usize), 2));
    }

    #[test]
    fn flaw_yields_splits_that_separate_wanted_from_unwanted_values() {
        let task = chain_task();
        let dtgs = vec![sas_task::dtg::build_dtg(&task, sas_task::ids::VarId::from(0usize))];
        let abs = Abstraction::new(&task, &dtgs, task.goal.clone());
        let v0 = sas_task::ids::VarId::from(0usize);
        // The trivial abstraction still holds {0,1,2} for v0; a flaw whose
        // desired set pins v0=1 (e.g. an inapplicable-operator flaw) should
        // propose splitting off {1} as wanted from {0,2} as unwanted.
        let flaw = Flaw {
            concrete_state: vec![0],
            current_abstract_state: abs.init_state(),
            desired_abstract_state: CartesianState::from_facts(&task, &[Fact::new(v0, 1)]),
        };
        let splits = flaw.possible_splits(&abs);
        assert_eq!(splits.len(), 1);
        assert_eq!(splits[0].var, v0);
        assert_eq!(splits[0].values, vec![1]);
    }
}
