//! Bundles a Cartesian abstraction's three growing structures — the per-state
//! Cartesian sets, the refinement hierarchy, and the transition system — and
//! orchestrates `refine()` (split + rewire) across all three, grounded on
//! `original_source/src/search/cartesian_abstractions/abstraction.cc`.

use crate::cartesian_state::CartesianState;
use crate::ids::AbstractStateId;
use crate::refinement_hierarchy::RefinementHierarchy;
use crate::transition_system::TransitionSystem;
use fixedbitset::FixedBitSet;
use sas_collections::ref_store::RefVec;
use sas_task::dtg::{Dtg, Inducer};
use sas_task::ids::{OpId, Value, VarId};
use sas_task::model::{Fact, Task};

fn bitsets_intersect(a: &FixedBitSet, b: &FixedBitSet) -> bool {
    a.intersection(b).next().is_some()
}

/// The set of values `var` can take immediately after `op` fires from some
/// concrete state inside `source`. If `op` doesn't touch `var` via any DTG
/// transition, the value persists unchanged, so the post-image is `source`'s
/// own subset for `var`.
fn post_image_on_var(dtg: &Dtg, domain_size: usize, op: OpId, source: &CartesianState, var: VarId) -> FixedBitSet {
    let touches_var = dtg.by_source.iter().flatten().any(|t| t.inducer == Inducer::Operator(op));
    if !touches_var {
        return source.values(var).clone();
    }
    let mut result = FixedBitSet::with_capacity(domain_size);
    for from in source.values(var).ones() {
        for t in dtg.by_source[from].iter().filter(|t| t.inducer == Inducer::Operator(op)) {
            if t.context.iter().all(|&(cv, cval)| source.test(cv, cval)) {
                result.insert(t.to as usize);
            }
        }
    }
    result
}

/// A Cartesian abstraction of a subtask: a fixed task, a growing set of
/// abstract (Cartesian) states, the refinement hierarchy mapping concrete
/// states to them, and the transition system between them.
pub struct Abstraction<'a> {
    task: &'a Task,
    dtgs: &'a [Dtg],
    goal: Vec<Fact>,
    cartesian_states: RefVec<AbstractStateId, CartesianState>,
    hierarchy: RefinementHierarchy,
    transitions: TransitionSystem,
    init_state: AbstractStateId,
}

impl<'a> Abstraction<'a> {
    /// Builds the trivial single-state abstraction of `task` for a subtask
    /// whose goal is `goal` (a subset of `task.goal`, or any other partial
    /// assignment — cost saturation runs one abstraction per subtask).
    pub fn new(task: &'a Task, dtgs: &'a [Dtg], goal: Vec<Fact>) -> Self {
        let root = CartesianState::trivial(task);
        let mut cartesian_states = RefVec::new();
        let init_state: AbstractStateId = cartesian_states.push(root);
        let hierarchy = RefinementHierarchy::new(init_state);
        let mut transitions = TransitionSystem::new();
        transitions.add_state(init_state);

        for (op_id, op) in task.operators.entries() {
            // In the trivial abstraction every operator is applicable from the
            // single state, and every effect leaves it (a self-loop).
            let _ = op;
            transitions.add_transition(init_state, op_id, init_state);
        }

        Abstraction {
            task,
            dtgs,
            goal,
            cartesian_states,
            hierarchy,
            transitions,
            init_state,
        }
    }

    pub fn task(&self) -> &Task {
        self.task
    }

    pub fn init_state(&self) -> AbstractStateId {
        self.init_state
    }

    pub fn num_states(&self) -> usize {
        self.cartesian_states.len()
    }

    pub fn non_loop_transition_count(&self) -> usize {
        self.transitions.non_loop_transition_count()
    }

    pub fn state(&self, id: AbstractStateId) -> &CartesianState {
        &self.cartesian_states[id]
    }

    pub fn lookup(&self, concrete: &[Value]) -> AbstractStateId {
        self.hierarchy.lookup(concrete)
    }

    pub fn outgoing(&self, id: AbstractStateId) -> &[(OpId, AbstractStateId)] {
        self.transitions.outgoing(id)
    }

    pub fn all_transitions(&self) -> impl Iterator<Item = (AbstractStateId, OpId, AbstractStateId)> + '_ {
        self.transitions.all_transitions()
    }

    /// Every self-loop `(state, op)` currently recorded.
    pub fn all_loop_transitions(&self) -> impl Iterator<Item = (AbstractStateId, OpId)> + '_ {
        self.transitions.all_loop_transitions()
    }

    pub fn num_operators(&self) -> usize {
        self.task.operators.len()
    }

    pub fn is_goal_state(&self, id: AbstractStateId) -> bool {
        self.cartesian_states[id].includes_facts(&self.goal)
    }

    pub fn goal_facts(&self) -> &[Fact] {
        &self.goal
    }

    /// Splits the abstract state `obsolete` on `var`, carving out `wanted`
    /// (a subset of `obsolete`'s current subset on `var`) into a fresh state,
    /// rewiring every transition that touched `obsolete` across the two
    /// children. Returns `(left, right)`: `left` reuses `obsolete`'s id and
    /// keeps the complement of `wanted`; `right` is the fresh id holding
    /// `wanted` (spec.md §3 "id of an obsolete state is reused for its v1
    /// child").
    pub fn refine(&mut self, obsolete: AbstractStateId, var: VarId, wanted: &FixedBitSet) -> (AbstractStateId, AbstractStateId) {
        let (without, only) = self.cartesian_states[obsolete].split_domain(var, wanted);
        self.cartesian_states[obsolete] = without;
        let fresh: AbstractStateId = self.cartesian_states.push(only);
        self.transitions.add_state(fresh);

        let wanted_values: Vec<Value> = wanted.ones().map(|v| v as Value).collect();
        self.hierarchy.split(obsolete, var, &wanted_values, obsolete, fresh);

        self.rewire(obsolete, fresh, var);
        (obsolete, fresh)
    }

    fn rewire(&mut self, obsolete: AbstractStateId, fresh: AbstractStateId, var: VarId) {
        let dtg = &self.dtgs[usize::from(var)];
        let domain_size = self.task.domain_size(var) as usize;

        let (out_non_loop, out_loops) = self.transitions.take_outgoing(obsolete);
        let mut outgoing_edges: Vec<(OpId, AbstractStateId)> = out_non_loop;
        outgoing_edges.extend(out_loops.into_iter().map(|op| (op, obsolete)));
        let incoming_edges = self.transitions.take_incoming(obsolete);

        for &child in &[obsolete, fresh] {
            let child_state = self.cartesian_states[child].clone();
            for &(op, old_target) in &outgoing_edges {
                if !child_state.includes_facts(&self.task.operators[op].preconditions) {
                    continue;
                }
                if old_target == obsolete {
                    let post = post_image_on_var(dtg, domain_size, op, &child_state, var);
                    if bitsets_intersect(&post, self.cartesian_states[obsolete].values(var)) {
                        self.transitions.add_transition(child, op, obsolete);
                    }
                    if bitsets_intersect(&post, self.cartesian_states[fresh].values(var)) {
                        self.transitions.add_transition(child, op, fresh);
                    }
                } else {
                    self.transitions.add_transition(child, op, old_target);
                }
            }
        }

        for (source, op) in incoming_edges {
            let source_state = self.cartesian_states[source].clone();
            let post = post_image_on_var(dtg, domain_size, op, &source_state, var);
            if bitsets_intersect(&post, self.cartesian_states[obsolete].values(var)) {
                self.transitions.add_transition(source, op, obsolete);
            }
            if bitsets_intersect(&post, self.cartesian_states[fresh].values(var)) {
                self.transitions.add_transition(source, op, fresh);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sas_collections::ref_store::RefStore;
    use sas_task::model::{Effect, Operator, Variable};

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
        let v0 = variables.push(var(2));
        let mut operators = RefStore::new();
        operators.push(Operator {
            name: "o0".into(),
            preconditions: vec![],
            effects: vec![Effect {
                fact: Fact::new(v0, 1),
                precondition_value: Some(0),
                conditions: vec![],
            }],
            cost: 1,
        });
        Task::new(variables, operators, RefStore::new(), vec![], vec![0], vec![Fact::new(v0, 1)], false).unwrap()
    }

    #[test]
    fn trivial_abstraction_has_one_state_and_self_loop() {
        let task = chain_task();
        let dtgs = vec![sas_task::dtg::build_dtg(&task, VarId::from(0usize))];
        let abs = Abstraction::new(&task, &dtgs, task.goal.clone());
        assert_eq!(abs.num_states(), 1);
        assert!(abs.is_goal_state(abs.init_state()));
        assert_eq!(abs.non_loop_transition_count(), 0);
    }

    #[test]
    fn refine_splits_and_rewires_into_two_states() {
        let task = chain_task();
        let dtgs = vec![sas_task::dtg::build_dtg(&task, VarId::from(0usize))];
        let mut abs = Abstraction::new(&task, &dtgs, task.goal.clone());
        let v0 = VarId::from(0usize);
        let mut wanted = FixedBitSet::with_capacity(2);
        wanted.insert(1);
        let (left, right) = abs.refine(abs.init_state(), v0, &wanted);
        assert_eq!(abs.num_states(), 2);
        assert!(abs.state(left).test(v0, 0));
        assert!(!abs.state(left).test(v0, 1));
        assert!(abs.state(right).test(v0, 1));
        assert!(!abs.is_goal_state(left));
        assert!(abs.is_goal_state(right));
        // The operator leads from {v0=0} to {v0=1}: left -> right, no loop.
        assert!(abs.outgoing(left).iter().any(|&(_, t)| t == right));
        assert_eq!(abs.non_loop_transition_count(), 1);
    }
}
