//! §4.9 Transition system: outgoing abstract transitions per abstract state,
//! maintained incrementally under splits.

use crate::ids::AbstractStateId;
use sas_collections::ref_store::RefVec;
use sas_task::ids::OpId;

#[derive(Debug, Clone, Default)]
struct Outgoing {
    non_loop: Vec<(OpId, AbstractStateId)>,
    loops: Vec<OpId>,
}

/// Outgoing abstract transitions per abstract state id, plus a running count
/// of non-loop transitions for budget enforcement.
#[derive(Debug, Clone, Default)]
pub struct TransitionSystem {
    out: RefVec<AbstractStateId, Outgoing>,
    non_loop_count: usize,
}

impl TransitionSystem {
    pub fn new() -> Self {
        TransitionSystem::default()
    }

    fn ensure(&mut self, s: AbstractStateId) {
        while self.out.len() <= usize::from(s) {
            self.out.push(Outgoing::default());
        }
    }

    /// Registers a (possibly new) abstract state with no outgoing transitions
    /// yet.
    pub fn add_state(&mut self, s: AbstractStateId) {
        self.ensure(s);
    }

    pub fn non_loop_transition_count(&self) -> usize {
        self.non_loop_count
    }

    pub fn outgoing(&self, s: AbstractStateId) -> &[(OpId, AbstractStateId)] {
        if usize::from(s) < self.out.len() {
            &self.out[s].non_loop
        } else {
            &[]
        }
    }

    /// Every non-loop transition currently recorded, as `(source, op, target)`.
    pub fn all_transitions(&self) -> impl Iterator<Item = (AbstractStateId, OpId, AbstractStateId)> + '_ {
        self.out.entries().flat_map(|(s, outgoing)| outgoing.non_loop.iter().map(move |&(op, t)| (s, op, t)))
    }

    /// Every self-loop transition currently recorded, as `(state, op)`. An
    /// operator that only ever self-loops in an abstraction contributes a
    /// zero-cost transition for cost-saturation purposes, not "no transition
    /// at all" — distinguishing the two keeps an irrelevant operator's
    /// remaining cost untouched instead of driving it to `INFINITE_COST`.
    pub fn all_loop_transitions(&self) -> impl Iterator<Item = (AbstractStateId, OpId)> + '_ {
        self.out.entries().flat_map(|(s, outgoing)| outgoing.loops.iter().map(move |&op| (s, op)))
    }

    pub fn loop_operators(&self, s: AbstractStateId) -> &[OpId] {
        if usize::from(s) < self.out.len() {
            &self.out[s].loops
        } else {
            &[]
        }
    }

    /// Adds one transition, classifying it as a loop or non-loop transition.
    pub fn add_transition(&mut self, from: AbstractStateId, op: OpId, to: AbstractStateId) {
        self.ensure(from);
        self.ensure(to);
        if from == to {
            self.out[from].loops.push(op);
        } else {
            self.out[from].non_loop.push((op, to));
            self.non_loop_count += 1;
        }
    }

    /// Removes every transition leaving or entering `s` (used right before a
    /// split rewires them into the two children). Returns the removed outgoing
    /// transitions (non-loop and loop) so the caller can redistribute them.
    pub fn take_outgoing(&mut self, s: AbstractStateId) -> (Vec<(OpId, AbstractStateId)>, Vec<OpId>) {
        if usize::from(s) >= self.out.len() {
            return (Vec::new(), Vec::new());
        }
        let removed = std::mem::take(&mut self.out[s]);
        self.non_loop_count -= removed.non_loop.len();
        (removed.non_loop, removed.loops)
    }

    /// Removes every transition `(source, op, s)` currently recorded against
    /// `source` where the target is `s`, returning the `(source, op)` pairs
    /// (used to find the incoming transitions of a state about to be split).
    pub fn take_incoming(&mut self, s: AbstractStateId) -> Vec<(AbstractStateId, OpId)> {
        let mut removed = Vec::new();
        for source in self.out.keys() {
            if source == s {
                continue;
            }
            let before = self.out[source].non_loop.len();
            let mut kept = Vec::with_capacity(before);
            for (op, target) in std::mem::take(&mut self.out[source].non_loop) {
                if target == s {
                    removed.push((source, op));
                } else {
                    kept.push((op, target));
                }
            }
            self.non_loop_count -= before - kept.len();
            self.out[source].non_loop = kept;
        }
        removed
    }
}
