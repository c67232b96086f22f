//! §4.7 Cartesian (abstract) state: a product of non-empty per-variable value
//! subsets, represented as one bitset per variable.

use fixedbitset::FixedBitSet;
use sas_task::ids::{Value, VarId};
use sas_task::model::{Fact, Operator, Task};

/// A product of per-variable value subsets. Every subset is non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartesianState {
    domains: Vec<FixedBitSet>,
}

impl CartesianState {
    /// The trivial abstract state: every variable's full domain.
    pub fn trivial(task: &Task) -> Self {
        let domains = (0..task.num_variables())
            .map(|i| {
                let d = task.domain_size(VarId::from(i)) as usize;
                let mut bs = FixedBitSet::with_capacity(d);
                bs.insert_range(0..d);
                bs
            })
            .collect();
        CartesianState { domains }
    }

    pub fn num_variables(&self) -> usize {
        self.domains.len()
    }

    pub fn test(&self, var: VarId, value: Value) -> bool {
        self.domains[usize::from(var)].contains(value as usize)
    }

    pub fn count(&self, var: VarId) -> usize {
        self.domains[usize::from(var)].count_ones(..)
    }

    pub fn intersects(&self, other: &CartesianState, var: VarId) -> bool {
        let a = &self.domains[usize::from(var)];
        let b = &other.domains[usize::from(var)];
        a.intersection(b).next().is_some()
    }

    pub fn is_superset_of(&self, other: &CartesianState) -> bool {
        self.domains
            .iter()
            .zip(other.domains.iter())
            .all(|(mine, theirs)| theirs.is_subset(mine))
    }

    pub fn includes_state(&self, state: &[Value]) -> bool {
        state.iter().enumerate().all(|(v, &value)| self.domains[v].contains(value as usize))
    }

    pub fn includes_facts(&self, facts: &[Fact]) -> bool {
        facts.iter().all(|f| self.test(f.var, f.value))
    }

    /// Returns `(without_wanted, wanted_only)`: `self` restricted on `var` to its
    /// complement of `wanted`, and to `wanted` itself. `wanted` must be a proper,
    /// non-empty subset of `self`'s subset on `var` (spec.md §4.7).
    pub fn split_domain(&self, var: VarId, wanted: &FixedBitSet) -> (CartesianState, CartesianState) {
        let idx = usize::from(var);
        let current = &self.domains[idx];
        debug_assert!(wanted.count_ones(..) > 0);
        debug_assert!(wanted.is_subset(current));
        debug_assert!(wanted.count_ones(..) < current.count_ones(..));

        let mut without_domain = current.clone();
        without_domain.difference_with(wanted);
        let mut wanted_only = FixedBitSet::with_capacity(current.len());
        wanted_only.union_with(wanted);

        let mut without = self.clone();
        without.domains[idx] = without_domain;
        let mut only = self.clone();
        only.domains[idx] = wanted_only;
        (without, only)
    }

    /// The pre-image of `self` under `operator`, ignoring applicability outside
    /// the operator's own declared precondition per variable (spec.md §4.7
    /// `regress`): for each effect variable, restore the full domain; then for
    /// each precondition, restrict to the singleton precondition value.
    pub fn regress(&self, task: &Task, operator: &Operator) -> CartesianState {
        let mut result = self.clone();
        for effect in &operator.effects {
            let idx = usize::from(effect.fact.var);
            let d = task.domain_size(effect.fact.var) as usize;
            let mut full = FixedBitSet::with_capacity(d);
            full.insert_range(0..d);
            result.domains[idx] = full;
        }
        for pre in &operator.preconditions {
            let idx = usize::from(pre.var);
            let mut singleton = FixedBitSet::with_capacity(result.domains[idx].len());
            singleton.insert(pre.value as usize);
            result.domains[idx] = singleton;
        }
        result
    }

    /// The trivial state restricted to `facts`: every named variable pinned
    /// to its fact value, every other variable left at its full domain.
    /// Used to build a flaw's desired Cartesian set out of an operator's
    /// preconditions or the task's goal (spec.md §4.11).
    pub fn from_facts(task: &Task, facts: &[Fact]) -> CartesianState {
        let mut result = CartesianState::trivial(task);
        for f in facts {
            let idx = usize::from(f.var);
            let mut singleton = FixedBitSet::with_capacity(result.domains[idx].len());
            singleton.insert(f.value as usize);
            result.domains[idx] = singleton;
        }
        result
    }

    /// Direct access to the value-subset bitset of one variable, for callers
    /// (transition-system rewiring, split-candidate search) that need to walk
    /// individual values.
    pub fn values(&self, var: VarId) -> &FixedBitSet {
        &self.domains[usize::from(var)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sas_collections::ref_store::RefStore;
    use sas_task::model::Variable;

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

    fn trivial_task() -> Task {
        let mut variables = RefStore::new();
        variables.push(var(3));
        variables.push(var(2));
        Task::new(variables, RefStore::new(), RefStore::new(), vec![], vec![0, 0], vec![], false).unwrap()
    }

    #[test]
    fn trivial_state_includes_every_concrete_state() {
        let task = trivial_task();
        let s = CartesianState::trivial(&task);
        assert!(s.includes_state(&[0, 0]));
        assert!(s.includes_state(&[2, 1]));
        assert_eq!(s.count(VarId::from(0usize)), 3);
    }

    #[test]
    fn split_domain_partitions_without_overlap() {
        let task = trivial_task();
        let s = CartesianState::trivial(&task);
        let v0 = VarId::from(0usize);
        let mut wanted = FixedBitSet::with_capacity(3);
        wanted.insert(0);
        wanted.insert(1);
        let (without, only) = s.split_domain(v0, &wanted);
        assert!(!without.intersects(&only, v0));
        assert_eq!(without.count(v0) + only.count(v0), s.count(v0));
        assert!(only.test(v0, 0) && only.test(v0, 1));
        assert!(without.test(v0, 2));
    }
}
