//! §4.1 Causal-graph construction.

use crate::ids::VarId;
use crate::model::Task;
use std::collections::{HashMap, HashSet};
use std::io::Write;

/// Adjacency relations over variable ids. All vectors are sorted, duplicate-free,
/// and never contain the vertex itself.
#[derive(Debug, Clone, Default)]
pub struct CausalGraph {
    pub pre_to_eff: Vec<Vec<VarId>>,
    pub eff_to_pre: Vec<Vec<VarId>>,
    pub eff_to_eff: Vec<Vec<VarId>>,
    pub successors: Vec<Vec<VarId>>,
    pub predecessors: Vec<Vec<VarId>>,
    /// Number of operators/axioms witnessing each edge, keyed by (source, target).
    pub weights: HashMap<(VarId, VarId), u32>,
}

impl CausalGraph {
    pub fn build(task: &Task) -> CausalGraph {
        let n = task.num_variables();
        let mut pre_to_eff: Vec<HashSet<VarId>> = vec![HashSet::new(); n];
        let mut eff_to_pre: Vec<HashSet<VarId>> = vec![HashSet::new(); n];
        let mut eff_to_eff: Vec<HashSet<VarId>> = vec![HashSet::new(); n];
        let mut weights: HashMap<(VarId, VarId), u32> = HashMap::new();

        let mut record = |from: VarId, to: VarId, weights: &mut HashMap<(VarId, VarId), u32>| {
            if from == to {
                return;
            }
            *weights.entry((from, to)).or_insert(0) += 1;
        };

        for op in task.operators.entries() {
            let op = op.1;
            let eff_vars: Vec<VarId> = op.effects.iter().map(|e| e.fact.var).collect();
            let mut source_vars: HashSet<VarId> = HashSet::new();
            for p in &op.preconditions {
                source_vars.insert(p.var);
            }
            for e in &op.effects {
                for c in &e.conditions {
                    source_vars.insert(c.var);
                }
            }
            for &p in &source_vars {
                for &e in &eff_vars {
                    if p != e {
                        pre_to_eff[usize::from(p)].insert(e);
                        eff_to_pre[usize::from(e)].insert(p);
                        record(p, e, &mut weights);
                    }
                }
            }
            for (i, &a) in eff_vars.iter().enumerate() {
                for &b in &eff_vars[i + 1..] {
                    if a != b {
                        eff_to_eff[usize::from(a)].insert(b);
                        eff_to_eff[usize::from(b)].insert(a);
                        record(a, b, &mut weights);
                        record(b, a, &mut weights);
                    }
                }
            }
        }

        for ax in task.axioms.entries() {
            let ax = ax.1;
            for c in &ax.conditions {
                if c.var != ax.effect_var {
                    pre_to_eff[usize::from(c.var)].insert(ax.effect_var);
                    eff_to_pre[usize::from(ax.effect_var)].insert(c.var);
                    record(c.var, ax.effect_var, &mut weights);
                }
            }
        }

        let sorted = |sets: Vec<HashSet<VarId>>| -> Vec<Vec<VarId>> {
            sets.into_iter()
                .map(|s| {
                    let mut v: Vec<VarId> = s.into_iter().collect();
                    v.sort();
                    v
                })
                .collect()
        };

        let pre_to_eff = sorted(pre_to_eff);
        let eff_to_pre = sorted(eff_to_pre);
        let eff_to_eff = sorted(eff_to_eff);

        let mut successors: Vec<HashSet<VarId>> = vec![HashSet::new(); n];
        let mut predecessors: Vec<HashSet<VarId>> = vec![HashSet::new(); n];
        for v in 0..n {
            let vid = VarId::from(v);
            for &u in &pre_to_eff[v] {
                successors[v].insert(u);
                predecessors[usize::from(u)].insert(vid);
            }
            for &u in &eff_to_pre[v] {
                predecessors[v].insert(u);
                successors[usize::from(u)].insert(vid);
            }
            for &u in &eff_to_eff[v] {
                successors[v].insert(u);
                predecessors[v].insert(u);
            }
        }

        CausalGraph {
            pre_to_eff,
            eff_to_pre,
            eff_to_eff,
            successors: sorted(successors),
            predecessors: sorted(predecessors),
            weights,
        }
    }

    pub fn num_variables(&self) -> usize {
        self.successors.len()
    }

    pub fn weight(&self, from: VarId, to: VarId) -> u32 {
        self.weights.get(&(from, to)).copied().unwrap_or(0)
    }

    /// §6.2 `begin_CG...end_CG` body: for each variable in level order,
    /// `<num_successors>` then one `<successor-level> <edge-weight>` pair per
    /// successor. Every variable in a normalized task is already retained and
    /// level-ordered, so `successors[v]` itself is exactly the "relevant
    /// levels" the original restricts its output to.
    pub fn write(&self, w: &mut impl Write) -> std::io::Result<()> {
        for v in 0..self.num_variables() {
            let succs = &self.successors[v];
            writeln!(w, "{}", succs.len())?;
            for &s in succs {
                let weight = self.weight(VarId::from(v), s);
                writeln!(w, "{} {}", usize::from(s), weight)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Effect, Fact, Operator, Task, Variable};
    use sas_collections::ref_store::RefStore;

    fn simple_task() -> Task {
        let mut variables = RefStore::new();
        let v0 = variables.push(Variable {
            name: "v0".into(),
            domain_size: 2,
            axiom_layer: -1,
            default_value: 0,
            level: -1,
            necessary: false,
            value_names: vec![],
        });
        let v1 = variables.push(Variable {
            name: "v1".into(),
            domain_size: 2,
            axiom_layer: -1,
            default_value: 0,
            level: -1,
            necessary: false,
            value_names: vec![],
        });
        let mut operators = RefStore::new();
        operators.push(Operator {
            name: "o0".into(),
            preconditions: vec![Fact::new(v0, 0)],
            effects: vec![Effect {
                fact: Fact::new(v1, 1),
                precondition_value: Some(0),
                conditions: vec![],
            }],
            cost: 1,
        });
        Task::new(variables, operators, RefStore::new(), vec![], vec![0, 0], vec![Fact::new(v1, 1)], false).unwrap()
    }

    #[test]
    fn neighbors_sorted_dedup_no_self_loop() {
        let task = simple_task();
        let cg = CausalGraph::build(&task);
        for v in 0..cg.num_variables() {
            let succ = &cg.successors[v];
            let mut sorted = succ.clone();
            sorted.sort();
            sorted.dedup();
            assert_eq!(succ, &sorted);
            assert!(!succ.contains(&VarId::from(v)));
        }
    }

    #[test]
    fn precondition_edge_present() {
        let task = simple_task();
        let cg = CausalGraph::build(&task);
        let v0 = VarId::from(0usize);
        let v1 = VarId::from(1usize);
        assert!(cg.pre_to_eff[0].contains(&v1));
        assert!(cg.eff_to_pre[1].contains(&v0));
        assert_eq!(cg.weight(v0, v1), 1);
    }
}
