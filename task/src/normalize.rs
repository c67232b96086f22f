//! §4.3 Task normalization: rewrite to reference only retained, leveled variables.

use crate::ids::VarId;
use crate::model::{Axiom, Effect, Fact, MutexGroup, Operator, Task, Variable};
use crate::ordering::Ordering;
use anyhow::{ensure, Result};
use sas_collections::ref_store::RefStore;
use std::collections::HashMap;

/// Maps old `VarId`s to their new level-ordered `VarId`, or `None` if the variable
/// was dropped by relevance pruning.
pub struct VarMap {
    new_of: HashMap<VarId, VarId>,
}

impl VarMap {
    fn from_order(order: &[VarId]) -> VarMap {
        let new_of = order.iter().enumerate().map(|(i, &v)| (v, VarId::from(i))).collect();
        VarMap { new_of }
    }

    pub fn get(&self, old: VarId) -> Option<VarId> {
        self.new_of.get(&old).copied()
    }

    fn map_fact(&self, f: &Fact) -> Option<Fact> {
        self.get(f.var).map(|v| Fact::new(v, f.value))
    }
}

/// Rewrites `task` according to `ordering`, dropping entities that become vacuous.
/// `ordering.order` must already be the desired final order (relevance-pruned or not).
pub fn normalize(task: &Task, ordering: &Ordering) -> Result<Task> {
    let map = VarMap::from_order(&ordering.order);

    let mut variables: RefStore<VarId, Variable> = RefStore::new();
    for (level, &old_id) in ordering.order.iter().enumerate() {
        let mut v = task.variables[old_id].clone();
        v.level = level as i32;
        v.necessary = true;
        variables.push(v);
    }

    let mut operators: RefStore<crate::ids::OpId, Operator> = RefStore::new();
    for (_, op) in task.operators.entries() {
        let effects: Vec<Effect> = op
            .effects
            .iter()
            .filter_map(|e| {
                let fact = map.map_fact(&e.fact)?;
                let conditions: Vec<Fact> = e.conditions.iter().filter_map(|c| map.map_fact(c)).collect();
                let precondition_value = e.precondition_value;
                Some(Effect {
                    fact,
                    precondition_value,
                    conditions,
                })
            })
            .collect();
        if effects.is_empty() {
            continue;
        }
        let preconditions: Vec<Fact> = op.preconditions.iter().filter_map(|p| map.map_fact(p)).collect();
        operators.push(Operator {
            name: op.name.clone(),
            preconditions,
            effects,
            cost: op.cost,
        });
    }

    let mut axioms: RefStore<crate::ids::AxiomId, Axiom> = RefStore::new();
    for (_, ax) in task.axioms.entries() {
        let Some(effect_var) = map.get(ax.effect_var) else {
            continue;
        };
        let conditions: Vec<Fact> = ax.conditions.iter().filter_map(|c| map.map_fact(c)).collect();
        axioms.push(Axiom {
            conditions,
            effect_var,
            old_value: ax.old_value,
            new_value: ax.new_value,
        });
    }

    let mut mutexes = Vec::new();
    for group in &task.mutexes {
        let distinct_vars: std::collections::HashSet<VarId> = group.facts.iter().map(|f| f.var).collect();
        if distinct_vars.len() <= 1 {
            // redundant: a single variable's values are already mutually exclusive.
            continue;
        }
        let facts: Vec<Fact> = group.facts.iter().filter_map(|f| map.map_fact(f)).collect();
        let distinct_retained: std::collections::HashSet<VarId> = facts.iter().map(|f| f.var).collect();
        if distinct_retained.len() < 2 {
            continue;
        }
        mutexes.push(MutexGroup { facts });
    }

    let mut initial_state = vec![0u32; variables.len()];
    for (old_id, &value) in task.variables.keys().zip(task.initial_state.iter()) {
        if let Some(new_id) = map.get(old_id) {
            initial_state[usize::from(new_id)] = value;
        }
    }

    let mut goal = Vec::new();
    for g in &task.goal {
        match map.get(g.var) {
            Some(new_var) => goal.push(Fact::new(new_var, g.value)),
            None => {
                // Caller invariant (spec.md §4.3): a goal on an unretained variable
                // must already be true in the initial state.
                ensure!(
                    task.initial_state[usize::from(g.var)] == g.value,
                    "goal on unretained variable {:?} is not satisfied in the initial state",
                    g.var
                );
            }
        }
    }

    Task::new(variables, operators, axioms, mutexes, initial_state, goal, task.uses_metric)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::causal_graph::CausalGraph;
    use crate::ordering::build_ordering;

    fn var(name: &str) -> Variable {
        Variable {
            name: name.into(),
            domain_size: 2,
            axiom_layer: -1,
            default_value: 0,
            level: -1,
            necessary: false,
            value_names: vec![],
        }
    }

    #[test]
    fn scenario_3_unreachable_fact_pruning() {
        let mut variables = RefStore::new();
        let v0 = variables.push(var("v0"));
        let _v1 = variables.push(var("v1"));
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
        let task = Task::new(
            variables,
            operators,
            RefStore::new(),
            vec![],
            vec![0, 0],
            vec![Fact::new(v0, 1)],
            false,
        )
        .unwrap();
        let cg = CausalGraph::build(&task);
        let ordering = build_ordering(&task, &cg, true);
        let normalized = normalize(&task, &ordering).unwrap();
        assert_eq!(normalized.num_variables(), 1);
    }
}
