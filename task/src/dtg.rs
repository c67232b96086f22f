//! §4.4 Domain-transition graphs: per-variable value→value multigraphs.

use crate::ids::{AxiomId, OpId, Value, VarId};
use crate::model::Task;
use std::io::Write;

/// What induces a transition: a grounded operator or a stratified axiom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inducer {
    Operator(OpId),
    Axiom(AxiomId),
}

/// One value→value arc in a variable's domain-transition graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: Value,
    pub to: Value,
    pub inducer: Inducer,
    pub cost: u32,
    /// Conjunctive foreign-variable context required to fire, sorted by (var, value).
    pub context: Vec<(VarId, Value)>,
}

/// Domain-transition graph for one variable: for each possible source value, the
/// (dominance-pruned) list of outgoing transitions.
#[derive(Debug, Clone, Default)]
pub struct Dtg {
    pub by_source: Vec<Vec<Transition>>,
}

impl Dtg {
    /// §6.2 `begin_DTG...end_DTG` body: for each source value, `<num_transitions>`
    /// then per transition `<target> <op-id> <num_relevant_conditions> [<level>
    /// <value>]*`. Operators and axioms share the same `op-id` numbering on the
    /// wire, exactly as the original preprocessor's `Transition::op` field does
    /// (it is populated from either an operator index or an axiom index with no
    /// tag distinguishing the two).
    pub fn write(&self, w: &mut impl Write) -> std::io::Result<()> {
        for transitions in &self.by_source {
            writeln!(w, "{}", transitions.len())?;
            for t in transitions {
                let op_id = match t.inducer {
                    Inducer::Operator(op) => usize::from(op),
                    Inducer::Axiom(ax) => usize::from(ax),
                };
                writeln!(w, "{}", t.to)?;
                writeln!(w, "{}", op_id)?;
                writeln!(w, "{}", t.context.len())?;
                for &(var, value) in &t.context {
                    writeln!(w, "{} {}", usize::from(var), value)?;
                }
            }
        }
        Ok(())
    }
}

fn merge_sorted_context(primary: &[crate::model::Fact], secondary: &[crate::model::Fact], skip: VarId) -> Vec<(VarId, Value)> {
    let mut ctx: Vec<(VarId, Value)> = primary
        .iter()
        .chain(secondary.iter())
        .filter(|f| f.var != skip)
        .map(|f| (f.var, f.value))
        .collect();
    ctx.sort();
    ctx.dedup();
    ctx
}

fn is_subset(a: &[(VarId, Value)], b: &[(VarId, Value)]) -> bool {
    // both sorted & deduped: linear merge-subset check.
    let mut bi = 0;
    for &x in a {
        while bi < b.len() && b[bi] < x {
            bi += 1;
        }
        if bi >= b.len() || b[bi] != x {
            return false;
        }
    }
    true
}

/// Builds the domain-transition graph of variable `v` from a normalized task.
pub fn build_dtg(task: &Task, v: VarId) -> Dtg {
    let domain_size = task.domain_size(v) as usize;
    let mut raw: Vec<Vec<Transition>> = vec![Vec::new(); domain_size];

    for (op_id, op) in task.operators.entries() {
        for effect in &op.effects {
            if effect.fact.var != v {
                continue;
            }
            let to = effect.fact.value;
            let own_var_condition = effect.conditions.iter().find(|c| c.var == v).map(|c| c.value);

            let from_candidates: Vec<Value> = match effect.precondition_value {
                Some(pre) => vec![pre],
                None => (0..task.domain_size(v)).filter(|&f| f != to).collect(),
            };

            let context = merge_sorted_context(&op.preconditions, &effect.conditions, v);

            for from in from_candidates {
                if let Some(req) = own_var_condition {
                    if req != from {
                        continue;
                    }
                }
                raw[from as usize].push(Transition {
                    from,
                    to,
                    inducer: Inducer::Operator(op_id),
                    cost: op.cost,
                    context: context.clone(),
                });
            }
        }
    }

    for (ax_id, ax) in task.axioms.entries() {
        if ax.effect_var != v {
            continue;
        }
        let context = merge_sorted_context(&ax.conditions, &[], v);
        raw[ax.old_value as usize].push(Transition {
            from: ax.old_value,
            to: ax.new_value,
            inducer: Inducer::Axiom(ax_id),
            cost: 0,
            context,
        });
    }

    for transitions in raw.iter_mut() {
        transitions.sort_by(|a, b| (a.to, a.context.len(), a.cost).cmp(&(b.to, b.context.len(), b.cost)));
        transitions.dedup();
        prune_dominated(transitions);
    }

    Dtg { by_source: raw }
}

/// Removes transitions dominated by another transition to the same target with a
/// subset context at no greater cost (spec.md §4.4 finalization, §8 domination
/// invariant): for distinct transitions `a`, `b` to the same target, if
/// `context(a) ⊆ context(b)` and `cost(a) <= cost(b)` then `b` is dominated.
fn prune_dominated(transitions: &mut Vec<Transition>) {
    let n = transitions.len();
    let mut keep = vec![true; n];
    for i in 0..n {
        if !keep[i] {
            continue;
        }
        for j in 0..n {
            if i == j || !keep[j] {
                continue;
            }
            let a = &transitions[i];
            let b = &transitions[j];
            if a.to != b.to || !is_subset(&a.context, &b.context) || a.cost > b.cost {
                continue;
            }
            // a dominates b. When both directions hold (identical context/cost),
            // keep only the lower-index survivor so the pair doesn't eliminate
            // each other.
            if a.context == b.context && a.cost == b.cost {
                if i < j {
                    keep[j] = false;
                }
            } else {
                keep[j] = false;
            }
        }
    }
    let mut idx = 0;
    transitions.retain(|_| {
        let k = keep[idx];
        idx += 1;
        k
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Effect, Fact, Operator, Task, Variable};
    use sas_collections::ref_store::RefStore;

    fn var(name: &str, domain: u32) -> Variable {
        Variable {
            name: name.into(),
            domain_size: domain,
            axiom_layer: -1,
            default_value: 0,
            level: -1,
            necessary: true,
            value_names: vec![],
        }
    }

    #[test]
    fn scenario_1_single_switch() {
        let mut variables = RefStore::new();
        let v0 = variables.push(var("v0", 2));
        let v1 = variables.push(var("v1", 2));
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
        let task = Task::new(
            variables,
            operators,
            RefStore::new(),
            vec![],
            vec![0, 0],
            vec![Fact::new(v1, 1)],
            false,
        )
        .unwrap();

        let dtg = build_dtg(&task, v1);
        let from0 = &dtg.by_source[0];
        assert_eq!(from0.len(), 1);
        assert_eq!(from0[0].to, 1);
        assert_eq!(from0[0].cost, 1);
        assert_eq!(from0[0].context, vec![(v0, 0)]);
    }

    #[test]
    fn scenario_2_conditional_effect_context() {
        let mut variables = RefStore::new();
        let v0 = variables.push(var("v0", 3));
        let v1 = variables.push(var("v1", 2));
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
        operators.push(Operator {
            name: "o1".into(),
            preconditions: vec![],
            effects: vec![Effect {
                fact: Fact::new(v0, 2),
                precondition_value: Some(1),
                conditions: vec![Fact::new(v1, 1)],
            }],
            cost: 1,
        });
        let task = Task::new(
            variables,
            operators,
            RefStore::new(),
            vec![],
            vec![0, 0],
            vec![Fact::new(v0, 2)],
            false,
        )
        .unwrap();
        let dtg = build_dtg(&task, v0);
        let from1 = &dtg.by_source[1];
        assert_eq!(from1.len(), 1);
        assert_eq!(from1[0].to, 2);
        assert_eq!(from1[0].context, vec![(v1, 1)]);
    }

    #[test]
    fn domination_prunes_subsumed_transition() {
        // Two operators both go 0->1 with the same cost; one has an extra,
        // unnecessary context fact. It should be pruned as dominated.
        let mut variables = RefStore::new();
        let v0 = variables.push(var("v0", 2));
        let v1 = variables.push(var("v1", 2));
        let mut operators = RefStore::new();
        operators.push(Operator {
            name: "cheap".into(),
            preconditions: vec![],
            effects: vec![Effect {
                fact: Fact::new(v0, 1),
                precondition_value: Some(0),
                conditions: vec![],
            }],
            cost: 1,
        });
        operators.push(Operator {
            name: "picky".into(),
            preconditions: vec![Fact::new(v1, 0)],
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
        let dtg = build_dtg(&task, v0);
        assert_eq!(dtg.by_source[0].len(), 1);
        assert!(dtg.by_source[0][0].context.is_empty());
    }
}
