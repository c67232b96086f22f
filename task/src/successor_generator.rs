//! §4.5 Successor generator: a decision tree keyed on variable level for
//! sub-linear enumeration of applicable operators in a state.

use crate::ids::{OpId, Value, VarId};
use crate::model::{Fact, Task};
use std::io::Write;

/// Tagged-sum successor-generator tree node (spec.md §9 redesign flag: replace
/// polymorphic dispatch with a tagged sum).
#[derive(Debug, Clone)]
pub enum SuccessorGenerator {
    Switch {
        var: VarId,
        /// Indexed by value; `None` means no operator branches on that value.
        by_value: Vec<Option<Box<SuccessorGenerator>>>,
        default: Option<Box<SuccessorGenerator>>,
        immediately_applicable: Vec<OpId>,
    },
    Leaf {
        operators: Vec<OpId>,
    },
    Empty,
}

/// One still-unresolved precondition of an operator during construction, sorted
/// on variable level so each operator's remaining preconditions are consumed in
/// level order.
#[derive(Clone)]
struct Pending {
    op: OpId,
    remaining: Vec<Fact>,
}

/// Builds the successor generator for a normalized task, recursing over variables
/// in level order (spec.md §9: level order replaces the legacy pointer-address
/// order used for stability).
pub fn build(task: &Task) -> SuccessorGenerator {
    let pending: Vec<Pending> = task
        .operators
        .entries()
        .map(|(op, operator)| {
            let mut remaining: Vec<Fact> = operator.preconditions.clone();
            remaining.sort_by_key(|f| f.var);
            Pending { op, remaining }
        })
        .collect();
    let levels: Vec<VarId> = (0..task.num_variables()).map(VarId::from).collect();
    build_node(task, &levels, pending)
}

fn build_node(task: &Task, levels: &[VarId], pending: Vec<Pending>) -> SuccessorGenerator {
    if pending.is_empty() {
        return SuccessorGenerator::Empty;
    }
    let Some((&var, rest_levels)) = levels.split_first() else {
        // Out of variables: every remaining operator must have no more preconditions.
        let operators: Vec<OpId> = pending
            .into_iter()
            .inspect(|p| debug_assert!(p.remaining.is_empty()))
            .map(|p| p.op)
            .collect();
        return SuccessorGenerator::Leaf { operators };
    };

    let mut immediately_applicable = Vec::new();
    let mut by_var: std::collections::HashMap<Value, Vec<Pending>> = std::collections::HashMap::new();
    let mut default: Vec<Pending> = Vec::new();

    for p in pending {
        match p.remaining.first() {
            None => immediately_applicable.push(p.op),
            Some(f) if f.var == var => {
                let value = f.value;
                let mut remaining = p.remaining;
                remaining.retain(|c| c.var != var);
                by_var.entry(value).or_default().push(Pending { op: p.op, remaining });
            }
            Some(_) => default.push(p),
        }
    }

    // Optimization: if every operator fell into `default`, this variable is
    // irrelevant here; skip straight to the next level.
    if by_var.is_empty() && immediately_applicable.is_empty() {
        return build_node(task, rest_levels, default);
    }
    // Optimization: if every operator is immediately applicable and nothing
    // branches further, emit a leaf directly.
    if by_var.is_empty() && default.is_empty() {
        return SuccessorGenerator::Leaf {
            operators: immediately_applicable,
        };
    }

    let domain_size = task.domain_size(var) as usize;
    let mut by_value: Vec<Option<Box<SuccessorGenerator>>> = vec![None; domain_size];
    for (value, ops) in by_var {
        by_value[value as usize] = Some(Box::new(build_node(task, rest_levels, ops)));
    }
    let default_node = if default.is_empty() {
        None
    } else {
        Some(Box::new(build_node(task, rest_levels, default)))
    };

    SuccessorGenerator::Switch {
        var,
        by_value,
        default: default_node,
        immediately_applicable,
    }
}

impl SuccessorGenerator {
    /// Enumerates, in `out`, the operator ids applicable in `state`. Each applicable
    /// operator is yielded at most once (spec.md §4.5 query contract).
    pub fn applicable_operators(&self, state: &[Value], out: &mut Vec<OpId>) {
        match self {
            SuccessorGenerator::Empty => {}
            SuccessorGenerator::Leaf { operators } => out.extend_from_slice(operators),
            SuccessorGenerator::Switch {
                var,
                by_value,
                default,
                immediately_applicable,
            } => {
                out.extend_from_slice(immediately_applicable);
                let value = state[usize::from(*var)] as usize;
                if let Some(Some(child)) = by_value.get(value) {
                    child.applicable_operators(state, out);
                }
                if let Some(child) = default {
                    child.applicable_operators(state, out);
                }
            }
        }
    }

    /// Recursive textual encoding for the §6.2 `begin_SG...end_SG` block:
    /// `switch <level>` / `check <k>` / `<op-id>`×k then one sub-encoding per
    /// value in order, then the default sub-encoding; `check <k>` / `<op-id>`×k
    /// for a leaf; `check 0` for an absent branch.
    pub fn write(&self, w: &mut impl Write) -> std::io::Result<()> {
        match self {
            SuccessorGenerator::Empty => writeln!(w, "check 0"),
            SuccessorGenerator::Leaf { operators } => {
                writeln!(w, "check {}", operators.len())?;
                for op in operators {
                    writeln!(w, "{}", usize::from(*op))?;
                }
                Ok(())
            }
            SuccessorGenerator::Switch {
                var,
                by_value,
                default,
                immediately_applicable,
            } => {
                writeln!(w, "switch {}", usize::from(*var))?;
                writeln!(w, "check {}", immediately_applicable.len())?;
                for op in immediately_applicable {
                    writeln!(w, "{}", usize::from(*op))?;
                }
                for child in by_value {
                    match child {
                        Some(node) => node.write(w)?,
                        None => writeln!(w, "check 0")?,
                    }
                }
                match default {
                    Some(node) => node.write(w)?,
                    None => writeln!(w, "check 0")?,
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Effect, Operator, Task, Variable};
    use sas_collections::ref_store::RefStore;
    use std::collections::HashSet;

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

    fn brute_force_applicable(task: &Task, state: &[Value]) -> HashSet<OpId> {
        task.operators
            .entries()
            .filter(|(_, op)| op.preconditions.iter().all(|p| state[usize::from(p.var)] == p.value))
            .map(|(id, _)| id)
            .collect()
    }

    #[test]
    fn sound_and_complete_over_all_states() {
        let mut variables = RefStore::new();
        let v0 = variables.push(var("v0", 2));
        let v1 = variables.push(var("v1", 3));
        let mut operators = RefStore::new();
        operators.push(Operator {
            name: "o0".into(),
            preconditions: vec![Fact::new(v0, 0)],
            effects: vec![Effect {
                fact: Fact::new(v1, 1),
                precondition_value: None,
                conditions: vec![],
            }],
            cost: 1,
        });
        operators.push(Operator {
            name: "o1".into(),
            preconditions: vec![Fact::new(v1, 2)],
            effects: vec![Effect {
                fact: Fact::new(v0, 1),
                precondition_value: None,
                conditions: vec![],
            }],
            cost: 1,
        });
        operators.push(Operator {
            name: "o2".into(),
            preconditions: vec![],
            effects: vec![Effect {
                fact: Fact::new(v0, 1),
                precondition_value: None,
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
        let sg = build(&task);

        for v0 in 0..2u32 {
            for v1 in 0..3u32 {
                let state = vec![v0, v1];
                let mut got = Vec::new();
                sg.applicable_operators(&state, &mut got);
                let got_set: HashSet<OpId> = got.iter().copied().collect();
                assert_eq!(got.len(), got_set.len(), "duplicate yield for state {:?}", state);
                assert_eq!(got_set, brute_force_applicable(&task, &state), "state {:?}", state);
            }
        }
    }
}
