//! §3 DATA MODEL — the immutable description of a SAS+ planning task.

use crate::ids::{AxiomId, OpId, VarId, Value};
use anyhow::{ensure, Context, Result};
use sas_collections::ref_store::RefStore;

/// A finite-domain state variable.
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub domain_size: u32,
    /// `-1` if non-derived, else the stratification layer of a derived variable.
    pub axiom_layer: i32,
    /// Default value used before axiom evaluation, relevant only for derived variables.
    pub default_value: Value,
    /// Assigned by the variable ordering pass; `-1` until then.
    pub level: i32,
    /// Set by relevance pruning: is this variable on a path to the goal.
    pub necessary: bool,
    /// Human-readable name of each value, `value_names[value as usize]`, carried
    /// through from the input format purely for round-tripping (§6.1/§6.2).
    pub value_names: Vec<String>,
}

impl Variable {
    pub fn is_derived(&self) -> bool {
        self.axiom_layer >= 0
    }
}

/// A fact: an assignment of one value to one variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fact {
    pub var: VarId,
    pub value: Value,
}

impl Fact {
    pub fn new(var: VarId, value: Value) -> Self {
        Fact { var, value }
    }
}

/// One effect of an operator: the fact it writes, an optional required value the
/// variable must already hold (precondition on the effect variable itself), and a
/// conjunctive list of effect-conditions on *other* variables that must hold for the
/// effect to apply.
#[derive(Debug, Clone)]
pub struct Effect {
    pub fact: Fact,
    pub precondition_value: Option<Value>,
    pub conditions: Vec<Fact>,
}

/// A grounded planning operator.
#[derive(Debug, Clone)]
pub struct Operator {
    pub name: String,
    pub preconditions: Vec<Fact>,
    pub effects: Vec<Effect>,
    pub cost: u32,
}

impl Operator {
    /// Checks the two operator-level invariants from §3: no two effects write
    /// conflicting values to the same variable, and no effect-condition on the
    /// effect's own variable contradicts that effect's declared precondition value.
    fn check_invariants(&self) -> Result<()> {
        for (i, a) in self.effects.iter().enumerate() {
            for b in &self.effects[i + 1..] {
                ensure!(
                    a.fact.var != b.fact.var || a.fact.value == b.fact.value,
                    "operator '{}' has two effects writing different values to variable {:?}",
                    self.name,
                    a.fact.var
                );
            }
            if let Some(pre) = a.precondition_value {
                for c in &a.conditions {
                    ensure!(
                        c.var != a.fact.var || c.value == pre,
                        "operator '{}' has an effect-condition on its own effect variable that contradicts the declared precondition",
                        self.name
                    );
                }
            }
        }
        Ok(())
    }
}

/// A stratified axiom: a single conditional rewrite of a derived variable.
#[derive(Debug, Clone)]
pub struct Axiom {
    pub conditions: Vec<Fact>,
    pub effect_var: VarId,
    pub old_value: Value,
    pub new_value: Value,
}

/// A set of facts at most one of which holds in any reachable state.
#[derive(Debug, Clone)]
pub struct MutexGroup {
    pub facts: Vec<Fact>,
}

/// The full, immutable description of a grounded SAS+ planning task.
#[derive(Debug, Clone)]
pub struct Task {
    pub variables: RefStore<VarId, Variable>,
    pub operators: RefStore<OpId, Operator>,
    pub axioms: RefStore<AxiomId, Axiom>,
    pub mutexes: Vec<MutexGroup>,
    /// Total assignment, indexed by `VarId`.
    pub initial_state: Vec<Value>,
    /// Partial assignment; pairwise distinct variables.
    pub goal: Vec<Fact>,
    /// Whether the task declares a non-unit metric (from `begin_metric`).
    pub uses_metric: bool,
}

impl Task {
    pub fn new(
        variables: RefStore<VarId, Variable>,
        operators: RefStore<OpId, Operator>,
        axioms: RefStore<AxiomId, Axiom>,
        mutexes: Vec<MutexGroup>,
        initial_state: Vec<Value>,
        goal: Vec<Fact>,
        uses_metric: bool,
    ) -> Result<Self> {
        ensure!(
            initial_state.len() == variables.len(),
            "initial state assigns {} variables, but there are {}",
            initial_state.len(),
            variables.len()
        );
        for op in operators.entries() {
            op.1.check_invariants()
                .with_context(|| format!("invalid operator {:?}", op.0))?;
        }
        for ax in axioms.entries() {
            ensure!(
                variables[ax.1.effect_var].is_derived(),
                "axiom {:?} targets a non-derived variable",
                ax.0
            );
        }
        let mut seen_goal_vars = std::collections::HashSet::new();
        for g in &goal {
            ensure!(
                seen_goal_vars.insert(g.var),
                "goal assigns variable {:?} more than once",
                g.var
            );
        }
        Ok(Task {
            variables,
            operators,
            axioms,
            mutexes,
            initial_state,
            goal,
            uses_metric,
        })
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn domain_size(&self, var: VarId) -> u32 {
        self.variables[var].domain_size
    }

    pub fn has_axioms(&self) -> bool {
        !self.axioms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str, domain: u32) -> Variable {
        Variable {
            name: name.to_string(),
            domain_size: domain,
            axiom_layer: -1,
            default_value: 0,
            level: -1,
            necessary: false,
            value_names: vec![],
        }
    }

    #[test]
    fn rejects_conflicting_effects() {
        let mut variables = RefStore::new();
        let v0 = variables.push(var("v0", 2));
        let mut operators = RefStore::new();
        operators.push(Operator {
            name: "bad".into(),
            preconditions: vec![],
            effects: vec![
                Effect {
                    fact: Fact::new(v0, 0),
                    precondition_value: None,
                    conditions: vec![],
                },
                Effect {
                    fact: Fact::new(v0, 1),
                    precondition_value: None,
                    conditions: vec![],
                },
            ],
            cost: 1,
        });
        let result = Task::new(
            variables,
            operators,
            RefStore::new(),
            vec![],
            vec![0],
            vec![],
            false,
        );
        assert!(result.is_err());
    }

    #[test]
    fn accepts_well_formed_task() {
        let mut variables = RefStore::new();
        let v0 = variables.push(var("v0", 2));
        let mut operators = RefStore::new();
        operators.push(Operator {
            name: "op".into(),
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
            vec![0],
            vec![Fact::new(v0, 1)],
            false,
        )
        .unwrap();
        assert_eq!(task.num_variables(), 1);
    }
}
