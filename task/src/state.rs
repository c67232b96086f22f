//! §4.6 Concrete state and state transition.

use crate::ids::{OpId, Value, VarId};
use crate::model::{Effect, Operator, Task};
use anyhow::{bail, Result};

/// A fully-assigned state: one value per variable, indexed by `VarId`.
pub type State = Vec<Value>;

fn effect_fires(effect: &Effect, state: &State) -> bool {
    if let Some(pre) = effect.precondition_value {
        if state[usize::from(effect.fact.var)] != pre {
            return false;
        }
    }
    effect.conditions.iter().all(|c| state[usize::from(c.var)] == c.value)
}

/// Applies the effects of every firing effect of `operator` to `state`, without
/// touching derived variables via axioms. Panics on simultaneous conflicting
/// writes to the same variable (§7: an invariant violation, not a runtime error
/// a caller can recover from — operators are validated not to do this at
/// construction time, so this indicates a bug upstream).
fn apply_operator(operator: &Operator, state: &mut State) {
    let mut writes: Vec<(VarId, Value)> = Vec::new();
    for effect in &operator.effects {
        if effect_fires(effect, state) {
            writes.push((effect.fact.var, effect.fact.value));
        }
    }
    for (i, &(var, value)) in writes.iter().enumerate() {
        for &(other_var, other_value) in &writes[i + 1..] {
            assert!(
                var != other_var || value == other_value,
                "operator '{}' fired two effects writing different values to variable {:?} in the same step",
                operator.name,
                var
            );
        }
    }
    for (var, value) in writes {
        state[usize::from(var)] = value;
    }
}

/// Repeatedly applies firing axioms in stratification-layer order until no axiom
/// changes the state (§4.6 stratified fixed-point evaluation). Axioms within the
/// same layer are applied in an outer fixed-point loop too, since one axiom's
/// effect may be another same-layer axiom's condition.
///
/// Every derived variable is reset to its default value before the layers run:
/// a derived variable keeps whatever value it held in the parent state, but
/// that value is only valid for as long as the condition that produced it still
/// holds, so it must be re-derived from scratch rather than carried forward.
fn evaluate_axioms(task: &Task, state: &mut State) {
    for (var_id, variable) in task.variables.entries() {
        if variable.axiom_layer != -1 {
            state[usize::from(var_id)] = variable.default_value;
        }
    }

    let mut layers: Vec<i32> = task
        .axioms
        .entries()
        .map(|(_, ax)| task.variables[ax.effect_var].axiom_layer)
        .collect();
    layers.sort_unstable();
    layers.dedup();

    for layer in layers {
        loop {
            let mut changed = false;
            for (_, ax) in task.axioms.entries() {
                if task.variables[ax.effect_var].axiom_layer != layer {
                    continue;
                }
                if state[usize::from(ax.effect_var)] != ax.old_value {
                    continue;
                }
                if ax.conditions.iter().all(|c| state[usize::from(c.var)] == c.value) {
                    state[usize::from(ax.effect_var)] = ax.new_value;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
    }
}

/// Applies `op`'s effects to `state` and, if the task declares axioms,
/// re-evaluates them to a fixed point afterwards (§4.6).
pub fn successor(task: &Task, op: OpId, state: &State) -> State {
    let mut next = state.clone();
    apply_operator(&task.operators[op], &mut next);
    if task.has_axioms() {
        evaluate_axioms(task, &mut next);
    }
    next
}

/// The axiom-unaware entry point: fails explicitly rather than silently
/// dropping axiom effects (spec.md §9 Open Question resolution).
pub fn successor_simple(task: &Task, op: OpId, state: &State) -> Result<State> {
    if task.has_axioms() {
        bail!("task declares axioms; use `successor`, not the axiom-unaware entry point");
    }
    let mut next = state.clone();
    apply_operator(&task.operators[op], &mut next);
    Ok(next)
}
