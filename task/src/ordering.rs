//! §4.2 (cont'd): combines SCC decomposition, MaxDAG intra-SCC ordering and
//! goal-relevance pruning into the final pseudo-topological variable order.

use crate::causal_graph::CausalGraph;
use crate::ids::VarId;
use crate::maxdag::order_within_scc;
use crate::model::{Fact, Task};
use crate::scc::tarjan_sccs;
use std::collections::HashSet;

/// Result of the ordering pass: the pseudo-topological order of *all* variables
/// (condensation order, MaxDAG-refined within SCCs), and the set of variables
/// marked necessary by backward reachability from the goal.
pub struct Ordering {
    pub order: Vec<VarId>,
    pub necessary: HashSet<VarId>,
}

fn goal_vars(goal: &[Fact]) -> HashSet<VarId> {
    goal.iter().map(|f| f.var).collect()
}

/// Backward reachability from the goal over the predecessor graph: a variable is
/// necessary if it lies on some path in the predecessor graph starting at a goal
/// variable (spec.md §4.2 "Relevance pruning").
fn relevant_variables(cg: &CausalGraph, goals: &HashSet<VarId>) -> HashSet<VarId> {
    let mut necessary: HashSet<VarId> = HashSet::new();
    let mut stack: Vec<VarId> = goals.iter().copied().collect();
    for &g in goals.iter() {
        necessary.insert(g);
    }
    while let Some(v) = stack.pop() {
        for &p in &cg.predecessors[usize::from(v)] {
            if necessary.insert(p) {
                stack.push(p);
            }
        }
    }
    necessary
}

/// Computes the pseudo-topological order over `cg`'s condensation, using MaxDAG
/// inside each non-singleton SCC, biased towards the task's goal facts.
pub fn compute_order(task: &Task, cg: &CausalGraph) -> Vec<VarId> {
    let goals = goal_vars(&task.goal);
    let sccs = tarjan_sccs(cg);
    let mut order = Vec::with_capacity(cg.num_variables());
    for scc in &sccs {
        if scc.len() <= 1 {
            order.extend_from_slice(scc);
        } else {
            order.extend(order_within_scc(scc, cg, &goals));
        }
    }
    order
}

/// Full ordering pass: condensation order plus (if `prune` is set) relevance-based
/// filtering. Returns the order restricted to necessary variables when pruning is
/// enabled, or the full order (all flagged necessary) when it is disabled.
pub fn build_ordering(task: &Task, cg: &CausalGraph, prune: bool) -> Ordering {
    let full_order = compute_order(task, cg);
    let goals = goal_vars(&task.goal);
    let necessary = if prune {
        relevant_variables(cg, &goals)
    } else {
        (0..cg.num_variables()).map(VarId::from).collect()
    };
    let order = if prune {
        full_order.into_iter().filter(|v| necessary.contains(v)).collect()
    } else {
        full_order
    };
    Ordering { order, necessary }
}
