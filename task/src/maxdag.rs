//! §4.2 MaxDAG: greedy arc-removal ordering within a non-singleton SCC, biased
//! towards ordering goal variables late.

use crate::causal_graph::CausalGraph;
use crate::ids::VarId;
use sas_env_param::EnvParam;
use std::collections::HashSet;

/// Additive bonus applied to edges whose target is a goal variable, before the
/// bonus is stripped again after the node is removed. Externalized per the
/// Open Question in spec.md §9 ("a magic constant that is then stripped").
pub static MAXDAG_GOAL_BIAS: EnvParam<i64> = EnvParam::new("SAS_MAXDAG_GOAL_BIAS", "100000");

/// Orders the variables of a single non-singleton SCC by repeatedly removing the
/// node with minimal total incoming weight (within the SCC), appending it next in
/// the order. Ties broken by insertion order (i.e. the order `scc` was given in).
pub fn order_within_scc(scc: &[VarId], cg: &CausalGraph, goal_vars: &HashSet<VarId>) -> Vec<VarId> {
    let bias = MAXDAG_GOAL_BIAS.get();
    let n = scc.len();
    if n <= 1 {
        return scc.to_vec();
    }
    let index_of: std::collections::HashMap<VarId, usize> =
        scc.iter().enumerate().map(|(i, &v)| (v, i)).collect();

    // in_weight[i] = sum over j in remaining SCC of weight(j -> scc[i]), plus bias
    // if scc[i] is a goal variable and the edge (j -> scc[i]) exists.
    let mut in_weight = vec![0i64; n];
    for (i, &target) in scc.iter().enumerate() {
        for (j, &source) in scc.iter().enumerate() {
            if i == j {
                continue;
            }
            let w = cg.weight(source, target) as i64;
            if w > 0 {
                let goal_bonus = if goal_vars.contains(&target) { bias } else { 0 };
                in_weight[i] += w + goal_bonus;
            }
        }
    }

    let mut removed = vec![false; n];
    let mut order: Vec<VarId> = Vec::with_capacity(n);
    for _ in 0..n {
        // Pick the not-yet-removed node with minimal in_weight; ties -> first in
        // insertion (scc) order.
        let mut best: Option<usize> = None;
        for i in 0..n {
            if removed[i] {
                continue;
            }
            match best {
                None => best = Some(i),
                Some(b) => {
                    if in_weight[i] < in_weight[b] {
                        best = Some(i);
                    }
                }
            }
        }
        let best = best.unwrap();
        removed[best] = true;
        order.push(scc[best]);
        // Remove outgoing edges from `best` to remaining nodes (including bias).
        for (j, &target) in scc.iter().enumerate() {
            if removed[j] || j == best {
                continue;
            }
            let w = cg.weight(scc[best], target) as i64;
            if w > 0 {
                let goal_bonus = if goal_vars.contains(&target) { bias } else { 0 };
                in_weight[j] -= w + goal_bonus;
            }
        }
    }
    debug_assert_eq!(order.len(), n);
    let _ = index_of;
    order
}
