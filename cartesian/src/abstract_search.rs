//! §4.10 Abstract search: A* over one abstraction's transition system,
//! caching a monotone heuristic estimate per abstract state across
//! refinement iterations.

use crate::abstraction::Abstraction;
use crate::cost::{saturating_add, saturating_sub, Cost, INFINITE_COST};
use crate::ids::AbstractStateId;
use sas_collections::heap::IdxHeap;
use sas_collections::ref_store::RefMap;
use sas_collections::set::RefSet;
use sas_task::ids::OpId;

/// One shortest abstract path from an abstraction's initial state to some
/// goal state.
pub struct Solution {
    /// `(from, op, to)` triples, in order from the initial state to a goal state.
    pub path: Vec<(AbstractStateId, OpId, AbstractStateId)>,
    pub cost: Cost,
}

/// Caches admissible distance-to-goal estimates per abstract state. Values
/// only ever increase across calls (spec.md §4.10): once a round of search
/// proves a lower bound, later, more refined abstractions can only agree or
/// raise it.
#[derive(Default)]
pub struct AbstractSearch {
    h_values: RefMap<AbstractStateId, Cost>,
}

impl AbstractSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn h_value(&self, s: AbstractStateId) -> Cost {
        self.h_values.get(s).copied().unwrap_or(0)
    }

    fn raise_h_value(&mut self, s: AbstractStateId, value: Cost) {
        if value > self.h_value(s) {
            self.h_values.insert(s, value);
        }
    }

    /// Finds a cheapest path from `abstraction`'s initial state to any goal
    /// state, under `op_costs` (indexed by `OpId`, as the operator's current
    /// remaining cost — §4.14 cost saturation drives this down over time).
    /// Returns `None` if the abstraction's initial state cannot reach any
    /// goal state at all, in which case every explored state is marked as a
    /// permanent dead end (`h = INFINITE_COST`).
    pub fn find_solution(&mut self, abstraction: &Abstraction, op_costs: &sas_collections::ref_store::RefVec<OpId, Cost>) -> Option<Solution> {
        let init = abstraction.init_state();
        if abstraction.is_goal_state(init) {
            return Some(Solution { path: vec![], cost: 0 });
        }

        let mut open: IdxHeap<AbstractStateId, Cost> = IdxHeap::new();
        let mut g: RefMap<AbstractStateId, Cost> = RefMap::default();
        let mut backpointer: RefMap<AbstractStateId, (AbstractStateId, OpId)> = RefMap::default();
        let mut closed: RefSet<AbstractStateId> = RefSet::new();
        let mut closed_list: Vec<AbstractStateId> = Vec::new();

        g.insert(init, 0);
        let h_init = self.h_value(init);
        open.declare_element(init, -saturating_add(0, h_init));
        open.enqueue(init);

        let mut goal_reached = None;

        while let Some(s) = open.pop() {
            if closed.contains(s) {
                continue;
            }
            closed.insert(s);
            closed_list.push(s);
            if abstraction.is_goal_state(s) {
                goal_reached = Some(s);
                break;
            }
            for &(op, t) in abstraction.outgoing(s) {
                if closed.contains(t) {
                    continue;
                }
                let new_g = saturating_add(g.get(s).copied().unwrap_or(INFINITE_COST), op_costs[op]);
                let improves = g.get(t).map_or(true, |&old| new_g < old);
                if improves {
                    g.insert(t, new_g);
                    backpointer.insert(t, (s, op));
                    let priority = -saturating_add(new_g, self.h_value(t));
                    if open.is_declared(t) {
                        open.set_priority(t, priority);
                    } else {
                        open.declare_element(t, priority);
                    }
                    open.enqueue(t);
                }
            }
        }

        let Some(goal) = goal_reached else {
            for s in closed_list {
                self.raise_h_value(s, INFINITE_COST);
            }
            return None;
        };

        let total = g[goal];
        let mut path = Vec::new();
        let mut cur = goal;
        while let Some(&(from, op)) = backpointer.get(cur) {
            path.push((from, op, cur));
            cur = from;
        }
        path.reverse();

        // Every state along the optimal path now has a known exact
        // distance-to-goal, which can only raise its cached lower bound.
        let mut remaining = total;
        self.raise_h_value(goal, 0);
        for &(from, op, to) in path.iter().rev() {
            remaining = saturating_sub(remaining, op_costs[op]);
            let _ = to;
            self.raise_h_value(from, remaining);
        }

        Some(Solution { path, cost: total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abstraction::Abstraction;
    use sas_collections::ref_store::{RefStore, RefVec};
    use sas_task::model::{Effect, Fact, Operator, Task, Variable};

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

    fn chain_task() -> Task {
        let mut variables = RefStore::new();
        let v0 = variables.push(var(3));
        let mut operators = RefStore::new();
        operators.push(Operator {
            name: "o0".into(),
            preconditions: vec![],
            effects: vec![Effect { fact: Fact::new(v0, 1), precondition_value: Some(0), conditions: vec![] }],
            cost: 1,
        });
        operators.push(Operator {
            name: "o1".into(),
            preconditions: vec![],
            effects: vec![Effect { fact: Fact::new(v0, 2), precondition_value: Some(1), conditions: vec![] }],
            cost: 1,
        });
        Task::new(variables, operators, RefStore::new(), vec![], vec![0], vec![Fact::new(v0, 2)], false).unwrap()
    }

    fn split_into_three(abs: &mut Abstraction, v0: sas_task::ids::VarId) -> (AbstractStateId, AbstractStateId, AbstractStateId) {
        use fixedbitset::FixedBitSet;
        let mut wanted = FixedBitSet::with_capacity(3);
        wanted.insert(1);
        wanted.insert(2);
        let (s0, rest) = abs.refine(abs.init_state(), v0, &wanted);
        let mut wanted2 = FixedBitSet::with_capacity(3);
        wanted2.insert(2);
        let (s1, s2) = abs.refine(rest, v0, &wanted2);
        (s0, s1, s2)
    }

    #[test]
    fn astar_finds_shortest_path_and_records_monotone_h() {
        let task = chain_task();
        let dtgs = vec![sas_task::dtg::build_dtg(&task, sas_task::ids::VarId::from(0usize))];
        let mut abs = Abstraction::new(&task, &dtgs, task.goal.clone());
        let v0 = sas_task::ids::VarId::from(0usize);
        let (s0, _s1, _s2) = split_into_three(&mut abs, v0);

        let mut costs: RefVec<sas_task::ids::OpId, Cost> = RefVec::new();
        costs.push(1);
        costs.push(1);

        let mut search = AbstractSearch::new();
        let solution = search.find_solution(&abs, &costs).expect("goal reachable");
        assert_eq!(solution.cost, 2);
        assert_eq!(solution.path.len(), 2);
        assert_eq!(search.h_value(s0), 2);
    }
}
