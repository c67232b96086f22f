//! §4.16 Heuristic façade: sums per-component Cartesian distances, reporting
//! a dead end if any component does.

use crate::abstract_search::AbstractSearch;
use crate::abstraction::Abstraction;
use crate::cost::{saturating_add, Cost, INFINITE_COST};
use sas_task::ids::Value;

/// One retained CEGAR abstraction paired with its cached abstract distances,
/// evaluable on any concrete state via the refinement hierarchy.
pub struct ComponentHeuristic<'a> {
    abstraction: Abstraction<'a>,
    search: AbstractSearch,
}

impl<'a> ComponentHeuristic<'a> {
    pub fn new(abstraction: Abstraction<'a>, search: AbstractSearch) -> Self {
        ComponentHeuristic { abstraction, search }
    }

    pub fn value(&self, concrete_state: &[Value]) -> Cost {
        let abstract_state = self.abstraction.lookup(concrete_state);
        self.search.h_value(abstract_state)
    }
}

/// The additive combination of several `ComponentHeuristic`s: a single
/// estimate equal to the sum of the components' values, or `None` for a
/// state any component proves is a dead end.
pub struct CartesianHeuristic<'a> {
    components: Vec<ComponentHeuristic<'a>>,
}

impl<'a> CartesianHeuristic<'a> {
    pub fn new(components: Vec<ComponentHeuristic<'a>>) -> Self {
        CartesianHeuristic { components }
    }

    pub fn estimate(&self, concrete_state: &[Value]) -> Option<Cost> {
        let mut total: Cost = 0;
        for component in &self.components {
            let v = component.value(concrete_state);
            if v == INFINITE_COST {
                return None;
            }
            total = saturating_add(total, v);
        }
        Some(total)
    }
}
