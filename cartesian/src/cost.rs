//! Saturating integer costs used by abstract search and cost saturation.
//!
//! `Cost` must represent both ordinary non-negative operator costs and the
//! signed, possibly-negative "remaining cost" entries cost saturation leaves
//! behind for later components (spec.md §4.14).

pub type Cost = i64;

pub const INFINITE_COST: Cost = i64::MAX;
pub const NEG_INFINITE_COST: Cost = i64::MIN;

/// `a + b` using the `INF + finite = INF`, `-INF + finite = -INF` convention;
/// `INF + -INF` never arises in this algorithm (spec.md §4.14 callers only add
/// a finite delta to an existing extreme value, never combine both extremes).
pub fn saturating_add(a: Cost, b: Cost) -> Cost {
    if a == INFINITE_COST || b == INFINITE_COST {
        INFINITE_COST
    } else if a == NEG_INFINITE_COST || b == NEG_INFINITE_COST {
        NEG_INFINITE_COST
    } else {
        a.saturating_add(b)
    }
}

/// `a - b` under the same convention, used to deduct a saturated cost from the
/// remaining-cost vector.
pub fn saturating_sub(a: Cost, b: Cost) -> Cost {
    if a == INFINITE_COST {
        INFINITE_COST
    } else if b == NEG_INFINITE_COST {
        // subtracting -INF elevates the result to INF (spec.md §4.14: "sat =
        // -INF elevates remaining to INF meaning unused thereafter").
        INFINITE_COST
    } else if b == INFINITE_COST {
        NEG_INFINITE_COST
    } else {
        a.saturating_sub(b)
    }
}
