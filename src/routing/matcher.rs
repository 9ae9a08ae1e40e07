//! Rule selection.
//!
//! # Responsibilities
//! - Exact path + method matching over active rules
//! - Highest priority wins; ties break to the lowest rule id
//!
//! # Design Decisions
//! - Deterministic selection is an invariant, not a nicety: two rules at
//!   equal priority must route identically on every request
//! - Inactive rules never participate, whatever their priority

use crate::store::model::{HttpMethod, RoutingRule};

/// Pick the winning rule among candidates for one inbound request.
/// Candidates are re-filtered here so the function is safe against a store
/// that returns a broader set than asked for.
pub fn select_rule<'a>(
    rules: &'a [RoutingRule],
    path: &str,
    method: HttpMethod,
) -> Option<&'a RoutingRule> {
    rules
        .iter()
        .filter(|r| r.active && r.method == method && r.path == path)
        .max_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                // Equal priority: the lower id must win, so it compares
                // as the greater candidate.
                .then_with(|| b.id.cmp(&a.id))
        })
}
