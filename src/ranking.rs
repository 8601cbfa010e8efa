//! Deterministic multi-criteria ordering of candidate agents.
//!
//! The order is total and the sort is stable: agents equal on every criterion
//! keep their relative input order. No I/O, no randomness, input untouched.

use std::cmp::Ordering;

use crate::models::Agent;

/// Sort class for the cached status projection; unknown sorts last.
fn status_class(agent: &Agent) -> u8 {
    agent.status.map_or(3, |s| s.rank_class())
}

fn compare(a: &Agent, b: &Agent) -> Ordering {
    status_class(a)
        .cmp(&status_class(b))
        .then_with(|| {
            // Higher rating first; NaN ratings sort after any real rating
            b.avg_rating
                .partial_cmp(&a.avg_rating)
                .unwrap_or_else(|| a.avg_rating.is_nan().cmp(&b.avg_rating.is_nan()))
        })
        .then_with(|| b.completed_order_count.cmp(&a.completed_order_count))
        .then_with(|| a.queue_size.cmp(&b.queue_size))
        .then_with(|| a.created_at.cmp(&b.created_at))
}

/// Rank candidate agents: idle before busy before queueing before unknown,
/// then rating descending, completed-order count descending, queue size
/// ascending, registration time ascending.
pub fn rank_agents(agents: &[Agent]) -> Vec<Agent> {
    let mut ranked = agents.to_vec();
    ranked.sort_by(compare);
    ranked
}
