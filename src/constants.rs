//! # System Constants
//!
//! Operational limits of the matching core and the event names published on
//! the lifecycle bus. The numeric limits are defaults; `MatchConfig` can
//! override each of them per deployment.

/// Lifecycle events published while matching, pairing and executing
pub mod events {
    // Pairing handshake events
    pub const PAIRING_CREATED: &str = "pairing.created";
    pub const PAIRING_ACCEPTED: &str = "pairing.accepted";
    pub const PAIRING_REJECTED: &str = "pairing.rejected";
    pub const PAIRING_EXPIRED: &str = "pairing.expired";

    // Queue events
    pub const QUEUE_ITEM_ENQUEUED: &str = "queue.item_enqueued";
    pub const QUEUE_ITEM_CLAIMED: &str = "queue.item_claimed";
    pub const QUEUE_ITEM_CANCELED: &str = "queue.item_canceled";

    // Parallel execution events
    pub const EXECUTION_FANOUT_STARTED: &str = "execution.fanout_started";
    pub const EXECUTION_FINISHED: &str = "execution.finished";
    pub const EXECUTION_FANOUT_FINISHED: &str = "execution.fanout_finished";
    pub const EXECUTION_SELECTION_APPLIED: &str = "execution.selection_applied";
}

/// System-wide default limits
pub mod defaults {
    /// Maximum queued (not yet consumed) items per agent
    pub const QUEUE_MAX_N: i64 = 5;

    /// Pairing handshake time-to-live in seconds
    pub const PAIRING_TTL_SECONDS: u64 = 600;

    /// Number of agents selected for parallel execution
    pub const FANOUT_SIZE: usize = 3;

    /// Size of the ranked pool the fan-out selection draws from
    pub const CANDIDATE_POOL_SIZE: usize = 15;

    /// Minimum eligible candidates required before auto-matching
    pub const MIN_CANDIDATES: usize = 3;

    /// Broadcast capacity of the lifecycle event channel
    pub const EVENT_CHANNEL_CAPACITY: usize = 1000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fanout_pool_is_larger_than_fanout() {
        assert!(defaults::CANDIDATE_POOL_SIZE >= defaults::FANOUT_SIZE);
        assert!(defaults::MIN_CANDIDATES >= defaults::FANOUT_SIZE);
    }

    #[test]
    fn test_event_names_are_namespaced() {
        for name in [
            events::PAIRING_CREATED,
            events::QUEUE_ITEM_CLAIMED,
            events::EXECUTION_FANOUT_FINISHED,
        ] {
            assert!(name.contains('.'));
        }
    }
}
