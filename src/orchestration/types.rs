//! Result and summary types shared across the orchestration coordinators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::models::Agent;
use crate::state_machine::{ExecutionStatus, OrderStatus};

/// Which side of the order the caller claims to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingRole {
    Creator,
    Provider,
}

/// Handshake details returned when a pairing is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairingInfo {
    pub provider_id: Uuid,
    pub pairing_created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of accepting or rejecting a pairing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairingResolution {
    pub order_id: Uuid,
    pub status: OrderStatus,
}

/// Result of one expiration sweep. `processed_count` counts every expired
/// pairing the sweep attempted; `expired_order_ids` lists the ones that were
/// cleared successfully (per-item failures are logged and omitted).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpirationSweep {
    pub processed_count: usize,
    pub expired_order_ids: Vec<Uuid>,
}

/// Result of one queue-drain attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrainOutcome {
    pub consumed: bool,
    pub order_id: Option<Uuid>,
    pub pairing: Option<PairingInfo>,
}

impl DrainOutcome {
    pub fn nothing() -> Self {
        Self {
            consumed: false,
            order_id: None,
            pairing: None,
        }
    }

    pub fn consumed(order_id: Uuid, pairing: PairingInfo) -> Self {
        Self {
            consumed: true,
            order_id: Some(order_id),
            pairing: Some(pairing),
        }
    }
}

/// Result of the legacy single-agent selection path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum MatchOutcome {
    /// The agent was idle; a pairing handshake was opened.
    Pairing {
        order_id: Uuid,
        agent_id: Uuid,
        status: OrderStatus,
        pairing: PairingInfo,
    },
    /// The agent was occupied; the order took a queue slot.
    Queued {
        order_id: Uuid,
        agent_id: Uuid,
        /// 1-based FIFO position of this order in the agent's queue
        queue_position: usize,
        queued_count: i64,
        capacity: i64,
    },
}

/// One execution dispatched by `auto_match`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLaunch {
    pub execution_id: Uuid,
    pub agent_id: Uuid,
    pub status: ExecutionStatus,
}

/// Result of the parallel-execution match flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelMatchResult {
    pub order_id: Uuid,
    pub executions: Vec<ExecutionLaunch>,
}

/// Fan-in summary produced once every execution of a fan-out is terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanoutSummary {
    pub order_id: Uuid,
    pub completed: usize,
    pub failed: usize,
}

/// Completion signal for a fan-out: resolves when all executions are terminal
/// and the order has been moved into its selection phase.
pub type FanoutHandle = JoinHandle<FanoutSummary>;

/// Ranked candidate annotated with live queue occupancy, for display only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateView {
    pub agent: Agent,
    pub queued_count: i64,
    pub capacity: i64,
    pub available: i64,
}

/// Result of applying an execution selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionOutcome {
    pub selected: Vec<Uuid>,
    pub rejected: Vec<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_outcome_serializes_with_result_tag() {
        let outcome = MatchOutcome::Queued {
            order_id: Uuid::nil(),
            agent_id: Uuid::nil(),
            queue_position: 2,
            queued_count: 2,
            capacity: 5,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["result"], "queued");
        assert_eq!(json["queue_position"], 2);
    }
}
