use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state_machine::{ExecutionPhase, OrderStatus};

/// Order represents one unit of work derived from a customer task.
///
/// Created when the task's payment is confirmed; never deleted afterwards
/// (cancellation is a status, not a deletion). `agent_id`/`provider_id` are
/// non-null exactly while the order is engaged with an agent or while
/// executions reference it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub task_id: Uuid,
    pub creator_id: Uuid,
    pub provider_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
    pub status: OrderStatus,
    pub pairing_created_at: Option<DateTime<Utc>>,
    pub execution_phase: Option<ExecutionPhase>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New order for creation (without generated fields)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub task_id: Uuid,
    pub creator_id: Uuid,
}

impl Order {
    pub fn new(new_order: NewOrder) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            task_id: new_order.task_id,
            creator_id: new_order.creator_id,
            provider_id: None,
            agent_id: None,
            status: OrderStatus::Standby,
            pairing_created_at: None,
            execution_phase: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record the pairing handshake fields on the order.
    pub fn bind_pairing(&mut self, agent_id: Uuid, provider_id: Uuid, at: DateTime<Utc>) {
        self.agent_id = Some(agent_id);
        self.provider_id = Some(provider_id);
        self.pairing_created_at = Some(at);
        self.status = OrderStatus::Pairing;
        self.updated_at = at;
    }

    /// Clear the handshake fields, returning the order to standby.
    pub fn clear_pairing(&mut self) {
        self.agent_id = None;
        self.provider_id = None;
        self.pairing_created_at = None;
        self.status = OrderStatus::Standby;
        self.updated_at = Utc::now();
    }
}
