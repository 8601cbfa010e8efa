use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state_machine::QueueItemStatus;

/// QueueItem reserves one slot of an agent's capacity for one order.
///
/// At most one row with status `Queued` exists per (agent_id, order_id) pair;
/// a row transitions exactly once, to `Consumed` or `Canceled`, and an order
/// is never re-queued on the same item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub order_id: Uuid,
    pub status: QueueItemStatus,
    pub created_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
}

/// New queue item for creation (without generated fields)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQueueItem {
    pub agent_id: Uuid,
    pub order_id: Uuid,
}

impl QueueItem {
    pub fn new(new_item: NewQueueItem) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id: new_item.agent_id,
            order_id: new_item.order_id,
            status: QueueItemStatus::Queued,
            created_at: Utc::now(),
            consumed_at: None,
            canceled_at: None,
        }
    }

    pub fn is_queued(&self) -> bool {
        self.status == QueueItemStatus::Queued
    }
}
