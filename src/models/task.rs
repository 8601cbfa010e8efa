use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state_machine::TaskStatus;

/// TaskRecord is the customer-facing task whose status mirrors the order
/// lifecycle. The matching core only reads its descriptive fields (handed to
/// the execution runner) and writes the status mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub title: Option<String>,
    pub description: String,
    pub task_type: String,
    /// Reward, minimum-denomination integer string
    pub reward: String,
    pub attachments: Option<Vec<String>>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New task for creation (without generated fields)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub creator_id: Uuid,
    pub title: Option<String>,
    pub description: String,
    pub task_type: String,
    pub reward: String,
    pub attachments: Option<Vec<String>>,
}

impl TaskRecord {
    pub fn new(new_task: NewTask) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            creator_id: new_task.creator_id,
            title: new_task.title,
            description: new_task.description,
            task_type: new_task.task_type,
            reward: new_task.reward,
            attachments: new_task.attachments,
            status: TaskStatus::Published,
            created_at: now,
            updated_at: now,
        }
    }
}
