use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state_machine::ExecutionStatus;

/// Result payload recorded when a runner attempt finishes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub run_id: Option<String>,
    pub content: Option<String>,
    pub preview: Option<String>,
    pub url: Option<String>,
    pub error: Option<String>,
}

/// Execution is one agent's attempt at an order during parallel-execution
/// mode. Created in a batch when the order enters `Executing`; mutated by the
/// runner loop and by the selection step; never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub id: Uuid,
    pub order_id: Uuid,
    pub agent_id: Uuid,
    pub status: ExecutionStatus,
    pub result: ExecutionResult,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// New execution for batch creation (without generated fields)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExecution {
    pub order_id: Uuid,
    pub agent_id: Uuid,
}

impl Execution {
    pub fn new(new_execution: NewExecution) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id: new_execution.order_id,
            agent_id: new_execution.agent_id,
            status: ExecutionStatus::Pending,
            result: ExecutionResult::default(),
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_execution_is_pending() {
        let execution = Execution::new(NewExecution {
            order_id: Uuid::new_v4(),
            agent_id: Uuid::new_v4(),
        });
        assert_eq!(execution.status, ExecutionStatus::Pending);
        assert_eq!(execution.result, ExecutionResult::default());
        assert!(execution.started_at.is_none());
        assert!(execution.finished_at.is_none());
    }
}
