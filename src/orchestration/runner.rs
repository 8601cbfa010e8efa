//! External collaborator contracts: the execution runner that performs an
//! agent's attempt at a task, and the credential validator consulted before
//! admitting an agent into a fan-out.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::TaskRecord;

/// What the runner needs to execute one attempt.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub agent_id: Uuid,
    pub task_title: Option<String>,
    pub task_description: String,
    pub task_type: String,
    pub attachments: Option<Vec<String>>,
}

impl ExecutionRequest {
    pub fn for_task(agent_id: Uuid, task: &TaskRecord) -> Self {
        Self {
            agent_id,
            task_title: task.title.clone(),
            task_description: task.description.clone(),
            task_type: task.task_type.clone(),
            attachments: task.attachments.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerStatus {
    Completed,
    Failed,
}

/// Terminal report of one runner attempt. A runner may fail either by
/// returning `status = Failed` or by erroring out of `execute`; callers treat
/// both as "this agent's attempt failed", never as fatal to the fan-out.
#[derive(Debug, Clone)]
pub struct RunnerOutcome {
    pub run_id: String,
    pub status: RunnerStatus,
    pub content: Option<String>,
    pub preview: Option<String>,
    pub url: Option<String>,
    pub error: Option<String>,
}

#[async_trait]
pub trait ExecutionRunner: Send + Sync {
    async fn execute(&self, request: ExecutionRequest) -> anyhow::Result<RunnerOutcome>;
}

/// Result of a credential check for one agent.
#[derive(Debug, Clone)]
pub struct CredentialCheck {
    pub valid: bool,
    pub error: Option<String>,
}

#[async_trait]
pub trait CredentialValidator: Send + Sync {
    async fn validate(&self, agent_id: Uuid) -> anyhow::Result<CredentialCheck>;
}
