use serde::{Deserialize, Serialize};
use std::fmt;

/// Order lifecycle states
///
/// `Standby` through `Selecting` belong to the matching core; `Completed` and
/// `Cancelled` are owned by the settlement layer but are modeled here so they
/// can be rejected as transition sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Payment confirmed, waiting to be matched with an agent
    Standby,
    /// Agent selected, acceptance handshake in flight
    Pairing,
    /// Handshake accepted, single agent working the order
    InProgress,
    /// Parallel fan-out mode, several agents working the order
    Executing,
    /// All executions terminal, creator picking results
    Selecting,
    /// Order settled successfully
    Completed,
    /// Order cancelled
    Cancelled,
}

impl OrderStatus {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Check if the order currently binds an agent (or a set of executions)
    pub fn is_engaged(&self) -> bool {
        matches!(
            self,
            Self::Pairing | Self::InProgress | Self::Executing | Self::Selecting
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standby => write!(f, "standby"),
            Self::Pairing => write!(f, "pairing"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Executing => write!(f, "executing"),
            Self::Selecting => write!(f, "selecting"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standby" => Ok(Self::Standby),
            "pairing" => Ok(Self::Pairing),
            "in_progress" => Ok(Self::InProgress),
            "executing" => Ok(Self::Executing),
            "selecting" => Ok(Self::Selecting),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid order status: {s}")),
        }
    }
}

/// Phase marker for orders in parallel-execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPhase {
    Executing,
    Selecting,
    Completed,
}

impl fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Executing => write!(f, "executing"),
            Self::Selecting => write!(f, "selecting"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for ExecutionPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "executing" => Ok(Self::Executing),
            "selecting" => Ok(Self::Selecting),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("Invalid execution phase: {s}")),
        }
    }
}

/// Task status mirror maintained alongside the order lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Draft,
    Published,
    Pairing,
    InProgress,
    Executing,
    Selecting,
    Completed,
    Cancelled,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Published => write!(f, "published"),
            Self::Pairing => write!(f, "pairing"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Executing => write!(f, "executing"),
            Self::Selecting => write!(f, "selecting"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            "pairing" => Ok(Self::Pairing),
            "in_progress" => Ok(Self::InProgress),
            "executing" => Ok(Self::Executing),
            "selecting" => Ok(Self::Selecting),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid task status: {s}")),
        }
    }
}

/// Derived agent availability class
///
/// Always recomputable from "has an in-progress order" x "queue non-empty";
/// the persisted copy on `Agent` is a read-side cache only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Busy,
    Queueing,
}

impl AgentStatus {
    /// Sort class used by the ranker; unknown (None) ranks after all of these
    pub fn rank_class(&self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Busy => 1,
            Self::Queueing => 2,
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Busy => write!(f, "busy"),
            Self::Queueing => write!(f, "queueing"),
        }
    }
}

impl std::str::FromStr for AgentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "busy" => Ok(Self::Busy),
            "queueing" => Ok(Self::Queueing),
            _ => Err(format!("Invalid agent status: {s}")),
        }
    }
}

/// Queue item states; `Queued` is the only non-terminal one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueItemStatus {
    Queued,
    Consumed,
    Canceled,
}

impl QueueItemStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Consumed | Self::Canceled)
    }
}

impl fmt::Display for QueueItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Consumed => write!(f, "consumed"),
            Self::Canceled => write!(f, "canceled"),
        }
    }
}

impl std::str::FromStr for QueueItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "consumed" => Ok(Self::Consumed),
            "canceled" => Ok(Self::Canceled),
            _ => Err(format!("Invalid queue item status: {s}")),
        }
    }
}

/// Per-agent execution attempt states during parallel fan-out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Selected,
    Rejected,
}

impl ExecutionStatus {
    /// Terminal from the fan-out barrier's point of view: the runner is done
    /// with this attempt, successfully or not.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Selected => write!(f, "selected"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "selected" => Ok(Self::Selected),
            "rejected" => Ok(Self::Rejected),
            _ => Err(format!("Invalid execution status: {s}")),
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        Self::Standby
    }
}

impl Default for ExecutionStatus {
    fn default() -> Self {
        Self::Pending
    }
}
