//! Data layer for the matching core: orders, agents, queue reservations,
//! executions and the mirrored task record.

pub mod agent;
pub mod execution;
pub mod order;
pub mod queue_item;
pub mod task;

pub use agent::{Agent, NewAgent};
pub use execution::{Execution, ExecutionResult, NewExecution};
pub use order::{NewOrder, Order};
pub use queue_item::{NewQueueItem, QueueItem};
pub use task::{NewTask, TaskRecord};
