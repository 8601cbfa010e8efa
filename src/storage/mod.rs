//! # Storage Contract
//!
//! The matching core pushes all coordination into the backing store: the
//! per-agent queue's idempotent enqueue and single-winner claim, unique
//! constraints, and fresh counts for derived agent state. `MatchStore` is the
//! one seam a backend implements; the in-memory backend serves tests and the
//! PostgreSQL backend serves production.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Agent, Execution, Order, QueueItem, TaskRecord};
use crate::state_machine::{AgentStatus, ExecutionStatus, TaskStatus};

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Store-level failures. `NotFound` and `UniqueViolation` are distinguishable
/// from generic backend errors because callers branch on them: a missing row
/// is often an expected "nothing to do", and a uniqueness violation on
/// enqueue means "someone else already enqueued it", not a failure.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{entity} {id} not found in store")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StorageError>;

/// Repository contract consumed by every coordinator in this core.
///
/// Queue semantics (the hard part):
/// - `enqueue` is idempotent per (agent, order): a second call while a
///   `Queued` row exists returns that row instead of inserting.
/// - `list_queued`/`queued_count` cover `Queued` rows only, FIFO by
///   `created_at`.
/// - `atomic_claim_next` is single-winner: under concurrent callers for the
///   same agent at most one receives a given item, the oldest remaining
///   `Queued` item wins, and the Queued -> Consumed transition is indivisible
///   with the claim. Losers get `None` immediately (skip-locked semantics),
///   never an error, and a repeated claim never returns the same item.
/// - `cancel_queued` is idempotent: it reports whether a `Queued` row was
///   actually canceled and is a no-op returning `false` when none matches.
#[async_trait]
pub trait MatchStore: Send + Sync {
    // --- orders ---
    async fn insert_order(&self, order: &Order) -> StoreResult<()>;
    async fn get_order(&self, order_id: Uuid) -> StoreResult<Option<Order>>;
    async fn find_order_by_task(&self, task_id: Uuid) -> StoreResult<Option<Order>>;
    async fn update_order(&self, order: &Order) -> StoreResult<()>;
    /// Fresh count of in-progress orders bound to the agent; source of truth
    /// for the busy projection.
    async fn count_in_progress_orders(&self, agent_id: Uuid) -> StoreResult<i64>;
    /// Orders still in `Pairing` whose handshake started before `cutoff`.
    async fn find_expired_pairings(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Order>>;

    // --- agents ---
    async fn insert_agent(&self, agent: &Agent) -> StoreResult<()>;
    async fn get_agent(&self, agent_id: Uuid) -> StoreResult<Option<Agent>>;
    async fn list_listed_agents(&self) -> StoreResult<Vec<Agent>>;
    /// Overwrite the cached projection fields in one write.
    async fn update_agent_projection(
        &self,
        agent_id: Uuid,
        status: Option<AgentStatus>,
        queue_size: i64,
        current_order_id: Option<Uuid>,
    ) -> StoreResult<()>;

    // --- queue ---
    async fn enqueue(&self, agent_id: Uuid, order_id: Uuid) -> StoreResult<QueueItem>;
    async fn list_queued(&self, agent_id: Uuid) -> StoreResult<Vec<QueueItem>>;
    async fn queued_count(&self, agent_id: Uuid) -> StoreResult<i64>;
    async fn atomic_claim_next(&self, agent_id: Uuid) -> StoreResult<Option<QueueItem>>;
    async fn cancel_queued(&self, agent_id: Uuid, order_id: Uuid) -> StoreResult<bool>;

    // --- executions ---
    async fn insert_executions(&self, executions: &[Execution]) -> StoreResult<()>;
    async fn get_execution(&self, execution_id: Uuid) -> StoreResult<Option<Execution>>;
    async fn list_executions_for_order(&self, order_id: Uuid) -> StoreResult<Vec<Execution>>;
    async fn update_execution(&self, execution: &Execution) -> StoreResult<()>;
    /// Batch status update, one write for the whole id set.
    async fn mark_executions(&self, ids: &[Uuid], status: ExecutionStatus) -> StoreResult<()>;

    // --- tasks ---
    async fn insert_task(&self, task: &TaskRecord) -> StoreResult<()>;
    async fn get_task(&self, task_id: Uuid) -> StoreResult<Option<TaskRecord>>;
    async fn set_task_status(&self, task_id: Uuid, status: TaskStatus) -> StoreResult<()>;
}
