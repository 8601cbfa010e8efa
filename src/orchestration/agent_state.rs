//! Derived agent state.
//!
//! `Agent.status` and `Agent.queue_size` are cached projections. Everything
//! here recomputes them from fresh in-progress and queued counts; the cached
//! copies exist for read performance and are never consulted for correctness.

use tracing::warn;
use uuid::Uuid;

use crate::error::Result;
use crate::state_machine::AgentStatus;
use crate::storage::MatchStore;

/// Derive the agent's availability class from source-of-truth counts.
///
/// Lookups that fail (e.g. a dependent table not yet provisioned) default to
/// the safest reading, zero, with a warning; the caller keeps working.
pub async fn compute_agent_status(store: &dyn MatchStore, agent_id: Uuid) -> AgentStatus {
    let in_progress = match store.count_in_progress_orders(agent_id).await {
        Ok(count) => count,
        Err(e) => {
            warn!(agent_id = %agent_id, error = %e, "in-progress count unavailable, assuming 0");
            0
        }
    };
    if in_progress > 0 {
        return AgentStatus::Busy;
    }

    let queued = match store.queued_count(agent_id).await {
        Ok(count) => count,
        Err(e) => {
            warn!(agent_id = %agent_id, error = %e, "queued count unavailable, assuming 0");
            0
        }
    };
    if queued > 0 {
        AgentStatus::Queueing
    } else {
        AgentStatus::Idle
    }
}

/// Recompute and persist the agent's cached projection.
///
/// `current_order_id` is the busy binding: `Some` when an accepted pairing
/// ties the agent to an order, `None` otherwise.
pub async fn refresh_agent_projection(
    store: &dyn MatchStore,
    agent_id: Uuid,
    current_order_id: Option<Uuid>,
) -> Result<AgentStatus> {
    let status = compute_agent_status(store, agent_id).await;
    let queue_size = store.queued_count(agent_id).await.unwrap_or(0);
    store
        .update_agent_projection(agent_id, Some(status), queue_size, current_order_id)
        .await?;
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Agent, Execution, NewAgent, NewOrder, Order, QueueItem, TaskRecord};
    use crate::state_machine::{ExecutionStatus, OrderStatus, TaskStatus};
    use crate::storage::{InMemoryStore, StorageError, StoreResult};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    /// Store whose every lookup fails, for the degraded-count path.
    struct UnreachableStore;

    fn down<T>() -> StoreResult<T> {
        Err(StorageError::Backend("store unreachable".to_string()))
    }

    #[async_trait]
    impl MatchStore for UnreachableStore {
        async fn insert_order(&self, _: &Order) -> StoreResult<()> {
            down()
        }
        async fn get_order(&self, _: Uuid) -> StoreResult<Option<Order>> {
            down()
        }
        async fn find_order_by_task(&self, _: Uuid) -> StoreResult<Option<Order>> {
            down()
        }
        async fn update_order(&self, _: &Order) -> StoreResult<()> {
            down()
        }
        async fn count_in_progress_orders(&self, _: Uuid) -> StoreResult<i64> {
            down()
        }
        async fn find_expired_pairings(&self, _: DateTime<Utc>) -> StoreResult<Vec<Order>> {
            down()
        }
        async fn insert_agent(&self, _: &Agent) -> StoreResult<()> {
            down()
        }
        async fn get_agent(&self, _: Uuid) -> StoreResult<Option<Agent>> {
            down()
        }
        async fn list_listed_agents(&self) -> StoreResult<Vec<Agent>> {
            down()
        }
        async fn update_agent_projection(
            &self,
            _: Uuid,
            _: Option<AgentStatus>,
            _: i64,
            _: Option<Uuid>,
        ) -> StoreResult<()> {
            down()
        }
        async fn enqueue(&self, _: Uuid, _: Uuid) -> StoreResult<QueueItem> {
            down()
        }
        async fn list_queued(&self, _: Uuid) -> StoreResult<Vec<QueueItem>> {
            down()
        }
        async fn queued_count(&self, _: Uuid) -> StoreResult<i64> {
            down()
        }
        async fn atomic_claim_next(&self, _: Uuid) -> StoreResult<Option<QueueItem>> {
            down()
        }
        async fn cancel_queued(&self, _: Uuid, _: Uuid) -> StoreResult<bool> {
            down()
        }
        async fn insert_executions(&self, _: &[Execution]) -> StoreResult<()> {
            down()
        }
        async fn get_execution(&self, _: Uuid) -> StoreResult<Option<Execution>> {
            down()
        }
        async fn list_executions_for_order(&self, _: Uuid) -> StoreResult<Vec<Execution>> {
            down()
        }
        async fn update_execution(&self, _: &Execution) -> StoreResult<()> {
            down()
        }
        async fn mark_executions(&self, _: &[Uuid], _: ExecutionStatus) -> StoreResult<()> {
            down()
        }
        async fn insert_task(&self, _: &TaskRecord) -> StoreResult<()> {
            down()
        }
        async fn get_task(&self, _: Uuid) -> StoreResult<Option<TaskRecord>> {
            down()
        }
        async fn set_task_status(&self, _: Uuid, _: TaskStatus) -> StoreResult<()> {
            down()
        }
    }

    fn test_agent() -> Agent {
        Agent::new(NewAgent {
            owner_id: Uuid::new_v4(),
            supported_task_types: vec!["translation".to_string()],
            min_price: "1".to_string(),
            max_price: "1000".to_string(),
            is_listed: true,
        })
    }

    #[tokio::test]
    async fn test_idle_when_no_work() {
        let store = InMemoryStore::new();
        let agent = test_agent();
        store.insert_agent(&agent).await.unwrap();

        assert_eq!(compute_agent_status(&store, agent.id).await, AgentStatus::Idle);
    }

    #[tokio::test]
    async fn test_busy_beats_queueing() {
        let store = InMemoryStore::new();
        let agent = test_agent();
        store.insert_agent(&agent).await.unwrap();

        let mut order = Order::new(NewOrder {
            task_id: Uuid::new_v4(),
            creator_id: Uuid::new_v4(),
        });
        order.agent_id = Some(agent.id);
        order.status = OrderStatus::InProgress;
        store.insert_order(&order).await.unwrap();
        store.enqueue(agent.id, Uuid::new_v4()).await.unwrap();

        assert_eq!(compute_agent_status(&store, agent.id).await, AgentStatus::Busy);
    }

    #[tokio::test]
    async fn test_queueing_when_only_queue_occupied() {
        let store = InMemoryStore::new();
        let agent = test_agent();
        store.insert_agent(&agent).await.unwrap();
        store.enqueue(agent.id, Uuid::new_v4()).await.unwrap();

        assert_eq!(
            compute_agent_status(&store, agent.id).await,
            AgentStatus::Queueing
        );
    }

    #[tokio::test]
    async fn test_failing_counts_degrade_to_idle() {
        // Both counts error out; each defaults to zero and the agent reads
        // as idle instead of the caller failing.
        let status = compute_agent_status(&UnreachableStore, Uuid::new_v4()).await;
        assert_eq!(status, AgentStatus::Idle);
    }

    #[tokio::test]
    async fn test_refresh_writes_projection() {
        let store = InMemoryStore::new();
        let agent = test_agent();
        store.insert_agent(&agent).await.unwrap();
        store.enqueue(agent.id, Uuid::new_v4()).await.unwrap();

        let status = refresh_agent_projection(&store, agent.id, None).await.unwrap();
        assert_eq!(status, AgentStatus::Queueing);

        let stored = store.get_agent(agent.id).await.unwrap().unwrap();
        assert_eq!(stored.status, Some(AgentStatus::Queueing));
        assert_eq!(stored.queue_size, 1);
        assert!(stored.current_order_id.is_none());
    }
}
