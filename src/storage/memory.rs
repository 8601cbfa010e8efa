//! In-memory store backend.
//!
//! Backs the test suites and small single-process deployments. Tables are
//! dashmaps; the queue contract's indivisible claim and idempotent enqueue
//! are serialized through a short-lived per-agent mutex, which gives the same
//! single-winner guarantee the SQL backend gets from `FOR UPDATE SKIP
//! LOCKED`. A monotonic sequence breaks FIFO ties between items enqueued in
//! the same instant.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::{Agent, Execution, NewQueueItem, Order, QueueItem, TaskRecord};
use crate::state_machine::{AgentStatus, ExecutionStatus, OrderStatus, QueueItemStatus, TaskStatus};

use super::{MatchStore, StorageError, StoreResult};

#[derive(Debug, Clone)]
struct StoredQueueItem {
    item: QueueItem,
    seq: u64,
}

#[derive(Default)]
pub struct InMemoryStore {
    orders: DashMap<Uuid, Order>,
    agents: DashMap<Uuid, Agent>,
    queue_items: DashMap<Uuid, StoredQueueItem>,
    executions: DashMap<Uuid, Execution>,
    tasks: DashMap<Uuid, TaskRecord>,
    agent_locks: DashMap<Uuid, Arc<Mutex<()>>>,
    queue_seq: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn agent_lock(&self, agent_id: Uuid) -> Arc<Mutex<()>> {
        self.agent_locks
            .entry(agent_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Snapshot the agent's `Queued` items in FIFO order.
    fn queued_snapshot(&self, agent_id: Uuid) -> Vec<StoredQueueItem> {
        let mut items: Vec<StoredQueueItem> = self
            .queue_items
            .iter()
            .filter(|entry| entry.item.agent_id == agent_id && entry.item.is_queued())
            .map(|entry| entry.clone())
            .collect();
        items.sort_by_key(|stored| (stored.item.created_at, stored.seq));
        items
    }
}

#[async_trait]
impl MatchStore for InMemoryStore {
    async fn insert_order(&self, order: &Order) -> StoreResult<()> {
        self.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get_order(&self, order_id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.orders.get(&order_id).map(|o| o.clone()))
    }

    async fn find_order_by_task(&self, task_id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self
            .orders
            .iter()
            .find(|entry| entry.task_id == task_id)
            .map(|entry| entry.clone()))
    }

    async fn update_order(&self, order: &Order) -> StoreResult<()> {
        match self.orders.get_mut(&order.id) {
            Some(mut existing) => {
                *existing = order.clone();
                Ok(())
            }
            None => Err(StorageError::NotFound {
                entity: "order",
                id: order.id,
            }),
        }
    }

    async fn count_in_progress_orders(&self, agent_id: Uuid) -> StoreResult<i64> {
        Ok(self
            .orders
            .iter()
            .filter(|entry| {
                entry.agent_id == Some(agent_id) && entry.status == OrderStatus::InProgress
            })
            .count() as i64)
    }

    async fn find_expired_pairings(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Order>> {
        Ok(self
            .orders
            .iter()
            .filter(|entry| {
                entry.status == OrderStatus::Pairing
                    && entry.pairing_created_at.is_some_and(|at| at < cutoff)
            })
            .map(|entry| entry.clone())
            .collect())
    }

    async fn insert_agent(&self, agent: &Agent) -> StoreResult<()> {
        self.agents.insert(agent.id, agent.clone());
        Ok(())
    }

    async fn get_agent(&self, agent_id: Uuid) -> StoreResult<Option<Agent>> {
        Ok(self.agents.get(&agent_id).map(|a| a.clone()))
    }

    async fn list_listed_agents(&self) -> StoreResult<Vec<Agent>> {
        Ok(self
            .agents
            .iter()
            .filter(|entry| entry.is_listed)
            .map(|entry| entry.clone())
            .collect())
    }

    async fn update_agent_projection(
        &self,
        agent_id: Uuid,
        status: Option<AgentStatus>,
        queue_size: i64,
        current_order_id: Option<Uuid>,
    ) -> StoreResult<()> {
        match self.agents.get_mut(&agent_id) {
            Some(mut agent) => {
                agent.status = status;
                agent.queue_size = queue_size;
                agent.current_order_id = current_order_id;
                agent.updated_at = Utc::now();
                Ok(())
            }
            None => Err(StorageError::NotFound {
                entity: "agent",
                id: agent_id,
            }),
        }
    }

    async fn enqueue(&self, agent_id: Uuid, order_id: Uuid) -> StoreResult<QueueItem> {
        let lock = self.agent_lock(agent_id);
        let _guard = lock.lock();

        // Idempotent: a live reservation for the pair wins over a new insert.
        if let Some(existing) = self
            .queued_snapshot(agent_id)
            .into_iter()
            .find(|stored| stored.item.order_id == order_id)
        {
            return Ok(existing.item);
        }

        let item = QueueItem::new(NewQueueItem { agent_id, order_id });
        let seq = self.queue_seq.fetch_add(1, Ordering::SeqCst);
        self.queue_items.insert(
            item.id,
            StoredQueueItem {
                item: item.clone(),
                seq,
            },
        );
        Ok(item)
    }

    async fn list_queued(&self, agent_id: Uuid) -> StoreResult<Vec<QueueItem>> {
        Ok(self
            .queued_snapshot(agent_id)
            .into_iter()
            .map(|stored| stored.item)
            .collect())
    }

    async fn queued_count(&self, agent_id: Uuid) -> StoreResult<i64> {
        Ok(self.queued_snapshot(agent_id).len() as i64)
    }

    async fn atomic_claim_next(&self, agent_id: Uuid) -> StoreResult<Option<QueueItem>> {
        let lock = self.agent_lock(agent_id);
        let _guard = lock.lock();

        let Some(oldest) = self.queued_snapshot(agent_id).into_iter().next() else {
            return Ok(None);
        };

        match self.queue_items.get_mut(&oldest.item.id) {
            Some(mut stored) => {
                stored.item.status = QueueItemStatus::Consumed;
                stored.item.consumed_at = Some(Utc::now());
                Ok(Some(stored.item.clone()))
            }
            None => Ok(None),
        }
    }

    async fn cancel_queued(&self, agent_id: Uuid, order_id: Uuid) -> StoreResult<bool> {
        let lock = self.agent_lock(agent_id);
        let _guard = lock.lock();

        let target = self
            .queued_snapshot(agent_id)
            .into_iter()
            .find(|stored| stored.item.order_id == order_id);

        // No matching queued row is a no-op, not an error.
        match target {
            Some(stored) => {
                if let Some(mut entry) = self.queue_items.get_mut(&stored.item.id) {
                    entry.item.status = QueueItemStatus::Canceled;
                    entry.item.canceled_at = Some(Utc::now());
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_executions(&self, executions: &[Execution]) -> StoreResult<()> {
        for execution in executions {
            self.executions.insert(execution.id, execution.clone());
        }
        Ok(())
    }

    async fn get_execution(&self, execution_id: Uuid) -> StoreResult<Option<Execution>> {
        Ok(self.executions.get(&execution_id).map(|e| e.clone()))
    }

    async fn list_executions_for_order(&self, order_id: Uuid) -> StoreResult<Vec<Execution>> {
        let mut executions: Vec<Execution> = self
            .executions
            .iter()
            .filter(|entry| entry.order_id == order_id)
            .map(|entry| entry.clone())
            .collect();
        executions.sort_by_key(|e| e.created_at);
        Ok(executions)
    }

    async fn update_execution(&self, execution: &Execution) -> StoreResult<()> {
        match self.executions.get_mut(&execution.id) {
            Some(mut existing) => {
                *existing = execution.clone();
                Ok(())
            }
            None => Err(StorageError::NotFound {
                entity: "execution",
                id: execution.id,
            }),
        }
    }

    async fn mark_executions(&self, ids: &[Uuid], status: ExecutionStatus) -> StoreResult<()> {
        for id in ids {
            if let Some(mut execution) = self.executions.get_mut(id) {
                execution.status = status;
                execution.finished_at.get_or_insert_with(Utc::now);
            }
        }
        Ok(())
    }

    async fn insert_task(&self, task: &TaskRecord) -> StoreResult<()> {
        self.tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn get_task(&self, task_id: Uuid) -> StoreResult<Option<TaskRecord>> {
        Ok(self.tasks.get(&task_id).map(|t| t.clone()))
    }

    async fn set_task_status(&self, task_id: Uuid, status: TaskStatus) -> StoreResult<()> {
        match self.tasks.get_mut(&task_id) {
            Some(mut task) => {
                task.status = status;
                task.updated_at = Utc::now();
                Ok(())
            }
            None => Err(StorageError::NotFound {
                entity: "task",
                id: task_id,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_enqueue_is_idempotent_per_pair() {
        let store = InMemoryStore::new();
        let agent_id = Uuid::new_v4();
        let order_id = Uuid::new_v4();

        let first = store.enqueue(agent_id, order_id).await.unwrap();
        let second = store.enqueue(agent_id, order_id).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.queued_count(agent_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_claim_is_fifo() {
        let store = InMemoryStore::new();
        let agent_id = Uuid::new_v4();
        let o1 = Uuid::new_v4();
        let o2 = Uuid::new_v4();
        let o3 = Uuid::new_v4();

        store.enqueue(agent_id, o1).await.unwrap();
        store.enqueue(agent_id, o2).await.unwrap();
        store.enqueue(agent_id, o3).await.unwrap();

        let claims: Vec<Uuid> = [
            store.atomic_claim_next(agent_id).await.unwrap(),
            store.atomic_claim_next(agent_id).await.unwrap(),
            store.atomic_claim_next(agent_id).await.unwrap(),
        ]
        .into_iter()
        .map(|c| c.unwrap().order_id)
        .collect();

        assert_eq!(claims, vec![o1, o2, o3]);
    }

    #[tokio::test]
    async fn test_claim_is_not_idempotent() {
        let store = InMemoryStore::new();
        let agent_id = Uuid::new_v4();
        store.enqueue(agent_id, Uuid::new_v4()).await.unwrap();

        let first = store.atomic_claim_next(agent_id).await.unwrap();
        assert!(first.is_some());
        assert_eq!(first.unwrap().status, QueueItemStatus::Consumed);

        let second = store.atomic_claim_next(agent_id).await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let store = InMemoryStore::new();
        let agent_id = Uuid::new_v4();
        let order_id = Uuid::new_v4();

        // Absent row: no-op
        assert!(!store.cancel_queued(agent_id, order_id).await.unwrap());

        store.enqueue(agent_id, order_id).await.unwrap();
        assert!(store.cancel_queued(agent_id, order_id).await.unwrap());
        assert_eq!(store.queued_count(agent_id).await.unwrap(), 0);

        // Already canceled: still a no-op
        assert!(!store.cancel_queued(agent_id, order_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_canceled_pair_can_be_enqueued_again() {
        let store = InMemoryStore::new();
        let agent_id = Uuid::new_v4();
        let order_id = Uuid::new_v4();

        let first = store.enqueue(agent_id, order_id).await.unwrap();
        store.cancel_queued(agent_id, order_id).await.unwrap();
        let second = store.enqueue(agent_id, order_id).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(store.queued_count(agent_id).await.unwrap(), 1);
    }
}
