//! PostgreSQL store backend.
//!
//! Runtime-bound sqlx queries against the `match_*` tables. The queue
//! contract leans on the database: a partial unique index on
//! `(agent_id, order_id) WHERE status = 'queued'` makes enqueue idempotent,
//! and the claim is one `FOR UPDATE SKIP LOCKED` statement so concurrent
//! claimants against the same agent never block each other, they just lose
//! and get no row.
//!
//! Statuses are stored as text and parsed on the way out; an unparseable
//! status is a backend error, not a panic. The schema lives under
//! `migrations/`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Agent, Execution, ExecutionResult, Order, QueueItem, TaskRecord};
use crate::state_machine::{AgentStatus, ExecutionStatus, TaskStatus};

use super::{MatchStore, StorageError, StoreResult};

/// Postgres-backed implementation of [`MatchStore`].
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn map_sqlx(err: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StorageError::UniqueViolation {
                constraint: db_err.constraint().unwrap_or("unknown").to_string(),
            };
        }
    }
    StorageError::Backend(err.to_string())
}

fn parse_status<T: std::str::FromStr<Err = String>>(raw: &str) -> StoreResult<T> {
    raw.parse()
        .map_err(|e: String| StorageError::Backend(format!("invalid status in database: {e}")))
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    task_id: Uuid,
    creator_id: Uuid,
    provider_id: Option<Uuid>,
    agent_id: Option<Uuid>,
    status: String,
    pairing_created_at: Option<DateTime<Utc>>,
    execution_phase: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self) -> StoreResult<Order> {
        Ok(Order {
            id: self.id,
            task_id: self.task_id,
            creator_id: self.creator_id,
            provider_id: self.provider_id,
            agent_id: self.agent_id,
            status: parse_status(&self.status)?,
            pairing_created_at: self.pairing_created_at,
            execution_phase: self
                .execution_phase
                .as_deref()
                .map(parse_status)
                .transpose()?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AgentRow {
    id: Uuid,
    owner_id: Uuid,
    supported_task_types: Vec<String>,
    min_price: String,
    max_price: String,
    status: Option<String>,
    current_order_id: Option<Uuid>,
    avg_rating: f64,
    completed_order_count: i64,
    queue_size: i64,
    is_listed: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AgentRow {
    fn into_agent(self) -> StoreResult<Agent> {
        Ok(Agent {
            id: self.id,
            owner_id: self.owner_id,
            supported_task_types: self.supported_task_types,
            min_price: self.min_price,
            max_price: self.max_price,
            status: self.status.as_deref().map(parse_status).transpose()?,
            current_order_id: self.current_order_id,
            avg_rating: self.avg_rating,
            completed_order_count: self.completed_order_count,
            queue_size: self.queue_size,
            is_listed: self.is_listed,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct QueueItemRow {
    id: Uuid,
    agent_id: Uuid,
    order_id: Uuid,
    status: String,
    created_at: DateTime<Utc>,
    consumed_at: Option<DateTime<Utc>>,
    canceled_at: Option<DateTime<Utc>>,
}

impl QueueItemRow {
    fn into_item(self) -> StoreResult<QueueItem> {
        Ok(QueueItem {
            id: self.id,
            agent_id: self.agent_id,
            order_id: self.order_id,
            status: parse_status(&self.status)?,
            created_at: self.created_at,
            consumed_at: self.consumed_at,
            canceled_at: self.canceled_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ExecutionRow {
    id: Uuid,
    order_id: Uuid,
    agent_id: Uuid,
    status: String,
    run_id: Option<String>,
    result_content: Option<String>,
    result_preview: Option<String>,
    result_url: Option<String>,
    error: Option<String>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl ExecutionRow {
    fn into_execution(self) -> StoreResult<Execution> {
        Ok(Execution {
            id: self.id,
            order_id: self.order_id,
            agent_id: self.agent_id,
            status: parse_status(&self.status)?,
            result: ExecutionResult {
                run_id: self.run_id,
                content: self.result_content,
                preview: self.result_preview,
                url: self.result_url,
                error: self.error,
            },
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: Uuid,
    creator_id: Uuid,
    title: Option<String>,
    description: String,
    task_type: String,
    reward: String,
    attachments: Option<Vec<String>>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TaskRow {
    fn into_task(self) -> StoreResult<TaskRecord> {
        Ok(TaskRecord {
            id: self.id,
            creator_id: self.creator_id,
            title: self.title,
            description: self.description,
            task_type: self.task_type,
            reward: self.reward,
            attachments: self.attachments,
            status: parse_status(&self.status)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const ORDER_COLUMNS: &str = "id, task_id, creator_id, provider_id, agent_id, status, \
     pairing_created_at, execution_phase, created_at, updated_at";

const QUEUE_COLUMNS: &str =
    "id, agent_id, order_id, status, created_at, consumed_at, canceled_at";

const EXECUTION_COLUMNS: &str = "id, order_id, agent_id, status, run_id, result_content, \
     result_preview, result_url, error, created_at, started_at, finished_at";

#[async_trait]
impl MatchStore for PgStore {
    async fn insert_order(&self, order: &Order) -> StoreResult<()> {
        let query = format!(
            "INSERT INTO match_orders ({ORDER_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        );
        sqlx::query(&query)
            .bind(order.id)
            .bind(order.task_id)
            .bind(order.creator_id)
            .bind(order.provider_id)
            .bind(order.agent_id)
            .bind(order.status.to_string())
            .bind(order.pairing_created_at)
            .bind(order.execution_phase.map(|p| p.to_string()))
            .bind(order.created_at)
            .bind(order.updated_at)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn get_order(&self, order_id: Uuid) -> StoreResult<Option<Order>> {
        let query = format!("SELECT {ORDER_COLUMNS} FROM match_orders WHERE id = $1");
        sqlx::query_as::<_, OrderRow>(&query)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?
            .map(OrderRow::into_order)
            .transpose()
    }

    async fn find_order_by_task(&self, task_id: Uuid) -> StoreResult<Option<Order>> {
        let query = format!("SELECT {ORDER_COLUMNS} FROM match_orders WHERE task_id = $1");
        sqlx::query_as::<_, OrderRow>(&query)
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?
            .map(OrderRow::into_order)
            .transpose()
    }

    async fn update_order(&self, order: &Order) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE match_orders SET provider_id = $2, agent_id = $3, status = $4, \
             pairing_created_at = $5, execution_phase = $6, updated_at = $7 WHERE id = $1",
        )
        .bind(order.id)
        .bind(order.provider_id)
        .bind(order.agent_id)
        .bind(order.status.to_string())
        .bind(order.pairing_created_at)
        .bind(order.execution_phase.map(|p| p.to_string()))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                entity: "order",
                id: order.id,
            });
        }
        Ok(())
    }

    async fn count_in_progress_orders(&self, agent_id: Uuid) -> StoreResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM match_orders WHERE agent_id = $1 AND status = 'in_progress'",
        )
        .bind(agent_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)
    }

    async fn find_expired_pairings(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Order>> {
        let query = format!(
            "SELECT {ORDER_COLUMNS} FROM match_orders \
             WHERE status = 'pairing' AND pairing_created_at < $1 \
             ORDER BY pairing_created_at ASC"
        );
        sqlx::query_as::<_, OrderRow>(&query)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?
            .into_iter()
            .map(OrderRow::into_order)
            .collect()
    }

    async fn insert_agent(&self, agent: &Agent) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO match_agents (id, owner_id, supported_task_types, min_price, max_price, \
             status, current_order_id, avg_rating, completed_order_count, queue_size, is_listed, \
             created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(agent.id)
        .bind(agent.owner_id)
        .bind(&agent.supported_task_types)
        .bind(&agent.min_price)
        .bind(&agent.max_price)
        .bind(agent.status.map(|s| s.to_string()))
        .bind(agent.current_order_id)
        .bind(agent.avg_rating)
        .bind(agent.completed_order_count)
        .bind(agent.queue_size)
        .bind(agent.is_listed)
        .bind(agent.created_at)
        .bind(agent.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn get_agent(&self, agent_id: Uuid) -> StoreResult<Option<Agent>> {
        sqlx::query_as::<_, AgentRow>("SELECT * FROM match_agents WHERE id = $1")
            .bind(agent_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?
            .map(AgentRow::into_agent)
            .transpose()
    }

    async fn list_listed_agents(&self) -> StoreResult<Vec<Agent>> {
        sqlx::query_as::<_, AgentRow>(
            "SELECT * FROM match_agents WHERE is_listed = TRUE ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?
        .into_iter()
        .map(AgentRow::into_agent)
        .collect()
    }

    async fn update_agent_projection(
        &self,
        agent_id: Uuid,
        status: Option<AgentStatus>,
        queue_size: i64,
        current_order_id: Option<Uuid>,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE match_agents SET status = $2, queue_size = $3, current_order_id = $4, \
             updated_at = NOW() WHERE id = $1",
        )
        .bind(agent_id)
        .bind(status.map(|s| s.to_string()))
        .bind(queue_size)
        .bind(current_order_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                entity: "agent",
                id: agent_id,
            });
        }
        Ok(())
    }

    async fn enqueue(&self, agent_id: Uuid, order_id: Uuid) -> StoreResult<QueueItem> {
        // Partial unique index: one queued row per (agent, order). A conflict
        // means someone else already enqueued the pair, so fall through and
        // return their row.
        let insert = format!(
            "INSERT INTO match_queue_items (id, agent_id, order_id, status, created_at) \
             VALUES ($1, $2, $3, 'queued', NOW()) \
             ON CONFLICT (agent_id, order_id) WHERE status = 'queued' DO NOTHING \
             RETURNING {QUEUE_COLUMNS}"
        );
        let select = format!(
            "SELECT {QUEUE_COLUMNS} FROM match_queue_items \
             WHERE agent_id = $1 AND order_id = $2 AND status = 'queued'"
        );

        // The concurrent row can vanish between insert and select (claimed
        // or canceled in the gap), in which case the slot is free again and
        // a second insert attempt settles it.
        for _ in 0..2 {
            let inserted = sqlx::query_as::<_, QueueItemRow>(&insert)
                .bind(Uuid::new_v4())
                .bind(agent_id)
                .bind(order_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx)?;
            if let Some(row) = inserted {
                return row.into_item();
            }

            let existing = sqlx::query_as::<_, QueueItemRow>(&select)
                .bind(agent_id)
                .bind(order_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx)?;
            if let Some(row) = existing {
                return row.into_item();
            }
        }

        Err(StorageError::UniqueViolation {
            constraint: "match_queue_items_agent_order_queued".to_string(),
        })
    }

    async fn list_queued(&self, agent_id: Uuid) -> StoreResult<Vec<QueueItem>> {
        let query = format!(
            "SELECT {QUEUE_COLUMNS} FROM match_queue_items \
             WHERE agent_id = $1 AND status = 'queued' ORDER BY created_at ASC"
        );
        sqlx::query_as::<_, QueueItemRow>(&query)
            .bind(agent_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?
            .into_iter()
            .map(QueueItemRow::into_item)
            .collect()
    }

    async fn queued_count(&self, agent_id: Uuid) -> StoreResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM match_queue_items WHERE agent_id = $1 AND status = 'queued'",
        )
        .bind(agent_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)
    }

    async fn atomic_claim_next(&self, agent_id: Uuid) -> StoreResult<Option<QueueItem>> {
        // Single statement, so claim and Queued -> Consumed are indivisible.
        // SKIP LOCKED makes concurrent losers return no row instead of
        // blocking on the winner's transaction.
        let query = format!(
            "WITH next_item AS ( \
                 SELECT id FROM match_queue_items \
                 WHERE agent_id = $1 AND status = 'queued' \
                 ORDER BY created_at ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             UPDATE match_queue_items q \
             SET status = 'consumed', consumed_at = NOW() \
             FROM next_item \
             WHERE q.id = next_item.id \
             RETURNING q.id, q.agent_id, q.order_id, q.status, q.created_at, \
                       q.consumed_at, q.canceled_at"
        );
        sqlx::query_as::<_, QueueItemRow>(&query)
            .bind(agent_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?
            .map(QueueItemRow::into_item)
            .transpose()
    }

    async fn cancel_queued(&self, agent_id: Uuid, order_id: Uuid) -> StoreResult<bool> {
        // Zero rows affected means nothing was queued for the pair: no-op.
        let result = sqlx::query(
            "UPDATE match_queue_items SET status = 'canceled', canceled_at = NOW() \
             WHERE agent_id = $1 AND order_id = $2 AND status = 'queued'",
        )
        .bind(agent_id)
        .bind(order_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_executions(&self, executions: &[Execution]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        let query = format!(
            "INSERT INTO match_executions ({EXECUTION_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
        );
        for execution in executions {
            sqlx::query(&query)
                .bind(execution.id)
                .bind(execution.order_id)
                .bind(execution.agent_id)
                .bind(execution.status.to_string())
                .bind(&execution.result.run_id)
                .bind(&execution.result.content)
                .bind(&execution.result.preview)
                .bind(&execution.result.url)
                .bind(&execution.result.error)
                .bind(execution.created_at)
                .bind(execution.started_at)
                .bind(execution.finished_at)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx)?;
        }
        tx.commit().await.map_err(map_sqlx)
    }

    async fn get_execution(&self, execution_id: Uuid) -> StoreResult<Option<Execution>> {
        let query = format!("SELECT {EXECUTION_COLUMNS} FROM match_executions WHERE id = $1");
        sqlx::query_as::<_, ExecutionRow>(&query)
            .bind(execution_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?
            .map(ExecutionRow::into_execution)
            .transpose()
    }

    async fn list_executions_for_order(&self, order_id: Uuid) -> StoreResult<Vec<Execution>> {
        let query = format!(
            "SELECT {EXECUTION_COLUMNS} FROM match_executions \
             WHERE order_id = $1 ORDER BY created_at ASC"
        );
        sqlx::query_as::<_, ExecutionRow>(&query)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?
            .into_iter()
            .map(ExecutionRow::into_execution)
            .collect()
    }

    async fn update_execution(&self, execution: &Execution) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE match_executions SET status = $2, run_id = $3, result_content = $4, \
             result_preview = $5, result_url = $6, error = $7, started_at = $8, \
             finished_at = $9 WHERE id = $1",
        )
        .bind(execution.id)
        .bind(execution.status.to_string())
        .bind(&execution.result.run_id)
        .bind(&execution.result.content)
        .bind(&execution.result.preview)
        .bind(&execution.result.url)
        .bind(&execution.result.error)
        .bind(execution.started_at)
        .bind(execution.finished_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                entity: "execution",
                id: execution.id,
            });
        }
        Ok(())
    }

    async fn mark_executions(&self, ids: &[Uuid], status: ExecutionStatus) -> StoreResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        sqlx::query(
            "UPDATE match_executions SET status = $1, \
             finished_at = COALESCE(finished_at, NOW()) WHERE id = ANY($2)",
        )
        .bind(status.to_string())
        .bind(ids)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn insert_task(&self, task: &TaskRecord) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO match_tasks (id, creator_id, title, description, task_type, reward, \
             attachments, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(task.id)
        .bind(task.creator_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(&task.task_type)
        .bind(&task.reward)
        .bind(&task.attachments)
        .bind(task.status.to_string())
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn get_task(&self, task_id: Uuid) -> StoreResult<Option<TaskRecord>> {
        sqlx::query_as::<_, TaskRow>("SELECT * FROM match_tasks WHERE id = $1")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?
            .map(TaskRow::into_task)
            .transpose()
    }

    async fn set_task_status(&self, task_id: Uuid, status: TaskStatus) -> StoreResult<()> {
        let result =
            sqlx::query("UPDATE match_tasks SET status = $2, updated_at = NOW() WHERE id = $1")
                .bind(task_id)
                .bind(status.to_string())
                .execute(&self.pool)
                .await
                .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                entity: "task",
                id: task_id,
            });
        }
        Ok(())
    }
}
