//! # Match Coordinator
//!
//! Top-level orchestrator. Resolves eligible agents for an order and either
//! fans out parallel executions (`auto_match`), pairs or queues a single
//! agent (`manual_select`), lists ranked candidates for display
//! (`list_candidates`), or applies the creator's result selection
//! (`select_executions`).
//!
//! The fan-out is modeled as independent per-execution tasks joined by an
//! all-terminal barrier: one agent's failure is recorded on its execution and
//! never blocks the others, and only the barrier moves the order into its
//! selection phase. The barrier is exposed as a join handle and announced on
//! the event bus.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::MatchConfig;
use crate::constants::events;
use crate::error::{MatchmakerError, Result};
use crate::events::EventPublisher;
use crate::models::agent::parse_amount;
use crate::models::{Agent, Execution, ExecutionResult, NewExecution, Order, TaskRecord};
use crate::ranking::rank_agents;
use crate::state_machine::{
    assert_transition, AgentStatus, ExecutionPhase, ExecutionStatus, OrderStatus, TaskStatus,
};
use crate::storage::MatchStore;

use super::agent_state::{compute_agent_status, refresh_agent_projection};
use super::pairing::PairingCoordinator;
use super::runner::{CredentialValidator, ExecutionRequest, ExecutionRunner, RunnerStatus};
use super::types::{
    CandidateView, ExecutionLaunch, FanoutHandle, FanoutSummary, MatchOutcome,
    ParallelMatchResult, SelectionOutcome,
};

#[derive(Clone)]
pub struct MatchCoordinator {
    store: Arc<dyn MatchStore>,
    pairing: PairingCoordinator,
    runner: Arc<dyn ExecutionRunner>,
    validator: Arc<dyn CredentialValidator>,
    events: EventPublisher,
    config: MatchConfig,
    rng: Arc<Mutex<StdRng>>,
}

impl MatchCoordinator {
    pub fn new(
        store: Arc<dyn MatchStore>,
        pairing: PairingCoordinator,
        runner: Arc<dyn ExecutionRunner>,
        validator: Arc<dyn CredentialValidator>,
        events: EventPublisher,
        config: MatchConfig,
    ) -> Self {
        Self::with_rng(
            store,
            pairing,
            runner,
            validator,
            events,
            config,
            StdRng::from_entropy(),
        )
    }

    /// Construct with an explicit randomness source, so the fan-out's agent
    /// selection is deterministic under test.
    #[allow(clippy::too_many_arguments)]
    pub fn with_rng(
        store: Arc<dyn MatchStore>,
        pairing: PairingCoordinator,
        runner: Arc<dyn ExecutionRunner>,
        validator: Arc<dyn CredentialValidator>,
        events: EventPublisher,
        config: MatchConfig,
        rng: StdRng,
    ) -> Self {
        Self {
            store,
            pairing,
            runner,
            validator,
            events,
            config,
            rng: Arc::new(Mutex::new(rng)),
        }
    }

    /// Parallel-execution match: pick agents, create executions, fan out.
    ///
    /// Returns as soon as the executions are dispatched; the handle resolves
    /// once every execution is terminal and the order has moved to
    /// `Selecting`.
    #[instrument(skip(self))]
    pub async fn auto_match(
        &self,
        user_id: Uuid,
        task_id: Uuid,
    ) -> Result<(ParallelMatchResult, FanoutHandle)> {
        let (task, mut order) = self.resolve_owned(user_id, task_id).await?;
        require_matchable(&task, &order)?;

        let candidates = self.eligible_candidates(&task).await?;
        if candidates.len() < self.config.min_candidates {
            return Err(MatchmakerError::Validation(format!(
                "insufficient candidates: {} eligible, {} required",
                candidates.len(),
                self.config.min_candidates
            )));
        }

        let ranked = rank_agents(&candidates);
        let mut pool: Vec<Agent> = ranked
            .into_iter()
            .take(self.config.candidate_pool_size)
            .collect();
        {
            let mut rng = self.rng.lock();
            fisher_yates(&mut pool, &mut rng);
        }
        let drawn: Vec<Agent> = pool.into_iter().take(self.config.fanout_size).collect();

        let mut admitted = Vec::new();
        for agent in drawn {
            match self.validator.validate(agent.id).await {
                Ok(check) if check.valid => admitted.push(agent),
                Ok(check) => {
                    warn!(
                        agent_id = %agent.id,
                        error = check.error.as_deref().unwrap_or("invalid"),
                        "agent dropped from fan-out: credential rejected"
                    );
                }
                Err(e) => {
                    warn!(agent_id = %agent.id, error = %e, "agent dropped from fan-out: credential check failed");
                }
            }
        }
        if admitted.is_empty() {
            return Err(MatchmakerError::Validation(
                "no selected agent passed credential validation".to_string(),
            ));
        }

        let executions: Vec<Execution> = admitted
            .iter()
            .map(|agent| {
                Execution::new(NewExecution {
                    order_id: order.id,
                    agent_id: agent.id,
                })
            })
            .collect();
        self.store.insert_executions(&executions).await?;

        assert_transition(OrderStatus::Standby, OrderStatus::Executing)?;
        order.status = OrderStatus::Executing;
        order.execution_phase = Some(ExecutionPhase::Executing);
        order.updated_at = Utc::now();
        self.store.update_order(&order).await?;
        self.store
            .set_task_status(task.id, TaskStatus::Executing)
            .await?;

        info!(
            order_id = %order.id,
            executions = executions.len(),
            "parallel execution fan-out starting"
        );
        self.events.publish(
            events::EXECUTION_FANOUT_STARTED,
            json!({
                "order_id": order.id,
                "agent_ids": executions.iter().map(|e| e.agent_id).collect::<Vec<_>>(),
            }),
        );

        let result = ParallelMatchResult {
            order_id: order.id,
            executions: executions
                .iter()
                .map(|e| ExecutionLaunch {
                    execution_id: e.id,
                    agent_id: e.agent_id,
                    status: e.status,
                })
                .collect(),
        };

        let handle = tokio::spawn(drive_fanout(
            self.store.clone(),
            self.runner.clone(),
            self.events.clone(),
            task,
            order.id,
            executions,
        ));

        Ok((result, handle))
    }

    /// Legacy single-agent path: pair immediately when the agent is idle,
    /// otherwise take a queue slot.
    #[instrument(skip(self))]
    pub async fn manual_select(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        agent_id: Uuid,
    ) -> Result<MatchOutcome> {
        let (task, order) = self.resolve_owned(user_id, task_id).await?;
        require_matchable(&task, &order)?;

        let agent = self
            .store
            .get_agent(agent_id)
            .await?
            .ok_or_else(|| MatchmakerError::not_found("agent", agent_id))?;
        if !agent.is_listed {
            return Err(MatchmakerError::not_found("agent", agent_id));
        }

        let reward = parse_amount(&task.reward).ok_or_else(|| {
            MatchmakerError::Validation("task reward is not a valid integer amount".to_string())
        })?;
        if !agent.accepts_reward(reward) {
            return Err(MatchmakerError::Validation(format!(
                "task reward {reward} is outside the agent's price range"
            )));
        }
        if !agent.supports_task_type(&task.task_type) {
            return Err(MatchmakerError::Validation(format!(
                "agent does not support task type '{}'",
                task.task_type
            )));
        }

        let queued_count = self.store.queued_count(agent_id).await?;
        if queued_count >= self.config.queue_capacity {
            return Err(MatchmakerError::Validation(format!(
                "agent queue is full ({queued_count}/{})",
                self.config.queue_capacity
            )));
        }

        match compute_agent_status(self.store.as_ref(), agent_id).await {
            AgentStatus::Idle => {
                let pairing = self.pairing.create_pairing(order.id, agent_id).await?;
                Ok(MatchOutcome::Pairing {
                    order_id: order.id,
                    agent_id,
                    status: OrderStatus::Pairing,
                    pairing,
                })
            }
            _ => {
                let item = self.store.enqueue(agent_id, order.id).await?;
                refresh_agent_projection(self.store.as_ref(), agent_id, agent.current_order_id)
                    .await?;

                let queued = self.store.list_queued(agent_id).await?;
                let queue_position = queued
                    .iter()
                    .position(|q| q.order_id == order.id)
                    .map(|idx| idx + 1)
                    .unwrap_or(queued.len());

                debug!(
                    order_id = %order.id,
                    agent_id = %agent_id,
                    queue_item_id = %item.id,
                    queue_position,
                    "order queued behind busy agent"
                );
                self.events.publish(
                    events::QUEUE_ITEM_ENQUEUED,
                    json!({
                        "order_id": order.id,
                        "agent_id": agent_id,
                        "queue_item_id": item.id,
                        "queue_position": queue_position,
                    }),
                );

                Ok(MatchOutcome::Queued {
                    order_id: order.id,
                    agent_id,
                    queue_position,
                    queued_count: queued.len() as i64,
                    capacity: self.config.queue_capacity,
                })
            }
        }
    }

    /// Ranked eligible agents annotated with live queue occupancy.
    /// Display only, no side effects.
    #[instrument(skip(self))]
    pub async fn list_candidates(
        &self,
        user_id: Uuid,
        task_id: Uuid,
    ) -> Result<Vec<CandidateView>> {
        let (task, _order) = self.resolve_owned(user_id, task_id).await?;

        let candidates = self.eligible_candidates(&task).await?;
        let ranked = rank_agents(&candidates);

        let mut views = Vec::with_capacity(ranked.len());
        for agent in ranked {
            let queued_count = self.store.queued_count(agent.id).await?;
            let capacity = self.config.queue_capacity;
            views.push(CandidateView {
                queued_count,
                capacity,
                available: (capacity - queued_count).max(0),
                agent,
            });
        }
        Ok(views)
    }

    /// Apply the creator's result selection once the order is selecting.
    ///
    /// Every id must reference a completed execution of this order. Selected
    /// executions are marked in one batch (skipped when the set is empty),
    /// every other completed execution is rejected in a second batch.
    #[instrument(skip(self))]
    pub async fn select_executions(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        selected_execution_ids: &[Uuid],
    ) -> Result<SelectionOutcome> {
        let (_task, mut order) = self.resolve_owned(user_id, task_id).await?;
        if order.status != OrderStatus::Selecting {
            return Err(MatchmakerError::InvalidOrderState(format!(
                "order {} is {}, selection requires selecting",
                order.id, order.status
            )));
        }

        let selected: HashSet<Uuid> = selected_execution_ids.iter().copied().collect();
        if selected.len() > self.config.fanout_size {
            return Err(MatchmakerError::Validation(format!(
                "at most {} executions can be selected",
                self.config.fanout_size
            )));
        }

        let executions = self.store.list_executions_for_order(order.id).await?;
        for id in &selected {
            let Some(execution) = executions.iter().find(|e| e.id == *id) else {
                return Err(MatchmakerError::Validation(format!(
                    "execution {id} does not belong to order {}",
                    order.id
                )));
            };
            if execution.status != ExecutionStatus::Completed {
                return Err(MatchmakerError::Validation(format!(
                    "execution {id} is {}, only completed executions can be selected",
                    execution.status
                )));
            }
        }

        let selected_ids: Vec<Uuid> = executions
            .iter()
            .filter(|e| selected.contains(&e.id))
            .map(|e| e.id)
            .collect();
        let rejected_ids: Vec<Uuid> = executions
            .iter()
            .filter(|e| e.status == ExecutionStatus::Completed && !selected.contains(&e.id))
            .map(|e| e.id)
            .collect();

        if !selected_ids.is_empty() {
            self.store
                .mark_executions(&selected_ids, ExecutionStatus::Selected)
                .await?;
        }
        if !rejected_ids.is_empty() {
            self.store
                .mark_executions(&rejected_ids, ExecutionStatus::Rejected)
                .await?;
        }

        order.execution_phase = Some(ExecutionPhase::Completed);
        order.updated_at = Utc::now();
        self.store.update_order(&order).await?;

        info!(
            order_id = %order.id,
            selected = selected_ids.len(),
            rejected = rejected_ids.len(),
            "execution selection applied"
        );
        self.events.publish(
            events::EXECUTION_SELECTION_APPLIED,
            json!({
                "order_id": order.id,
                "selected": selected_ids,
                "rejected": rejected_ids,
            }),
        );

        Ok(SelectionOutcome {
            selected: selected_ids,
            rejected: rejected_ids,
        })
    }

    /// Load the task and its order, enforcing caller ownership.
    async fn resolve_owned(&self, user_id: Uuid, task_id: Uuid) -> Result<(TaskRecord, Order)> {
        let task = self
            .store
            .get_task(task_id)
            .await?
            .ok_or_else(|| MatchmakerError::not_found("task", task_id))?;
        let order = self
            .store
            .find_order_by_task(task_id)
            .await?
            .ok_or_else(|| MatchmakerError::NotFound(format!("order for task {task_id}")))?;
        if order.creator_id != user_id {
            return Err(MatchmakerError::Forbidden(format!(
                "user {user_id} is not the creator of order {}",
                order.id
            )));
        }
        Ok((task, order))
    }

    /// Listed agents supporting the task's type whose price range covers its
    /// reward, each annotated with a freshly derived status class.
    async fn eligible_candidates(&self, task: &TaskRecord) -> Result<Vec<Agent>> {
        let reward = parse_amount(&task.reward).ok_or_else(|| {
            MatchmakerError::Validation("task reward is not a valid integer amount".to_string())
        })?;

        let mut eligible = Vec::new();
        for mut agent in self.store.list_listed_agents().await? {
            if !agent.supports_task_type(&task.task_type) || !agent.accepts_reward(reward) {
                continue;
            }
            agent.status = Some(compute_agent_status(self.store.as_ref(), agent.id).await);
            eligible.push(agent);
        }
        Ok(eligible)
    }
}

fn require_matchable(task: &TaskRecord, order: &Order) -> Result<()> {
    if task.status != TaskStatus::Published {
        return Err(MatchmakerError::InvalidOrderState(format!(
            "task {} is {}, matching requires published",
            task.id, task.status
        )));
    }
    if order.status != OrderStatus::Standby {
        return Err(MatchmakerError::InvalidOrderState(format!(
            "order {} is {}, matching requires standby",
            order.id, order.status
        )));
    }
    Ok(())
}

/// Classic Fisher–Yates shuffle over the whole slice.
fn fisher_yates<T>(items: &mut [T], rng: &mut StdRng) {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}

/// Fan-out driver: run every execution independently, then move the order to
/// its selection phase once all of them are terminal.
async fn drive_fanout(
    store: Arc<dyn MatchStore>,
    runner: Arc<dyn ExecutionRunner>,
    events: EventPublisher,
    task: TaskRecord,
    order_id: Uuid,
    executions: Vec<Execution>,
) -> FanoutSummary {
    let attempts = executions.into_iter().map(|execution| {
        run_execution(
            store.clone(),
            runner.clone(),
            events.clone(),
            task.clone(),
            execution,
        )
    });
    let results = futures::future::join_all(attempts).await;

    let completed = results.iter().filter(|ok| **ok).count();
    let failed = results.len() - completed;

    // All-terminal barrier reached; the order leaves its execution phase even
    // when every attempt failed.
    if let Err(e) = finish_fanout(&store, order_id).await {
        error!(order_id = %order_id, error = %e, "failed to move order into selection phase");
    }

    let summary = FanoutSummary {
        order_id,
        completed,
        failed,
    };
    info!(order_id = %order_id, completed, failed, "fan-out finished");
    events.publish(
        events::EXECUTION_FANOUT_FINISHED,
        json!({ "order_id": order_id, "completed": completed, "failed": failed }),
    );
    summary
}

/// Run one execution to a terminal status. Failures are recorded on the
/// execution, never propagated; the barrier must always be reachable.
async fn run_execution(
    store: Arc<dyn MatchStore>,
    runner: Arc<dyn ExecutionRunner>,
    events: EventPublisher,
    task: TaskRecord,
    mut execution: Execution,
) -> bool {
    execution.status = ExecutionStatus::Running;
    execution.started_at = Some(Utc::now());
    if let Err(e) = store.update_execution(&execution).await {
        warn!(execution_id = %execution.id, error = %e, "failed to mark execution running");
    }

    let request = ExecutionRequest::for_task(execution.agent_id, &task);
    match runner.execute(request).await {
        Ok(outcome) => {
            execution.result = ExecutionResult {
                run_id: Some(outcome.run_id),
                content: outcome.content,
                preview: outcome.preview,
                url: outcome.url,
                error: outcome.error,
            };
            execution.status = match outcome.status {
                RunnerStatus::Completed => ExecutionStatus::Completed,
                RunnerStatus::Failed => ExecutionStatus::Failed,
            };
        }
        Err(e) => {
            execution.status = ExecutionStatus::Failed;
            execution.result.error = Some(e.to_string());
        }
    }
    execution.finished_at = Some(Utc::now());

    if let Err(e) = store.update_execution(&execution).await {
        warn!(execution_id = %execution.id, error = %e, "failed to record execution outcome");
    }
    events.publish(
        events::EXECUTION_FINISHED,
        json!({
            "execution_id": execution.id,
            "order_id": execution.order_id,
            "agent_id": execution.agent_id,
            "status": execution.status,
        }),
    );

    execution.status == ExecutionStatus::Completed
}

async fn finish_fanout(store: &Arc<dyn MatchStore>, order_id: Uuid) -> Result<()> {
    let mut order = store
        .get_order(order_id)
        .await?
        .ok_or_else(|| MatchmakerError::not_found("order", order_id))?;

    assert_transition(OrderStatus::Executing, OrderStatus::Selecting)?;
    order.status = OrderStatus::Selecting;
    order.execution_phase = Some(ExecutionPhase::Selecting);
    order.updated_at = Utc::now();
    store.update_order(&order).await?;
    store
        .set_task_status(order.task_id, TaskStatus::Selecting)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fisher_yates_is_deterministic_per_seed() {
        let mut a: Vec<u32> = (0..15).collect();
        let mut b: Vec<u32> = (0..15).collect();
        let mut rng_a = StdRng::seed_from_u64(42);
        let mut rng_b = StdRng::seed_from_u64(42);

        fisher_yates(&mut a, &mut rng_a);
        fisher_yates(&mut b, &mut rng_b);
        assert_eq!(a, b);

        let mut c: Vec<u32> = (0..15).collect();
        let mut rng_c = StdRng::seed_from_u64(7);
        fisher_yates(&mut c, &mut rng_c);
        assert_ne!(a, c);
    }

    #[test]
    fn test_fisher_yates_is_a_permutation() {
        let mut items: Vec<u32> = (0..100).collect();
        let mut rng = StdRng::seed_from_u64(1);
        fisher_yates(&mut items, &mut rng);

        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..100).collect::<Vec<u32>>());
    }

    #[test]
    fn test_fisher_yates_handles_tiny_slices() {
        let mut empty: Vec<u32> = vec![];
        let mut one = vec![9u32];
        let mut rng = StdRng::seed_from_u64(0);
        fisher_yates(&mut empty, &mut rng);
        fisher_yates(&mut one, &mut rng);
        assert!(empty.is_empty());
        assert_eq!(one, vec![9]);
    }
}
