//! Shared test infrastructure: data builders, scripted collaborator mocks,
//! and a harness wiring the coordinators over the in-memory store.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use uuid::Uuid;

use matchmaker_core::config::MatchConfig;
use matchmaker_core::events::EventPublisher;
use matchmaker_core::models::{Agent, NewAgent, NewOrder, NewTask, Order, TaskRecord};
use matchmaker_core::orchestration::{
    CredentialCheck, CredentialValidator, ExecutionRequest, ExecutionRunner, MatchCoordinator,
    PairingCoordinator, QueueDrainCoordinator, RunnerOutcome, RunnerStatus,
};
use matchmaker_core::state_machine::AgentStatus;
use matchmaker_core::storage::{InMemoryStore, MatchStore};

/// Builder pattern for creating test agents
pub struct AgentBuilder {
    owner_id: Uuid,
    task_types: Vec<String>,
    min_price: String,
    max_price: String,
    status: Option<AgentStatus>,
    avg_rating: f64,
    completed_order_count: i64,
    is_listed: bool,
    age_seconds: i64,
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            owner_id: Uuid::new_v4(),
            task_types: vec!["translation".to_string()],
            min_price: "1".to_string(),
            max_price: "1000000".to_string(),
            status: Some(AgentStatus::Idle),
            avg_rating: 4.0,
            completed_order_count: 10,
            is_listed: true,
            age_seconds: 0,
        }
    }

    pub fn with_owner(mut self, owner_id: Uuid) -> Self {
        self.owner_id = owner_id;
        self
    }

    pub fn with_task_types(mut self, types: &[&str]) -> Self {
        self.task_types = types.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_price_range(mut self, min: &str, max: &str) -> Self {
        self.min_price = min.to_string();
        self.max_price = max.to_string();
        self
    }

    pub fn with_status(mut self, status: Option<AgentStatus>) -> Self {
        self.status = status;
        self
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.avg_rating = rating;
        self
    }

    pub fn with_completed(mut self, count: i64) -> Self {
        self.completed_order_count = count;
        self
    }

    pub fn unlisted(mut self) -> Self {
        self.is_listed = false;
        self
    }

    pub fn registered_seconds_ago(mut self, seconds: i64) -> Self {
        self.age_seconds = seconds;
        self
    }

    pub async fn build(self, store: &InMemoryStore) -> Agent {
        let mut agent = Agent::new(NewAgent {
            owner_id: self.owner_id,
            supported_task_types: self.task_types,
            min_price: self.min_price,
            max_price: self.max_price,
            is_listed: self.is_listed,
        });
        agent.status = self.status;
        agent.avg_rating = self.avg_rating;
        agent.completed_order_count = self.completed_order_count;
        agent.created_at = Utc::now() - Duration::seconds(self.age_seconds);
        store.insert_agent(&agent).await.expect("insert test agent");
        agent
    }
}

/// Builder pattern for creating a published task with its standby order
pub struct TaskBuilder {
    creator_id: Uuid,
    task_type: String,
    reward: String,
}

impl TaskBuilder {
    pub fn new() -> Self {
        Self {
            creator_id: Uuid::new_v4(),
            task_type: "translation".to_string(),
            reward: "500".to_string(),
        }
    }

    pub fn with_creator(mut self, creator_id: Uuid) -> Self {
        self.creator_id = creator_id;
        self
    }

    pub fn with_task_type(mut self, task_type: &str) -> Self {
        self.task_type = task_type.to_string();
        self
    }

    pub fn with_reward(mut self, reward: &str) -> Self {
        self.reward = reward.to_string();
        self
    }

    pub async fn build(self, store: &InMemoryStore) -> (TaskRecord, Order) {
        let task = TaskRecord::new(NewTask {
            creator_id: self.creator_id,
            title: Some("test task".to_string()),
            description: "do the thing".to_string(),
            task_type: self.task_type,
            reward: self.reward,
            attachments: None,
        });
        store.insert_task(&task).await.expect("insert test task");

        let order = Order::new(NewOrder {
            task_id: task.id,
            creator_id: task.creator_id,
        });
        store.insert_order(&order).await.expect("insert test order");
        (task, order)
    }
}

/// Scripted behavior for one agent's runner attempt
#[derive(Debug, Clone)]
pub enum ScriptedRun {
    Succeed { content: String },
    ReportFailure { error: String },
    Error { error: String },
}

/// Execution runner that returns scripted results per agent
#[derive(Default)]
pub struct MockRunner {
    scripts: Mutex<HashMap<Uuid, ScriptedRun>>,
    pub invocations: AtomicUsize,
}

impl MockRunner {
    pub fn script(&self, agent_id: Uuid, run: ScriptedRun) {
        self.scripts.lock().unwrap().insert(agent_id, run);
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionRunner for MockRunner {
    async fn execute(&self, request: ExecutionRequest) -> anyhow::Result<RunnerOutcome> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&request.agent_id)
            .cloned()
            .unwrap_or(ScriptedRun::Succeed {
                content: "ok".to_string(),
            });

        match script {
            ScriptedRun::Succeed { content } => Ok(RunnerOutcome {
                run_id: format!("run-{}", request.agent_id),
                status: RunnerStatus::Completed,
                content: Some(content),
                preview: None,
                url: None,
                error: None,
            }),
            ScriptedRun::ReportFailure { error } => Ok(RunnerOutcome {
                run_id: format!("run-{}", request.agent_id),
                status: RunnerStatus::Failed,
                content: None,
                preview: None,
                url: None,
                error: Some(error),
            }),
            ScriptedRun::Error { error } => Err(anyhow::anyhow!(error)),
        }
    }
}

/// Credential validator that rejects or errors for scripted agents
#[derive(Default)]
pub struct MockValidator {
    invalid: Mutex<HashMap<Uuid, String>>,
    erroring: Mutex<HashMap<Uuid, String>>,
}

impl MockValidator {
    pub fn mark_invalid(&self, agent_id: Uuid, reason: &str) {
        self.invalid
            .lock()
            .unwrap()
            .insert(agent_id, reason.to_string());
    }

    pub fn mark_erroring(&self, agent_id: Uuid, reason: &str) {
        self.erroring
            .lock()
            .unwrap()
            .insert(agent_id, reason.to_string());
    }
}

#[async_trait]
impl CredentialValidator for MockValidator {
    async fn validate(&self, agent_id: Uuid) -> anyhow::Result<CredentialCheck> {
        if let Some(reason) = self.erroring.lock().unwrap().get(&agent_id) {
            anyhow::bail!("{reason}");
        }
        if let Some(reason) = self.invalid.lock().unwrap().get(&agent_id) {
            return Ok(CredentialCheck {
                valid: false,
                error: Some(reason.clone()),
            });
        }
        Ok(CredentialCheck {
            valid: true,
            error: None,
        })
    }
}

/// Full coordinator stack over a fresh in-memory store
pub struct TestHarness {
    pub store: Arc<InMemoryStore>,
    pub events: EventPublisher,
    pub config: MatchConfig,
    pub pairing: PairingCoordinator,
    pub drain: QueueDrainCoordinator,
    pub runner: Arc<MockRunner>,
    pub validator: Arc<MockValidator>,
    pub matcher: MatchCoordinator,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(MatchConfig::default())
    }

    pub fn with_config(config: MatchConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let events = EventPublisher::default();
        let pairing = PairingCoordinator::new(store.clone(), events.clone(), config.clone());
        let drain =
            QueueDrainCoordinator::new(store.clone(), pairing.clone(), events.clone());
        let runner = Arc::new(MockRunner::default());
        let validator = Arc::new(MockValidator::default());
        let matcher = MatchCoordinator::with_rng(
            store.clone(),
            pairing.clone(),
            runner.clone(),
            validator.clone(),
            events.clone(),
            config.clone(),
            StdRng::seed_from_u64(42),
        );
        Self {
            store,
            events,
            config,
            pairing,
            drain,
            runner,
            validator,
            matcher,
        }
    }

    /// Backdate an order's pairing timestamp, for TTL tests.
    pub async fn backdate_pairing(&self, order_id: Uuid, seconds: i64) {
        let mut order = self
            .store
            .get_order(order_id)
            .await
            .unwrap()
            .expect("order exists");
        let at = order.pairing_created_at.expect("order is pairing") - Duration::seconds(seconds);
        order.pairing_created_at = Some(at);
        self.store.update_order(&order).await.unwrap();
    }

    /// Bind an in-progress order to the agent, making it busy.
    pub async fn make_agent_busy(&self, agent_id: Uuid) -> Order {
        let (_, mut order) = TaskBuilder::new().build(&self.store).await;
        order.agent_id = Some(agent_id);
        order.status = matchmaker_core::state_machine::OrderStatus::InProgress;
        self.store.update_order(&order).await.unwrap();
        order
    }
}
