#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

//! # Matchmaker Core
//!
//! Core engine that assigns customer orders to capacity-constrained agents,
//! coordinates the pairing handshake, and drives orders through parallel
//! execution and result selection.
//!
//! ## Architecture
//!
//! - **[`state_machine`]**: pure order-status transition validation
//! - **[`ranking`]**: deterministic multi-criteria agent ordering
//! - **[`storage`]**: the `MatchStore` contract (idempotent enqueue, FIFO
//!   single-winner claim) with in-memory and PostgreSQL backends
//! - **[`orchestration`]**: the pairing, queue-drain and match coordinators
//! - **[`models`]**: orders, agents, queue reservations, executions, tasks
//! - **[`events`]**: broadcast lifecycle event bus
//! - **[`config`]** / **[`constants`]** / **[`error`]** / **[`logging`]**:
//!   ambient plumbing
//!
//! All coordination is pushed into the storage layer's atomic-claim and
//! unique-constraint primitives; the coordinators themselves hold no shared
//! mutable state and can be called from any number of request handlers plus
//! a periodic expiration sweep.
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use matchmaker_core::config::MatchConfig;
//! use matchmaker_core::events::EventPublisher;
//! use matchmaker_core::orchestration::PairingCoordinator;
//! use matchmaker_core::storage::{InMemoryStore, MatchStore};
//!
//! # tokio_test::block_on(async {
//! let store: Arc<dyn MatchStore> = Arc::new(InMemoryStore::new());
//! let config = MatchConfig::default();
//! let pairing = PairingCoordinator::new(store, EventPublisher::default(), config);
//!
//! let sweep = pairing.check_pairing_expiration().await.unwrap();
//! assert!(sweep.expired_order_ids.is_empty());
//! # });
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod ranking;
pub mod state_machine;
pub mod storage;

pub use config::MatchConfig;
pub use error::{ErrorClass, MatchmakerError, Result};
pub use orchestration::{
    MatchCoordinator, PairingCoordinator, QueueDrainCoordinator,
};
pub use ranking::rank_agents;
pub use state_machine::{assert_transition, OrderStatus, TransitionError};
pub use storage::{InMemoryStore, MatchStore, PgStore, StorageError};
