//! # Orchestration
//!
//! The coordinators that drive orders through the matching lifecycle:
//! pairing handshakes, queue draining on agent availability, and the
//! top-level match coordinator with its parallel-execution fan-out.

pub mod agent_state;
pub mod match_coordinator;
pub mod pairing;
pub mod queue_drain;
pub mod runner;
pub mod types;

pub use agent_state::compute_agent_status;
pub use match_coordinator::MatchCoordinator;
pub use pairing::PairingCoordinator;
pub use queue_drain::QueueDrainCoordinator;
pub use runner::{
    CredentialCheck, CredentialValidator, ExecutionRequest, ExecutionRunner, RunnerOutcome,
    RunnerStatus,
};
pub use types::{
    CandidateView, DrainOutcome, ExecutionLaunch, ExpirationSweep, FanoutHandle, FanoutSummary,
    MatchOutcome, PairingInfo, PairingResolution, PairingRole, ParallelMatchResult,
    SelectionOutcome,
};
