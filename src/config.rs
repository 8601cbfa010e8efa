//! Configuration for the matching core.
//!
//! Every limit has a compiled-in default from [`crate::constants::defaults`];
//! deployments override individual values through `MATCHMAKER_`-prefixed
//! environment variables (e.g. `MATCHMAKER_QUEUE_CAPACITY=10`).

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::constants::defaults;
use crate::error::{MatchmakerError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Maximum queued (unconsumed) items per agent
    pub queue_capacity: i64,
    /// Pairing handshake time-to-live in seconds
    pub pairing_ttl_seconds: u64,
    /// Number of agents selected for parallel execution
    pub fanout_size: usize,
    /// Size of the ranked pool the fan-out selection draws from
    pub candidate_pool_size: usize,
    /// Minimum eligible candidates required before auto-matching
    pub min_candidates: usize,
    /// Broadcast capacity of the lifecycle event channel
    pub event_channel_capacity: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: defaults::QUEUE_MAX_N,
            pairing_ttl_seconds: defaults::PAIRING_TTL_SECONDS,
            fanout_size: defaults::FANOUT_SIZE,
            candidate_pool_size: defaults::CANDIDATE_POOL_SIZE,
            min_candidates: defaults::MIN_CANDIDATES,
            event_channel_capacity: defaults::EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl MatchConfig {
    /// Load configuration from the environment, falling back to defaults for
    /// anything not set.
    pub fn from_env() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("MATCHMAKER"))
            .build()
            .map_err(|e| MatchmakerError::Validation(format!("configuration error: {e}")))?;

        let loaded: Self = config
            .try_deserialize()
            .map_err(|e| MatchmakerError::Validation(format!("configuration error: {e}")))?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn pairing_ttl(&self) -> Duration {
        Duration::seconds(self.pairing_ttl_seconds as i64)
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity < 1 {
            return Err(MatchmakerError::Validation(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.fanout_size == 0 {
            return Err(MatchmakerError::Validation(
                "fanout_size must be at least 1".to_string(),
            ));
        }
        if self.min_candidates < self.fanout_size {
            return Err(MatchmakerError::Validation(
                "min_candidates must be at least fanout_size".to_string(),
            ));
        }
        if self.candidate_pool_size < self.fanout_size {
            return Err(MatchmakerError::Validation(
                "candidate_pool_size must be at least fanout_size".to_string(),
            ));
        }
        Ok(())
    }
}
