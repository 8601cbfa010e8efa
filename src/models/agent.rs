use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state_machine::AgentStatus;

/// Agent represents a worker offering capabilities on the marketplace.
///
/// `status`, `queue_size` and `current_order_id` are cached projections of
/// the order and queue tables; writers recompute them from fresh counts and
/// nothing in this core consults them for correctness decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub supported_task_types: Vec<String>,
    /// Minimum accepted reward, minimum-denomination integer string
    pub min_price: String,
    /// Maximum accepted reward, minimum-denomination integer string
    pub max_price: String,
    /// Cached availability class; `None` when the projection is unknown
    pub status: Option<AgentStatus>,
    pub current_order_id: Option<Uuid>,
    pub avg_rating: f64,
    pub completed_order_count: i64,
    /// Cached queued-item count
    pub queue_size: i64,
    pub is_listed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New agent for creation (without generated fields)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAgent {
    pub owner_id: Uuid,
    pub supported_task_types: Vec<String>,
    pub min_price: String,
    pub max_price: String,
    pub is_listed: bool,
}

/// Parse a minimum-denomination amount string. Amounts routinely exceed i64,
/// so they travel as strings and compare as u128.
pub fn parse_amount(raw: &str) -> Option<u128> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<u128>().ok()
}

impl Agent {
    pub fn new(new_agent: NewAgent) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id: new_agent.owner_id,
            supported_task_types: new_agent.supported_task_types,
            min_price: new_agent.min_price,
            max_price: new_agent.max_price,
            status: Some(AgentStatus::Idle),
            current_order_id: None,
            avg_rating: 0.0,
            completed_order_count: 0,
            queue_size: 0,
            is_listed: new_agent.is_listed,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a task reward falls within this agent's accepted price range,
    /// bounds inclusive. Agents with unparseable bounds accept nothing.
    pub fn accepts_reward(&self, reward: u128) -> bool {
        match (parse_amount(&self.min_price), parse_amount(&self.max_price)) {
            (Some(min), Some(max)) => min <= reward && reward <= max,
            _ => false,
        }
    }

    pub fn supports_task_type(&self, task_type: &str) -> bool {
        self.supported_task_types.iter().any(|t| t == task_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent_with_range(min: &str, max: &str) -> Agent {
        Agent::new(NewAgent {
            owner_id: Uuid::new_v4(),
            supported_task_types: vec!["translation".to_string()],
            min_price: min.to_string(),
            max_price: max.to_string(),
            is_listed: true,
        })
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("0"), Some(0));
        assert_eq!(parse_amount(" 1000 "), Some(1000));
        assert_eq!(
            parse_amount("340282366920938463463374607431768211455"),
            Some(u128::MAX)
        );
        assert_eq!(parse_amount("-5"), None);
        assert_eq!(parse_amount("1.5"), None);
        assert_eq!(parse_amount(""), None);
    }

    #[test]
    fn test_accepts_reward_bounds_inclusive() {
        let agent = agent_with_range("100", "500");
        assert!(agent.accepts_reward(100));
        assert!(agent.accepts_reward(300));
        assert!(agent.accepts_reward(500));
        assert!(!agent.accepts_reward(99));
        assert!(!agent.accepts_reward(501));
    }

    #[test]
    fn test_malformed_price_range_accepts_nothing() {
        let agent = agent_with_range("abc", "500");
        assert!(!agent.accepts_reward(200));
    }

    #[test]
    fn test_supports_task_type() {
        let agent = agent_with_range("1", "10");
        assert!(agent.supports_task_type("translation"));
        assert!(!agent.supports_task_type("coding"));
    }
}
