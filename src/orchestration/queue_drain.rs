//! # Queue Drain Coordinator
//!
//! Invoked whenever an agent becomes free: claims the agent's next queued
//! order and converts the reservation into a pairing handshake. Every
//! "nothing to do" condition short-circuits with `consumed: false` rather
//! than erroring, so availability triggers can fire it liberally.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::constants::events;
use crate::error::Result;
use crate::events::EventPublisher;
use crate::state_machine::OrderStatus;
use crate::storage::MatchStore;

use super::agent_state::refresh_agent_projection;
use super::pairing::PairingCoordinator;
use super::types::DrainOutcome;

#[derive(Clone)]
pub struct QueueDrainCoordinator {
    store: Arc<dyn MatchStore>,
    pairing: PairingCoordinator,
    events: EventPublisher,
}

impl QueueDrainCoordinator {
    pub fn new(
        store: Arc<dyn MatchStore>,
        pairing: PairingCoordinator,
        events: EventPublisher,
    ) -> Self {
        Self {
            store,
            pairing,
            events,
        }
    }

    /// Claim and pair the agent's next queued order, if any.
    #[instrument(skip(self))]
    pub async fn consume_next(&self, agent_id: Uuid) -> Result<DrainOutcome> {
        let Some(_agent) = self.store.get_agent(agent_id).await? else {
            warn!(agent_id = %agent_id, "drain requested for unknown agent");
            return Ok(DrainOutcome::nothing());
        };

        // An agent finishing one job must not double-claim before the prior
        // job is fully closed out.
        let in_progress = self.store.count_in_progress_orders(agent_id).await?;
        if in_progress > 0 {
            warn!(
                agent_id = %agent_id,
                in_progress,
                "drain aborted: agent still has in-progress orders"
            );
            return Ok(DrainOutcome::nothing());
        }

        let Some(item) = self.store.atomic_claim_next(agent_id).await? else {
            debug!(agent_id = %agent_id, "queue empty, nothing to drain");
            return Ok(DrainOutcome::nothing());
        };
        self.events.publish(
            events::QUEUE_ITEM_CLAIMED,
            json!({ "agent_id": agent_id, "order_id": item.order_id, "queue_item_id": item.id }),
        );

        // A race may have moved the order on while it sat queued; the claim
        // stays consumed either way, the item is never re-queued.
        let order = self.store.get_order(item.order_id).await?;
        let order = match order {
            Some(order) if order.status == OrderStatus::Standby => order,
            Some(order) => {
                warn!(
                    order_id = %item.order_id,
                    status = %order.status,
                    "claimed order no longer standby, dropping claim"
                );
                return Ok(DrainOutcome::nothing());
            }
            None => {
                warn!(order_id = %item.order_id, "claimed order vanished, dropping claim");
                return Ok(DrainOutcome::nothing());
            }
        };

        let pairing = self.pairing.create_pairing(order.id, agent_id).await?;

        // The agent is off its prior job; the new pairing owns its next
        // assignment, so no busy binding is recorded here.
        refresh_agent_projection(self.store.as_ref(), agent_id, None).await?;

        Ok(DrainOutcome::consumed(order.id, pairing))
    }

    /// Drain up to `max_count` queued orders. Partial success is a valid
    /// result: draining stops at the first empty claim or failure and returns
    /// the outcomes achieved so far.
    #[instrument(skip(self))]
    pub async fn consume_batch(&self, agent_id: Uuid, max_count: usize) -> Vec<DrainOutcome> {
        let mut outcomes = Vec::new();
        for _ in 0..max_count {
            match self.consume_next(agent_id).await {
                Ok(outcome) if outcome.consumed => outcomes.push(outcome),
                Ok(_) => break,
                Err(e) => {
                    warn!(agent_id = %agent_id, error = %e, "drain batch stopped on error");
                    break;
                }
            }
        }
        outcomes
    }
}
