//! # Pairing Coordinator
//!
//! Runs the time-bounded acceptance handshake between an order and the agent
//! selected for it. A pairing lives on the order itself (`agent_id`,
//! `provider_id`, `pairing_created_at`); its terminal outcomes are accept
//! (order moves to in-progress, agent becomes busy) or reject/expire (order
//! returns to standby and the originating queue slot, if any, is canceled).

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::MatchConfig;
use crate::constants::events;
use crate::error::{MatchmakerError, Result};
use crate::events::EventPublisher;
use crate::models::Order;
use crate::state_machine::{assert_transition, OrderStatus, TaskStatus};
use crate::storage::MatchStore;

use super::agent_state::refresh_agent_projection;
use super::types::{ExpirationSweep, PairingInfo, PairingResolution, PairingRole};

#[derive(Clone)]
pub struct PairingCoordinator {
    store: Arc<dyn MatchStore>,
    events: EventPublisher,
    config: MatchConfig,
}

impl PairingCoordinator {
    pub fn new(store: Arc<dyn MatchStore>, events: EventPublisher, config: MatchConfig) -> Self {
        Self {
            store,
            events,
            config,
        }
    }

    /// Open a handshake binding `agent_id` to a standby order.
    #[instrument(skip(self))]
    pub async fn create_pairing(&self, order_id: Uuid, agent_id: Uuid) -> Result<PairingInfo> {
        let mut order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| MatchmakerError::not_found("order", order_id))?;

        if order.status != OrderStatus::Standby {
            return Err(MatchmakerError::InvalidOrderState(format!(
                "order {order_id} is {}, pairing requires standby",
                order.status
            )));
        }
        assert_transition(OrderStatus::Standby, OrderStatus::Pairing)?;

        let agent = self
            .store
            .get_agent(agent_id)
            .await?
            .ok_or_else(|| MatchmakerError::not_found("agent", agent_id))?;
        if !agent.is_listed {
            return Err(MatchmakerError::not_found("agent", agent_id));
        }

        let now = Utc::now();
        order.bind_pairing(agent.id, agent.owner_id, now);
        self.store.update_order(&order).await?;
        self.store
            .set_task_status(order.task_id, TaskStatus::Pairing)
            .await?;

        let info = PairingInfo {
            provider_id: agent.owner_id,
            pairing_created_at: now,
            expires_at: now + self.config.pairing_ttl(),
        };

        info!(order_id = %order_id, agent_id = %agent_id, expires_at = %info.expires_at, "pairing created");
        self.events.publish(
            events::PAIRING_CREATED,
            json!({
                "order_id": order_id,
                "agent_id": agent_id,
                "provider_id": agent.owner_id,
                "expires_at": info.expires_at,
            }),
        );

        Ok(info)
    }

    /// Accept the handshake. Either party's acceptance finalizes the pairing.
    #[instrument(skip(self))]
    pub async fn accept_pairing(
        &self,
        order_id: Uuid,
        user_id: Uuid,
        role: PairingRole,
    ) -> Result<PairingResolution> {
        let mut order = self.load_pairing_order(order_id).await?;
        authorize(&order, user_id, role)?;

        let pairing_created_at = order.pairing_created_at.ok_or_else(|| {
            MatchmakerError::InvalidOrderState(format!(
                "order {order_id} is pairing but has no pairing timestamp"
            ))
        })?;
        let expires_at = pairing_created_at + self.config.pairing_ttl();
        if Utc::now() > expires_at {
            return Err(MatchmakerError::PairingExpired {
                order_id,
                expired_at: expires_at,
            });
        }

        let agent_id = order.agent_id.ok_or_else(|| {
            MatchmakerError::InvalidOrderState(format!(
                "order {order_id} is pairing but has no agent bound"
            ))
        })?;

        assert_transition(OrderStatus::Pairing, OrderStatus::InProgress)?;
        order.status = OrderStatus::InProgress;
        order.updated_at = Utc::now();
        self.store.update_order(&order).await?;

        // Busy now follows from the fresh in-progress count; the binding is
        // recorded explicitly.
        refresh_agent_projection(self.store.as_ref(), agent_id, Some(order_id)).await?;
        self.store
            .set_task_status(order.task_id, TaskStatus::InProgress)
            .await?;

        info!(order_id = %order_id, agent_id = %agent_id, acceptor = %user_id, "pairing accepted");
        self.events.publish(
            events::PAIRING_ACCEPTED,
            json!({ "order_id": order_id, "agent_id": agent_id, "accepted_by": user_id }),
        );

        Ok(PairingResolution {
            order_id,
            status: OrderStatus::InProgress,
        })
    }

    /// Reject the handshake, returning the order to standby and releasing the
    /// originating queue slot if one exists.
    #[instrument(skip(self))]
    pub async fn reject_pairing(
        &self,
        order_id: Uuid,
        user_id: Uuid,
        role: PairingRole,
    ) -> Result<PairingResolution> {
        let order = self.load_pairing_order(order_id).await?;
        authorize(&order, user_id, role)?;

        self.release_pairing(order).await?;

        info!(order_id = %order_id, rejected_by = %user_id, "pairing rejected");
        self.events.publish(
            events::PAIRING_REJECTED,
            json!({ "order_id": order_id, "rejected_by": user_id }),
        );

        Ok(PairingResolution {
            order_id,
            status: OrderStatus::Standby,
        })
    }

    /// Periodic sweep clearing every handshake past its time-to-live.
    ///
    /// Per-item failures are logged and their ids omitted from the result;
    /// the batch always runs to completion.
    #[instrument(skip(self))]
    pub async fn check_pairing_expiration(&self) -> Result<ExpirationSweep> {
        let cutoff = Utc::now() - self.config.pairing_ttl();
        let expired = self.store.find_expired_pairings(cutoff).await?;
        let mut sweep = ExpirationSweep {
            processed_count: expired.len(),
            expired_order_ids: Vec::new(),
        };

        for order in expired {
            let order_id = order.id;
            match self.release_pairing(order).await {
                Ok(()) => {
                    debug!(order_id = %order_id, "expired pairing cleared");
                    self.events
                        .publish(events::PAIRING_EXPIRED, json!({ "order_id": order_id }));
                    sweep.expired_order_ids.push(order_id);
                }
                Err(e) => {
                    warn!(order_id = %order_id, error = %e, "failed to clear expired pairing, skipping");
                }
            }
        }

        if sweep.processed_count > 0 {
            info!(
                processed = sweep.processed_count,
                cleared = sweep.expired_order_ids.len(),
                "pairing expiration sweep finished"
            );
        }
        Ok(sweep)
    }

    async fn load_pairing_order(&self, order_id: Uuid) -> Result<Order> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| MatchmakerError::not_found("order", order_id))?;
        if order.status != OrderStatus::Pairing {
            return Err(MatchmakerError::InvalidOrderState(format!(
                "order {order_id} is {}, expected pairing",
                order.status
            )));
        }
        Ok(order)
    }

    /// Shared clearing path for reject and expire: order back to standby,
    /// queue slot canceled, agent projection refreshed, task mirror reset.
    async fn release_pairing(&self, mut order: Order) -> Result<()> {
        assert_transition(OrderStatus::Pairing, OrderStatus::Standby)?;

        let agent_id = order.agent_id;
        order.clear_pairing();
        self.store.update_order(&order).await?;

        if let Some(agent_id) = agent_id {
            // Safe even when no queue slot exists for the pair.
            if self.store.cancel_queued(agent_id, order.id).await? {
                self.events.publish(
                    events::QUEUE_ITEM_CANCELED,
                    json!({ "agent_id": agent_id, "order_id": order.id }),
                );
            }
            refresh_agent_projection(self.store.as_ref(), agent_id, None).await?;
        }

        self.store
            .set_task_status(order.task_id, TaskStatus::Published)
            .await?;
        Ok(())
    }
}

fn authorize(order: &Order, user_id: Uuid, role: PairingRole) -> Result<()> {
    let authorized = match role {
        PairingRole::Creator => order.creator_id == user_id,
        PairingRole::Provider => order.provider_id == Some(user_id),
    };
    if authorized {
        Ok(())
    } else {
        Err(MatchmakerError::Forbidden(format!(
            "user {user_id} is not the order's {role:?}",
        )))
    }
}
