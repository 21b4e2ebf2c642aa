//! Message dispatcher
//!
//! Turns a raw client message into an [`Envelope`], fans it out through the
//! router and persists group messages. Failures end the current dispatch
//! only and are never reported back to the sender.

use std::sync::Arc;

use anyhow::Context;
use tracing::debug;
use uuid::Uuid;

use crate::error::{ChatError, Result};
use crate::models::{Envelope, RawMessage};
use crate::routing::{delivery_policy, ChannelRouter};
use crate::session::ConnectionId;
use crate::store::PersistenceGateway;

/// What a single dispatch did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub channel: String,
    /// Connections that received the envelope
    pub delivered: usize,
    /// Counterpart sessions subscribed on the fly
    pub lazily_joined: usize,
    pub persisted: Option<Uuid>,
}

pub struct MessageDispatcher {
    router: Arc<ChannelRouter>,
    store: Arc<dyn PersistenceGateway>,
}

impl MessageDispatcher {
    pub fn new(router: Arc<ChannelRouter>, store: Arc<dyn PersistenceGateway>) -> Self {
        Self { router, store }
    }

    /// Fire-and-forget entry point used by the socket loop
    pub async fn dispatch(&self, conn: ConnectionId, raw: RawMessage) {
        if let Err(e) = self.try_dispatch(conn, raw).await {
            e.log("message");
        }
    }

    pub async fn try_dispatch(
        &self,
        conn: ConnectionId,
        raw: RawMessage,
    ) -> Result<DispatchOutcome> {
        let session = self
            .router
            .registry()
            .session(conn)
            .ok_or_else(|| {
                ChatError::protocol(format!("message from unbound connection {}", conn))
            })?;

        let sender = self
            .store
            .fetch_user_summary(&session.identity)
            .await
            .context("load sender")?
            .ok_or_else(|| ChatError::not_found("user", &session.identity))?;

        let target = self.router.resolve_target(&sender.identity, &raw.channel_name)?;

        let lazily_joined = match target.counterpart() {
            Some(counterpart) => self.router.ensure_subscribed(counterpart, &target.channel),
            None => 0,
        };

        let envelope = Envelope::new(sender, raw.body, target.channel.clone());
        let policy = delivery_policy(target.is_private());

        let delivered = if policy.broadcast {
            self.router.broadcast(&target.channel, conn, &envelope)
        } else {
            0
        };

        let persisted = if policy.persist {
            Some(self.persist(&target.channel, &envelope).await?)
        } else {
            None
        };

        debug!(
            "[Dispatch] {} -> {} (delivered {}, persisted {})",
            envelope.user.identity,
            target.channel,
            delivered,
            persisted.is_some()
        );

        Ok(DispatchOutcome {
            channel: target.channel,
            delivered,
            lazily_joined,
            persisted,
        })
    }

    async fn persist(&self, group: &str, envelope: &Envelope) -> Result<Uuid> {
        self.store
            .save_group_message(group, &envelope.to_record())
            .await
            .context("save group message")?
            .ok_or_else(|| ChatError::not_found("group", group))
    }
}
