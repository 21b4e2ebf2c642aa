//! Channel router
//!
//! Decides where a message goes and whether it is kept.

use std::sync::Arc;

use tracing::debug;

use super::key::PrivateChannelKey;
use crate::error::{ChatError, Result};
use crate::models::Envelope;
use crate::protocol::ServerFrame;
use crate::session::{ConnectionId, SessionRegistry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelKind {
    Group,
    Private { counterpart: String },
}

/// Canonical delivery target of a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub channel: String,
    pub kind: ChannelKind,
}

impl ResolvedTarget {
    pub fn is_private(&self) -> bool {
        matches!(self.kind, ChannelKind::Private { .. })
    }

    pub fn counterpart(&self) -> Option<&str> {
        match &self.kind {
            ChannelKind::Private { counterpart } => Some(counterpart),
            ChannelKind::Group => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryPolicy {
    pub broadcast: bool,
    pub persist: bool,
}

/// Private messages are broadcast only; group messages are also persisted.
pub fn delivery_policy(is_private: bool) -> DeliveryPolicy {
    DeliveryPolicy {
        broadcast: true,
        persist: !is_private,
    }
}

pub struct ChannelRouter {
    registry: Arc<SessionRegistry>,
}

impl ChannelRouter {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn resolve_target(&self, sender: &str, raw_channel: &str) -> Result<ResolvedTarget> {
        if raw_channel.trim().is_empty() {
            return Err(ChatError::protocol("empty channel name"));
        }

        let Some(key) = PrivateChannelKey::parse(raw_channel)? else {
            return Ok(ResolvedTarget {
                channel: raw_channel.to_string(),
                kind: ChannelKind::Group,
            });
        };

        let counterpart = key.counterpart(sender).ok_or_else(|| {
            ChatError::protocol(format!("{} is not a participant of {}", sender, key))
        })?;

        Ok(ResolvedTarget {
            channel: key.channel_name(),
            kind: ChannelKind::Private {
                counterpart: counterpart.to_string(),
            },
        })
    }

    /// Lazily subscribe every live session of `counterpart` to `channel`.
    /// Returns how many sessions were newly joined.
    pub fn ensure_subscribed(&self, counterpart: &str, channel: &str) -> usize {
        let mut joined = 0;
        for session in self.registry.sessions_for_identity(counterpart) {
            if self.registry.join_channel(session.connection, channel) {
                debug!(
                    "[Router] {} auto-subscribed to {} ({})",
                    counterpart, channel, session.connection
                );
                joined += 1;
            }
        }
        joined
    }

    /// Push `envelope` to every subscriber of `channel` except the sender.
    /// Returns how many connections accepted the frame.
    pub fn broadcast(&self, channel: &str, sender: ConnectionId, envelope: &Envelope) -> usize {
        let targets = self.registry.subscribers(channel, Some(sender));
        let frame = ServerFrame::message(envelope);
        targets
            .iter()
            .filter(|handle| handle.send(frame.clone()))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserSummary;
    use crate::session::ConnectionHandle;

    fn router() -> ChannelRouter {
        ChannelRouter::new(Arc::new(SessionRegistry::new()))
    }

    fn envelope(from: &str, channel: &str) -> Envelope {
        let user = UserSummary {
            identity: from.to_string(),
            avatar: String::new(),
        };
        Envelope::new(user, "hi", channel)
    }

    #[test]
    fn resolves_group_and_private_targets() {
        let router = router();

        let group = router.resolve_target("alice", "lobby").unwrap();
        assert_eq!(group.channel, "lobby");
        assert!(!group.is_private());

        let private = router.resolve_target("alice", "bob&&alice").unwrap();
        assert_eq!(private.channel, "alice&&bob");
        assert_eq!(private.counterpart(), Some("bob"));
    }

    #[test]
    fn outsiders_cannot_target_a_pairing() {
        let router = router();
        let err = router.resolve_target("carol", "alice&&bob").unwrap_err();
        assert!(matches!(err, ChatError::Protocol(_)));
        assert!(router.resolve_target("alice", "").is_err());
    }

    #[test]
    fn policy_persists_only_group_messages() {
        assert_eq!(
            delivery_policy(true),
            DeliveryPolicy {
                broadcast: true,
                persist: false
            }
        );
        assert!(delivery_policy(false).persist);
    }

    #[test]
    fn ensure_subscribed_joins_online_counterpart_once() {
        let router = router();
        let (bob, _rx) = ConnectionHandle::channel();
        router.registry().add_session(&bob, "bob", &[]);

        assert_eq!(router.ensure_subscribed("bob", "alice&&bob"), 1);
        assert_eq!(router.ensure_subscribed("bob", "alice&&bob"), 0);
        assert_eq!(router.ensure_subscribed("nobody", "alice&&nobody"), 0);

        let session = router.registry().session(bob.id()).unwrap();
        assert_eq!(session.channels, vec!["alice&&bob".to_string()]);
    }

    #[test]
    fn broadcast_skips_sender() {
        let router = router();
        let (alice, mut alice_rx) = ConnectionHandle::channel();
        let (bob, mut bob_rx) = ConnectionHandle::channel();
        let lobby = vec!["lobby".to_string()];
        router.registry().add_session(&alice, "alice", &lobby);
        router.registry().add_session(&bob, "bob", &lobby);

        let delivered = router.broadcast("lobby", alice.id(), &envelope("alice", "lobby"));

        assert_eq!(delivered, 1);
        assert!(alice_rx.try_recv().is_err());
        let frame = bob_rx.try_recv().unwrap();
        assert_eq!(frame.event_name(), Some("message"));
    }

    #[test]
    fn broadcast_preserves_issue_order() {
        let router = router();
        let (alice, _alice_rx) = ConnectionHandle::channel();
        let (bob, mut bob_rx) = ConnectionHandle::channel();
        let lobby = vec!["lobby".to_string()];
        router.registry().add_session(&alice, "alice", &lobby);
        router.registry().add_session(&bob, "bob", &lobby);

        for n in 0..5 {
            let mut env = envelope("alice", "lobby");
            env.body = n.to_string();
            router.broadcast("lobby", alice.id(), &env);
        }

        for n in 0..5 {
            let frame = bob_rx.try_recv().unwrap();
            assert_eq!(frame.data()["body"], n.to_string());
        }
    }
}
