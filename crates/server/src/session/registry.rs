//! Session registry
//!
//! Authoritative map from live connections to identities and their channel
//! subscriptions. Session state and transport room membership live behind
//! one lock, so a join or leave updates both as a single observable step and
//! a broadcast snapshot never sees one without the other.

use std::collections::{BTreeSet, HashMap};

use parking_lot::RwLock;
use tracing::{debug, info};

use super::transport::{ChannelHub, ConnectionHandle, ConnectionId};

/// Snapshot of one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub connection: ConnectionId,
    pub identity: String,
    /// Subscribed channels in subscription order
    pub channels: Vec<String>,
}

struct SessionEntry {
    identity: String,
    channels: Vec<String>,
    handle: ConnectionHandle,
}

impl SessionEntry {
    fn snapshot(&self) -> Session {
        Session {
            connection: self.handle.id(),
            identity: self.identity.clone(),
            channels: self.channels.clone(),
        }
    }
}

#[derive(Default)]
struct RegistryInner {
    sessions: HashMap<ConnectionId, SessionEntry>,
    /// Identity -> connections, oldest login first
    identities: HashMap<String, Vec<ConnectionId>>,
    hub: ChannelHub,
}

impl RegistryInner {
    fn detach(&mut self, conn: ConnectionId) -> Option<SessionEntry> {
        let entry = self.sessions.remove(&conn)?;
        for channel in &entry.channels {
            self.hub.leave(channel, conn);
        }
        if let Some(conns) = self.identities.get_mut(&entry.identity) {
            conns.retain(|c| *c != conn);
            if conns.is_empty() {
                self.identities.remove(&entry.identity);
            }
        }
        Some(entry)
    }
}

#[derive(Default)]
pub struct SessionRegistry {
    inner: RwLock<RegistryInner>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `identity` to the connection and subscribe it to `groups`.
    ///
    /// Never fails. A second login under the same identity gets its own
    /// entry; a second login on the same connection replaces the first.
    pub fn add_session(
        &self,
        handle: &ConnectionHandle,
        identity: &str,
        groups: &[String],
    ) -> Session {
        let conn = handle.id();
        let mut inner = self.inner.write();

        if let Some(previous) = inner.detach(conn) {
            info!(
                "[Registry] Connection {} rebinding from {} to {}",
                conn, previous.identity, identity
            );
        }

        let mut channels: Vec<String> = Vec::with_capacity(groups.len());
        for group in groups {
            if channels.contains(group) {
                continue;
            }
            inner.hub.join(group, conn);
            channels.push(group.clone());
        }

        let entry = SessionEntry {
            identity: identity.to_string(),
            channels,
            handle: handle.clone(),
        };
        let session = entry.snapshot();
        inner.sessions.insert(conn, entry);
        inner
            .identities
            .entry(identity.to_string())
            .or_default()
            .push(conn);

        info!("[Registry] User logged in: {}", identity);
        info!("[Registry] Online sessions: {}", inner.sessions.len());
        session
    }

    /// Unsubscribe from every channel and forget the session.
    /// No-op for a connection with no bound identity.
    pub fn remove_session(&self, conn: ConnectionId) -> Option<Session> {
        let mut inner = self.inner.write();
        let entry = inner.detach(conn)?;
        info!("[Registry] User logged out: {}", entry.identity);
        info!("[Registry] Online sessions: {}", inner.sessions.len());
        Some(entry.snapshot())
    }

    /// Returns true if the session was not yet subscribed
    pub fn join_channel(&self, conn: ConnectionId, channel: &str) -> bool {
        let mut inner = self.inner.write();
        let RegistryInner { sessions, hub, .. } = &mut *inner;
        let Some(entry) = sessions.get_mut(&conn) else {
            return false;
        };
        if entry.channels.iter().any(|c| c == channel) {
            return false;
        }
        entry.channels.push(channel.to_string());
        hub.join(channel, conn);
        debug!("[Registry] {} joined {}", entry.identity, channel);
        true
    }

    /// Returns true if the session was subscribed
    pub fn leave_channel(&self, conn: ConnectionId, channel: &str) -> bool {
        let mut inner = self.inner.write();
        let RegistryInner { sessions, hub, .. } = &mut *inner;
        let Some(entry) = sessions.get_mut(&conn) else {
            return false;
        };
        let Some(index) = entry.channels.iter().position(|c| c == channel) else {
            return false;
        };
        entry.channels.remove(index);
        hub.leave(channel, conn);
        debug!("[Registry] {} left {}", entry.identity, channel);
        true
    }

    pub fn session(&self, conn: ConnectionId) -> Option<Session> {
        self.inner.read().sessions.get(&conn).map(SessionEntry::snapshot)
    }

    /// Oldest live session bound to `identity`
    pub fn find_by_identity(&self, identity: &str) -> Option<Session> {
        let inner = self.inner.read();
        let conn = inner.identities.get(identity)?.first()?;
        inner.sessions.get(conn).map(SessionEntry::snapshot)
    }

    /// Every live session bound to `identity`, oldest first
    pub fn sessions_for_identity(&self, identity: &str) -> Vec<Session> {
        let inner = self.inner.read();
        inner
            .identities
            .get(identity)
            .into_iter()
            .flatten()
            .filter_map(|conn| inner.sessions.get(conn))
            .map(SessionEntry::snapshot)
            .collect()
    }

    /// Consistent snapshot of the connections subscribed to `channel`
    pub fn subscribers(
        &self,
        channel: &str,
        exclude: Option<ConnectionId>,
    ) -> Vec<ConnectionHandle> {
        let inner = self.inner.read();
        inner
            .hub
            .members(channel)
            .filter(|conn| Some(*conn) != exclude)
            .filter_map(|conn| inner.sessions.get(&conn))
            .map(|entry| entry.handle.clone())
            .collect()
    }

    /// Channels the transport currently routes to `conn`
    pub fn transport_subscriptions(&self, conn: ConnectionId) -> BTreeSet<String> {
        self.inner.read().hub.channels_of(conn)
    }

    pub fn online_count(&self) -> usize {
        self.inner.read().sessions.len()
    }
}
