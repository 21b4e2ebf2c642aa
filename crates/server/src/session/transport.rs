//! Transport-level plumbing
//!
//! A [`ConnectionHandle`] is the server's end of one live socket: pushing a
//! frame into it queues the frame for that socket's writer task. The
//! [`ChannelHub`] is the transport's view of room membership, i.e. which
//! connections a broadcast on a given channel reaches.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::protocol::ServerFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.0.simple().to_string();
        f.write_str(&id[..8])
    }
}

/// Sending side of a live connection
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<ServerFrame>,
}

impl ConnectionHandle {
    pub fn new(tx: mpsc::UnboundedSender<ServerFrame>) -> Self {
        Self {
            id: ConnectionId::new(),
            tx,
        }
    }

    /// New handle plus the receiver its writer task drains
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ServerFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a frame. Returns false once the socket is gone.
    pub fn send(&self, frame: ServerFrame) -> bool {
        self.tx.send(frame).is_ok()
    }
}

/// Channel name -> subscribed connections
#[derive(Debug, Default)]
pub struct ChannelHub {
    rooms: HashMap<String, BTreeSet<ConnectionId>>,
}

impl ChannelHub {
    pub fn join(&mut self, channel: &str, conn: ConnectionId) -> bool {
        self.rooms.entry(channel.to_string()).or_default().insert(conn)
    }

    pub fn leave(&mut self, channel: &str, conn: ConnectionId) -> bool {
        let Some(room) = self.rooms.get_mut(channel) else {
            return false;
        };
        let removed = room.remove(&conn);
        if room.is_empty() {
            self.rooms.remove(channel);
        }
        removed
    }

    pub fn members(&self, channel: &str) -> impl Iterator<Item = ConnectionId> + '_ {
        self.rooms.get(channel).into_iter().flatten().copied()
    }

    /// Every channel `conn` is subscribed to
    pub fn channels_of(&self, conn: ConnectionId) -> BTreeSet<String> {
        self.rooms
            .iter()
            .filter(|(_, room)| room.contains(&conn))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_rooms_are_dropped() {
        let mut hub = ChannelHub::default();
        let a = ConnectionId::new();
        let b = ConnectionId::new();

        assert!(hub.join("lobby", a));
        assert!(!hub.join("lobby", a));
        assert!(hub.join("lobby", b));
        assert_eq!(hub.members("lobby").count(), 2);

        assert!(hub.leave("lobby", a));
        assert!(hub.leave("lobby", b));
        assert!(!hub.leave("lobby", b));
        assert!(hub.rooms.is_empty());
    }

    #[test]
    fn closed_handle_reports_failure() {
        let (handle, rx) = ConnectionHandle::channel();
        assert!(handle.send(ServerFrame::ack(1, serde_json::Value::Null)));
        drop(rx);
        assert!(!handle.send(ServerFrame::ack(1, serde_json::Value::Null)));
    }
}
