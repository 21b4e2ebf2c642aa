//! Presence tracking
//!
//! Which connections are live, who they belong to, and which channels each
//! one is subscribed to.

pub mod registry;
pub mod transport;

pub use registry::{Session, SessionRegistry};
pub use transport::{ChannelHub, ConnectionHandle, ConnectionId};
