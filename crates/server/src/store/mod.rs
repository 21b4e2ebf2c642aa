//! Persistence gateway
//!
//! Durable home of users, groups and messages. The routing core only ever
//! talks to [`PersistenceGateway`]; the schema behind it belongs to the
//! backend.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    GroupRecord, GroupSummary, MessageRecord, StoredMessage, UserRecord, UserSummary,
};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Identity and display attributes only
    async fn fetch_user_summary(&self, identity: &str) -> Result<Option<UserSummary>>;

    /// Full record including secret hash and group list
    async fn fetch_user(&self, identity: &str) -> Result<Option<UserRecord>>;

    /// Insert a new user. Returns false if the identity is taken.
    async fn create_user(&self, user: &UserRecord) -> Result<bool>;

    /// Overwrite an existing user's profile, secret and group list
    async fn save_user(&self, user: &UserRecord) -> Result<()>;

    async fn fetch_group_summary(&self, name: &str) -> Result<Option<GroupSummary>>;

    /// Group with members and its `recent` newest messages
    async fn fetch_group(&self, name: &str, recent: usize) -> Result<Option<GroupRecord>>;

    /// One page of the group log, newest first. `None` for unknown groups.
    async fn fetch_group_messages(
        &self,
        name: &str,
        skip: usize,
        limit: usize,
    ) -> Result<Option<Vec<StoredMessage>>>;

    /// Create the group or update its avatar
    async fn save_group(&self, group: &GroupSummary) -> Result<()>;

    /// Store a message and append it to the group log as one step.
    /// `None` if the group does not exist; nothing is written then.
    async fn save_group_message(
        &self,
        group: &str,
        message: &MessageRecord,
    ) -> Result<Option<Uuid>>;
}
