//! In-memory persistence backend

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::PersistenceGateway;
use crate::models::{
    GroupRecord, GroupSummary, MessageRecord, StoredMessage, UserRecord, UserSummary,
};

struct GroupEntry {
    summary: GroupSummary,
    /// Message ids in append order
    log: Vec<Uuid>,
}

#[derive(Default)]
struct MemoryInner {
    users: HashMap<String, UserRecord>,
    groups: HashMap<String, GroupEntry>,
    messages: HashMap<Uuid, MessageRecord>,
}

impl MemoryInner {
    fn page(&self, entry: &GroupEntry, skip: usize, limit: usize) -> Vec<StoredMessage> {
        entry
            .log
            .iter()
            .rev()
            .skip(skip)
            .take(limit)
            .filter_map(|id| {
                let message = self.messages.get(id)?;
                let avatar = self
                    .users
                    .get(&message.sender)
                    .map(|u| u.profile.avatar.clone())
                    .unwrap_or_default();
                Some(StoredMessage {
                    id: *id,
                    user: UserSummary {
                        identity: message.sender.clone(),
                        avatar,
                    },
                    body: message.body.clone(),
                    timestamp: message.timestamp,
                })
            })
            .collect()
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistenceGateway for MemoryStore {
    async fn fetch_user_summary(&self, identity: &str) -> Result<Option<UserSummary>> {
        Ok(self.inner.read().await.users.get(identity).map(UserRecord::summary))
    }

    async fn fetch_user(&self, identity: &str) -> Result<Option<UserRecord>> {
        Ok(self.inner.read().await.users.get(identity).cloned())
    }

    async fn create_user(&self, user: &UserRecord) -> Result<bool> {
        let mut inner = self.inner.write().await;
        if inner.users.contains_key(&user.identity) {
            return Ok(false);
        }
        inner.users.insert(user.identity.clone(), user.clone());
        Ok(true)
    }

    async fn save_user(&self, user: &UserRecord) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.users.insert(user.identity.clone(), user.clone());
        Ok(())
    }

    async fn fetch_group_summary(&self, name: &str) -> Result<Option<GroupSummary>> {
        Ok(self
            .inner
            .read()
            .await
            .groups
            .get(name)
            .map(|g| g.summary.clone()))
    }

    async fn fetch_group(&self, name: &str, recent: usize) -> Result<Option<GroupRecord>> {
        let inner = self.inner.read().await;
        let Some(entry) = inner.groups.get(name) else {
            return Ok(None);
        };
        let mut members: Vec<String> = inner
            .users
            .values()
            .filter(|u| u.groups.iter().any(|g| g == name))
            .map(|u| u.identity.clone())
            .collect();
        members.sort();

        Ok(Some(GroupRecord {
            group_name: entry.summary.group_name.clone(),
            avatar: entry.summary.avatar.clone(),
            messages: inner.page(entry, 0, recent),
            members,
        }))
    }

    async fn fetch_group_messages(
        &self,
        name: &str,
        skip: usize,
        limit: usize,
    ) -> Result<Option<Vec<StoredMessage>>> {
        let inner = self.inner.read().await;
        Ok(inner
            .groups
            .get(name)
            .map(|entry| inner.page(entry, skip, limit)))
    }

    async fn save_group(&self, group: &GroupSummary) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .groups
            .entry(group.group_name.clone())
            .and_modify(|entry| entry.summary.avatar = group.avatar.clone())
            .or_insert_with(|| GroupEntry {
                summary: group.clone(),
                log: Vec::new(),
            });
        Ok(())
    }

    async fn save_group_message(
        &self,
        group: &str,
        message: &MessageRecord,
    ) -> Result<Option<Uuid>> {
        let mut inner = self.inner.write().await;
        let Some(entry) = inner.groups.get_mut(group) else {
            return Ok(None);
        };
        let id = Uuid::new_v4();
        entry.log.push(id);
        inner.messages.insert(id, message.clone());
        Ok(Some(id))
    }
}
