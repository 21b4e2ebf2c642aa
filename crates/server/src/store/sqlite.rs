//! SQLite persistence backend
//!
//! Timestamps are stored as RFC 3339 text, profiles as a JSON blob.
//! `chat_groups` avoids the GROUPS keyword.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;
use uuid::Uuid;

use super::PersistenceGateway;
use crate::models::{
    GroupRecord, GroupSummary, MessageRecord, StoredMessage, UserProfile, UserRecord, UserSummary,
};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        identity TEXT PRIMARY KEY,
        secret_hash TEXT NOT NULL,
        avatar TEXT NOT NULL DEFAULT '',
        profile TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS chat_groups (
        name TEXT PRIMARY KEY,
        avatar TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS group_members (
        identity TEXT NOT NULL,
        group_name TEXT NOT NULL,
        position INTEGER NOT NULL,
        PRIMARY KEY (identity, group_name)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY,
        sender TEXT NOT NULL,
        body TEXT NOT NULL,
        timestamp TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS group_messages (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        group_name TEXT NOT NULL,
        message_id TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_group_messages_group ON group_messages(group_name, seq)",
];

type MessageRow = (String, String, String, String, Option<String>);

fn decode_message(row: MessageRow) -> Result<StoredMessage> {
    let (id, sender, body, timestamp, avatar) = row;
    Ok(StoredMessage {
        id: Uuid::parse_str(&id).with_context(|| format!("corrupt message id {}", id))?,
        user: UserSummary {
            identity: sender,
            avatar: avatar.unwrap_or_default(),
        },
        body,
        timestamp: timestamp.parse().unwrap_or_else(|_| Utc::now()),
    })
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .with_context(|| format!("open database {}", path.display()))?;

        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }

        info!("[Store] SQLite store ready at {:?}", path);
        Ok(Self { pool })
    }

    async fn group_exists(&self, name: &str) -> Result<bool> {
        let row: Option<(String,)> = sqlx::query_as("SELECT name FROM chat_groups WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn page(&self, name: &str, skip: usize, limit: usize) -> Result<Vec<StoredMessage>> {
        // SQLite reads a negative OFFSET as 0
        let (Ok(skip), Ok(limit)) = (i64::try_from(skip), i64::try_from(limit)) else {
            return Ok(Vec::new());
        };

        let rows: Vec<MessageRow> = sqlx::query_as(
            r#"
            SELECT m.id, m.sender, m.body, m.timestamp, u.avatar
            FROM group_messages g
            JOIN messages m ON m.id = g.message_id
            LEFT JOIN users u ON u.identity = m.sender
            WHERE g.group_name = ?
            ORDER BY g.seq DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(name)
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(decode_message).collect()
    }
}

#[async_trait]
impl PersistenceGateway for SqliteStore {
    async fn fetch_user_summary(&self, identity: &str) -> Result<Option<UserSummary>> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT identity, avatar FROM users WHERE identity = ?")
                .bind(identity)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(identity, avatar)| UserSummary { identity, avatar }))
    }

    async fn fetch_user(&self, identity: &str) -> Result<Option<UserRecord>> {
        let row: Option<(String, String, String, String)> = sqlx::query_as(
            "SELECT identity, secret_hash, profile, created_at FROM users WHERE identity = ?",
        )
        .bind(identity)
        .fetch_optional(&self.pool)
        .await?;

        let Some((identity, secret_hash, profile, created_at)) = row else {
            return Ok(None);
        };

        let groups: Vec<(String,)> = sqlx::query_as(
            "SELECT group_name FROM group_members WHERE identity = ? ORDER BY position",
        )
        .bind(&identity)
        .fetch_all(&self.pool)
        .await?;

        let profile: UserProfile = serde_json::from_str(&profile)
            .with_context(|| format!("corrupt profile for {}", identity))?;

        Ok(Some(UserRecord {
            identity,
            secret_hash,
            profile,
            groups: groups.into_iter().map(|(g,)| g).collect(),
            created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
        }))
    }

    async fn create_user(&self, user: &UserRecord) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO users (identity, secret_hash, avatar, profile, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&user.identity)
        .bind(&user.secret_hash)
        .bind(&user.profile.avatar)
        .bind(serde_json::to_string(&user.profile)?)
        .bind(user.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            return Ok(false);
        }

        for (position, group) in user.groups.iter().enumerate() {
            sqlx::query(
                "INSERT OR IGNORE INTO group_members (identity, group_name, position) VALUES (?, ?, ?)",
            )
            .bind(&user.identity)
            .bind(group)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn save_user(&self, user: &UserRecord) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (identity, secret_hash, avatar, profile, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(identity) DO UPDATE SET
                secret_hash = excluded.secret_hash,
                avatar = excluded.avatar,
                profile = excluded.profile
            "#,
        )
        .bind(&user.identity)
        .bind(&user.secret_hash)
        .bind(&user.profile.avatar)
        .bind(serde_json::to_string(&user.profile)?)
        .bind(user.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM group_members WHERE identity = ?")
            .bind(&user.identity)
            .execute(&mut *tx)
            .await?;

        for (position, group) in user.groups.iter().enumerate() {
            sqlx::query(
                "INSERT OR IGNORE INTO group_members (identity, group_name, position) VALUES (?, ?, ?)",
            )
            .bind(&user.identity)
            .bind(group)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn fetch_group_summary(&self, name: &str) -> Result<Option<GroupSummary>> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT name, avatar FROM chat_groups WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(name, avatar)| GroupSummary::new(name, avatar)))
    }

    async fn fetch_group(&self, name: &str, recent: usize) -> Result<Option<GroupRecord>> {
        let Some(summary) = self.fetch_group_summary(name).await? else {
            return Ok(None);
        };

        let members: Vec<(String,)> = sqlx::query_as(
            "SELECT identity FROM group_members WHERE group_name = ? ORDER BY identity",
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(GroupRecord {
            group_name: summary.group_name,
            avatar: summary.avatar,
            messages: self.page(name, 0, recent).await?,
            members: members.into_iter().map(|(m,)| m).collect(),
        }))
    }

    async fn fetch_group_messages(
        &self,
        name: &str,
        skip: usize,
        limit: usize,
    ) -> Result<Option<Vec<StoredMessage>>> {
        if !self.group_exists(name).await? {
            return Ok(None);
        }
        Ok(Some(self.page(name, skip, limit).await?))
    }

    async fn save_group(&self, group: &GroupSummary) -> Result<()> {
        sqlx::query(
            "INSERT INTO chat_groups (name, avatar) VALUES (?, ?) ON CONFLICT(name) DO UPDATE SET avatar = excluded.avatar",
        )
        .bind(&group.group_name)
        .bind(&group.avatar)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_group_message(
        &self,
        group: &str,
        message: &MessageRecord,
    ) -> Result<Option<Uuid>> {
        let mut tx = self.pool.begin().await?;

        let known: Option<(String,)> = sqlx::query_as("SELECT name FROM chat_groups WHERE name = ?")
            .bind(group)
            .fetch_optional(&mut *tx)
            .await?;
        if known.is_none() {
            return Ok(None);
        }

        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO messages (id, sender, body, timestamp) VALUES (?, ?, ?, ?)")
            .bind(id.to_string())
            .bind(&message.sender)
            .bind(&message.body)
            .bind(message.timestamp.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO group_messages (group_name, message_id) VALUES (?, ?)")
            .bind(group)
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(id))
    }
}
