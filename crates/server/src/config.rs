//! Chat server configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::Duration;
use tracing::{info, warn};

use crate::auth::{AuthGateway, TokenAuth};
use crate::dispatch::MessageDispatcher;
use crate::models::GroupSummary;
use crate::routing::ChannelRouter;
use crate::session::SessionRegistry;
use crate::store::{MemoryStore, PersistenceGateway, SqliteStore};
use crate::upload::{UploadConfig, UploadSigner};

const DEFAULT_AVATAR: &str = "https://aether.chat/static/avatar/default.png";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Sqlite,
    Memory,
}

impl StorageBackend {
    fn from_env_value(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "memory" => StorageBackend::Memory,
            _ => StorageBackend::Sqlite,
        }
    }
}

/// Configuration for the Aether chat server
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Root for the database and other local files
    pub data_dir: PathBuf,
    pub storage: StorageBackend,
    /// Group every new user joins
    pub main_group: String,
    pub default_avatar: String,
    /// Messages per `fetch_history` page
    pub history_page_size: usize,
    /// Messages included in group views
    pub recent_messages: usize,
    pub token_secret: Vec<u8>,
    pub token_ttl: Duration,
    pub bcrypt_cost: u32,
    pub upload: UploadConfig,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("Ignoring unparsable {}={:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        let token_secret = match std::env::var("AETHER_TOKEN_SECRET") {
            Ok(secret) if !secret.is_empty() => secret.into_bytes(),
            _ => {
                warn!("AETHER_TOKEN_SECRET not set, tokens will not survive a restart");
                uuid::Uuid::new_v4().as_bytes().to_vec()
            }
        };

        Self {
            bind_addr: env_parse("AETHER_ADDR", SocketAddr::from(([0, 0, 0, 0], 3001))),
            data_dir: PathBuf::from(env_or("AETHER_ROOT", "aether_data")),
            storage: StorageBackend::from_env_value(&env_or("AETHER_STORAGE", "sqlite")),
            main_group: env_or("AETHER_MAIN_GROUP", "Aether"),
            default_avatar: env_or("AETHER_DEFAULT_AVATAR", DEFAULT_AVATAR),
            history_page_size: env_parse("AETHER_HISTORY_PAGE", 30),
            recent_messages: 30,
            token_secret,
            token_ttl: Duration::days(3),
            bcrypt_cost: env_parse("AETHER_BCRYPT_COST", bcrypt::DEFAULT_COST),
            upload: UploadConfig {
                access_key: env_or("AETHER_UPLOAD_ACCESS_KEY", ""),
                secret_key: env_or("AETHER_UPLOAD_SECRET_KEY", ""),
                bucket: env_or("AETHER_UPLOAD_BUCKET", ""),
                expires: env_parse("AETHER_UPLOAD_EXPIRES", 3600),
            },
        }
    }
}

impl ServerConfig {
    /// Create config with custom base directory
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: base_dir.into(),
            ..Self::default()
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("aether.sqlite")
    }

    /// Ensure all directories exist
    pub async fn ensure_dirs(&self) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.data_dir)
            .await
            .with_context(|| format!("create {:?}", self.data_dir))?;
        Ok(())
    }
}

/// App state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub registry: Arc<SessionRegistry>,
    pub router: Arc<ChannelRouter>,
    pub dispatcher: Arc<MessageDispatcher>,
    pub store: Arc<dyn PersistenceGateway>,
    pub auth: Arc<dyn AuthGateway>,
    pub uploads: Arc<UploadSigner>,
}

impl AppState {
    /// Open the configured backends and bootstrap the main group
    pub async fn build(config: ServerConfig) -> anyhow::Result<Self> {
        config.ensure_dirs().await?;

        let store: Arc<dyn PersistenceGateway> = match config.storage {
            StorageBackend::Sqlite => Arc::new(SqliteStore::open(&config.database_path()).await?),
            StorageBackend::Memory => {
                info!("[Store] Using in-memory storage, data is lost on exit");
                Arc::new(MemoryStore::new())
            }
        };
        let auth: Arc<dyn AuthGateway> = Arc::new(TokenAuth::new(
            config.token_secret.clone(),
            config.token_ttl,
            config.bcrypt_cost,
        ));

        let state = Self::with_gateways(config, store, auth);
        state.bootstrap().await?;
        Ok(state)
    }

    /// Wire the in-process components around the given gateways
    pub fn with_gateways(
        config: ServerConfig,
        store: Arc<dyn PersistenceGateway>,
        auth: Arc<dyn AuthGateway>,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let router = Arc::new(ChannelRouter::new(registry.clone()));
        let dispatcher = Arc::new(MessageDispatcher::new(router.clone(), store.clone()));
        let uploads = Arc::new(UploadSigner::new(config.upload.clone()));

        Self {
            config: Arc::new(config),
            registry,
            router,
            dispatcher,
            store,
            auth,
            uploads,
        }
    }

    /// Create the main group if it does not exist yet
    pub async fn bootstrap(&self) -> anyhow::Result<()> {
        let name = &self.config.main_group;
        if self.store.fetch_group_summary(name).await?.is_none() {
            self.store
                .save_group(&GroupSummary::new(name.as_str(), self.config.default_avatar.as_str()))
                .await
                .context("create main group")?;
            info!("[Store] Created main group {}", name);
        }
        Ok(())
    }
}
