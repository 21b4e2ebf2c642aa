#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use aether_server::auth::TokenAuth;
use aether_server::config::{AppState, ServerConfig, StorageBackend};
use aether_server::handlers::{disconnect, process_frame};
use aether_server::protocol::ServerFrame;
use aether_server::session::ConnectionHandle;
use aether_server::store::{MemoryStore, PersistenceGateway, SqliteStore};
use chrono::Duration;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

pub const MAIN_GROUP: &str = "lobby";

/// Cheapest bcrypt cost the crate accepts
const TEST_COST: u32 = 4;

pub async fn state() -> AppState {
    state_with(std::env::temp_dir(), StorageBackend::Memory, Arc::new(MemoryStore::new())).await
}

/// Same wiring on a SQLite database inside a temporary directory
pub async fn sqlite_state() -> (TempDir, AppState) {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(&database_path(&dir)).await.unwrap();
    let state = state_with(dir.path().to_path_buf(), StorageBackend::Sqlite, Arc::new(store)).await;
    (dir, state)
}

pub fn database_path(dir: &TempDir) -> PathBuf {
    dir.path().join("aether.sqlite")
}

async fn state_with(
    base_dir: PathBuf,
    storage: StorageBackend,
    store: Arc<dyn PersistenceGateway>,
) -> AppState {
    let mut config = ServerConfig::with_base_dir(base_dir);
    config.storage = storage;
    config.main_group = MAIN_GROUP.to_string();
    config.bcrypt_cost = TEST_COST;
    config.history_page_size = 30;
    config.upload.access_key = "AK".into();
    config.upload.secret_key = "SK".into();
    config.upload.bucket = "avatars".into();

    let auth = TokenAuth::new("integration-secret", Duration::days(3), TEST_COST);
    let state = AppState::with_gateways(config, store, Arc::new(auth));
    state.bootstrap().await.unwrap();
    state
}

/// A connection driven directly through the frame handler
pub struct Client {
    pub handle: ConnectionHandle,
    rx: UnboundedReceiver<ServerFrame>,
    pushes: Vec<Value>,
    next_ack: u64,
}

impl Client {
    pub fn connect() -> Self {
        let (handle, rx) = ConnectionHandle::channel();
        Self {
            handle,
            rx,
            pushes: Vec::new(),
            next_ack: 1,
        }
    }

    /// Send an event that expects a callback and return its payload
    pub async fn call(&mut self, state: &AppState, event: &str, data: Value) -> Value {
        let id = self.next_ack;
        self.next_ack += 1;
        let frame = json!({ "event": event, "data": data, "ack": id });
        process_frame(state, &self.handle, &frame.to_string()).await;

        let mut reply = None;
        while let Ok(frame) = self.rx.try_recv() {
            match frame {
                ServerFrame::Ack { ack, data } if ack == id => reply = Some(data),
                ServerFrame::Ack { .. } => {}
                ServerFrame::Push { data, .. } => self.pushes.push(data),
            }
        }
        reply.unwrap_or_else(|| panic!("no reply to {}", event))
    }

    /// Fire-and-forget event
    pub async fn emit(&self, state: &AppState, event: &str, data: Value) {
        let frame = json!({ "event": event, "data": data });
        process_frame(state, &self.handle, &frame.to_string()).await;
    }

    /// Pushed message envelopes received so far
    pub fn messages(&mut self) -> Vec<Value> {
        while let Ok(frame) = self.rx.try_recv() {
            if let ServerFrame::Push { data, .. } = frame {
                self.pushes.push(data);
            }
        }
        std::mem::take(&mut self.pushes)
    }

    pub async fn register(&mut self, state: &AppState, identity: &str) -> Value {
        let reply = self
            .call(state, "register", json!({ "identity": identity, "secret": "pw" }))
            .await;
        assert_eq!(reply["success"], true, "register {} failed: {}", identity, reply);
        reply
    }

    pub fn disconnect(&self, state: &AppState) {
        disconnect(state, &self.handle);
    }
}
