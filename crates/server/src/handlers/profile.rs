//! Profiles and upload credentials

use anyhow::Context;
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::config::AppState;
use crate::error::{ChatError, Result};
use crate::session::Session;

pub async fn update_profile(
    state: &AppState,
    session: &Session,
    updates: Map<String, Value>,
) -> Result<()> {
    let mut user = state
        .store
        .fetch_user(&session.identity)
        .await?
        .ok_or_else(|| ChatError::not_found("user", session.identity.as_str()))?;

    let refused = user.profile.apply(updates);
    if !refused.is_empty() {
        warn!(
            "[Profile] {} tried to set protected or mistyped keys: {:?}",
            session.identity, refused
        );
    }

    state.store.save_user(&user).await.context("save profile")?;
    Ok(())
}

pub async fn fetch_profile(state: &AppState, identity: &str) -> Result<Value> {
    let user = state
        .store
        .fetch_user(identity)
        .await?
        .ok_or_else(|| ChatError::not_found("user", identity))?;
    Ok(json!(user.public_profile()))
}

pub fn upload_credential(state: &AppState) -> Result<Value> {
    Ok(Value::String(state.uploads.credential()?))
}
