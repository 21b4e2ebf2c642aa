//! Group membership

use anyhow::Context;
use serde_json::{json, Value};
use tracing::info;

use crate::config::AppState;
use crate::error::{ChatError, FailureCode, Result};
use crate::models::GroupSummary;
use crate::routing::is_valid_group_name;
use crate::session::Session;

/// Join (creating if needed) and reply with the group view
pub async fn join_group(state: &AppState, session: &Session, name: &str) -> Result<Value> {
    if !is_valid_group_name(name) {
        return Err(ChatError::Validation(FailureCode::InvalidInput));
    }

    if state.store.fetch_group_summary(name).await?.is_none() {
        state
            .store
            .save_group(&GroupSummary::new(name, state.config.default_avatar.as_str()))
            .await
            .context("create group")?;
        info!("[Groups] {} created group {}", session.identity, name);
    }

    let mut user = state
        .store
        .fetch_user(&session.identity)
        .await?
        .ok_or_else(|| ChatError::not_found("user", session.identity.as_str()))?;
    if user.join_group(name) {
        state.store.save_user(&user).await.context("save memberships")?;
    }
    state.registry.join_channel(session.connection, name);

    let group = state
        .store
        .fetch_group(name, state.config.recent_messages)
        .await?
        .ok_or_else(|| ChatError::not_found("group", name))?;
    Ok(json!(group))
}

pub async fn leave_group(state: &AppState, session: &Session, name: &str) -> Result<()> {
    let mut user = state
        .store
        .fetch_user(&session.identity)
        .await?
        .ok_or_else(|| ChatError::not_found("user", session.identity.as_str()))?;
    if user.leave_group(name) {
        state.store.save_user(&user).await.context("save memberships")?;
    }
    state.registry.leave_channel(session.connection, name);
    Ok(())
}
