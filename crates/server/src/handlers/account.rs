//! Registration, login and logout

use anyhow::Context;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::AppState;
use crate::error::{ChatError, FailureCode, Result};
use crate::models::{GroupRecord, UserRecord, UserView};
use crate::protocol::Credentials;
use crate::routing::is_valid_identity;
use crate::session::ConnectionHandle;

#[derive(Debug, Serialize)]
pub struct LoginReply {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub user: UserView,
    pub groups: Vec<GroupRecord>,
}

impl LoginReply {
    fn into_value(self) -> Result<Value> {
        serde_json::to_value(self)
            .context("encode login reply")
            .map_err(ChatError::from)
    }
}

/// Group views for every group the user belongs to
async fn load_groups(state: &AppState, user: &UserRecord) -> Result<Vec<GroupRecord>> {
    let mut groups = Vec::with_capacity(user.groups.len());
    for name in &user.groups {
        match state
            .store
            .fetch_group(name, state.config.recent_messages)
            .await
            .with_context(|| format!("load group {}", name))?
        {
            Some(group) => groups.push(group),
            None => warn!("[Auth] {} belongs to missing group {}", user.identity, name),
        }
    }
    Ok(groups)
}

/// Bind the session and build the reply
async fn sign_in(
    state: &AppState,
    handle: &ConnectionHandle,
    user: UserRecord,
    token: Option<String>,
) -> Result<Value> {
    let groups = load_groups(state, &user).await?;
    state.registry.add_session(handle, &user.identity, &user.groups);
    LoginReply {
        success: true,
        token,
        user: user.view(),
        groups,
    }
    .into_value()
}

pub async fn register(
    state: &AppState,
    handle: &ConnectionHandle,
    creds: Credentials,
) -> Result<Value> {
    if !is_valid_identity(&creds.identity) || creds.secret.is_empty() {
        return Err(ChatError::Validation(FailureCode::InvalidInput));
    }
    if state.store.fetch_user(&creds.identity).await?.is_some() {
        return Err(ChatError::Validation(FailureCode::AlreadyExists));
    }

    let hash = state.auth.hash_secret(&creds.secret).await?;
    let mut user = UserRecord::new(
        creds.identity.as_str(),
        hash,
        state.config.default_avatar.as_str(),
    );
    user.join_group(&state.config.main_group);

    if !state.store.create_user(&user).await.context("create user")? {
        return Err(ChatError::Validation(FailureCode::AlreadyExists));
    }
    info!("[Auth] User registered: {}", user.identity);

    let token = state.auth.issue_token(&user.identity)?;
    sign_in(state, handle, user, Some(token)).await
}

pub async fn login(
    state: &AppState,
    handle: &ConnectionHandle,
    creds: Credentials,
) -> Result<Value> {
    let user = state
        .store
        .fetch_user(&creds.identity)
        .await?
        .ok_or(ChatError::Validation(FailureCode::UnknownIdentity))?;

    if !state.auth.verify_secret(&creds.secret, &user.secret_hash).await? {
        warn!("[Auth] Failed login attempt for {}", creds.identity);
        return Err(ChatError::Validation(FailureCode::WrongSecret));
    }

    let token = state.auth.issue_token(&user.identity)?;
    sign_in(state, handle, user, Some(token)).await
}

pub async fn login_with_token(
    state: &AppState,
    handle: &ConnectionHandle,
    token: &str,
) -> Result<Value> {
    let identity = state
        .auth
        .verify_token(token)
        .ok_or_else(|| ChatError::not_found("token", "presented token"))?;

    let user = state
        .store
        .fetch_user(&identity)
        .await?
        .ok_or_else(|| ChatError::not_found("user", identity))?;

    sign_in(state, handle, user, None).await
}

pub fn logout(state: &AppState, handle: &ConnectionHandle) {
    state.registry.remove_session(handle.id());
}
