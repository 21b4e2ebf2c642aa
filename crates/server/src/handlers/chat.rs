//! History and private conversations

use anyhow::Context;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::AppState;
use crate::error::{ChatError, Result};
use crate::protocol::HistoryRequest;
use crate::session::Session;

/// One page of a group's log, newest first
pub async fn fetch_history(
    state: &AppState,
    session: &Session,
    req: HistoryRequest,
) -> Result<Value> {
    let messages = state
        .store
        .fetch_group_messages(&req.channel_name, req.skip, state.config.history_page_size)
        .await
        .context("load history")?
        .ok_or_else(|| ChatError::not_found("group", req.channel_name.as_str()))?;

    if messages.is_empty() {
        return Err(ChatError::not_found("history page", req.channel_name));
    }

    debug!(
        "[Chat] {} fetched {} messages of {}",
        session.identity,
        messages.len(),
        req.channel_name
    );
    Ok(json!({ "success": true, "messages": messages }))
}

/// Subscribe the caller to a private pairing. The counterpart joins lazily
/// when the first message arrives.
pub fn open_private(state: &AppState, session: &Session, channel: &str) -> Result<()> {
    let target = state.router.resolve_target(&session.identity, channel)?;
    if !target.is_private() {
        return Err(ChatError::protocol(format!("{} is not a private channel", channel)));
    }
    state.registry.join_channel(session.connection, &target.channel);
    Ok(())
}
