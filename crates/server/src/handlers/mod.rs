//! Event handlers
//!
//! One function per client event. [`process_frame`] decodes a frame, runs
//! the handler and answers the client's ack; the socket loop in [`ws`]
//! calls it for every inbound text frame, one at a time per connection.

pub mod account;
pub mod chat;
pub mod groups;
pub mod profile;
pub mod ws;

use serde_json::Value;

use crate::config::AppState;
use crate::error::{ChatError, Result};
use crate::protocol::{ClientEvent, ClientFrame, ServerFrame};
use crate::session::ConnectionHandle;

pub use ws::ws_handler;

/// Run one event. `Some(value)` is the callback result for the client.
pub async fn handle_event(
    state: &AppState,
    handle: &ConnectionHandle,
    event: ClientEvent,
) -> Result<Option<Value>> {
    let session = state.registry.session(handle.id());

    match (event, session) {
        (ClientEvent::Register(creds), _) => {
            account::register(state, handle, creds).await.map(Some)
        }
        (ClientEvent::Login(creds), _) => account::login(state, handle, creds).await.map(Some),
        (ClientEvent::LoginWithToken(token), _) => {
            account::login_with_token(state, handle, &token).await.map(Some)
        }
        (ClientEvent::Logout, _) => {
            account::logout(state, handle);
            Ok(None)
        }
        (ClientEvent::Message(raw), _) => {
            state.dispatcher.dispatch(handle.id(), raw).await;
            Ok(None)
        }
        (ClientEvent::FetchHistory(req), Some(session)) => {
            chat::fetch_history(state, &session, req).await.map(Some)
        }
        (ClientEvent::OpenPrivate(channel), Some(session)) => {
            chat::open_private(state, &session, &channel)?;
            Ok(None)
        }
        (ClientEvent::JoinGroup(name), Some(session)) => {
            groups::join_group(state, &session, &name).await.map(Some)
        }
        (ClientEvent::LeaveGroup(name), Some(session)) => {
            groups::leave_group(state, &session, &name).await?;
            Ok(None)
        }
        (ClientEvent::UpdateProfile(updates), Some(session)) => {
            profile::update_profile(state, &session, updates).await?;
            Ok(None)
        }
        (ClientEvent::FetchProfile(identity), Some(_)) => {
            profile::fetch_profile(state, &identity).await.map(Some)
        }
        (ClientEvent::UploadCredential, Some(_)) => profile::upload_credential(state).map(Some),
        (event, None) => Err(ChatError::protocol(format!(
            "{} from unbound connection {}",
            event.name(),
            handle.id()
        ))),
    }
}

/// Decode and run one inbound text frame, replying to its ack if requested.
/// Failures are logged here and never leave this connection.
pub async fn process_frame(state: &AppState, handle: &ConnectionHandle, text: &str) {
    let frame = match ClientFrame::parse(text) {
        Ok(frame) => frame,
        Err(e) => {
            e.log("frame");
            return;
        }
    };
    let ack = frame.ack;
    let name = frame.event.clone();

    let result = match frame.into_event() {
        Ok(event) => handle_event(state, handle, event).await,
        Err(e) => Err(e),
    };

    let reply = match result {
        Ok(reply) => reply,
        Err(e) => {
            e.log(&name);
            Some(e.reply())
        }
    };

    if let (Some(id), Some(data)) = (ack, reply) {
        handle.send(ServerFrame::ack(id, data));
    }
}

/// Transport went away; same cleanup as an explicit logout
pub fn disconnect(state: &AppState, handle: &ConnectionHandle) {
    state.registry.remove_session(handle.id());
}
