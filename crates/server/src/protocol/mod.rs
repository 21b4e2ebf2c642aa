//! WebSocket frame codec
//!
//! Client frames: `{"event": "<name>", "data": <payload>, "ack": <id>}`.
//! The server answers acknowledged events with `{"ack": <id>, "data": ..}`
//! and pushes chat messages as `{"event": "message", "data": <envelope>}`.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ChatError, Result};
use crate::models::{Envelope, RawMessage};

#[derive(Debug, Deserialize)]
pub struct ClientFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub ack: Option<u64>,
}

#[derive(Clone, PartialEq, Deserialize)]
pub struct Credentials {
    pub identity: String,
    pub secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identity", &self.identity)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRequest {
    pub channel_name: String,
    #[serde(default)]
    pub skip: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Register(Credentials),
    LoginWithToken(String),
    Login(Credentials),
    Message(RawMessage),
    Logout,
    FetchHistory(HistoryRequest),
    UpdateProfile(Map<String, Value>),
    UploadCredential,
    JoinGroup(String),
    LeaveGroup(String),
    FetchProfile(String),
    OpenPrivate(String),
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Register(_) => "register",
            ClientEvent::LoginWithToken(_) => "login_with_token",
            ClientEvent::Login(_) => "login",
            ClientEvent::Message(_) => "message",
            ClientEvent::Logout => "logout",
            ClientEvent::FetchHistory(_) => "fetch_history",
            ClientEvent::UpdateProfile(_) => "update_profile",
            ClientEvent::UploadCredential => "upload_credential",
            ClientEvent::JoinGroup(_) => "join_group",
            ClientEvent::LeaveGroup(_) => "leave_group",
            ClientEvent::FetchProfile(_) => "fetch_profile",
            ClientEvent::OpenPrivate(_) => "open_private",
        }
    }
}

fn payload<T: DeserializeOwned>(event: &str, data: Value) -> Result<T> {
    serde_json::from_value(data)
        .map_err(|e| ChatError::protocol(format!("bad {} payload: {}", event, e)))
}

impl ClientFrame {
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ChatError::protocol(format!("bad frame: {}", e)))
    }

    pub fn into_event(self) -> Result<ClientEvent> {
        let ClientFrame { event, data, .. } = self;
        let decoded = match event.as_str() {
            "register" => ClientEvent::Register(payload(&event, data)?),
            "login_with_token" => ClientEvent::LoginWithToken(payload(&event, data)?),
            "login" => ClientEvent::Login(payload(&event, data)?),
            "message" => ClientEvent::Message(payload(&event, data)?),
            "logout" => ClientEvent::Logout,
            "fetch_history" => ClientEvent::FetchHistory(payload(&event, data)?),
            "update_profile" => ClientEvent::UpdateProfile(payload(&event, data)?),
            "upload_credential" => ClientEvent::UploadCredential,
            "join_group" => ClientEvent::JoinGroup(payload(&event, data)?),
            "leave_group" => ClientEvent::LeaveGroup(payload(&event, data)?),
            "fetch_profile" => ClientEvent::FetchProfile(payload(&event, data)?),
            "open_private" => ClientEvent::OpenPrivate(payload(&event, data)?),
            other => return Err(ChatError::protocol(format!("unknown event {:?}", other))),
        };
        Ok(decoded)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ServerFrame {
    Ack { ack: u64, data: Value },
    Push { event: &'static str, data: Value },
}

impl ServerFrame {
    pub fn ack(id: u64, data: Value) -> Self {
        ServerFrame::Ack { ack: id, data }
    }

    pub fn message(envelope: &Envelope) -> Self {
        ServerFrame::Push {
            event: "message",
            data: serde_json::to_value(envelope).unwrap_or_default(),
        }
    }

    pub fn event_name(&self) -> Option<&'static str> {
        match self {
            ServerFrame::Push { event, .. } => Some(*event),
            ServerFrame::Ack { .. } => None,
        }
    }

    pub fn data(&self) -> &Value {
        match self {
            ServerFrame::Ack { data, .. } | ServerFrame::Push { data, .. } => data,
        }
    }

    pub fn to_text(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(text: &str) -> Result<ClientEvent> {
        ClientFrame::parse(text)?.into_event()
    }

    #[test]
    fn decodes_message_frames() {
        let event =
            decode(r#"{"event":"message","data":{"channelName":"lobby","body":"hi"}}"#).unwrap();
        assert_eq!(
            event,
            ClientEvent::Message(RawMessage {
                channel_name: "lobby".into(),
                body: "hi".into(),
            })
        );
    }

    #[test]
    fn decodes_unit_and_string_payloads() {
        assert_eq!(decode(r#"{"event":"logout"}"#).unwrap(), ClientEvent::Logout);
        assert_eq!(
            decode(r#"{"event":"join_group","data":"lobby","ack":3}"#).unwrap(),
            ClientEvent::JoinGroup("lobby".into())
        );
        assert_eq!(
            decode(r#"{"event":"fetch_history","data":{"channelName":"lobby"}}"#).unwrap(),
            ClientEvent::FetchHistory(HistoryRequest {
                channel_name: "lobby".into(),
                skip: 0
            })
        );
    }

    #[test]
    fn rejects_unknown_events_and_bad_payloads() {
        assert!(matches!(
            decode(r#"{"event":"teleport"}"#),
            Err(ChatError::Protocol(_))
        ));
        assert!(matches!(
            decode(r#"{"event":"login","data":"nope"}"#),
            Err(ChatError::Protocol(_))
        ));
        assert!(ClientFrame::parse("not json").is_err());
    }

    #[test]
    fn credentials_debug_hides_secret() {
        let creds = Credentials {
            identity: "alice".into(),
            secret: "hunter2".into(),
        };
        let printed = format!("{:?}", creds);
        assert!(printed.contains("alice"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn server_frames_serialize_flat() {
        let ack = ServerFrame::ack(7, json!({ "success": true }));
        assert_eq!(
            ack.to_text().unwrap(),
            r#"{"ack":7,"data":{"success":true}}"#
        );

        let push = ServerFrame::Push {
            event: "message",
            data: json!({ "body": "hi" }),
        };
        assert_eq!(
            push.to_text().unwrap(),
            r#"{"event":"message","data":{"body":"hi"}}"#
        );
    }
}
