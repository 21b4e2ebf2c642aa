//! Failure taxonomy
//!
//! Every handler, the router and the dispatcher report failures through
//! [`ChatError`]. The WebSocket loop logs them in one place via
//! [`ChatError::log`] and turns them into `{success: false}` replies.

use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Numeric failure codes understood by clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCode {
    WrongSecret,
    UnknownIdentity,
    AlreadyExists,
    InvalidInput,
}

impl FailureCode {
    pub fn as_u8(self) -> u8 {
        match self {
            FailureCode::WrongSecret => 1,
            FailureCode::UnknownIdentity => 2,
            FailureCode::AlreadyExists => 3,
            FailureCode::InvalidInput => 4,
        }
    }
}

impl Serialize for FailureCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

#[derive(Debug, Error)]
pub enum ChatError {
    /// Malformed or conflicting registration/login input
    #[error("validation failed (code {})", .0.as_u8())]
    Validation(FailureCode),

    /// Unknown identity, group or token on lookup
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// Persistence or auth gateway error; the operation is abandoned
    #[error("infrastructure failure: {0:#}")]
    Transient(#[from] anyhow::Error),

    /// Malformed frame, bad channel name, or a call from an unbound connection
    #[error("protocol violation: {0}")]
    Protocol(String),
}

pub type Result<T> = core::result::Result<T, ChatError>;

impl ChatError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        ChatError::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        ChatError::Protocol(msg.into())
    }

    pub fn code(&self) -> Option<FailureCode> {
        match self {
            ChatError::Validation(code) => Some(*code),
            _ => None,
        }
    }

    /// Callback payload reported to the client for this failure
    pub fn reply(&self) -> Value {
        match self.code() {
            Some(code) => json!({ "success": false, "code": code }),
            None => json!({ "success": false }),
        }
    }

    /// Central log point for failed events
    pub fn log(&self, event: &str) {
        match self {
            ChatError::Validation(_) => debug!("[{}] rejected: {}", event, self),
            ChatError::NotFound { .. } => info!("[{}] {}", event, self),
            ChatError::Transient(_) => error!("[{}] {}", event, self),
            ChatError::Protocol(_) => warn!("[{}] {}", event, self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_codes_serialize_as_numbers() {
        let value = serde_json::to_value(FailureCode::AlreadyExists).unwrap();
        assert_eq!(value, json!(3));
    }

    #[test]
    fn replies_carry_code_only_for_validation() {
        let err = ChatError::Validation(FailureCode::WrongSecret);
        assert_eq!(err.reply(), json!({ "success": false, "code": 1 }));

        let err = ChatError::not_found("group", "lobby");
        assert_eq!(err.reply(), json!({ "success": false }));
        assert_eq!(err.to_string(), "group not found: lobby");
    }

    #[test]
    fn transient_wraps_anyhow_context() {
        let err: ChatError = anyhow::anyhow!("disk full").context("save message").into();
        assert!(err.to_string().contains("save message"));
        assert!(err.to_string().contains("disk full"));
    }
}
