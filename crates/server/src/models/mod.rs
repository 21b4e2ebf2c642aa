use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Profile keys clients may never overwrite
pub const PROTECTED_PROFILE_KEYS: &[&str] = &["identity", "secret", "groups"];

/// Display attributes attached to every outgoing message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub identity: String,
    pub avatar: String,
}

/// Editable profile fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub sign: String,
    #[serde(default)]
    pub location: String,
    /// Client-defined fields the server stores but never interprets
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserProfile {
    pub fn with_avatar(avatar: impl Into<String>) -> Self {
        Self {
            avatar: avatar.into(),
            ..Self::default()
        }
    }

    /// Apply a client update. Returns the keys that were refused.
    pub fn apply(&mut self, updates: Map<String, Value>) -> Vec<String> {
        let mut refused = Vec::new();
        for (key, value) in updates {
            if PROTECTED_PROFILE_KEYS.contains(&key.as_str()) {
                refused.push(key);
                continue;
            }
            let slot = match key.as_str() {
                "avatar" => &mut self.avatar,
                "sign" => &mut self.sign,
                "location" => &mut self.location,
                _ => {
                    self.extra.insert(key, value);
                    continue;
                }
            };
            match value {
                Value::String(s) => *slot = s,
                _ => refused.push(key),
            }
        }
        refused
    }
}

/// User record as held by the persistence gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub identity: String,
    #[serde(skip_serializing)]
    pub secret_hash: String,
    pub profile: UserProfile,
    /// Group names in join order
    pub groups: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(
        identity: impl Into<String>,
        secret_hash: impl Into<String>,
        avatar: impl Into<String>,
    ) -> Self {
        Self {
            identity: identity.into(),
            secret_hash: secret_hash.into(),
            profile: UserProfile::with_avatar(avatar),
            groups: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            identity: self.identity.clone(),
            avatar: self.profile.avatar.clone(),
        }
    }

    pub fn public_profile(&self) -> PublicProfile {
        PublicProfile {
            identity: self.identity.clone(),
            sign: self.profile.sign.clone(),
            location: self.profile.location.clone(),
        }
    }

    pub fn view(&self) -> UserView {
        UserView {
            identity: self.identity.clone(),
            profile: self.profile.clone(),
        }
    }

    pub fn join_group(&mut self, group: &str) -> bool {
        if self.groups.iter().any(|g| g == group) {
            return false;
        }
        self.groups.push(group.to_string());
        true
    }

    pub fn leave_group(&mut self, group: &str) -> bool {
        let before = self.groups.len();
        self.groups.retain(|g| g != group);
        self.groups.len() != before
    }
}

/// User as shown to its owner after login (no secret)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserView {
    pub identity: String,
    #[serde(flatten)]
    pub profile: UserProfile,
}

/// Profile card shown to other users
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicProfile {
    pub identity: String,
    pub sign: String,
    pub location: String,
}

/// Lightweight group form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub group_name: String,
    pub avatar: String,
}

impl GroupSummary {
    pub fn new(group_name: impl Into<String>, avatar: impl Into<String>) -> Self {
        Self {
            group_name: group_name.into(),
            avatar: avatar.into(),
        }
    }
}

/// Full group form with a (possibly truncated) message log, newest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRecord {
    pub group_name: String,
    pub avatar: String,
    pub messages: Vec<StoredMessage>,
    pub members: Vec<String>,
}

/// Message as handed to the persistence gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub sender: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

/// Persisted message with its sender resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: Uuid,
    pub user: UserSummary,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

/// Message as sent by a client
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    pub channel_name: String,
    pub body: String,
}

/// Normalized message flowing from the dispatcher to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub user: UserSummary,
    pub body: String,
    pub channel_name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
}

impl Envelope {
    pub fn new(
        user: UserSummary,
        body: impl Into<String>,
        channel_name: impl Into<String>,
    ) -> Self {
        Self {
            user,
            body: body.into(),
            channel_name: channel_name.into(),
            timestamp: Utc::now(),
            id: None,
        }
    }

    /// Persistable form: routing tag dropped, sender kept by identity
    pub fn to_record(&self) -> MessageRecord {
        MessageRecord {
            sender: self.user.identity.clone(),
            body: self.body.clone(),
            timestamp: self.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn profile_update_refuses_protected_and_mistyped_keys() {
        let mut profile = UserProfile::with_avatar("a.png");
        let updates = json!({
            "sign": "hello",
            "secret": "hunter2",
            "groups": ["x"],
            "location": 42,
            "theme": "dark",
        });
        let Value::Object(updates) = updates else {
            unreachable!()
        };

        let mut refused = profile.apply(updates);
        refused.sort();

        assert_eq!(refused, vec!["groups", "location", "secret"]);
        assert_eq!(profile.sign, "hello");
        assert_eq!(profile.avatar, "a.png");
        assert_eq!(profile.extra.get("theme"), Some(&json!("dark")));
    }

    #[test]
    fn user_group_list_has_no_duplicates() {
        let mut user = UserRecord::new("alice", "hash", "a.png");
        assert!(user.join_group("lobby"));
        assert!(!user.join_group("lobby"));
        assert_eq!(user.groups, vec!["lobby"]);
        assert!(user.leave_group("lobby"));
        assert!(!user.leave_group("lobby"));
    }

    #[test]
    fn user_view_never_exposes_the_secret() {
        let user = UserRecord::new("alice", "$2b$secret", "a.png");
        let value = serde_json::to_value(user.view()).unwrap();
        assert_eq!(value["identity"], "alice");
        assert_eq!(value["avatar"], "a.png");
        assert!(value.get("secret_hash").is_none());

        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("secret_hash").is_none());
    }

    #[test]
    fn envelope_record_drops_channel() {
        let sender = UserSummary {
            identity: "alice".into(),
            avatar: "a.png".into(),
        };
        let envelope = Envelope::new(sender, "hi", "lobby");
        let record = envelope.to_record();
        assert_eq!(record.sender, "alice");
        assert_eq!(record.body, "hi");
        assert_eq!(record.timestamp, envelope.timestamp);

        let wire = serde_json::to_value(&envelope).unwrap();
        assert_eq!(wire["channelName"], "lobby");
        assert!(wire.get("id").is_none());
    }
}
