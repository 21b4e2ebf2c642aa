//! Channel namespace
//!
//! Private pairings are named `low&&high`, where `low` and `high` are the
//! two identities in byte order. Identities may not contain `&` at all and
//! group names may not contain `&&`, so a channel name parses to at most one
//! pair and a group name can never be mistaken for a pairing.

use std::fmt;

use crate::error::{ChatError, Result};

pub const PRIVATE_SEPARATOR: &str = "&&";

const MAX_IDENTITY_LEN: usize = 32;
const MAX_GROUP_NAME_LEN: usize = 64;

pub fn is_valid_identity(identity: &str) -> bool {
    !identity.trim().is_empty()
        && identity.chars().count() <= MAX_IDENTITY_LEN
        && !identity.contains('&')
        && !identity.chars().any(char::is_control)
}

pub fn is_valid_group_name(name: &str) -> bool {
    !name.trim().is_empty()
        && name.chars().count() <= MAX_GROUP_NAME_LEN
        && !name.contains(PRIVATE_SEPARATOR)
        && !name.chars().any(char::is_control)
}

/// Order-independent key of a two-party channel
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrivateChannelKey {
    low: String,
    high: String,
}

impl PrivateChannelKey {
    pub fn new(a: &str, b: &str) -> Result<Self> {
        if !is_valid_identity(a) || !is_valid_identity(b) {
            return Err(ChatError::protocol(format!(
                "invalid identity in private pairing: {:?} / {:?}",
                a, b
            )));
        }
        if a == b {
            return Err(ChatError::protocol(format!(
                "private pairing with self: {}",
                a
            )));
        }
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        Ok(Self {
            low: low.to_string(),
            high: high.to_string(),
        })
    }

    /// `Ok(None)` for names that do not denote a pairing at all,
    /// `Err` for names that look like one but are malformed.
    pub fn parse(raw: &str) -> Result<Option<Self>> {
        let Some((a, b)) = raw.split_once(PRIVATE_SEPARATOR) else {
            return Ok(None);
        };
        Self::new(a, b).map(Some)
    }

    /// The other participant, if `identity` is one of the two
    pub fn counterpart(&self, identity: &str) -> Option<&str> {
        if identity == self.low {
            Some(&self.high)
        } else if identity == self.high {
            Some(&self.low)
        } else {
            None
        }
    }

    pub fn channel_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PrivateChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.low, PRIVATE_SEPARATOR, self.high)
    }
}
