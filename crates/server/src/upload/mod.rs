//! Object-storage upload credentials
//!
//! Credentials have the shape `access_key:sign:policy` where `policy` is a
//! base64 put-policy naming the bucket and a deadline, and `sign` is its
//! HMAC-SHA256 under the storage secret key. Stores that verify with
//! HMAC-SHA1 over padded base64 accept the shape but not the signature.

use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

#[derive(Clone, Debug, Default)]
pub struct UploadConfig {
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    /// Credential lifetime in seconds
    pub expires: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PutPolicy {
    pub scope: String,
    pub deadline: i64,
}

pub struct UploadSigner {
    config: UploadConfig,
}

impl UploadSigner {
    pub fn new(config: UploadConfig) -> Self {
        Self { config }
    }

    pub fn credential(&self) -> Result<String> {
        self.credential_at(Utc::now())
    }

    pub fn credential_at(&self, now: DateTime<Utc>) -> Result<String> {
        let policy = PutPolicy {
            scope: self.config.bucket.clone(),
            deadline: now.timestamp() + self.config.expires,
        };
        let encoded_policy = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&policy)?);

        let mut mac = Hmac::<Sha256>::new_from_slice(self.config.secret_key.as_bytes())
            .context("invalid upload secret key")?;
        mac.update(encoded_policy.as_bytes());
        let sign = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{}:{}:{}", self.config.access_key, sign, encoded_policy))
    }
}
