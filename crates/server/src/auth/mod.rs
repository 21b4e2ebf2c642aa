//! Authentication gateway
//!
//! Secrets are bcrypt hashed; login tokens are stateless
//! `base64(claims).base64(hmac)` pairs signed with the server secret.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn hash_secret(&self, secret: &str) -> Result<String>;

    async fn verify_secret(&self, secret: &str, hash: &str) -> Result<bool>;

    fn issue_token(&self, identity: &str) -> Result<String>;

    /// Identity carried by a valid, unexpired token
    fn verify_token(&self, token: &str) -> Option<String>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
}

pub struct TokenAuth {
    secret: Vec<u8>,
    ttl: Duration,
    cost: u32,
}

impl TokenAuth {
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration, cost: u32) -> Self {
        Self {
            secret: secret.into(),
            ttl,
            cost,
        }
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret).context("invalid token secret")
    }

    pub fn issue_token_at(&self, identity: &str, now: DateTime<Utc>) -> Result<String> {
        let claims = Claims {
            sub: identity.to_string(),
            exp: (now + self.ttl).timestamp(),
        };
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let sig = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{}.{}", payload, sig))
    }

    pub fn verify_token_at(&self, token: &str, now: DateTime<Utc>) -> Option<String> {
        let (payload, sig) = token.split_once('.')?;
        let sig = URL_SAFE_NO_PAD.decode(sig).ok()?;

        let mut mac = self.mac().ok()?;
        mac.update(payload.as_bytes());
        if mac.verify_slice(&sig).is_err() {
            debug!("[Auth] Rejected token with bad signature");
            return None;
        }

        let claims: Claims = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).ok()?).ok()?;
        if claims.exp <= now.timestamp() {
            debug!("[Auth] Rejected expired token for {}", claims.sub);
            return None;
        }
        Some(claims.sub)
    }
}

#[async_trait]
impl AuthGateway for TokenAuth {
    async fn hash_secret(&self, secret: &str) -> Result<String> {
        let secret = secret.to_string();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(secret, cost))
            .await
            .context("hash task panicked")?
            .context("Failed to hash secret")
    }

    async fn verify_secret(&self, secret: &str, hash: &str) -> Result<bool> {
        let secret = secret.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || bcrypt::verify(secret, &hash))
            .await
            .context("verify task panicked")?
            .context("Failed to verify secret")
    }

    fn issue_token(&self, identity: &str) -> Result<String> {
        self.issue_token_at(identity, Utc::now())
    }

    fn verify_token(&self, token: &str) -> Option<String> {
        self.verify_token_at(token, Utc::now())
    }
}
