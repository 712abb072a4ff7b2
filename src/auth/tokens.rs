//! Token storage and management

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds before nominal expiry at which a token counts as stale.
pub const EXPIRY_BUFFER_SECS: u64 = 300;

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Stored access token with absolute expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub token: String,
    pub expires_at: Option<u64>,
}

impl StoredToken {
    pub fn new(token: String, expires_in_secs: Option<u64>) -> Self {
        let expires_at = expires_in_secs.map(|secs| unix_now() + secs);
        Self { token, expires_at }
    }

    /// Stale once fewer than `EXPIRY_BUFFER_SECS` remain before expiry,
    /// so callers refresh proactively instead of racing the deadline.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(exp) => unix_now() + EXPIRY_BUFFER_SECS >= exp,
            None => false,
        }
    }
}

/// Access + refresh token pair held by the session.
///
/// Exactly one logically valid instance exists at a time; absence means
/// "not authenticated".
#[derive(Debug, Clone)]
pub struct TokenSet {
    pub access: StoredToken,
    pub refresh_token: Option<String>,
}

impl TokenSet {
    pub fn new(
        access_token: String,
        expires_in: Option<u64>,
        refresh_token: Option<String>,
    ) -> Self {
        Self {
            access: StoredToken::new(access_token, expires_in),
            refresh_token,
        }
    }

    pub fn is_fresh(&self) -> bool {
        !self.access.is_expired()
    }
}

/// Token store trait for different storage backends.
///
/// The durable secret store is a collaborator; the session only decides
/// when to read and write through it.
pub trait TokenStore {
    fn get_access_token(&self) -> Option<StoredToken>;
    fn set_access_token(&mut self, token: String, expires_in: Option<u64>);
    fn get_refresh_token(&self) -> Option<String>;
    fn set_refresh_token(&mut self, token: String);
    fn clear_tokens(&mut self);
    /// Persist the current state to the backing store.
    fn flush(&mut self) -> anyhow::Result<()>;
}
