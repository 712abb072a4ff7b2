//! Authentication
//!
//! OAuth2 device code flow against Azure AD for the Microsoft Graph scopes,
//! plus the in-memory session that keeps the bearer token fresh while the
//! sync engine polls.

pub mod oauth;
pub mod session;
pub mod tokens;

pub use oauth::{login, logout, session_from_config, status};
pub use session::{AuthSession, AuthState, TokenExchanger};
pub use tokens::{StoredToken, TokenSet, TokenStore};

use crate::config::Config;
use crate::error::Error;

/// Azure AD client configuration.
///
/// The client id identifies the app registration the user consents to; it
/// has no default because it is account-specific.
pub struct AuthConfig {
    pub client_id: String,
    pub tenant: String,
}

impl AuthConfig {
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let client_id = config
            .client_id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                Error::Configuration(
                    "no OAuth client id; set 'client_id' in the config file".into(),
                )
            })?;
        Ok(Self {
            client_id,
            tenant: config
                .tenant
                .clone()
                .unwrap_or_else(|| "common".to_string()),
        })
    }
}
