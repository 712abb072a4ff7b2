//! Error kinds shared across the sync engine

use thiserror::Error;

/// Failure categories surfaced by the core.
///
/// Every external call site converts its failure into one of these; nothing
/// in the engine propagates an unstructured fault or panics.
#[derive(Error, Debug)]
pub enum Error {
    /// No valid token or API key is available.
    #[error("not authenticated -- run 'glowdesk login' or set the Govee API key")]
    NotAuthenticated,

    /// A token refresh failed; interactive re-authentication is required.
    #[error("authentication expired -- run 'glowdesk login'")]
    AuthExpired,

    /// The upstream service rejected the request over its own budget.
    /// Distinct from local admission control, which prevents most of these.
    #[error("rate limited by upstream service")]
    RateLimited,

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// Malformed or unexpected payload shape, including unexpected HTTP
    /// statuses that carry no more specific meaning.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Missing or inconsistent local configuration (e.g. no client id).
    #[error("configuration error: {0}")]
    Configuration(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
