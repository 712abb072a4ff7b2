//! Authenticated HTTP client for Microsoft Graph
//!
//! Wraps reqwest::Client and consults the auth session before every call,
//! so tokens refresh transparently mid-poll.

use std::sync::Arc;

use crate::auth::AuthSession;
use crate::error::{Error, Result};

const GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";

pub struct GraphClient {
    http: reqwest::Client,
    session: Arc<AuthSession>,
}

impl GraphClient {
    pub fn new(session: Arc<AuthSession>) -> Self {
        Self {
            http: reqwest::Client::new(),
            session,
        }
    }

    /// GET request against the Graph API (bearer auth).
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        self.request(path, None).await
    }

    /// GET with a `Prefer` header (e.g. to normalize calendar timezones).
    pub async fn get_with_prefer(&self, path: &str, prefer: &str) -> Result<reqwest::Response> {
        self.request(path, Some(prefer)).await
    }

    async fn request(&self, path: &str, prefer: Option<&str>) -> Result<reqwest::Response> {
        let token = self.session.bearer_token().await?;
        let url = format!("{}{}", GRAPH_BASE, path);
        tracing::debug!("Graph GET {}", url);

        let mut req = self.http.get(&url).bearer_auth(&token);
        if let Some(prefer) = prefer {
            req = req.header("Prefer", prefer);
        }

        let resp = req.send().await?;
        check_response(resp).await
    }
}

/// Map HTTP-level failures to error kinds; success passes through.
async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    match status.as_u16() {
        401 | 403 => Err(Error::NotAuthenticated),
        429 => Err(Error::RateLimited),
        code => {
            let body = resp.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(200).collect();
            Err(Error::InvalidResponse(format!("HTTP {code}: {excerpt}")))
        }
    }
}
