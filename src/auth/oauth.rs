//! OAuth2 device code flow for Azure AD, plus the refresh-token exchange

use std::sync::Arc;

use anyhow::{Context, Result};
use oauth2::{
    basic::BasicClient, AuthUrl, ClientId, DeviceAuthorizationUrl, RefreshToken, Scope,
    StandardDeviceAuthorizationResponse, TokenResponse, TokenUrl,
};

use super::session::{AuthSession, Exchanged, TokenExchanger};
use super::AuthConfig;
use crate::config::Config;
use crate::error::Error;

/// Graph scopes for presence and calendar reads. offline_access yields the
/// refresh token that keeps long-running polling alive.
const SCOPES: [&str; 3] = [
    "https://graph.microsoft.com/Presence.Read",
    "https://graph.microsoft.com/Calendars.Read",
    "offline_access",
];

/// Build the OAuth2 client from an AuthConfig
fn build_client(auth_config: &AuthConfig) -> Result<BasicClient> {
    let auth_url = AuthUrl::new(format!(
        "https://login.microsoftonline.com/{}/oauth2/v2.0/authorize",
        auth_config.tenant
    ))?;
    let token_url = TokenUrl::new(format!(
        "https://login.microsoftonline.com/{}/oauth2/v2.0/token",
        auth_config.tenant
    ))?;
    let device_url = DeviceAuthorizationUrl::new(format!(
        "https://login.microsoftonline.com/{}/oauth2/v2.0/devicecode",
        auth_config.tenant
    ))?;

    Ok(BasicClient::new(
        ClientId::new(auth_config.client_id.clone()),
        None,
        auth_url,
        Some(token_url),
    )
    .set_device_authorization_url(device_url))
}

/// Refresh-token exchange against the Azure AD token endpoint.
pub struct GraphExchanger {
    client: BasicClient,
}

impl GraphExchanger {
    pub fn new(auth_config: &AuthConfig) -> Result<Self, Error> {
        let client = build_client(auth_config)
            .map_err(|e| Error::Configuration(format!("bad OAuth endpoints: {e}")))?;
        Ok(Self { client })
    }
}

impl TokenExchanger for GraphExchanger {
    fn exchange<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> futures::future::BoxFuture<'a, Result<Exchanged, Error>> {
        Box::pin(async move {
            let refresh = RefreshToken::new(refresh_token.to_string());
            let mut request = self.client.exchange_refresh_token(&refresh);
            for scope in SCOPES {
                request = request.add_scope(Scope::new(scope.to_string()));
            }
            let response = request
                .request_async(oauth2::reqwest::async_http_client)
                .await
                .map_err(|e| Error::InvalidResponse(format!("refresh exchange failed: {e}")))?;

            Ok((
                response.access_token().secret().to_string(),
                response.expires_in().map(|d| d.as_secs()),
                response.refresh_token().map(|rt| rt.secret().to_string()),
            ))
        })
    }
}

/// Build an auth session backed by the on-disk config store.
pub fn session_from_config(config: &Config) -> Result<AuthSession, Error> {
    let auth_config = AuthConfig::from_config(config)?;
    let exchanger = Arc::new(GraphExchanger::new(&auth_config)?);
    let store = Box::new(config.clone());
    Ok(AuthSession::new(store, exchanger))
}

/// Perform OAuth2 device-code login flow
pub async fn login(force: bool) -> Result<()> {
    let config = Config::load()?;
    let auth_config = AuthConfig::from_config(&config)?;
    let session = session_from_config(&config)?;

    // Check for an existing usable session (refreshes transparently).
    if !force {
        match session.bearer_token().await {
            Ok(_) => {
                println!("Already logged in. Use --force to re-authenticate.");
                return Ok(());
            }
            Err(Error::NotAuthenticated) | Err(Error::AuthExpired) => {}
            Err(e) => {
                tracing::warn!("Session check failed, falling back to device code: {e}");
            }
        }
    }

    let client = build_client(&auth_config)?;

    tracing::info!("Initiating device code flow...");

    let mut device_request = client.exchange_device_code()?;
    for scope in SCOPES {
        device_request = device_request.add_scope(Scope::new(scope.to_string()));
    }
    let device_auth_response: StandardDeviceAuthorizationResponse = device_request
        .request_async(oauth2::reqwest::async_http_client)
        .await
        .context("Failed to request device code")?;

    let verification_url = device_auth_response.verification_uri().as_str();
    let user_code = device_auth_response.user_code().secret();

    println!();
    println!("To sign in, visit: {}", verification_url);
    println!("Enter code:        {}", user_code);
    println!();

    tracing::info!("Waiting for authentication...");

    let token_response = client
        .exchange_device_access_token(&device_auth_response)
        .request_async(oauth2::reqwest::async_http_client, tokio::time::sleep, None)
        .await
        .context("Failed to exchange device code for token")?;

    session
        .install(
            token_response.access_token().secret().to_string(),
            token_response.expires_in().map(|d| d.as_secs()),
            token_response
                .refresh_token()
                .map(|rt| rt.secret().to_string()),
        )
        .await;

    println!("Login successful.");
    Ok(())
}

/// Clear stored credentials
pub async fn logout() -> Result<()> {
    let mut config = Config::load()?;
    config.clear_all_tokens();
    config.save()?;
    println!("Logged out.");
    Ok(())
}

/// Display current auth and API-key status
pub async fn status() -> Result<()> {
    use crate::auth::TokenStore;

    let config = Config::load()?;

    match config.get_access_token() {
        Some(token) if !token.is_expired() => {
            println!("Access token: valid");
            if let Some(exp) = token.expires_at {
                println!("  expires_at: {}", exp);
            }
        }
        Some(_) => println!("Access token: expired"),
        None => println!("Access token: none"),
    }

    match config.get_refresh_token() {
        Some(_) => println!("Refresh tok:  present"),
        None => println!("Refresh tok:  none"),
    }

    match config.govee_api_key {
        Some(_) => println!("Govee key:    present"),
        None => println!("Govee key:    none (set 'govee_api_key' in the config file)"),
    }

    if config.get_access_token().is_none() {
        println!("\nRun 'glowdesk login' to authenticate.");
    }

    Ok(())
}
