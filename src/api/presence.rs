//! Presence query

use chrono::Utc;
use serde::Deserialize;

use super::client::GraphClient;
use crate::error::{Error, Result};
use crate::models::PresenceSnapshot;

#[derive(Debug, Deserialize)]
struct PresenceResponse {
    availability: String,
    #[serde(default)]
    activity: Option<String>,
}

/// Fetch the current presence snapshot.
pub async fn fetch_presence(client: &GraphClient) -> Result<PresenceSnapshot> {
    let resp = client.get("/me/presence").await?;
    let presence: PresenceResponse = resp
        .json()
        .await
        .map_err(|e| Error::InvalidResponse(format!("bad presence payload: {e}")))?;

    Ok(PresenceSnapshot::new(
        &presence.availability,
        presence.activity.as_deref().unwrap_or(""),
        Utc::now(),
    ))
}
