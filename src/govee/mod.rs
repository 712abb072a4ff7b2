//! Govee platform API client
//!
//! Device discovery and control over the openapi.api.govee.com router,
//! authenticated with the account API key. Every request passes through the
//! shared rate limiter first; the vendor budget is per-account, so discovery
//! and control draw from the same window.

pub mod limiter;
pub mod registry;

pub use limiter::RateLimiter;
pub use registry::DeviceRegistry;

use std::sync::Arc;

use serde::de;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::{Capability, Device, Rgb};

const GOVEE_BASE: &str = "https://openapi.api.govee.com";

/// Upstream sends device ids as either a string or a bare integer.
/// Resolve that once here, at the parse boundary.
fn string_or_int<'de, D: de::Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = String;
        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("string or integer id")
        }
        fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<String, E> {
            Ok(v.to_string())
        }
        fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<String, E> {
            Ok(v.to_string())
        }
        fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<String, E> {
            Ok(v.to_string())
        }
    }
    d.deserialize_any(Visitor)
}

#[derive(Debug, Deserialize)]
struct WireCapability {
    #[serde(default)]
    instance: String,
}

#[derive(Debug, Deserialize)]
struct WireDevice {
    #[serde(deserialize_with = "string_or_int")]
    device: String,
    sku: String,
    #[serde(rename = "deviceName", default)]
    device_name: String,
    #[serde(default)]
    capabilities: Vec<WireCapability>,
}

#[derive(Debug, Deserialize)]
struct DevicesResponse {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Vec<WireDevice>,
}

#[derive(Debug, Deserialize)]
struct ControlResponse {
    code: i64,
    #[serde(default)]
    message: Option<String>,
}

impl From<WireDevice> for Device {
    fn from(wire: WireDevice) -> Self {
        Device {
            id: wire.device,
            sku: wire.sku,
            name: wire.device_name,
            capabilities: wire
                .capabilities
                .iter()
                .map(|c| Capability::from_instance(&c.instance))
                .collect(),
            reachable: true,
            last_update: None,
        }
    }
}

/// A single device-control operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Color(Rgb),
    /// Percent, clamped to the vendor's 1..=100 range.
    Brightness(u8),
    Power(bool),
}

impl Command {
    /// The capability object of the control payload.
    pub fn capability_json(&self) -> serde_json::Value {
        match *self {
            Command::Color(color) => serde_json::json!({
                "type": "devices.capabilities.color_setting",
                "instance": "colorRgb",
                "value": color.to_packed(),
            }),
            Command::Brightness(percent) => serde_json::json!({
                "type": "devices.capabilities.range",
                "instance": "brightness",
                "value": percent.clamp(1, 100),
            }),
            Command::Power(on) => serde_json::json!({
                "type": "devices.capabilities.on_off",
                "instance": "powerSwitch",
                "value": if on { 1 } else { 0 },
            }),
        }
    }
}

/// API-key-authenticated client for discovery and control.
pub struct GoveeClient {
    http: reqwest::Client,
    api_key: String,
    limiter: Arc<RateLimiter>,
}

impl GoveeClient {
    pub fn new(api_key: Option<String>, limiter: Arc<RateLimiter>) -> Result<Self> {
        let api_key = api_key
            .filter(|k| !k.is_empty())
            .ok_or(Error::NotAuthenticated)?;
        Ok(Self {
            http: reqwest::Client::new(),
            api_key,
            limiter,
        })
    }

    /// Discover the account's controllable devices.
    pub async fn list_devices(&self) -> Result<Vec<Device>> {
        self.limiter.admit().await;

        let url = format!("{}/router/api/v1/user/devices", GOVEE_BASE);
        tracing::debug!("Govee GET {}", url);

        let resp = self
            .http
            .get(&url)
            .header("Govee-API-Key", &self.api_key)
            .send()
            .await?;
        let resp = check_status(resp, None)?;

        let body: DevicesResponse = resp
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(format!("bad devices payload: {e}")))?;
        check_code(body.code, body.message.as_deref(), None)?;

        Ok(body.data.into_iter().map(Device::from).collect())
    }

    /// Send one control command to one device.
    pub async fn control(&self, device_id: &str, sku: &str, command: Command) -> Result<()> {
        self.limiter.admit().await;

        let url = format!("{}/router/api/v1/device/control", GOVEE_BASE);
        let body = serde_json::json!({
            "requestId": uuid::Uuid::new_v4().to_string(),
            "payload": {
                "device": device_id,
                "sku": sku,
                "capability": command.capability_json(),
            }
        });
        tracing::debug!("Govee POST {} ({:?} -> {})", url, command, device_id);

        let resp = self
            .http
            .post(&url)
            .header("Govee-API-Key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let resp = check_status(resp, Some(device_id))?;

        let body: ControlResponse = resp
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(format!("bad control payload: {e}")))?;
        check_code(body.code, body.message.as_deref(), Some(device_id))
    }
}

/// Map an HTTP status to an error kind; pass successful responses through.
fn check_status(resp: reqwest::Response, device_id: Option<&str>) -> Result<reqwest::Response> {
    let status = resp.status();
    match status.as_u16() {
        200..=299 => Ok(resp),
        401 | 403 => Err(Error::NotAuthenticated),
        404 => Err(match device_id {
            Some(id) => Error::DeviceNotFound(id.to_string()),
            None => Error::InvalidResponse("HTTP 404".into()),
        }),
        429 => Err(Error::RateLimited),
        _ => Err(Error::InvalidResponse(format!("HTTP {}", status.as_u16()))),
    }
}

/// The router mirrors status codes inside the body; treat those the same.
fn check_code(code: i64, message: Option<&str>, device_id: Option<&str>) -> Result<()> {
    match code {
        200 => Ok(()),
        401 | 403 => Err(Error::NotAuthenticated),
        404 => Err(match device_id {
            Some(id) => Error::DeviceNotFound(id.to_string()),
            None => Error::InvalidResponse("code 404".into()),
        }),
        429 => Err(Error::RateLimited),
        other => Err(Error::InvalidResponse(format!(
            "code {}: {}",
            other,
            message.unwrap_or("")
        ))),
    }
}
