//! Controllable device models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Capability tag advertised by a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    ColorRgb,
    Brightness,
    Power,
    /// Anything the engine does not drive, kept for display.
    Other(String),
}

impl Capability {
    /// Map an upstream capability instance name to a tag.
    pub fn from_instance(instance: &str) -> Self {
        match instance {
            "colorRgb" => Self::ColorRgb,
            "brightness" => Self::Brightness,
            "powerSwitch" => Self::Power,
            other => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ColorRgb => f.write_str("color"),
            Self::Brightness => f.write_str("brightness"),
            Self::Power => f.write_str("power"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// A discovered controllable device.
///
/// Created by discovery, updated in place as commands succeed or fail,
/// removed only by re-discovery.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub capabilities: Vec<Capability>,
    /// Locally tracked: false after the last command to it failed.
    pub reachable: bool,
    pub last_update: Option<DateTime<Utc>>,
}

impl Device {
    pub fn supports_color(&self) -> bool {
        self.capabilities.contains(&Capability::ColorRgb)
    }
}

/// Which signal drives a device's color.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceAssignment {
    /// Presence only (with the legacy coarse countdown overlay).
    #[default]
    Presence,
    /// Meeting countdown only.
    Countdown,
    /// Both; the countdown takes precedence while active.
    Both,
}

impl std::str::FromStr for DeviceAssignment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "presence" => Ok(Self::Presence),
            "countdown" => Ok(Self::Countdown),
            "both" => Ok(Self::Both),
            other => Err(format!(
                "unknown assignment '{other}' (use: presence, countdown, both)"
            )),
        }
    }
}

impl std::fmt::Display for DeviceAssignment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Presence => f.write_str("presence"),
            Self::Countdown => f.write_str("countdown"),
            Self::Both => f.write_str("both"),
        }
    }
}
