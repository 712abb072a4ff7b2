//! Configuration and credential storage

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;

use crate::auth::{StoredToken, TokenStore};
use crate::engine::countdown::MeetingTrackerConfig;
use crate::engine::mapping::ColorMapping;
use crate::models::DeviceAssignment;

/// Polling intervals in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub presence_secs: u64,
    pub calendar_secs: u64,
    /// Low-frequency recompute tick that catches missed notifications.
    pub safety_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            presence_secs: 15,
            calendar_secs: 60,
            safety_secs: 60,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Stored Graph access token
    pub access_token: Option<StoredToken>,
    /// Stored AAD refresh token
    pub refresh_token: Option<String>,
    /// OAuth client id of the app registration (required for login)
    pub client_id: Option<String>,
    /// Azure AD tenant, defaults to "common"
    pub tenant: Option<String>,
    /// Govee platform API key
    pub govee_api_key: Option<String>,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub colors: ColorMapping,
    #[serde(default)]
    pub tracker: MeetingTrackerConfig,
    /// Device ids the engine drives; empty means drive nothing.
    #[serde(default)]
    pub selected_devices: BTreeSet<String>,
    /// Per-device assignment; devices without an entry default to presence.
    #[serde(default)]
    pub assignments: BTreeMap<String, DeviceAssignment>,
}

impl Config {
    /// Get config directory path
    fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "glowdesk", "glowdesk")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Get config file path
    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from disk
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir).context("Failed to create config directory")?;

        let path = Self::config_path()?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, content).context("Failed to write config file")?;

        // Set restrictive permissions on config file (contains tokens)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }

    pub fn clear_all_tokens(&mut self) {
        self.access_token = None;
        self.refresh_token = None;
    }

    /// Effective assignment for a device.
    ///
    /// An explicit entry wins; a device opted into the meeting tracker but
    /// without an entry gets `Both`; everything else defaults to presence.
    pub fn assignment(&self, device_id: &str) -> DeviceAssignment {
        if let Some(a) = self.assignments.get(device_id) {
            return *a;
        }
        if self.tracker.devices.contains(device_id) {
            return DeviceAssignment::Both;
        }
        DeviceAssignment::Presence
    }

    /// Assignments with tracker opt-ins folded in, for seeding the registry.
    pub fn effective_assignments(&self) -> BTreeMap<String, DeviceAssignment> {
        let mut map = self.assignments.clone();
        for id in &self.tracker.devices {
            map.entry(id.clone()).or_insert(DeviceAssignment::Both);
        }
        map
    }
}

impl TokenStore for Config {
    fn get_access_token(&self) -> Option<StoredToken> {
        self.access_token.clone()
    }

    fn set_access_token(&mut self, token: String, expires_in: Option<u64>) {
        self.access_token = Some(StoredToken::new(token, expires_in));
    }

    fn get_refresh_token(&self) -> Option<String> {
        self.refresh_token.clone()
    }

    fn set_refresh_token(&mut self, token: String) {
        self.refresh_token = Some(token);
    }

    fn clear_tokens(&mut self) {
        self.clear_all_tokens();
    }

    fn flush(&mut self) -> Result<()> {
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_assignment_is_presence() {
        let config = Config::default();
        assert_eq!(config.assignment("any-device"), DeviceAssignment::Presence);
    }

    #[test]
    fn test_explicit_assignment_wins() {
        let mut config = Config::default();
        config
            .assignments
            .insert("lamp".to_string(), DeviceAssignment::Both);
        assert_eq!(config.assignment("lamp"), DeviceAssignment::Both);
        assert_eq!(config.assignment("other"), DeviceAssignment::Presence);
    }

    #[test]
    fn test_tracker_opt_in_implies_both() {
        let mut config = Config::default();
        config.tracker.devices.insert("strip".to_string());
        assert_eq!(config.assignment("strip"), DeviceAssignment::Both);

        // An explicit assignment still wins over tracker opt-in.
        config
            .assignments
            .insert("strip".to_string(), DeviceAssignment::Countdown);
        assert_eq!(config.assignment("strip"), DeviceAssignment::Countdown);
    }

    #[test]
    fn test_empty_config_parses_with_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.poll.presence_secs, 15);
        assert_eq!(config.poll.calendar_secs, 60);
        assert!(config.selected_devices.is_empty());
        assert!(!config.tracker.enabled);
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.govee_api_key = Some("key".into());
        config.selected_devices.insert("dev1".into());
        config
            .assignments
            .insert("dev1".into(), DeviceAssignment::Countdown);

        let s = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&s).unwrap();
        assert_eq!(back.govee_api_key.as_deref(), Some("key"));
        assert_eq!(back.assignment("dev1"), DeviceAssignment::Countdown);
    }
}
