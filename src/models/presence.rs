//! Presence models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User presence availability.
///
/// Unifies the upstream availability and activity signals into one value:
/// call/meeting activities are promoted over a plain `Busy` so the mapping
/// can distinguish them. Parsing is total -- anything unrecognized becomes
/// `Unknown` rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Availability {
    Available,
    AvailableIdle,
    Away,
    BeRightBack,
    Busy,
    BusyIdle,
    DoNotDisturb,
    InACall,
    InAMeeting,
    Offline,
    Unknown,
}

impl Availability {
    /// Map upstream `availability` + `activity` strings to one value.
    pub fn from_parts(availability: &str, activity: &str) -> Self {
        match activity {
            "InACall" | "InAConferenceCall" | "OnThePhone" => return Self::InACall,
            "InAMeeting" => return Self::InAMeeting,
            _ => {}
        }
        match availability {
            "Available" => Self::Available,
            "AvailableIdle" => Self::AvailableIdle,
            "Away" => Self::Away,
            "BeRightBack" => Self::BeRightBack,
            "Busy" => Self::Busy,
            "BusyIdle" => Self::BusyIdle,
            "DoNotDisturb" => Self::DoNotDisturb,
            "Offline" => Self::Offline,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Available => "Available",
            Self::AvailableIdle => "Available (idle)",
            Self::Away => "Away",
            Self::BeRightBack => "Be right back",
            Self::Busy => "Busy",
            Self::BusyIdle => "Busy (idle)",
            Self::DoNotDisturb => "Do not disturb",
            Self::InACall => "In a call",
            Self::InAMeeting => "In a meeting",
            Self::Offline => "Offline",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Immutable presence snapshot, replaced wholesale on each successful poll.
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceSnapshot {
    pub availability: Availability,
    /// Free-text activity as reported upstream (e.g. "Presenting").
    pub activity: Option<String>,
    pub observed_at: DateTime<Utc>,
}

impl PresenceSnapshot {
    pub fn new(availability: &str, activity: &str, observed_at: DateTime<Utc>) -> Self {
        Self {
            availability: Availability::from_parts(availability, activity),
            activity: (!activity.is_empty()).then(|| activity.to_string()),
            observed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts_basic() {
        assert_eq!(
            Availability::from_parts("Available", "Available"),
            Availability::Available
        );
        assert_eq!(
            Availability::from_parts("DoNotDisturb", "Presenting"),
            Availability::DoNotDisturb
        );
    }

    #[test]
    fn test_activity_promotes_call_and_meeting() {
        assert_eq!(
            Availability::from_parts("Busy", "InACall"),
            Availability::InACall
        );
        assert_eq!(
            Availability::from_parts("Busy", "InAMeeting"),
            Availability::InAMeeting
        );
        assert_eq!(
            Availability::from_parts("DoNotDisturb", "InAConferenceCall"),
            Availability::InACall
        );
    }

    #[test]
    fn test_unrecognized_degrades_to_unknown() {
        assert_eq!(
            Availability::from_parts("PresenceUnknown", ""),
            Availability::Unknown
        );
        assert_eq!(
            Availability::from_parts("SomethingNew", "SomethingElse"),
            Availability::Unknown
        );
    }
}
