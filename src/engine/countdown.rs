//! Meeting countdown state machine
//!
//! Turns "next qualifying event" plus "now" into a continuously advancing
//! progress fraction and, combined with the two configured colors, a
//! blended (or zoned) color. All functions here are pure; the engine calls
//! them on every recompute.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{next_upcoming, zone_colors, CalendarEvent, Rgb};

/// User-configured meeting tracker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeetingTrackerConfig {
    pub enabled: bool,
    /// Countdown window length in minutes.
    pub window_minutes: u32,
    pub idle_color: Rgb,
    pub meeting_color: Rgb,
    /// Device ids opted into the tracker.
    pub devices: BTreeSet<String>,
}

impl Default for MeetingTrackerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            window_minutes: 15,
            idle_color: Rgb::new(0, 255, 0),
            meeting_color: Rgb::new(255, 0, 0),
            devices: BTreeSet::new(),
        }
    }
}

/// Derived tracker state; never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct MeetingTrackerState {
    pub event: Option<CalendarEvent>,
    /// Fractional minutes until the chosen event starts.
    pub minutes_remaining: Option<f64>,
    /// Linear progress in [0, 1]; 0.0 while inactive.
    pub progress: f64,
    pub active: bool,
}

impl MeetingTrackerState {
    pub fn inactive() -> Self {
        Self {
            event: None,
            minutes_remaining: None,
            progress: 0.0,
            active: false,
        }
    }
}

/// Evaluate the tracker against the current event collection.
///
/// The next qualifying event is the earliest upcoming one -- every upcoming
/// event qualifies here, regardless of its busy classification (unlike the
/// coarse resolver overlay, which only watches busy events).
pub fn evaluate(
    config: &MeetingTrackerConfig,
    events: &[CalendarEvent],
    now: DateTime<Utc>,
) -> MeetingTrackerState {
    if !config.enabled {
        return MeetingTrackerState::inactive();
    }

    let Some(event) = next_upcoming(events, now) else {
        return MeetingTrackerState::inactive();
    };

    let remaining = event.minutes_until_start(now);
    let window = config.window_minutes.max(1) as f64;
    let active = remaining <= window;
    let progress = if active {
        (1.0 - remaining / window).clamp(0.0, 1.0)
    } else {
        0.0
    };

    MeetingTrackerState {
        event: Some(event.clone()),
        minutes_remaining: Some(remaining),
        progress,
        active,
    }
}

/// Single-device blended color: a smooth ramp from idle to meeting color.
pub fn blended_color(config: &MeetingTrackerConfig, state: &MeetingTrackerState) -> Rgb {
    if !state.active {
        return config.idle_color;
    }
    config
        .idle_color
        .blend(config.meeting_color, state.progress)
}

/// Multi-zone variant for strip devices.
pub fn zoned_colors(
    config: &MeetingTrackerConfig,
    state: &MeetingTrackerState,
    zones: usize,
) -> Vec<Rgb> {
    if !state.active {
        return vec![config.idle_color; zones];
    }
    zone_colors(zones, state.progress, config.idle_color, config.meeting_color)
}
