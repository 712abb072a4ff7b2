//! Priority resolution: one deterministic target color per device
//!
//! Pure and total over its inputs -- absent data degrades to the next
//! lower-priority source instead of erroring, and the result never depends
//! on any previously shown color.

use chrono::{DateTime, Utc};

use super::countdown::{self, MeetingTrackerConfig, MeetingTrackerState};
use super::mapping::{ColorMapping, CountdownStage};
use crate::models::{BusyStatus, CalendarEvent, DeviceAssignment, PresenceSnapshot, Rgb};

/// Everything the resolver looks at for one device.
pub struct ResolverInputs<'a> {
    pub assignment: DeviceAssignment,
    pub presence: Option<&'a PresenceSnapshot>,
    pub events: &'a [CalendarEvent],
    pub tracker_config: &'a MeetingTrackerConfig,
    pub tracker: &'a MeetingTrackerState,
    pub mapping: &'a ColorMapping,
    pub now: DateTime<Utc>,
}

/// Compute the target color for one device.
pub fn resolve_color(inputs: &ResolverInputs) -> Rgb {
    let ResolverInputs {
        assignment,
        presence,
        events,
        tracker_config,
        tracker,
        mapping,
        now,
    } = inputs;

    // Countdown-driven: the tracker owns the device while active, and a
    // countdown-only device shows the idle color even when inactive.
    if *assignment == DeviceAssignment::Countdown
        || (*assignment == DeviceAssignment::Both && tracker.active)
    {
        return countdown::blended_color(tracker_config, tracker);
    }

    let Some(snapshot) = presence else {
        // No presence ever observed.
        return mapping.unknown;
    };

    // Coarse countdown overlay for devices driven purely by presence: the
    // old stage behavior for devices not opted into the full tracker.
    if *assignment == DeviceAssignment::Presence {
        if let Some(stage) = legacy_stage(events, *now) {
            return mapping.stage_color(stage);
        }
    }

    mapping.presence_color(snapshot.availability)
}

/// Stage of the nearest busy-classified event, most specific first:
/// currently active, then the 1/5/15-minute buckets.
fn legacy_stage(events: &[CalendarEvent], now: DateTime<Utc>) -> Option<CountdownStage> {
    let busy = events.iter().filter(|e| e.show_as == BusyStatus::Busy);

    if busy.clone().any(|e| e.is_active(now)) {
        return Some(CountdownStage::Active);
    }

    let next = busy
        .filter(|e| e.is_upcoming(now))
        .min_by_key(|e| e.start)?;

    let minutes = next.minutes_until_start(now);
    if minutes <= 1.0 {
        Some(CountdownStage::OneMinute)
    } else if minutes <= 5.0 {
        Some(CountdownStage::FiveMinutes)
    } else if minutes <= 15.0 {
        Some(CountdownStage::FifteenMinutes)
    } else {
        None
    }
}
