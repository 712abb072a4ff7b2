//! Calendar event models

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Free/busy classification of a calendar event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusyStatus {
    Free,
    Tentative,
    Busy,
    OutOfOffice,
    WorkingElsewhere,
    Unknown,
}

impl BusyStatus {
    /// Parse the upstream `showAs` string. Total -- unknown values degrade.
    pub fn parse(s: &str) -> Self {
        match s {
            "free" => Self::Free,
            "tentative" => Self::Tentative,
            "busy" => Self::Busy,
            "oof" => Self::OutOfOffice,
            "workingElsewhere" => Self::WorkingElsewhere,
            _ => Self::Unknown,
        }
    }
}

/// Immutable calendar event. A poll replaces the entire upcoming collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEvent {
    pub id: String,
    pub subject: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub is_all_day: bool,
    pub show_as: BusyStatus,
    pub is_recurring: bool,
    pub attendees: Vec<String>,
    pub location: Option<String>,
}

impl CalendarEvent {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// True while `now` is within [start, end].
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now <= self.end
    }

    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.start > now
    }

    /// Fractional minutes until start; negative once the event has begun.
    pub fn minutes_until_start(&self, now: DateTime<Utc>) -> f64 {
        (self.start - now).num_milliseconds() as f64 / 60_000.0
    }
}

/// Earliest upcoming event, if any. Input order does not matter.
pub fn next_upcoming<'a>(
    events: &'a [CalendarEvent],
    now: DateTime<Utc>,
) -> Option<&'a CalendarEvent> {
    events
        .iter()
        .filter(|e| e.is_upcoming(now))
        .min_by_key(|e| e.start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(id: &str, start_min: i64, end_min: i64) -> CalendarEvent {
        let base = Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap();
        CalendarEvent {
            id: id.to_string(),
            subject: format!("event {id}"),
            start: base + Duration::minutes(start_min),
            end: base + Duration::minutes(end_min),
            is_all_day: false,
            show_as: BusyStatus::Busy,
            is_recurring: false,
            attendees: Vec::new(),
            location: None,
        }
    }

    fn base_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_derived_properties() {
        let e = event("a", 10, 40);
        let now = base_now();
        assert_eq!(e.duration(), Duration::minutes(30));
        assert!(e.is_upcoming(now));
        assert!(!e.is_active(now));
        assert!((e.minutes_until_start(now) - 10.0).abs() < 1e-9);

        let mid = now + Duration::minutes(20);
        assert!(e.is_active(mid));
        assert!(!e.is_upcoming(mid));
        assert!(e.minutes_until_start(mid) < 0.0);
    }

    #[test]
    fn test_next_upcoming_picks_earliest_future() {
        let now = base_now();
        let events = vec![event("later", 30, 60), event("past", -60, -30), event("soon", 5, 35)];
        let next = next_upcoming(&events, now).unwrap();
        assert_eq!(next.id, "soon");
    }

    #[test]
    fn test_next_upcoming_none_when_all_past_or_active() {
        let now = base_now();
        let events = vec![event("past", -60, -30), event("active", -5, 25)];
        assert!(next_upcoming(&events, now).is_none());
    }

    #[test]
    fn test_busy_status_parse_total() {
        assert_eq!(BusyStatus::parse("busy"), BusyStatus::Busy);
        assert_eq!(BusyStatus::parse("oof"), BusyStatus::OutOfOffice);
        assert_eq!(BusyStatus::parse("workingElsewhere"), BusyStatus::WorkingElsewhere);
        assert_eq!(BusyStatus::parse("somethingNew"), BusyStatus::Unknown);
    }
}
