//! Calendar view query

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;

use super::client::GraphClient;
use crate::error::{Error, Result};
use crate::models::{BusyStatus, CalendarEvent};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireDateTime {
    date_time: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEmail {
    name: Option<String>,
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAttendee {
    email_address: Option<WireEmail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireLocation {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEvent {
    id: String,
    subject: Option<String>,
    start: WireDateTime,
    end: WireDateTime,
    #[serde(default)]
    is_all_day: Option<bool>,
    #[serde(default)]
    show_as: Option<String>,
    #[serde(rename = "type", default)]
    event_type: Option<String>,
    #[serde(default)]
    series_master_id: Option<String>,
    #[serde(default)]
    attendees: Option<Vec<WireAttendee>>,
    #[serde(default)]
    location: Option<WireLocation>,
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    value: Vec<WireEvent>,
}

/// Parse a Graph date-time ("2024-06-03T12:00:00.0000000"), already
/// UTC-normalized by the Prefer header on the request.
fn parse_graph_datetime(s: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Some(Utc.from_utc_datetime(&naive))
}

fn convert(wire: WireEvent) -> Option<CalendarEvent> {
    let start = parse_graph_datetime(&wire.start.date_time)?;
    let end = parse_graph_datetime(&wire.end.date_time)?;

    let is_recurring = wire.series_master_id.is_some()
        || matches!(
            wire.event_type.as_deref(),
            Some("occurrence") | Some("seriesMaster")
        );

    let attendees = wire
        .attendees
        .unwrap_or_default()
        .into_iter()
        .filter_map(|a| a.email_address)
        .filter_map(|e| e.name.or(e.address))
        .collect();

    Some(CalendarEvent {
        id: wire.id,
        subject: wire.subject.unwrap_or_else(|| "(no subject)".to_string()),
        start,
        end,
        is_all_day: wire.is_all_day.unwrap_or(false),
        show_as: wire
            .show_as
            .as_deref()
            .map(BusyStatus::parse)
            .unwrap_or(BusyStatus::Unknown),
        is_recurring,
        attendees,
        location: wire.location.and_then(|l| l.display_name),
    })
}

/// Fetch events in the next `hours`, sorted by start time.
///
/// Events with unparseable timestamps are skipped with a warning rather
/// than failing the whole poll.
pub async fn fetch_upcoming(client: &GraphClient, hours: i64) -> Result<Vec<CalendarEvent>> {
    let now = Utc::now();
    let until = now + Duration::hours(hours);
    let path = format!(
        "/me/calendarView?startDateTime={}&endDateTime={}&$orderby=start/dateTime&$top=50",
        now.format("%Y-%m-%dT%H:%M:%SZ"),
        until.format("%Y-%m-%dT%H:%M:%SZ"),
    );

    let resp = client
        .get_with_prefer(&path, "outlook.timezone=\"UTC\"")
        .await?;
    let body: EventsResponse = resp
        .json()
        .await
        .map_err(|e| Error::InvalidResponse(format!("bad calendar payload: {e}")))?;

    let mut events: Vec<CalendarEvent> = body
        .value
        .into_iter()
        .filter_map(|wire| {
            let id = wire.id.clone();
            let event = convert(wire);
            if event.is_none() {
                tracing::warn!("Skipping event {} with unparseable timestamps", id);
            }
            event
        })
        .collect();
    events.sort_by_key(|e| e.start);
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_graph_datetime() {
        let dt = parse_graph_datetime("2024-06-03T12:30:00.0000000").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 6, 3, 12, 30, 0).unwrap());

        let dt = parse_graph_datetime("2024-06-03T12:30:05").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 6, 3, 12, 30, 5).unwrap());

        assert!(parse_graph_datetime("yesterday").is_none());
    }

    #[test]
    fn test_convert_full_event() {
        let json = r#"{
            "id": "AAMk123",
            "subject": "Design review",
            "start": {"dateTime": "2024-06-03T13:00:00.0000000", "timeZone": "UTC"},
            "end": {"dateTime": "2024-06-03T13:30:00.0000000", "timeZone": "UTC"},
            "isAllDay": false,
            "showAs": "busy",
            "type": "occurrence",
            "seriesMasterId": "AAMkSeries",
            "attendees": [
                {"emailAddress": {"name": "Ada", "address": "ada@example.com"}},
                {"emailAddress": {"address": "grace@example.com"}}
            ],
            "location": {"displayName": "Room 4"}
        }"#;
        let wire: WireEvent = serde_json::from_str(json).unwrap();
        let event = convert(wire).unwrap();

        assert_eq!(event.subject, "Design review");
        assert_eq!(event.show_as, BusyStatus::Busy);
        assert!(event.is_recurring);
        assert_eq!(event.attendees, vec!["Ada", "grace@example.com"]);
        assert_eq!(event.location.as_deref(), Some("Room 4"));
        assert_eq!(event.duration(), Duration::minutes(30));
    }

    #[test]
    fn test_convert_minimal_event_defaults() {
        let json = r#"{
            "id": "AAMk456",
            "subject": null,
            "start": {"dateTime": "2024-06-03T13:00:00"},
            "end": {"dateTime": "2024-06-03T14:00:00"}
        }"#;
        let wire: WireEvent = serde_json::from_str(json).unwrap();
        let event = convert(wire).unwrap();

        assert_eq!(event.subject, "(no subject)");
        assert_eq!(event.show_as, BusyStatus::Unknown);
        assert!(!event.is_all_day);
        assert!(!event.is_recurring);
        assert!(event.attendees.is_empty());
    }

    #[test]
    fn test_convert_rejects_bad_timestamps() {
        let json = r#"{
            "id": "AAMk789",
            "start": {"dateTime": "not-a-date"},
            "end": {"dateTime": "2024-06-03T14:00:00"}
        }"#;
        let wire: WireEvent = serde_json::from_str(json).unwrap();
        assert!(convert(wire).is_none());
    }
}
