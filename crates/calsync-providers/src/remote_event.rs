//! Remote event representations.
//!
//! [`RemoteEvent`] is the provider-agnostic shape of an event as a calendar
//! service returns it; [`NewEvent`] is the body sent when creating one.
//! [`RemoteEvent::to_calendar_event`] maps a remote event to the shape the
//! views render.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use calsync_core::{CalendarEvent, title_with_link};

/// The start or end of a remote event.
///
/// Services return either a timed instant or an all-day date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum RemoteEventTime {
    /// A specific instant.
    DateTime(DateTime<Utc>),
    /// An all-day date.
    Date(NaiveDate),
}

impl RemoteEventTime {
    /// Returns true if this is an all-day date.
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::Date(_))
    }

    /// Returns the instant, with all-day dates taken at midnight UTC.
    pub fn to_utc(&self) -> DateTime<Utc> {
        match self {
            Self::DateTime(dt) => *dt,
            Self::Date(date) => date.and_time(NaiveTime::MIN).and_utc(),
        }
    }
}

/// A way of joining a conference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntryPoint {
    /// The type of entry point (e.g. "video", "phone").
    pub entry_point_type: String,
    pub uri: Option<String>,
    pub label: Option<String>,
}

/// Conference data attached to an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConferenceData {
    /// The conference solution name (e.g. "Google Meet").
    pub solution_name: Option<String>,
    pub entry_points: Vec<RemoteEntryPoint>,
}

/// An event as returned by a calendar service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEvent {
    pub id: String,
    pub summary: Option<String>,
    pub start: RemoteEventTime,
    pub end: RemoteEventTime,
    /// "confirmed", "tentative" or "cancelled".
    pub status: Option<String>,
    pub html_link: Option<String>,
    pub conference_data: Option<RemoteConferenceData>,
}

impl RemoteEvent {
    /// Creates a new remote event with no optional fields set.
    pub fn new(id: impl Into<String>, start: RemoteEventTime, end: RemoteEventTime) -> Self {
        Self {
            id: id.into(),
            summary: None,
            start,
            end,
            status: None,
            html_link: None,
            conference_data: None,
        }
    }

    /// Builder method to set the summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Builder method to attach a single video entry point.
    pub fn with_conference_link(mut self, uri: impl Into<String>) -> Self {
        self.conference_data = Some(RemoteConferenceData {
            solution_name: None,
            entry_points: vec![RemoteEntryPoint {
                entry_point_type: "video".to_string(),
                uri: Some(uri.into()),
                label: None,
            }],
        });
        self
    }

    /// Returns true if the service marked the event as cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.status.as_deref() == Some("cancelled")
    }

    /// Returns the URI of the first conference entry point, if any.
    pub fn conference_link(&self) -> Option<&str> {
        self.conference_data
            .as_ref()
            .and_then(|cd| cd.entry_points.first())
            .and_then(|ep| ep.uri.as_deref())
    }

    /// Maps this event to the shape rendered by calendar views.
    pub fn to_calendar_event(&self) -> CalendarEvent {
        let summary = self.summary.as_deref().unwrap_or_default();
        CalendarEvent {
            start: self.start.to_utc(),
            end: self.end.to_utc(),
            title: title_with_link(summary, self.conference_link()),
        }
    }
}

/// The body of an event insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub summary: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// IANA time zone the event is recorded in.
    pub time_zone: String,
    /// Idempotency key for the conference the service should attach.
    pub conference_request_id: Option<String>,
}

impl NewEvent {
    /// Creates an event body recorded in UTC with no conference request.
    pub fn new(summary: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            summary: summary.into(),
            start,
            end,
            time_zone: "UTC".to_string(),
            conference_request_id: None,
        }
    }

    /// Builder method to request a conference with the given idempotency key.
    pub fn with_conference_request(mut self, request_id: impl Into<String>) -> Self {
        self.conference_request_id = Some(request_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn maps_timed_event_with_conference_link() {
        let event = RemoteEvent::new(
            "evt1",
            RemoteEventTime::DateTime(utc(2024, 3, 15, 10)),
            RemoteEventTime::DateTime(utc(2024, 3, 15, 11)),
        )
        .with_summary("Sync")
        .with_conference_link("https://meet.example/abc");

        let mapped = event.to_calendar_event();
        assert_eq!(mapped.title, "Sync (https://meet.example/abc)");
        assert_eq!(mapped.start, utc(2024, 3, 15, 10));
        assert_eq!(mapped.end, utc(2024, 3, 15, 11));
    }

    #[test]
    fn maps_all_day_event_to_utc_midnight() {
        let event = RemoteEvent::new(
            "evt2",
            RemoteEventTime::Date(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()),
            RemoteEventTime::Date(NaiveDate::from_ymd_opt(2024, 3, 16).unwrap()),
        )
        .with_summary("Holiday");

        let mapped = event.to_calendar_event();
        assert_eq!(mapped.title, "Holiday");
        assert_eq!(mapped.start, utc(2024, 3, 15, 0));
        assert_eq!(mapped.end, utc(2024, 3, 16, 0));
    }

    #[test]
    fn missing_summary_maps_to_empty_title() {
        let event = RemoteEvent::new(
            "evt3",
            RemoteEventTime::DateTime(utc(2024, 3, 15, 10)),
            RemoteEventTime::DateTime(utc(2024, 3, 15, 11)),
        );
        assert_eq!(event.to_calendar_event().title, "");
    }

    #[test]
    fn only_first_entry_point_is_used() {
        let mut event = RemoteEvent::new(
            "evt4",
            RemoteEventTime::DateTime(utc(2024, 3, 15, 10)),
            RemoteEventTime::DateTime(utc(2024, 3, 15, 11)),
        )
        .with_summary("Call");
        event.conference_data = Some(RemoteConferenceData {
            solution_name: Some("Google Meet".to_string()),
            entry_points: vec![
                RemoteEntryPoint {
                    entry_point_type: "phone".to_string(),
                    uri: None,
                    label: Some("+1 555 0100".to_string()),
                },
                RemoteEntryPoint {
                    entry_point_type: "video".to_string(),
                    uri: Some("https://meet.example/xyz".to_string()),
                    label: None,
                },
            ],
        });
        assert_eq!(event.conference_link(), None);
        assert_eq!(event.to_calendar_event().title, "Call");
    }
}
