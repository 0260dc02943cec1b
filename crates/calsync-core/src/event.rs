//! The event shape rendered by calendar views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time::TimeWindow;

/// A calendar event as shown in a view.
///
/// The title may carry a conferencing link appended in parentheses, see
/// [`title_with_link`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// When the event starts.
    pub start: DateTime<Utc>,
    /// When the event ends.
    pub end: DateTime<Utc>,
    /// Display title.
    pub title: String,
}

impl CalendarEvent {
    /// Creates a new event.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, title: impl Into<String>) -> Self {
        Self {
            start,
            end,
            title: title.into(),
        }
    }

    /// Returns true if the event overlaps the given window.
    pub fn overlaps(&self, window: &TimeWindow) -> bool {
        window.overlaps(self.start, self.end)
    }
}

/// Builds a display title, appending ` (<link>)` when a non-empty link is
/// present.
pub fn title_with_link(summary: &str, link: Option<&str>) -> String {
    match link.filter(|l| !l.is_empty()) {
        Some(link) => format!("{} ({})", summary, link),
        None => summary.to_string(),
    }
}
