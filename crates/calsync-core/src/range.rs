//! View range resolution.
//!
//! Maps a calendar view granularity and an anchor date to the concrete
//! half-open interval the view displays. The date math is done on plain
//! calendar dates with an explicit first day of week, then pinned to
//! instants in the anchor's own time zone.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::time::{TimeWindow, local_midnight};

/// Number of days after the anchor covered by the agenda view.
pub const AGENDA_DAYS: u64 = 30;

/// The granularity of a calendar view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Granularity {
    /// Complete weeks covering a calendar month.
    #[default]
    Month,
    /// A single calendar week.
    Week,
    /// A single day.
    Day,
    /// A rolling list starting at the anchor day.
    Agenda,
}

impl Granularity {
    /// Parses a view name, falling back to [`Granularity::Month`] for
    /// anything unrecognised.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "week" => Self::Week,
            "day" => Self::Day,
            "agenda" => Self::Agenda,
            _ => Self::Month,
        }
    }

    /// Returns the view name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Month => "month",
            Self::Week => "week",
            Self::Day => "day",
            Self::Agenda => "agenda",
        }
    }
}

impl FromStr for Granularity {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The first day of the week used to lay out week and month views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekStart(pub Weekday);

impl Default for WeekStart {
    fn default() -> Self {
        Self(Weekday::Sun)
    }
}

impl WeekStart {
    /// Returns the first day of the week containing `date`.
    pub fn week_of(&self, date: NaiveDate) -> NaiveDate {
        let offset = (7 + date.weekday().num_days_from_sunday() - self.0.num_days_from_sunday()) % 7;
        date - Days::new(u64::from(offset))
    }
}

impl FromStr for WeekStart {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<Weekday>()
            .map(Self)
            .map_err(|_| format!("invalid week start day: {}", s))
    }
}

/// The visible window of a calendar view, as a half-open UTC interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewRange {
    /// First visible instant (inclusive).
    pub start: DateTime<Utc>,
    /// End of the last visible day (exclusive).
    pub end: DateTime<Utc>,
}

impl ViewRange {
    /// Returns the range as a query window.
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start, self.end)
    }

    /// Returns the length of the range.
    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }
}

impl From<ViewRange> for TimeWindow {
    fn from(range: ViewRange) -> Self {
        range.window()
    }
}

/// Resolves the visible days of a view as `(first_day, end_exclusive_day)`.
pub fn resolve_days(
    granularity: Granularity,
    date: NaiveDate,
    week_start: WeekStart,
) -> (NaiveDate, NaiveDate) {
    match granularity {
        Granularity::Month => {
            let first = date.with_day(1).unwrap_or(date);
            let last = first
                .checked_add_months(chrono::Months::new(1))
                .and_then(|next| next.pred_opt())
                .unwrap_or(date);
            (week_start.week_of(first), week_start.week_of(last) + Days::new(7))
        }
        Granularity::Week => {
            let first = week_start.week_of(date);
            (first, first + Days::new(7))
        }
        Granularity::Day => (date, date + Days::new(1)),
        // End of the day AGENDA_DAYS after the anchor
        Granularity::Agenda => (date, date + Days::new(AGENDA_DAYS + 1)),
    }
}

/// Resolves the visible range of a view anchored at `anchor`.
///
/// Day boundaries are taken in the anchor's time zone.
pub fn resolve_range<Tz: TimeZone>(
    granularity: Granularity,
    anchor: &DateTime<Tz>,
    week_start: WeekStart,
) -> ViewRange {
    let tz = anchor.timezone();
    let (first, end) = resolve_days(granularity, anchor.date_naive(), week_start);
    ViewRange {
        start: local_midnight(&tz, first),
        end: local_midnight(&tz, end),
    }
}
