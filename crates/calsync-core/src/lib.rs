//! Core types: view ranges, events, time windows, tracing

pub mod event;
pub mod range;
pub mod time;
pub mod tracing;

pub use event::{CalendarEvent, title_with_link};
pub use range::{AGENDA_DAYS, Granularity, ViewRange, WeekStart, resolve_days, resolve_range};
pub use time::{TimeWindow, local_midnight};
pub use self::tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
