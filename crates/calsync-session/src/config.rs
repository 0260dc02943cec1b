//! Session configuration.

use std::time::Duration;

use calsync_core::{Granularity, WeekStart};

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Lifetime assumed for freshly issued tokens.
    pub token_validity: Duration,

    /// Quiet window of debounced range fetches.
    pub debounce: Duration,

    /// Calendar to read from and write to.
    pub calendar_id: String,

    /// First day of the week for week and month views.
    pub week_start: WeekStart,

    /// View shown before the user picks one.
    pub default_view: Granularity,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token_validity: Duration::from_secs(Self::DEFAULT_TOKEN_VALIDITY_SECS),
            debounce: Duration::from_millis(Self::DEFAULT_DEBOUNCE_MS),
            calendar_id: Self::DEFAULT_CALENDAR_ID.to_string(),
            week_start: WeekStart::default(),
            default_view: Granularity::Month,
        }
    }
}

impl SessionConfig {
    pub const DEFAULT_TOKEN_VALIDITY_SECS: u64 = 3600;
    pub const DEFAULT_DEBOUNCE_MS: u64 = 300;
    pub const DEFAULT_CALENDAR_ID: &'static str = "primary";

    /// Creates a session configuration for the given calendar.
    pub fn new(calendar_id: impl Into<String>) -> Self {
        Self {
            calendar_id: calendar_id.into(),
            ..Default::default()
        }
    }

    /// Builder: set token validity.
    pub fn with_token_validity(mut self, validity: Duration) -> Self {
        self.token_validity = validity;
        self
    }

    /// Builder: set debounce window.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Builder: set week start.
    pub fn with_week_start(mut self, week_start: WeekStart) -> Self {
        self.week_start = week_start;
        self
    }

    /// Builder: set default view.
    pub fn with_default_view(mut self, view: Granularity) -> Self {
        self.default_view = view;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    #[test]
    fn default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.token_validity, Duration::from_secs(3600));
        assert_eq!(config.debounce, Duration::from_millis(300));
        assert_eq!(config.calendar_id, "primary");
        assert_eq!(config.week_start, WeekStart(Weekday::Sun));
        assert_eq!(config.default_view, Granularity::Month);
    }

    #[test]
    fn custom_config() {
        let config = SessionConfig::new("team@example.com")
            .with_token_validity(Duration::from_secs(600))
            .with_debounce(Duration::from_millis(50))
            .with_week_start(WeekStart(Weekday::Mon))
            .with_default_view(Granularity::Agenda);

        assert_eq!(config.calendar_id, "team@example.com");
        assert_eq!(config.token_validity, Duration::from_secs(600));
        assert_eq!(config.debounce, Duration::from_millis(50));
        assert_eq!(config.week_start, WeekStart(Weekday::Mon));
        assert_eq!(config.default_view, Granularity::Agenda);
    }
}
