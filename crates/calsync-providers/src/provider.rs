//! Collaborator traits consumed by the session layer.
//!
//! - [`AuthorizationProvider`] performs the delegated-authorization handshake
//!   and revokes tokens.
//! - [`CalendarService`] lists and inserts events on a remote calendar.
//!
//! Each call returns its own future, so a completion can never be delivered
//! to an unrelated caller.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use calsync_core::TimeWindow;

use crate::error::ProviderResult;
use crate::remote_event::{NewEvent, RemoteEvent};

/// A boxed future for async trait methods.
///
/// Boxed futures keep the traits object-safe so they can be injected as
/// `Arc<dyn Trait>`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// How the authorization provider may interact with the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    /// Show the consent screen.
    Consent,
    /// Obtain a token without any user interaction, or fail.
    Silent,
}

impl PromptMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Consent => "consent",
            Self::Silent => "silent",
        }
    }
}

impl fmt::Display for PromptMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A freshly issued access token.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessGrant {
    /// The opaque bearer token.
    pub access_token: String,
    /// Lifetime reported by the provider, in seconds.
    pub expires_in: Option<i64>,
}

impl AccessGrant {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_in: None,
        }
    }

    /// Builder method to set the reported lifetime.
    pub fn with_expires_in(mut self, secs: i64) -> Self {
        self.expires_in = Some(secs);
        self
    }
}

impl fmt::Debug for AccessGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessGrant")
            .field("access_token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Issues and revokes access tokens.
pub trait AuthorizationProvider: Send + Sync {
    /// Returns the provider name (e.g. "google").
    fn name(&self) -> &str;

    /// Runs one handshake and resolves with its outcome.
    fn request_token(&self, prompt: PromptMode) -> BoxFuture<'_, ProviderResult<AccessGrant>>;

    /// Revokes an access token.
    fn revoke<'a>(&'a self, access_token: &'a str) -> BoxFuture<'a, ProviderResult<()>>;
}

/// Sort order for listed events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderBy {
    #[default]
    StartTime,
    Updated,
}

impl OrderBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StartTime => "startTime",
            Self::Updated => "updated",
        }
    }
}

/// Parameters of an event list query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    /// Events overlapping this window are returned.
    pub window: TimeWindow,
    /// Expand recurring events into individual instances.
    pub single_events: bool,
    /// Include cancelled events.
    pub show_deleted: bool,
    pub order_by: OrderBy,
}

impl EventQuery {
    /// Creates the query used for range synchronization: recurring events
    /// expanded, deleted events excluded, ordered by start time.
    pub fn for_window(window: TimeWindow) -> Self {
        Self {
            window,
            single_events: true,
            show_deleted: false,
            order_by: OrderBy::StartTime,
        }
    }
}

/// A remote calendar service.
pub trait CalendarService: Send + Sync {
    /// Returns the service name (e.g. "google").
    fn name(&self) -> &str;

    /// Lists the events of `calendar_id` matching `query`.
    fn list_events<'a>(
        &'a self,
        access_token: &'a str,
        calendar_id: &'a str,
        query: &'a EventQuery,
    ) -> BoxFuture<'a, ProviderResult<Vec<RemoteEvent>>>;

    /// Inserts an event into `calendar_id` and returns the stored event,
    /// including any conference data the service attached.
    fn insert_event<'a>(
        &'a self,
        access_token: &'a str,
        calendar_id: &'a str,
        event: &'a NewEvent,
    ) -> BoxFuture<'a, ProviderResult<RemoteEvent>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn sync_query_defaults() {
        let window = TimeWindow::new(
            Utc.with_ymd_and_hms(2024, 2, 25, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 4, 7, 0, 0, 0).unwrap(),
        );
        let query = EventQuery::for_window(window.clone());
        assert_eq!(query.window, window);
        assert!(query.single_events);
        assert!(!query.show_deleted);
        assert_eq!(query.order_by.as_str(), "startTime");
    }

    #[test]
    fn access_grant_debug_is_redacted() {
        let grant = AccessGrant::new("ya29.secret").with_expires_in(3599);
        let debug = format!("{:?}", grant);
        assert!(!debug.contains("ya29.secret"));
        assert!(debug.contains("3599"));
    }

    #[test]
    fn prompt_mode_names() {
        assert_eq!(PromptMode::Consent.to_string(), "consent");
        assert_eq!(PromptMode::Silent.to_string(), "silent");
    }
}
