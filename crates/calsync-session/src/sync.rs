//! Range synchronization.
//!
//! [`EventSynchronizer`] keeps the in-memory event collection in line with
//! the remote calendar for the visible range. A successful fetch replaces
//! the whole collection. Created events are appended locally until the next
//! fetch supersedes them.

use std::sync::{Arc, Weak};
use std::time::Duration;

use calsync_core::{CalendarEvent, ViewRange, title_with_link};
use calsync_providers::{CalendarService, EventQuery, NewEvent, RemoteEvent};
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::debounce::ScheduledTask;
use crate::error::{SessionError, SessionResult};
use crate::lifecycle::TokenLifecycle;

/// What a range fetch did to the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Not signed in, nothing was requested.
    Skipped,
    /// The collection was replaced with this many events.
    Replaced(usize),
}

/// Fetches and holds the events of the visible range.
///
/// Cloning is cheap and clones share the same collection. Dropping the
/// last clone cancels any pending debounced fetch.
#[derive(Clone)]
pub struct EventSynchronizer {
    inner: Arc<SyncInner>,
}

struct SyncInner {
    lifecycle: Arc<TokenLifecycle>,
    service: Arc<dyn CalendarService>,
    calendar_id: String,
    events: RwLock<Vec<CalendarEvent>>,
    debouncer: ScheduledTask,
}

impl EventSynchronizer {
    pub fn new(
        lifecycle: Arc<TokenLifecycle>,
        service: Arc<dyn CalendarService>,
        calendar_id: impl Into<String>,
        debounce: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(SyncInner {
                lifecycle,
                service,
                calendar_id: calendar_id.into(),
                events: RwLock::new(Vec::new()),
                debouncer: ScheduledTask::new(debounce),
            }),
        }
    }

    /// Replaces the collection with the events overlapping `range`.
    ///
    /// Does nothing while signed out. On failure the collection is left
    /// untouched.
    pub async fn fetch_range(&self, range: ViewRange) -> SessionResult<FetchOutcome> {
        self.inner.fetch_range(range).await
    }

    /// Fetches `range` once no other debounced fetch has been requested for
    /// the quiet window. Failures are logged.
    pub fn fetch_range_debounced(&self, range: ViewRange) {
        let inner: Weak<SyncInner> = Arc::downgrade(&self.inner);
        self.inner.debouncer.schedule(async move {
            let Some(inner) = inner.upgrade() else {
                return;
            };
            if let Err(e) = inner.fetch_range(range).await {
                warn!(error = %e, "debounced fetch failed");
            }
        });
    }

    /// Cancels a pending debounced fetch.
    pub fn cancel_pending(&self) -> bool {
        self.inner.debouncer.cancel()
    }

    /// Returns true while a debounced fetch is waiting or running.
    pub fn has_pending(&self) -> bool {
        self.inner.debouncer.is_pending()
    }

    /// Creates an event with a conference attached and appends it locally.
    pub async fn create_event(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        title: &str,
    ) -> SessionResult<CalendarEvent> {
        let token = self
            .inner
            .lifecycle
            .access_token()
            .ok_or(SessionError::NotSignedIn)?;

        let request = NewEvent::new(title, start, end)
            .with_conference_request(format!("meet-{}", Uuid::new_v4()));

        let created = self
            .inner
            .service
            .insert_event(&token, &self.inner.calendar_id, &request)
            .await
            .map_err(|e| {
                warn!(error = %e, "event creation failed");
                SessionError::Create(e)
            })?;

        let event = CalendarEvent::new(start, end, title_with_link(title, created.conference_link()));
        self.inner.events.write().await.push(event.clone());
        info!(id = %created.id, "created event");
        Ok(event)
    }

    /// Empties the collection.
    pub async fn clear(&self) {
        self.inner.events.write().await.clear();
        debug!("cleared events");
    }

    /// Returns a snapshot of the collection.
    pub async fn events(&self) -> Vec<CalendarEvent> {
        self.inner.events.read().await.clone()
    }

    pub fn calendar_id(&self) -> &str {
        &self.inner.calendar_id
    }
}

impl SyncInner {
    async fn fetch_range(&self, range: ViewRange) -> SessionResult<FetchOutcome> {
        let Some(token) = self.lifecycle.access_token() else {
            debug!("not signed in, skipping fetch");
            return Ok(FetchOutcome::Skipped);
        };

        let query = EventQuery::for_window(range.window());
        debug!(start = %range.start, end = %range.end, "fetching events");

        let remote = self
            .service
            .list_events(&token, &self.calendar_id, &query)
            .await
            .map_err(|e| {
                warn!(error = %e, "event fetch failed");
                SessionError::Fetch(e)
            })?;

        let events: Vec<CalendarEvent> = remote
            .iter()
            .filter(|e| !e.is_cancelled())
            .map(RemoteEvent::to_calendar_event)
            .collect();

        // a sign-out during the request already cleared the collection
        if !self.lifecycle.is_signed_in() {
            debug!("signed out during fetch, dropping results");
            return Ok(FetchOutcome::Skipped);
        }

        let count = events.len();
        *self.events.write().await = events;
        info!(count, "replaced events");
        Ok(FetchOutcome::Replaced(count))
    }
}
