//! The calendar session facade.
//!
//! [`CalendarSession`] is what a presentation shell drives: it wires the
//! sign-in lifecycle to the synchronizer and tracks which view is shown.

use std::sync::{Arc, Mutex, PoisonError};

use calsync_core::{CalendarEvent, Granularity, ViewRange, WeekStart, resolve_range};
use calsync_providers::{AuthorizationProvider, CalendarService, KeyValueStore};
use chrono::{DateTime, Local, Utc};
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::error::SessionResult;
use crate::lifecycle::{SessionStatus, SessionWatch, SignInState, TokenLifecycle};
use crate::sync::{EventSynchronizer, FetchOutcome};

/// The view currently shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewState {
    pub granularity: Granularity,
    pub anchor: DateTime<Local>,
}

/// A signed-in calendar session.
pub struct CalendarSession {
    lifecycle: Arc<TokenLifecycle>,
    sync: EventSynchronizer,
    week_start: WeekStart,
    view: Mutex<ViewState>,
}

impl CalendarSession {
    /// Creates a signed-out session showing the configured default view of
    /// today.
    pub fn new(
        provider: Arc<dyn AuthorizationProvider>,
        service: Arc<dyn CalendarService>,
        store: Arc<dyn KeyValueStore>,
        config: &SessionConfig,
    ) -> Self {
        let lifecycle = Arc::new(TokenLifecycle::new(provider, store, config.token_validity));
        let sync = EventSynchronizer::new(
            lifecycle.clone(),
            service,
            config.calendar_id.clone(),
            config.debounce,
        );

        Self {
            lifecycle,
            sync,
            week_start: config.week_start,
            view: Mutex::new(ViewState {
                granularity: config.default_view,
                anchor: Local::now(),
            }),
        }
    }

    /// Restores the persisted session and loads the current view if signed
    /// in.
    pub async fn start(&self) -> SessionResult<SignInState> {
        let state = self.lifecycle.initialize().await;
        if state == SignInState::SignedIn {
            self.sync.fetch_range(self.current_range()).await?;
        }
        Ok(state)
    }

    /// Signs in, then loads the current view.
    pub async fn on_auth_click(&self) -> SessionResult<FetchOutcome> {
        self.lifecycle.request_sign_in().await?;
        self.sync.fetch_range(self.current_range()).await
    }

    /// Signs out and forgets every loaded event.
    pub async fn on_sign_out_click(&self) -> SessionResult<()> {
        self.sync.cancel_pending();
        let result = self.lifecycle.sign_out().await;
        self.sync.clear().await;
        result
    }

    /// Switches the view and schedules a fetch of its range.
    pub fn on_range_or_view_change(
        &self,
        granularity: Granularity,
        anchor: DateTime<Local>,
    ) -> ViewRange {
        *self.view.lock().unwrap_or_else(PoisonError::into_inner) = ViewState {
            granularity,
            anchor,
        };

        let range = resolve_range(granularity, &anchor, self.week_start);
        debug!(%granularity, start = %range.start, end = %range.end, "view changed");

        if self.lifecycle.is_signed_in() {
            self.sync.fetch_range_debounced(range);
        }
        range
    }

    /// Creates an event for the selected slot.
    pub async fn on_select_slot(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        title: &str,
    ) -> SessionResult<CalendarEvent> {
        let event = self.sync.create_event(start, end, title).await?;
        info!(title = %event.title, "slot booked");
        Ok(event)
    }

    /// Fetches the current view immediately.
    pub async fn refresh(&self) -> SessionResult<FetchOutcome> {
        self.sync.fetch_range(self.current_range()).await
    }

    /// Cancels any pending debounced fetch.
    pub fn shutdown(&self) {
        if self.sync.cancel_pending() {
            debug!("cancelled pending fetch on shutdown");
        }
    }

    pub fn view(&self) -> ViewState {
        *self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the range of the current view.
    pub fn current_range(&self) -> ViewRange {
        let view = self.view();
        resolve_range(view.granularity, &view.anchor, self.week_start)
    }

    pub async fn events(&self) -> Vec<CalendarEvent> {
        self.sync.events().await
    }

    pub fn is_signed_in(&self) -> bool {
        self.lifecycle.is_signed_in()
    }

    pub fn token_ready(&self) -> bool {
        self.lifecycle.token_ready()
    }

    pub fn status(&self) -> SessionStatus {
        self.lifecycle.status()
    }

    pub fn subscribe(&self) -> SessionWatch {
        self.lifecycle.subscribe()
    }

    pub fn lifecycle(&self) -> &Arc<TokenLifecycle> {
        &self.lifecycle
    }

    pub fn synchronizer(&self) -> &EventSynchronizer {
        &self.sync
    }
}

impl Drop for CalendarSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
