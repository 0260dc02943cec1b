//! In-memory fakes of the provider traits.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use calsync_providers::{
    AccessGrant, AuthorizationProvider, BoxFuture, CalendarService, EventQuery, NewEvent,
    PromptMode, ProviderError, ProviderResult, RemoteEvent, RemoteEventTime,
};
use tokio::sync::Notify;

/// Authorization provider answering from a queue of canned results.
///
/// With an empty queue every request succeeds with a numbered token.
#[derive(Default)]
pub struct FakeAuthorizer {
    results: Mutex<VecDeque<ProviderResult<AccessGrant>>>,
    prompts: Mutex<Vec<PromptMode>>,
    revoked: Mutex<Vec<String>>,
    fail_revoke: bool,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_revoke(mut self) -> Self {
        self.fail_revoke = true;
        self
    }

    pub fn push_grant(&self, grant: AccessGrant) {
        self.results.lock().unwrap().push_back(Ok(grant));
    }

    pub fn push_error(&self, error: ProviderError) {
        self.results.lock().unwrap().push_back(Err(error));
    }

    /// Makes requests wait until the returned handle is notified.
    pub fn hold_requests(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn prompts(&self) -> Vec<PromptMode> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn revoked(&self) -> Vec<String> {
        self.revoked.lock().unwrap().clone()
    }
}

impl AuthorizationProvider for FakeAuthorizer {
    fn name(&self) -> &str {
        "fake"
    }

    fn request_token(&self, prompt: PromptMode) -> BoxFuture<'_, ProviderResult<AccessGrant>> {
        Box::pin(async move {
            let count = {
                let mut prompts = self.prompts.lock().unwrap();
                prompts.push(prompt);
                prompts.len()
            };

            let gate = self.gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }

            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(AccessGrant::new(format!("token-{}", count))))
        })
    }

    fn revoke<'a>(&'a self, access_token: &'a str) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move {
            self.revoked.lock().unwrap().push(access_token.to_string());
            if self.fail_revoke {
                Err(ProviderError::network("revocation endpoint unreachable"))
            } else {
                Ok(())
            }
        })
    }
}

/// Calendar service serving a fixed event list and recording calls.
#[derive(Default)]
pub struct FakeCalendar {
    events: Mutex<Vec<RemoteEvent>>,
    queries: Mutex<Vec<(String, String, EventQuery)>>,
    inserted: Mutex<Vec<NewEvent>>,
    fail_list: AtomicBool,
    fail_insert: AtomicBool,
    meet_link: Option<String>,
}

impl FakeCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `link` as the conference entry point of inserted events.
    pub fn with_meet_link(mut self, link: impl Into<String>) -> Self {
        self.meet_link = Some(link.into());
        self
    }

    pub fn set_events(&self, events: Vec<RemoteEvent>) {
        *self.events.lock().unwrap() = events;
    }

    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn fail_insert(&self, fail: bool) {
        self.fail_insert.store(fail, Ordering::SeqCst);
    }

    /// Returns `(access_token, calendar_id, query)` of every list call.
    pub fn queries(&self) -> Vec<(String, String, EventQuery)> {
        self.queries.lock().unwrap().clone()
    }

    pub fn inserted(&self) -> Vec<NewEvent> {
        self.inserted.lock().unwrap().clone()
    }
}

impl CalendarService for FakeCalendar {
    fn name(&self) -> &str {
        "fake"
    }

    fn list_events<'a>(
        &'a self,
        access_token: &'a str,
        calendar_id: &'a str,
        query: &'a EventQuery,
    ) -> BoxFuture<'a, ProviderResult<Vec<RemoteEvent>>> {
        Box::pin(async move {
            self.queries.lock().unwrap().push((
                access_token.to_string(),
                calendar_id.to_string(),
                query.clone(),
            ));
            if self.fail_list.load(Ordering::SeqCst) {
                return Err(ProviderError::server("backend unavailable"));
            }
            Ok(self.events.lock().unwrap().clone())
        })
    }

    fn insert_event<'a>(
        &'a self,
        _access_token: &'a str,
        _calendar_id: &'a str,
        event: &'a NewEvent,
    ) -> BoxFuture<'a, ProviderResult<RemoteEvent>> {
        Box::pin(async move {
            if self.fail_insert.load(Ordering::SeqCst) {
                return Err(ProviderError::authorization("calendar is read-only"));
            }
            self.inserted.lock().unwrap().push(event.clone());

            let mut created = RemoteEvent::new(
                format!("created-{}", self.inserted.lock().unwrap().len()),
                RemoteEventTime::DateTime(event.start),
                RemoteEventTime::DateTime(event.end),
            )
            .with_summary(event.summary.clone());
            if let Some(ref link) = self.meet_link {
                created = created.with_conference_link(link.clone());
            }
            Ok(created)
        })
    }
}
