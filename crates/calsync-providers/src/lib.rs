//! Collaborators of the calendar session.
//!
//! This crate defines the seams the session layer talks through and their
//! Google implementations:
//!
//! - [`AuthorizationProvider`] - issues and revokes access tokens
//! - [`CalendarService`] - lists and inserts remote events
//! - [`KeyValueStore`] - persists small string records locally
//! - [`RemoteEvent`] - provider-agnostic event as returned by a service
//! - [`ProviderError`] - error type shared by all of the above
//!
//! ```text
//! ┌──────────────────┐  ┌──────────────────┐  ┌──────────────┐
//! │ GoogleAuthorizer │  │ GoogleCalendar-  │  │  FileStore   │
//! │                  │  │ Client           │  │ MemoryStore  │
//! └────────┬─────────┘  └────────┬─────────┘  └──────┬───────┘
//!          │ Authorization-      │ CalendarService   │ KeyValueStore
//!          │ Provider            │                   │
//!          └─────────────────────┼───────────────────┘
//!                                ▼
//!                        calsync-session
//! ```

pub mod error;
#[cfg(feature = "google")]
pub mod google;
pub mod provider;
pub mod remote_event;
pub mod store;

// Re-export main types at crate root
pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use provider::{
    AccessGrant, AuthorizationProvider, BoxFuture, CalendarService, EventQuery, OrderBy,
    PromptMode,
};
pub use remote_event::{
    NewEvent, RemoteConferenceData, RemoteEntryPoint, RemoteEvent, RemoteEventTime,
};
pub use store::{FileStore, KeyValueStore, MemoryStore};

#[cfg(feature = "google")]
pub use google::{GoogleAuthorizer, GoogleCalendarClient, GoogleConfig, OAuthCredentials};
