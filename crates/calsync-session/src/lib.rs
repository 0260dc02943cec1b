//! Calendar session: sign-in lifecycle and range synchronization.
//!
//! This crate ties the provider seams together into a session a
//! presentation shell can drive:
//! - [`TokenLifecycle`] restores, obtains and revokes the access token
//! - [`EventSynchronizer`] keeps the visible range's events in memory
//! - [`ScheduledTask`] debounces range fetches
//! - [`CalendarSession`] exposes the whole thing as UI-level actions
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use calsync_providers::{
//!     FileStore, GoogleAuthorizer, GoogleCalendarClient, GoogleConfig, OAuthCredentials,
//! };
//! use calsync_session::{CalendarSession, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let google = GoogleConfig::new(OAuthCredentials::from_file("credentials.json")?);
//!     let store = Arc::new(FileStore::open(FileStore::default_path())?);
//!
//!     let session = CalendarSession::new(
//!         Arc::new(GoogleAuthorizer::new(&google, store.clone())?),
//!         Arc::new(GoogleCalendarClient::new(&google)?),
//!         store,
//!         &SessionConfig::default(),
//!     );
//!
//!     session.start().await?;
//!     for event in session.events().await {
//!         println!("{} {}", event.start, event.title);
//!     }
//!     Ok(())
//! }
//! ```

mod config;
mod debounce;
mod error;
mod lifecycle;
mod session;
mod sync;
mod token_store;

#[cfg(test)]
mod testing;

pub use config::SessionConfig;
pub use debounce::ScheduledTask;
pub use error::{SessionError, SessionResult};
pub use lifecycle::{SessionStatus, SessionWatch, SignInState, TokenLifecycle};
pub use session::{CalendarSession, ViewState};
pub use sync::{EventSynchronizer, FetchOutcome};
pub use token_store::{AuthToken, TOKEN_KEY, TokenStore};
