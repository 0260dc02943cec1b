//! Google implementations of the provider traits.
//!
//! - [`GoogleAuthorizer`] issues access tokens through OAuth 2.0 with PKCE
//!   and a loopback redirect, and refreshes them silently afterwards.
//! - [`GoogleCalendarClient`] lists and inserts events through the Calendar
//!   API v3, attaching Google Meet conferences to created events.
//!
//! Users register their own OAuth client in the Google Cloud Console and
//! pass its id and secret through [`OAuthCredentials`].

mod client;
mod config;
mod oauth;

pub use client::GoogleCalendarClient;
pub use config::{GoogleConfig, OAuthCredentials};
pub use oauth::{GoogleAuthorizer, PkceFlow, REFRESH_TOKEN_KEY};
