//! Command implementations.

pub mod auth;
pub mod config;
pub mod events;

use std::sync::Arc;

use calsync_providers::{FileStore, GoogleAuthorizer, GoogleCalendarClient, GoogleConfig};
use calsync_session::CalendarSession;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Resolves the Google provider configuration from `config.toml`.
pub(crate) fn google_config(config: &ClientConfig) -> ClientResult<GoogleConfig> {
    let google = config.google.as_ref().ok_or_else(|| {
        ClientError::Config(format!(
            "no [google] section in {}; run `calsync auth --credentials-file <path>` first",
            ClientConfig::default_path().display()
        ))
    })?;
    google.to_provider_config().map_err(ClientError::Config)
}

/// Wires a calendar session backed by Google and the on-disk store.
pub(crate) fn build_session(
    config: &ClientConfig,
    google: &GoogleConfig,
) -> ClientResult<CalendarSession> {
    let session_config = config.session_config().map_err(ClientError::Config)?;
    let store_path = config.storage.store_path();
    debug!(path = %store_path.display(), "opening store");

    let store = Arc::new(FileStore::open(store_path)?);
    let authorizer = Arc::new(GoogleAuthorizer::new(google, store.clone())?);
    let calendar = Arc::new(GoogleCalendarClient::new(google)?);

    Ok(CalendarSession::new(
        authorizer,
        calendar,
        store,
        &session_config,
    ))
}

/// Builds a session from `config.toml` alone.
pub(crate) fn session_from_config(config: &ClientConfig) -> ClientResult<CalendarSession> {
    let google = google_config(config)?;
    build_session(config, &google)
}
