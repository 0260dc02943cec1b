//! Session error types.

use calsync_providers::ProviderError;
use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors that can occur in a calendar session.
///
/// None of them is fatal: retrying the action that triggered one is always
/// valid.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The authorization handshake failed or was declined.
    #[error("Sign-in failed: {0}")]
    Handshake(#[source] ProviderError),

    /// The call waited for a handshake that was already outstanding, and
    /// that handshake did not sign in.
    #[error("The sign-in already in progress did not complete")]
    HandshakeInProgress,

    /// A sign-out happened while the handshake was running; its token was
    /// discarded.
    #[error("Signed out before the sign-in completed")]
    SignedOutDuringHandshake,

    /// Listing events for a range failed.
    #[error("Failed to fetch events: {0}")]
    Fetch(#[source] ProviderError),

    /// Inserting an event failed.
    #[error("Failed to create event: {0}")]
    Create(#[source] ProviderError),

    /// The operation needs a signed-in session.
    #[error("Not signed in")]
    NotSignedIn,

    /// The persisted token could not be written or cleared.
    #[error("Token storage error: {0}")]
    Store(#[from] ProviderError),
}

impl SessionError {
    /// Returns the underlying provider error, if any.
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            Self::Handshake(e) | Self::Fetch(e) | Self::Create(e) | Self::Store(e) => Some(e),
            Self::HandshakeInProgress | Self::SignedOutDuringHandshake | Self::NotSignedIn => {
                None
            }
        }
    }
}
