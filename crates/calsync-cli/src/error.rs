//! Client error types.

use std::fmt;

use calsync_providers::ProviderError;
use calsync_session::SessionError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug)]
pub enum ClientError {
    /// Configuration error.
    Config(String),
    /// Provider setup error.
    Provider(String),
    /// Session operation failed.
    Session(SessionError),
    /// The user needs to sign in first.
    AuthRequired(String),
    /// Invalid command-line input.
    Input(String),
    /// IO error.
    Io(std::io::Error),
}

impl ClientError {
    /// Whether the failure came from a transient provider condition
    /// (network, rate limit, 5xx) and the same command may succeed later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Session(err) => err.provider_error().is_some_and(ProviderError::is_retryable),
            _ => false,
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Provider(msg) => write!(f, "provider error: {}", msg),
            Self::Session(err) => write!(f, "{}", err),
            Self::AuthRequired(msg) => write!(f, "authentication required: {}", msg),
            Self::Input(msg) => write!(f, "invalid input: {}", msg),
            Self::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Session(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<ProviderError> for ClientError {
    fn from(err: ProviderError) -> Self {
        Self::Provider(err.to_string())
    }
}

impl From<SessionError> for ClientError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotSignedIn => {
                Self::AuthRequired("run `calsync auth` to sign in".to_string())
            }
            other => Self::Session(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_signed_in_maps_to_auth_required() {
        let err = ClientError::from(SessionError::NotSignedIn);
        assert!(matches!(err, ClientError::AuthRequired(_)));
        assert!(err.to_string().contains("calsync auth"));
    }

    #[test]
    fn session_errors_keep_source() {
        use std::error::Error;
        let err = ClientError::from(SessionError::Fetch(ProviderError::server("boom")));
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "Failed to fetch events: server_error: boom");
    }

    #[test]
    fn only_transient_provider_failures_are_retryable() {
        let err = ClientError::from(SessionError::Fetch(ProviderError::server("boom")));
        assert!(err.is_retryable());

        let err = ClientError::from(SessionError::Fetch(ProviderError::rate_limited(
            "rate limit exceeded, retry after 30 seconds",
        )));
        assert!(err.is_retryable());

        let err = ClientError::from(SessionError::Handshake(ProviderError::authentication(
            "consent denied",
        )));
        assert!(!err.is_retryable());

        assert!(!ClientError::from(SessionError::NotSignedIn).is_retryable());
        assert!(!ClientError::Config("bad".to_string()).is_retryable());
    }
}
