//! Persisted sign-in token.
//!
//! The token, its expiry and the consent flag are one JSON record under a
//! single store key, so they are always read and written together.

use std::fmt;
use std::sync::Arc;

use calsync_providers::{KeyValueStore, ProviderError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::SessionResult;

/// Store key of the token record.
pub const TOKEN_KEY: &str = "auth_token";

/// A delegated access token and what is known about it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    /// Opaque bearer token.
    pub access_token: String,
    /// When the token stops being trusted.
    pub expires_at: DateTime<Utc>,
    /// The user went through the consent screen at least once.
    pub consent_granted: bool,
}

impl AuthToken {
    /// Creates a token obtained through consent.
    pub fn new(access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at,
            consent_granted: true,
        }
    }

    /// Returns true if the token is expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("consent_granted", &self.consent_granted)
            .finish()
    }
}

/// Typed access to the persisted [`AuthToken`].
#[derive(Clone)]
pub struct TokenStore {
    store: Arc<dyn KeyValueStore>,
}

impl TokenStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Loads the persisted token.
    ///
    /// A record that cannot be parsed is logged and reported as absent.
    pub fn load(&self) -> SessionResult<Option<AuthToken>> {
        let Some(raw) = self.store.get(TOKEN_KEY)? else {
            debug!("no persisted token");
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                warn!(error = %e, "ignoring malformed persisted token");
                Ok(None)
            }
        }
    }

    /// Replaces the persisted token.
    pub fn save(&self, token: &AuthToken) -> SessionResult<()> {
        let raw = serde_json::to_string(token)
            .map_err(|e| ProviderError::internal("failed to serialize token").with_source(e))?;
        self.store.set(TOKEN_KEY, &raw)?;
        debug!(expires_at = %token.expires_at, "persisted token");
        Ok(())
    }

    /// Removes the persisted token, consent flag included.
    pub fn clear(&self) -> SessionResult<()> {
        self.store.remove(TOKEN_KEY)?;
        debug!("cleared persisted token");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calsync_providers::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn store() -> (Arc<MemoryStore>, TokenStore) {
        let memory = Arc::new(MemoryStore::new());
        (memory.clone(), TokenStore::new(memory))
    }

    #[test]
    fn save_and_load() {
        let (memory, tokens) = store();
        let token = AuthToken::new(
            "ya29.token",
            Utc.with_ymd_and_hms(2024, 3, 15, 11, 0, 0).unwrap(),
        );

        tokens.save(&token).unwrap();
        assert_eq!(tokens.load().unwrap(), Some(token));
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn clear_removes_record() {
        let (memory, tokens) = store();
        tokens
            .save(&AuthToken::new("ya29.token", Utc::now()))
            .unwrap();
        tokens.clear().unwrap();
        assert_eq!(tokens.load().unwrap(), None);
        assert!(memory.is_empty());
    }

    #[test]
    fn malformed_record_is_absent() {
        let (memory, tokens) = store();
        memory.set(TOKEN_KEY, "{\"access_token\": 42}").unwrap();
        assert_eq!(tokens.load().unwrap(), None);
    }

    #[test]
    fn expiry_check() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        let token = AuthToken::new("t", now + Duration::minutes(5));
        assert!(!token.is_expired_at(now));
        assert!(token.is_expired_at(now + Duration::minutes(5)));
    }

    #[test]
    fn debug_is_redacted() {
        let token = AuthToken::new("ya29.secret", Utc::now());
        let debug = format!("{:?}", token);
        assert!(!debug.contains("ya29.secret"));
        assert!(debug.contains("consent_granted: true"));
    }
}
