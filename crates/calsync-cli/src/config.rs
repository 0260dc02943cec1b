//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/calsync/config.toml` by default.
//!
//! Credential values (`client_id`, `client_secret`) support secret references,
//! see [`crate::secret`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use calsync_core::{Granularity, WeekStart};
use calsync_providers::{FileStore, GoogleConfig, OAuthCredentials};
use calsync_session::SessionConfig;
use serde::{Deserialize, Serialize};

/// Configuration for the calsync client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Google Calendar settings.
    pub google: Option<GoogleSettings>,

    /// Session behavior.
    pub session: SessionSettings,

    /// Local storage settings.
    pub storage: StorageSettings,
}

impl ClientConfig {
    /// Loads configuration from the default path, or defaults if it does not
    /// exist.
    pub fn load() -> Result<Self, String> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content =
            std::fs::read_to_string(path).map_err(|e| format!("failed to read config: {}", e))?;
        toml::from_str(&content).map_err(|e| format!("failed to parse config: {}", e))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calsync")
            .join("config.toml")
    }

    /// Returns the calendar the session works on.
    pub fn calendar_id(&self) -> &str {
        self.google
            .as_ref()
            .and_then(|g| g.calendar_id.as_deref())
            .unwrap_or(GoogleConfig::DEFAULT_CALENDAR_ID)
    }

    /// Builds the session configuration.
    pub fn session_config(&self) -> Result<SessionConfig, String> {
        self.session.to_session_config(self.calendar_id())
    }
}

/// Google Calendar provider settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoogleSettings {
    /// OAuth client ID (supports `pass::` and `env::` prefixes).
    pub client_id: Option<String>,

    /// OAuth client secret (supports `pass::` and `env::` prefixes).
    pub client_secret: Option<String>,

    /// Calendar to read from and write to.
    pub calendar_id: Option<String>,

    /// OAuth scopes; the full calendar scope when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
}

impl GoogleSettings {
    /// Builds a provider configuration from these settings and the given
    /// credentials.
    pub fn provider_config(&self, credentials: OAuthCredentials) -> GoogleConfig {
        let mut config = GoogleConfig::new(credentials);
        if let Some(ref id) = self.calendar_id {
            config = config.with_calendar_id(id);
        }
        if !self.scopes.is_empty() {
            config = config.with_scopes(self.scopes.clone());
        }
        config
    }

    /// Resolves credentials and builds a provider configuration.
    pub fn to_provider_config(&self) -> Result<GoogleConfig, String> {
        let credentials = self.resolve_credentials()?;
        let config = self.provider_config(credentials);
        config.validate()?;
        Ok(config)
    }

    /// Resolves Google OAuth credentials from inline fields.
    ///
    /// Both `client_id` and `client_secret` must be set.
    pub(crate) fn resolve_credentials(&self) -> Result<OAuthCredentials, String> {
        let raw_id = self.client_id.as_deref().ok_or_else(|| {
            format!(
                "Google credentials not found. Add to {}:\n  \
                 [google]\n  \
                 client_id = \"YOUR_ID.apps.googleusercontent.com\"\n  \
                 client_secret = \"YOUR_SECRET\"\n\n  \
                 Or run: calsync auth --credentials-file <path>",
                ClientConfig::default_path().display()
            )
        })?;

        let raw_secret = self.client_secret.as_deref().ok_or_else(|| {
            "client_secret is missing from [google] section in config.toml".to_string()
        })?;

        let client_id = crate::secret::resolve(raw_id)
            .map_err(|e| format!("failed to resolve client_id: {}", e))?;
        let client_secret = crate::secret::resolve(raw_secret)
            .map_err(|e| format!("failed to resolve client_secret: {}", e))?;

        Ok(OAuthCredentials::new(client_id, client_secret))
    }
}

/// Session behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Lifetime assumed for a freshly issued access token.
    pub token_validity_secs: u64,

    /// Quiet window before a view change triggers a fetch.
    pub debounce_ms: u64,

    /// First day of the week (`sunday`, `monday`, ...).
    pub week_start: String,

    /// View used when none is given (`month`, `week`, `day`, `agenda`).
    pub default_view: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            token_validity_secs: SessionConfig::DEFAULT_TOKEN_VALIDITY_SECS,
            debounce_ms: SessionConfig::DEFAULT_DEBOUNCE_MS,
            week_start: "sunday".to_string(),
            default_view: Granularity::default().to_string(),
        }
    }
}

impl SessionSettings {
    /// Converts to a session configuration for `calendar_id`.
    pub fn to_session_config(&self, calendar_id: &str) -> Result<SessionConfig, String> {
        if self.token_validity_secs == 0 {
            return Err("session.token_validity_secs must be positive".to_string());
        }
        let week_start: WeekStart = self.week_start.parse()?;

        Ok(SessionConfig::new(calendar_id)
            .with_token_validity(Duration::from_secs(self.token_validity_secs))
            .with_debounce(Duration::from_millis(self.debounce_ms))
            .with_week_start(week_start)
            .with_default_view(Granularity::parse(&self.default_view)))
    }
}

/// Local storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Path of the key/value store file.
    pub path: Option<PathBuf>,
}

impl StorageSettings {
    /// Returns the configured store path or the platform default.
    pub fn store_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(FileStore::default_path)
    }
}
