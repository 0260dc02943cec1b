//! Sign-in, sign-out and status commands.

use std::path::{Path, PathBuf};

use calsync_providers::OAuthCredentials;
use calsync_session::SignInState;
use chrono::Local;
use tracing::{info, warn};

use crate::config::{ClientConfig, GoogleSettings};
use crate::error::{ClientError, ClientResult};

/// Where the credentials were resolved from.
#[derive(Debug, PartialEq)]
enum CredentialSource {
    /// From CLI flags (--client-id/--client-secret or --credentials-file)
    Cli,
    /// From config.toml (already persisted)
    Config,
}

/// Signs in to Google Calendar.
///
/// Resolves credentials from CLI flags, a `--credentials-file`, or
/// `config.toml`, then asks the session to sign in. A stored session is
/// renewed silently; otherwise the browser consent flow runs.
///
/// Credentials given on the command line are persisted to `config_path`.
pub async fn sign_in(
    client_id: Option<String>,
    client_secret: Option<String>,
    credentials_file: Option<PathBuf>,
    config: &ClientConfig,
    config_path: &Path,
) -> ClientResult<()> {
    let (credentials, source) = resolve_google_credentials(
        client_id,
        client_secret,
        credentials_file,
        config.google.as_ref(),
    )?;
    credentials
        .validate()
        .map_err(|e| ClientError::Config(format!("invalid Google credentials: {}", e)))?;

    let google = config
        .google
        .clone()
        .unwrap_or_default()
        .provider_config(credentials.clone());
    let session = super::build_session(config, &google)?;

    if session.lifecycle().initialize().await != SignInState::SignedIn {
        println!("Starting Google Calendar sign-in...");
        println!();
        println!("A browser window will open for you to authorize access.");
        println!("If the browser doesn't open, check the terminal for a URL to copy.");
        println!();
    }

    let outcome = session.on_auth_click().await?;
    info!(?outcome, "signed in");

    if source == CredentialSource::Cli {
        match save_credentials_to_config(config_path, &credentials) {
            Ok(()) => println!("Credentials saved to {}", config_path.display()),
            Err(e) => warn!(
                "could not save credentials to {}: {}",
                config_path.display(),
                e
            ),
        }
    }

    println!("Signed in to Google Calendar.");
    println!(
        "{} event(s) in the current {} view.",
        session.events().await.len(),
        session.view().granularity
    );
    Ok(())
}

/// Signs out, revoking and forgetting the stored token.
pub async fn sign_out(config: &ClientConfig) -> ClientResult<()> {
    let session = super::session_from_config(config)?;
    session.lifecycle().initialize().await;
    session.on_sign_out_click().await?;
    println!("Signed out.");
    Ok(())
}

/// Shows whether a usable session is stored.
pub async fn status(config: &ClientConfig) -> ClientResult<()> {
    let session = super::session_from_config(config)?;
    let state = session.lifecycle().initialize().await;

    println!("calendar: {}", config.calendar_id());
    println!("state:    {}", state);
    if let Some(token) = session.status().token {
        println!(
            "expires:  {}",
            token.expires_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

/// Saves credentials to `config_path` under `[google]`, keeping the rest of
/// the file untouched.
fn save_credentials_to_config(config_path: &Path, credentials: &OAuthCredentials) -> ClientResult<()> {
    let content = if config_path.exists() {
        std::fs::read_to_string(config_path)?
    } else {
        String::new()
    };

    let mut doc = content
        .parse::<toml_edit::DocumentMut>()
        .map_err(|e| ClientError::Config(format!("could not parse config.toml: {}", e)))?;

    if !doc.contains_key("google") {
        doc["google"] = toml_edit::Item::Table(toml_edit::Table::new());
    }

    let google = doc["google"]
        .as_table_mut()
        .ok_or_else(|| ClientError::Config("[google] is not a table".to_string()))?;
    google["client_id"] = toml_edit::value(credentials.client_id.as_str());
    google["client_secret"] = toml_edit::value(credentials.client_secret.as_str());

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(config_path, doc.to_string())?;

    info!("credentials saved to {}", config_path.display());
    Ok(())
}

/// Resolves Google credentials from multiple sources.
///
/// Priority (highest to lowest):
/// 1. CLI `--client-id` + `--client-secret`
/// 2. CLI `--credentials-file` (Google Cloud Console JSON)
/// 3. `config.toml` `[google]` section
fn resolve_google_credentials(
    cli_client_id: Option<String>,
    cli_client_secret: Option<String>,
    cli_credentials_file: Option<PathBuf>,
    config_google: Option<&GoogleSettings>,
) -> ClientResult<(OAuthCredentials, CredentialSource)> {
    if let (Some(id), Some(secret)) = (&cli_client_id, &cli_client_secret) {
        return Ok((OAuthCredentials::new(id, secret), CredentialSource::Cli));
    }

    if let Some(ref path) = cli_credentials_file {
        let credentials = OAuthCredentials::from_file(path).map_err(|e| {
            ClientError::Config(format!(
                "failed to load credentials from {}: {}",
                path.display(),
                e
            ))
        })?;
        return Ok((credentials, CredentialSource::Cli));
    }

    if let Some(google) = config_google
        && google.client_id.is_some()
        && google.client_secret.is_some()
    {
        let credentials = google.resolve_credentials().map_err(|e| {
            ClientError::Config(format!(
                "failed to resolve Google credentials from config: {}",
                e
            ))
        })?;
        return Ok((credentials, CredentialSource::Config));
    }

    if cli_client_id.is_some() || cli_client_secret.is_some() {
        return Err(ClientError::Config(
            "both --client-id and --client-secret are required when providing credentials directly"
                .to_string(),
        ));
    }

    Err(ClientError::Config(format!(
        "Google credentials are required. Provide via:\n  \
         - client_id + client_secret in {}\n  \
         - --client-id and --client-secret flags\n  \
         - --credentials-file flag (path to Google Cloud Console JSON)\n  \
         - GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET env vars",
        ClientConfig::default_path().display()
    )))
}
