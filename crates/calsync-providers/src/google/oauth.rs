//! Google OAuth 2.0 authorization.
//!
//! [`GoogleAuthorizer`] implements [`AuthorizationProvider`] for Google:
//!
//! - **Consent**: Authorization Code flow with PKCE and a loopback redirect.
//!   The user's browser is opened on Google's consent page, the code is
//!   caught on `127.0.0.1` and exchanged for an access token and a refresh
//!   token.
//! - **Silent**: the stored refresh token is exchanged for a new access
//!   token with no user interaction. Without a refresh token the silent
//!   request fails.
//! - **Revoke**: the token is revoked at Google's endpoint and the stored
//!   refresh token is forgotten.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{AccessGrant, AuthorizationProvider, BoxFuture, PromptMode};
use crate::store::KeyValueStore;

use super::config::{GoogleConfig, OAuthCredentials};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_REVOKE_URL: &str = "https://oauth2.googleapis.com/revoke";

/// Store key holding the refresh token used for silent requests.
pub const REFRESH_TOKEN_KEY: &str = "google_refresh_token";

/// The PKCE code verifier length (in bytes, before base64 encoding).
const CODE_VERIFIER_LENGTH: usize = 32;

/// How long to wait for the browser to hit the loopback redirect.
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

/// Issues Google access tokens.
pub struct GoogleAuthorizer {
    credentials: OAuthCredentials,
    scopes: Vec<String>,
    port_range: (u16, u16),
    http_client: reqwest::Client,
    store: Arc<dyn KeyValueStore>,
}

impl GoogleAuthorizer {
    /// Creates an authorizer keeping its refresh token in `store`.
    pub fn new(config: &GoogleConfig, store: Arc<dyn KeyValueStore>) -> ProviderResult<Self> {
        config.validate().map_err(ProviderError::configuration)?;

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                ProviderError::configuration("failed to create HTTP client").with_source(e)
            })?;

        Ok(Self {
            credentials: config.credentials.clone(),
            scopes: config.scopes.clone(),
            port_range: config.loopback_port_range,
            http_client,
            store,
        })
    }

    /// Returns true if a refresh token is available for silent requests.
    pub fn has_refresh_token(&self) -> bool {
        matches!(self.store.get(REFRESH_TOKEN_KEY), Ok(Some(_)))
    }

    /// Runs the browser consent flow.
    async fn authorize(&self) -> ProviderResult<AccessGrant> {
        let pkce = PkceFlow::new();

        let (listener, port) = bind_loopback_server(self.port_range)?;
        let redirect_uri = format!("http://127.0.0.1:{}/callback", port);
        let auth_url = pkce.build_auth_url(&self.credentials.client_id, &redirect_uri, &self.scopes);

        info!("starting OAuth consent flow, opening browser");
        debug!("authorization URL: {}", auth_url);

        if let Err(e) = open::that(&auth_url) {
            warn!("failed to open browser: {}", e);
            eprintln!("\nPlease open this URL in your browser:\n\n{}\n", auth_url);
        }

        let (code, received_state) = tokio::task::spawn_blocking(move || wait_for_callback(listener))
            .await
            .map_err(|e| ProviderError::internal("callback listener panicked").with_source(e))??;

        if received_state != pkce.state {
            return Err(ProviderError::authentication(
                "OAuth state mismatch - possible CSRF attack",
            ));
        }

        info!("received authorization code, exchanging for tokens");

        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("code", code.as_str()),
            ("code_verifier", pkce.verifier.as_str()),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri.as_str()),
        ];
        let response = self.token_request(&params, "token exchange").await?;

        match response.refresh_token {
            Some(ref refresh_token) => self.store.set(REFRESH_TOKEN_KEY, refresh_token)?,
            None => warn!("consent flow returned no refresh token, silent refresh unavailable"),
        }

        Ok(response.into_grant())
    }

    /// Exchanges the stored refresh token for a new access token.
    async fn refresh(&self) -> ProviderResult<AccessGrant> {
        let refresh_token = self.store.get(REFRESH_TOKEN_KEY)?.ok_or_else(|| {
            ProviderError::authentication("no refresh token, interactive consent required")
        })?;

        debug!("refreshing access token silently");

        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];
        let response = self.token_request(&params, "token refresh").await?;

        // Google may rotate the refresh token
        if let Some(ref rotated) = response.refresh_token {
            self.store.set(REFRESH_TOKEN_KEY, rotated)?;
        }

        info!("successfully refreshed access token");
        Ok(response.into_grant())
    }

    async fn revoke_token(&self, access_token: &str) -> ProviderResult<()> {
        let result = self
            .http_client
            .post(GOOGLE_REVOKE_URL)
            .form(&[("token", access_token)])
            .send()
            .await;

        // Revoking the access token ends the whole grant, so the refresh
        // token is useless whatever the outcome.
        if let Err(e) = self.store.remove(REFRESH_TOKEN_KEY) {
            warn!("failed to forget refresh token: {}", e);
        }

        let response = result
            .map_err(|e| ProviderError::network("revocation request failed").with_source(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::authentication(format!(
                "token revocation failed ({}): {}",
                status, body
            )));
        }

        info!("access token revoked");
        Ok(())
    }

    async fn token_request(
        &self,
        params: &[(&str, &str)],
        what: &str,
    ) -> ProviderResult<TokenResponse> {
        let response = self
            .http_client
            .post(GOOGLE_TOKEN_URL)
            .form(params)
            .send()
            .await
            .map_err(|e| ProviderError::network(format!("{} request failed", what)).with_source(e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::network("failed to read response").with_source(e))?;

        if !status.is_success() {
            return Err(ProviderError::authentication(format!(
                "{} failed ({}): {}",
                what, status, body
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("invalid {} response", what)).with_source(e)
        })
    }
}

impl AuthorizationProvider for GoogleAuthorizer {
    fn name(&self) -> &str {
        "google"
    }

    fn request_token(&self, prompt: PromptMode) -> BoxFuture<'_, ProviderResult<AccessGrant>> {
        Box::pin(async move {
            let result = match prompt {
                PromptMode::Consent => self.authorize().await,
                PromptMode::Silent => self.refresh().await,
            };
            result.map_err(|e| e.with_provider("google"))
        })
    }

    fn revoke<'a>(&'a self, access_token: &'a str) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move {
            self.revoke_token(access_token)
                .await
                .map_err(|e| e.with_provider("google"))
        })
    }
}

/// Tries to bind a TCP listener on an available port in the given range.
fn bind_loopback_server(port_range: (u16, u16)) -> ProviderResult<(TcpListener, u16)> {
    for port in port_range.0..=port_range.1 {
        if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)) {
            debug!("bound loopback server on port {}", port);
            return Ok((listener, port));
        }
    }
    Err(ProviderError::configuration(format!(
        "no available port in range {}-{}",
        port_range.0, port_range.1
    )))
}

/// Blocks until the redirect arrives and returns `(code, state)`.
fn wait_for_callback(listener: TcpListener) -> ProviderResult<(String, String)> {
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    if let Some(result) = handle_callback(stream) {
                        let _ = tx.send(result);
                        return;
                    }
                }
                Err(e) => error!("failed to accept connection: {}", e),
            }
        }
    });

    match rx.recv_timeout(CALLBACK_TIMEOUT) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            Err(ProviderError::authentication("OAuth callback timeout"))
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Err(ProviderError::internal("callback channel disconnected"))
        }
    }
}

/// Answers the browser and extracts the callback outcome.
fn handle_callback(mut stream: TcpStream) -> Option<ProviderResult<(String, String)>> {
    let mut request_line = String::new();
    BufReader::new(&stream).read_line(&mut request_line).ok()?;

    let result = parse_callback_request(&request_line)?;

    let response = if result.is_ok() {
        "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n\
        <html><body><h1>Authorization Successful</h1>\
        <p>You can close this window.</p></body></html>"
    } else {
        "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html\r\n\r\n\
        <html><body><h1>Authorization Failed</h1>\
        <p>You can close this window.</p></body></html>"
    };
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();

    Some(result)
}

/// Parses `GET /callback?code=...&state=... HTTP/1.1`.
///
/// Returns `None` for requests that are not the OAuth callback (favicon
/// requests and the like).
fn parse_callback_request(request_line: &str) -> Option<ProviderResult<(String, String)>> {
    let mut parts = request_line.split_whitespace();
    if parts.next()? != "GET" {
        return None;
    }
    let path = parts.next()?;
    let query = path.strip_prefix("/callback")?;
    let query = query.strip_prefix('?').unwrap_or_default();

    let mut code = None;
    let mut state = None;
    let mut denied = None;

    for param in query.split('&') {
        if let Some((key, value)) = param.split_once('=') {
            let value = urlencoding::decode(value).unwrap_or_default().into_owned();
            match key {
                "code" => code = Some(value),
                "state" => state = Some(value),
                "error" => denied = Some(value),
                _ => {}
            }
        }
    }

    if let Some(reason) = denied {
        return Some(Err(ProviderError::authentication(format!(
            "authorization denied: {}",
            reason
        ))));
    }

    Some(match code {
        Some(code) => Ok((code, state.unwrap_or_default())),
        None => Err(ProviderError::authentication(
            "missing authorization code in callback",
        )),
    })
}

/// PKCE flow state (RFC 7636).
#[derive(Debug)]
pub struct PkceFlow {
    /// High-entropy random code verifier.
    pub verifier: String,
    /// SHA-256 of the verifier, base64url encoded.
    pub challenge: String,
    /// Random state for CSRF protection.
    pub state: String,
}

impl PkceFlow {
    pub fn new() -> Self {
        let verifier = random_urlsafe(CODE_VERIFIER_LENGTH);
        let challenge = Self::compute_challenge(&verifier);
        Self {
            verifier,
            challenge,
            state: random_urlsafe(16),
        }
    }

    fn compute_challenge(verifier: &str) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
    }

    /// Builds the Google consent URL for this flow.
    pub fn build_auth_url(&self, client_id: &str, redirect_uri: &str, scopes: &[String]) -> String {
        let scope = scopes.join(" ");
        let params = [
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("code_challenge", self.challenge.as_str()),
            ("code_challenge_method", "S256"),
            ("state", self.state.as_str()),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ];
        match url::Url::parse_with_params(GOOGLE_AUTH_URL, &params) {
            Ok(url) => url.into(),
            Err(_) => GOOGLE_AUTH_URL.to_string(),
        }
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

fn random_urlsafe(len: usize) -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}

/// Response from Google's token endpoint.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_grant(self) -> AccessGrant {
        AccessGrant {
            access_token: self.access_token,
            expires_in: self.expires_in,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::{GoogleConfig, OAuthCredentials, ProviderErrorCode};

    fn authorizer(store: Arc<MemoryStore>) -> GoogleAuthorizer {
        let config = GoogleConfig::new(OAuthCredentials::new(
            "test.apps.googleusercontent.com",
            "secret",
        ));
        GoogleAuthorizer::new(&config, store).unwrap()
    }

    #[test]
    fn pkce_verifier_length() {
        // 32 bytes base64url encoded without padding
        assert_eq!(PkceFlow::new().verifier.len(), 43);
    }

    #[test]
    fn pkce_challenge_is_deterministic() {
        assert_eq!(
            PkceFlow::compute_challenge("test-verifier"),
            PkceFlow::compute_challenge("test-verifier")
        );
    }

    #[test]
    fn pkce_flows_are_random() {
        let a = PkceFlow::new();
        let b = PkceFlow::new();
        assert_ne!(a.challenge, b.challenge);
        assert_ne!(a.state, b.state);
    }

    #[test]
    fn auth_url_requests_offline_consent() {
        let flow = PkceFlow::new();
        let url = flow.build_auth_url(
            "test.apps.googleusercontent.com",
            "http://127.0.0.1:8080/callback",
            &[GoogleConfig::DEFAULT_SCOPE.to_string()],
        );

        assert!(url.starts_with(GOOGLE_AUTH_URL));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
        assert!(url.contains(&format!("state={}", flow.state)));
        assert!(url.contains("redirect_uri=http%3A%2F%2F127.0.0.1%3A8080%2Fcallback"));
    }

    #[test]
    fn callback_with_code_and_state() {
        let result = parse_callback_request("GET /callback?code=4%2Fabc&state=xyz HTTP/1.1\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(result, ("4/abc".to_string(), "xyz".to_string()));
    }

    #[test]
    fn callback_with_denied_consent() {
        let err = parse_callback_request("GET /callback?error=access_denied HTTP/1.1")
            .unwrap()
            .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
        assert!(err.message().contains("access_denied"));
    }

    #[test]
    fn callback_without_code() {
        let result = parse_callback_request("GET /callback?state=xyz HTTP/1.1").unwrap();
        assert!(result.is_err());
    }

    #[test]
    fn unrelated_requests_are_ignored() {
        assert!(parse_callback_request("GET /favicon.ico HTTP/1.1").is_none());
        assert!(parse_callback_request("POST /callback?code=a HTTP/1.1").is_none());
        assert!(parse_callback_request("").is_none());
    }

    #[tokio::test]
    async fn silent_request_without_refresh_token_fails() {
        let store = Arc::new(MemoryStore::new());
        let authorizer = authorizer(store);

        assert!(!authorizer.has_refresh_token());
        let err = authorizer
            .request_token(PromptMode::Silent)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
        assert_eq!(err.provider(), Some("google"));
    }

    #[test]
    fn has_refresh_token_reads_store() {
        let store = Arc::new(MemoryStore::new());
        store.set(REFRESH_TOKEN_KEY, "1//refresh").unwrap();
        assert!(authorizer(store).has_refresh_token());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = GoogleConfig::new(OAuthCredentials::new("bad", "secret"));
        let result = GoogleAuthorizer::new(&config, Arc::new(MemoryStore::new()));
        assert!(result.is_err());
    }
}
