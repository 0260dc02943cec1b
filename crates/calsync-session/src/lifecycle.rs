//! Sign-in lifecycle.
//!
//! [`TokenLifecycle`] owns the sign-in state machine:
//!
//! ```text
//!              initialize
//!  SignedOut ──────────────► Restoring ──► SignedIn | SignedOut
//!      ▲                                       │
//!      │ sign_out          request_sign_in     │
//!      └───────────────────────────────────────┘
//! ```
//!
//! Every change is published as a [`SessionStatus`] on a watch channel.
//! At most one handshake with the authorization provider is outstanding at
//! any time; a caller arriving while one is pending waits for it and shares
//! its outcome. A sign-out invalidates every handshake still in flight.

use std::fmt;
use std::sync::{Arc, PoisonError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use calsync_providers::{AccessGrant, AuthorizationProvider, KeyValueStore, PromptMode};
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::error::{SessionError, SessionResult};
use crate::token_store::{AuthToken, TokenStore};

/// Sign-in state of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SignInState {
    #[default]
    SignedOut,
    /// A persisted token is being checked or silently renewed.
    Restoring,
    SignedIn,
}

impl SignInState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SignedOut => "signed out",
            Self::Restoring => "restoring",
            Self::SignedIn => "signed in",
        }
    }
}

impl fmt::Display for SignInState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the session's sign-in status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: SignInState,
    /// Startup restoration has finished, whatever its outcome.
    pub token_ready: bool,
    /// The current token, present only while signed in.
    pub token: Option<AuthToken>,
}

/// Receiver side of the status channel.
pub type SessionWatch = watch::Receiver<SessionStatus>;

/// Drives sign-in, silent restoration and sign-out.
pub struct TokenLifecycle {
    provider: Arc<dyn AuthorizationProvider>,
    tokens: TokenStore,
    token_validity: Duration,
    status_tx: watch::Sender<SessionStatus>,
    handshake: Mutex<()>,
    /// Bumped by every sign-out. A handshake only commits its token if the
    /// value is unchanged since it started.
    sign_outs: std::sync::Mutex<u64>,
    initialized: AtomicBool,
}

impl TokenLifecycle {
    /// Creates a signed-out lifecycle persisting its token in `store`.
    pub fn new(
        provider: Arc<dyn AuthorizationProvider>,
        store: Arc<dyn KeyValueStore>,
        token_validity: Duration,
    ) -> Self {
        let (status_tx, _) = watch::channel(SessionStatus::default());
        Self {
            provider,
            tokens: TokenStore::new(store),
            token_validity,
            status_tx,
            handshake: Mutex::new(()),
            sign_outs: std::sync::Mutex::new(0),
            initialized: AtomicBool::new(false),
        }
    }

    /// Restores the persisted session.
    ///
    /// An unexpired token is trusted as is. An expired one is renewed
    /// silently if the user consented before. Only the first call does
    /// anything; later calls return the current state.
    pub async fn initialize(&self) -> SignInState {
        if self.initialized.swap(true, Ordering::SeqCst) {
            debug!("lifecycle already initialized");
            return self.state();
        }

        self.status_tx.send_modify(|s| s.state = SignInState::Restoring);

        let persisted = self.tokens.load().unwrap_or_else(|e| {
            warn!(error = %e, "failed to read persisted token");
            None
        });

        let restored = match persisted {
            Some(token) if !token.is_expired() => {
                debug!(expires_at = %token.expires_at, "persisted token still valid");
                Some(token)
            }
            Some(token) if token.consent_granted => {
                debug!("persisted token expired, renewing silently");
                match self.handshake(PromptMode::Silent).await {
                    Ok(token) => Some(token),
                    Err(e) => {
                        warn!(error = %e, "silent restore failed");
                        None
                    }
                }
            }
            Some(_) => {
                debug!("persisted token expired without consent");
                None
            }
            None => None,
        };

        self.status_tx.send_modify(|s| {
            // a sign-in that completed meanwhile wins
            if s.state == SignInState::Restoring {
                s.state = if restored.is_some() {
                    SignInState::SignedIn
                } else {
                    SignInState::SignedOut
                };
                s.token = restored;
            }
            s.token_ready = true;
        });

        let state = self.state();
        info!(%state, "session restored");
        state
    }

    /// Signs in, with the consent screen if no token is held and silently
    /// otherwise.
    ///
    /// On failure the state is left unchanged.
    pub async fn request_sign_in(&self) -> SessionResult<SignInState> {
        let prompt = if self.status_tx.borrow().token.is_some() {
            PromptMode::Silent
        } else {
            PromptMode::Consent
        };

        self.handshake(prompt).await?;
        info!("signed in");
        Ok(SignInState::SignedIn)
    }

    /// Signs out.
    ///
    /// Revocation is best effort. The state always ends up signed out, even
    /// when the persisted token cannot be cleared, and a handshake still in
    /// flight is discarded when it completes.
    pub async fn sign_out(&self) -> SessionResult<()> {
        *self.sign_outs.lock().unwrap_or_else(PoisonError::into_inner) += 1;

        let token = self.status_tx.borrow().token.clone();
        if let Some(token) = token
            && let Err(e) = self.provider.revoke(&token.access_token).await
        {
            warn!(error = %e, "token revocation failed");
        }

        let cleared = {
            let _sign_outs = self.sign_outs.lock().unwrap_or_else(PoisonError::into_inner);
            let cleared = self.tokens.clear();
            self.status_tx.send_modify(|s| {
                s.state = SignInState::SignedOut;
                s.token = None;
                s.token_ready = true;
            });
            cleared
        };
        info!("signed out");

        cleared
    }

    async fn handshake(&self, prompt: PromptMode) -> SessionResult<AuthToken> {
        let _guard = match self.handshake.try_lock() {
            Ok(guard) => guard,
            Err(_) => return self.join_pending().await,
        };
        let started = *self.sign_outs.lock().unwrap_or_else(PoisonError::into_inner);

        debug!(provider = self.provider.name(), %prompt, "starting handshake");

        let grant = self
            .provider
            .request_token(prompt)
            .await
            .map_err(SessionError::Handshake)?;

        let token = AuthToken::new(
            grant.access_token.clone(),
            self.expiry_for(&grant, Utc::now()),
        );
        self.commit(started, token)
    }

    /// Waits for the pending handshake and adopts what it established.
    async fn join_pending(&self) -> SessionResult<AuthToken> {
        debug!("handshake pending, waiting for it");
        let _guard = self.handshake.lock().await;

        let status = self.status_tx.borrow();
        match (status.state, status.token.as_ref()) {
            (SignInState::SignedIn, Some(token)) => Ok(token.clone()),
            _ => Err(SessionError::HandshakeInProgress),
        }
    }

    /// Persists and publishes a fresh token unless a sign-out happened since
    /// the handshake started.
    fn commit(&self, started: u64, token: AuthToken) -> SessionResult<AuthToken> {
        let sign_outs = self.sign_outs.lock().unwrap_or_else(PoisonError::into_inner);
        if *sign_outs != started {
            info!("signed out during handshake, discarding token");
            return Err(SessionError::SignedOutDuringHandshake);
        }

        self.tokens.save(&token)?;
        self.status_tx.send_modify(|s| {
            s.state = SignInState::SignedIn;
            s.token = Some(token.clone());
            s.token_ready = true;
        });
        Ok(token)
    }

    /// Expiry of a fresh grant, never later than the provider reports.
    fn expiry_for(&self, grant: &AccessGrant, now: DateTime<Utc>) -> DateTime<Utc> {
        let configured = TimeDelta::from_std(self.token_validity).unwrap_or(TimeDelta::hours(1));
        let validity = match grant.expires_in {
            Some(secs) => configured.min(TimeDelta::seconds(secs)),
            None => configured,
        };
        now + validity
    }

    /// Returns the current status.
    pub fn status(&self) -> SessionStatus {
        self.status_tx.borrow().clone()
    }

    pub fn state(&self) -> SignInState {
        self.status_tx.borrow().state
    }

    pub fn is_signed_in(&self) -> bool {
        self.state() == SignInState::SignedIn
    }

    pub fn token_ready(&self) -> bool {
        self.status_tx.borrow().token_ready
    }

    /// Returns the bearer token while signed in.
    pub fn access_token(&self) -> Option<String> {
        let status = self.status_tx.borrow();
        match status.state {
            SignInState::SignedIn => status.token.as_ref().map(|t| t.access_token.clone()),
            _ => None,
        }
    }

    /// Subscribes to status changes.
    pub fn subscribe(&self) -> SessionWatch {
        self.status_tx.subscribe()
    }

    /// Waits until startup restoration has finished.
    pub async fn wait_until_ready(&self) -> SessionStatus {
        let mut rx = self.subscribe();
        match rx.wait_for(|s| s.token_ready).await {
            Ok(status) => status.clone(),
            Err(_) => self.status(),
        }
    }
}
