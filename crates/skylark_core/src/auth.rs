//! Sign-in, sign-out and access token lifecycle.
//!
//! The refresh JWT is the long-lived credential and lives in the
//! [`CredentialStore`]. The access JWT is held in memory only and is
//! re-validated against its expiry on every [`AuthenticationService::try_get_fresh_token`].
//!
//! All session mutations (sign-in, refresh, sign-out) are serialised by one
//! async lock and run on a detached task, so a caller that goes away mid-call
//! cannot leave the store and the in-memory session disagreeing.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use skylark_auth::credentials::credential_key;
use skylark_auth::{AuthError, CredentialStore};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError, SessionTokens};
use crate::config::AuthConfig;
use crate::error::{CoreError, Result};

/// The signed-in account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub handle: String,
    pub did: String,
}

/// Outcome of an interactive or silent sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInOutcome {
    SignedIn { handle: String, did: String },
    Failed { message: String },
    /// The caller cancelled before the session was committed; nothing changed.
    Cancelled,
}

impl SignInOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SignInOutcome::SignedIn { .. })
    }
}

#[derive(Clone)]
struct AccessToken {
    jwt: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn issue(jwt: String, now: DateTime<Utc>, fallback_lifetime: Duration) -> Self {
        let expires_at = jwt_expiry(&jwt).unwrap_or_else(|| {
            now.checked_add_signed(fallback_lifetime)
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        });
        Self { jwt, expires_at }
    }

    fn is_fresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        now.checked_add_signed(margin)
            .is_some_and(|deadline| deadline < self.expires_at)
    }
}

#[derive(Clone)]
struct ActiveSession {
    account: Account,
    access: AccessToken,
}

/// Read the `exp` claim of a JWT without verifying it.
///
/// The server is the only party that validates tokens; the client only needs
/// to know when to stop using one.
pub fn jwt_expiry(jwt: &str) -> Option<DateTime<Utc>> {
    let payload = jwt.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.get("exp")?.as_i64()?;
    DateTime::from_timestamp(exp, 0)
}

/// Strip whitespace and a leading `@` from user-typed handles.
pub fn normalize_handle(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed.strip_prefix('@').unwrap_or(trimmed).trim()
}

enum RefreshError {
    NoCredential,
    Cancelled,
    Store(AuthError),
    Api(ApiError),
}

struct AuthInner {
    api: Arc<dyn ApiClient>,
    store: Arc<dyn CredentialStore>,
    token_lifetime: Duration,
    refresh_margin: Duration,
    session: RwLock<Option<ActiveSession>>,
    /// Held for the whole of any session mutation.
    mutation_lock: Mutex<()>,
}

impl AuthInner {
    fn fresh_token(&self) -> Option<String> {
        let session = self.session.read();
        session
            .as_ref()
            .filter(|s| s.access.is_fresh(Utc::now(), self.refresh_margin))
            .map(|s| s.access.jwt.clone())
    }

    async fn persist(
        &self,
        previous_handle: Option<&str>,
        tokens: &SessionTokens,
    ) -> std::result::Result<(), AuthError> {
        self.store.save(&tokens.handle, &tokens.refresh_jwt).await?;

        if let Some(previous) =
            previous_handle.filter(|p| credential_key(p) != credential_key(&tokens.handle))
        {
            if let Err(e) = self.store.remove(previous).await {
                warn!(handle = %previous, error = %e, "failed to drop credential for renamed handle");
            }
        }
        Ok(())
    }

    fn install(&self, tokens: SessionTokens) -> ActiveSession {
        let session = ActiveSession {
            account: Account {
                handle: tokens.handle,
                did: tokens.did,
            },
            access: AccessToken::issue(tokens.access_jwt, Utc::now(), self.token_lifetime),
        };
        *self.session.write() = Some(session.clone());
        session
    }

    /// Exchange the stored refresh credential for a new session.
    ///
    /// Must be called with `mutation_lock` held. `cancel` is only checked
    /// before the request is sent; once the server answers, the rotated
    /// tokens are always installed, even if they could not be stored.
    async fn refresh_locked(
        &self,
        cancel: &CancellationToken,
    ) -> std::result::Result<ActiveSession, RefreshError> {
        let known_handle = self
            .session
            .read()
            .as_ref()
            .map(|s| s.account.handle.clone());

        let (handle, refresh_jwt) = match known_handle {
            Some(handle) => match self.store.load(&handle).await {
                Ok(Some(secret)) => (handle, secret),
                Ok(None) => return Err(RefreshError::NoCredential),
                Err(e) => return Err(RefreshError::Store(e)),
            },
            None => match self.store.most_recent().await {
                Ok(Some(credential)) => (credential.handle, credential.secret),
                Ok(None) => return Err(RefreshError::NoCredential),
                Err(e) => return Err(RefreshError::Store(e)),
            },
        };

        if cancel.is_cancelled() {
            return Err(RefreshError::Cancelled);
        }

        match self.api.refresh_session(&refresh_jwt).await {
            Ok(tokens) => {
                debug!(handle = %tokens.handle, "session refreshed");
                if let Err(e) = self.persist(Some(&handle), &tokens).await {
                    warn!(handle = %tokens.handle, error = %e, "could not persist rotated credential");
                }
                Ok(self.install(tokens))
            }
            Err(e) => {
                if e.is_client_rejection() {
                    info!(handle = %handle, error = %e, "refresh credential rejected, discarding it");
                    *self.session.write() = None;
                    if let Err(store_err) = self.store.remove(&handle).await {
                        warn!(handle = %handle, error = %store_err, "failed to remove rejected credential");
                    }
                }
                Err(RefreshError::Api(e))
            }
        }
    }
}

/// Owns the session for one client process.
#[derive(Clone)]
pub struct AuthenticationService {
    inner: Arc<AuthInner>,
}

impl std::fmt::Debug for AuthenticationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticationService")
            .field("api", &self.inner.api)
            .field("store", &self.inner.store)
            .field("account", &self.current_account())
            .finish()
    }
}

impl AuthenticationService {
    pub fn new(
        api: Arc<dyn ApiClient>,
        store: Arc<dyn CredentialStore>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            inner: Arc::new(AuthInner {
                api,
                store,
                token_lifetime: config.access_token_lifetime(),
                refresh_margin: config.refresh_margin(),
                session: RwLock::new(None),
                mutation_lock: Mutex::new(()),
            }),
        }
    }

    pub fn current_account(&self) -> Option<Account> {
        self.inner
            .session
            .read()
            .as_ref()
            .map(|s| s.account.clone())
    }

    pub fn is_signed_in(&self) -> bool {
        self.inner.session.read().is_some()
    }

    /// Create a session from a handle and app password.
    ///
    /// Bad credentials and network failures come back as
    /// [`SignInOutcome::Failed`]; only empty input is an `Err`.
    pub async fn sign_in(
        &self,
        cancel: &CancellationToken,
        handle: &str,
        app_password: &str,
    ) -> Result<SignInOutcome> {
        let handle = normalize_handle(handle);
        if handle.is_empty() {
            return Err(CoreError::MissingInput { field: "handle" });
        }
        if app_password.is_empty() {
            return Err(CoreError::MissingInput {
                field: "app_password",
            });
        }

        let inner = Arc::clone(&self.inner);
        let cancel = cancel.clone();
        let handle = handle.to_string();
        let password = app_password.to_string();

        let task = tokio::spawn(async move {
            let _guard = inner.mutation_lock.lock().await;
            if cancel.is_cancelled() {
                return SignInOutcome::Cancelled;
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return SignInOutcome::Cancelled,
                result = inner.api.create_session(&handle, &password) => result,
            };
            if cancel.is_cancelled() {
                return SignInOutcome::Cancelled;
            }

            let tokens = match result {
                Ok(tokens) => tokens,
                Err(e) => {
                    info!(handle = %handle, error = %e, "sign-in failed");
                    return SignInOutcome::Failed {
                        message: failure_message(&e),
                    };
                }
            };

            let previous = inner
                .session
                .read()
                .as_ref()
                .map(|s| s.account.handle.clone());
            match inner.persist(previous.as_deref(), &tokens).await {
                Ok(()) => {
                    let session = inner.install(tokens);
                    info!(handle = %session.account.handle, "signed in");
                    SignInOutcome::SignedIn {
                        handle: session.account.handle,
                        did: session.account.did,
                    }
                }
                Err(e) => {
                    warn!(handle = %handle, error = %e, "could not persist credential");
                    SignInOutcome::Failed {
                        message: "Signed in, but the credential could not be saved on this device"
                            .to_string(),
                    }
                }
            }
        });

        Ok(task.await.unwrap_or_else(|e| {
            warn!(error = %e, "sign-in task did not complete");
            SignInOutcome::Cancelled
        }))
    }

    /// Restore a session from the stored credential without user input.
    pub async fn try_silent_sign_in(&self, cancel: &CancellationToken) -> SignInOutcome {
        let inner = Arc::clone(&self.inner);
        let cancel = cancel.clone();

        let task = tokio::spawn(async move {
            let _guard = inner.mutation_lock.lock().await;
            if cancel.is_cancelled() {
                return SignInOutcome::Cancelled;
            }
            match inner.refresh_locked(&cancel).await {
                Ok(session) => {
                    info!(handle = %session.account.handle, "session restored");
                    SignInOutcome::SignedIn {
                        handle: session.account.handle,
                        did: session.account.did,
                    }
                }
                Err(RefreshError::Cancelled) => SignInOutcome::Cancelled,
                Err(RefreshError::NoCredential) => SignInOutcome::Failed {
                    message: "No saved account on this device".to_string(),
                },
                Err(RefreshError::Store(e)) => {
                    warn!(error = %e, "credential store unavailable during silent sign-in");
                    SignInOutcome::Failed {
                        message: "Saved credentials could not be read".to_string(),
                    }
                }
                Err(RefreshError::Api(e)) => SignInOutcome::Failed {
                    message: failure_message(&e),
                },
            }
        });

        task.await.unwrap_or_else(|e| {
            warn!(error = %e, "silent sign-in task did not complete");
            SignInOutcome::Cancelled
        })
    }

    /// A currently valid access token, refreshing from the stored credential
    /// when the held one is missing or about to expire.
    ///
    /// `None` means "not authenticated"; the reason is logged.
    pub async fn try_get_fresh_token(&self) -> Option<String> {
        if let Some(token) = self.inner.fresh_token() {
            return Some(token);
        }

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let _guard = inner.mutation_lock.lock().await;
            // Another caller may have refreshed while we waited.
            if let Some(token) = inner.fresh_token() {
                return Some(token);
            }
            match inner.refresh_locked(&CancellationToken::new()).await {
                Ok(session) => Some(session.access.jwt),
                Err(RefreshError::NoCredential) => {
                    debug!("no stored credential, not authenticated");
                    None
                }
                Err(RefreshError::Cancelled) => None,
                Err(RefreshError::Store(e)) => {
                    warn!(error = %e, "credential store unavailable during refresh");
                    None
                }
                Err(RefreshError::Api(e)) => {
                    warn!(error = %e, "access token refresh failed");
                    None
                }
            }
        });

        task.await.unwrap_or_else(|e| {
            warn!(error = %e, "token refresh task did not complete");
            None
        })
    }

    /// Forget the access token and every stored credential. Idempotent.
    pub async fn sign_out(&self) {
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let _guard = inner.mutation_lock.lock().await;
            let previous = inner.session.write().take();
            if let Err(e) = inner.store.clear().await {
                warn!(error = %e, "failed to clear stored credentials");
            }
            if let Some(session) = previous {
                info!(handle = %session.account.handle, "signed out");
            }
        });

        if let Err(e) = task.await {
            warn!(error = %e, "sign-out task did not complete");
        }
    }
}

fn failure_message(error: &ApiError) -> String {
    match error {
        ApiError::Rejected { message, .. } if !message.trim().is_empty() => message.clone(),
        ApiError::Rejected { status, .. } => format!("The server refused the request ({status})"),
        ApiError::Transport { .. } => "Could not reach the server".to_string(),
        ApiError::Deserialization { .. } => "Unexpected response from the server".to_string(),
    }
}
