//! Profile lookups with a per-handle cache and a lazily resolved current user.

use std::sync::Arc;

use moka::future::Cache;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::api::{ApiClient, ApiError, Author};
use crate::auth::{AuthenticationService, normalize_handle};
use crate::config::CacheConfig;
use crate::telemetry::{Telemetry, events, props};

#[derive(Debug, thiserror::Error)]
enum LookupError {
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("empty handle")]
    EmptyHandle,
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Supplies the signed-in user's profile and anyone else's.
///
/// Lookups for the same handle that overlap share one request. Failures are
/// never cached.
pub struct ProfileService {
    api: Arc<dyn ApiClient>,
    auth: AuthenticationService,
    telemetry: Arc<dyn Telemetry>,
    profiles: Cache<String, Author>,
    current: OnceCell<Author>,
}

impl std::fmt::Debug for ProfileService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileService")
            .field("cached_profiles", &self.profiles.entry_count())
            .field("current", &self.current.get().map(|a| &a.handle))
            .finish()
    }
}

impl ProfileService {
    pub fn new(
        api: Arc<dyn ApiClient>,
        auth: AuthenticationService,
        telemetry: Arc<dyn Telemetry>,
        config: &CacheConfig,
    ) -> Self {
        let profiles = Cache::builder()
            .max_capacity(config.profile_capacity)
            .time_to_live(config.profile_ttl())
            .build();

        Self {
            api,
            auth,
            telemetry,
            profiles,
            current: OnceCell::new(),
        }
    }

    /// The signed-in user's profile, resolved once and then reused.
    ///
    /// Concurrent first callers wait on the same lookup. A failed lookup leaves
    /// the cell empty so the next caller tries again.
    pub async fn get_current_user(&self) -> Option<Author> {
        let result = self
            .current
            .get_or_try_init(|| async {
                // Resolving a token first restores a stored session if needed.
                self.auth
                    .try_get_fresh_token()
                    .await
                    .ok_or_else(|| Arc::new(LookupError::NotAuthenticated))?;
                let account = self
                    .auth
                    .current_account()
                    .ok_or_else(|| Arc::new(LookupError::NotAuthenticated))?;
                self.lookup(&account.handle).await
            })
            .await;

        match result {
            Ok(author) => Some(author.clone()),
            Err(e) => {
                debug!(error = %e, "current user unavailable");
                None
            }
        }
    }

    /// Profile for `handle`, from cache when present.
    pub async fn get_profile(&self, handle: &str) -> Option<Author> {
        match self.lookup(handle).await {
            Ok(author) => Some(author),
            Err(e) => {
                debug!(handle, error = %e, "profile unavailable");
                None
            }
        }
    }

    /// Drop one cached profile so the next lookup refetches it.
    pub async fn invalidate(&self, handle: &str) {
        self.profiles.invalidate(&cache_key(handle)).await;
    }

    async fn lookup(&self, handle: &str) -> Result<Author, Arc<LookupError>> {
        let key = cache_key(handle);
        if key.is_empty() {
            return Err(Arc::new(LookupError::EmptyHandle));
        }

        self.profiles
            .try_get_with(key.clone(), async {
                let token = self
                    .auth
                    .try_get_fresh_token()
                    .await
                    .ok_or(LookupError::NotAuthenticated)?;
                self.api.get_profile(&token, &key).await.map_err(|e| {
                    warn!(handle = %key, error = %e, "profile fetch failed");
                    let message = e.to_string();
                    self.telemetry.track_event(
                        events::API_ERROR,
                        &props([("method", e.method()), ("message", message.as_str())]),
                    );
                    self.telemetry
                        .track_error(&e, &props([("method", e.method())]));
                    LookupError::from(e)
                })
            })
            .await
    }
}

fn cache_key(handle: &str) -> String {
    normalize_handle(handle).to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use crate::telemetry::NoopTelemetry;
    use crate::test_helpers::{FakeApiClient, RecordingTelemetry, author};
    use pretty_assertions::assert_eq;
    use skylark_auth::AuthDb;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    async fn signed_in(api: Arc<FakeApiClient>, telemetry: Arc<dyn Telemetry>) -> ProfileService {
        let store = Arc::new(AuthDb::open_in_memory().await.unwrap());
        let auth = AuthenticationService::new(api.clone(), store, &AuthConfig::default());
        let outcome = auth
            .sign_in(&CancellationToken::new(), "alice.example", "pw")
            .await
            .unwrap();
        assert!(outcome.is_success());
        ProfileService::new(api, auth, telemetry, &CacheConfig::default())
    }

    #[tokio::test]
    async fn test_current_user_is_resolved_once() {
        let api = Arc::new(FakeApiClient::new().with_account("alice.example", "pw"));
        let profiles = signed_in(api.clone(), Arc::new(NoopTelemetry)).await;

        let first = profiles.get_current_user().await.unwrap();
        let second = profiles.get_current_user().await.unwrap();

        assert_eq!(first.handle, "alice.example");
        assert_eq!(first, second);
        assert_eq!(api.profile_calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_current_user_lookups_share_one_fetch() {
        let api = Arc::new(FakeApiClient::new().with_account("alice.example", "pw"));
        let profiles = signed_in(api.clone(), Arc::new(NoopTelemetry)).await;
        api.set_latency(Some(Duration::from_millis(50)));

        let results =
            futures::future::join_all((0..6).map(|_| profiles.get_current_user())).await;

        assert!(results.iter().all(|r| r.as_ref().map(|a| a.handle.as_str()) == Some("alice.example")));
        assert_eq!(api.profile_calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_current_user_lookup_is_retried() {
        let api = Arc::new(FakeApiClient::new().with_account("alice.example", "pw"));
        let telemetry = Arc::new(RecordingTelemetry::default());
        let profiles = signed_in(api.clone(), telemetry.clone()).await;

        api.set_profile_failure(true);
        assert!(profiles.get_current_user().await.is_none());
        assert_eq!(telemetry.event_count(events::API_ERROR), 1);

        api.set_profile_failure(false);
        assert!(profiles.get_current_user().await.is_some());
        assert_eq!(api.profile_calls(), 2);
    }

    #[tokio::test]
    async fn test_profiles_are_cached_case_insensitively_until_invalidated() {
        let api = Arc::new(
            FakeApiClient::new()
                .with_account("alice.example", "pw")
                .with_profile(author("bob.example")),
        );
        let profiles = signed_in(api.clone(), Arc::new(NoopTelemetry)).await;

        let bob = profiles.get_profile("bob.example").await.unwrap();
        let again = profiles.get_profile("@Bob.Example").await.unwrap();
        assert_eq!(bob, again);
        assert_eq!(api.profile_calls(), 1);

        profiles.invalidate("BOB.example").await;
        profiles.get_profile("bob.example").await.unwrap();
        assert_eq!(api.profile_calls(), 2);
    }

    #[tokio::test]
    async fn test_unknown_profile_is_absent() {
        let api = Arc::new(FakeApiClient::new().with_account("alice.example", "pw"));
        let profiles = signed_in(api.clone(), Arc::new(NoopTelemetry)).await;

        assert!(profiles.get_profile("nobody.example").await.is_none());
        assert!(profiles.get_profile("   ").await.is_none());
    }

    #[tokio::test]
    async fn test_signed_out_has_no_current_user() {
        let api = Arc::new(FakeApiClient::new());
        let store = Arc::new(AuthDb::open_in_memory().await.unwrap());
        let auth = AuthenticationService::new(api.clone(), store, &AuthConfig::default());
        let profiles = ProfileService::new(
            api.clone(),
            auth,
            Arc::new(NoopTelemetry),
            &CacheConfig::default(),
        );

        assert!(profiles.get_current_user().await.is_none());
        assert_eq!(api.profile_calls(), 0);
    }
}
