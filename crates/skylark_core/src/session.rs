//! Wiring of the services.
//!
//! [`Skylark`] lives for the whole process and owns what survives a sign-out:
//! the API client, the credential store and the authentication service.
//! [`Session`] is created per signed-in account and owns the profile cache and
//! the current-user cell, so dropping it forgets everything cached for that
//! account.

use std::sync::Arc;

use skylark_auth::{AuthDb, CredentialStore, LAST_USED_HANDLE_KEY, UserSettings};
use tracing::warn;

use crate::api::{ApiClient, XrpcClient};
use crate::auth::AuthenticationService;
use crate::config::SkylarkConfig;
use crate::error::{CoreError, Result};
use crate::notifications::NotificationsService;
use crate::post::PostService;
use crate::profile::ProfileService;
use crate::telemetry::Telemetry;
use crate::timeline::TimelineService;

pub struct Skylark {
    config: SkylarkConfig,
    api: Arc<dyn ApiClient>,
    auth: AuthenticationService,
    settings: Arc<dyn UserSettings>,
    telemetry: Arc<dyn Telemetry>,
}

impl std::fmt::Debug for Skylark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Skylark")
            .field("pds_url", &self.config.service.pds_url)
            .field("auth", &self.auth)
            .finish()
    }
}

impl Skylark {
    /// Connect to the configured PDS and open the on-disk credential store.
    pub async fn open(config: SkylarkConfig, telemetry: Arc<dyn Telemetry>) -> Result<Self> {
        let api = Arc::new(XrpcClient::new(&config.service)?);
        let db = Arc::new(
            AuthDb::open_in_dir(&config.auth.data_dir)
                .await
                .map_err(|e| CoreError::credential_store("open", e))?,
        );
        Ok(Self::from_parts(config, api, db.clone(), db, telemetry))
    }

    pub fn from_parts(
        config: SkylarkConfig,
        api: Arc<dyn ApiClient>,
        store: Arc<dyn CredentialStore>,
        settings: Arc<dyn UserSettings>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        let auth = AuthenticationService::new(api.clone(), store, &config.auth);
        Self {
            config,
            api,
            auth,
            settings,
            telemetry,
        }
    }

    pub fn config(&self) -> &SkylarkConfig {
        &self.config
    }

    pub fn auth(&self) -> &AuthenticationService {
        &self.auth
    }

    pub fn telemetry(&self) -> &Arc<dyn Telemetry> {
        &self.telemetry
    }

    /// Handle typed on the last successful sign-in, to prefill the prompt.
    pub async fn last_used_handle(&self) -> Option<String> {
        match self.settings.get(LAST_USED_HANDLE_KEY).await {
            Ok(handle) => handle.filter(|h| !h.trim().is_empty()),
            Err(e) => {
                warn!(error = %e, "could not read last used handle");
                None
            }
        }
    }

    pub async fn remember_handle(&self, handle: &str) {
        if let Err(e) = self.settings.set(LAST_USED_HANDLE_KEY, handle).await {
            warn!(error = %e, "could not save last used handle");
        }
    }

    /// Fresh session-scoped services for the account currently signed in.
    pub fn start_session(&self) -> Session {
        let profiles = Arc::new(ProfileService::new(
            self.api.clone(),
            self.auth.clone(),
            self.telemetry.clone(),
            &self.config.cache,
        ));

        Session {
            timeline: TimelineService::new(
                self.api.clone(),
                self.auth.clone(),
                profiles.clone(),
                self.telemetry.clone(),
                self.config.feed.timeline_limit(),
            ),
            notifications: NotificationsService::new(
                self.api.clone(),
                self.auth.clone(),
                self.telemetry.clone(),
                self.config.feed.notifications_limit(),
            ),
            posts: PostService::new(self.api.clone(), self.auth.clone(), self.telemetry.clone()),
            profiles,
        }
    }
}

/// Services scoped to one signed-in account.
#[derive(Debug)]
pub struct Session {
    pub profiles: Arc<ProfileService>,
    pub timeline: TimelineService,
    pub notifications: NotificationsService,
    pub posts: PostService,
}
