//! Shared helper functions for CLI commands
//!
//! - `load_config()` - Loads config from a path or the standard locations
//! - `open_client()` - Opens the PDS client and credential store
//! - `require_session()` - Restores the saved sign-in before a command runs

use std::path::Path;
use std::sync::Arc;

use miette::Result;
use skylark_core::config::{self, SkylarkConfig};
use skylark_core::telemetry::{events, props};
use skylark_core::{Session, SignInOutcome, Skylark, TracingTelemetry};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::output::Output;

/// Load configuration, preferring an explicit path.
pub async fn load_config(path: Option<&Path>, pds_url: Option<&str>) -> Result<SkylarkConfig> {
    let mut config = match path {
        Some(path) => {
            info!("Loading config from: {:?}", path);
            config::load_config(path).await?
        }
        None => {
            info!("Loading config from standard locations");
            config::load_config_from_standard_locations().await?
        }
    };

    if let Some(url) = pds_url {
        config.service.pds_url = url.to_string();
    }

    Ok(config)
}

/// Open the client with telemetry reported through tracing.
pub async fn open_client(config: SkylarkConfig) -> Result<Skylark> {
    Skylark::open(config, Arc::new(TracingTelemetry))
        .await
        .map_err(|e| miette::miette!("Failed to open Skylark: {}", e))
}

/// Restore the saved sign-in, or explain how to get one.
///
/// Returns `None` when the command cannot go on; the reason has already been
/// printed.
pub async fn require_session(
    skylark: &Skylark,
    cancel: &CancellationToken,
    output: &Output,
) -> Option<Session> {
    let telemetry = skylark.telemetry();

    match skylark.auth().try_silent_sign_in(cancel).await {
        SignInOutcome::SignedIn { handle, .. } => {
            telemetry.track_event(events::AUTH_SUCCESS_FROM_SHELL_PAGE, &props([]));
            info!(%handle, "restored saved session");
            Some(skylark.start_session())
        }
        SignInOutcome::Failed { message } => {
            telemetry.track_event(events::AUTH_FAIL_FROM_SHELL_PAGE, &props([]));
            output.error("Sign-in required");
            output.status(&message);
            output.status("Run `skylark login <handle>` to sign in.");
            None
        }
        SignInOutcome::Cancelled => {
            output.warning("Cancelled");
            None
        }
    }
}
