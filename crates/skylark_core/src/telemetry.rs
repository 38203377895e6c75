//! Fire-and-forget usage and error reporting.
//!
//! Services hold an `Arc<dyn Telemetry>` and never observe whether a report
//! was delivered. [`TracingTelemetry`] forwards everything to the `tracing`
//! subscriber under the `skylark::telemetry` target.

use std::collections::HashMap;
use std::error::Error;

/// Event names reported by the services and the CLI.
pub mod events {
    pub const API_ERROR: &str = "ApiError";
    pub const SIGN_IN_CLICKED: &str = "SignInClicked";
    pub const AUTH_SUCCESS_FROM_SIGN_IN_PAGE: &str = "AuthSuccessFromSignInPage";
    pub const AUTH_FAIL_FROM_SIGN_IN_PAGE: &str = "AuthFailFromSignInPage";
    pub const AUTH_SUCCESS_FROM_SHELL_PAGE: &str = "AuthSuccessFromShellPage";
    pub const AUTH_FAIL_FROM_SHELL_PAGE: &str = "AuthFailFromShellPage";
    pub const LOGOUT_CLICKED: &str = "LogoutClicked";
    pub const NEW_POST_SUBMITTED: &str = "NewPostSubmitted";
}

pub type Properties = HashMap<String, String>;

/// Sink for named events and errors with string properties.
pub trait Telemetry: Send + Sync + std::fmt::Debug {
    fn track_event(&self, name: &str, properties: &Properties);

    fn track_error(&self, error: &(dyn Error + 'static), properties: &Properties);
}

/// Build a property map from literal pairs.
pub fn props<const N: usize>(pairs: [(&str, &str); N]) -> Properties {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Reports through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn track_event(&self, name: &str, properties: &Properties) {
        tracing::info!(target: "skylark::telemetry", event = name, ?properties, "telemetry event");
    }

    fn track_error(&self, error: &(dyn Error + 'static), properties: &Properties) {
        let mut chain = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            chain.push_str(": ");
            chain.push_str(&cause.to_string());
            source = cause.source();
        }
        tracing::warn!(target: "skylark::telemetry", error = %chain, ?properties, "telemetry error");
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn track_event(&self, _name: &str, _properties: &Properties) {}

    fn track_error(&self, _error: &(dyn Error + 'static), _properties: &Properties) {}
}
