//! Typed access to the XRPC endpoints the client uses.
//!
//! [`ApiClient`] is the seam the services are written against; [`XrpcClient`]
//! is the HTTP implementation. Every call is a single request with no retry.

pub mod models;
mod xrpc;

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

pub use models::{
    Author, CreatedRecord, Embed, FeedItem, FeedReason, FeedRecord, NewPost, Notification,
    NotificationReason, NotificationsResponse, PostView, ReplyContext, ReplyPost, SessionTokens,
    TimelineResponse,
};
pub use xrpc::XrpcClient;

/// Failure of a single API call.
#[derive(Error, Diagnostic, Debug)]
pub enum ApiError {
    #[error("Request to {method} failed")]
    #[diagnostic(
        code(skylark_core::api::transport),
        help("Check network connectivity and the configured PDS URL")
    )]
    Transport {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unexpected response body from {method}")]
    #[diagnostic(code(skylark_core::api::deserialization))]
    Deserialization {
        method: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{method} rejected with status {status}: {message}")]
    #[diagnostic(code(skylark_core::api::rejected))]
    Rejected {
        method: &'static str,
        status: u16,
        /// XRPC error name, e.g. `AuthenticationRequired` or `ExpiredToken`.
        error: Option<String>,
        message: String,
    },
}

impl ApiError {
    pub fn method(&self) -> &'static str {
        match self {
            ApiError::Transport { method, .. }
            | ApiError::Deserialization { method, .. }
            | ApiError::Rejected { method, .. } => method,
        }
    }

    /// HTTP status when the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            ApiError::Rejected { status, .. } => Some(*status),
            ApiError::Deserialization { .. } => None,
        }
    }

    /// The server refused the request itself (4xx), as opposed to being unreachable
    /// or failing internally.
    pub fn is_client_rejection(&self) -> bool {
        matches!(self.status(), Some(status) if (400..500).contains(&status))
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Authenticated and unauthenticated calls against a PDS.
///
/// `token` arguments are access JWTs except for [`ApiClient::refresh_session`],
/// which takes the refresh JWT.
#[async_trait]
pub trait ApiClient: Send + Sync + std::fmt::Debug {
    /// `com.atproto.server.createSession`
    async fn create_session(&self, identifier: &str, password: &str) -> ApiResult<SessionTokens>;

    /// `com.atproto.server.refreshSession`
    async fn refresh_session(&self, refresh_jwt: &str) -> ApiResult<SessionTokens>;

    /// `app.bsky.feed.getTimeline`
    async fn get_timeline(
        &self,
        token: &str,
        cursor: Option<&str>,
        limit: u8,
    ) -> ApiResult<TimelineResponse>;

    /// `app.bsky.actor.getProfile`
    async fn get_profile(&self, token: &str, actor: &str) -> ApiResult<Author>;

    /// `app.bsky.notification.listNotifications`
    async fn list_notifications(
        &self,
        token: &str,
        cursor: Option<&str>,
        limit: u8,
    ) -> ApiResult<NotificationsResponse>;

    /// `com.atproto.repo.createRecord` for an `app.bsky.feed.post` in `repo`.
    async fn create_post(&self, token: &str, repo: &str, post: &NewPost)
        -> ApiResult<CreatedRecord>;
}
