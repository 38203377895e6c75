use std::time::Instant;

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde_json::json;

use super::models::{POST_COLLECTION, XrpcErrorBody};
use super::{
    ApiClient, ApiError, ApiResult, Author, CreatedRecord, NewPost, NotificationsResponse,
    SessionTokens, TimelineResponse,
};
use crate::config::ServiceConfig;
use crate::error::{ConfigError, CoreError};

const CREATE_SESSION: &str = "com.atproto.server.createSession";
const REFRESH_SESSION: &str = "com.atproto.server.refreshSession";
const GET_TIMELINE: &str = "app.bsky.feed.getTimeline";
const GET_PROFILE: &str = "app.bsky.actor.getProfile";
const LIST_NOTIFICATIONS: &str = "app.bsky.notification.listNotifications";
const CREATE_RECORD: &str = "com.atproto.repo.createRecord";

/// [`ApiClient`] over HTTP against a single PDS.
#[derive(Debug, Clone)]
pub struct XrpcClient {
    client: reqwest::Client,
    /// Always ends in `/`.
    base_url: String,
}

impl XrpcClient {
    pub fn new(config: &ServiceConfig) -> crate::Result<Self> {
        let invalid = |reason: String| CoreError::ConfigurationError {
            config_path: "service".to_string(),
            field: "service.pds_url".to_string(),
            expected: "absolute http(s) URL".to_string(),
            cause: ConfigError::InvalidValue {
                field: "service.pds_url".to_string(),
                reason,
            },
        };

        let url = url::Url::parse(&config.pds_url).map_err(|e| invalid(e.to_string()))?;
        let mut base_url = url.to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .connect_timeout(config.timeout().min(std::time::Duration::from_secs(10)))
            .build()
            .map_err(|e| invalid(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, nsid: &str) -> String {
        format!("{}xrpc/{}", self.base_url, nsid)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: &'static str,
        request: RequestBuilder,
    ) -> ApiResult<T> {
        let started = Instant::now();
        let response = request
            .send()
            .await
            .map_err(|source| ApiError::Transport { method, source })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|source| ApiError::Transport { method, source })?;

        tracing::debug!(
            method,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            bytes = body.len(),
            "xrpc call"
        );

        if !status.is_success() {
            let parsed: XrpcErrorBody = serde_json::from_slice(&body).unwrap_or_default();
            let message = parsed
                .message
                .or_else(|| parsed.error.clone())
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                });
            return Err(ApiError::Rejected {
                method,
                status: status.as_u16(),
                error: parsed.error,
                message,
            });
        }

        serde_json::from_slice(&body).map_err(|source| ApiError::Deserialization { method, source })
    }
}

#[async_trait]
impl ApiClient for XrpcClient {
    async fn create_session(&self, identifier: &str, password: &str) -> ApiResult<SessionTokens> {
        let request = self
            .client
            .post(self.endpoint(CREATE_SESSION))
            .json(&json!({ "identifier": identifier, "password": password }));
        self.execute(CREATE_SESSION, request).await
    }

    async fn refresh_session(&self, refresh_jwt: &str) -> ApiResult<SessionTokens> {
        let request = self
            .client
            .post(self.endpoint(REFRESH_SESSION))
            .bearer_auth(refresh_jwt);
        self.execute(REFRESH_SESSION, request).await
    }

    async fn get_timeline(
        &self,
        token: &str,
        cursor: Option<&str>,
        limit: u8,
    ) -> ApiResult<TimelineResponse> {
        let mut request = self
            .client
            .get(self.endpoint(GET_TIMELINE))
            .bearer_auth(token)
            .query(&[("limit", limit.to_string())]);
        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor)]);
        }
        self.execute(GET_TIMELINE, request).await
    }

    async fn get_profile(&self, token: &str, actor: &str) -> ApiResult<Author> {
        let request = self
            .client
            .get(self.endpoint(GET_PROFILE))
            .bearer_auth(token)
            .query(&[("actor", actor)]);
        self.execute(GET_PROFILE, request).await
    }

    async fn list_notifications(
        &self,
        token: &str,
        cursor: Option<&str>,
        limit: u8,
    ) -> ApiResult<NotificationsResponse> {
        let mut request = self
            .client
            .get(self.endpoint(LIST_NOTIFICATIONS))
            .bearer_auth(token)
            .query(&[("limit", limit.to_string())]);
        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor)]);
        }
        self.execute(LIST_NOTIFICATIONS, request).await
    }

    async fn create_post(
        &self,
        token: &str,
        repo: &str,
        post: &NewPost,
    ) -> ApiResult<CreatedRecord> {
        let request = self
            .client
            .post(self.endpoint(CREATE_RECORD))
            .bearer_auth(token)
            .json(&json!({
                "repo": repo,
                "collection": POST_COLLECTION,
                "record": post.to_record(),
            }));
        self.execute(CREATE_RECORD, request).await
    }
}
