use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::api::{ApiClient, CreatedRecord, NewPost};
use crate::auth::AuthenticationService;
use crate::error::{CoreError, Result};
use crate::telemetry::{Telemetry, events, props};

/// Longest post the network accepts, counted in characters.
pub const MAX_POST_CHARS: usize = 300;

/// Trim and check post text before it is sent.
pub fn validate_post_text(text: &str) -> Result<&str> {
    let text = text.trim();
    if text.is_empty() {
        return Err(CoreError::InvalidPost {
            reason: "post text is empty".to_string(),
        });
    }
    let chars = text.chars().count();
    if chars > MAX_POST_CHARS {
        return Err(CoreError::InvalidPost {
            reason: format!("{chars} characters, at most {MAX_POST_CHARS} allowed"),
        });
    }
    Ok(text)
}

#[derive(Debug)]
pub struct PostService {
    api: Arc<dyn ApiClient>,
    auth: AuthenticationService,
    telemetry: Arc<dyn Telemetry>,
}

impl PostService {
    pub fn new(
        api: Arc<dyn ApiClient>,
        auth: AuthenticationService,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        Self {
            api,
            auth,
            telemetry,
        }
    }

    /// Publish a text post as the signed-in account.
    ///
    /// `Ok(None)` if `cancel` fired before the server answered.
    pub async fn create_post(
        &self,
        cancel: &CancellationToken,
        text: &str,
    ) -> Result<Option<CreatedRecord>> {
        let text = validate_post_text(text)?;

        let Some(token) = self.auth.try_get_fresh_token().await else {
            return Err(CoreError::NotSignedIn);
        };
        let account = self.auth.current_account().ok_or(CoreError::NotSignedIn)?;

        let post = NewPost::new(text);
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(None),
            result = self.api.create_post(&token, &account.did, &post) => result,
        };

        let chars = text.chars().count().to_string();
        self.telemetry.track_event(
            events::NEW_POST_SUBMITTED,
            &props([
                ("characterCount", chars.as_str()),
                ("succeeded", if result.is_ok() { "true" } else { "false" }),
            ]),
        );

        let record = result?;
        info!(uri = %record.uri, "post created");
        Ok(Some(record))
    }
}
