use miette::Result;
use owo_colors::OwoColorize;
use skylark_core::post::MAX_POST_CHARS;
use skylark_core::{CoreError, Skylark};
use tokio_util::sync::CancellationToken;

use crate::helpers::require_session;
use crate::output::Output;

/// Publish a text post as the signed-in account.
pub async fn create(skylark: &Skylark, cancel: &CancellationToken, text: &str) -> Result<()> {
    let output = Output::new();
    let Some(session) = require_session(skylark, cancel, &output).await else {
        return Ok(());
    };

    match session.posts.create_post(cancel, text).await {
        Ok(Some(created)) => {
            output.success("Posted");
            output.info("URI:", &created.uri.dimmed().to_string());
        }
        Ok(None) => output.warning("Cancelled"),
        Err(CoreError::InvalidPost { reason }) => {
            output.error(&reason);
            output.status(&format!("Posts are limited to {MAX_POST_CHARS} characters."));
        }
        Err(CoreError::Api(e)) => output.error(&format!("Could not publish: {}", e)),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
