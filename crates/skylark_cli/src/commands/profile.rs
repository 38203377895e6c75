use miette::Result;
use skylark_core::Skylark;
use tokio_util::sync::CancellationToken;

use crate::commands::whoami::show_author;
use crate::helpers::require_session;
use crate::output::Output;

/// Look up any account by handle.
pub async fn show(skylark: &Skylark, cancel: &CancellationToken, handle: &str) -> Result<()> {
    let output = Output::new();
    let Some(session) = require_session(skylark, cancel, &output).await else {
        return Ok(());
    };

    match session.profiles.get_profile(handle).await {
        Some(author) => show_author(&output, "Profile", &author),
        None => output.error(&format!("Could not load profile for {handle}")),
    }

    Ok(())
}
