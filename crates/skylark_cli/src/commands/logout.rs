use miette::Result;
use skylark_core::Skylark;
use skylark_core::telemetry::{events, props};

use crate::output::Output;

/// Sign out after confirmation, forgetting the saved credential.
pub async fn logout(skylark: &Skylark, yes: bool) -> Result<()> {
    let output = Output::new();

    let confirmed = yes
        || dialoguer::Confirm::new()
            .with_prompt("Sign out and forget the saved login?")
            .default(false)
            .interact()
            .map_err(|e| miette::miette!("Confirm error: {}", e))?;

    if confirmed {
        skylark.auth().sign_out().await;
        output.success("Signed out");
    } else {
        output.status("Still signed in");
    }

    skylark.telemetry().track_event(
        events::LOGOUT_CLICKED,
        &props([("signedOut", confirmed.to_string().as_str())]),
    );

    Ok(())
}
