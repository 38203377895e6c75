//! Sign in with a handle and an app password.

use miette::Result;
use owo_colors::OwoColorize;
use skylark_core::telemetry::{events, props};
use skylark_core::{CoreError, SignInOutcome, Skylark};
use tokio_util::sync::CancellationToken;

use crate::output::Output;

pub async fn login(
    skylark: &Skylark,
    cancel: &CancellationToken,
    handle: Option<String>,
    app_password: Option<String>,
) -> Result<()> {
    let output = Output::new();
    let telemetry = skylark.telemetry();

    let handle = match handle {
        Some(handle) => handle,
        None => prompt_handle(skylark.last_used_handle().await)?,
    };

    output.section(&format!("Bluesky Login: {}", handle.bright_cyan()));

    let password = match app_password {
        Some(p) => p,
        None => {
            output.status("Enter your app password (not your main password):");
            output.status("Create app passwords at: https://bsky.app/settings/app-passwords");
            output.print("");

            match rpassword::prompt_password("  App password: ") {
                Ok(p) => p,
                Err(e) => {
                    output.error(&format!("Failed to read password: {}", e));
                    return Ok(());
                }
            }
        }
    };

    telemetry.track_event(events::SIGN_IN_CLICKED, &props([]));
    output.status("Authenticating...");

    let outcome = match skylark.auth().sign_in(cancel, &handle, &password).await {
        Ok(outcome) => outcome,
        Err(CoreError::MissingInput { field }) => SignInOutcome::Failed {
            message: format!("Please enter your {}", field.replace('_', " ")),
        },
        Err(e) => return Err(e.into()),
    };

    let user_input_has_at = handle.contains('@').to_string();
    match &outcome {
        SignInOutcome::SignedIn { handle: signed_in, did } => {
            skylark.remember_handle(&handle).await;
            telemetry.track_event(
                events::AUTH_SUCCESS_FROM_SIGN_IN_PAGE,
                &props([
                    ("userInputContainsAtSymbol", user_input_has_at.as_str()),
                    (
                        "handleContainsAtSymbol",
                        signed_in.contains('@').to_string().as_str(),
                    ),
                ]),
            );

            output.success("Signed in");
            output.info("Handle:", &format!("@{signed_in}").bright_cyan().to_string());
            output.info("DID:", &did.dimmed().to_string());
        }
        SignInOutcome::Failed { message } => {
            telemetry.track_event(
                events::AUTH_FAIL_FROM_SIGN_IN_PAGE,
                &props([
                    ("userInputContainsAtSymbol", user_input_has_at.as_str()),
                    ("handleContainsAtSymbol", "NullHandle"),
                ]),
            );
            output.error(message);
        }
        SignInOutcome::Cancelled => {
            telemetry.track_event(
                events::AUTH_FAIL_FROM_SIGN_IN_PAGE,
                &props([
                    ("userInputContainsAtSymbol", user_input_has_at.as_str()),
                    ("handleContainsAtSymbol", "NullHandle"),
                ]),
            );
            output.warning("Sign-in cancelled");
        }
    }

    Ok(())
}

fn prompt_handle(last_used: Option<String>) -> Result<String> {
    let mut input = dialoguer::Input::<String>::new().with_prompt("Handle");
    if let Some(last_used) = last_used {
        input = input.default(last_used);
    }
    input
        .interact_text()
        .map_err(|e| miette::miette!("Input error: {}", e))
}
