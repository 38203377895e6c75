use miette::Result;
use owo_colors::OwoColorize;
use skylark_core::Skylark;
use skylark_core::api::Author;
use skylark_core::view::AuthorView;
use tokio_util::sync::CancellationToken;

use crate::helpers::require_session;
use crate::output::Output;

/// Show the signed-in account.
pub async fn whoami(skylark: &Skylark, cancel: &CancellationToken) -> Result<()> {
    let output = Output::new();
    let Some(session) = require_session(skylark, cancel, &output).await else {
        return Ok(());
    };

    match session.profiles.get_current_user().await {
        Some(me) => show_author(&output, "Signed in as", &me),
        None => {
            // Profile lookups degrade to nothing; fall back to what sign-in knows.
            if let Some(account) = skylark.auth().current_account() {
                output.section("Signed in as");
                output.info("Handle:", &format!("@{}", account.handle).bright_cyan().to_string());
                output.info("DID:", &account.did.dimmed().to_string());
                output.warning("Could not load the full profile");
            }
        }
    }

    Ok(())
}

pub(crate) fn show_author(output: &Output, title: &str, author: &Author) {
    output.section(title);
    output.info("Name:", &AuthorView::from(author).to_string().bright_cyan().to_string());
    output.info("DID:", &author.did.dimmed().to_string());

    if let Some(description) = author.description.as_deref().filter(|d| !d.trim().is_empty()) {
        output.print("");
        for line in description.lines() {
            output.print(&format!("  {line}"));
        }
        output.print("");
    }

    if let Some(count) = author.followers_count {
        output.kv("Followers", &count.to_string());
    }
    if let Some(count) = author.follows_count {
        output.kv("Following", &count.to_string());
    }
    if let Some(count) = author.posts_count {
        output.kv("Posts", &count.to_string());
    }
    if let Some(avatar) = &author.avatar {
        output.kv("Avatar", avatar);
    }
}
