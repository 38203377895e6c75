use miette::Result;
use owo_colors::OwoColorize;
use skylark_core::{FeedItemView, Skylark};
use tokio_util::sync::CancellationToken;

use crate::helpers::require_session;
use crate::output::Output;

/// Print the home timeline, `pages` pages starting at `cursor`.
pub async fn show(
    skylark: &Skylark,
    cancel: &CancellationToken,
    cursor: Option<String>,
    pages: u32,
) -> Result<()> {
    let output = Output::new();
    let Some(session) = require_session(skylark, cancel, &output).await else {
        return Ok(());
    };

    output.section("Home");

    let mut cursor = cursor;
    let mut shown = 0usize;
    for _ in 0..pages.max(1) {
        let Some(page) = session.timeline.get_timeline(cancel, cursor.as_deref()).await else {
            output.warning("Cancelled");
            return Ok(());
        };

        for item in &page.items {
            output.print("");
            output.print(&FeedItemView::from_item(item).to_string());
        }
        shown += page.items.len();

        cursor = page.cursor;
        if cursor.is_none() {
            break;
        }
    }

    output.print("");
    if shown == 0 {
        output.status("Nothing to show");
    }
    if let Some(next) = &cursor {
        output.info("Next page:", &format!("--cursor {}", next).dimmed().to_string());
    }

    Ok(())
}
