use miette::Result;
use owo_colors::OwoColorize;
use skylark_core::{NotificationView, Skylark};
use tokio_util::sync::CancellationToken;

use crate::helpers::require_session;
use crate::output::{Output, format_relative_time};

pub async fn list(
    skylark: &Skylark,
    cancel: &CancellationToken,
    cursor: Option<String>,
) -> Result<()> {
    let output = Output::new();
    let Some(session) = require_session(skylark, cancel, &output).await else {
        return Ok(());
    };

    let Some(page) = session
        .notifications
        .get_notifications(cancel, cursor.as_deref())
        .await
    else {
        output.warning("Cancelled");
        return Ok(());
    };

    output.section("Notifications");
    if page.notifications.is_empty() {
        output.status("No notifications");
    }

    let unread = page.notifications.iter().filter(|n| !n.is_read).count();
    for notification in &page.notifications {
        output.print(&NotificationView::from_notification(notification).to_string());
    }

    output.print("");
    if unread > 0 {
        output.kv("Unread", &unread.bright_yellow().to_string());
    }
    if let Some(seen_at) = page.seen_at {
        output.kv("Last seen", &format_relative_time(seen_at));
    }
    if let Some(next) = &page.cursor {
        output.info("Next page:", &format!("--cursor {}", next).dimmed().to_string());
    }

    Ok(())
}
