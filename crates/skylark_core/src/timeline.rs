//! Home timeline assembly.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::{ApiClient, ApiError, FeedItem};
use crate::auth::AuthenticationService;
use crate::profile::ProfileService;
use crate::telemetry::{Telemetry, events, props};

/// One page of the home timeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedPage {
    pub items: Vec<FeedItem>,
    /// Opaque; `None` means there are no more pages.
    pub cursor: Option<String>,
}

impl FeedPage {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Drop replies whose parent was written by someone other than `current_handle`.
///
/// Items without a reply, or whose parent is not visible, pass through. Order
/// is preserved.
pub fn filter_replies(items: Vec<FeedItem>, current_handle: &str) -> Vec<FeedItem> {
    items
        .into_iter()
        .filter(|item| match &item.reply {
            None => true,
            Some(_) => match item.reply_parent_author() {
                Some(parent) => parent.has_handle(current_handle),
                None => true,
            },
        })
        .collect()
}

#[derive(Debug)]
pub struct TimelineService {
    api: Arc<dyn ApiClient>,
    auth: AuthenticationService,
    profiles: Arc<ProfileService>,
    telemetry: Arc<dyn Telemetry>,
    page_size: u8,
}

impl TimelineService {
    pub fn new(
        api: Arc<dyn ApiClient>,
        auth: AuthenticationService,
        profiles: Arc<ProfileService>,
        telemetry: Arc<dyn Telemetry>,
        page_size: u8,
    ) -> Self {
        Self {
            api,
            auth,
            profiles,
            telemetry,
            page_size,
        }
    }

    /// Fetch one page of the home timeline.
    ///
    /// Returns `None` if `cancel` fires first. Every failure to produce a page
    /// (no current user, no token, API error) degrades to an empty page.
    pub async fn get_timeline(
        &self,
        cancel: &CancellationToken,
        cursor: Option<&str>,
    ) -> Option<FeedPage> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("timeline fetch cancelled");
                None
            }
            page = self.fetch(cursor) => Some(page),
        }
    }

    async fn fetch(&self, cursor: Option<&str>) -> FeedPage {
        let Some(current_user) = self.profiles.get_current_user().await else {
            debug!("no current user, returning empty timeline");
            return FeedPage::empty();
        };
        if current_user.handle.trim().is_empty() {
            return FeedPage::empty();
        }

        let Some(token) = self.auth.try_get_fresh_token().await else {
            debug!("no access token, returning empty timeline");
            return FeedPage::empty();
        };

        match self.api.get_timeline(&token, cursor, self.page_size).await {
            Ok(response) => {
                let fetched = response.feed.len();
                let items = filter_replies(response.feed, &current_user.handle);
                debug!(
                    fetched,
                    kept = items.len(),
                    has_more = response.cursor.is_some(),
                    "timeline page"
                );
                FeedPage {
                    items,
                    cursor: response.cursor,
                }
            }
            Err(e) => {
                self.report(&e);
                FeedPage::empty()
            }
        }
    }

    fn report(&self, error: &ApiError) {
        warn!(method = error.method(), error = %error, "timeline fetch failed");
        let message = error.to_string();
        self.telemetry.track_event(
            events::API_ERROR,
            &props([("method", "get_timeline"), ("message", message.as_str())]),
        );
        self.telemetry
            .track_error(error, &props([("method", "get_timeline")]));
    }
}
