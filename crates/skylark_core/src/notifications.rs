use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::{ApiClient, Notification};
use crate::auth::AuthenticationService;
use crate::telemetry::{Telemetry, events, props};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationPage {
    pub notifications: Vec<Notification>,
    pub cursor: Option<String>,
    /// When the account last marked notifications as seen.
    pub seen_at: Option<DateTime<Utc>>,
}

/// Lists the signed-in account's notifications. Failures degrade to an empty
/// page the same way the timeline does.
#[derive(Debug)]
pub struct NotificationsService {
    api: Arc<dyn ApiClient>,
    auth: AuthenticationService,
    telemetry: Arc<dyn Telemetry>,
    page_size: u8,
}

impl NotificationsService {
    pub fn new(
        api: Arc<dyn ApiClient>,
        auth: AuthenticationService,
        telemetry: Arc<dyn Telemetry>,
        page_size: u8,
    ) -> Self {
        Self {
            api,
            auth,
            telemetry,
            page_size,
        }
    }

    pub async fn get_notifications(
        &self,
        cancel: &CancellationToken,
        cursor: Option<&str>,
    ) -> Option<NotificationPage> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            page = self.fetch(cursor) => Some(page),
        }
    }

    async fn fetch(&self, cursor: Option<&str>) -> NotificationPage {
        let Some(token) = self.auth.try_get_fresh_token().await else {
            debug!("no access token, returning no notifications");
            return NotificationPage::default();
        };

        match self
            .api
            .list_notifications(&token, cursor, self.page_size)
            .await
        {
            Ok(response) => NotificationPage {
                notifications: response.notifications,
                cursor: response.cursor,
                seen_at: response.seen_at,
            },
            Err(e) => {
                warn!(error = %e, "notification fetch failed");
                let message = e.to_string();
                self.telemetry.track_event(
                    events::API_ERROR,
                    &props([("method", "get_notifications"), ("message", message.as_str())]),
                );
                self.telemetry
                    .track_error(&e, &props([("method", "get_notifications")]));
                NotificationPage::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::NotificationReason;
    use crate::config::AuthConfig;
    use crate::test_helpers::{FakeApiClient, RecordingTelemetry, notification};
    use pretty_assertions::assert_eq;
    use skylark_auth::AuthDb;

    async fn service(api: Arc<FakeApiClient>, sign_in: bool) -> (NotificationsService, Arc<RecordingTelemetry>) {
        let telemetry = Arc::new(RecordingTelemetry::default());
        let store = Arc::new(AuthDb::open_in_memory().await.unwrap());
        let auth = AuthenticationService::new(api.clone(), store, &AuthConfig::default());
        if sign_in {
            auth.sign_in(&CancellationToken::new(), "alice.example", "pw")
                .await
                .unwrap();
        }
        (
            NotificationsService::new(api, auth, telemetry.clone(), 25),
            telemetry,
        )
    }

    #[tokio::test]
    async fn test_lists_notifications_with_cursor() {
        let api = Arc::new(
            FakeApiClient::new()
                .with_account("alice.example", "pw")
                .with_notifications(
                    vec![
                        notification("bob.example", NotificationReason::Like),
                        notification("carol.example", NotificationReason::Reply),
                    ],
                    Some("n-2"),
                ),
        );
        let (service, _) = service(api.clone(), true).await;

        let page = service
            .get_notifications(&CancellationToken::new(), Some("n-1"))
            .await
            .unwrap();

        assert_eq!(page.notifications.len(), 2);
        assert_eq!(page.notifications[1].reason, NotificationReason::Reply);
        assert_eq!(page.cursor.as_deref(), Some("n-2"));
        assert_eq!(api.notification_calls(), 1);
    }

    #[tokio::test]
    async fn test_signed_out_returns_empty_without_calling() {
        let api = Arc::new(FakeApiClient::new());
        let (service, _) = service(api.clone(), false).await;

        let page = service
            .get_notifications(&CancellationToken::new(), None)
            .await
            .unwrap();

        assert_eq!(page, NotificationPage::default());
        assert_eq!(api.notification_calls(), 0);
    }

    #[tokio::test]
    async fn test_failure_is_reported_and_degraded() {
        let api = Arc::new(FakeApiClient::new().with_account("alice.example", "pw"));
        api.set_notifications_failure(true);
        let (service, telemetry) = service(api, true).await;

        let page = service
            .get_notifications(&CancellationToken::new(), None)
            .await
            .unwrap();

        assert!(page.notifications.is_empty());
        let events = telemetry.events_named(events::API_ERROR);
        assert_eq!(
            events[0].get("method").map(String::as_str),
            Some("get_notifications")
        );
    }

    #[tokio::test]
    async fn test_already_cancelled_returns_none() {
        let api = Arc::new(FakeApiClient::new().with_account("alice.example", "pw"));
        let (service, _) = service(api.clone(), true).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert_eq!(service.get_notifications(&cancel, None).await, None);
        assert_eq!(api.notification_calls(), 0);
    }
}
