#![cfg(test)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use parking_lot::Mutex;

use crate::api::models::{POST_COLLECTION, ReplyContext, ReplyPost};
use crate::api::{
    ApiClient, ApiError, ApiResult, Author, CreatedRecord, FeedItem, FeedRecord, NewPost,
    Notification, NotificationReason, NotificationsResponse, PostView, SessionTokens,
    TimelineResponse,
};
use crate::telemetry::{Properties, Telemetry};

/// An unsigned JWT whose `exp` is `exp_offset_secs` from now.
pub fn fake_jwt(sub: &str, exp_offset_secs: i64, nonce: u64) -> String {
    let now = Utc::now().timestamp();
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"ES256K","typ":"at+jwt"}"#);
    let claims = serde_json::json!({
        "sub": sub,
        "iat": now,
        "exp": now + exp_offset_secs,
        "jti": nonce,
    });
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

pub fn author(handle: &str) -> Author {
    Author {
        did: format!("did:plc:{}", handle.replace('.', "")),
        handle: handle.to_string(),
        display_name: None,
        avatar: None,
        description: None,
        followers_count: None,
        follows_count: None,
        posts_count: None,
    }
}

pub fn post_view(handle: &str, text: &str) -> PostView {
    let now = Utc::now();
    PostView {
        uri: format!("at://{handle}/app.bsky.feed.post/{}", text.len()),
        cid: "bafyreib".to_string(),
        author: author(handle),
        record: FeedRecord {
            record_type: POST_COLLECTION.to_string(),
            created_at: now,
            text: text.to_string(),
            reply: None,
            langs: None,
        },
        embed: None,
        reply_count: 0,
        repost_count: 0,
        like_count: 0,
        indexed_at: now,
    }
}

pub fn feed_item(handle: &str, text: &str) -> FeedItem {
    FeedItem {
        post: post_view(handle, text),
        reply: None,
        reason: None,
    }
}

/// Make `item` a reply to a visible post by `parent_handle`.
pub fn reply_to(mut item: FeedItem, parent_handle: &str) -> FeedItem {
    let parent = ReplyPost::Post(Box::new(post_view(parent_handle, "parent")));
    item.reply = Some(ReplyContext {
        root: parent.clone(),
        parent,
    });
    item
}

pub fn notification(handle: &str, reason: NotificationReason) -> Notification {
    Notification {
        uri: format!("at://{handle}/app.bsky.feed.like/1"),
        cid: "bafyreic".to_string(),
        author: author(handle),
        reason,
        reason_subject: None,
        record: serde_json::Value::Null,
        is_read: false,
        indexed_at: Utc::now(),
    }
}

#[derive(Debug, Clone)]
struct FakeAccount {
    handle: String,
    did: String,
    password: String,
}

/// Scripted in-memory [`ApiClient`].
///
/// Accounts, profiles and pages are set up with the `with_*` builders; the
/// `set_*` switches change behaviour mid-test. Every endpoint counts its calls.
#[derive(Debug)]
pub struct FakeApiClient {
    accounts: Mutex<HashMap<String, FakeAccount>>,
    profiles: Mutex<HashMap<String, Author>>,
    /// Live refresh tokens, mapped to the account they belong to.
    refresh_tokens: Mutex<HashMap<String, String>>,
    timeline: Mutex<TimelineResponse>,
    notifications: Mutex<NotificationsResponse>,
    posts: Mutex<Vec<(String, NewPost)>>,
    seen_timeline_cursors: Mutex<Vec<Option<String>>>,
    access_ttl_secs: AtomicI64,
    latency: Mutex<Option<Duration>>,
    refresh_failure: Mutex<Option<u16>>,
    fail_timeline: AtomicBool,
    fail_profile: AtomicBool,
    fail_notifications: AtomicBool,
    issued: AtomicU64,
    create_session_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    timeline_calls: AtomicUsize,
    profile_calls: AtomicUsize,
    notification_calls: AtomicUsize,
}

impl FakeApiClient {
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            profiles: Mutex::new(HashMap::new()),
            refresh_tokens: Mutex::new(HashMap::new()),
            timeline: Mutex::new(TimelineResponse::default()),
            notifications: Mutex::new(NotificationsResponse::default()),
            posts: Mutex::new(Vec::new()),
            seen_timeline_cursors: Mutex::new(Vec::new()),
            access_ttl_secs: AtomicI64::new(3600),
            latency: Mutex::new(None),
            refresh_failure: Mutex::new(None),
            fail_timeline: AtomicBool::new(false),
            fail_profile: AtomicBool::new(false),
            fail_notifications: AtomicBool::new(false),
            issued: AtomicU64::new(0),
            create_session_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            timeline_calls: AtomicUsize::new(0),
            profile_calls: AtomicUsize::new(0),
            notification_calls: AtomicUsize::new(0),
        }
    }

    /// Register an account (and its profile) that can sign in with `password`.
    pub fn with_account(self, handle: &str, password: &str) -> Self {
        let profile = author(handle);
        self.accounts.lock().insert(
            handle.to_ascii_lowercase(),
            FakeAccount {
                handle: handle.to_string(),
                did: profile.did.clone(),
                password: password.to_string(),
            },
        );
        self.with_profile(profile)
    }

    pub fn with_profile(self, profile: Author) -> Self {
        self.profiles
            .lock()
            .insert(profile.handle.to_ascii_lowercase(), profile);
        self
    }

    pub fn with_timeline(self, feed: Vec<FeedItem>, cursor: Option<&str>) -> Self {
        *self.timeline.lock() = TimelineResponse {
            feed,
            cursor: cursor.map(str::to_string),
        };
        self
    }

    pub fn with_notifications(self, notifications: Vec<Notification>, cursor: Option<&str>) -> Self {
        *self.notifications.lock() = NotificationsResponse {
            notifications,
            cursor: cursor.map(str::to_string),
            seen_at: None,
        };
        self
    }

    pub fn with_access_ttl(self, secs: i64) -> Self {
        self.set_access_ttl(secs);
        self
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        self.set_latency(Some(latency));
        self
    }

    pub fn set_access_ttl(&self, secs: i64) {
        self.access_ttl_secs.store(secs, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    /// Make `refreshSession` answer with this HTTP status.
    pub fn set_refresh_failure(&self, status: Option<u16>) {
        *self.refresh_failure.lock() = status;
    }

    pub fn set_timeline_failure(&self, fail: bool) {
        self.fail_timeline.store(fail, Ordering::SeqCst);
    }

    pub fn set_profile_failure(&self, fail: bool) {
        self.fail_profile.store(fail, Ordering::SeqCst);
    }

    pub fn set_notifications_failure(&self, fail: bool) {
        self.fail_notifications.store(fail, Ordering::SeqCst);
    }

    pub fn create_session_calls(&self) -> usize {
        self.create_session_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn timeline_calls(&self) -> usize {
        self.timeline_calls.load(Ordering::SeqCst)
    }

    pub fn profile_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }

    pub fn notification_calls(&self) -> usize {
        self.notification_calls.load(Ordering::SeqCst)
    }

    /// `(repo, post)` for every post created.
    pub fn posts(&self) -> Vec<(String, NewPost)> {
        self.posts.lock().clone()
    }

    pub fn seen_timeline_cursors(&self) -> Vec<Option<String>> {
        self.seen_timeline_cursors.lock().clone()
    }

    async fn delay(&self) {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn issue(&self, account: &FakeAccount) -> SessionTokens {
        let n = self.issued.fetch_add(1, Ordering::SeqCst);
        let ttl = self.access_ttl_secs.load(Ordering::SeqCst);
        let refresh_jwt = format!("refresh-{}-{n}", account.handle);
        self.refresh_tokens
            .lock()
            .insert(refresh_jwt.clone(), account.handle.to_ascii_lowercase());
        SessionTokens {
            access_jwt: fake_jwt(&account.did, ttl, n),
            refresh_jwt,
            handle: account.handle.clone(),
            did: account.did.clone(),
        }
    }

    fn rejected(method: &'static str, status: u16, error: &str, message: &str) -> ApiError {
        ApiError::Rejected {
            method,
            status,
            error: Some(error.to_string()),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl ApiClient for FakeApiClient {
    async fn create_session(&self, identifier: &str, password: &str) -> ApiResult<SessionTokens> {
        self.create_session_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;

        let account = self
            .accounts
            .lock()
            .get(&identifier.to_ascii_lowercase())
            .cloned();
        match account {
            Some(account) if account.password == password => Ok(self.issue(&account)),
            _ => Err(Self::rejected(
                "com.atproto.server.createSession",
                401,
                "AuthenticationRequired",
                "Invalid identifier or password",
            )),
        }
    }

    async fn refresh_session(&self, refresh_jwt: &str) -> ApiResult<SessionTokens> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;

        const METHOD: &str = "com.atproto.server.refreshSession";
        if let Some(status) = *self.refresh_failure.lock() {
            return Err(Self::rejected(METHOD, status, "ExpiredToken", "Token has expired"));
        }

        let Some(handle) = self.refresh_tokens.lock().remove(refresh_jwt) else {
            return Err(Self::rejected(METHOD, 400, "ExpiredToken", "Token has been revoked"));
        };
        let account = self.accounts.lock().get(&handle).cloned();
        match account {
            Some(account) => Ok(self.issue(&account)),
            None => Err(Self::rejected(METHOD, 400, "AccountNotFound", "Account not found")),
        }
    }

    async fn get_timeline(
        &self,
        _token: &str,
        cursor: Option<&str>,
        _limit: u8,
    ) -> ApiResult<TimelineResponse> {
        self.timeline_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_timeline_cursors
            .lock()
            .push(cursor.map(str::to_string));
        self.delay().await;

        if self.fail_timeline.load(Ordering::SeqCst) {
            let source = match serde_json::from_str::<TimelineResponse>("{\"feed\": [") {
                Err(e) => e,
                Ok(_) => unreachable!("truncated JSON parsed"),
            };
            return Err(ApiError::Deserialization {
                method: "app.bsky.feed.getTimeline",
                source,
            });
        }
        Ok(self.timeline.lock().clone())
    }

    async fn get_profile(&self, _token: &str, actor: &str) -> ApiResult<Author> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;

        const METHOD: &str = "app.bsky.actor.getProfile";
        if self.fail_profile.load(Ordering::SeqCst) {
            return Err(Self::rejected(METHOD, 502, "UpstreamFailure", "Upstream failure"));
        }
        self.profiles
            .lock()
            .get(&actor.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| Self::rejected(METHOD, 400, "InvalidRequest", "Profile not found"))
    }

    async fn list_notifications(
        &self,
        _token: &str,
        _cursor: Option<&str>,
        _limit: u8,
    ) -> ApiResult<NotificationsResponse> {
        self.notification_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;

        if self.fail_notifications.load(Ordering::SeqCst) {
            return Err(Self::rejected(
                "app.bsky.notification.listNotifications",
                500,
                "InternalServerError",
                "Internal Server Error",
            ));
        }
        Ok(self.notifications.lock().clone())
    }

    async fn create_post(&self, _token: &str, repo: &str, post: &NewPost) -> ApiResult<CreatedRecord> {
        self.delay().await;

        let mut posts = self.posts.lock();
        posts.push((repo.to_string(), post.clone()));
        Ok(CreatedRecord {
            uri: format!("at://{repo}/{POST_COLLECTION}/3k{}", posts.len()),
            cid: "bafyreipost".to_string(),
        })
    }
}

/// Telemetry sink that keeps everything it is given.
#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    events: Mutex<Vec<(String, Properties)>>,
    errors: Mutex<Vec<(String, Properties)>>,
}

impl RecordingTelemetry {
    pub fn events_named(&self, name: &str) -> Vec<Properties> {
        self.events
            .lock()
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, props)| props.clone())
            .collect()
    }

    pub fn event_count(&self, name: &str) -> usize {
        self.events_named(name).len()
    }

    pub fn error_count(&self) -> usize {
        self.errors.lock().len()
    }
}

impl Telemetry for RecordingTelemetry {
    fn track_event(&self, name: &str, properties: &Properties) {
        self.events
            .lock()
            .push((name.to_string(), properties.clone()));
    }

    fn track_error(&self, error: &(dyn std::error::Error + 'static), properties: &Properties) {
        self.errors
            .lock()
            .push((error.to_string(), properties.clone()));
    }
}
