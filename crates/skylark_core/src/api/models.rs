//! Wire records for the XRPC endpoints the client consumes.
//!
//! Field names follow the `app.bsky` / `com.atproto` lexicons (camelCase on the
//! wire). Union members are discriminated by their `$type`; members the client
//! does not understand deserialize into an `Unknown`/`Other` variant instead of
//! failing the whole page.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Collection NSID for posts.
pub const POST_COLLECTION: &str = "app.bsky.feed.post";

/// An account identity as returned by profile views.
///
/// Immutable once fetched; a refresh replaces the whole value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub did: String,
    pub handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followers_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follows_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posts_count: Option<u64>,
}

impl Author {
    /// Display name when set and non-blank, otherwise the handle.
    pub fn name(&self) -> &str {
        self.display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.handle)
    }

    /// Handles are unique network-wide and compare case-insensitively.
    pub fn has_handle(&self, handle: &str) -> bool {
        self.handle.eq_ignore_ascii_case(handle)
    }
}

/// A reference to a specific version of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrongRef {
    pub uri: String,
    pub cid: String,
}

/// Reply pointers stored inside a post record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRecord {
    pub root: StrongRef,
    pub parent: StrongRef,
}

/// The `app.bsky.feed.post` record body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedRecord {
    #[serde(rename = "$type", default)]
    pub record_type: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<ReplyRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub langs: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageEmbed {
    pub thumb: String,
    pub fullsize: String,
    #[serde(default)]
    pub alt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalEmbed {
    pub uri: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumb: Option<String>,
}

/// A post quoted by another post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotedPost {
    pub uri: String,
    pub cid: String,
    pub author: Author,
    /// The quoted record body; usually an `app.bsky.feed.post`.
    #[serde(default)]
    pub value: serde_json::Value,
    pub indexed_at: DateTime<Utc>,
}

impl QuotedPost {
    pub fn text(&self) -> Option<&str> {
        self.value.get("text").and_then(serde_json::Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$type")]
pub enum EmbeddedRecord {
    #[serde(rename = "app.bsky.embed.record#viewRecord")]
    Post(Box<QuotedPost>),
    #[serde(rename = "app.bsky.embed.record#viewNotFound")]
    NotFound { uri: String },
    #[serde(rename = "app.bsky.embed.record#viewBlocked")]
    Blocked { uri: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordEmbedView {
    pub record: EmbeddedRecord,
}

/// Hydrated embed attached to a post view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$type")]
pub enum Embed {
    #[serde(rename = "app.bsky.embed.images#view")]
    Images { images: Vec<ImageEmbed> },
    #[serde(rename = "app.bsky.embed.external#view")]
    External { external: ExternalEmbed },
    #[serde(rename = "app.bsky.embed.record#view")]
    Record { record: EmbeddedRecord },
    #[serde(rename = "app.bsky.embed.recordWithMedia#view")]
    RecordWithMedia {
        record: RecordEmbedView,
        media: Box<Embed>,
    },
    #[serde(rename = "app.bsky.embed.video#view")]
    Video {
        playlist: String,
        #[serde(default)]
        thumbnail: Option<String>,
        #[serde(default)]
        alt: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

impl Embed {
    /// Images carried by this embed, including the media half of a quote-with-media.
    pub fn images(&self) -> &[ImageEmbed] {
        match self {
            Embed::Images { images } => images,
            Embed::RecordWithMedia { media, .. } => media.images(),
            _ => &[],
        }
    }

    /// The quoted post, when this embed is a visible quote.
    pub fn quoted(&self) -> Option<&QuotedPost> {
        let record = match self {
            Embed::Record { record } => record,
            Embed::RecordWithMedia { record, .. } => &record.record,
            _ => return None,
        };
        match record {
            EmbeddedRecord::Post(post) => Some(post),
            _ => None,
        }
    }
}

/// A hydrated post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub uri: String,
    pub cid: String,
    pub author: Author,
    pub record: FeedRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed: Option<Embed>,
    #[serde(default)]
    pub reply_count: u64,
    #[serde(default)]
    pub repost_count: u64,
    #[serde(default)]
    pub like_count: u64,
    pub indexed_at: DateTime<Utc>,
}

/// One side (root or parent) of a reply context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$type")]
pub enum ReplyPost {
    #[serde(rename = "app.bsky.feed.defs#postView")]
    Post(Box<PostView>),
    #[serde(rename = "app.bsky.feed.defs#notFoundPost")]
    NotFound { uri: String },
    #[serde(rename = "app.bsky.feed.defs#blockedPost")]
    Blocked { uri: String },
    #[serde(other)]
    Unknown,
}

impl ReplyPost {
    /// The author, present only for visible posts.
    pub fn author(&self) -> Option<&Author> {
        match self {
            ReplyPost::Post(post) => Some(&post.author),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyContext {
    pub root: ReplyPost,
    pub parent: ReplyPost,
}

/// Why an item appears in a feed other than being authored by a followed account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$type", rename_all_fields = "camelCase")]
pub enum FeedReason {
    #[serde(rename = "app.bsky.feed.defs#reasonRepost")]
    Repost {
        by: Author,
        indexed_at: DateTime<Utc>,
    },
    #[serde(rename = "app.bsky.feed.defs#reasonPin")]
    Pin,
    #[serde(other)]
    Unknown,
}

/// A post or repost entry in a feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub post: PostView,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<ReplyContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<FeedReason>,
}

impl FeedItem {
    pub fn author(&self) -> &Author {
        &self.post.author
    }

    pub fn text(&self) -> &str {
        &self.post.record.text
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.post.record.created_at
    }

    /// Author of the post this item replies to, if the parent is visible.
    pub fn reply_parent_author(&self) -> Option<&Author> {
        self.reply.as_ref().and_then(|reply| reply.parent.author())
    }

    pub fn images(&self) -> &[ImageEmbed] {
        self.post.embed.as_ref().map(Embed::images).unwrap_or(&[])
    }

    pub fn quoted(&self) -> Option<&QuotedPost> {
        self.post.embed.as_ref().and_then(Embed::quoted)
    }

    /// The account that reposted this item into the feed.
    pub fn reposted_by(&self) -> Option<&Author> {
        match &self.reason {
            Some(FeedReason::Repost { by, .. }) => Some(by),
            _ => None,
        }
    }
}

/// `app.bsky.feed.getTimeline` output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimelineResponse {
    #[serde(default)]
    pub feed: Vec<FeedItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationReason {
    Like,
    Repost,
    Follow,
    Mention,
    Reply,
    Quote,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub uri: String,
    pub cid: String,
    pub author: Author,
    pub reason: NotificationReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_subject: Option<String>,
    #[serde(default)]
    pub record: serde_json::Value,
    #[serde(default)]
    pub is_read: bool,
    pub indexed_at: DateTime<Utc>,
}

impl Notification {
    /// Text of the notifying record, for replies, mentions and quotes.
    pub fn text(&self) -> Option<&str> {
        self.record.get("text").and_then(serde_json::Value::as_str)
    }
}

/// `app.bsky.notification.listNotifications` output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationsResponse {
    #[serde(default)]
    pub notifications: Vec<Notification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seen_at: Option<DateTime<Utc>>,
}

/// Tokens issued by `createSession` / `refreshSession`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokens {
    pub access_jwt: String,
    pub refresh_jwt: String,
    pub handle: String,
    pub did: String,
}

impl std::fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokens")
            .field("handle", &self.handle)
            .field("did", &self.did)
            .field("access_jwt", &"[REDACTED]")
            .field("refresh_jwt", &"[REDACTED]")
            .finish()
    }
}

/// A post to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub langs: Vec<String>,
}

impl NewPost {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            created_at: Utc::now(),
            langs: Vec::new(),
        }
    }

    /// The record body as written to the repository.
    pub fn to_record(&self) -> FeedRecord {
        FeedRecord {
            record_type: POST_COLLECTION.to_string(),
            created_at: self.created_at,
            text: self.text.clone(),
            reply: None,
            langs: (!self.langs.is_empty()).then(|| self.langs.clone()),
        }
    }
}

/// `com.atproto.repo.createRecord` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedRecord {
    pub uri: String,
    pub cid: String,
}

/// Error body returned by XRPC endpoints on non-2xx responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct XrpcErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn author_json(handle: &str) -> serde_json::Value {
        json!({ "did": format!("did:plc:{}", handle.replace('.', "")), "handle": handle })
    }

    fn post_json(handle: &str, text: &str) -> serde_json::Value {
        json!({
            "$type": "app.bsky.feed.defs#postView",
            "uri": format!("at://{handle}/app.bsky.feed.post/1"),
            "cid": "bafy",
            "author": author_json(handle),
            "record": {
                "$type": "app.bsky.feed.post",
                "createdAt": "2024-05-01T12:00:00.000Z",
                "text": text,
            },
            "indexedAt": "2024-05-01T12:00:01.000Z",
        })
    }

    #[test]
    fn test_feed_item_with_visible_reply_parent() {
        let item: FeedItem = serde_json::from_value(json!({
            "post": post_json("bob.example", "hi alice"),
            "reply": {
                "root": post_json("alice.example", "root"),
                "parent": post_json("alice.example", "parent"),
            },
        }))
        .unwrap();

        assert_eq!(item.text(), "hi alice");
        assert_eq!(
            item.reply_parent_author().map(|a| a.handle.as_str()),
            Some("alice.example")
        );
    }

    #[test]
    fn test_blocked_and_unknown_parents_have_no_author() {
        let blocked: ReplyPost = serde_json::from_value(json!({
            "$type": "app.bsky.feed.defs#blockedPost",
            "uri": "at://x/app.bsky.feed.post/2",
            "blocked": true,
            "author": { "did": "did:plc:x" },
        }))
        .unwrap();
        assert!(blocked.author().is_none());

        let unknown: ReplyPost =
            serde_json::from_value(json!({ "$type": "app.bsky.feed.defs#somethingNew" })).unwrap();
        assert_eq!(unknown, ReplyPost::Unknown);
    }

    #[test]
    fn test_repost_reason_and_quote_with_media() {
        let mut post = post_json("carol.example", "look");
        post["embed"] = json!({
            "$type": "app.bsky.embed.recordWithMedia#view",
            "record": {
                "record": {
                    "$type": "app.bsky.embed.record#viewRecord",
                    "uri": "at://dave/app.bsky.feed.post/3",
                    "cid": "bafq",
                    "author": author_json("dave.example"),
                    "value": { "text": "quoted words" },
                    "indexedAt": "2024-05-01T11:00:00Z",
                }
            },
            "media": {
                "$type": "app.bsky.embed.images#view",
                "images": [{ "thumb": "t", "fullsize": "f", "alt": "a cat" }],
            },
        });

        let item: FeedItem = serde_json::from_value(json!({
            "post": post,
            "reason": {
                "$type": "app.bsky.feed.defs#reasonRepost",
                "by": author_json("erin.example"),
                "indexedAt": "2024-05-01T13:00:00Z",
            },
        }))
        .unwrap();

        assert_eq!(item.images().len(), 1);
        assert_eq!(item.images()[0].alt, "a cat");
        assert_eq!(item.quoted().and_then(QuotedPost::text), Some("quoted words"));
        assert_eq!(
            item.reposted_by().map(|a| a.handle.as_str()),
            Some("erin.example")
        );
    }

    #[test]
    fn test_unknown_embed_does_not_fail_the_item() {
        let mut post = post_json("carol.example", "new embed kind");
        post["embed"] = json!({ "$type": "app.bsky.embed.hologram#view", "depth": 3 });

        let item: FeedItem = serde_json::from_value(json!({ "post": post })).unwrap();
        assert_eq!(item.post.embed, Some(Embed::Unknown));
        assert!(item.images().is_empty());
    }

    #[test]
    fn test_timeline_response_tolerates_missing_fields() {
        let response: TimelineResponse = serde_json::from_str("{}").unwrap();
        assert!(response.feed.is_empty());
        assert!(response.cursor.is_none());
    }

    #[test]
    fn test_notification_reasons() {
        let reasons: Vec<NotificationReason> =
            serde_json::from_value(json!(["like", "reply", "starterpack-joined"])).unwrap();
        assert_eq!(
            reasons,
            vec![
                NotificationReason::Like,
                NotificationReason::Reply,
                NotificationReason::Other
            ]
        );
    }

    #[test]
    fn test_author_name_falls_back_to_handle() {
        let mut author: Author = serde_json::from_value(author_json("alice.example")).unwrap();
        assert_eq!(author.name(), "alice.example");

        author.display_name = Some("   ".to_string());
        assert_eq!(author.name(), "alice.example");

        author.display_name = Some("Alice".to_string());
        assert_eq!(author.name(), "Alice");
        assert!(author.has_handle("ALICE.example"));
    }

    #[test]
    fn test_new_post_record_shape() {
        let post = NewPost::new("hello world");
        let value = serde_json::to_value(post.to_record()).unwrap();

        assert_eq!(value["$type"], "app.bsky.feed.post");
        assert_eq!(value["text"], "hello world");
        assert!(value.get("createdAt").is_some());
        assert!(value.get("reply").is_none());
        assert!(value.get("langs").is_none());
    }

    #[test]
    fn test_session_tokens_debug_redacts_jwts() {
        let tokens = SessionTokens {
            access_jwt: "aaa.bbb.ccc".to_string(),
            refresh_jwt: "ddd.eee.fff".to_string(),
            handle: "alice.example".to_string(),
            did: "did:plc:alice".to_string(),
        };
        let rendered = format!("{tokens:?}");
        assert!(!rendered.contains("aaa.bbb"));
        assert!(!rendered.contains("ddd.eee"));
    }
}
