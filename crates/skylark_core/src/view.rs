//! Presentation records built from API models.
//!
//! Views are plain data with everything a front-end needs already resolved
//! (display names, reply targets, media), plus a `Display` rendering for the
//! terminal.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::api::{Author, Embed, FeedItem, Notification, NotificationReason};

const ALT_TEXT_TRUNCATE: usize = 120;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorView {
    pub name: String,
    pub handle: String,
    pub avatar: Option<String>,
}

impl From<&Author> for AuthorView {
    fn from(author: &Author) -> Self {
        Self {
            name: author.name().to_string(),
            handle: author.handle.clone(),
            avatar: author.avatar.clone(),
        }
    }
}

impl fmt::Display for AuthorView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name == self.handle {
            write!(f, "@{}", self.handle)
        } else {
            write!(f, "{} (@{})", self.name, self.handle)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageView {
    pub thumb: String,
    pub fullsize: String,
    pub alt: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkView {
    pub uri: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteView {
    pub author: AuthorView,
    pub text: String,
    pub uri: String,
}

/// A feed entry ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItemView {
    pub uri: String,
    pub author: AuthorView,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub reposted_by: Option<AuthorView>,
    pub replying_to: Option<AuthorView>,
    pub images: Vec<ImageView>,
    pub link: Option<LinkView>,
    pub quote: Option<QuoteView>,
    pub reply_count: u64,
    pub repost_count: u64,
    pub like_count: u64,
}

impl FeedItemView {
    pub fn from_item(item: &FeedItem) -> Self {
        let post = &item.post;
        let link = match &post.embed {
            Some(Embed::External { external }) => Some(LinkView {
                uri: external.uri.clone(),
                title: external.title.clone(),
            }),
            _ => None,
        };

        Self {
            uri: post.uri.clone(),
            author: AuthorView::from(&post.author),
            text: post.record.text.clone(),
            created_at: post.record.created_at,
            reposted_by: item.reposted_by().map(AuthorView::from),
            replying_to: item.reply_parent_author().map(AuthorView::from),
            images: item
                .images()
                .iter()
                .map(|img| ImageView {
                    thumb: img.thumb.clone(),
                    fullsize: img.fullsize.clone(),
                    alt: img.alt.clone(),
                })
                .collect(),
            link,
            quote: item.quoted().map(|quoted| QuoteView {
                author: AuthorView::from(&quoted.author),
                text: quoted.text().unwrap_or_default().to_string(),
                uri: quoted.uri.clone(),
            }),
            reply_count: post.reply_count,
            repost_count: post.repost_count,
            like_count: post.like_count,
        }
    }
}

impl fmt::Display for FeedItemView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(by) = &self.reposted_by {
            writeln!(f, "🔁 reposted by {by}")?;
        }

        let header = format!(
            "┌─ {} · {}",
            self.author,
            self.created_at.format("%Y-%m-%d %H:%M")
        );
        writeln!(f, "{header}")?;

        if let Some(parent) = &self.replying_to {
            writeln!(f, "│ ↩ replying to {parent}")?;
        }
        if !self.text.is_empty() {
            writeln!(f, "{}", indent_multiline(&self.text, "│ ", "│ "))?;
        }

        if !self.images.is_empty() {
            writeln!(f, "│ [📸 {} image(s)]", self.images.len())?;
            for img in &self.images {
                if img.alt.is_empty() {
                    writeln!(f, "│  (img: {})", img.thumb)?;
                } else {
                    let (alt, truncated) = truncate(&img.alt, ALT_TEXT_TRUNCATE);
                    let ellipsis = if truncated { "..." } else { "" };
                    writeln!(f, "│  alt: {alt}{ellipsis}")?;
                }
            }
        }

        if let Some(link) = &self.link {
            if link.title.is_empty() {
                writeln!(f, "│ [🔗 {}]", link.uri)?;
            } else {
                writeln!(f, "│ [🔗 {}] {}", link.title, link.uri)?;
            }
        }

        if let Some(quote) = &self.quote {
            writeln!(f, "│ ┌─ Quote {}", quote.author)?;
            writeln!(f, "{}", indent_multiline(&quote.text, "│ │ ", "│ │ "))?;
        }

        write!(
            f,
            "└─ 💬 {}  🔁 {}  ♥ {}",
            self.reply_count, self.repost_count, self.like_count
        )
    }
}

/// A notification ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationView {
    pub author: AuthorView,
    pub reason: NotificationReason,
    pub text: Option<String>,
    pub subject: Option<String>,
    pub is_read: bool,
    pub indexed_at: DateTime<Utc>,
}

impl NotificationView {
    pub fn from_notification(notification: &Notification) -> Self {
        Self {
            author: AuthorView::from(&notification.author),
            reason: notification.reason.clone(),
            text: notification.text().map(str::to_string),
            subject: notification.reason_subject.clone(),
            is_read: notification.is_read,
            indexed_at: notification.indexed_at,
        }
    }

    pub fn action(&self) -> &'static str {
        match self.reason {
            NotificationReason::Like => "liked your post",
            NotificationReason::Repost => "reposted your post",
            NotificationReason::Follow => "followed you",
            NotificationReason::Mention => "mentioned you",
            NotificationReason::Reply => "replied to you",
            NotificationReason::Quote => "quoted your post",
            NotificationReason::Other => "interacted with you",
        }
    }

    fn icon(&self) -> &'static str {
        match self.reason {
            NotificationReason::Like => "♥",
            NotificationReason::Repost => "🔁",
            NotificationReason::Follow => "➕",
            NotificationReason::Mention => "@",
            NotificationReason::Reply => "↩",
            NotificationReason::Quote => "❝",
            NotificationReason::Other => "•",
        }
    }
}

impl fmt::Display for NotificationView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unread = if self.is_read { " " } else { "*" };
        write!(
            f,
            "{unread}{} {} {} · {}",
            self.icon(),
            self.author,
            self.action(),
            self.indexed_at.format("%Y-%m-%d %H:%M")
        )?;
        if let Some(text) = self.text.as_deref().filter(|t| !t.is_empty()) {
            write!(f, "\n{}", indent_multiline(text, "    ", "    "))?;
        }
        Ok(())
    }
}

/// Prefix every line of `text`, using `first_prefix` for the first one.
fn indent_multiline(text: &str, first_prefix: &str, continuation_prefix: &str) -> String {
    let mut result = String::new();
    for (i, line) in text.lines().enumerate() {
        if i > 0 {
            result.push('\n');
            result.push_str(continuation_prefix);
        } else {
            result.push_str(first_prefix);
        }
        result.push_str(line);
    }
    result
}

fn truncate(text: &str, max_bytes: usize) -> (&str, bool) {
    if text.len() <= max_bytes {
        return (text, false);
    }
    let boundary = text
        .char_indices()
        .take_while(|(i, _)| *i < max_bytes)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    (&text[..boundary], true)
}
