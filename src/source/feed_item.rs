//! The core data type shared across all feed sources.
//!
//! `FeedItem` represents a single entry from any upstream (video platform,
//! microblog, podcast) or from the local comments table.  Every source
//! converts its native format into `FeedItem`s so the caches and the
//! paginator can stay source-agnostic.
//!
//! ## For contributors
//!
//! Source-specific extras (channel name, comment target, ...) are plain
//! optional fields rather than a per-platform payload.  The paginator never
//! looks at them; they only exist so the frontend can render richer cards.

use serde::{Deserialize, Serialize};

/// Which upstream produced an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Video,
    Microblog,
    Podcast,
    Comment,
}

/// A single feed entry, normalised from any data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    /// Source-unique identifier, when the source provides one.
    pub id: Option<String>,

    pub platform: Platform,

    /// Handle or account name of the author.
    pub author: String,

    /// Human-friendly author name, if different from `author`.
    pub author_display_name: Option<String>,

    pub author_avatar_url: Option<String>,

    /// Headline, for sources that have one (videos, episodes).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Body text.  Never empty: sources drop items without text.
    pub text: String,

    /// ISO-8601 publish time as the source reported it.
    ///
    /// Only ever compared against timestamps of the *same* source; the feed
    /// is never sorted across sources.
    pub timestamp: String,

    pub external_link: Option<String>,

    pub image_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,

    /// For comments: the author's user id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// For comments: what the comment was left on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
}

impl FeedItem {
    /// An item with only the required fields set.
    pub fn new(platform: Platform, author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: None,
            platform,
            author: author.into(),
            author_display_name: None,
            author_avatar_url: None,
            title: None,
            text: text.into(),
            timestamp: String::new(),
            external_link: None,
            image_url: None,
            channel_title: None,
            channel_id: None,
            user_id: None,
            target_id: None,
        }
    }
}

/// Sort newest first by the source-native timestamp.
///
/// ISO-8601 strings from a single source compare correctly as text.  The
/// sort is stable, so items sharing a timestamp keep their fetch order.
pub fn sort_newest_first(items: &mut [FeedItem]) {
    items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}
