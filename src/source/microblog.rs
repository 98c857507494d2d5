//! Microblog source.
//!
//! Pulls the latest [`BATCH_SIZE`] posts of each configured handle from the
//! public author-feed endpoint.  Only original, top-level posts with text are
//! kept.  Handles are concatenated in configuration order; there is no
//! cross-handle sort.

use async_trait::async_trait;
use serde::Deserialize;

use super::{DataSource, FeedItem, Platform};
use crate::error::FetchError;

/// Maximum posts pulled per handle on each refresh.
pub const BATCH_SIZE: u32 = 100;

const REPOST_REASON: &str = "app.bsky.feed.defs#reasonRepost";

// -- upstream payloads -------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct AuthorFeed {
    #[serde(default)]
    pub feed: Vec<FeedViewPost>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedViewPost {
    #[serde(default)]
    pub post: PostView,
    /// Present when the entry is a repost (or a pin) rather than an
    /// original post.
    pub reason: Option<Reason>,
    /// Older responses flag reposts with a bare `reasonType`.
    pub reason_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Reason {
    #[serde(rename = "$type", default)]
    pub kind: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PostView {
    pub uri: Option<String>,
    #[serde(default)]
    pub author: Author,
    #[serde(default)]
    pub record: PostRecord,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub handle: Option<String>,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    pub text: Option<String>,
    pub created_at: Option<String>,
    pub reply: Option<serde_json::Value>,
}

impl FeedViewPost {
    fn has_text(&self) -> bool {
        self.post
            .record
            .text
            .as_deref()
            .is_some_and(|t| !t.is_empty())
    }

    fn is_repost(&self) -> bool {
        self.reason.as_ref().is_some_and(|r| r.kind == REPOST_REASON)
            || self.reason_type.as_deref() == Some("repost")
    }

    fn is_reply(&self) -> bool {
        self.post.record.reply.as_ref().is_some_and(|r| !r.is_null())
    }
}

// -- source ------------------------------------------------------------------

pub struct MicroblogSource {
    client: reqwest::Client,
    api_base: String,
    handles: Vec<String>,
}

impl MicroblogSource {
    pub fn new(client: reqwest::Client, api_base: impl Into<String>, handles: Vec<String>) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            handles,
        }
    }

    async fn author_feed(&self, handle: &str) -> Result<AuthorFeed, FetchError> {
        let limit = BATCH_SIZE.to_string();
        let feed = self
            .client
            .get(format!("{}/xrpc/app.bsky.feed.getAuthorFeed", self.api_base))
            .query(&[("actor", handle), ("limit", limit.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(feed)
    }

    /// Keep original top-level posts with text, in feed order.
    pub fn parse_author_feed(feed: AuthorFeed, handle: &str) -> Vec<FeedItem> {
        feed.feed
            .into_iter()
            .filter(FeedViewPost::has_text)
            .filter(|entry| !entry.is_repost())
            .filter(|entry| !entry.is_reply())
            .map(|entry| {
                let post = entry.post;
                let author = post.author.handle.unwrap_or_else(|| handle.to_string());
                let text = post.record.text.unwrap_or_default();

                let mut item = FeedItem::new(Platform::Microblog, author.as_str(), text);
                item.external_link = post.uri.as_deref().and_then(|uri| web_link(&author, uri));
                item.id = post.uri;
                item.author_display_name = post.author.display_name;
                item.author_avatar_url = post.author.avatar;
                item.timestamp = post.record.created_at.unwrap_or_default();
                item
            })
            .collect()
    }
}

/// `at://did/app.bsky.feed.post/<rkey>` -> `https://bsky.app/profile/<handle>/post/<rkey>`
fn web_link(handle: &str, uri: &str) -> Option<String> {
    let rkey = uri.rsplit('/').next().filter(|k| !k.is_empty())?;
    Some(format!("https://bsky.app/profile/{handle}/post/{rkey}"))
}

#[async_trait]
impl DataSource for MicroblogSource {
    fn name(&self) -> &str {
        "microblog"
    }

    async fn fetch(&self) -> Result<Vec<FeedItem>, FetchError> {
        let mut posts = Vec::new();
        let mut failures = 0;

        for handle in &self.handles {
            match self.author_feed(handle).await {
                Ok(feed) => posts.extend(Self::parse_author_feed(feed, handle)),
                Err(e) => {
                    failures += 1;
                    tracing::warn!(handle = %handle, error = %e, "failed to fetch author feed");
                }
            }
        }

        if failures > 0 && failures == self.handles.len() {
            return Err(FetchError::Exhausted(self.name().to_string()));
        }

        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn post(rkey: &str, text: &str) -> serde_json::Value {
        json!({
            "post": {
                "uri": format!("at://did:plc:abc/app.bsky.feed.post/{rkey}"),
                "author": {
                    "handle": "someone.bsky.social",
                    "displayName": "Some One",
                    "avatar": "https://cdn/avatar.jpg"
                },
                "record": { "text": text, "createdAt": "2025-01-01T00:00:00Z" }
            }
        })
    }

    fn mixed_feed() -> serde_json::Value {
        let mut reply = post("r", "yo");
        reply["post"]["record"]["reply"] = json!({ "parent": { "uri": "at://x" } });

        let mut repost = post("p", "ok");
        repost["reason"] = json!({ "$type": "app.bsky.feed.defs#reasonRepost" });

        json!({ "feed": [post("h", "hi"), post("e", ""), reply, repost] })
    }

    #[test]
    fn excludes_empty_replies_and_reposts() {
        let feed: AuthorFeed = serde_json::from_value(mixed_feed()).unwrap();
        let items = MicroblogSource::parse_author_feed(feed, "someone.bsky.social");

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "hi");
    }

    #[test]
    fn legacy_reason_type_counts_as_repost() {
        let mut repost = post("p", "ok");
        repost["reasonType"] = json!("repost");
        let feed: AuthorFeed = serde_json::from_value(json!({ "feed": [repost] })).unwrap();

        assert!(MicroblogSource::parse_author_feed(feed, "h").is_empty());
    }

    #[test]
    fn pinned_posts_are_not_reposts() {
        let mut pinned = post("p", "pinned");
        pinned["reason"] = json!({ "$type": "app.bsky.feed.defs#reasonPin" });
        let feed: AuthorFeed = serde_json::from_value(json!({ "feed": [pinned] })).unwrap();

        assert_eq!(MicroblogSource::parse_author_feed(feed, "h").len(), 1);
    }

    #[test]
    fn normalises_author_and_link() {
        let feed: AuthorFeed = serde_json::from_value(json!({ "feed": [post("3k2", "hello")] })).unwrap();
        let item = &MicroblogSource::parse_author_feed(feed, "fallback")[0];

        assert_eq!(item.platform, Platform::Microblog);
        assert_eq!(item.author, "someone.bsky.social");
        assert_eq!(item.author_display_name.as_deref(), Some("Some One"));
        assert_eq!(item.author_avatar_url.as_deref(), Some("https://cdn/avatar.jpg"));
        assert_eq!(item.timestamp, "2025-01-01T00:00:00Z");
        assert_eq!(
            item.external_link.as_deref(),
            Some("https://bsky.app/profile/someone.bsky.social/post/3k2")
        );
    }

    #[test]
    fn missing_author_handle_uses_queried_handle() {
        let feed: AuthorFeed = serde_json::from_value(json!({
            "feed": [{ "post": { "record": { "text": "bare" } } }]
        }))
        .unwrap();
        let items = MicroblogSource::parse_author_feed(feed, "queried.bsky.social");

        assert_eq!(items[0].author, "queried.bsky.social");
        assert!(items[0].id.is_none());
        assert!(items[0].external_link.is_none());
    }

    #[tokio::test]
    async fn fetch_keeps_handle_order_and_skips_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/xrpc/app.bsky.feed.getAuthorFeed"))
            .and(query_param("actor", "first"))
            .and(query_param("limit", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "feed": [post("a", "from first")]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("actor", "broken"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/xrpc/app.bsky.feed.getAuthorFeed"))
            .and(query_param("actor", "second"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "feed": [post("b", "from second")]
            })))
            .mount(&server)
            .await;

        let source = MicroblogSource::new(
            reqwest::Client::new(),
            server.uri(),
            vec!["first".into(), "broken".into(), "second".into()],
        );
        let items = source.fetch().await.unwrap();

        let texts: Vec<_> = items.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, ["from first", "from second"]);
    }

    #[tokio::test]
    async fn fetch_fails_when_every_handle_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let source = MicroblogSource::new(reqwest::Client::new(), server.uri(), vec!["only".into()]);
        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, FetchError::Exhausted(_)), "got {err:?}");
    }
}
