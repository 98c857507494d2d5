//! Podcast RSS source.
//!
//! Pulls a single RSS 2.0 feed and turns each episode into a
//! [`FeedItem`].  Unlike the other sources, a parse failure is reported as
//! [`FetchError::Malformed`] rather than folded into a transport error, so
//! `/podcast` can tell "the host is down" apart from "the feed is broken".

use async_trait::async_trait;
use chrono::DateTime;

use super::{DataSource, FeedItem, Platform};
use crate::error::FetchError;

/// A podcast feed data source.
pub struct PodcastSource {
    client: reqwest::Client,
    /// The feed URL to poll.
    url: String,
}

impl PodcastSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Parse raw feed bytes into episodes.
    ///
    /// This is a pure function (no I/O) so that tests can exercise the
    /// parsing logic without hitting the network.
    pub fn parse_feed(body: &[u8]) -> Result<Vec<FeedItem>, FetchError> {
        let channel =
            rss::Channel::read_from(body).map_err(|e| FetchError::Malformed(e.to_string()))?;
        Ok(Self::parse_channel(&channel))
    }

    /// Convert an already-parsed [`rss::Channel`] into [`FeedItem`]s, in
    /// feed order.
    pub fn parse_channel(channel: &rss::Channel) -> Vec<FeedItem> {
        let show = channel.title();
        let artwork = channel.image().map(|img| img.url().to_string());

        channel
            .items()
            .iter()
            .filter_map(|item| {
                let title = item.title().map(str::to_string);

                // Episodes with neither notes nor a title have nothing to show.
                let text = item
                    .description()
                    .filter(|d| !d.trim().is_empty())
                    .map(str::to_string)
                    .or_else(|| title.clone())?;

                let id = item
                    .guid()
                    .map(|g| g.value().to_string())
                    .or_else(|| item.link().map(String::from));

                // RFC-2822 in the feed; store RFC-3339 like every other source.
                // Unparseable dates are kept verbatim.
                let timestamp = item
                    .pub_date()
                    .map(|d| {
                        DateTime::parse_from_rfc2822(d)
                            .map(|dt| dt.to_rfc3339())
                            .unwrap_or_else(|_| d.to_string())
                    })
                    .unwrap_or_default();

                let external_link = item
                    .link()
                    .map(String::from)
                    .or_else(|| item.enclosure().map(|e| e.url().to_string()));

                let mut episode = FeedItem::new(Platform::Podcast, show, text);
                episode.id = id;
                episode.title = title;
                episode.timestamp = timestamp;
                episode.external_link = external_link;
                episode.image_url = artwork.clone();
                episode.channel_title = Some(show.to_string());
                Some(episode)
            })
            .collect()
    }
}

#[async_trait]
impl DataSource for PodcastSource {
    fn name(&self) -> &str {
        "podcast"
    }

    async fn fetch(&self) -> Result<Vec<FeedItem>, FetchError> {
        let body = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        let episodes = Self::parse_feed(&body)?;
        tracing::debug!(episodes = episodes.len(), url = %self.url, "parsed podcast feed");
        Ok(episodes)
    }
}
