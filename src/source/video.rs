//! Video platform source.
//!
//! Resolves the uploads playlist of a primary channel and a "clips" channel,
//! lists the latest [`BATCH_SIZE`] uploads of each, and merges both lists
//! newest first.

use async_trait::async_trait;
use serde::Deserialize;

use super::{sort_newest_first, DataSource, FeedItem, Platform};
use crate::error::FetchError;

/// Maximum uploads pulled per channel on each refresh.
pub const BATCH_SIZE: u32 = 50;

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

// -- upstream payloads -------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChannelList {
    #[serde(default)]
    items: Vec<Channel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Channel {
    content_details: ChannelContentDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelContentDetails {
    related_playlists: RelatedPlaylists,
}

#[derive(Debug, Deserialize)]
struct RelatedPlaylists {
    uploads: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlaylistItems {
    #[serde(default)]
    pub items: Vec<PlaylistItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItem {
    #[serde(default)]
    pub snippet: Snippet,
    #[serde(default)]
    pub content_details: ItemContentDetails,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    pub title: Option<String>,
    pub description: Option<String>,
    pub published_at: Option<String>,
    pub channel_title: Option<String>,
    pub channel_id: Option<String>,
    pub resource_id: Option<ResourceId>,
    pub thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceId {
    pub video_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Thumbnails {
    pub high: Option<Thumbnail>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Thumbnail {
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemContentDetails {
    pub video_id: Option<String>,
}

// -- source ------------------------------------------------------------------

pub struct VideoSource {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    channel_id: String,
    clips_channel_id: String,
}

impl VideoSource {
    pub fn new(
        client: reqwest::Client,
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        channel_id: impl Into<String>,
        clips_channel_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            channel_id: channel_id.into(),
            clips_channel_id: clips_channel_id.into(),
        }
    }

    async fn uploads_playlist_id(&self, channel_id: &str) -> Result<String, FetchError> {
        let channels: ChannelList = self
            .client
            .get(format!("{}/channels", self.api_base))
            .query(&[
                ("part", "contentDetails"),
                ("id", channel_id),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        channels
            .items
            .into_iter()
            .next()
            .map(|c| c.content_details.related_playlists.uploads)
            .ok_or_else(|| FetchError::Malformed(format!("no channel found for id {channel_id}")))
    }

    async fn playlist_items(&self, playlist_id: &str) -> Result<PlaylistItems, FetchError> {
        let max_results = BATCH_SIZE.to_string();
        let listing = self
            .client
            .get(format!("{}/playlistItems", self.api_base))
            .query(&[
                ("part", "snippet,contentDetails"),
                ("maxResults", max_results.as_str()),
                ("playlistId", playlist_id),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(listing)
    }

    /// Normalise one playlist listing, dropping entries without an id or a
    /// title.
    pub fn parse_playlist(listing: PlaylistItems) -> Vec<FeedItem> {
        listing
            .items
            .into_iter()
            .filter_map(|entry| {
                let snippet = entry.snippet;
                let video_id = entry
                    .content_details
                    .video_id
                    .or_else(|| snippet.resource_id.and_then(|r| r.video_id))
                    .filter(|id| !id.is_empty())?;
                let title = snippet.title.filter(|t| !t.is_empty())?;

                let text = snippet
                    .description
                    .filter(|d| !d.trim().is_empty())
                    .unwrap_or_else(|| title.clone());
                let author = snippet.channel_title.clone().unwrap_or_default();

                let mut video = FeedItem::new(Platform::Video, author, text);
                video.external_link = Some(format!("{WATCH_URL}{video_id}"));
                video.id = Some(video_id);
                video.title = Some(title);
                video.timestamp = snippet.published_at.unwrap_or_default();
                video.image_url = snippet.thumbnails.and_then(|t| t.high).and_then(|t| t.url);
                video.channel_title = snippet.channel_title;
                video.channel_id = snippet.channel_id;
                Some(video)
            })
            .collect()
    }

    /// Concatenate per-channel batches (primary first) and sort newest
    /// first.  Ties keep concatenation order.
    pub fn combine(batches: Vec<Vec<FeedItem>>) -> Vec<FeedItem> {
        let mut combined: Vec<FeedItem> = batches.into_iter().flatten().collect();
        sort_newest_first(&mut combined);
        combined
    }
}

#[async_trait]
impl DataSource for VideoSource {
    fn name(&self) -> &str {
        "video"
    }

    async fn fetch(&self) -> Result<Vec<FeedItem>, FetchError> {
        // Without both playlists the merged order would be misleading, so a
        // lookup failure fails the whole refresh.
        let playlists = [
            self.uploads_playlist_id(&self.channel_id).await?,
            self.uploads_playlist_id(&self.clips_channel_id).await?,
        ];

        let mut batches = Vec::with_capacity(playlists.len());
        for playlist_id in &playlists {
            match self.playlist_items(playlist_id).await {
                Ok(listing) => batches.push(Self::parse_playlist(listing)),
                Err(e) => {
                    tracing::warn!(playlist = %playlist_id, error = %e, "failed to list playlist");
                }
            }
        }

        if batches.is_empty() {
            return Err(FetchError::Exhausted(self.name().to_string()));
        }

        Ok(Self::combine(batches))
    }
}
