//! Configuration management.
//!
//! Everything comes from environment variables; `main` loads an optional
//! `.env` first.  Numeric values that fail to parse are errors, not
//! silently replaced by defaults.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub feed: FeedConfig,
    pub upstream: UpstreamConfig,
    /// `None` when the video credentials are not all set.
    pub video: Option<VideoConfig>,
    pub microblog: MicroblogConfig,
    pub podcast: PodcastConfig,
    pub intervals: RefreshIntervals,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Page geometry of `/feed`.
#[derive(Debug, Clone, Copy)]
pub struct FeedConfig {
    /// Items each lane contributes to one page.
    pub per_source: usize,
    pub max_pages: u32,
}

impl FeedConfig {
    /// How many comments the comments cache mirrors.
    pub fn comments_limit(&self) -> usize {
        self.per_source.saturating_mul(self.max_pages as usize)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UpstreamConfig {
    /// Per outbound HTTP call (and per database acquire).
    pub request_timeout: Duration,
    /// Per whole refresh of one source.
    pub refresh_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct VideoConfig {
    pub api_base: String,
    pub api_key: String,
    pub channel_id: String,
    pub clips_channel_id: String,
}

#[derive(Debug, Clone)]
pub struct MicroblogConfig {
    pub api_base: String,
    pub handles: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PodcastConfig {
    pub feed_url: String,
}

#[derive(Debug, Clone, Copy)]
pub struct RefreshIntervals {
    pub video: Duration,
    pub microblog: Duration,
    pub comments: Duration,
    pub podcast: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let feed = FeedConfig {
            per_source: env.parse_or("FEED_PER_SOURCE", 10)?,
            max_pages: env.parse_or("FEED_MAX_PAGES", 10)?,
        };
        if feed.per_source == 0 || feed.max_pages == 0 {
            bail!("FEED_PER_SOURCE and FEED_MAX_PAGES must be at least 1");
        }

        let video = match (
            env.get("VIDEO_API_KEY"),
            env.get("VIDEO_CHANNEL_ID"),
            env.get("VIDEO_CLIPS_CHANNEL_ID"),
        ) {
            (Some(api_key), Some(channel_id), Some(clips_channel_id)) => Some(VideoConfig {
                api_base: env.string_or("VIDEO_API_BASE", "https://www.googleapis.com/youtube/v3"),
                api_key,
                channel_id,
                clips_channel_id,
            }),
            _ => None,
        };

        let handles = env
            .string_or("MICROBLOG_HANDLES", "aidthompsin.bsky.social")
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(String::from)
            .collect();

        Ok(Config {
            server: ServerConfig {
                host: env.string_or("HOST", "0.0.0.0"),
                port: env.parse_or("PORT", 8000)?,
            },
            database: DatabaseConfig {
                url: env.get("DATABASE_URL").context("DATABASE_URL must be set")?,
                max_connections: env.parse_or("DATABASE_MAX_CONNECTIONS", 5)?,
            },
            feed,
            upstream: UpstreamConfig {
                request_timeout: env.secs_or("UPSTREAM_TIMEOUT_SECS", 10)?,
                refresh_timeout: env.secs_or("REFRESH_TIMEOUT_SECS", 60)?,
            },
            video,
            microblog: MicroblogConfig {
                api_base: env.string_or("MICROBLOG_API_BASE", "https://public.api.bsky.app"),
                handles,
            },
            podcast: PodcastConfig {
                feed_url: env.string_or(
                    "PODCAST_FEED_URL",
                    "https://pinecast.com/feed/aid-thompsin-other-disappointm",
                ),
            },
            intervals: RefreshIntervals {
                video: env.secs_or("VIDEO_REFRESH_SECS", 3600)?,
                microblog: env.secs_or("MICROBLOG_REFRESH_SECS", 3600)?,
                comments: env.secs_or("COMMENTS_REFRESH_SECS", 300)?,
                podcast: env.secs_or("PODCAST_REFRESH_SECS", 3600)?,
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Unset and blank are the same thing.
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn string_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match self.get(key) {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("invalid value for {key}: {raw:?}")),
            None => Ok(default),
        }
    }

    fn secs_or(&self, key: &str, default: u64) -> Result<Duration> {
        let secs: u64 = self.parse_or(key, default)?;
        if secs == 0 {
            bail!("{key} must be at least 1 second");
        }
        Ok(Duration::from_secs(secs))
    }
}
