//! Data source abstraction layer.
//!
//! This module defines the [`DataSource`] trait and the common [`FeedItem`]
//! type.  Concrete sources live in sub-modules: the video platform, the
//! microblog, the podcast RSS feed and the local comments table.
//!
//! ## For contributors: adding a new source
//!
//! 1. Create a new file in this directory (e.g. `mastodon.rs`).
//! 2. Define a struct holding the source's configuration and implement
//!    [`DataSource`] for it.
//! 3. Add `mod mastodon;` below and re-export your struct.
//! 4. Give it a cache and a [`Refresher`](crate::poll::Refresher) in
//!    `main.rs`.  If it should show up in `/feed`, add its cache to the
//!    paginator lanes too.
//!
//! The scheduler, caches and paginator are all source-agnostic.

mod comments;
mod feed_item;
mod microblog;
mod podcast;
mod video;

#[cfg(test)]
pub mod stub;

pub use comments::CommentsSource;
pub use feed_item::{sort_newest_first, FeedItem, Platform};
pub use microblog::MicroblogSource;
pub use podcast::PodcastSource;
pub use video::VideoSource;

use async_trait::async_trait;

use crate::error::FetchError;

/// Trait that every data source must implement.
///
/// The scheduler calls [`fetch()`](DataSource::fetch) on a background task,
/// never from a request handler, so implementations are free to do slow
/// network or database I/O.
///
/// A source that makes several upstream calls should log and skip the ones
/// that fail and return whatever it collected; it only returns `Err` when
/// nothing usable came back.  An `Err` leaves the cache untouched.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Short label used in logs and in `/health`.
    fn name(&self) -> &str;

    /// Fetch the latest complete batch of items.
    async fn fetch(&self) -> Result<Vec<FeedItem>, FetchError>;
}
