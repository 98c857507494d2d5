//! Per-source in-memory caches.
//!
//! Each [`SourceCache`] holds the latest complete batch of one source as an
//! immutable [`CacheSnapshot`] behind an `Arc`.  A refresh builds the new
//! batch off to the side and swaps the pointer in a single write, so a
//! reader holds either the old generation or the new one, never a mix.
//! The lock is only held for the pointer copy; readers never wait on I/O.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::error::{FailureKind, FetchError};
use crate::source::FeedItem;

/// Lifecycle of one cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheState {
    /// Created, no refresh attempted yet.
    Uninitialized,
    /// A refresh is in flight; readers still see the previous snapshot.
    Refreshing,
    /// At least one refresh has completed (successfully or not).
    Ready,
}

impl CacheState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => CacheState::Refreshing,
            2 => CacheState::Ready,
            _ => CacheState::Uninitialized,
        }
    }
}

/// One immutable generation of a cache.
#[derive(Debug, Default)]
pub struct CacheSnapshot {
    pub items: Vec<FeedItem>,
    /// When these items were fetched.  `None` until the first success.
    pub last_updated: Option<DateTime<Utc>>,
}

/// The most recent refresh failure, kept for `/health` and `/podcast`.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshFailure {
    pub kind: FailureKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

pub struct SourceCache {
    name: String,
    snapshot: RwLock<Arc<CacheSnapshot>>,
    state: AtomicU8,
    last_failure: RwLock<Option<RefreshFailure>>,
}

impl SourceCache {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            snapshot: RwLock::new(Arc::new(CacheSnapshot::default())),
            state: AtomicU8::new(CacheState::Uninitialized as u8),
            last_failure: RwLock::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The current generation.  Cheap: clones an `Arc`.
    pub fn snapshot(&self) -> Arc<CacheSnapshot> {
        Arc::clone(&self.snapshot.read())
    }

    /// Copy of `items[offset..offset + limit]`, clamped to what exists.
    /// Out-of-range requests yield an empty vector.
    pub fn read(&self, offset: usize, limit: usize) -> Vec<FeedItem> {
        let snapshot = self.snapshot();
        let start = offset.min(snapshot.items.len());
        let end = offset.saturating_add(limit).min(snapshot.items.len());
        snapshot.items[start..end].to_vec()
    }

    pub fn len(&self) -> usize {
        self.snapshot().items.len()
    }

    pub fn state(&self) -> CacheState {
        CacheState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn last_failure(&self) -> Option<RefreshFailure> {
        self.last_failure.read().clone()
    }

    /// Mark a refresh as started.
    pub fn begin_refresh(&self) {
        self.state.store(CacheState::Refreshing as u8, Ordering::Release);
    }

    /// Replace the whole contents with a freshly fetched batch.
    pub fn replace(&self, items: Vec<FeedItem>) {
        let next = Arc::new(CacheSnapshot {
            items,
            last_updated: Some(Utc::now()),
        });
        *self.snapshot.write() = next;
        *self.last_failure.write() = None;
        self.state.store(CacheState::Ready as u8, Ordering::Release);
    }

    /// Record a failed refresh.  The current items stay in place.
    pub fn record_failure(&self, error: &FetchError) {
        *self.last_failure.write() = Some(RefreshFailure {
            kind: error.kind(),
            message: error.to_string(),
            at: Utc::now(),
        });
        self.state.store(CacheState::Ready as u8, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::stub;
    use crate::source::Platform;

    fn items(generation: &str, n: usize) -> Vec<FeedItem> {
        stub::items(Platform::Comment, generation, n)
    }

    #[test]
    fn new_cache_is_empty_and_uninitialized() {
        let cache = SourceCache::new("comments");
        assert_eq!(cache.state(), CacheState::Uninitialized);
        assert_eq!(cache.len(), 0);
        assert!(cache.snapshot().last_updated.is_none());
        assert!(cache.read(0, 10).is_empty());
    }

    #[test]
    fn replace_discards_previous_contents() {
        let cache = SourceCache::new("video");
        cache.replace(items("old", 5));
        cache.replace(items("new", 2));

        let current = cache.read(0, 100);
        assert_eq!(current.len(), 2);
        assert!(current.iter().all(|i| i.author == "new"));
        assert_eq!(cache.state(), CacheState::Ready);
        assert!(cache.snapshot().last_updated.is_some());
    }

    #[test]
    fn read_slices_and_clamps() {
        let cache = SourceCache::new("video");
        cache.replace(items("g", 15));

        let page = cache.read(10, 10);
        assert_eq!(page.len(), 5);
        assert_eq!(page[0].text, "g-10");

        assert!(cache.read(15, 10).is_empty());
        assert!(cache.read(usize::MAX, 10).is_empty());
        assert_eq!(cache.read(0, usize::MAX).len(), 15);
    }

    #[test]
    fn failure_keeps_items_and_is_cleared_by_success() {
        let cache = SourceCache::new("podcast");
        cache.replace(items("kept", 3));

        cache.begin_refresh();
        assert_eq!(cache.state(), CacheState::Refreshing);
        cache.record_failure(&FetchError::Malformed("bad xml".into()));

        assert_eq!(cache.state(), CacheState::Ready);
        assert_eq!(cache.len(), 3);
        let failure = cache.last_failure().unwrap();
        assert_eq!(failure.kind, FailureKind::Malformed);

        cache.replace(items("fresh", 1));
        assert!(cache.last_failure().is_none());
    }

    #[test]
    fn readers_never_observe_a_torn_generation() {
        let cache = Arc::new(SourceCache::new("comments"));
        cache.replace(items("a", 3));

        let writer = {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                for round in 0..2_000 {
                    if round % 2 == 0 {
                        cache.replace(items("b", 7));
                    } else {
                        cache.replace(items("a", 3));
                    }
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for _ in 0..2_000 {
                        let snapshot = cache.snapshot();
                        let generation = snapshot.items[0].author.clone();
                        let expected = if generation == "a" { 3 } else { 7 };
                        assert_eq!(snapshot.items.len(), expected);
                        assert!(snapshot.items.iter().all(|i| i.author == generation));
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
