//! In-memory sources for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{DataSource, FeedItem, Platform};
use crate::error::FetchError;

/// `n` items whose text is `"{label}-{i}"`.
pub fn items(platform: Platform, label: &str, n: usize) -> Vec<FeedItem> {
    (0..n)
        .map(|i| {
            let mut item = FeedItem::new(platform, label, format!("{label}-{i}"));
            item.id = Some(format!("{label}-{i}"));
            item
        })
        .collect()
}

/// Returns a one-item batch on every call, or fails on the calls listed in
/// `fail_on`.  The item's text is the call number, so tests can tell
/// generations apart.
pub struct StubSource {
    name: String,
    platform: Platform,
    fail_on: Vec<usize>,
    delay: Duration,
    calls: AtomicUsize,
}

impl StubSource {
    pub fn new(name: &str, platform: Platform) -> Self {
        Self {
            name: name.to_string(),
            platform,
            fail_on: Vec::new(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail on these 1-based call numbers.
    pub fn failing_on(mut self, calls: &[usize]) -> Self {
        self.fail_on = calls.to_vec();
        self
    }

    pub fn always_failing(self) -> Self {
        self.failing_on(&(1..=10_000).collect::<Vec<_>>())
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSource for StubSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<FeedItem>, FetchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_on.contains(&call) {
            return Err(FetchError::Exhausted(self.name.clone()));
        }
        Ok(vec![FeedItem::new(self.platform, &self.name, call.to_string())])
    }
}
