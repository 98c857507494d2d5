//! Background cache refreshing.
//!
//! Every source gets its own [`Refresher`]: the source, the cache it owns,
//! and its interval.  [`Scheduler::refresh_all`] runs each refresher once
//! before the server starts so the first request never sees an empty feed;
//! [`Scheduler::spawn`] then gives each refresher its own tokio task.
//!
//! ## For contributors
//!
//! A refresher is the only writer of its cache.  Nothing here ever holds
//! more than one cache at a time, and a failed or timed-out refresh simply
//! leaves the previous contents in place until the next tick.  There is no
//! retry inside a tick.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::cache::SourceCache;
use crate::error::FetchError;
use crate::source::DataSource;

/// Upper bound on one whole refresh when none is configured.
const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(60);

/// One source bound to the cache it writes.
#[derive(Clone)]
pub struct Refresher {
    source: Arc<dyn DataSource>,
    cache: Arc<SourceCache>,
    interval: Duration,
    timeout: Duration,
}

impl Refresher {
    pub fn new(source: Arc<dyn DataSource>, cache: Arc<SourceCache>, interval: Duration) -> Self {
        Self {
            source,
            cache,
            interval,
            timeout: DEFAULT_REFRESH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        self.source.name()
    }

    /// Fetch, then swap the new batch in.  On error the cache keeps its
    /// items and only the failure is recorded.
    pub async fn refresh(&self) -> Result<usize, FetchError> {
        self.cache.begin_refresh();
        let started = Instant::now();

        let outcome = match tokio::time::timeout(self.timeout, self.source.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.timeout)),
        };

        match outcome {
            Ok(items) => {
                let count = items.len();
                self.cache.replace(items);
                tracing::info!(
                    source = self.name(),
                    items = count,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "cache refreshed"
                );
                Ok(count)
            }
            Err(e) => {
                self.cache.record_failure(&e);
                tracing::warn!(
                    source = self.name(),
                    kind = ?e.kind(),
                    error = %e,
                    kept_items = self.cache.len(),
                    "refresh failed, keeping previous contents"
                );
                Err(e)
            }
        }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        // The startup refresh already ran, so the first tick is one full
        // interval away.
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::debug!(
            source = self.name(),
            interval_secs = self.interval.as_secs(),
            "refresh task started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }

            // Nothing is written before the fetch completes, so dropping an
            // in-flight refresh here is safe.
            tokio::select! {
                _ = self.refresh() => {}
                _ = shutdown.changed() => break,
            }
        }

        tracing::debug!(source = self.name(), "refresh task stopped");
    }
}

pub struct Scheduler {
    refreshers: Vec<Refresher>,
}

impl Scheduler {
    pub fn new(refreshers: Vec<Refresher>) -> Self {
        Self { refreshers }
    }

    /// Refresh every source once, concurrently, and wait for all of them.
    /// Returns how many succeeded.
    pub async fn refresh_all(&self) -> usize {
        let results = join_all(self.refreshers.iter().map(Refresher::refresh)).await;
        let succeeded = results.iter().filter(|r| r.is_ok()).count();

        tracing::info!(
            sources = results.len(),
            succeeded,
            "startup refresh finished"
        );
        succeeded
    }

    /// Start one periodic task per source.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown, rx) = watch::channel(false);
        let tasks = self
            .refreshers
            .into_iter()
            .map(|refresher| tokio::spawn(refresher.run(rx.clone())))
            .collect();

        SchedulerHandle { shutdown, tasks }
    }
}

/// Owned by `main`; stops the periodic tasks.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Signal every task and wait for them to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "refresh task ended abnormally");
            }
        }
        tracing::info!("scheduler stopped");
    }
}
