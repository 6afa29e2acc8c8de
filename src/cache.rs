//! Snapshot Cache
//!
//! Holds the most recent [`Snapshot`] and serializes refreshes.
//!
//! # Concurrency
//!
//! - Readers take a brief read lock to clone the current `Arc<Snapshot>`;
//!   rendering happens afterwards on the immutable snapshot.
//! - At most one collection runs at a time. Callers that queued behind a
//!   refresh reuse its outcome instead of collecting again.
//! - A failed or timed-out refresh leaves the previous snapshot in place.

use crate::collectors::{build_snapshot, Snapshot};
use crate::config::RefreshMode;
use crate::error::{ExporterError, Result};
use crate::metrics::ExporterMetrics;
use crate::zfs::ZfsSource;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info};

pub struct SnapshotCache {
    source: Arc<dyn ZfsSource>,
    metrics: ExporterMetrics,
    collection_timeout: Duration,
    current: RwLock<Option<Arc<Snapshot>>>,
    refresh_lock: Mutex<()>,
    /// Incremented after every finished refresh attempt
    generation: AtomicU64,
    healthy: AtomicBool,
}

impl SnapshotCache {
    pub fn new(
        source: Arc<dyn ZfsSource>,
        metrics: ExporterMetrics,
        collection_timeout: Duration,
    ) -> Self {
        Self {
            source,
            metrics,
            collection_timeout,
            current: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
            healthy: AtomicBool::new(false),
        }
    }

    /// The latest successfully collected snapshot, if any
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether the last refresh attempt succeeded
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    pub fn metrics(&self) -> &ExporterMetrics {
        &self.metrics
    }

    /// Collect a new snapshot and make it current.
    ///
    /// If another refresh finished while this call waited for its turn, that
    /// refresh's outcome is returned instead of collecting again.
    ///
    /// # Errors
    ///
    /// Returns the collection error or [`ExporterError::Timeout`]; the
    /// previous snapshot stays current in both cases.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>> {
        let seen = self.generation.load(Ordering::Acquire);
        let _guard = self.refresh_lock.lock().await;

        if self.generation.load(Ordering::Acquire) != seen {
            debug!("Reusing the result of a concurrent refresh");
            return match (self.is_healthy(), self.current()) {
                (true, Some(snapshot)) => Ok(snapshot),
                _ => Err(ExporterError::Unavailable(
                    "concurrent collection failed".to_string(),
                )),
            };
        }

        let outcome = match timeout(self.collection_timeout, build_snapshot(&*self.source)).await
        {
            Ok(result) => result,
            Err(_) => Err(ExporterError::timeout(
                "Snapshot collection",
                self.collection_timeout,
            )),
        };

        let result = match outcome {
            Ok(snapshot) => {
                self.metrics.record_success(&snapshot);
                let snapshot = Arc::new(snapshot);
                *self.current.write().unwrap_or_else(PoisonError::into_inner) =
                    Some(Arc::clone(&snapshot));
                self.healthy.store(true, Ordering::Release);
                Ok(snapshot)
            }
            Err(e) => {
                error!("Collection failed, keeping previous snapshot: {}", e);
                self.metrics.record_failure();
                self.healthy.store(false, Ordering::Release);
                Err(e)
            }
        };
        self.generation.fetch_add(1, Ordering::AcqRel);
        result
    }

    /// The snapshot a scrape should render under the given refresh policy
    pub async fn snapshot_for_scrape(&self, mode: RefreshMode) -> Option<Arc<Snapshot>> {
        match mode {
            RefreshMode::OnScrape => match self.refresh().await {
                Ok(snapshot) => Some(snapshot),
                Err(_) => self.current(),
            },
            RefreshMode::Interval => self.current(),
        }
    }

    /// Refresh on a fixed period until the task is dropped
    pub async fn run_interval(self: Arc<Self>, period: Duration) {
        info!("Refreshing snapshots every {:?}", period);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            // Failures are logged and counted inside refresh
            let _ = self.refresh().await;
        }
    }
}
