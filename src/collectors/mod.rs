//! Snapshot Builder
//!
//! Runs the pool and dataset collectors against a [`ZfsSource`] and joins
//! their output into one immutable [`Snapshot`].
//!
//! # Error Handling
//!
//! Collectors distinguish two kinds of failure:
//! - the query mechanism itself is unreachable (`zpool list` / `zfs list`
//!   fail, or any query times out or cannot be run): the whole collection
//!   fails and the caller keeps its previous snapshot
//! - a single pool or dataset cannot be read or parsed: that entity is
//!   dropped with a warning and the rest of the snapshot is built

use crate::error::Result;
use crate::zfs::{Dataset, Pool, ZfsSource};
use std::collections::HashSet;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info};

pub mod dataset;
pub mod pool;

pub use dataset::{collect_datasets, PROPERTY_BATCH_SIZE};
pub use pool::collect_pools;

/// Point-in-time view of every pool and dataset on the host
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Pools sorted by name
    pub pools: Vec<Pool>,
    /// Datasets sorted by name; every one belongs to a pool in `pools`
    pub datasets: Vec<Dataset>,
    pub collected_at: SystemTime,
    pub duration: Duration,
}

impl Snapshot {
    pub fn pool(&self, name: &str) -> Option<&Pool> {
        self.pools.iter().find(|pool| pool.name == name)
    }

    pub fn dataset(&self, name: &str) -> Option<&Dataset> {
        self.datasets.iter().find(|dataset| dataset.name == name)
    }
}

/// Collect pools and datasets into a consistent snapshot.
///
/// # Errors
///
/// Returns an error if pools or datasets cannot be enumerated, or if any
/// query times out or cannot be run.
pub async fn build_snapshot(source: &dyn ZfsSource) -> Result<Snapshot> {
    let start = Instant::now();

    let mut pools = collect_pools(source).await?;
    pools.sort_by(|a, b| a.name.cmp(&b.name));

    let datasets = collect_datasets(source).await?;
    let pool_names: HashSet<&str> = pools.iter().map(|pool| pool.name.as_str()).collect();
    let total = datasets.len();
    let mut datasets: Vec<Dataset> = datasets
        .into_iter()
        .filter(|dataset| {
            let known = pool_names.contains(dataset.pool.as_str());
            if !known {
                debug!(
                    "Dropping dataset {}: pool {} is not in this snapshot",
                    dataset.name, dataset.pool
                );
            }
            known
        })
        .collect();
    datasets.sort_by(|a, b| a.name.cmp(&b.name));

    let duration = start.elapsed();
    info!(
        "Collected {} pools and {} of {} datasets in {:?}",
        pools.len(),
        datasets.len(),
        total,
        duration
    );

    Ok(Snapshot {
        pools,
        datasets,
        collected_at: SystemTime::now(),
        duration,
    })
}
