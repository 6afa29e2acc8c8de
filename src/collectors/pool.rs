//! Pool Collector
//!
//! Lists imported pools, then reads each pool's topology and vdev counters.
//! A pool whose status reports an error or cannot be parsed is left out of
//! the result; a pool whose zpool does not support vdev properties is kept
//! with zero I/O counters. A query that times out or cannot be run fails the
//! whole collection.

use crate::error::Result;
use crate::zfs::pool::{build_pool, parse_pool_list, parse_pool_status, parse_vdev_properties};
use crate::zfs::{Pool, PoolState, ZfsSource};
use tracing::{debug, warn};

/// Collects every imported pool with its vdev tree
///
/// # Errors
///
/// Fails when the pool list cannot be queried or parsed, or when a per-pool
/// query times out or cannot be run.
pub async fn collect_pools(source: &dyn ZfsSource) -> Result<Vec<Pool>> {
    let listing = source.list_pools().await?;
    let listed = parse_pool_list(&listing)?;

    let mut pools = Vec::with_capacity(listed.len());
    for (name, state) in listed {
        if let Some(pool) = collect_pool(source, &name, state).await? {
            pools.push(pool);
        }
    }
    Ok(pools)
}

async fn collect_pool(
    source: &dyn ZfsSource,
    name: &str,
    state: PoolState,
) -> Result<Option<Pool>> {
    let status = match source.pool_status(name).await {
        Ok(output) => output,
        Err(e) if e.is_transient() => return Err(e),
        Err(e) => {
            warn!("Failed to query status of pool {}: {}", name, e);
            return Ok(None);
        }
    };
    let status = match parse_pool_status(name, &status) {
        Ok(status) => status,
        Err(e) => {
            warn!("Dropping pool {}: {}", name, e);
            return Ok(None);
        }
    };

    let properties = match source.vdev_properties(name).await {
        Ok(output) => Some(parse_vdev_properties(name, &output)),
        Err(e) if e.is_transient() => return Err(e),
        Err(e) => {
            warn!(
                "Vdev counters unavailable for pool {}, reporting zeros: {}",
                name, e
            );
            None
        }
    };

    let pool = build_pool(name, state, status, properties.as_ref());
    debug!(
        "Collected pool {} ({}, {} vdevs)",
        pool.name,
        pool.state,
        pool.vdevs.len()
    );
    Ok(Some(pool))
}
