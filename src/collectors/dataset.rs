//! Dataset Collector
//!
//! Enumerates filesystems and volumes, fetches their properties in batches
//! and reads their objset kstats.
//!
//! Datasets destroyed between enumeration and property retrieval are absent
//! from the property output and are skipped. A property query that times
//! out fails the collection, so the previous snapshot keeps being served. A dataset whose kstat exists
//! but cannot be read or parsed is dropped on its own.

use crate::error::Result;
use crate::zfs::dataset::{apply_objset_kstat, parse_dataset_list, parse_dataset_properties};
use crate::zfs::{Dataset, ZfsSource};
use tracing::{debug, warn};

/// Upper bound on dataset names passed to a single `zfs get`
pub const PROPERTY_BATCH_SIZE: usize = 256;

/// Collects every filesystem and volume with its space and activity figures
///
/// # Errors
///
/// Fails when datasets cannot be enumerated, or when a property query
/// times out or cannot be run.
pub async fn collect_datasets(source: &dyn ZfsSource) -> Result<Vec<Dataset>> {
    let names = parse_dataset_list(&source.list_datasets().await?);

    let mut datasets = Vec::with_capacity(names.len());
    for batch in names.chunks(PROPERTY_BATCH_SIZE) {
        let output = match source.dataset_properties(batch).await {
            Ok(output) => output,
            Err(e) if e.is_transient() => return Err(e),
            // `zfs get` exits non-zero without output when every name vanished
            Err(e) => {
                warn!(
                    "Failed to query properties of {} datasets: {}",
                    batch.len(),
                    e
                );
                continue;
            }
        };
        let mut found = parse_dataset_properties(&output);

        for name in batch {
            let Some(mut dataset) = found.remove(name) else {
                debug!("Dataset {} disappeared during collection", name);
                continue;
            };
            if read_activity(source, &mut dataset).await {
                datasets.push(dataset);
            }
        }
    }
    Ok(datasets)
}

/// Fill in the kstat counters. Returns false if the dataset must be dropped.
async fn read_activity(source: &dyn ZfsSource, dataset: &mut Dataset) -> bool {
    let Some(objset_id) = dataset.objset_id else {
        return true;
    };
    match source.objset_kstat(&dataset.pool, objset_id).await {
        Ok(Some(kstat)) => match apply_objset_kstat(&dataset.name, &kstat, &mut dataset.stats) {
            Ok(()) => true,
            Err(e) => {
                warn!("Dropping dataset {}: {}", dataset.name, e);
                false
            }
        },
        Ok(None) => true,
        Err(e) => {
            warn!(
                "Dropping dataset {}: failed to read objset kstat: {}",
                dataset.name, e
            );
            false
        }
    }
}
