//! Snapshot builder tests
//!
//! Tests that collection survives partial failures and fails as a whole when
//! pools or datasets cannot be enumerated or a query times out.

mod common;

use common::{dataset_rows, FakeSource};
use zfs_exporter::collectors::{build_snapshot, collect_datasets, PROPERTY_BATCH_SIZE};
use zfs_exporter::zfs::{PoolState, VdevState};

#[tokio::test]
async fn test_snapshot_of_single_pool_host() {
    // Given: A host with one pool and two datasets
    let source = FakeSource::dpool();

    // When: Building a snapshot
    let snapshot = build_snapshot(&source).await.expect("Collection failed");

    // Then: Pools and datasets are present with their counters
    assert_eq!(snapshot.pools.len(), 1);
    let pool = snapshot.pool("dpool").expect("Missing pool");
    assert_eq!(pool.state, PoolState::Active);
    assert_eq!(pool.vdevs.root().state, VdevState::Online);
    assert!(pool.vdevs.root().stats.write_ops > 0);

    let data = snapshot.dataset("dpool/data").expect("Missing dataset");
    assert!(data.stats.available > 0);
    assert!(data.stats.writes > 0);
    assert!(data.stats.nwritten > 0);
    assert!(data.stats.reads > 0);
    assert!(data.stats.nread > 0);
}

#[tokio::test]
async fn test_unavailable_zfs_fails_collection() {
    // Given: A host where the pool listing fails
    let source = FakeSource::dpool();
    source.set_fail_list_pools(true);

    // When: Building a snapshot
    let result = build_snapshot(&source).await;

    // Then: The whole collection fails
    assert!(result.is_err());
}

#[tokio::test]
async fn test_failing_dataset_kstat_drops_only_that_dataset() {
    // Given: A kstat that cannot be read for dpool/data
    let source = FakeSource::dpool();
    source.fail_kstat(387);

    // When: Building a snapshot
    let snapshot = build_snapshot(&source).await.expect("Collection failed");

    // Then: Every other dataset and all pools are reported
    assert!(snapshot.dataset("dpool/data").is_none());
    assert!(snapshot.dataset("dpool").is_some());
    assert_eq!(snapshot.pools.len(), 1);
}

#[tokio::test]
async fn test_dataset_destroyed_mid_collection_is_skipped() {
    // Given: A dataset that is listed but has no properties any more
    let mut source = FakeSource::dpool();
    source.datasets.push_str("dpool/gone\n");

    // When: Building a snapshot
    let snapshot = build_snapshot(&source).await.expect("Collection failed");

    // Then: It is silently left out
    assert_eq!(snapshot.datasets.len(), 2);
    assert!(snapshot.dataset("dpool/gone").is_none());
}

#[tokio::test]
async fn test_dataset_without_kstat_keeps_space_figures() {
    // Given: A dataset whose objset kstat does not exist
    let mut source = FakeSource::dpool();
    source.kstats.remove(&("dpool".to_string(), 387));

    // When: Building a snapshot
    let snapshot = build_snapshot(&source).await.expect("Collection failed");

    // Then: It is kept with zero activity
    let data = snapshot.dataset("dpool/data").expect("Missing dataset");
    assert!(data.stats.available > 0);
    assert_eq!(data.stats.writes, 0);
}

#[tokio::test]
async fn test_pool_with_unreadable_status_is_dropped() {
    // Given: A second pool whose status cannot be read
    let mut source = FakeSource::dpool();
    source.pools.push_str("tank\tONLINE\n");
    source.datasets.push_str("tank\n");
    source
        .dataset_properties
        .insert("tank".to_string(), dataset_rows("tank", 54));

    // When: Building a snapshot
    let snapshot = build_snapshot(&source).await.expect("Collection failed");

    // Then: The pool and its datasets are left out, dpool is complete
    assert!(snapshot.pool("tank").is_none());
    assert!(snapshot.dataset("tank").is_none());
    assert!(snapshot.pool("dpool").is_some());
    assert_eq!(snapshot.datasets.len(), 2);
}

#[tokio::test]
async fn test_missing_vdev_counters_report_zero() {
    // Given: A host whose zpool does not support vdev properties
    let source = FakeSource::dpool();
    source
        .fail_vdev_properties
        .store(true, std::sync::atomic::Ordering::SeqCst);

    // When: Building a snapshot
    let snapshot = build_snapshot(&source).await.expect("Collection failed");

    // Then: The pool is kept with zero I/O counters
    let pool = snapshot.pool("dpool").expect("Missing pool");
    assert_eq!(pool.vdevs.len(), 2);
    assert_eq!(pool.vdevs.root().stats.write_ops, 0);
}

#[tokio::test]
async fn test_datasets_are_queried_in_batches() {
    // Given: More datasets than fit into one property query
    let mut source = FakeSource::dpool();
    let count = PROPERTY_BATCH_SIZE + 10;
    for i in 0..count {
        let name = format!("dpool/fs{:04}", i);
        source.datasets.push_str(&format!("{}\n", name));
        source
            .dataset_properties
            .insert(name.clone(), dataset_rows(&name, 1000 + i as u64));
    }

    // When: Collecting datasets
    let datasets = collect_datasets(&source).await.expect("Collection failed");

    // Then: Every dataset is returned
    assert_eq!(datasets.len(), count + 2);
}

#[tokio::test]
async fn test_snapshot_is_sorted_by_name() {
    // Given: Datasets listed out of order
    let mut source = FakeSource::dpool();
    source.datasets = "dpool/data\ndpool\n".to_string();

    // When: Building a snapshot
    let snapshot = build_snapshot(&source).await.expect("Collection failed");

    // Then: Datasets come back sorted
    let names: Vec<&str> = snapshot.datasets.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["dpool", "dpool/data"]);
}

#[tokio::test]
async fn test_dataset_property_timeout_fails_collection() {
    // Given: A host where `zfs get` times out
    let source = FakeSource::dpool();
    source
        .timeout_dataset_properties
        .store(true, std::sync::atomic::Ordering::SeqCst);

    // When: Building a snapshot
    let result = build_snapshot(&source).await;

    // Then: The whole collection fails instead of losing every dataset
    let message = result.expect_err("Expected a timeout").to_string();
    assert!(message.contains("timed out"));
}

#[tokio::test]
async fn test_vanished_dataset_batch_is_skipped() {
    // Given: A property query that reports every dataset gone
    let source = FakeSource::dpool();
    source
        .fail_dataset_properties
        .store(true, std::sync::atomic::Ordering::SeqCst);

    // When: Building a snapshot
    let snapshot = build_snapshot(&source).await.expect("Collection failed");

    // Then: Pools are still reported without those datasets
    assert!(snapshot.pool("dpool").is_some());
    assert!(snapshot.datasets.is_empty());
}

#[tokio::test]
async fn test_vdev_property_timeout_fails_collection() {
    // Given: A host where `zpool get` times out
    let source = FakeSource::dpool();
    source
        .timeout_vdev_properties
        .store(true, std::sync::atomic::Ordering::SeqCst);

    // When: Building a snapshot
    let result = build_snapshot(&source).await;

    // Then: The collection fails rather than reporting zeroed counters
    assert!(result.is_err());
}
