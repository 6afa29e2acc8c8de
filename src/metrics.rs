//! Prometheus Metrics Definitions
//!
//! This module renders a [`Snapshot`] into the Prometheus text format.
//!
//! # Metric Categories
//!
//! ## Pools
//! - `zfs_pool_state{pool, state}` - one-hot over [`PoolState::ALL`]
//! - `zfs_pool_error_count{pool}` - persistent data errors
//!
//! ## Vdevs (every node of the tree, root and branches included)
//! - `zfs_pool_vdev_state{pool, vdev, vdev_type, state}` - one-hot over [`VdevState::ALL`]
//! - `zfs_pool_vdev_{read,write}_{ops,bytes,errors}`, `zfs_pool_vdev_checksum_errors`
//! - `zfs_pool_vdev_{alloc,total}_space`
//!
//! ## Datasets
//! - `zfs_dataset_{reads,writes,nread,nwritten,nunlinks,nunlinked}{name, pool}` - counters
//! - `zfs_dataset_available` and the other space figures - gauges
//!
//! ## Exporter
//! - `zfs_exporter_up`, `zfs_exporter_collection_failures_total`,
//!   `zfs_exporter_last_collection_timestamp_seconds`,
//!   `zfs_exporter_collection_duration_seconds`
//!
//! # Metric Types
//!
//! - **Gauge**: state one-hots, space figures, compression ratios
//! - **IntCounter**: cumulative kernel counters. Each render starts from a
//!   fresh counter, so `inc_by` with the kernel total yields that total.
//!
//! # Rendering
//!
//! Snapshot metrics go into a fresh [`Registry`] on every render, so series
//! of vanished pools or datasets never linger. The registry sorts families
//! by name and label pairs by label name, which makes the output
//! deterministic for a given snapshot.

use crate::collectors::Snapshot;
use crate::zfs::{Dataset, Pool, PoolState, VdevNode, VdevState};
use prometheus::{
    Encoder, Gauge, GaugeVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

const NAMESPACE: &str = "zfs";

const POOL_LABELS: &[&str] = &["pool"];
const VDEV_LABELS: &[&str] = &["pool", "vdev", "vdev_type"];
const DATASET_LABELS: &[&str] = &["name", "pool"];

/// Metrics describing the exporter itself; these outlive any snapshot
#[derive(Clone)]
pub struct ExporterMetrics {
    pub up: Arc<Gauge>,
    pub collection_failures: Arc<IntCounter>,
    pub last_collection_timestamp_seconds: Arc<Gauge>,
    pub collection_duration_seconds: Arc<Gauge>,
}

impl ExporterMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let up = Gauge::with_opts(
            Opts::new("up", "Whether the last collection succeeded (1) or failed (0)")
                .namespace(NAMESPACE)
                .subsystem("exporter"),
        )?;

        let collection_failures = IntCounter::with_opts(
            Opts::new(
                "collection_failures_total",
                "Collections that failed and left the previous snapshot in place",
            )
            .namespace(NAMESPACE)
            .subsystem("exporter"),
        )?;

        let last_collection_timestamp_seconds = Gauge::with_opts(
            Opts::new(
                "last_collection_timestamp_seconds",
                "Unix time the latest snapshot was collected",
            )
            .namespace(NAMESPACE)
            .subsystem("exporter"),
        )?;

        let collection_duration_seconds = Gauge::with_opts(
            Opts::new(
                "collection_duration_seconds",
                "Time taken to collect the latest snapshot",
            )
            .namespace(NAMESPACE)
            .subsystem("exporter"),
        )?;

        Ok(Self {
            up: Arc::new(up),
            collection_failures: Arc::new(collection_failures),
            last_collection_timestamp_seconds: Arc::new(last_collection_timestamp_seconds),
            collection_duration_seconds: Arc::new(collection_duration_seconds),
        })
    }

    /// Record a successful collection
    pub fn record_success(&self, snapshot: &Snapshot) {
        let collected_at = snapshot
            .collected_at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        self.up.set(1.0);
        self.last_collection_timestamp_seconds.set(collected_at);
        self.collection_duration_seconds
            .set(snapshot.duration.as_secs_f64());
    }

    /// Record a failed collection
    pub fn record_failure(&self) {
        self.up.set(0.0);
        self.collection_failures.inc();
    }

    /// Register the exporter metrics on a render registry.
    ///
    /// The registered collectors share their values with `self`.
    fn register(&self, registry: &Registry) -> anyhow::Result<()> {
        registry.register(Box::new(Gauge::clone(&self.up)))?;
        registry.register(Box::new(IntCounter::clone(&self.collection_failures)))?;
        registry.register(Box::new(Gauge::clone(
            &self.last_collection_timestamp_seconds,
        )))?;
        registry.register(Box::new(Gauge::clone(&self.collection_duration_seconds)))?;
        Ok(())
    }
}

type DatasetGauge = (GaugeVec, fn(&Dataset) -> f64);
type DatasetCounter = (IntCounterVec, fn(&Dataset) -> u64);

/// Metric vectors filled from one snapshot
struct SnapshotMetrics {
    registry: Registry,

    pool_state: GaugeVec,
    pool_error_count: IntCounterVec,

    vdev_state: GaugeVec,
    vdev_alloc_space: GaugeVec,
    vdev_total_space: GaugeVec,
    vdev_read_ops: IntCounterVec,
    vdev_read_bytes: IntCounterVec,
    vdev_read_errors: IntCounterVec,
    vdev_write_ops: IntCounterVec,
    vdev_write_bytes: IntCounterVec,
    vdev_write_errors: IntCounterVec,
    vdev_checksum_errors: IntCounterVec,

    dataset_gauges: Vec<DatasetGauge>,
    dataset_counters: Vec<DatasetCounter>,
}

fn gauge_vec(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> anyhow::Result<GaugeVec> {
    let vec = GaugeVec::new(Opts::new(name, help).namespace(NAMESPACE), labels)?;
    registry.register(Box::new(vec.clone()))?;
    Ok(vec)
}

fn counter_vec(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> anyhow::Result<IntCounterVec> {
    let vec = IntCounterVec::new(Opts::new(name, help).namespace(NAMESPACE), labels)?;
    registry.register(Box::new(vec.clone()))?;
    Ok(vec)
}

impl SnapshotMetrics {
    fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();
        let r = &registry;

        let pool_state = gauge_vec(
            r,
            "pool_state",
            "Pool state (1 for the current state, 0 otherwise)",
            &["pool", "state"],
        )?;
        let pool_error_count = counter_vec(
            r,
            "pool_error_count",
            "Persistent data errors in the pool",
            POOL_LABELS,
        )?;

        let vdev_state = gauge_vec(
            r,
            "pool_vdev_state",
            "Vdev state (1 for the current state, 0 otherwise)",
            &["pool", "vdev", "vdev_type", "state"],
        )?;
        let vdev_alloc_space = gauge_vec(
            r,
            "pool_vdev_alloc_space",
            "Allocated space of the vdev in bytes",
            VDEV_LABELS,
        )?;
        let vdev_total_space = gauge_vec(
            r,
            "pool_vdev_total_space",
            "Total space of the vdev in bytes",
            VDEV_LABELS,
        )?;
        let vdev_read_ops = counter_vec(
            r,
            "pool_vdev_read_ops",
            "Read operations issued to the vdev",
            VDEV_LABELS,
        )?;
        let vdev_read_bytes = counter_vec(
            r,
            "pool_vdev_read_bytes",
            "Bytes read from the vdev",
            VDEV_LABELS,
        )?;
        let vdev_read_errors = counter_vec(
            r,
            "pool_vdev_read_errors",
            "Read errors on the vdev",
            VDEV_LABELS,
        )?;
        let vdev_write_ops = counter_vec(
            r,
            "pool_vdev_write_ops",
            "Write operations issued to the vdev",
            VDEV_LABELS,
        )?;
        let vdev_write_bytes = counter_vec(
            r,
            "pool_vdev_write_bytes",
            "Bytes written to the vdev",
            VDEV_LABELS,
        )?;
        let vdev_write_errors = counter_vec(
            r,
            "pool_vdev_write_errors",
            "Write errors on the vdev",
            VDEV_LABELS,
        )?;
        let vdev_checksum_errors = counter_vec(
            r,
            "pool_vdev_checksum_errors",
            "Checksum errors on the vdev",
            VDEV_LABELS,
        )?;

        let gauges: [(&str, &str, fn(&Dataset) -> f64); 11] = [
            (
                "dataset_available",
                "Space available to the dataset in bytes",
                |d| d.stats.available as f64,
            ),
            (
                "dataset_used",
                "Space used by the dataset and its descendants in bytes",
                |d| d.stats.used as f64,
            ),
            (
                "dataset_used_by_children",
                "Space used by children of the dataset in bytes",
                |d| d.stats.used_by_children as f64,
            ),
            (
                "dataset_used_by_dataset",
                "Space used by the dataset itself in bytes",
                |d| d.stats.used_by_dataset as f64,
            ),
            (
                "dataset_used_by_ref_reservation",
                "Space used by the refreservation of the dataset in bytes",
                |d| d.stats.used_by_ref_reservation as f64,
            ),
            (
                "dataset_used_by_snapshots",
                "Space used by snapshots of the dataset in bytes",
                |d| d.stats.used_by_snapshots as f64,
            ),
            (
                "dataset_referenced",
                "Data referenced by the dataset in bytes",
                |d| d.stats.referenced as f64,
            ),
            (
                "dataset_logical_used",
                "Logical space used by the dataset in bytes",
                |d| d.stats.logical_used as f64,
            ),
            (
                "dataset_logical_referenced",
                "Logical data referenced by the dataset in bytes",
                |d| d.stats.logical_referenced as f64,
            ),
            (
                "dataset_compress_ratio",
                "Compression ratio of the used space",
                |d| d.stats.compress_ratio,
            ),
            (
                "dataset_ref_compress_ratio",
                "Compression ratio of the referenced data",
                |d| d.stats.ref_compress_ratio,
            ),
        ];
        let counters: [(&str, &str, fn(&Dataset) -> u64); 6] = [
            ("dataset_reads", "Read operations on the dataset", |d| {
                d.stats.reads
            }),
            ("dataset_writes", "Write operations on the dataset", |d| {
                d.stats.writes
            }),
            ("dataset_nread", "Bytes read from the dataset", |d| {
                d.stats.nread
            }),
            ("dataset_nwritten", "Bytes written to the dataset", |d| {
                d.stats.nwritten
            }),
            (
                "dataset_nunlinks",
                "Files queued for unlinking in the dataset",
                |d| d.stats.nunlinks,
            ),
            ("dataset_nunlinked", "Files unlinked in the dataset", |d| {
                d.stats.nunlinked
            }),
        ];

        let mut dataset_gauges = Vec::with_capacity(gauges.len());
        for (name, help, value) in gauges {
            dataset_gauges.push((gauge_vec(r, name, help, DATASET_LABELS)?, value));
        }
        let mut dataset_counters = Vec::with_capacity(counters.len());
        for (name, help, value) in counters {
            dataset_counters.push((counter_vec(r, name, help, DATASET_LABELS)?, value));
        }

        Ok(Self {
            registry,
            pool_state,
            pool_error_count,
            vdev_state,
            vdev_alloc_space,
            vdev_total_space,
            vdev_read_ops,
            vdev_read_bytes,
            vdev_read_errors,
            vdev_write_ops,
            vdev_write_bytes,
            vdev_write_errors,
            vdev_checksum_errors,
            dataset_gauges,
            dataset_counters,
        })
    }

    fn set_gauge(vec: &GaugeVec, labels: &[&str], value: f64) -> anyhow::Result<()> {
        vec.get_metric_with_label_values(labels)?.set(value);
        Ok(())
    }

    fn set_counter(vec: &IntCounterVec, labels: &[&str], total: u64) -> anyhow::Result<()> {
        vec.get_metric_with_label_values(labels)?.inc_by(total);
        Ok(())
    }

    fn add_pool(&self, pool: &Pool) -> anyhow::Result<()> {
        for state in PoolState::ALL {
            let value = if state == pool.state { 1.0 } else { 0.0 };
            Self::set_gauge(&self.pool_state, &[pool.name.as_str(), state.as_str()], value)?;
        }
        Self::set_counter(&self.pool_error_count, &[pool.name.as_str()], pool.error_count)?;

        for vdev in pool.vdevs.nodes() {
            self.add_vdev(&pool.name, vdev)?;
        }
        Ok(())
    }

    fn add_vdev(&self, pool: &str, vdev: &VdevNode) -> anyhow::Result<()> {
        let vdev_type = vdev.vdev_type.as_str();
        for state in VdevState::ALL {
            let value = if state == vdev.state { 1.0 } else { 0.0 };
            Self::set_gauge(
                &self.vdev_state,
                &[pool, vdev.name.as_str(), vdev_type, state.as_str()],
                value,
            )?;
        }

        let labels = [pool, vdev.name.as_str(), vdev_type];
        let stats = &vdev.stats;
        Self::set_gauge(&self.vdev_alloc_space, &labels, stats.alloc_space as f64)?;
        Self::set_gauge(&self.vdev_total_space, &labels, stats.total_space as f64)?;
        Self::set_counter(&self.vdev_read_ops, &labels, stats.read_ops)?;
        Self::set_counter(&self.vdev_read_bytes, &labels, stats.read_bytes)?;
        Self::set_counter(&self.vdev_read_errors, &labels, stats.read_errors)?;
        Self::set_counter(&self.vdev_write_ops, &labels, stats.write_ops)?;
        Self::set_counter(&self.vdev_write_bytes, &labels, stats.write_bytes)?;
        Self::set_counter(&self.vdev_write_errors, &labels, stats.write_errors)?;
        Self::set_counter(&self.vdev_checksum_errors, &labels, stats.checksum_errors)?;
        Ok(())
    }

    fn add_dataset(&self, dataset: &Dataset) -> anyhow::Result<()> {
        let labels = [dataset.name.as_str(), dataset.pool.as_str()];
        for (vec, value) in &self.dataset_gauges {
            Self::set_gauge(vec, &labels, value(dataset))?;
        }
        for (vec, value) in &self.dataset_counters {
            Self::set_counter(vec, &labels, value(dataset))?;
        }
        Ok(())
    }

    fn fill(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        for pool in &snapshot.pools {
            self.add_pool(pool)?;
        }
        for dataset in &snapshot.datasets {
            self.add_dataset(dataset)?;
        }
        Ok(())
    }

    /// Render metrics in Prometheus text format
    fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Render a snapshot in Prometheus text format
pub fn encode_snapshot(snapshot: &Snapshot) -> anyhow::Result<String> {
    let metrics = SnapshotMetrics::new()?;
    metrics.fill(snapshot)?;
    metrics.render()
}

/// Render a snapshot together with the exporter metrics
pub fn render(snapshot: &Snapshot, exporter: &ExporterMetrics) -> anyhow::Result<String> {
    let metrics = SnapshotMetrics::new()?;
    exporter.register(&metrics.registry)?;
    metrics.fill(snapshot)?;
    metrics.render()
}
