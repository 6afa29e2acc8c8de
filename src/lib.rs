//! ZFS Prometheus Exporter
//!
//! A Prometheus metrics exporter for ZFS on Linux pools, vdevs and datasets.
//!
//! # Overview
//!
//! The exporter queries the local ZFS installation through the `zpool` and
//! `zfs` tools and the per-dataset kstats under `/proc/spl/kstat/zfs`,
//! assembles a point-in-time snapshot, and serves it in the Prometheus text
//! exposition format.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐   zpool / zfs / kstat  ┌──────────────────┐
//! │  ZFS on     │ ─────────────────────► │ ZfsSource        │
//! │  this host  │                        │   ↓ parsers      │
//! └─────────────┘                        │ Snapshot builder │      HTTP      ┌────────────┐
//!                                        │   ↓              │ ◄────────────► │ Prometheus │
//!                                        │ SnapshotCache    │   /metrics     └────────────┘
//!                                        │   ↓ encoder      │
//!                                        └──────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`zfs`] - host access, output parsers and the pool/vdev/dataset model
//! - [`collectors`] - snapshot builder
//! - [`cache`] - current snapshot and refresh serialization
//! - [`metrics`] - Prometheus encoding
//! - [`server`] - HTTP server
//! - [`config`] - Configuration management
//! - [`error`] - Error types
//!
//! # Quick Start
//!
//! ```no_run
//! use zfs_exporter::{config::Config, server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/Default.toml")?;
//!     server::start(config).await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod collectors;
pub mod config;
pub mod error;
pub mod metrics;
pub mod server;
pub mod zfs;
