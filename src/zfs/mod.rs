//! ZFS Access and Parsing
//!
//! - [`source`] - `ZfsSource` trait and the command-line implementation
//! - [`pool`] - `zpool` output into pools with vdev trees
//! - [`dataset`] - `zfs` output and objset kstats into dataset records
//! - [`types`] - the data model shared by the parsers and the encoder

pub mod dataset;
pub mod pool;
pub mod source;
pub mod types;

pub use source::{CommandSource, ZfsSource};
pub use types::{
    Dataset, DatasetStats, Pool, PoolState, VdevNode, VdevState, VdevStats, VdevTree, VdevType,
};
