//! ZFS Data Model
//!
//! In-memory representation of the storage state read from the host.
//!
//! - [`Pool`] owns a [`VdevTree`]: an arena of [`VdevNode`]s linked by index,
//!   with the root always at index 0.
//! - [`Dataset`] refers to its pool by name only.
//!
//! State enumerations are closed and carry an explicit `Unknown` fallback.
//! Strings are mapped through fixed lookup tables; anything not in the table
//! becomes `Unknown` instead of failing the collection.

use std::fmt;

/// Pool state, derived from the health `zpool list` reports for an imported pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolState {
    Active,
    Degraded,
    Faulted,
    Offline,
    Unavail,
    Removed,
    Suspended,
    Unknown,
}

impl PoolState {
    /// Every state, in exposition order
    pub const ALL: [PoolState; 8] = [
        PoolState::Active,
        PoolState::Degraded,
        PoolState::Faulted,
        PoolState::Offline,
        PoolState::Unavail,
        PoolState::Removed,
        PoolState::Suspended,
        PoolState::Unknown,
    ];

    /// Map a pool health word onto the state enumeration.
    ///
    /// An imported pool reporting `ONLINE` is in active use.
    pub fn from_health(health: &str) -> Self {
        match health.trim() {
            "ONLINE" => Self::Active,
            "DEGRADED" => Self::Degraded,
            "FAULTED" => Self::Faulted,
            "OFFLINE" => Self::Offline,
            "UNAVAIL" => Self::Unavail,
            "REMOVED" => Self::Removed,
            "SUSPENDED" => Self::Suspended,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Degraded => "DEGRADED",
            Self::Faulted => "FAULTED",
            Self::Offline => "OFFLINE",
            Self::Unavail => "UNAVAIL",
            Self::Removed => "REMOVED",
            Self::Suspended => "SUSPENDED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health of a single vdev node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VdevState {
    Online,
    Degraded,
    Faulted,
    Offline,
    Unavail,
    Removed,
    Unknown,
}

impl VdevState {
    /// Every state, in exposition order
    pub const ALL: [VdevState; 7] = [
        VdevState::Online,
        VdevState::Degraded,
        VdevState::Faulted,
        VdevState::Offline,
        VdevState::Unavail,
        VdevState::Removed,
        VdevState::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "ONLINE",
            Self::Degraded => "DEGRADED",
            Self::Faulted => "FAULTED",
            Self::Offline => "OFFLINE",
            Self::Unavail => "UNAVAIL",
            Self::Removed => "REMOVED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

// Spares report AVAIL / INUSE instead of a health word; both are usable devices.
impl From<&str> for VdevState {
    fn from(state: &str) -> Self {
        match state.trim() {
            "ONLINE" | "AVAIL" | "INUSE" => Self::Online,
            "DEGRADED" => Self::Degraded,
            "FAULTED" => Self::Faulted,
            "OFFLINE" => Self::Offline,
            "UNAVAIL" => Self::Unavail,
            "REMOVED" => Self::Removed,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for VdevState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of vdev node, used as the `vdev_type` label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VdevType {
    Root,
    Mirror,
    Raidz1,
    Raidz2,
    Raidz3,
    Draid,
    Disk,
    File,
    Spare,
    Log,
    Cache,
    Special,
    Dedup,
    Replacing,
    Indirect,
}

impl VdevType {
    /// Classify an interior or leaf vdev from its `zpool status` label.
    ///
    /// Group vdevs are labelled `<kind>-<id>`; everything else is a leaf.
    /// Leaves given as absolute paths outside `/dev` are file vdevs.
    pub fn classify(label: &str) -> Self {
        let kind = match label.rsplit_once('-') {
            Some((kind, id)) if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) => kind,
            _ => "",
        };
        match kind {
            "mirror" => Self::Mirror,
            "raidz" | "raidz1" => Self::Raidz1,
            "raidz2" => Self::Raidz2,
            "raidz3" => Self::Raidz3,
            "spare" => Self::Spare,
            "replacing" => Self::Replacing,
            "indirect" => Self::Indirect,
            _ if label.starts_with("draid") && label.contains(':') => Self::Draid,
            _ if label.starts_with('/') && !label.starts_with("/dev/") => Self::File,
            _ => Self::Disk,
        }
    }

    /// Branch type for a section header of the `zpool status` table
    pub fn from_section(header: &str) -> Option<Self> {
        match header {
            "logs" => Some(Self::Log),
            "cache" => Some(Self::Cache),
            "spares" => Some(Self::Spare),
            "special" => Some(Self::Special),
            "dedup" => Some(Self::Dedup),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Mirror => "mirror",
            Self::Raidz1 => "raidz1",
            Self::Raidz2 => "raidz2",
            Self::Raidz3 => "raidz3",
            Self::Draid => "draid",
            Self::Disk => "disk",
            Self::File => "file",
            Self::Spare => "spare",
            Self::Log => "log",
            Self::Cache => "cache",
            Self::Special => "special",
            Self::Dedup => "dedup",
            Self::Replacing => "replacing",
            Self::Indirect => "indirect",
        }
    }

    pub fn is_leaf(self) -> bool {
        matches!(self, Self::Disk | Self::File)
    }
}

impl fmt::Display for VdevType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cumulative counters of a vdev. Missing values are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VdevStats {
    pub read_ops: u64,
    pub write_ops: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub read_errors: u64,
    pub write_errors: u64,
    pub checksum_errors: u64,
    pub alloc_space: u64,
    pub total_space: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VdevNode {
    /// Label as printed by `zpool status` (device name, path or `mirror-0`)
    pub label: String,
    /// Path-like name, unique within the pool (`tank/mirror-0/sda`)
    pub name: String,
    pub vdev_type: VdevType,
    pub state: VdevState,
    pub stats: VdevStats,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

/// Arena-backed vdev tree. Index 0 is the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VdevTree {
    nodes: Vec<VdevNode>,
}

pub const ROOT: usize = 0;

impl VdevTree {
    /// Create a tree holding only the root vdev, named after the pool
    pub fn new(pool: &str, state: VdevState) -> Self {
        Self {
            nodes: vec![VdevNode {
                label: pool.to_string(),
                name: pool.to_string(),
                vdev_type: VdevType::Root,
                state,
                stats: VdevStats::default(),
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// Attach a new node under `parent` and return its index.
    ///
    /// Panics if `parent` is not a node of this tree.
    pub fn push(
        &mut self,
        parent: usize,
        label: &str,
        vdev_type: VdevType,
        state: VdevState,
    ) -> usize {
        let index = self.nodes.len();
        let name = self.child_name(parent, label, index);
        self.nodes.push(VdevNode {
            label: label.to_string(),
            name,
            vdev_type,
            state,
            stats: VdevStats::default(),
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(index);
        index
    }

    /// Name a new child after the last path component of its label. File
    /// vdevs sharing a basename keep their full path, and the node index
    /// breaks any tie left after that.
    fn child_name(&self, parent: usize, label: &str, index: usize) -> String {
        let prefix = &self.nodes[parent].name;
        let taken = |name: &str| {
            self.nodes[parent]
                .children
                .iter()
                .any(|&child| self.nodes[child].name == name)
        };

        let base = label.rsplit('/').next().unwrap_or(label);
        let short = format!("{}/{}", prefix, base);
        if !taken(&short) {
            return short;
        }
        let full = format!("{}/{}", prefix, label.trim_start_matches('/'));
        if !taken(&full) {
            return full;
        }
        format!("{}#{}", full, index)
    }

    pub fn root(&self) -> &VdevNode {
        &self.nodes[ROOT]
    }

    pub fn get(&self, index: usize) -> Option<&VdevNode> {
        self.nodes.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut VdevNode> {
        self.nodes.get_mut(index)
    }

    /// All nodes in pre-order (parents before their children)
    pub fn nodes(&self) -> &[VdevNode] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut VdevNode> {
        self.nodes.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look a node up by its path-like name
    pub fn find(&self, name: &str) -> Option<&VdevNode> {
        self.nodes.iter().find(|node| node.name == name)
    }

    /// Leaf devices (disks and files) of the tree
    pub fn leaves(&self) -> impl Iterator<Item = &VdevNode> {
        self.nodes.iter().filter(|node| node.vdev_type.is_leaf())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pool {
    pub name: String,
    pub state: PoolState,
    /// Persistent data errors reported on the `errors:` line
    pub error_count: u64,
    pub vdevs: VdevTree,
}

/// Space and activity figures of a dataset. Unsupported values are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DatasetStats {
    pub available: u64,
    pub used: u64,
    pub used_by_children: u64,
    pub used_by_dataset: u64,
    pub used_by_ref_reservation: u64,
    pub used_by_snapshots: u64,
    pub referenced: u64,
    pub logical_used: u64,
    pub logical_referenced: u64,
    pub compress_ratio: f64,
    pub ref_compress_ratio: f64,

    pub reads: u64,
    pub writes: u64,
    pub nread: u64,
    pub nwritten: u64,
    pub nunlinks: u64,
    pub nunlinked: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub name: String,
    pub pool: String,
    pub objset_id: Option<u64>,
    pub stats: DatasetStats,
}

impl Dataset {
    /// Pool a dataset name belongs to (its first path component)
    pub fn pool_of(name: &str) -> &str {
        name.split('/').next().unwrap_or(name)
    }
}
