//! Pool and Vdev Parsing
//!
//! Builds a [`Pool`] from three pieces of tool output:
//!
//! 1. `zpool list -H -o name,health` for the pool state ([`parse_pool_list`])
//! 2. `zpool status -p <pool>` for the vdev topology, per-vdev state and
//!    error counters ([`parse_pool_status`])
//! 3. `zpool get -H -p ... <pool> all-vdevs` for the I/O and space counters
//!    ([`parse_vdev_properties`], applied with [`apply_vdev_properties`])
//!
//! The `config:` table of `zpool status` encodes the tree by indentation:
//!
//! ```text
//!     NAME          STATE     READ WRITE CKSUM
//!     tank          ONLINE       0     0     0
//!       mirror-0    ONLINE       0     0     0
//!         sda       ONLINE       0     0     0
//!         sdb       ONLINE       0     0     0
//!     logs
//!       nvme0n1     ONLINE       0     0     0
//!     spares
//!       sdc         AVAIL
//! ```
//!
//! Each row is indented by one tab plus two spaces per level. The first
//! row is the root; later rows at level 0 are section headers (`logs`,
//! `cache`, `spares`, `special`, `dedup`) that become their own branches
//! under the root.

use crate::error::{ExporterError, Result};
use crate::zfs::types::{Pool, PoolState, VdevState, VdevStats, VdevTree, VdevType, ROOT};
use std::collections::HashMap;
use tracing::warn;

/// Pool names and their state, in listing order
pub fn parse_pool_list(output: &str) -> Result<Vec<(String, PoolState)>> {
    let mut pools = Vec::new();
    for line in output.lines() {
        let line = line.trim_end();
        if line.is_empty() || line == "no pools available" {
            continue;
        }
        let mut fields = line.split('\t');
        let name = fields.next().unwrap_or_default().trim();
        if name.is_empty() {
            return Err(ExporterError::parse("zpool list", format!("empty pool name in {:?}", line)));
        }
        let state = fields
            .next()
            .map(PoolState::from_health)
            .unwrap_or(PoolState::Unknown);
        pools.push((name.to_string(), state));
    }
    Ok(pools)
}

/// Topology and error summary read from `zpool status`
#[derive(Debug)]
pub struct PoolStatus {
    pub vdevs: VdevTree,
    pub error_count: u64,
}

/// One row of the config table
struct TableRow<'a> {
    depth: usize,
    label: &'a str,
    state: Option<&'a str>,
    errors: [Option<&'a str>; 3],
}

fn split_row(line: &str) -> Option<TableRow<'_>> {
    let rest = line.strip_prefix('\t')?;
    let indent = rest.len() - rest.trim_start_matches(' ').len();
    let mut cells = rest.split_whitespace();
    let label = cells.next()?;
    let state = cells.next();
    let errors = [cells.next(), cells.next(), cells.next()];
    Some(TableRow {
        depth: indent / 2,
        label,
        state,
        errors,
    })
}

fn error_counter(pool: &str, label: &str, column: &str, cell: Option<&str>) -> u64 {
    match cell.map(str::parse::<u64>) {
        Some(Ok(value)) => value,
        Some(Err(_)) => {
            warn!(
                "Unparsable {} error count {:?} for vdev {} in pool {}",
                column,
                cell.unwrap_or_default(),
                label,
                pool
            );
            0
        }
        None => 0,
    }
}

/// Parse the `zpool status -p` output of a single pool.
///
/// Fails when the output contains no config table for `pool`, or when the
/// table's indentation cannot be attributed to a parent.
pub fn parse_pool_status(pool: &str, output: &str) -> Result<PoolStatus> {
    let context = format!("zpool status for {}", pool);
    let mut lines = output.lines();

    // Skip the header block up to the table's column titles
    let found_table = lines.by_ref().any(|line| {
        let mut cells = line.split_whitespace();
        cells.next() == Some("NAME") && cells.next() == Some("STATE")
    });
    if !found_table {
        return Err(ExporterError::parse(&context, "missing config table"));
    }

    let mut tree: Option<VdevTree> = None;
    // stack[d] = node index of the most recent row at depth d
    let mut stack: Vec<usize> = Vec::new();

    for line in lines.by_ref() {
        if line.trim().is_empty() {
            if tree.is_some() {
                break;
            }
            continue;
        }
        let Some(row) = split_row(line) else {
            return Err(ExporterError::parse(&context, format!("malformed row {:?}", line)));
        };
        let state = row.state.map(VdevState::from).unwrap_or(VdevState::Unknown);

        let Some(tree) = tree.as_mut() else {
            if row.depth != 0 || row.label != pool {
                return Err(ExporterError::parse(
                    &context,
                    format!("expected root vdev {:?}, found {:?}", pool, row.label),
                ));
            }
            let mut root = VdevTree::new(pool, state);
            if let Some(node) = root.get_mut(ROOT) {
                node.stats = row_errors(pool, &row);
            }
            tree = Some(root);
            stack = vec![ROOT];
            continue;
        };

        let index = if row.depth == 0 {
            // Section header: a branch of its own under the root
            let Some(branch_type) = VdevType::from_section(row.label) else {
                return Err(ExporterError::parse(
                    &context,
                    format!("unknown section {:?}", row.label),
                ));
            };
            let branch_state = if row.state.is_some() { state } else { tree.root().state };
            tree.push(ROOT, row.label, branch_type, branch_state)
        } else {
            if row.depth > stack.len() {
                return Err(ExporterError::parse(
                    &context,
                    format!("vdev {:?} is nested without a parent", row.label),
                ));
            }
            let parent = stack[row.depth - 1];
            tree.push(parent, row.label, VdevType::classify(row.label), state)
        };
        if let Some(node) = tree.get_mut(index) {
            node.stats = row_errors(pool, &row);
        }
        stack.truncate(row.depth);
        stack.push(index);
    }

    let Some(vdevs) = tree else {
        return Err(ExporterError::parse(&context, "config table has no root vdev"));
    };

    let error_count = lines
        .find_map(|line| line.trim().strip_prefix("errors:"))
        .map(|summary| parse_error_summary(pool, summary))
        .unwrap_or(0);

    Ok(PoolStatus { vdevs, error_count })
}

fn row_errors(pool: &str, row: &TableRow<'_>) -> VdevStats {
    let [read, write, checksum] = row.errors;
    VdevStats {
        read_errors: error_counter(pool, row.label, "read", read),
        write_errors: error_counter(pool, row.label, "write", write),
        checksum_errors: error_counter(pool, row.label, "checksum", checksum),
        ..VdevStats::default()
    }
}

/// `No known data errors` or `<n> data errors, use '-v' for a list`
fn parse_error_summary(pool: &str, summary: &str) -> u64 {
    let summary = summary.trim();
    if summary.starts_with("No known data errors") {
        return 0;
    }
    match summary.split_whitespace().next().map(str::parse::<u64>) {
        Some(Ok(count)) => count,
        _ => {
            warn!("Unrecognized error summary for pool {}: {:?}", pool, summary);
            0
        }
    }
}

/// Counters keyed by vdev label, then property name
pub type VdevProperties = HashMap<String, HashMap<String, u64>>;

/// Parse `name<TAB>property<TAB>value` rows of `zpool get -H -p`.
///
/// Values that are `-` (not applicable to this vdev) or otherwise not an
/// unsigned integer are skipped, leaving that counter at zero.
pub fn parse_vdev_properties(pool: &str, output: &str) -> VdevProperties {
    let mut properties = VdevProperties::new();
    for line in output.lines() {
        let mut fields = line.split('\t');
        let (Some(name), Some(property), Some(value)) = (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };
        let value = value.trim();
        if value == "-" {
            continue;
        }
        match value.parse::<u64>() {
            Ok(value) => {
                properties
                    .entry(name.trim().to_string())
                    .or_default()
                    .insert(property.trim().to_string(), value);
            }
            Err(_) => warn!(
                "Ignoring unparsable vdev property {}={:?} for {} in pool {}",
                property, value, name, pool
            ),
        }
    }
    properties
}

/// Attach I/O and space counters to the tree. Vdevs without a row keep zeros.
pub fn apply_vdev_properties(vdevs: &mut VdevTree, properties: &VdevProperties) {
    for node in vdevs.nodes_mut() {
        let row = if node.vdev_type == VdevType::Root {
            properties
                .get("root-0")
                .or_else(|| properties.get("root"))
                .or_else(|| properties.get(&node.label))
        } else {
            properties.get(&node.label)
        };
        let Some(row) = row else { continue };
        let get = |key: &str| row.get(key).copied().unwrap_or(0);
        node.stats.read_ops = get("read_ops");
        node.stats.write_ops = get("write_ops");
        node.stats.read_bytes = get("read_bytes");
        node.stats.write_bytes = get("write_bytes");
        node.stats.alloc_space = get("allocated");
        node.stats.total_space = get("size");
    }
}

/// Assemble a pool from its listed state and parsed topology
pub fn build_pool(
    name: &str,
    state: PoolState,
    status: PoolStatus,
    properties: Option<&VdevProperties>,
) -> Pool {
    let PoolStatus {
        mut vdevs,
        error_count,
    } = status;
    if let Some(properties) = properties {
        apply_vdev_properties(&mut vdevs, properties);
    }
    Pool {
        name: name.to_string(),
        state,
        error_count,
        vdevs,
    }
}
