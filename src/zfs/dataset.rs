//! Dataset Parsing
//!
//! Datasets are enumerated with `zfs list`, their space properties come from
//! `zfs get -H -p`, and their activity counters from the objset kstat the
//! kernel module publishes for every mounted filesystem:
//!
//! ```text
//! 27 1 0x01 7 2160 5290128929 1239852741426
//! name                            type data
//! dataset_name                    7    tank/data
//! writes                          4    12
//! nwritten                        4    4096
//! reads                           4    3
//! nread                           4    1024
//! nunlinks                        4    0
//! nunlinked                       4    0
//! ```
//!
//! Properties a dataset type does not support are reported as `-` and read
//! as zero. A value that is negative or unparsable only zeroes that one
//! property.

use crate::error::{ExporterError, Result};
use crate::zfs::types::{Dataset, DatasetStats};
use std::collections::BTreeMap;
use tracing::warn;

/// Dataset names, one per line
pub fn parse_dataset_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && *line != "no datasets available")
        .map(str::to_string)
        .collect()
}

fn parse_u64(dataset: &str, property: &str, value: &str) -> u64 {
    match value {
        "-" | "" => 0,
        value => value.parse::<u64>().unwrap_or_else(|_| {
            warn!(
                "Invalid value {:?} for property {} of dataset {}",
                value, property, dataset
            );
            0
        }),
    }
}

/// Compression ratios print as `1.50x`, or `1.50` in parsable mode
fn parse_ratio(dataset: &str, property: &str, value: &str) -> f64 {
    if value == "-" || value.is_empty() {
        return 0.0;
    }
    match value.trim_end_matches('x').parse::<f64>() {
        Ok(ratio) if ratio.is_finite() && ratio >= 0.0 => ratio,
        _ => {
            warn!(
                "Invalid value {:?} for property {} of dataset {}",
                value, property, dataset
            );
            0.0
        }
    }
}

/// Parse `name<TAB>property<TAB>value` rows of `zfs get -H -p`, grouped by dataset.
///
/// Datasets appear in the result exactly when they have at least one row.
pub fn parse_dataset_properties(output: &str) -> BTreeMap<String, Dataset> {
    let mut datasets = BTreeMap::new();
    for line in output.lines() {
        let mut fields = line.split('\t');
        let (Some(name), Some(property), Some(value)) = (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };
        let (name, property, value) = (name.trim(), property.trim(), value.trim());
        if name.is_empty() {
            continue;
        }

        let dataset = datasets
            .entry(name.to_string())
            .or_insert_with(|| Dataset {
                name: name.to_string(),
                pool: Dataset::pool_of(name).to_string(),
                objset_id: None,
                stats: DatasetStats::default(),
            });
        let stats = &mut dataset.stats;
        match property {
            "objsetid" => {
                dataset.objset_id = match value {
                    "-" => None,
                    value => value.parse::<u64>().ok(),
                }
            }
            "available" => stats.available = parse_u64(name, property, value),
            "used" => stats.used = parse_u64(name, property, value),
            "usedbychildren" => stats.used_by_children = parse_u64(name, property, value),
            "usedbydataset" => stats.used_by_dataset = parse_u64(name, property, value),
            "usedbyrefreservation" => {
                stats.used_by_ref_reservation = parse_u64(name, property, value)
            }
            "usedbysnapshots" => stats.used_by_snapshots = parse_u64(name, property, value),
            "referenced" => stats.referenced = parse_u64(name, property, value),
            "logicalused" => stats.logical_used = parse_u64(name, property, value),
            "logicalreferenced" => stats.logical_referenced = parse_u64(name, property, value),
            "compressratio" => stats.compress_ratio = parse_ratio(name, property, value),
            "refcompressratio" => stats.ref_compress_ratio = parse_ratio(name, property, value),
            _ => {}
        }
    }
    datasets
}

/// Read the activity counters of an objset kstat into `stats`.
///
/// Fails only when the kstat has no `name type data` header; a single bad
/// row zeroes that counter.
pub fn apply_objset_kstat(dataset: &str, kstat: &str, stats: &mut DatasetStats) -> Result<()> {
    let mut rows = kstat.lines();
    let has_header = rows.by_ref().any(|line| {
        let mut cells = line.split_whitespace();
        cells.next() == Some("name") && cells.next() == Some("type") && cells.next() == Some("data")
    });
    if !has_header {
        return Err(ExporterError::parse(
            format!("objset kstat of {}", dataset),
            "missing `name type data` header",
        ));
    }

    for row in rows {
        let mut cells = row.split_whitespace();
        let (Some(name), Some(_kind), Some(data)) = (cells.next(), cells.next(), cells.next())
        else {
            continue;
        };
        let counter = match name {
            "writes" => &mut stats.writes,
            "nwritten" => &mut stats.nwritten,
            "reads" => &mut stats.reads,
            "nread" => &mut stats.nread,
            "nunlinks" => &mut stats.nunlinks,
            "nunlinked" => &mut stats.nunlinked,
            _ => continue,
        };
        *counter = parse_u64(dataset, name, data);
    }
    Ok(())
}
