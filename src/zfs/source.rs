//! Storage Subsystem Access
//!
//! [`ZfsSource`] is the only place the exporter touches the host. The parsers
//! work on the raw text it returns, so the whole collection pipeline can be
//! exercised against canned output.
//!
//! [`CommandSource`] runs the `zpool` / `zfs` tools with a timeout and reads
//! per-dataset kstats from procfs.

use crate::error::{ExporterError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Vdev properties requested from `zpool get ... all-vdevs`
pub const VDEV_PROPERTIES: &[&str] = &[
    "read_ops",
    "write_ops",
    "read_bytes",
    "write_bytes",
    "allocated",
    "size",
];

/// Dataset properties requested from `zfs get`
pub const DATASET_PROPERTIES: &[&str] = &[
    "objsetid",
    "available",
    "used",
    "usedbychildren",
    "usedbydataset",
    "usedbyrefreservation",
    "usedbysnapshots",
    "referenced",
    "logicalused",
    "logicalreferenced",
    "compressratio",
    "refcompressratio",
];

/// Raw access to pool, vdev and dataset state
#[async_trait]
pub trait ZfsSource: Send + Sync {
    /// `name<TAB>health` for every imported pool
    async fn list_pools(&self) -> Result<String>;

    /// `zpool status -p` output for one pool
    async fn pool_status(&self, pool: &str) -> Result<String>;

    /// `name<TAB>property<TAB>value` rows for every vdev of one pool
    async fn vdev_properties(&self, pool: &str) -> Result<String>;

    /// One filesystem or volume name per line
    async fn list_datasets(&self) -> Result<String>;

    /// `name<TAB>property<TAB>value` rows for the given datasets.
    ///
    /// Datasets that no longer exist are simply absent from the output.
    async fn dataset_properties(&self, names: &[String]) -> Result<String>;

    /// Contents of the objset kstat, or `None` when the dataset has none
    async fn objset_kstat(&self, pool: &str, objset_id: u64) -> Result<Option<String>>;
}

/// [`ZfsSource`] backed by the ZFS command line tools and procfs
pub struct CommandSource {
    command_timeout: Duration,
    kstat_root: PathBuf,
}

impl CommandSource {
    pub fn new(command_timeout: Duration, kstat_root: impl Into<PathBuf>) -> Self {
        Self {
            command_timeout,
            kstat_root: kstat_root.into(),
        }
    }

    /// Run a command and return its stdout.
    ///
    /// With `partial_ok`, a non-zero exit that still produced output is
    /// accepted; `zfs get` exits 1 when any one of its operands vanished.
    async fn run(&self, program: &str, args: &[&str], partial_ok: bool) -> Result<String> {
        let command_line = format!("{} {}", program, args.join(" "));
        debug!("Running {}", command_line);

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.command_timeout, command.output()).await {
            Ok(output) => output.map_err(|e| ExporterError::spawn(&command_line, e))?,
            Err(_) => return Err(ExporterError::timeout(command_line, self.command_timeout)),
        };

        let stdout = String::from_utf8(output.stdout)
            .map_err(|e| ExporterError::command(&command_line, format!("non UTF-8 output: {}", e)))?;

        if output.status.success() || (partial_ok && !stdout.trim().is_empty()) {
            Ok(stdout)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(ExporterError::command(
                command_line,
                format!("{}: {}", output.status, stderr.trim()),
            ))
        }
    }
}

#[async_trait]
impl ZfsSource for CommandSource {
    async fn list_pools(&self) -> Result<String> {
        self.run("zpool", &["list", "-H", "-o", "name,health"], false)
            .await
            .map_err(|e| ExporterError::Unavailable(e.to_string()))
    }

    async fn pool_status(&self, pool: &str) -> Result<String> {
        self.run("zpool", &["status", "-p", pool], false).await
    }

    async fn vdev_properties(&self, pool: &str) -> Result<String> {
        let properties = VDEV_PROPERTIES.join(",");
        self.run(
            "zpool",
            &[
                "get",
                "-H",
                "-p",
                "-o",
                "name,property,value",
                properties.as_str(),
                pool,
                "all-vdevs",
            ],
            false,
        )
        .await
    }

    async fn list_datasets(&self) -> Result<String> {
        self.run(
            "zfs",
            &["list", "-H", "-o", "name", "-t", "filesystem,volume"],
            false,
        )
        .await
        .map_err(|e| ExporterError::Unavailable(e.to_string()))
    }

    async fn dataset_properties(&self, names: &[String]) -> Result<String> {
        let properties = DATASET_PROPERTIES.join(",");
        let mut args = vec!["get", "-H", "-p", "-o", "name,property,value", properties.as_str()];
        args.extend(names.iter().map(String::as_str));
        self.run("zfs", &args, true).await
    }

    async fn objset_kstat(&self, pool: &str, objset_id: u64) -> Result<Option<String>> {
        let path = self
            .kstat_root
            .join(pool)
            .join(format!("objset-0x{:x}", objset_id));
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            // Not mounted, or kstats not supported for this dataset
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ExporterError::Io(e)),
        }
    }
}
