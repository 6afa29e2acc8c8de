//! Shared test fixtures
//!
//! Canned `zpool` / `zfs` output for a host with one pool `dpool` on the
//! single disk `vdb1`, holding the datasets `dpool` and `dpool/data`, and an
//! in-memory [`ZfsSource`] serving it.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use zfs_exporter::error::{ExporterError, Result};
use zfs_exporter::zfs::ZfsSource;

pub const DPOOL_LIST: &str = "dpool\tONLINE\n";

pub const DPOOL_STATUS: &str = "  pool: dpool
 state: ONLINE
config:

\tNAME        STATE     READ WRITE CKSUM
\tdpool       ONLINE       0     0     0
\t  vdb1      ONLINE       0     0     0

errors: No known data errors
";

pub const DPOOL_VDEV_PROPERTIES: &str = "root-0\tread_ops\t215
root-0\twrite_ops\t1342
root-0\tread_bytes\t2203648
root-0\twrite_bytes\t11534336
root-0\tallocated\t10616832
root-0\tsize\t1035993088
vdb1\tread_ops\t215
vdb1\twrite_ops\t1342
vdb1\tread_bytes\t2203648
vdb1\twrite_bytes\t11534336
vdb1\tallocated\t10616832
vdb1\tsize\t1035993088
";

pub const DPOOL_DATASETS: &str = "dpool\ndpool/data\n";

/// `zfs get` rows of one dataset with the given objset id
pub fn dataset_rows(name: &str, objset_id: u64) -> String {
    [
        ("objsetid", objset_id.to_string()),
        ("available", "880803840".to_string()),
        ("used", "10485760".to_string()),
        ("usedbychildren", "10223616".to_string()),
        ("usedbydataset", "262144".to_string()),
        ("usedbyrefreservation", "0".to_string()),
        ("usedbysnapshots", "0".to_string()),
        ("referenced", "262144".to_string()),
        ("logicalused", "10813440".to_string()),
        ("logicalreferenced", "131072".to_string()),
        ("compressratio", "1.03".to_string()),
        ("refcompressratio", "1.00".to_string()),
    ]
    .iter()
    .map(|(property, value)| format!("{}\t{}\t{}\n", name, property, value))
    .collect()
}

/// Objset kstat with the given activity counters
pub fn objset_kstat(name: &str, reads: u64, nread: u64, writes: u64, nwritten: u64) -> String {
    format!(
        "27 1 0x01 7 2160 5290128929 1239852741426
name                            type data
dataset_name                    7    {}
writes                          4    {}
nwritten                        4    {}
reads                           4    {}
nread                           4    {}
nunlinks                        4    0
nunlinked                       4    0
",
        name, writes, nwritten, reads, nread
    )
}

/// In-memory storage source
pub struct FakeSource {
    pub pools: String,
    pub statuses: HashMap<String, String>,
    pub vdev_properties: HashMap<String, String>,
    pub datasets: String,
    pub dataset_properties: HashMap<String, String>,
    pub kstats: HashMap<(String, u64), String>,

    pub fail_list_pools: AtomicBool,
    pub fail_vdev_properties: AtomicBool,
    pub timeout_vdev_properties: AtomicBool,
    /// `zfs get` exits non-zero without output
    pub fail_dataset_properties: AtomicBool,
    pub timeout_dataset_properties: AtomicBool,
    /// Objset ids whose kstat read fails with an I/O error
    pub failing_kstats: Mutex<HashSet<u64>>,
    /// Delay applied to every pool listing
    pub delay: Mutex<Option<Duration>>,
    pub list_pools_calls: AtomicUsize,
}

impl FakeSource {
    pub fn empty() -> Self {
        Self {
            pools: String::new(),
            statuses: HashMap::new(),
            vdev_properties: HashMap::new(),
            datasets: String::new(),
            dataset_properties: HashMap::new(),
            kstats: HashMap::new(),
            fail_list_pools: AtomicBool::new(false),
            fail_vdev_properties: AtomicBool::new(false),
            timeout_vdev_properties: AtomicBool::new(false),
            fail_dataset_properties: AtomicBool::new(false),
            timeout_dataset_properties: AtomicBool::new(false),
            failing_kstats: Mutex::new(HashSet::new()),
            delay: Mutex::new(None),
            list_pools_calls: AtomicUsize::new(0),
        }
    }

    /// The `dpool` host after some I/O on `dpool/data`
    pub fn dpool() -> Self {
        let mut source = Self::empty();
        source.pools = DPOOL_LIST.to_string();
        source
            .statuses
            .insert("dpool".to_string(), DPOOL_STATUS.to_string());
        source
            .vdev_properties
            .insert("dpool".to_string(), DPOOL_VDEV_PROPERTIES.to_string());
        source.datasets = DPOOL_DATASETS.to_string();
        source
            .dataset_properties
            .insert("dpool".to_string(), dataset_rows("dpool", 54));
        source
            .dataset_properties
            .insert("dpool/data".to_string(), dataset_rows("dpool/data", 387));
        source.kstats.insert(
            ("dpool".to_string(), 54),
            objset_kstat("dpool", 0, 0, 0, 0),
        );
        source.kstats.insert(
            ("dpool".to_string(), 387),
            objset_kstat("dpool/data", 8, 1048576, 160, 10485760),
        );
        source
    }

    pub fn set_fail_list_pools(&self, fail: bool) {
        self.fail_list_pools.store(fail, Ordering::SeqCst);
    }

    pub fn fail_kstat(&self, objset_id: u64) {
        self.failing_kstats
            .lock()
            .expect("fake source lock poisoned")
            .insert(objset_id);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().expect("fake source lock poisoned") = Some(delay);
    }
}

#[async_trait]
impl ZfsSource for FakeSource {
    async fn list_pools(&self) -> Result<String> {
        self.list_pools_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().expect("fake source lock poisoned");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_list_pools.load(Ordering::SeqCst) {
            return Err(ExporterError::Unavailable(
                "/dev/zfs: no such device".to_string(),
            ));
        }
        Ok(self.pools.clone())
    }

    async fn pool_status(&self, pool: &str) -> Result<String> {
        self.statuses
            .get(pool)
            .cloned()
            .ok_or_else(|| ExporterError::command("zpool status", "no such pool"))
    }

    async fn vdev_properties(&self, pool: &str) -> Result<String> {
        if self.timeout_vdev_properties.load(Ordering::SeqCst) {
            return Err(ExporterError::timeout(
                "zpool get",
                Duration::from_secs(10),
            ));
        }
        if self.fail_vdev_properties.load(Ordering::SeqCst) {
            return Err(ExporterError::command(
                "zpool get",
                "invalid property 'read_ops'",
            ));
        }
        Ok(self.vdev_properties.get(pool).cloned().unwrap_or_default())
    }

    async fn list_datasets(&self) -> Result<String> {
        Ok(self.datasets.clone())
    }

    async fn dataset_properties(&self, names: &[String]) -> Result<String> {
        if self.timeout_dataset_properties.load(Ordering::SeqCst) {
            return Err(ExporterError::timeout("zfs get", Duration::from_secs(10)));
        }
        if self.fail_dataset_properties.load(Ordering::SeqCst) {
            return Err(ExporterError::command(
                "zfs get",
                "exit status: 1: dataset does not exist",
            ));
        }
        Ok(names
            .iter()
            .filter_map(|name| self.dataset_properties.get(name))
            .map(String::as_str)
            .collect())
    }

    async fn objset_kstat(&self, pool: &str, objset_id: u64) -> Result<Option<String>> {
        let failing = self
            .failing_kstats
            .lock()
            .expect("fake source lock poisoned")
            .contains(&objset_id);
        if failing {
            return Err(ExporterError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "permission denied",
            )));
        }
        Ok(self.kstats.get(&(pool.to_string(), objset_id)).cloned())
    }
}
