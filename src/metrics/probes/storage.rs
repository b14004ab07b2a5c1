//! Mounted filesystem usage probe.

use crate::error::{Result, SystemError};
use crate::metrics::data::{round_to, Fragment, StorageUsage};
use crate::metrics::traits::Probe;
use async_trait::async_trait;
use nix::sys::statvfs::statvfs;
use std::collections::BTreeMap;
use sysinfo::Disks;

const MEBIBYTE: f64 = 1024.0 * 1024.0;

/// Snap packages mount read-only squashfs images that are always full.
const SKIPPED_PREFIX: &str = "/snap";

/// Byte counts of one filesystem.
///
/// `used` includes blocks reserved for root, `free` is what unprivileged
/// users can still allocate, so `used + free` may be less than `total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskSpace {
    pub total: u64,
    pub used: u64,
    pub free: u64,
}

impl DiskSpace {
    /// Build from raw statvfs block counts and the fragment size.
    pub fn from_blocks(
        blocks: u64,
        blocks_free: u64,
        blocks_available: u64,
        fragment_size: u64,
    ) -> Self {
        Self {
            total: blocks.saturating_mul(fragment_size),
            used: blocks.saturating_sub(blocks_free).saturating_mul(fragment_size),
            free: blocks_available.saturating_mul(fragment_size),
        }
    }
}

#[derive(Debug, Default)]
pub struct StorageProbe;

impl StorageProbe {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Probe for StorageProbe {
    fn name(&self) -> &str {
        "shutil"
    }

    /// Runs on the blocking pool. A statvfs stuck on a dead network mount
    /// outlives the probe timeout; `main` bounds runtime shutdown for that case.
    async fn probe(&self) -> Result<Fragment> {
        let partitions = tokio::task::spawn_blocking(|| {
            let disks = Disks::new_with_refreshed_list();
            disks
                .iter()
                .map(|disk| disk.mount_point().to_string_lossy().to_string())
                .filter(|mount_point| !mount_point.starts_with(SKIPPED_PREFIX))
                .filter_map(|mount_point| match disk_space(&mount_point) {
                    Ok(space) => Some((mount_point, space)),
                    Err(e) => {
                        tracing::debug!("Skip storage data for {}: {}", mount_point, e);
                        None
                    }
                })
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| SystemError::execution(format!("Could not read disk usage: {}", e)))?;

        let usage = summarize(partitions);
        tracing::debug!("Fetched data: {:?}", usage);

        if usage.is_empty() {
            return Ok(Fragment::new());
        }
        Ok(Fragment::single("storage", serde_json::to_value(usage)?))
    }
}

/// statvfs for one mount point.
#[allow(clippy::unnecessary_cast)]
pub fn disk_space(mount_point: &str) -> Result<DiskSpace> {
    let stats = statvfs(mount_point)
        .map_err(|e| SystemError::execution(format!("statvfs {}: {}", mount_point, e)))?;

    // block counts are 32 bit on some targets
    Ok(DiskSpace::from_blocks(
        stats.blocks() as u64,
        stats.blocks_free() as u64,
        stats.blocks_available() as u64,
        stats.fragment_size() as u64,
    ))
}

/// Turn `(mount point, disk space)` pairs into MiB usage.
pub fn summarize<I>(partitions: I) -> BTreeMap<String, StorageUsage>
where
    I: IntoIterator<Item = (String, DiskSpace)>,
{
    let mut usage = BTreeMap::new();

    for (mount_point, space) in partitions {
        if mount_point.starts_with(SKIPPED_PREFIX) {
            tracing::debug!("Skip storage data for {}", mount_point);
            continue;
        }

        usage.insert(
            mount_point,
            StorageUsage {
                total: to_mebibytes(space.total),
                used: to_mebibytes(space.used),
                free: to_mebibytes(space.free),
            },
        );
    }

    usage
}

/// Bytes to MiB, 1 decimal.
pub fn to_mebibytes(bytes: u64) -> f64 {
    round_to(bytes as f64 / MEBIBYTE, 1)
}
