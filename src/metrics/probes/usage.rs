//! CPU and RAM utilisation probes backed by sysinfo.

use crate::error::Result;
use crate::metrics::data::{round_to, Fragment};
use crate::metrics::traits::Probe;
use async_trait::async_trait;
use std::time::Duration;
use sysinfo::System;

/// Global CPU usage percentage, sampled over a fixed window.
#[derive(Debug)]
pub struct CpuUsageProbe {
    sample: Duration,
}

impl CpuUsageProbe {
    pub fn new(sample: Duration) -> Self {
        // sysinfo needs two refreshes at least this far apart
        Self {
            sample: sample.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL),
        }
    }
}

#[async_trait]
impl Probe for CpuUsageProbe {
    fn name(&self) -> &str {
        "cpu_usage"
    }

    async fn probe(&self) -> Result<Fragment> {
        let mut system = System::new();
        system.refresh_cpu_usage();
        tokio::time::sleep(self.sample).await;
        system.refresh_cpu_usage();

        let usage = round_to(system.global_cpu_usage() as f64, 1);
        tracing::debug!("sysinfo returned for CPU usage: {}", usage);

        Ok(Fragment::single("cpu", usage))
    }
}

/// Instantaneous RAM usage percentage.
#[derive(Debug, Default)]
pub struct MemoryUsageProbe;

impl MemoryUsageProbe {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Probe for MemoryUsageProbe {
    fn name(&self) -> &str {
        "ram_usage"
    }

    async fn probe(&self) -> Result<Fragment> {
        let mut system = System::new();
        system.refresh_memory();

        let Some(usage) = memory_percent(system.total_memory(), system.available_memory()) else {
            tracing::debug!("sysinfo reported no memory");
            return Ok(Fragment::new());
        };
        tracing::debug!("sysinfo returned for RAM usage: {}", usage);

        Ok(Fragment::single("ram", usage))
    }
}

/// `(total - available) / total * 100`, 1 decimal.
pub fn memory_percent(total: u64, available: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    let used = total.saturating_sub(available) as f64;
    Some(round_to(used / total as f64 * 100.0, 1))
}
