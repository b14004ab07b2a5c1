//! Concurrent probe fan-out, fragment merge and the freshness gate.

use crate::command::{CommandRunner, ShellRunner};
use crate::config::CollectorConfig;
use crate::error::{Result, SystemError};
use crate::metrics::{
    data::{now_epoch, Fragment, Snapshot},
    identity,
    probes::default_probes,
    traits::ProbeDescriptor,
};
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::timeout;

/// Last attempted cycle and the snapshot it produced.
#[derive(Debug, Default)]
struct Freshness {
    last_attempt: Option<Instant>,
    last_snapshot: Option<Snapshot>,
}

/// Host metrics collector.
///
/// The device identity is resolved once on construction; every probe runs
/// concurrently on each cycle and a failing probe only loses its own data.
pub struct Collector {
    device: String,
    probes: Vec<ProbeDescriptor>,
    threshold: Duration,
    probe_timeout: Duration,
    freshness: Mutex<Freshness>,
}

impl Collector {
    /// Create a collector that shells out through `sh`.
    pub async fn new(config: &CollectorConfig) -> Result<Self> {
        Self::with_runner(config, Arc::new(ShellRunner::new())).await
    }

    /// Create a collector with a custom command runner.
    ///
    /// Fails with [`SystemError::Identity`] before any probe is wired up when
    /// the hostname cannot be resolved.
    pub async fn with_runner(
        config: &CollectorConfig,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self> {
        let device = identity::resolve(runner.as_ref(), &config.commands.hostname).await?;
        tracing::debug!("Device: {}", device);

        let probes = default_probes(runner, config);
        Ok(Self::from_parts(device, probes, config))
    }

    /// Assemble a collector from an already resolved identity and probe set.
    pub fn from_parts(
        device: impl Into<String>,
        probes: Vec<ProbeDescriptor>,
        config: &CollectorConfig,
    ) -> Self {
        Self {
            device: device.into(),
            probes,
            threshold: config.threshold(),
            probe_timeout: config.probe_timeout(),
            freshness: Mutex::new(Freshness::default()),
        }
    }

    /// The resolved device identity.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// The wired probes, in dispatch order.
    pub fn probes(&self) -> &[ProbeDescriptor] {
        &self.probes
    }

    /// Return the cached snapshot when it is fresh, otherwise run a new cycle.
    ///
    /// The attempt time is recorded before dispatch so a slow or failing cycle
    /// does not retrigger. Until the cycle finishes the cached snapshot is an
    /// empty one stamped with the attempt, so a cycle abandoned by its caller
    /// never leaves an older window's data looking fresh. Concurrent callers
    /// queue on the gate and receive the snapshot produced by whichever of them
    /// ran the cycle.
    pub async fn data(&self) -> Snapshot {
        tracing::debug!("Start data retrieval");
        let mut gate = self.freshness.lock().await;

        if let (Some(last_attempt), Some(snapshot)) =
            (gate.last_attempt, gate.last_snapshot.as_ref())
        {
            if last_attempt.elapsed() < self.threshold {
                tracing::debug!(
                    "Return recent data (queried less than {} seconds ago)",
                    self.threshold.as_secs()
                );
                return snapshot.clone();
            }
        }

        gate.last_attempt = Some(Instant::now());
        gate.last_snapshot = Some(Snapshot::new(now_epoch()));
        let snapshot = self.collect().await;
        gate.last_snapshot = Some(snapshot.clone());
        snapshot
    }

    /// Run every probe concurrently and merge whatever succeeded.
    pub async fn collect(&self) -> Snapshot {
        let mut snapshot = Snapshot::new(now_epoch());
        let checkpoint = Instant::now();

        let tasks = self.probes.iter().map(|descriptor| {
            let probe = descriptor.probe.clone();
            let deadline = self.probe_timeout;
            tokio::spawn(async move {
                match timeout(deadline, probe.probe()).await {
                    Ok(result) => result,
                    Err(_) => Err(SystemError::Timeout {
                        probe: probe.name().to_string(),
                        timeout_ms: deadline.as_millis() as u64,
                    }),
                }
            })
        });
        let results = join_all(tasks).await;

        for (descriptor, joined) in self.probes.iter().zip(results) {
            let label = descriptor.label;
            let fragment = match joined {
                Ok(Ok(fragment)) => fragment,
                Ok(Err(err)) => {
                    tracing::warn!("Task {:?} raised an error: {}", label, err);
                    continue;
                }
                Err(err) => {
                    tracing::warn!("Task {:?} did not complete: {}", label, err);
                    continue;
                }
            };

            if fragment.is_empty() {
                tracing::debug!("No data from {}", label);
                continue;
            }

            merge_fragment(&mut snapshot, descriptor, fragment);
        }

        tracing::debug!("Probe took {:.3} seconds", checkpoint.elapsed().as_secs_f64());
        snapshot
    }
}

fn merge_fragment(snapshot: &mut Snapshot, descriptor: &ProbeDescriptor, fragment: Fragment) {
    tracing::trace!(
        "Merge {:?} from {:?} ({:?})",
        fragment.categories().collect::<Vec<_>>(),
        descriptor.label,
        descriptor.merge
    );
    snapshot.merge(descriptor.label, descriptor.merge, fragment);
}
