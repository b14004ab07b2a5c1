//! Traits for metrics probes.

use crate::error::Result;
use crate::metrics::data::{Fragment, MergeStrategy};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// A single independent data-source fetch-and-normalize unit.
///
/// Implementations must return an empty fragment when the source is simply
/// absent (no GPU, no thermal zones) and an error only when the source
/// misbehaved. The collector treats errors as advisory.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &str;

    /// Fetch and normalize one reading.
    async fn probe(&self) -> Result<Fragment>;
}

/// Static wiring of a probe to its source label and merge strategy.
#[derive(Clone)]
pub struct ProbeDescriptor {
    pub label: &'static str,
    pub merge: MergeStrategy,
    pub probe: Arc<dyn Probe>,
}

impl ProbeDescriptor {
    /// Nest the probe's values under `label` inside each category.
    pub fn nested(label: &'static str, probe: impl Probe + 'static) -> Self {
        Self {
            label,
            merge: MergeStrategy::Nest,
            probe: Arc::new(probe),
        }
    }

    /// Let the probe's values replace whole categories.
    pub fn replacing(label: &'static str, probe: impl Probe + 'static) -> Self {
        Self {
            label,
            merge: MergeStrategy::Replace,
            probe: Arc::new(probe),
        }
    }
}

impl fmt::Debug for ProbeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeDescriptor")
            .field("label", &self.label)
            .field("merge", &self.merge)
            .field("probe", &self.probe.name())
            .finish()
    }
}
