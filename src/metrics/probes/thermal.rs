//! Kernel thermal-zone probe.

use super::{run_checked, FailureContext};
use crate::command::CommandRunner;
use crate::error::{Result, SystemError};
use crate::metrics::data::{round_to, Fragment};
use crate::metrics::traits::Probe;
use async_trait::async_trait;
use std::sync::Arc;

const CONTEXT: FailureContext = FailureContext {
    action: "fetch thermal zones",
    advice: "hardware may not report thermal zones",
    variables: "CAT_CMD_PATH",
    subject: "thermal zone",
};

/// Reads every `/sys/class/thermal/thermal_zone*/temp` file.
pub struct ThermalZoneProbe {
    runner: Arc<dyn CommandRunner>,
    command: String,
}

impl ThermalZoneProbe {
    pub fn new(runner: Arc<dyn CommandRunner>, cat_cmd: &str) -> Self {
        Self {
            runner,
            command: format!("{} /sys/class/thermal/thermal_zone*/temp", cat_cmd),
        }
    }
}

#[async_trait]
impl Probe for ThermalZoneProbe {
    fn name(&self) -> &str {
        "thermal_zones"
    }

    async fn probe(&self) -> Result<Fragment> {
        tracing::debug!("Start thermal zone fetch");
        let output = run_checked(self.runner.as_ref(), &self.command, CONTEXT).await?;

        let zones = parse_zones(&output.stdout)?;
        tracing::debug!("Fetched data: {:?}", zones);

        if zones.is_empty() {
            return Ok(Fragment::new());
        }
        Ok(Fragment::single("cpu", zones))
    }
}

/// Convert milli-degree lines to degrees, 3 decimals.
pub fn parse_zones(lines: &[String]) -> Result<Vec<f64>> {
    lines
        .iter()
        .map(|line| {
            line.trim()
                .parse::<f64>()
                .map(|millis| round_to(millis / 1000.0, 3))
                .map_err(|e| SystemError::parse_error(format!("thermal zone {:?}: {}", line, e)))
        })
        .collect()
}
