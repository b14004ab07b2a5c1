//! NVIDIA driver GPU temperature probe.

use super::{run_checked, FailureContext};
use crate::command::CommandRunner;
use crate::error::{Result, SystemError};
use crate::metrics::data::Fragment;
use crate::metrics::traits::Probe;
use async_trait::async_trait;
use std::sync::Arc;

const CONTEXT: FailureContext = FailureContext {
    action: "probe nvidia",
    advice: "install nvidia-smi, if compatible",
    variables: "NVIDIA_CMD_PATH (nvidia-smi)",
    subject: "nvidia",
};

pub struct NvidiaProbe {
    runner: Arc<dyn CommandRunner>,
    command: String,
}

impl NvidiaProbe {
    pub fn new(runner: Arc<dyn CommandRunner>, nvidia_cmd: &str) -> Self {
        Self {
            runner,
            command: format!("{} --query-gpu=temperature.gpu --format=csv", nvidia_cmd),
        }
    }
}

#[async_trait]
impl Probe for NvidiaProbe {
    fn name(&self) -> &str {
        "nvidia"
    }

    async fn probe(&self) -> Result<Fragment> {
        tracing::debug!("Start nvidia probe");
        let output = run_checked(self.runner.as_ref(), &self.command, CONTEXT).await?;

        // header line, then one value per GPU
        let Some(line) = output.stdout.get(1) else {
            tracing::debug!("No GPU temperature row in nvidia output");
            return Ok(Fragment::new());
        };

        let temperature: f64 = line
            .trim()
            .parse()
            .map_err(|e| {
                SystemError::parse_error(format!("nvidia temperature {:?}: {}", line, e))
            })?;
        tracing::debug!("Fetched data: {}", temperature);

        Ok(Fragment::single("gpu", temperature))
    }
}
