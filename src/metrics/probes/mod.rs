//! The probe set: one module per external data source.

pub mod network;
pub mod nvidia;
pub mod sensors;
pub mod storage;
pub mod thermal;
pub mod usage;

pub use network::NetworkProbe;
pub use nvidia::NvidiaProbe;
pub use sensors::SensorsProbe;
pub use storage::StorageProbe;
pub use thermal::ThermalZoneProbe;
pub use usage::{CpuUsageProbe, MemoryUsageProbe};

use crate::command::{CommandOutput, CommandRunner};
use crate::config::CollectorConfig;
use crate::error::{Result, SystemError};
use crate::metrics::traits::ProbeDescriptor;
use std::sync::Arc;

/// How a command-based probe explains its own failure.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FailureContext {
    /// What the probe was doing, e.g. "probe sensors"
    pub action: &'static str,
    /// Advice shown for every failure
    pub advice: &'static str,
    /// Variables holding the command paths involved
    pub variables: &'static str,
    /// Noun used when the command printed nothing
    pub subject: &'static str,
}

/// Run a probe command, treating empty stdout as a failure.
pub(crate) async fn run_checked(
    runner: &dyn CommandRunner,
    command: &str,
    context: FailureContext,
) -> Result<CommandOutput> {
    let result = match runner.run(command).await {
        Ok(output) if output.is_empty() => {
            Err(SystemError::execution(format!("no {} data", context.subject)))
        }
        other => other,
    };

    match result {
        Ok(output) => {
            tracing::debug!("Command returned: {:?}", output.stdout);
            Ok(output)
        }
        Err(err) => {
            let detail = if err.is_not_found() {
                format!(
                    "update {} and then check the .env file",
                    context.variables
                )
            } else {
                err.to_string()
            };
            Err(SystemError::execution(format!(
                "Could not {}: {}\n{}",
                context.action, context.advice, detail
            )))
        }
    }
}

/// The standard probe wiring.
///
/// Network and storage have a single source each, so their values replace the
/// whole category instead of nesting under a label.
pub fn default_probes(
    runner: Arc<dyn CommandRunner>,
    config: &CollectorConfig,
) -> Vec<ProbeDescriptor> {
    let commands = &config.commands;
    vec![
        ProbeDescriptor::nested(
            "sensors",
            SensorsProbe::new(runner.clone(), &commands.sensors, &commands.grep),
        ),
        ProbeDescriptor::nested(
            "thermal_zones",
            ThermalZoneProbe::new(runner.clone(), &commands.cat),
        ),
        ProbeDescriptor::nested("nvidia", NvidiaProbe::new(runner.clone(), &commands.nvidia)),
        ProbeDescriptor::replacing("procfs", NetworkProbe::new(runner, &commands.cat)),
        ProbeDescriptor::replacing("shutil", StorageProbe::new()),
        ProbeDescriptor::nested("usage", CpuUsageProbe::new(config.cpu_sample())),
        ProbeDescriptor::nested("usage", MemoryUsageProbe::new()),
    ]
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Runner answering every command with the same canned result.
    pub struct CannedRunner {
        result: std::result::Result<String, String>,
        pub commands: Mutex<Vec<String>>,
    }

    impl CannedRunner {
        pub fn stdout(stdout: &str) -> Self {
            Self {
                result: Ok(stdout.to_string()),
                commands: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(stderr: &str) -> Self {
            Self {
                result: Err(stderr.to_string()),
                commands: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CommandRunner for CannedRunner {
        async fn run(&self, command: &str) -> Result<CommandOutput> {
            self.commands.lock().unwrap().push(command.to_string());
            match &self.result {
                Ok(stdout) => Ok(CommandOutput::from_stdout(command, stdout)),
                Err(stderr) => Err(SystemError::execution(stderr.clone())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::CannedRunner;
    use super::*;
    use crate::metrics::data::MergeStrategy;

    const CONTEXT: FailureContext = FailureContext {
        action: "probe widgets",
        advice: "install widgets",
        variables: "WIDGET_CMD_PATH",
        subject: "widget",
    };

    #[tokio::test]
    async fn test_empty_stdout_is_failure() {
        let runner = CannedRunner::stdout("\n\n");
        let err = run_checked(&runner, "widgets", CONTEXT).await.unwrap_err();
        assert_eq!(err.to_string(), "Could not probe widgets: install widgets\nno widget data");
    }

    #[tokio::test]
    async fn test_not_found_names_variables() {
        let runner = CannedRunner::failing("sh: 1: widgets: not found");
        let err = run_checked(&runner, "widgets", CONTEXT).await.unwrap_err();
        assert!(err.to_string().ends_with("update WIDGET_CMD_PATH and then check the .env file"));
    }

    #[test]
    fn test_default_wiring() {
        let runner: Arc<dyn CommandRunner> = Arc::new(CannedRunner::stdout(""));
        let probes = default_probes(runner, &CollectorConfig::default());
        let labels: Vec<_> = probes.iter().map(|d| (d.label, d.merge)).collect();
        assert_eq!(
            labels,
            vec![
                ("sensors", MergeStrategy::Nest),
                ("thermal_zones", MergeStrategy::Nest),
                ("nvidia", MergeStrategy::Nest),
                ("procfs", MergeStrategy::Replace),
                ("shutil", MergeStrategy::Replace),
                ("usage", MergeStrategy::Nest),
                ("usage", MergeStrategy::Nest),
            ]
        );
    }
}
