//! Device identity resolution.

use crate::command::CommandRunner;
use crate::error::{Result, SystemError};

/// Resolve the short hostname used as the message key for every publish.
///
/// There is no degraded mode: any failure here is fatal for the collector.
pub async fn resolve(runner: &dyn CommandRunner, hostname_cmd: &str) -> Result<String> {
    tracing::debug!("Start device identification");

    let command = format!("{} -s", hostname_cmd);
    let output = match runner.run(&command).await {
        Ok(output) => output,
        Err(err) if err.is_not_found() => {
            return Err(SystemError::identity(format!(
                "{}. Update HOSTNAME_CMD_PATH and check the .env file",
                err
            )));
        }
        Err(err) => return Err(SystemError::identity(err.to_string())),
    };
    tracing::debug!("Command returned: {:?}", output.stdout);

    output
        .stdout
        .first()
        .map(|line| line.trim().to_string())
        .filter(|device| !device.is_empty())
        .ok_or_else(|| SystemError::identity("no hostname data"))
}
