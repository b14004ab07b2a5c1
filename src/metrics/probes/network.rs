//! Network device counters from `/proc/net/dev`.

use super::{run_checked, FailureContext};
use crate::command::CommandRunner;
use crate::error::{Result, SystemError};
use crate::metrics::data::{round_to, Fragment, NetworkRate};
use crate::metrics::traits::Probe;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Loopback and container bridge interfaces never reported.
pub const IGNORED_INTERFACES: [&str; 6] = ["lo", "podman", "podman0", "docker", "docker0", "veth0"];

const RX_BYTES_FIELD: usize = 0;
const TX_BYTES_FIELD: usize = 8;
const HEADER_LINES: usize = 2;

const CONTEXT: FailureContext = FailureContext {
    action: "fetch network devices",
    advice: "hardware may not report via /proc",
    variables: "CAT_CMD_PATH",
    subject: "network device",
};

pub struct NetworkProbe {
    runner: Arc<dyn CommandRunner>,
    command: String,
}

impl NetworkProbe {
    pub fn new(runner: Arc<dyn CommandRunner>, cat_cmd: &str) -> Self {
        Self {
            runner,
            command: format!("{} /proc/net/dev", cat_cmd),
        }
    }
}

#[async_trait]
impl Probe for NetworkProbe {
    fn name(&self) -> &str {
        "procfs"
    }

    async fn probe(&self) -> Result<Fragment> {
        tracing::debug!("Start network devices fetch");
        let output = run_checked(self.runner.as_ref(), &self.command, CONTEXT).await?;

        if output.stdout.len() <= HEADER_LINES {
            return Err(SystemError::execution(format!(
                "Could not {}: {}\nno network device data",
                CONTEXT.action, CONTEXT.advice
            )));
        }

        let devices = parse_net_dev(&output.stdout)?;
        tracing::debug!("Fetched data: {:?}", devices);

        if devices.is_empty() {
            return Ok(Fragment::new());
        }
        Ok(Fragment::single("net", serde_json::to_value(devices)?))
    }
}

/// Parse `/proc/net/dev` rows (headers included) into megabit counters.
pub fn parse_net_dev(lines: &[String]) -> Result<BTreeMap<String, NetworkRate>> {
    let mut devices = BTreeMap::new();

    for line in lines.iter().skip(HEADER_LINES) {
        let (device, counters) = line.split_once(':').ok_or_else(|| {
            SystemError::parse_error(format!("network row without device: {:?}", line))
        })?;

        let device = device.trim();
        if IGNORED_INTERFACES.contains(&device) {
            continue;
        }

        let fields: Vec<&str> = counters.split_whitespace().collect();
        let rx = counter(&fields, RX_BYTES_FIELD, device)?;
        let tx = counter(&fields, TX_BYTES_FIELD, device)?;

        devices.insert(
            device.to_string(),
            NetworkRate {
                rx_megabits: bytes_to_megabits(rx),
                tx_megabits: bytes_to_megabits(tx),
            },
        );
    }

    Ok(devices)
}

fn counter(fields: &[&str], index: usize, device: &str) -> Result<u64> {
    fields
        .get(index)
        .ok_or_else(|| SystemError::parse_error(format!("{}: missing counter #{}", device, index)))?
        .parse()
        .map_err(|e| SystemError::parse_error(format!("{}: counter #{}: {}", device, index, e)))
}

/// `bytes * 8 / 1_000_000`, 1 decimal.
pub fn bytes_to_megabits(bytes: u64) -> f64 {
    round_to(bytes as f64 * 8.0 / 1_000_000.0, 1)
}
