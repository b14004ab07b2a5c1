//! lm-sensors temperature probe.

use super::{run_checked, FailureContext};
use crate::command::CommandRunner;
use crate::error::{Result, SystemError};
use crate::metrics::data::{ElectedReading, Fragment};
use crate::metrics::traits::Probe;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Label substrings kept from the `sensors` output.
pub const SENSOR_FILTERS: [&str; 5] = ["Package", "Tctl", "CPU", "GPU", "edge"];

/// Priority-ordered sensor keys per category. First present key wins.
pub const ELECTIONS: [(&str, &[&str]); 2] = [
    ("cpu", &["Package id 0", "Tctl", "CPU", "coretemp"]),
    ("gpu", &["GPU", "GPU temp", "edge"]),
];

const CONTEXT: FailureContext = FailureContext {
    action: "probe sensors",
    advice: "install lm-sensors, if possible",
    variables: "SENSORS_CMD_PATH and GREP_CMD_PATH",
    subject: "sensors",
};

pub struct SensorsProbe {
    runner: Arc<dyn CommandRunner>,
    command: String,
}

impl SensorsProbe {
    pub fn new(runner: Arc<dyn CommandRunner>, sensors_cmd: &str, grep_cmd: &str) -> Self {
        let filters = SENSOR_FILTERS.join(" -e ");
        Self {
            runner,
            command: format!(
                "{s} | {g} -e {f} | {g} °C",
                s = sensors_cmd,
                g = grep_cmd,
                f = filters
            ),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

#[async_trait]
impl Probe for SensorsProbe {
    fn name(&self) -> &str {
        "sensors"
    }

    async fn probe(&self) -> Result<Fragment> {
        tracing::debug!("Start sensors probe");
        let output = run_checked(self.runner.as_ref(), &self.command, CONTEXT).await?;

        let readings = parse_readings(&output.stdout);
        if readings.is_empty() {
            return Err(SystemError::parse_error(format!(
                "no temperature reading in sensors output: {:?}",
                output.stdout
            )));
        }
        tracing::debug!("Parsed data: {:?}", readings);

        let mut fragment = Fragment::new();
        for (category, reading) in elect(&readings) {
            fragment.insert(category, serde_json::to_value(reading)?);
        }
        Ok(fragment)
    }
}

/// Parse `key: +70.0°C  (high = ...)` lines into `key -> celsius`.
///
/// Lines without a colon or a numeric first token are skipped.
pub fn parse_readings(lines: &[String]) -> BTreeMap<String, f64> {
    let mut readings = BTreeMap::new();

    for line in lines {
        let Some((key, rest)) = line.split_once(':') else {
            tracing::debug!("Skip sensors line without a label: {:?}", line);
            continue;
        };

        match rest.split_whitespace().next().and_then(parse_temperature) {
            Some(value) => {
                readings.insert(key.trim().to_string(), value);
            }
            None => tracing::debug!("Skip sensors line without a reading: {:?}", line),
        }
    }

    readings
}

/// Strip everything but digits, sign and decimal point, then parse.
pub fn parse_temperature(token: &str) -> Option<f64> {
    let cleaned: String = token
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '+' | '-'))
        .collect();
    cleaned.parse().ok()
}

/// Pick one reading per category from the priority lists.
pub fn elect(readings: &BTreeMap<String, f64>) -> Vec<(&'static str, ElectedReading)> {
    ELECTIONS
        .iter()
        .filter_map(|(category, keys)| {
            let (key, value) = keys
                .iter()
                .find_map(|key| readings.get(*key).map(|value| (*key, *value)))?;

            let raw = keys
                .iter()
                .filter_map(|key| readings.get(*key).map(|value| (key.to_string(), *value)))
                .collect();

            Some((
                *category,
                ElectedReading {
                    value,
                    key: key.to_string(),
                    raw,
                },
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::probes::testing::CannedRunner;
    use serde_json::json;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_package_line_elects_cpu() {
        let readings = parse_readings(&lines(&["Package id 0:      +70.0°C  (high = +100.0°C)"]));
        let elected = elect(&readings);
        assert_eq!(elected.len(), 1);
        assert_eq!(elected[0].0, "cpu");
        assert_eq!(elected[0].1.value, 70.0);
        assert_eq!(elected[0].1.key, "Package id 0");
    }

    #[test]
    fn test_edge_line_elects_gpu() {
        let readings = parse_readings(&lines(&["edge:         +41.0°C  "]));
        let elected = elect(&readings);
        assert_eq!(elected.len(), 1);
        assert_eq!(elected[0].0, "gpu");
        assert_eq!(elected[0].1.value, 41.0);
    }

    #[test]
    fn test_priority_order_and_raw_retention() {
        let readings = parse_readings(&lines(&[
            "Tctl:         +43.1°C  ",
            "CPU:          +43.0°C  ",
            "GPU:           +0.0°C  ",
            "edge:         +41.0°C  ",
            "Core 0:       +39.0°C  ",
        ]));
        let elected = elect(&readings);

        let (_, cpu) = elected.iter().find(|(c, _)| *c == "cpu").unwrap();
        assert_eq!(cpu.key, "Tctl");
        assert_eq!(cpu.value, 43.1);
        assert_eq!(cpu.raw.len(), 2);
        assert_eq!(cpu.raw["CPU"], 43.0);

        let (_, gpu) = elected.iter().find(|(c, _)| *c == "gpu").unwrap();
        assert_eq!(gpu.key, "GPU");
        assert_eq!(gpu.value, 0.0);
        assert_eq!(gpu.raw["edge"], 41.0);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let readings = parse_readings(&lines(&["garbage", "CPU: N/A", "CPU:  +50.5°C"]));
        assert_eq!(readings.len(), 1);
        assert_eq!(readings["CPU"], 50.5);
    }

    #[test]
    fn test_parse_temperature() {
        assert_eq!(parse_temperature("+70.0°C"), Some(70.0));
        assert_eq!(parse_temperature("-3.5°C"), Some(-3.5));
        assert_eq!(parse_temperature("°C"), None);
    }

    #[test]
    fn test_command_shape() {
        let runner = Arc::new(CannedRunner::stdout(""));
        let probe = SensorsProbe::new(runner, "/usr/bin/sensors", "/usr/bin/grep");
        assert_eq!(
            probe.command(),
            "/usr/bin/sensors | /usr/bin/grep -e Package -e Tctl -e CPU -e GPU -e edge | /usr/bin/grep °C"
        );
    }

    #[tokio::test]
    async fn test_probe_fragment_shape() {
        let runner = Arc::new(CannedRunner::stdout(
            "Package id 0:  +58.0°C  (high = +100.0°C, crit = +100.0°C)\n",
        ));
        let probe = SensorsProbe::new(runner, "sensors", "grep");
        let fragment = probe.probe().await.unwrap();

        assert_eq!(
            fragment.get("cpu"),
            Some(&json!({"value": 58.0, "key": "Package id 0", "raw": {"Package id 0": 58.0}}))
        );
        assert!(fragment.get("gpu").is_none());
    }

    #[tokio::test]
    async fn test_unparsable_output_fails() {
        let runner = Arc::new(CannedRunner::stdout("no sensors found!\n"));
        let probe = SensorsProbe::new(runner, "sensors", "grep");
        let err = probe.probe().await.unwrap_err();
        assert!(matches!(err, SystemError::Parse(_)));
    }

    #[tokio::test]
    async fn test_missing_binary_hint() {
        let runner = Arc::new(CannedRunner::failing("sh: 1: sensors: not found"));
        let probe = SensorsProbe::new(runner, "sensors", "grep");
        let err = probe.probe().await.unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Could not probe sensors: install lm-sensors, if possible"));
        assert!(message.contains("SENSORS_CMD_PATH and GREP_CMD_PATH"));
    }
}
