//! Runtime configuration resolved from the environment.
//!
//! Every value is a plain string or number with a fallback default. Values are
//! read once, before the collector is constructed, and never change afterwards.

use crate::error::{Result, SystemError};
use crate::publish::TopicConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Paths to the external executables used by probes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandPaths {
    pub hostname: String,
    pub grep: String,
    pub cat: String,
    pub sensors: String,
    pub nvidia: String,
}

impl Default for CommandPaths {
    fn default() -> Self {
        Self {
            hostname: "/usr/bin/hostname".to_string(),
            grep: "/usr/bin/grep".to_string(),
            cat: "/usr/bin/cat".to_string(),
            sensors: "/usr/bin/sensors".to_string(),
            nvidia: "/usr/bin/nvidia-smi".to_string(),
        }
    }
}

/// Collection pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Executables the probes shell out to
    pub commands: CommandPaths,
    /// Cooldown during which `Collector::data` returns the cached snapshot
    pub threshold_secs: u64,
    /// Deadline for a single probe within a cycle
    pub probe_timeout_secs: u64,
    /// CPU usage sampling window in milliseconds
    pub cpu_sample_ms: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            commands: CommandPaths::default(),
            threshold_secs: crate::DEFAULT_THRESHOLD_SECS,
            probe_timeout_secs: crate::DEFAULT_PROBE_TIMEOUT_SECS,
            cpu_sample_ms: crate::DEFAULT_CPU_SAMPLE_MS,
        }
    }
}

impl CollectorConfig {
    /// Set the executable paths.
    pub fn with_commands(mut self, commands: CommandPaths) -> Self {
        self.commands = commands;
        self
    }

    /// Set the freshness threshold in seconds.
    pub fn with_threshold_secs(mut self, secs: u64) -> Self {
        self.threshold_secs = secs;
        self
    }

    /// Set the per-probe timeout in seconds.
    pub fn with_probe_timeout_secs(mut self, secs: u64) -> Self {
        self.probe_timeout_secs = secs;
        self
    }

    /// Set the CPU sampling window in milliseconds.
    pub fn with_cpu_sample_ms(mut self, ms: u64) -> Self {
        self.cpu_sample_ms = ms;
        self
    }

    pub fn threshold(&self) -> Duration {
        Duration::from_secs(self.threshold_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn cpu_sample(&self) -> Duration {
        Duration::from_millis(self.cpu_sample_ms)
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Logger name, also the log file stem
    pub name: String,
    /// One of DEBUG, INFO, WARNING (anything else falls back to INFO)
    pub level: String,
    /// Directory holding the JSON log file and its rotations
    pub logs_dir: PathBuf,
    /// Rotate the log file once it grows past this many MiB
    pub rotation_max_mb: f64,
    /// Number of rotated files to keep
    pub max_rotated_files: usize,
    /// Show the file's level on the terminal too
    #[serde(default)]
    pub verbose: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            name: "hoststream".to_string(),
            level: "INFO".to_string(),
            logs_dir: std::env::temp_dir().join("hoststream"),
            rotation_max_mb: 9.0,
            max_rotated_files: 5,
            verbose: false,
        }
    }
}

impl LogConfig {
    /// Rotation threshold in bytes.
    pub fn rotation_bytes(&self) -> u64 {
        (self.rotation_max_mb * 1024.0 * 1024.0) as u64
    }

    /// Path of the live log file.
    pub fn log_path(&self) -> PathBuf {
        self.logs_dir.join(format!("{}.log", self.name))
    }
}

/// Complete application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub app_name: String,
    pub app_version: String,
    pub project_name: String,
    pub collector: CollectorConfig,
    pub log: LogConfig,
    pub topic: TopicConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "hoststream".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            project_name: "hoststream".to_string(),
            collector: CollectorConfig::default(),
            log: LogConfig::default(),
            topic: TopicConfig::new("hoststream"),
        }
    }
}

impl Settings {
    /// Resolve settings from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve settings through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| -> String {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let app_name = get("APP_NAME", "hoststream");
        let app_version = get("APP_VERSION", env!("CARGO_PKG_VERSION"));
        let project_name = get("PROJECT_NAME", &app_name).replace(' ', "-").to_lowercase();

        let defaults = CommandPaths::default();
        let commands = CommandPaths {
            hostname: get("HOSTNAME_CMD_PATH", &defaults.hostname),
            grep: get("GREP_CMD_PATH", &defaults.grep),
            cat: get("CAT_CMD_PATH", &defaults.cat),
            sensors: get("SENSORS_CMD_PATH", &defaults.sensors),
            nvidia: get("NVIDIA_CMD_PATH", &defaults.nvidia),
        };

        let collector = CollectorConfig {
            commands,
            threshold_secs: parse_var(
                "RETRIEVAL_THRESHOLD_SECS",
                &get("RETRIEVAL_THRESHOLD_SECS", &crate::DEFAULT_THRESHOLD_SECS.to_string()),
            )?,
            probe_timeout_secs: parse_var(
                "PROBE_TIMEOUT_SECS",
                &get("PROBE_TIMEOUT_SECS", &crate::DEFAULT_PROBE_TIMEOUT_SECS.to_string()),
            )?,
            cpu_sample_ms: parse_var(
                "CPU_SAMPLE_MS",
                &get("CPU_SAMPLE_MS", &crate::DEFAULT_CPU_SAMPLE_MS.to_string()),
            )?,
        };

        let default_logs_dir = std::env::temp_dir().join(&project_name);
        let log = LogConfig {
            name: project_name.clone(),
            level: get("LOG_LEVEL", "INFO").to_uppercase(),
            logs_dir: lookup("LOGS_DIR")
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(default_logs_dir),
            rotation_max_mb: parse_var("LOG_ROTATION_MAX_MB", &get("LOG_ROTATION_MAX_MB", "9"))?,
            max_rotated_files: parse_var(
                "LOG_MAX_ROTATED_FILES",
                &get("LOG_MAX_ROTATED_FILES", "5"),
            )?,
            verbose: false,
        };

        let topic = TopicConfig::new(get("KAFKA_TOPIC", &project_name))
            .with_brokers(parse_brokers(&get("KAFKA_BROKERS", "")))
            .with_partitions(parse_var("KAFKA_PARTITIONS", &get("KAFKA_PARTITIONS", "1"))?)
            .with_retention_days(parse_var(
                "KAFKA_RETENTION_DAYS",
                &get("KAFKA_RETENTION_DAYS", "3"),
            )?);

        let settings = Self {
            app_name,
            app_version,
            project_name,
            collector,
            log,
            topic,
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.collector.probe_timeout_secs == 0 {
            return Err(SystemError::config_error(
                "PROBE_TIMEOUT_SECS must be at least 1 second",
            ));
        }

        if self.collector.cpu_sample() >= self.collector.probe_timeout() {
            return Err(SystemError::config_error(format!(
                "CPU_SAMPLE_MS ({}) must be shorter than PROBE_TIMEOUT_SECS ({}s)",
                self.collector.cpu_sample_ms, self.collector.probe_timeout_secs
            )));
        }

        if self.topic.partitions == 0 {
            return Err(SystemError::config_error(
                "KAFKA_PARTITIONS must be at least 1",
            ));
        }

        if self.log.rotation_max_mb <= 0.0 {
            return Err(SystemError::config_error(
                "LOG_ROTATION_MAX_MB must be positive",
            ));
        }

        Ok(())
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| {
            SystemError::config_error(format!("Invalid value {:?} for {}: {}", raw, key, e))
        })
}

/// Split a comma separated broker list, dropping blanks, sorted.
pub fn parse_brokers(raw: &str) -> Vec<String> {
    let mut brokers: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|broker| !broker.is_empty())
        .map(str::to_string)
        .collect();
    brokers.sort();
    brokers
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(|_| None).unwrap();
        assert_eq!(settings.app_name, "hoststream");
        assert_eq!(settings.project_name, "hoststream");
        assert_eq!(settings.collector.threshold_secs, 20);
        assert_eq!(settings.collector.cpu_sample_ms, 1000);
        assert_eq!(settings.collector.commands.hostname, "/usr/bin/hostname");
        assert_eq!(settings.log.level, "INFO");
        assert_eq!(settings.log.max_rotated_files, 5);
        assert_eq!(settings.topic.name, "hoststream");
        assert_eq!(settings.topic.partitions, 1);
        assert_eq!(settings.topic.retention_days, 3);
        assert!(settings.topic.brokers.is_empty());
    }

    #[test]
    fn test_project_name_derived_from_app_name() {
        let settings =
            Settings::from_lookup(lookup_from(&[("APP_NAME", "Host Stream Probe")])).unwrap();
        assert_eq!(settings.project_name, "host-stream-probe");
        assert_eq!(settings.log.name, "host-stream-probe");
        assert_eq!(settings.topic.name, "host-stream-probe");
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("SENSORS_CMD_PATH", "/opt/bin/sensors"),
            ("KAFKA_BROKERS", "b:9092, a:9092,,"),
            ("KAFKA_TOPIC", "metrics"),
            ("KAFKA_RETENTION_DAYS", "7"),
            ("LOG_LEVEL", "debug"),
            ("LOGS_DIR", "/var/log/hoststream"),
            ("RETRIEVAL_THRESHOLD_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(settings.collector.commands.sensors, "/opt/bin/sensors");
        assert_eq!(settings.collector.threshold_secs, 5);
        assert_eq!(settings.topic.brokers, vec!["a:9092", "b:9092"]);
        assert_eq!(settings.topic.name, "metrics");
        assert_eq!(settings.topic.retention_days, 7);
        assert_eq!(settings.log.level, "DEBUG");
        assert_eq!(settings.log.logs_dir, PathBuf::from("/var/log/hoststream"));
    }

    #[test]
    fn test_invalid_number_is_config_error() {
        let err = Settings::from_lookup(lookup_from(&[("KAFKA_PARTITIONS", "many")])).unwrap_err();
        assert!(matches!(err, SystemError::Config(_)));
        assert!(err.to_string().contains("KAFKA_PARTITIONS"));
    }

    #[test]
    fn test_zero_partitions_rejected() {
        let err = Settings::from_lookup(lookup_from(&[("KAFKA_PARTITIONS", "0")])).unwrap_err();
        assert!(matches!(err, SystemError::Config(_)));
    }

    #[test]
    fn test_cpu_sample_must_fit_probe_timeout() {
        let err = Settings::from_lookup(lookup_from(&[
            ("PROBE_TIMEOUT_SECS", "2"),
            ("CPU_SAMPLE_MS", "2000"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("CPU_SAMPLE_MS"));

        let settings = Settings::from_lookup(lookup_from(&[
            ("PROBE_TIMEOUT_SECS", "2"),
            ("CPU_SAMPLE_MS", "1999"),
        ]))
        .unwrap();
        assert_eq!(settings.collector.cpu_sample_ms, 1999);
    }

    #[test]
    fn test_log_paths() {
        let log = LogConfig {
            logs_dir: PathBuf::from("/tmp/x"),
            rotation_max_mb: 1.0,
            ..Default::default()
        };
        assert_eq!(log.log_path(), PathBuf::from("/tmp/x/hoststream.log"));
        assert_eq!(log.rotation_bytes(), 1024 * 1024);
    }

    #[test]
    fn test_collector_config_builders() {
        let config = CollectorConfig::default()
            .with_threshold_secs(1)
            .with_probe_timeout_secs(2)
            .with_cpu_sample_ms(50);
        assert_eq!(config.threshold(), Duration::from_secs(1));
        assert_eq!(config.probe_timeout(), Duration::from_secs(2));
        assert_eq!(config.cpu_sample(), Duration::from_millis(50));
    }
}
