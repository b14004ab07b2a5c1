//! Tracing setup: compact stderr output plus a rotated JSON log file.

use crate::config::LogConfig;
use crate::error::{Result, SystemError};
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Map a configured level name to a tracing level.
///
/// Only DEBUG, INFO and WARNING are honoured; more severe names clamp to
/// WARNING and unknown names fall back to INFO.
pub fn parse_level(name: &str) -> Level {
    match name.trim().to_uppercase().as_str() {
        "TRACE" | "DEBUG" => Level::DEBUG,
        "INFO" => Level::INFO,
        "WARN" | "WARNING" | "ERROR" | "CRITICAL" => Level::WARN,
        _ => Level::INFO,
    }
}

/// The terminal only shows records one step more severe than the file.
pub fn stderr_level(file_level: Level) -> Level {
    match file_level {
        Level::TRACE => Level::DEBUG,
        Level::DEBUG => Level::INFO,
        Level::INFO => Level::WARN,
        _ => Level::ERROR,
    }
}

/// Terminal level for a config: the file level when verbose, one step
/// quieter otherwise.
pub fn terminal_level(config: &LogConfig) -> Level {
    let level = parse_level(&config.level);
    if config.verbose {
        level
    } else {
        stderr_level(level)
    }
}

/// Short correlation id attached to every record of one run.
pub fn correlation_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Path of the `n`-th rotated file, e.g. `hoststream.1.log`.
pub fn rotated_path(config: &LogConfig, n: usize) -> PathBuf {
    config.logs_dir.join(format!("{}.{}.log", config.name, n))
}

/// Rotate the live log file once it outgrows the configured size.
///
/// Returns whether a rotation happened.
pub fn rotate_if_needed(config: &LogConfig) -> Result<bool> {
    let path = config.log_path();
    let size = match fs::metadata(&path) {
        Ok(metadata) => metadata.len(),
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    if size < config.rotation_bytes() {
        return Ok(false);
    }

    if config.max_rotated_files == 0 {
        fs::remove_file(&path)?;
        return Ok(true);
    }

    for n in (1..config.max_rotated_files).rev() {
        let from = rotated_path(config, n);
        if from.exists() {
            fs::rename(&from, rotated_path(config, n + 1))?;
        }
    }
    fs::rename(&path, rotated_path(config, 1))?;

    Ok(true)
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the terminal level; the file always follows the
/// configured level.
pub fn init(config: &LogConfig) -> Result<()> {
    fs::create_dir_all(&config.logs_dir)?;
    let rotated = rotate_if_needed(config)?;

    let log_path = config.log_path();
    let file = OpenOptions::new().create(true).append(true).open(&log_path)?;

    let level = parse_level(&config.level);
    let stderr_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(terminal_level(config)).into())
        .from_env_lossy();

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_filter(stderr_filter);

    let file_layer = fmt::layer()
        .json()
        .with_writer(Mutex::new(file))
        .with_current_span(true)
        .with_span_list(false)
        .with_filter(LevelFilter::from_level(level));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| SystemError::config_error(format!("Failed to install logger: {}", e)))?;

    tracing::info!("Logs will be stored in the UTC timezone, in {}", log_path.display());
    tracing::debug!(
        "I will rotate {} log files, at {} bytes{}",
        config.max_rotated_files,
        config.rotation_bytes(),
        if rotated { " (rotated on startup)" } else { "" }
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config_in(dir: &std::path::Path, max_files: usize) -> LogConfig {
        LogConfig {
            name: "probe".to_string(),
            logs_dir: dir.to_path_buf(),
            rotation_max_mb: 1.0 / 1024.0,
            max_rotated_files: max_files,
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_level_clamps() {
        assert_eq!(parse_level("debug"), Level::DEBUG);
        assert_eq!(parse_level("INFO"), Level::INFO);
        assert_eq!(parse_level("WARNING"), Level::WARN);
        assert_eq!(parse_level("CRITICAL"), Level::WARN);
        assert_eq!(parse_level("verbose"), Level::INFO);
    }

    #[test]
    fn test_stderr_is_less_verbose() {
        assert_eq!(stderr_level(Level::DEBUG), Level::INFO);
        assert_eq!(stderr_level(Level::INFO), Level::WARN);
        assert_eq!(stderr_level(Level::WARN), Level::ERROR);
    }

    #[test]
    fn test_verbose_shows_file_level_on_terminal() {
        let mut config = LogConfig::default();
        assert_eq!(terminal_level(&config), Level::WARN);

        config.verbose = true;
        assert_eq!(terminal_level(&config), Level::INFO);

        config.level = "DEBUG".to_string();
        assert_eq!(terminal_level(&config), Level::DEBUG);
    }

    #[test]
    fn test_correlation_id_shape() {
        let cid = correlation_id();
        assert_eq!(cid.len(), 8);
        assert!(cid.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_small_file_not_rotated() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path(), 2);
        fs::write(config.log_path(), b"tiny").unwrap();

        assert!(!rotate_if_needed(&config).unwrap());
        assert!(config.log_path().exists());
    }

    #[test]
    fn test_missing_file_not_rotated() {
        let dir = tempdir().unwrap();
        assert!(!rotate_if_needed(&config_in(dir.path(), 2)).unwrap());
    }

    #[test]
    fn test_rotation_shifts_and_caps() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path(), 2);
        let big = vec![b'x'; 2048];

        fs::write(config.log_path(), &big).unwrap();
        assert!(rotate_if_needed(&config).unwrap());
        assert!(!config.log_path().exists());
        assert!(rotated_path(&config, 1).exists());

        fs::write(config.log_path(), &big).unwrap();
        fs::write(rotated_path(&config, 1), b"older").unwrap();
        assert!(rotate_if_needed(&config).unwrap());
        assert_eq!(fs::read(rotated_path(&config, 2)).unwrap(), b"older");
        assert_eq!(fs::read(rotated_path(&config, 1)).unwrap(), big);

        fs::write(config.log_path(), &big).unwrap();
        assert!(rotate_if_needed(&config).unwrap());
        assert!(!rotated_path(&config, 3).exists());
    }
}
