//! hoststream binary
//!
//! Collects one host metrics snapshot and publishes it, keyed by hostname.
//! Meant to be run on a schedule (cron, systemd timer).

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use hoststream::{logging, Collector, JsonLinesPublisher, Publisher, Record, Settings, SystemError};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn, Instrument};

/// How long shutdown waits for blocking probe work, such as a statvfs on a
/// dead network mount.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(name = "hoststream")]
#[command(about = "Probe host temperatures, usage and throughput, then publish one snapshot")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Append published records to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Echo everything written to the log file on the terminal
    #[arg(short, long)]
    verbose: bool,

    /// Log at DEBUG level
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Collect once and publish (default)
    Publish,

    /// Collect once and print the record as pretty JSON
    Snapshot,

    /// Print the resolved device identity
    Identify,
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let runtime = build_runtime()?;
    let result = runtime.block_on(run(cli));
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

fn build_runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Could not start the async runtime")
}

/// Apply command line overrides to the configured log settings.
fn apply_log_flags(cli: &Cli, settings: &mut Settings) {
    if cli.debug {
        settings.log.level = "DEBUG".to_string();
    }
    settings.log.verbose = cli.verbose;
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut settings = Settings::from_env().context("Invalid configuration")?;
    apply_log_flags(&cli, &mut settings);
    logging::init(&settings.log).context("Could not initialise logging")?;

    let span = tracing::info_span!("run", cid = %logging::correlation_id());
    async move {
        info!(
            "{s}- Start {} v{} {s}-",
            settings.app_name,
            settings.app_version,
            s = "-*".repeat(5)
        );

        let collector = match Collector::new(&settings.collector).await {
            Ok(collector) => collector,
            Err(err) => abort(err),
        };
        debug!("Device: {}", collector.device());

        match cli.command.unwrap_or(Commands::Publish) {
            Commands::Publish => publish_command(&collector, &settings, cli.output).await,
            Commands::Snapshot => snapshot_command(&collector).await,
            Commands::Identify => {
                println!("{}", collector.device());
                Ok(())
            }
        }
    }
    .instrument(span)
    .await
}

fn abort(err: SystemError) -> ! {
    debug!("{}", err);
    error!("Could not start Collector: ABORT!");
    warn!("Note: increase the log level to get more details on this error");
    std::process::exit(1);
}

async fn publish_command(
    collector: &Collector,
    settings: &Settings,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let record = collect_record(collector).await;
    debug!("To stream: {:?}", record.value);

    let key = Some(collector.device());
    match output {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Could not open {}", path.display()))?;
            JsonLinesPublisher::new(file)
                .publish(&[record], &settings.topic, key)
                .await?;
        }
        None => {
            JsonLinesPublisher::stdout()
                .publish(&[record], &settings.topic, key)
                .await?;
        }
    }

    info!("Published");
    Ok(())
}

async fn snapshot_command(collector: &Collector) -> anyhow::Result<()> {
    let record = collect_record(collector).await;
    println!("{}", serde_json::to_string_pretty(&record.value)?);
    Ok(())
}

async fn collect_record(collector: &Collector) -> Record {
    let snapshot = collector.data().await;
    Record::from_snapshot(collector.device(), Utc::now(), &snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli =
            Cli::try_parse_from(["hoststream", "--output", "/tmp/out.jsonl", "snapshot"]).unwrap();
        assert_eq!(cli.output, Some(PathBuf::from("/tmp/out.jsonl")));
        assert_eq!(cli.command, Some(Commands::Snapshot));
    }

    #[test]
    fn test_log_flags() {
        let mut settings = Settings::default();
        let cli = Cli::try_parse_from(["hoststream", "--verbose"]).unwrap();
        apply_log_flags(&cli, &mut settings);
        assert_eq!(settings.log.level, "INFO");
        assert!(settings.log.verbose);
        assert_eq!(logging::terminal_level(&settings.log), tracing::Level::INFO);

        let mut settings = Settings::default();
        let cli = Cli::try_parse_from(["hoststream", "-d"]).unwrap();
        apply_log_flags(&cli, &mut settings);
        assert_eq!(settings.log.level, "DEBUG");
        assert!(!settings.log.verbose);
    }

    #[test]
    fn test_shutdown_does_not_wait_for_stuck_blocking_work() {
        let runtime = build_runtime().unwrap();
        runtime.block_on(async {
            tokio::task::spawn_blocking(|| std::thread::sleep(Duration::from_secs(10)));
        });

        let started = std::time::Instant::now();
        runtime.shutdown_timeout(SHUTDOWN_GRACE);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_default_values() {
        let cli = Cli::try_parse_from(["hoststream"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.output.is_none());
        assert!(!cli.verbose);
        assert!(!cli.debug);
    }
}
