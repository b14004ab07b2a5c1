//! # hoststream - host metrics snapshots
//!
//! Probes host hardware and OS metrics (CPU/GPU temperature, CPU/RAM usage,
//! network throughput, disk usage) concurrently and merges them into a single
//! snapshot, ready to be published to a message topic keyed by hostname.
//!
//! ## Features
//!
//! - **Concurrent probes**: every source runs in its own task with a deadline
//! - **Partial data over no data**: a failing probe only loses its own values
//! - **Freshness gate**: repeated requests within a cooldown reuse the last snapshot
//! - **Library + Binary**: use the collector as a crate or run the CLI once per schedule
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hoststream::{Collector, CollectorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let collector = Collector::new(&CollectorConfig::default()).await?;
//!     let snapshot = collector.data().await;
//!     println!("{}: {}", collector.device(), serde_json::to_string(&snapshot)?);
//!     Ok(())
//! }
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod publish;

// Re-export public API
pub use command::{CommandOutput, CommandRunner, ShellRunner};
pub use config::{CollectorConfig, CommandPaths, LogConfig, Settings};
pub use error::{Result, SystemError};
pub use metrics::{
    collector::Collector,
    data::{Fragment, MergeStrategy, Snapshot},
    traits::{Probe, ProbeDescriptor},
};
pub use publish::{JsonLinesPublisher, Publisher, Record, TopicConfig};

/// Seconds during which repeated collection requests reuse the last snapshot
pub const DEFAULT_THRESHOLD_SECS: u64 = 20;

/// Deadline for a single probe within a collection cycle
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 10;

/// CPU usage sampling window in milliseconds
pub const DEFAULT_CPU_SAMPLE_MS: u64 = 1000;
