//! Host metrics collection and data structures.
//!
//! This module holds the probe set (sensors, thermal zones, GPU driver,
//! network counters, filesystem usage, CPU/RAM utilisation), the collector
//! that runs them concurrently and merges their fragments, and the device
//! identity lookup.

pub mod collector;
pub mod data;
pub mod identity;
pub mod probes;
pub mod traits;

// Re-export commonly used items
pub use collector::Collector;
pub use data::{Fragment, MergeStrategy, Snapshot};
pub use traits::{Probe, ProbeDescriptor};
