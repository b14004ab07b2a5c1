//! Publishing snapshots as flat records.
//!
//! The broker client itself lives outside this crate. [`Publisher`] is the seam
//! it plugs into; [`JsonLinesPublisher`] writes the exact envelopes a broker
//! producer would send, one compact JSON line per record.

pub mod config;

pub use config::TopicConfig;

use crate::error::{Result, SystemError};
use crate::metrics::Snapshot;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Format of the `collected_at` field.
pub const COLLECTED_AT_FORMAT: &str = "%F %T +00:00";

/// One flat message ready for the broker.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Message timestamp in milliseconds since the Unix epoch
    pub timestamp_ms: u64,
    /// Message body
    pub value: Map<String, Value>,
}

impl Record {
    /// Build the published record for a snapshot.
    ///
    /// The snapshot's `epoch` moves to the message timestamp; the body carries
    /// the device identity, the collection time and every metric category.
    pub fn from_snapshot(device: &str, collected_at: DateTime<Utc>, snapshot: &Snapshot) -> Self {
        let mut value = Map::new();
        value.insert("device".to_string(), Value::String(device.to_string()));
        value.insert(
            "collected_at".to_string(),
            Value::String(collected_at.format(COLLECTED_AT_FORMAT).to_string()),
        );
        for (category, metrics) in &snapshot.metrics {
            value.insert(category.clone(), metrics.clone());
        }

        Self {
            timestamp_ms: snapshot.epoch * 1000,
            value,
        }
    }
}

/// Sink accepting flat records for a topic.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish records, returning how many were handed over.
    async fn publish(
        &self,
        records: &[Record],
        topic: &TopicConfig,
        key: Option<&str>,
    ) -> Result<usize>;
}

#[derive(Serialize)]
struct Envelope<'a> {
    topic: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<&'a str>,
    timestamp: u64,
    value: &'a Map<String, Value>,
}

/// Writes one compact JSON envelope per record to any writer.
pub struct JsonLinesPublisher<W: Write + Send> {
    writer: Mutex<W>,
    streamed: AtomicUsize,
}

impl JsonLinesPublisher<std::io::Stdout> {
    /// Publisher writing to standard output.
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonLinesPublisher<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            streamed: AtomicUsize::new(0),
        }
    }

    /// Total records written by this publisher.
    pub fn streamed(&self) -> usize {
        self.streamed.load(Ordering::SeqCst)
    }

    /// Recover the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl<W: Write + Send> Publisher for JsonLinesPublisher<W> {
    async fn publish(
        &self,
        records: &[Record],
        topic: &TopicConfig,
        key: Option<&str>,
    ) -> Result<usize> {
        tracing::debug!(
            "[Publish] Topic {:?}: {} partition(s), retention.ms={}, brokers={:?}",
            topic.name,
            topic.partitions,
            topic.retention_ms(),
            topic.bootstrap_servers()
        );

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| SystemError::publish_error("writer lock poisoned"))?;

        for record in records {
            let envelope = Envelope {
                topic: &topic.name,
                key,
                timestamp: record.timestamp_ms,
                value: &record.value,
            };
            serde_json::to_writer(&mut *writer, &envelope)?;
            writer.write_all(b"\n")?;

            let offset = self.streamed.fetch_add(1, Ordering::SeqCst);
            tracing::debug!("[Publish] Delivered to {:?} at offset {}", topic.name, offset);
        }
        writer.flush()?;

        tracing::debug!("[Publish] Streamed: {} messages", self.streamed());
        Ok(records.len())
    }
}
