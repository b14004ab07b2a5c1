//! Topic configuration for the publish sink.

use serde::{Deserialize, Serialize};

const MILLIS_PER_DAY: u64 = 24 * 60 * 60 * 1000;

/// Where and how snapshots are published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicConfig {
    /// Topic name
    pub name: String,
    /// Broker addresses (`host:port`), sorted
    pub brokers: Vec<String>,
    /// Partition count used when the topic is created
    pub partitions: u32,
    /// Retention period in days
    pub retention_days: u32,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            name: "hoststream".to_string(),
            brokers: Vec::new(),
            partitions: 1,
            retention_days: 3,
        }
    }
}

impl TopicConfig {
    /// Create a topic configuration with default partitioning and retention.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the broker list. The list is kept sorted.
    pub fn with_brokers(mut self, mut brokers: Vec<String>) -> Self {
        brokers.sort();
        self.brokers = brokers;
        self
    }

    /// Set the partition count.
    pub fn with_partitions(mut self, partitions: u32) -> Self {
        self.partitions = partitions;
        self
    }

    /// Set the retention period in days.
    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    /// Retention period as the broker-side `retention.ms` value.
    pub fn retention_ms(&self) -> u64 {
        u64::from(self.retention_days) * MILLIS_PER_DAY
    }

    /// Comma joined broker list, as used for a bootstrap setting.
    pub fn bootstrap_servers(&self) -> String {
        self.brokers.join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retention_ms() {
        let topic = TopicConfig::new("metrics").with_retention_days(3);
        assert_eq!(topic.retention_ms(), 259_200_000);
    }

    #[test]
    fn test_brokers_sorted() {
        let topic = TopicConfig::new("metrics")
            .with_brokers(vec!["kafka-2:9092".to_string(), "kafka-1:9092".to_string()]);
        assert_eq!(topic.bootstrap_servers(), "kafka-1:9092,kafka-2:9092");
    }
}
