//! Data structures for collected metrics.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One complete, timestamped collection result.
///
/// Serialized flat: `{"epoch": 1700000000, "cpu": {...}, "net": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Collection timestamp (Unix seconds)
    pub epoch: u64,
    /// Metric category to label map or raw value
    #[serde(flatten)]
    pub metrics: BTreeMap<String, Value>,
}

impl Snapshot {
    /// Create an empty snapshot stamped with the given epoch.
    pub fn new(epoch: u64) -> Self {
        Self {
            epoch,
            metrics: BTreeMap::new(),
        }
    }

    /// Look up one metric category.
    pub fn get(&self, category: &str) -> Option<&Value> {
        self.metrics.get(category)
    }

    /// Whether no probe contributed anything.
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Merge a probe's fragment according to its merge strategy.
    pub fn merge(&mut self, label: &str, strategy: MergeStrategy, fragment: Fragment) {
        for (category, value) in fragment {
            match strategy {
                MergeStrategy::Nest => {
                    let slot = self
                        .metrics
                        .entry(category.clone())
                        .or_insert_with(|| Value::Object(Map::new()));

                    if !slot.is_object() {
                        tracing::warn!(
                            "Category {:?} held a flat value, replacing it to nest {:?}",
                            category,
                            label
                        );
                        *slot = Value::Object(Map::new());
                    }

                    if let Value::Object(labels) = slot {
                        labels.insert(label.to_string(), value);
                    }
                }
                MergeStrategy::Replace => {
                    self.metrics.insert(category, value);
                }
            }
        }
    }
}

/// How a probe's fragment lands in the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// `snapshot[category][label] = value`
    Nest,
    /// `snapshot[category] = value`, for categories with a single source
    Replace,
}

/// Partial result emitted by one probe.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment(BTreeMap<String, Value>);

impl Fragment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fragment holding a single category.
    pub fn single(category: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut fragment = Self::new();
        fragment.insert(category, value);
        fragment
    }

    pub fn insert(&mut self, category: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(category.into(), value.into());
    }

    pub fn get(&self, category: &str) -> Option<&Value> {
        self.0.get(category)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl IntoIterator for Fragment {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<(String, Value)> for Fragment {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Inbound and outbound traffic for one interface, in megabits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkRate {
    #[serde(rename = "in")]
    pub rx_megabits: f64,
    #[serde(rename = "out")]
    pub tx_megabits: f64,
}

/// Usage of one mount point, in mebibytes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StorageUsage {
    pub total: f64,
    pub used: f64,
    pub free: f64,
}

/// A sensor category's elected reading plus the candidate readings it was picked from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectedReading {
    /// Elected temperature in Celsius
    pub value: f64,
    /// Sensor label the value came from
    pub key: String,
    /// Every priority-list reading that was present
    pub raw: BTreeMap<String, f64>,
}

/// Round to a fixed number of decimals.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Current Unix time in whole seconds.
pub fn now_epoch() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
