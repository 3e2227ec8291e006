//! Wire representation of metrics
//!
//! The same record shape is used on the network (batch and single-metric
//! JSON endpoints) and inside the snapshot artifact:
//!
//! ```json
//! {"id": "PollCount", "type": "counter", "delta": 5, "hash": "..."}
//! {"id": "Alloc", "type": "gauge", "value": 12.5}
//! ```

use serde::{Deserialize, Serialize};

use crate::{Metric, MetricError, MetricKind, MetricValue};

/// A single metric as it travels over the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRecord {
    /// Metric name
    pub id: String,

    /// Metric kind (`gauge` or `counter`), kept as a string so unknown kinds
    /// can be reported instead of failing deserialization
    #[serde(rename = "type")]
    pub kind: String,

    /// Counter delta, present only for counters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,

    /// Gauge value, present only for gauges
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,

    /// Integrity tag, present only when a key is configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl From<&Metric> for WireRecord {
    fn from(metric: &Metric) -> Self {
        let (delta, value) = match metric.value {
            MetricValue::Gauge(value) => (None, Some(value)),
            MetricValue::Counter(delta) => (Some(delta), None),
        };

        Self {
            id: metric.name.clone(),
            kind: metric.kind().to_string(),
            delta,
            value,
            hash: None,
        }
    }
}

impl TryFrom<&WireRecord> for Metric {
    type Error = MetricError;

    fn try_from(record: &WireRecord) -> Result<Self, Self::Error> {
        match record.kind.parse::<MetricKind>()? {
            MetricKind::Gauge => {
                let value = record.value.ok_or_else(|| MetricError::MissingField {
                    name: record.id.clone(),
                    field: "value",
                })?;
                Ok(Metric::gauge(record.id.clone(), value))
            }
            MetricKind::Counter => {
                let delta = record.delta.ok_or_else(|| MetricError::MissingField {
                    name: record.id.clone(),
                    field: "delta",
                })?;
                Ok(Metric::counter(record.id.clone(), delta))
            }
        }
    }
}

/// Canonical string the integrity tag of a metric is computed over.
///
/// Signer and verifier must agree on this format byte for byte.
pub fn canonical_string(metric: &Metric) -> String {
    match metric.value {
        MetricValue::Gauge(value) => format!("{}:gauge:{value:.6}", metric.name),
        MetricValue::Counter(delta) => format!("{}:counter:{delta}", metric.name),
    }
}

/// Request body of the JSON single-metric read endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricQuery {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Document stored in the snapshot artifact
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotDocument {
    pub metrics: Vec<WireRecord>,
}
