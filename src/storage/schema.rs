//! Database schema and metric row definitions
//!
//! ## Layout
//!
//! One row per metric name. The kind is stored as text, the sample lives in
//! exactly one of two nullable columns:
//! - `metric_delta` - accumulated counter total
//! - `metric_value` - latest gauge value
//!
//! Creation and update times are kept as Unix milliseconds for auditing; they
//! are not part of the metric itself.

use chrono::{DateTime, Utc};

use crate::{Metric, MetricError, MetricKind, MetricValue};

/// Idempotent table creation, executed whenever the backend is opened
pub const CREATE_METRIC_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS metric (
    metric_name  TEXT PRIMARY KEY,
    metric_type  TEXT NOT NULL,
    metric_delta INTEGER,
    metric_value REAL,
    created_at   INTEGER NOT NULL,
    updated_at   INTEGER NOT NULL
)
"#;

/// A single metric row stored in the database
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRow {
    pub name: String,
    pub kind: String,
    pub delta: Option<i64>,
    pub value: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MetricRow {
    /// Build a fresh row for a metric written at `now`
    pub fn from_metric(metric: &Metric, now: DateTime<Utc>) -> Self {
        let (delta, value) = match metric.value {
            MetricValue::Gauge(value) => (None, Some(value)),
            MetricValue::Counter(delta) => (Some(delta), None),
        };

        Self {
            name: metric.name.clone(),
            kind: metric.kind().to_string(),
            delta,
            value,
            created_at: now,
            updated_at: now,
        }
    }

    /// Convert a row back into a metric
    ///
    /// Fails for unknown kinds and for rows whose sample column is NULL.
    pub fn into_metric(self) -> Result<Metric, MetricError> {
        match self.kind.parse::<MetricKind>()? {
            MetricKind::Gauge => self
                .value
                .map(|value| Metric::gauge(self.name.clone(), value))
                .ok_or(MetricError::MissingField {
                    name: self.name,
                    field: "metric_value",
                }),
            MetricKind::Counter => self
                .delta
                .map(|delta| Metric::counter(self.name.clone(), delta))
                .ok_or(MetricError::MissingField {
                    name: self.name,
                    field: "metric_delta",
                }),
        }
    }
}

/// Helper to convert timestamp to Unix milliseconds for SQLite
pub fn timestamp_to_millis(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

/// Helper to convert Unix milliseconds from SQLite to DateTime
pub fn millis_to_timestamp(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
}
