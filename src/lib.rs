pub mod actors;
#[cfg(feature = "api")]
pub mod api;
pub mod client;
pub mod config;
pub mod crypto;
pub mod storage;
pub mod util;
pub mod wire;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Name of the counter the collector increments on every runtime sample.
pub const POLL_COUNT: &str = "PollCount";

/// Current value of every metric held by a store, keyed by name.
pub type MetricSet = BTreeMap<String, Metric>;

/// The two kinds of metrics the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Point-in-time value, each write replaces the previous one
    Gauge,

    /// Monotonic accumulator, each write adds to the stored total
    Counter,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gauge" => Ok(MetricKind::Gauge),
            "counter" => Ok(MetricKind::Counter),
            other => Err(MetricError::UnknownKind(other.to_string())),
        }
    }
}

/// Typed sample carried by a [`Metric`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Gauge(f64),
    Counter(i64),
}

impl MetricValue {
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricValue::Gauge(_) => MetricKind::Gauge,
            MetricValue::Counter(_) => MetricKind::Counter,
        }
    }

    /// Parse a textual sample for the given kind.
    ///
    /// Gauges accept any finite float notation, counters only base-10
    /// integers. NaN and infinities have no JSON representation.
    pub fn parse(kind: MetricKind, raw: &str) -> Result<Self, MetricError> {
        match kind {
            MetricKind::Gauge => raw
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .map(MetricValue::Gauge)
                .ok_or_else(|| MetricError::InvalidValue(raw.to_string())),
            MetricKind::Counter => raw
                .parse::<i64>()
                .map(MetricValue::Counter)
                .map_err(|_| MetricError::InvalidValue(raw.to_string())),
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Gauge(value) => write!(f, "{value:.3}"),
            MetricValue::Counter(delta) => write!(f, "{delta}"),
        }
    }
}

/// A single named sample.
///
/// Metrics are replaced as a whole, never mutated in place. The store decides
/// how an incoming metric merges with the stored one (see [`Metric::merge`]).
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub name: String,
    pub value: MetricValue,
}

impl Metric {
    pub fn gauge(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value: MetricValue::Gauge(value),
        }
    }

    pub fn counter(name: impl Into<String>, delta: i64) -> Self {
        Self {
            name: name.into(),
            value: MetricValue::Counter(delta),
        }
    }

    pub fn kind(&self) -> MetricKind {
        self.value.kind()
    }

    /// Apply an incoming write on top of this stored metric.
    ///
    /// Gauges are replaced, counters accumulate. The incoming metric must have
    /// the same kind as the stored one.
    pub fn merge(&self, incoming: &Metric) -> Result<Metric, MergeConflict> {
        match (self.value, incoming.value) {
            (MetricValue::Gauge(_), MetricValue::Gauge(value)) => {
                Ok(Metric::gauge(self.name.clone(), value))
            }
            (MetricValue::Counter(stored), MetricValue::Counter(delta)) => stored
                .checked_add(delta)
                .map(|total| Metric::counter(self.name.clone(), total))
                .ok_or(MergeConflict::Overflow),
            (stored, incoming) => Err(MergeConflict::KindMismatch {
                stored: stored.kind(),
                incoming: incoming.kind(),
            }),
        }
    }
}

/// Reasons an incoming metric can not be merged into a stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeConflict {
    KindMismatch {
        stored: MetricKind,
        incoming: MetricKind,
    },
    Overflow,
}

/// Validation errors for metric input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricError {
    /// The metric kind is neither `gauge` nor `counter`
    UnknownKind(String),

    /// The value could not be parsed for the requested kind
    InvalidValue(String),

    /// A wire record lacks the field required by its kind
    MissingField {
        name: String,
        field: &'static str,
    },
}

impl fmt::Display for MetricError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricError::UnknownKind(kind) => write!(f, "unknown metric kind: {kind}"),
            MetricError::InvalidValue(raw) => write!(f, "invalid metric value: {raw}"),
            MetricError::MissingField { name, field } => {
                write!(f, "metric {name} is missing the '{field}' field")
            }
        }
    }
}

impl std::error::Error for MetricError {}
