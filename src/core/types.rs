use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use crate::core::error::{BridgeError, Result};

/// Kind of a locally collected metric, as reported by the collection layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Point-in-time measurement
    Gauge,
    /// Value with no declared semantics
    Untyped,
    /// Monotonically increasing counter
    Counter,
    /// Bucketed distribution with cumulative bucket counts
    Histogram,
    /// Distribution summarised by quantiles
    Summary,
    /// Raw kind code the bridge does not understand
    #[serde(skip)]
    Unrecognized(u8),
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::Gauge => write!(f, "gauge"),
            MetricKind::Untyped => write!(f, "untyped"),
            MetricKind::Counter => write!(f, "counter"),
            MetricKind::Histogram => write!(f, "histogram"),
            MetricKind::Summary => write!(f, "summary"),
            MetricKind::Unrecognized(code) => write!(f, "unrecognized({})", code),
        }
    }
}

impl std::str::FromStr for MetricKind {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "gauge" => Ok(MetricKind::Gauge),
            "untyped" => Ok(MetricKind::Untyped),
            "counter" => Ok(MetricKind::Counter),
            "histogram" => Ok(MetricKind::Histogram),
            "summary" => Ok(MetricKind::Summary),
            _ => Err(BridgeError::parse(format!("Unknown metric kind: {}", s))),
        }
    }
}

/// A single field value. Fields are heterogeneous scalars.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Int(i64),
    Uint(u64),
    String(String),
    Bool(bool),
}

impl FieldValue {
    /// Returns the value as `f64` if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Int(v) => Some(*v as f64),
            FieldValue::Uint(v) => Some(*v as f64),
            FieldValue::String(_) | FieldValue::Bool(_) => None,
        }
    }

    /// Returns the value as a non-negative integer count, if it is one.
    ///
    /// Floats are accepted when they carry no fractional part.
    pub fn as_count(&self) -> Option<u64> {
        match self {
            FieldValue::Uint(v) => Some(*v),
            FieldValue::Int(v) => u64::try_from(*v).ok(),
            FieldValue::Float(v) if *v >= 0.0 && v.fract() == 0.0 && *v <= u64::MAX as f64 => {
                Some(*v as u64)
            },
            _ => None,
        }
    }

    /// Name of the value's type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Float(_) => "float",
            FieldValue::Int(_) => "int",
            FieldValue::Uint(_) => "uint",
            FieldValue::String(_) => "string",
            FieldValue::Bool(_) => "bool",
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::Uint(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}

/// A locally collected metric point.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    /// Measurement name
    pub name: String,
    /// Tag set
    pub tags: BTreeMap<String, String>,
    /// Field set
    pub fields: BTreeMap<String, FieldValue>,
    /// Collection time
    pub timestamp: DateTime<Utc>,
    /// Metric kind
    pub kind: MetricKind,
}

impl Metric {
    /// Creates a new builder for constructing metrics
    pub fn builder(name: impl Into<String>) -> MetricBuilder {
        MetricBuilder {
            name: name.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp: None,
            kind: MetricKind::Untyped,
        }
    }

    /// Gets a tag value by key
    pub fn get_tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Gets a field value by key
    pub fn get_field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }
}

/// Builder for creating Metric instances
#[derive(Debug)]
pub struct MetricBuilder {
    name: String,
    tags: BTreeMap<String, String>,
    fields: BTreeMap<String, FieldValue>,
    timestamp: Option<DateTime<Utc>>,
    kind: MetricKind,
}

impl MetricBuilder {
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn kind(mut self, kind: MetricKind) -> Self {
        self.kind = kind;
        self
    }

    /// Builds the metric. A missing timestamp defaults to now.
    pub fn build(self) -> Result<Metric> {
        if self.name.is_empty() {
            return Err(BridgeError::parse("Metric name cannot be empty"));
        }

        Ok(Metric {
            name: self.name,
            tags: self.tags,
            fields: self.fields,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            kind: self.kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_builder() {
        let metric = Metric::builder("cpu")
            .tag("host", "web-1")
            .field("usage_idle", 97.5)
            .field("cores", 8i64)
            .kind(MetricKind::Gauge)
            .build()
            .unwrap();

        assert_eq!(metric.name, "cpu");
        assert_eq!(metric.get_tag("host"), Some("web-1"));
        assert_eq!(metric.get_field("usage_idle"), Some(&FieldValue::Float(97.5)));
        assert_eq!(metric.get_field("cores"), Some(&FieldValue::Int(8)));
        assert_eq!(metric.kind, MetricKind::Gauge);
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(Metric::builder("").build().is_err());
    }

    #[test]
    fn test_metric_kind_parsing() {
        assert_eq!("Counter".parse::<MetricKind>().unwrap(), MetricKind::Counter);
        assert_eq!("summary".parse::<MetricKind>().unwrap(), MetricKind::Summary);
        assert!("distribution".parse::<MetricKind>().is_err());
        assert_eq!(MetricKind::Unrecognized(9).to_string(), "unrecognized(9)");
    }

    #[test]
    fn test_field_value_as_count() {
        assert_eq!(FieldValue::Uint(5).as_count(), Some(5));
        assert_eq!(FieldValue::Int(5).as_count(), Some(5));
        assert_eq!(FieldValue::Int(-1).as_count(), None);
        assert_eq!(FieldValue::Float(3.0).as_count(), Some(3));
        assert_eq!(FieldValue::Float(3.5).as_count(), None);
        assert_eq!(FieldValue::Bool(true).as_count(), None);
    }
}
