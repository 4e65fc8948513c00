//! Conversion of local metric points into OTLP export requests.
//!
//! Conversion is a fold over the input: every point either lands in the
//! [`MetricsBatch`] or produces a [`SkippedPoint`]. Nothing here logs skip
//! reasons; the caller decides how to report them.

mod batch;
mod value_type;

pub use batch::{MetricsBatch, SCOPE_NAME_TAG, SCOPE_VERSION_TAG};
pub use value_type::{value_type, ValueType};

use crate::core::{BridgeError, Metric, MetricKind, Result};
use chrono::{DateTime, Utc};
use opentelemetry_proto::tonic::common::v1::{any_value, AnyValue, KeyValue};
use regex::Regex;
use std::fmt;
use thiserror::Error;

/// Tag keys in these OpenTelemetry semantic convention namespaces describe
/// the resource rather than the data point.
const RESOURCE_NAMESPACE: &str = r"^(service|telemetry\.sdk|telemetry\.auto|container|faas|process|host|os|device|cloud|deployment|k8s|aws|gcp|azure|heroku|webengine)\.";

/// Why a single point could not be added to a batch
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PointError {
    #[error("metric '{name}' already exists as {existing}, cannot add it as {requested}")]
    TypeConflict {
        name: String,
        existing: ValueType,
        requested: ValueType,
    },

    #[error("point has no numeric fields")]
    NoNumericFields,

    #[error("required field '{0}' is missing")]
    MissingField(&'static str),

    #[error("field '{field}' is invalid: {reason}")]
    InvalidField { field: String, reason: &'static str },

    #[error("bucket counts are not cumulative")]
    NonMonotonicBuckets,

    #[error("timestamp {0} is outside the representable range")]
    InvalidTimestamp(DateTime<Utc>),
}

/// Reason a point was left out of a batch
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The metric kind has no OTLP counterpart
    UnrecognizedKind(MetricKind),
    /// The batch rejected the point
    Rejected(PointError),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnrecognizedKind(kind) => write!(f, "unrecognized metric type {}", kind),
            SkipReason::Rejected(err) => write!(f, "failed to add point: {}", err),
        }
    }
}

/// A point that did not make it into the batch
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedPoint {
    /// Measurement name of the point
    pub name: String,
    pub reason: SkipReason,
}

/// Result of converting one write cycle's points
pub struct Conversion<'a> {
    pub batch: MetricsBatch<'a>,
    pub skipped: Vec<SkippedPoint>,
}

/// Converts local metric points into OTLP metrics.
///
/// The converter holds no per-batch state and is shared by every write cycle
/// of a connection.
#[derive(Debug, Clone)]
pub struct MetricsConverter {
    resource_namespace: Regex,
}

impl MetricsConverter {
    /// Creates a converter.
    pub fn new() -> Result<Self> {
        let resource_namespace = Regex::new(RESOURCE_NAMESPACE)
            .map_err(|e| BridgeError::Converter(format!("invalid resource namespace: {}", e)))?;
        Ok(Self { resource_namespace })
    }

    /// Starts an empty batch bound to this converter.
    pub fn new_batch(&self) -> MetricsBatch<'_> {
        MetricsBatch::new(self)
    }

    /// Folds `metrics` into a single batch, in input order.
    pub fn convert(&self, metrics: &[Metric]) -> Conversion<'_> {
        let mut batch = self.new_batch();
        let mut skipped = Vec::new();

        for metric in metrics {
            let Some(vtype) = value_type(metric.kind) else {
                skipped.push(SkippedPoint {
                    name: metric.name.clone(),
                    reason: SkipReason::UnrecognizedKind(metric.kind),
                });
                continue;
            };

            if let Err(err) =
                batch.add_point(&metric.name, &metric.tags, &metric.fields, metric.timestamp, vtype)
            {
                skipped.push(SkippedPoint {
                    name: metric.name.clone(),
                    reason: SkipReason::Rejected(err),
                });
            }
        }

        Conversion { batch, skipped }
    }

    /// Whether a tag key names a resource attribute.
    pub fn is_resource_attribute(&self, key: &str) -> bool {
        self.resource_namespace.is_match(key)
    }
}

/// Builds a string-valued OTLP attribute.
pub(crate) fn string_attribute(key: &str, value: &str) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: Some(AnyValue {
            value: Some(any_value::Value::StringValue(value.to_string())),
        }),
    }
}
