//! Mapping from local metric kinds to OTLP value types.

use crate::core::MetricKind;
use std::fmt;

/// OTLP value type a point is converted into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Gauge,
    Untyped,
    Sum,
    Histogram,
    Summary,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Gauge => "gauge",
            ValueType::Untyped => "untyped",
            ValueType::Sum => "sum",
            ValueType::Histogram => "histogram",
            ValueType::Summary => "summary",
        };
        f.write_str(name)
    }
}

/// Returns the OTLP value type for a metric kind, or `None` if the kind is not
/// one the bridge can translate.
#[inline]
pub fn value_type(kind: MetricKind) -> Option<ValueType> {
    match kind {
        MetricKind::Gauge => Some(ValueType::Gauge),
        MetricKind::Untyped => Some(ValueType::Untyped),
        MetricKind::Counter => Some(ValueType::Sum),
        MetricKind::Histogram => Some(ValueType::Histogram),
        MetricKind::Summary => Some(ValueType::Summary),
        MetricKind::Unrecognized(_) => None,
    }
}
