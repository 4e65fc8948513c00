//! InfluxDB line protocol input for the CLI host.

use crate::core::{BridgeError, FieldValue, Metric, MetricKind, Result};
use chrono::DateTime;
use influxdb_line_protocol::{parse_lines, FieldValue as LineValue, ParsedLine};

/// Parses every line of `input` into a metric point of the given kind.
///
/// Blank lines and `#` comments are ignored. Lines without a timestamp are
/// stamped with the current time.
pub fn parse(input: &str, kind: MetricKind) -> Result<Vec<Metric>> {
    parse_lines(input)
        .enumerate()
        .map(|(index, line)| {
            let line = line.map_err(|e| {
                BridgeError::parse(format!("invalid line protocol (entry {}): {}", index + 1, e))
            })?;
            to_metric(&line, kind)
        })
        .collect()
}

fn to_metric(line: &ParsedLine<'_>, kind: MetricKind) -> Result<Metric> {
    let mut builder = Metric::builder(line.series.measurement.to_string()).kind(kind);

    if let Some(tags) = &line.series.tag_set {
        for (key, value) in tags {
            builder = builder.tag(key.to_string(), value.to_string());
        }
    }

    for (key, value) in &line.field_set {
        let value = match value {
            LineValue::I64(v) => FieldValue::Int(*v),
            LineValue::U64(v) => FieldValue::Uint(*v),
            LineValue::F64(v) => FieldValue::Float(*v),
            LineValue::String(v) => FieldValue::String(v.to_string()),
            LineValue::Boolean(v) => FieldValue::Bool(*v),
        };
        builder = builder.field(key.to_string(), value);
    }

    if let Some(nanos) = line.timestamp {
        builder = builder.timestamp(DateTime::from_timestamp_nanos(nanos));
    }

    builder.build()
}
