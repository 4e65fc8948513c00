//! Accumulator that folds local points into an OTLP export request.
//!
//! Points are grouped resource → scope → metric. A point is validated in full
//! before anything is inserted, so a rejected point never leaves an empty
//! group behind.

use super::{string_attribute, MetricsConverter, PointError, ValueType};
use crate::core::FieldValue;
use chrono::{DateTime, Utc};
use opentelemetry_proto::tonic::{
    collector::metrics::v1::ExportMetricsServiceRequest,
    common::v1::{InstrumentationScope, KeyValue},
    metrics::v1::{
        metric::Data, number_data_point, summary_data_point::ValueAtQuantile,
        AggregationTemporality, Gauge, Histogram, HistogramDataPoint, Metric as OtlpMetric,
        NumberDataPoint, ResourceMetrics, ScopeMetrics, Sum, Summary, SummaryDataPoint,
    },
    resource::v1::Resource,
};
use std::collections::{BTreeMap, HashMap};

/// Tag holding the instrumentation scope name
pub const SCOPE_NAME_TAG: &str = "otel.library.name";
/// Tag holding the instrumentation scope version
pub const SCOPE_VERSION_TAG: &str = "otel.library.version";

const GAUGE_FIELD: &str = "gauge";
const UNTYPED_FIELD: &str = "value";
const COUNTER_FIELD: &str = "counter";
const COUNT_FIELD: &str = "count";
const SUM_FIELD: &str = "sum";

type AttributeSet = Vec<(String, String)>;
type ScopeKey = (String, String);

/// Mutable batch owned by a single write cycle
pub struct MetricsBatch<'a> {
    converter: &'a MetricsConverter,
    resources: Vec<ResourceGroup>,
    resource_index: HashMap<AttributeSet, usize>,
    points: usize,
}

struct ResourceGroup {
    attributes: AttributeSet,
    scopes: Vec<ScopeGroup>,
    scope_index: HashMap<ScopeKey, usize>,
}

struct ScopeGroup {
    key: ScopeKey,
    metrics: Vec<OtlpMetric>,
    metric_index: HashMap<String, (usize, ValueType)>,
}

enum DataPoint {
    Number(NumberDataPoint),
    Histogram(HistogramDataPoint),
    Summary(SummaryDataPoint),
}

/// Tags split by destination
struct ClassifiedTags {
    resource: AttributeSet,
    scope: ScopeKey,
    point: Vec<KeyValue>,
}

impl<'a> MetricsBatch<'a> {
    pub(crate) fn new(converter: &'a MetricsConverter) -> Self {
        Self {
            converter,
            resources: Vec::new(),
            resource_index: HashMap::new(),
            points: 0,
        }
    }

    /// Number of data points accepted so far.
    pub fn len(&self) -> usize {
        self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points == 0
    }

    /// Adds one local point. On error the batch is left untouched.
    pub fn add_point(
        &mut self,
        name: &str,
        tags: &BTreeMap<String, String>,
        fields: &BTreeMap<String, FieldValue>,
        timestamp: DateTime<Utc>,
        value_type: ValueType,
    ) -> Result<(), PointError> {
        let time_unix_nano = timestamp
            .timestamp_nanos_opt()
            .and_then(|nanos| u64::try_from(nanos).ok())
            .ok_or(PointError::InvalidTimestamp(timestamp))?;

        let tags = self.classify_tags(tags);

        let data_points = match value_type {
            ValueType::Gauge => number_points(name, fields, GAUGE_FIELD, &tags.point, time_unix_nano)?,
            ValueType::Untyped => {
                number_points(name, fields, UNTYPED_FIELD, &tags.point, time_unix_nano)?
            },
            ValueType::Sum => number_points(name, fields, COUNTER_FIELD, &tags.point, time_unix_nano)?,
            ValueType::Histogram => vec![(
                name.to_string(),
                DataPoint::Histogram(histogram_point(fields, &tags.point, time_unix_nano)?),
            )],
            ValueType::Summary => vec![(
                name.to_string(),
                DataPoint::Summary(summary_point(fields, &tags.point, time_unix_nano)?),
            )],
        };

        self.check_conflicts(&tags, &data_points, value_type)?;

        let added = data_points.len();
        let scope = self.scope_mut(tags.resource, tags.scope);
        for (metric_name, point) in data_points {
            let idx = match scope.metric_index.get(&metric_name) {
                Some((idx, _)) => *idx,
                None => {
                    scope.metrics.push(empty_metric(&metric_name, value_type));
                    scope
                        .metric_index
                        .insert(metric_name, (scope.metrics.len() - 1, value_type));
                    scope.metrics.len() - 1
                },
            };
            push_point(&mut scope.metrics[idx], point);
        }
        self.points += added;

        Ok(())
    }

    /// Finalizes the batch into an export request.
    pub fn finish(self) -> ExportMetricsServiceRequest {
        let resource_metrics = self
            .resources
            .into_iter()
            .map(|group| ResourceMetrics {
                resource: Some(Resource {
                    attributes: group
                        .attributes
                        .iter()
                        .map(|(k, v)| string_attribute(k, v))
                        .collect(),
                    ..Default::default()
                }),
                scope_metrics: group
                    .scopes
                    .into_iter()
                    .map(|scope| ScopeMetrics {
                        scope: Some(InstrumentationScope {
                            name: scope.key.0,
                            version: scope.key.1,
                            ..Default::default()
                        }),
                        metrics: scope.metrics,
                        ..Default::default()
                    })
                    .collect(),
                ..Default::default()
            })
            .collect();

        ExportMetricsServiceRequest { resource_metrics }
    }

    fn classify_tags(&self, tags: &BTreeMap<String, String>) -> ClassifiedTags {
        let mut classified = ClassifiedTags {
            resource: Vec::new(),
            scope: (String::new(), String::new()),
            point: Vec::new(),
        };

        for (key, value) in tags {
            match key.as_str() {
                SCOPE_NAME_TAG => classified.scope.0 = value.clone(),
                SCOPE_VERSION_TAG => classified.scope.1 = value.clone(),
                k if self.converter.is_resource_attribute(k) => {
                    classified.resource.push((key.clone(), value.clone()));
                },
                _ => classified.point.push(string_attribute(key, value)),
            }
        }

        classified
    }

    fn check_conflicts(
        &self,
        tags: &ClassifiedTags,
        data_points: &[(String, DataPoint)],
        value_type: ValueType,
    ) -> Result<(), PointError> {
        let Some(scope) = self
            .resource_index
            .get(&tags.resource)
            .map(|&idx| &self.resources[idx])
            .and_then(|group| {
                group
                    .scope_index
                    .get(&tags.scope)
                    .map(|&idx| &group.scopes[idx])
            })
        else {
            return Ok(());
        };

        for (metric_name, _) in data_points {
            if let Some((_, existing)) = scope.metric_index.get(metric_name) {
                if *existing != value_type {
                    return Err(PointError::TypeConflict {
                        name: metric_name.clone(),
                        existing: *existing,
                        requested: value_type,
                    });
                }
            }
        }

        Ok(())
    }

    fn scope_mut(&mut self, resource: AttributeSet, scope: ScopeKey) -> &mut ScopeGroup {
        let resource_idx = match self.resource_index.get(&resource) {
            Some(idx) => *idx,
            None => {
                self.resources.push(ResourceGroup {
                    attributes: resource.clone(),
                    scopes: Vec::new(),
                    scope_index: HashMap::new(),
                });
                self.resource_index.insert(resource, self.resources.len() - 1);
                self.resources.len() - 1
            },
        };

        let group = &mut self.resources[resource_idx];
        let scope_idx = match group.scope_index.get(&scope) {
            Some(idx) => *idx,
            None => {
                group.scopes.push(ScopeGroup {
                    key: scope.clone(),
                    metrics: Vec::new(),
                    metric_index: HashMap::new(),
                });
                group.scope_index.insert(scope, group.scopes.len() - 1);
                group.scopes.len() - 1
            },
        };

        &mut group.scopes[scope_idx]
    }
}

/// One number data point per numeric field. The field named `plain_field`
/// keeps the measurement name; other fields get `<name>_<field>`.
fn number_points(
    name: &str,
    fields: &BTreeMap<String, FieldValue>,
    plain_field: &str,
    attributes: &[KeyValue],
    time_unix_nano: u64,
) -> Result<Vec<(String, DataPoint)>, PointError> {
    let mut points = Vec::with_capacity(fields.len());

    for (field, value) in fields {
        let value = match value {
            FieldValue::Float(v) => number_data_point::Value::AsDouble(*v),
            FieldValue::Int(v) => number_data_point::Value::AsInt(*v),
            FieldValue::Uint(v) => match i64::try_from(*v) {
                Ok(v) => number_data_point::Value::AsInt(v),
                Err(_) => number_data_point::Value::AsDouble(*v as f64),
            },
            FieldValue::String(_) | FieldValue::Bool(_) => {
                tracing::debug!(
                    measurement = name,
                    field = field.as_str(),
                    field_type = value.type_name(),
                    "Ignoring non-numeric field"
                );
                continue;
            },
        };

        let metric_name = if field == plain_field {
            name.to_string()
        } else {
            format!("{}_{}", name, field)
        };

        points.push((
            metric_name,
            DataPoint::Number(NumberDataPoint {
                attributes: attributes.to_vec(),
                time_unix_nano,
                value: Some(value),
                ..Default::default()
            }),
        ));
    }

    if points.is_empty() {
        return Err(PointError::NoNumericFields);
    }

    Ok(points)
}

fn histogram_point(
    fields: &BTreeMap<String, FieldValue>,
    attributes: &[KeyValue],
    time_unix_nano: u64,
) -> Result<HistogramDataPoint, PointError> {
    let mut count = None;
    let mut sum = None;
    let mut buckets: Vec<(f64, u64)> = Vec::new();

    for (field, value) in fields {
        match field.as_str() {
            COUNT_FIELD => count = Some(count_value(field, value)?),
            SUM_FIELD => sum = Some(numeric_value(field, value)?),
            _ => {
                let bound = parse_key(field).ok_or_else(|| PointError::InvalidField {
                    field: field.clone(),
                    reason: "expected a bucket upper bound",
                })?;
                buckets.push((bound, count_value(field, value)?));
            },
        }
    }

    let count = count.ok_or(PointError::MissingField(COUNT_FIELD))?;
    let sum = sum.ok_or(PointError::MissingField(SUM_FIELD))?;

    buckets.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut explicit_bounds = Vec::with_capacity(buckets.len());
    let mut bucket_counts = Vec::with_capacity(buckets.len() + 1);
    let mut previous = 0u64;
    for (bound, cumulative) in buckets {
        if cumulative < previous {
            return Err(PointError::NonMonotonicBuckets);
        }
        // +Inf is implied by the overflow bucket and must agree with count
        if bound == f64::INFINITY {
            if cumulative != count {
                return Err(PointError::NonMonotonicBuckets);
            }
            continue;
        }
        explicit_bounds.push(bound);
        bucket_counts.push(cumulative - previous);
        previous = cumulative;
    }
    if count < previous {
        return Err(PointError::NonMonotonicBuckets);
    }
    bucket_counts.push(count - previous);

    Ok(HistogramDataPoint {
        attributes: attributes.to_vec(),
        time_unix_nano,
        count,
        sum: Some(sum),
        bucket_counts,
        explicit_bounds,
        ..Default::default()
    })
}

fn summary_point(
    fields: &BTreeMap<String, FieldValue>,
    attributes: &[KeyValue],
    time_unix_nano: u64,
) -> Result<SummaryDataPoint, PointError> {
    let mut count = None;
    let mut sum = None;
    let mut quantile_values = Vec::new();

    for (field, value) in fields {
        match field.as_str() {
            COUNT_FIELD => count = Some(count_value(field, value)?),
            SUM_FIELD => sum = Some(numeric_value(field, value)?),
            _ => {
                let quantile = parse_key(field)
                    .filter(|q| (0.0..=1.0).contains(q))
                    .ok_or_else(|| PointError::InvalidField {
                        field: field.clone(),
                        reason: "expected a quantile between 0 and 1",
                    })?;
                quantile_values.push(ValueAtQuantile {
                    quantile,
                    value: numeric_value(field, value)?,
                });
            },
        }
    }

    let count = count.ok_or(PointError::MissingField(COUNT_FIELD))?;
    let sum = sum.ok_or(PointError::MissingField(SUM_FIELD))?;
    quantile_values.sort_by(|a, b| a.quantile.total_cmp(&b.quantile));

    Ok(SummaryDataPoint {
        attributes: attributes.to_vec(),
        time_unix_nano,
        count,
        sum,
        quantile_values,
        ..Default::default()
    })
}

fn parse_key(key: &str) -> Option<f64> {
    key.parse::<f64>().ok().filter(|v| !v.is_nan())
}

fn count_value(field: &str, value: &FieldValue) -> Result<u64, PointError> {
    value.as_count().ok_or_else(|| PointError::InvalidField {
        field: field.to_string(),
        reason: "expected a non-negative integer",
    })
}

fn numeric_value(field: &str, value: &FieldValue) -> Result<f64, PointError> {
    value.as_f64().ok_or_else(|| PointError::InvalidField {
        field: field.to_string(),
        reason: "expected a number",
    })
}

fn empty_metric(name: &str, value_type: ValueType) -> OtlpMetric {
    let data = match value_type {
        ValueType::Gauge | ValueType::Untyped => Data::Gauge(Gauge::default()),
        ValueType::Sum => Data::Sum(Sum {
            aggregation_temporality: AggregationTemporality::Cumulative as i32,
            is_monotonic: true,
            ..Default::default()
        }),
        ValueType::Histogram => Data::Histogram(Histogram {
            aggregation_temporality: AggregationTemporality::Cumulative as i32,
            ..Default::default()
        }),
        ValueType::Summary => Data::Summary(Summary::default()),
    };

    OtlpMetric {
        name: name.to_string(),
        data: Some(data),
        ..Default::default()
    }
}

fn push_point(metric: &mut OtlpMetric, point: DataPoint) {
    match (&mut metric.data, point) {
        (Some(Data::Gauge(gauge)), DataPoint::Number(p)) => gauge.data_points.push(p),
        (Some(Data::Sum(sum)), DataPoint::Number(p)) => sum.data_points.push(p),
        (Some(Data::Histogram(histogram)), DataPoint::Histogram(p)) => {
            histogram.data_points.push(p)
        },
        (Some(Data::Summary(summary)), DataPoint::Summary(p)) => summary.data_points.push(p),
        // metric_index pins each name to one value type, so shapes always agree
        _ => unreachable!("data point shape does not match metric type"),
    }
}
