//! Static resource attributes.

use crate::convert::string_attribute;
use opentelemetry_proto::tonic::{
    collector::metrics::v1::ExportMetricsServiceRequest, common::v1::KeyValue,
    resource::v1::Resource,
};
use std::collections::HashMap;

/// Upserts every configured attribute into every resource of `request`.
pub fn inject(request: &mut ExportMetricsServiceRequest, attributes: &HashMap<String, String>) {
    if attributes.is_empty() {
        return;
    }

    for resource_metrics in &mut request.resource_metrics {
        let resource = resource_metrics.resource.get_or_insert_with(Resource::default);
        for (key, value) in attributes {
            upsert(&mut resource.attributes, key, value);
        }
    }
}

fn upsert(attributes: &mut Vec<KeyValue>, key: &str, value: &str) {
    let mut found = false;
    for existing in attributes.iter_mut().filter(|kv| kv.key == key) {
        *existing = string_attribute(key, value);
        found = true;
    }
    if !found {
        attributes.push(string_attribute(key, value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry_proto::tonic::metrics::v1::ResourceMetrics;
    use pretty_assertions::assert_eq;

    fn resource_metrics(attributes: Vec<KeyValue>) -> ResourceMetrics {
        ResourceMetrics {
            resource: Some(Resource {
                attributes,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_inject_overwrites_in_every_resource() {
        let mut request = ExportMetricsServiceRequest {
            resource_metrics: vec![
                resource_metrics(vec![string_attribute("env", "dev")]),
                resource_metrics(vec![string_attribute("host.name", "b")]),
            ],
        };
        let attributes = HashMap::from([("env".to_string(), "prod".to_string())]);

        inject(&mut request, &attributes);

        assert_eq!(
            request.resource_metrics[0].resource.as_ref().unwrap().attributes,
            vec![string_attribute("env", "prod")]
        );
        assert_eq!(
            request.resource_metrics[1].resource.as_ref().unwrap().attributes,
            vec![string_attribute("host.name", "b"), string_attribute("env", "prod")]
        );
    }

    #[test]
    fn test_empty_attributes_leave_payload_unchanged() {
        let mut request = ExportMetricsServiceRequest {
            resource_metrics: vec![resource_metrics(vec![string_attribute("env", "dev")])],
        };
        let before = request.clone();

        inject(&mut request, &HashMap::new());

        assert_eq!(request, before);
    }

    #[test]
    fn test_missing_resource_is_created() {
        let mut request = ExportMetricsServiceRequest {
            resource_metrics: vec![ResourceMetrics::default()],
        };
        let attributes = HashMap::from([("region".to_string(), "eu-west-1".to_string())]);

        inject(&mut request, &attributes);

        assert_eq!(
            request.resource_metrics[0].resource.as_ref().unwrap().attributes,
            vec![string_attribute("region", "eu-west-1")]
        );
    }
}
