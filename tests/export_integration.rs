//! End-to-end export tests against an in-process OTLP collector.

mod common;

use common::{start_collector, string_value, RecordingCollector};
use opentelemetry_proto::tonic::metrics::v1::metric::Data;
use otlp_bridge::cli::{line_protocol, write_batches};
use otlp_bridge::core::{BridgeError, ConfigBuilder, Metric, MetricKind, OutputConfig};
use otlp_bridge::dialect::CoralogixConfig;
use otlp_bridge::OtlpOutput;
use pretty_assertions::assert_eq;
use std::time::Duration;
use tonic::codec::CompressionEncoding;
use tonic::Code;

const ALL_ENCODINGS: &[CompressionEncoding] = &[CompressionEncoding::Gzip, CompressionEncoding::Zstd];

fn config_for(addr: std::net::SocketAddr) -> ConfigBuilder {
    ConfigBuilder::new()
        .service_address(addr.to_string())
        .timeout(Duration::from_secs(5))
}

fn cpu(host: &str, value: f64) -> Metric {
    Metric::builder("cpu")
        .kind(MetricKind::Gauge)
        .tag("host.name", host)
        .tag("core", "0")
        .field("gauge", value)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_export_reaches_collector() {
    let collector = RecordingCollector::new();
    let addr = start_collector(collector.clone(), ALL_ENCODINGS).await;

    let config = config_for(addr)
        .header("x-tenant", "acme")
        .attribute("deployment.environment", "prod")
        .build()
        .unwrap();
    let mut output = OtlpOutput::new(config);
    output.connect().await.unwrap();

    output.write(&[cpu("web-1", 0.5), cpu("web-2", 0.75)]).await.unwrap();
    output.close().await.unwrap();

    let received = collector.received();
    assert_eq!(received.len(), 1);
    let export = &received[0];
    assert_eq!(export.header("x-tenant").as_deref(), Some("acme"));
    assert!(export.header("user-agent").unwrap().contains("otlp-bridge/"));

    // One resource per host, each stamped with the static attributes
    let resources = &export.request.resource_metrics;
    assert_eq!(resources.len(), 2);
    for (resource_metrics, host) in resources.iter().zip(["web-1", "web-2"]) {
        let attributes = &resource_metrics.resource.as_ref().unwrap().attributes;
        assert_eq!(string_value(attributes, "host.name"), Some(host));
        assert_eq!(string_value(attributes, "deployment.environment"), Some("prod"));

        let metric = &resource_metrics.scope_metrics[0].metrics[0];
        assert_eq!(metric.name, "cpu");
        let Some(Data::Gauge(gauge)) = &metric.data else {
            panic!("expected gauge, got {:?}", metric.data);
        };
        assert_eq!(string_value(&gauge.data_points[0].attributes, "core"), Some("0"));
    }
}

#[tokio::test]
async fn test_each_codec_is_accepted() {
    for codec in ["gzip", "zstd", "none"] {
        let collector = RecordingCollector::new();
        let addr = start_collector(collector.clone(), ALL_ENCODINGS).await;

        let config = config_for(addr).compression(codec).build().unwrap();
        let mut output = OtlpOutput::new(config);
        output.connect().await.unwrap();
        output.write(&[cpu("web-1", 1.0)]).await.unwrap();

        assert_eq!(collector.received().len(), 1, "codec {}", codec);
    }
}

#[tokio::test]
async fn test_compression_is_applied() {
    // A collector that only understands gzip refuses zstd payloads
    let collector = RecordingCollector::new();
    let addr = start_collector(collector.clone(), &[CompressionEncoding::Gzip]).await;

    let config = config_for(addr).compression("zstd").build().unwrap();
    let mut output = OtlpOutput::new(config);
    output.connect().await.unwrap();

    let err = output.write(&[cpu("web-1", 1.0)]).await.unwrap_err();
    assert_eq!(err.status().unwrap().code(), Code::Unimplemented);
    assert!(collector.received().is_empty());
}

#[tokio::test]
async fn test_backend_error_returned_verbatim() {
    let collector = RecordingCollector::rejecting(Code::ResourceExhausted, "ingest quota exceeded");
    let addr = start_collector(collector, ALL_ENCODINGS).await;

    let mut output = OtlpOutput::new(config_for(addr).build().unwrap());
    output.connect().await.unwrap();

    let err = output.write(&[cpu("web-1", 1.0)]).await.unwrap_err();
    let BridgeError::Export(status) = err else {
        panic!("expected export error, got {:?}", err);
    };
    assert_eq!(status.code(), Code::ResourceExhausted);
    assert_eq!(status.message(), "ingest quota exceeded");
}

#[tokio::test]
async fn test_coralogix_refuses_plaintext_scheme() {
    let collector = RecordingCollector::new();
    let addr = start_collector(collector.clone(), ALL_ENCODINGS).await;

    let config = ConfigBuilder::new()
        .service_address(format!("http://{}", addr))
        .coralogix(CoralogixConfig {
            application_name: "app".to_string(),
            subsystem_name: "sub".to_string(),
            private_key: "K".to_string(),
        })
        .build()
        .unwrap();
    let mut output = OtlpOutput::new(config);

    let err = output.connect().await.unwrap_err();
    assert!(matches!(err, BridgeError::InvalidEndpoint(_)), "unexpected error {:?}", err);
    assert!(!output.is_connected());
    assert!(matches!(
        output.write(&[cpu("web-1", 1.0)]).await,
        Err(BridgeError::NotConnected)
    ));
    assert!(collector.received().is_empty());
}

#[tokio::test]
async fn test_connect_is_lazy() {
    // Nothing listens here; connect still succeeds and the write reports it
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = OutputConfig {
        service_address: addr.to_string(),
        timeout: Duration::from_secs(2),
        ..OutputConfig::default()
    };
    let mut output = OtlpOutput::new(config);
    output.connect().await.unwrap();

    let err = output.write(&[cpu("web-1", 1.0)]).await.unwrap_err();
    assert!(err.status().is_some(), "unexpected error {:?}", err);
}

#[tokio::test]
async fn test_line_protocol_in_batches() {
    let collector = RecordingCollector::new();
    let addr = start_collector(collector.clone(), ALL_ENCODINGS).await;

    let input = "\
requests,service.name=api,route=/users counter=10i 1700000000000000000
requests,service.name=api,route=/orders counter=4i 1700000000000000000
requests,service.name=api,route=/users counter=12i 1700000010000000000
requests,service.name=api,route=/orders counter=5i 1700000010000000000
requests,service.name=api,route=/users counter=15i 1700000020000000000
";
    let metrics = line_protocol::parse(input, MetricKind::Counter).unwrap();

    let mut output = OtlpOutput::new(config_for(addr).build().unwrap());
    output.connect().await.unwrap();
    write_batches(&output, &metrics, 2).await.unwrap();
    output.close().await.unwrap();

    let received = collector.received();
    assert_eq!(received.len(), 3);

    let first = &received[0].request.resource_metrics[0];
    assert_eq!(
        string_value(&first.resource.as_ref().unwrap().attributes, "service.name"),
        Some("api")
    );
    let Some(Data::Sum(sum)) = &first.scope_metrics[0].metrics[0].data else {
        panic!("counters export as sums");
    };
    assert!(sum.is_monotonic);
    assert_eq!(sum.data_points.len(), 2);
}
