//! Common test utilities and fixtures.

#![allow(dead_code)]

use opentelemetry_proto::tonic::collector::metrics::v1::{
    metrics_service_server::{MetricsService, MetricsServiceServer},
    ExportMetricsServiceRequest, ExportMetricsServiceResponse,
};
use opentelemetry_proto::tonic::common::v1::{any_value, KeyValue};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::codec::CompressionEncoding;
use tonic::metadata::MetadataMap;
use tonic::transport::Server;
use tonic::{Code, Request, Response, Status};

/// One export call as seen by the collector.
#[derive(Debug, Clone)]
pub struct ReceivedExport {
    pub metadata: MetadataMap,
    pub request: ExportMetricsServiceRequest,
}

impl ReceivedExport {
    pub fn header(&self, name: &str) -> Option<String> {
        self.metadata
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }
}

/// In-process OTLP metrics collector that records every export.
#[derive(Clone, Default)]
pub struct RecordingCollector {
    received: Arc<Mutex<Vec<ReceivedExport>>>,
    reject: Option<(Code, String)>,
}

impl RecordingCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every export with the given status.
    pub fn rejecting(code: Code, message: &str) -> Self {
        Self {
            reject: Some((code, message.to_string())),
            ..Self::default()
        }
    }

    pub fn received(&self) -> Vec<ReceivedExport> {
        self.received.lock().unwrap().clone()
    }
}

#[tonic::async_trait]
impl MetricsService for RecordingCollector {
    async fn export(
        &self,
        request: Request<ExportMetricsServiceRequest>,
    ) -> Result<Response<ExportMetricsServiceResponse>, Status> {
        let metadata = request.metadata().clone();
        self.received.lock().unwrap().push(ReceivedExport {
            metadata,
            request: request.into_inner(),
        });

        match &self.reject {
            Some((code, message)) => Err(Status::new(*code, message.clone())),
            None => Ok(Response::new(ExportMetricsServiceResponse::default())),
        }
    }
}

/// Serves `collector` on an ephemeral localhost port, accepting the given
/// request encodings. Returns the bound address.
pub async fn start_collector(
    collector: RecordingCollector,
    accept: &[CompressionEncoding],
) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut service = MetricsServiceServer::new(collector);
    for encoding in accept {
        service = service.accept_compressed(*encoding);
    }

    tokio::spawn(async move {
        Server::builder()
            .add_service(service)
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });

    addr
}

/// Looks up a string attribute by key.
pub fn string_value<'a>(attributes: &'a [KeyValue], key: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|kv| kv.key == key)
        .and_then(|kv| kv.value.as_ref())
        .and_then(|v| match &v.value {
            Some(any_value::Value::StringValue(s)) => Some(s.as_str()),
            _ => None,
        })
}
