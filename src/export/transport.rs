//! The RPC seam between the bridge and the OTLP metrics service.

use async_trait::async_trait;
use opentelemetry_proto::tonic::collector::metrics::v1::{
    metrics_service_client::MetricsServiceClient, ExportMetricsServiceRequest,
    ExportMetricsServiceResponse,
};
use tonic::codec::CompressionEncoding;
use tonic::transport::Channel;
use tonic::{Request, Response, Status};

/// Issues OTLP metric export calls.
#[async_trait]
pub trait MetricsTransport: Send + Sync {
    /// Sends one export request. Errors are returned as produced by the RPC layer.
    async fn export(
        &self,
        request: Request<ExportMetricsServiceRequest>,
    ) -> Result<ExportMetricsServiceResponse, Status>;
}

/// gRPC transport backed by a tonic channel
#[derive(Debug, Clone)]
pub struct GrpcTransport {
    client: MetricsServiceClient<Channel>,
}

impl GrpcTransport {
    /// Binds a metrics client to `channel`, compressing every request with
    /// `compression` when set.
    pub fn new(channel: Channel, compression: Option<CompressionEncoding>) -> Self {
        let mut client = MetricsServiceClient::new(channel);
        if let Some(encoding) = compression {
            client = client.send_compressed(encoding);
        }
        Self { client }
    }
}

#[async_trait]
impl MetricsTransport for GrpcTransport {
    async fn export(
        &self,
        request: Request<ExportMetricsServiceRequest>,
    ) -> Result<ExportMetricsServiceResponse, Status> {
        // Channel clones share the underlying connection
        let mut client = self.client.clone();
        client.export(request).await.map(Response::into_inner)
    }
}
