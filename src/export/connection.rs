//! Connection establishment: credentials, channel, codec and metadata.

use crate::convert::{Conversion, MetricsConverter};
use crate::core::{BridgeError, Metric, OutputConfig, Result, TlsClientConfig};
use crate::dialect::Dialect;
use crate::export::attributes;
use crate::export::transport::MetricsTransport;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tonic::codec::CompressionEncoding;
use tonic::metadata::{AsciiMetadataKey, AsciiMetadataValue, MetadataMap};
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint, Identity};
use tonic::{Request, Status};

static USER_AGENT: Lazy<String> = Lazy::new(|| {
    format!(
        "otlp-bridge/{} ({}/{})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
});

/// User agent announced on every channel.
pub fn user_agent() -> &'static str {
    USER_AGENT.as_str()
}

/// Transport security chosen for a connection
#[derive(Debug, Clone)]
pub enum Credential {
    Plaintext,
    Tls(ClientTlsConfig),
}

impl Credential {
    pub fn is_tls(&self) -> bool {
        matches!(self, Credential::Tls(_))
    }
}

/// Effective settings of a connection after defaults and dialect are applied.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub service_address: String,
    pub timeout: Duration,
    pub compression: Option<CompressionEncoding>,
    pub headers: HashMap<String, String>,
    pub attributes: HashMap<String, String>,
    pub tls: TlsClientConfig,
    pub dialect: Dialect,
}

impl ConnectionSettings {
    /// Applies defaults, merges dialect headers over configured ones and
    /// resolves the compression codec.
    pub fn resolve(config: &OutputConfig) -> Result<Self> {
        let config = config.with_defaults();
        config.validate()?;

        let dialect = config.dialect()?;
        let mut headers = config.headers;
        for (key, value) in dialect.derive_headers() {
            headers.insert(key, value);
        }

        Ok(Self {
            compression: resolve_compression(&config.compression)?,
            service_address: config.service_address,
            timeout: config.timeout,
            headers,
            attributes: config.attributes,
            tls: config.tls,
            dialect,
        })
    }
}

/// Maps a codec name to a tonic encoding. `none` and empty disable compression.
pub fn resolve_compression(name: &str) -> Result<Option<CompressionEncoding>> {
    match name {
        "" | "none" => Ok(None),
        "gzip" => Ok(Some(CompressionEncoding::Gzip)),
        "zstd" => Ok(Some(CompressionEncoding::Zstd)),
        other => Err(BridgeError::config(format!(
            "Unsupported compression codec: {}",
            other
        ))),
    }
}

/// Picks the transport credential: explicit TLS settings first, then the
/// dialect's requirement, then plaintext.
pub async fn resolve_credential(tls: &TlsClientConfig, dialect: &Dialect) -> Result<Credential> {
    if !tls.is_empty() {
        return Ok(Credential::Tls(load_tls(tls).await?));
    }
    if dialect.requires_tls() {
        tracing::debug!(dialect = dialect.name(), "Dialect requires TLS, using system roots");
        return Ok(Credential::Tls(ClientTlsConfig::new().with_native_roots()));
    }
    Ok(Credential::Plaintext)
}

async fn load_tls(tls: &TlsClientConfig) -> Result<ClientTlsConfig> {
    let mut config = ClientTlsConfig::new();

    config = match &tls.tls_ca {
        Some(ca) => config.ca_certificate(Certificate::from_pem(read_pem(ca).await?)),
        None => config.with_native_roots(),
    };

    if let (Some(cert), Some(key)) = (&tls.tls_cert, &tls.tls_key) {
        let identity = Identity::from_pem(read_pem(cert).await?, read_pem(key).await?);
        config = config.identity(identity);
    }

    if let Some(name) = &tls.tls_server_name {
        config = config.domain_name(name.clone());
    }

    Ok(config)
}

async fn read_pem(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|e| BridgeError::tls(format!("failed to read {}: {}", path.display(), e)))
}

/// Turns a configured address into a URI, adding a scheme that matches the
/// credential when none is given.
///
/// A TLS credential only accepts `https`; any other explicit scheme would
/// silently downgrade the channel to plaintext.
pub fn endpoint_uri(address: &str, credential: &Credential) -> Result<String> {
    match address.split_once("://") {
        Some((scheme, _)) if credential.is_tls() && !scheme.eq_ignore_ascii_case("https") => {
            Err(BridgeError::InvalidEndpoint(format!(
                "{}: scheme '{}' cannot be used with TLS, use https",
                address, scheme
            )))
        },
        Some(_) => Ok(address.to_string()),
        None => {
            let scheme = if credential.is_tls() { "https" } else { "http" };
            Ok(format!("{}://{}", scheme, address))
        },
    }
}

/// Creates a lazily connecting channel; nothing touches the network here.
pub fn open_channel(address: &str, credential: &Credential) -> Result<Channel> {
    let uri = endpoint_uri(address, credential)?;
    let mut endpoint = Endpoint::from_shared(uri.clone())
        .map_err(|e| BridgeError::InvalidEndpoint(format!("{}: {}", uri, e)))?
        .user_agent(user_agent())?;

    if let Credential::Tls(tls) = credential {
        endpoint = endpoint.tls_config(tls.clone())?;
    }

    Ok(endpoint.connect_lazy())
}

/// Converts header pairs into gRPC metadata.
pub fn build_metadata(headers: &HashMap<String, String>) -> Result<MetadataMap> {
    let mut metadata = MetadataMap::with_capacity(headers.len());
    for (key, value) in headers {
        let name = AsciiMetadataKey::from_bytes(key.as_bytes())
            .map_err(|e| BridgeError::config(format!("invalid header name '{}': {}", key, e)))?;
        let value = value
            .parse::<AsciiMetadataValue>()
            .map_err(|e| BridgeError::config(format!("invalid value for header '{}': {}", key, e)))?;
        metadata.insert(name, value);
    }
    Ok(metadata)
}

/// Everything a live output needs to export.
pub struct Connection {
    converter: MetricsConverter,
    transport: Arc<dyn MetricsTransport>,
    metadata: MetadataMap,
    timeout: Duration,
    attributes: HashMap<String, String>,
    credential: Credential,
    service_address: String,
}

impl Connection {
    pub(crate) fn new(
        settings: ConnectionSettings,
        converter: MetricsConverter,
        transport: Arc<dyn MetricsTransport>,
        credential: Credential,
    ) -> Result<Self> {
        let metadata = build_metadata(&settings.headers)?;
        Ok(Self {
            converter,
            transport,
            metadata,
            timeout: settings.timeout,
            attributes: settings.attributes,
            credential,
            service_address: settings.service_address,
        })
    }

    pub fn metadata(&self) -> &MetadataMap {
        &self.metadata
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn service_address(&self) -> &str {
        &self.service_address
    }

    /// Converts and sends one write cycle's points as a single export call.
    pub(crate) async fn export(&self, metrics: &[Metric]) -> Result<()> {
        let Conversion { batch, skipped } = self.converter.convert(metrics);
        for point in &skipped {
            tracing::warn!(metric = %point.name, "{}", point.reason);
        }

        if batch.is_empty() {
            tracing::debug!(skipped = skipped.len(), "Nothing to export");
            return Ok(());
        }

        let points = batch.len();
        let mut payload = batch.finish();
        attributes::inject(&mut payload, &self.attributes);

        let mut request = Request::new(payload);
        *request.metadata_mut() = self.metadata.clone();
        request.set_timeout(self.timeout);

        let response = tokio::time::timeout(self.timeout, self.transport.export(request))
            .await
            .map_err(|_| {
                Status::deadline_exceeded(format!("export timed out after {:?}", self.timeout))
            })??;

        if let Some(partial) = response.partial_success {
            if partial.rejected_data_points > 0 || !partial.error_message.is_empty() {
                tracing::warn!(
                    rejected = partial.rejected_data_points,
                    message = %partial.error_message,
                    "Backend partially rejected export"
                );
            }
        }

        tracing::debug!(points, "Exported metrics");
        Ok(())
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("service_address", &self.service_address)
            .field("timeout", &self.timeout)
            .field("tls", &self.credential.is_tls())
            .finish_non_exhaustive()
    }
}
