//! OTLP metrics output.
//!
//! [`OtlpOutput`] owns the connection lifecycle and turns each write into one
//! `MetricsService/Export` call:
//!
//! ```text
//! Uninitialized --connect--> Connected --close--> Closed
//!                                ^                   |
//!                                +-----connect-------+
//! ```

pub mod attributes;
pub mod connection;
pub mod transport;

pub use connection::{Connection, ConnectionSettings, Credential};
pub use transport::{GrpcTransport, MetricsTransport};

use crate::convert::MetricsConverter;
use crate::core::{BridgeError, Metric, OutputConfig, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tonic::transport::ClientTlsConfig;

/// Contract between a metrics pipeline and an output sink
#[async_trait]
pub trait Output: Send + Sync {
    /// Prepares the output for writes.
    async fn connect(&mut self) -> Result<()>;

    /// Releases the connection. Safe to call more than once.
    async fn close(&mut self) -> Result<()>;

    /// Sends one batch of points.
    async fn write(&self, metrics: &[Metric]) -> Result<()>;
}

/// Lifecycle of an output
#[derive(Debug, Default)]
pub enum ConnectionState {
    #[default]
    Uninitialized,
    Connected(Connection),
    Closed,
}

impl ConnectionState {
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionState::Uninitialized => "uninitialized",
            ConnectionState::Connected(_) => "connected",
            ConnectionState::Closed => "closed",
        }
    }
}

/// Output that exports metrics to an OTLP/gRPC endpoint
#[derive(Debug)]
pub struct OtlpOutput {
    config: OutputConfig,
    state: ConnectionState,
}

impl OtlpOutput {
    pub fn new(config: OutputConfig) -> Self {
        Self {
            config,
            state: ConnectionState::Uninitialized,
        }
    }

    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, ConnectionState::Connected(_))
    }

    /// The live connection, if any.
    pub fn connection(&self) -> Option<&Connection> {
        match &self.state {
            ConnectionState::Connected(connection) => Some(connection),
            _ => None,
        }
    }

    /// Establishes a lazily connecting gRPC channel to the configured endpoint.
    ///
    /// A failed connect leaves the output in its previous state.
    pub async fn connect(&mut self) -> Result<()> {
        self.ensure_not_connected()?;

        let settings = ConnectionSettings::resolve(&self.config)?;
        let converter = MetricsConverter::new()?;
        let credential = connection::resolve_credential(&settings.tls, &settings.dialect).await?;
        let channel = connection::open_channel(&settings.service_address, &credential)?;
        let transport = GrpcTransport::new(channel, settings.compression);

        tracing::info!(
            endpoint = %settings.service_address,
            tls = credential.is_tls(),
            compression = ?settings.compression,
            dialect = settings.dialect.name(),
            "OTLP output connected"
        );

        let connection = Connection::new(settings, converter, Arc::new(transport), credential)?;
        self.state = ConnectionState::Connected(connection);
        Ok(())
    }

    /// Connects using a caller supplied transport instead of a gRPC channel.
    ///
    /// Defaults, dialect headers and metadata are resolved exactly as in
    /// [`connect`](Self::connect); TLS material is not loaded.
    pub async fn connect_with(&mut self, transport: Arc<dyn MetricsTransport>) -> Result<()> {
        self.ensure_not_connected()?;

        let settings = ConnectionSettings::resolve(&self.config)?;
        let converter = MetricsConverter::new()?;
        let credential = if settings.dialect.requires_tls() || !settings.tls.is_empty() {
            Credential::Tls(ClientTlsConfig::new())
        } else {
            Credential::Plaintext
        };

        let connection = Connection::new(settings, converter, transport, credential)?;
        self.state = ConnectionState::Connected(connection);
        Ok(())
    }

    /// Drops the connection. Closing an output that never connected, or that
    /// is already closed, does nothing.
    pub async fn close(&mut self) -> Result<()> {
        if !self.is_connected() {
            tracing::debug!(state = self.state.name(), "Close on an output that is not connected");
            return Ok(());
        }

        if let ConnectionState::Connected(connection) =
            std::mem::replace(&mut self.state, ConnectionState::Closed)
        {
            tracing::info!(endpoint = %connection.service_address(), "OTLP output closed");
        }
        Ok(())
    }

    /// Converts `metrics` and exports them in a single call.
    pub async fn write(&self, metrics: &[Metric]) -> Result<()> {
        match &self.state {
            ConnectionState::Connected(connection) => connection.export(metrics).await,
            _ => Err(BridgeError::NotConnected),
        }
    }

    fn ensure_not_connected(&self) -> Result<()> {
        if self.is_connected() {
            return Err(BridgeError::config("output is already connected"));
        }
        Ok(())
    }
}

#[async_trait]
impl Output for OtlpOutput {
    async fn connect(&mut self) -> Result<()> {
        OtlpOutput::connect(self).await
    }

    async fn close(&mut self) -> Result<()> {
        OtlpOutput::close(self).await
    }

    async fn write(&self, metrics: &[Metric]) -> Result<()> {
        OtlpOutput::write(self, metrics).await
    }
}
