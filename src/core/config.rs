//! Configuration management for the OTLP output.
//!
//! This module provides configuration handling with:
//! - YAML file support
//! - Programmatic construction through [`ConfigBuilder`]
//! - Validation and defaults

use crate::core::{BridgeError, Result};
use crate::dialect::{CoralogixConfig, Dialect, CORALOGIX_DIALECT};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Endpoint used when none is configured
pub const DEFAULT_SERVICE_ADDRESS: &str = "localhost:4317";
/// Per-call export deadline used when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
/// Compression codec used when none is configured
pub const DEFAULT_COMPRESSION: &str = "gzip";
/// Compression value that disables compression
pub const COMPRESSION_NONE: &str = "none";

/// Complete configuration for the OTLP output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Address of the OTLP gRPC endpoint, with or without scheme
    pub service_address: String,
    /// Deadline applied to every export call
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Compression codec name (`gzip`, `zstd`, or `none`)
    pub compression: String,
    /// Static headers sent as gRPC metadata on every export
    pub headers: HashMap<String, String>,
    /// Static attributes stamped onto every resource
    pub attributes: HashMap<String, String>,
    /// Client TLS settings
    pub tls: TlsClientConfig,
    /// Vendor dialect selector
    pub dialect: String,
    /// Coralogix settings, required when `dialect` is `coralogix`
    pub coralogix: Option<CoralogixConfig>,
}

/// Client TLS configuration.
///
/// Paths point at PEM encoded material; nothing is read until connect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsClientConfig {
    /// CA certificate used to verify the server
    pub tls_ca: Option<PathBuf>,
    /// Client certificate for mutual TLS
    pub tls_cert: Option<PathBuf>,
    /// Client private key for mutual TLS
    pub tls_key: Option<PathBuf>,
    /// Override of the server name used for verification
    pub tls_server_name: Option<String>,
    /// Use TLS with system roots even when no other option is set
    pub tls_enable: bool,
}

impl TlsClientConfig {
    /// Returns true when no TLS option has been set.
    pub fn is_empty(&self) -> bool {
        self.tls_ca.is_none()
            && self.tls_cert.is_none()
            && self.tls_key.is_none()
            && self.tls_server_name.is_none()
            && !self.tls_enable
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            service_address: DEFAULT_SERVICE_ADDRESS.to_string(),
            timeout: DEFAULT_TIMEOUT,
            compression: DEFAULT_COMPRESSION.to_string(),
            headers: HashMap::new(),
            attributes: HashMap::new(),
            tls: TlsClientConfig::default(),
            dialect: String::new(),
            coralogix: None,
        }
    }
}

impl OutputConfig {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = OutputConfig::default();
        config.validate()?;
        Ok(config)
    }

    /// Returns a copy with empty or zero settings replaced by their defaults.
    pub fn with_defaults(&self) -> Self {
        let mut config = self.clone();
        if config.service_address.is_empty() {
            config.service_address = DEFAULT_SERVICE_ADDRESS.to_string();
        }
        if config.timeout.is_zero() {
            config.timeout = DEFAULT_TIMEOUT;
        }
        if config.compression.is_empty() {
            config.compression = DEFAULT_COMPRESSION.to_string();
        }
        config
    }

    /// Resolves the dialect selector and its vendor section into a policy.
    pub fn dialect(&self) -> Result<Dialect> {
        match self.dialect.as_str() {
            "" => Ok(Dialect::None),
            CORALOGIX_DIALECT => self
                .coralogix
                .clone()
                .map(Dialect::Coralogix)
                .ok_or_else(|| {
                    BridgeError::config("dialect 'coralogix' requires a 'coralogix' section")
                }),
            other => Err(BridgeError::config(format!("Unknown dialect: {}", other))),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.tls.tls_cert.is_some() != self.tls.tls_key.is_some() {
            return Err(BridgeError::config(
                "tls_cert and tls_key must be configured together",
            ));
        }

        match self.compression.as_str() {
            "" | COMPRESSION_NONE | "gzip" | "zstd" => {},
            other => {
                return Err(BridgeError::config(format!(
                    "Unsupported compression codec: {}",
                    other
                )));
            },
        }

        self.dialect()?;

        Ok(())
    }
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: OutputConfig,
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: OutputConfig::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| BridgeError::config(format!("Failed to parse YAML config: {}", e)))?;
        Ok(self)
    }

    /// Set the OTLP endpoint
    pub fn service_address(mut self, address: impl Into<String>) -> Self {
        self.config.service_address = address.into();
        self
    }

    /// Set the export deadline
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the compression codec
    pub fn compression(mut self, codec: impl Into<String>) -> Self {
        self.config.compression = codec.into();
        self
    }

    /// Add a static header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.headers.insert(key.into(), value.into());
        self
    }

    /// Add a static resource attribute
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.attributes.insert(key.into(), value.into());
        self
    }

    /// Set client TLS settings
    pub fn tls(mut self, tls: TlsClientConfig) -> Self {
        self.config.tls = tls;
        self
    }

    /// Select the Coralogix dialect
    pub fn coralogix(mut self, coralogix: CoralogixConfig) -> Self {
        self.config.dialect = CORALOGIX_DIALECT.to_string();
        self.config.coralogix = Some(coralogix);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<OutputConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
