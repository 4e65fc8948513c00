//! Command-line host for the OTLP output.
//!
//! Reads InfluxDB line protocol from a file or stdin and exports it to an
//! OTLP collector in fixed-size batches.

pub mod line_protocol;

use crate::core::{BridgeError, ConfigBuilder, Metric, MetricKind, OutputConfig, Result};
use crate::export::OtlpOutput;
use clap::Parser;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

/// Send InfluxDB line protocol to an OpenTelemetry collector
#[derive(Parser, Debug)]
#[command(name = "otlp-bridge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Line protocol file to export (default: stdin)
    pub input: Option<PathBuf>,

    /// Configuration file path (default: ~/.config/otlp-bridge/config.yaml)
    #[arg(short, long, env = "OTLP_BRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Collector address, overrides the configuration file
    #[arg(long, env = "OTLP_BRIDGE_SERVICE_ADDRESS")]
    pub service_address: Option<String>,

    /// Metric kind assigned to every input point
    #[arg(short, long, env = "OTLP_BRIDGE_KIND", default_value = "untyped")]
    pub kind: MetricKind,

    /// Points sent per export call
    #[arg(long, env = "OTLP_BRIDGE_BATCH_SIZE", default_value_t = 1000)]
    pub batch_size: usize,

    /// Enable debug logging
    #[arg(short, long, env = "OTLP_BRIDGE_DEBUG")]
    pub debug: bool,

    /// Validate configuration and exit
    #[arg(long)]
    pub check_config: bool,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Load configuration with precedence: CLI arguments, config file, defaults.
    pub async fn load_config(&self) -> Result<OutputConfig> {
        let mut builder = ConfigBuilder::new();

        let config_path = match &self.config {
            Some(path) => Some(path.clone()),
            None => dirs::config_dir()
                .map(|d| d.join("otlp-bridge").join("config.yaml"))
                .filter(|path| path.exists()),
        };

        if let Some(path) = config_path {
            let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
                BridgeError::config(format!("Failed to read config file {:?}: {}", path, e))
            })?;
            builder = builder.from_yaml(&content)?;
            tracing::info!("Loaded configuration from: {:?}", path);
        } else {
            tracing::debug!("No config file found, using defaults");
        }

        if let Some(address) = &self.service_address {
            builder = builder.service_address(address.clone());
        }

        builder.build()
    }

    /// Initialize logging. `RUST_LOG` wins over `OTLP_BRIDGE_LOG_LEVEL`.
    pub fn init_logging(&self) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let env_log_level =
            std::env::var("OTLP_BRIDGE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_level = if self.debug {
            "debug"
        } else {
            env_log_level.as_str()
        };

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        // stdout stays free for --check-config output
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(self.debug)
            .with_writer(std::io::stderr)
            .compact();

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| BridgeError::config(format!("Failed to initialize logging: {}", e)))?;

        Ok(())
    }

    async fn read_input(&self) -> Result<String> {
        match &self.input {
            Some(path) => Ok(tokio::fs::read_to_string(path).await?),
            None => {
                let mut input = String::new();
                tokio::io::stdin().read_to_string(&mut input).await?;
                Ok(input)
            },
        }
    }
}

/// Execute the bridge.
pub async fn execute(cli: Cli) -> Result<()> {
    cli.init_logging()?;

    let config = cli.load_config().await?;

    if cli.check_config {
        let effective = config.with_defaults();
        effective.validate()?;
        println!("Configuration is valid!");
        println!("  Service address: {}", effective.service_address);
        println!("  Timeout: {:?}", effective.timeout);
        println!("  Compression: {}", effective.compression);
        println!("  Dialect: {}", effective.dialect()?.name());
        println!("  Headers: {}", effective.headers.len());
        println!("  Attributes: {}", effective.attributes.len());
        println!("  TLS: {}", if effective.tls.is_empty() { "off" } else { "on" });
        return Ok(());
    }

    if cli.batch_size == 0 {
        return Err(BridgeError::config("batch size must be greater than zero"));
    }

    let input = cli.read_input().await?;
    let metrics = line_protocol::parse(&input, cli.kind)?;
    tracing::info!(points = metrics.len(), kind = %cli.kind, "Parsed input");

    let mut output = OtlpOutput::new(config);
    output.connect().await?;
    let result = write_batches(&output, &metrics, cli.batch_size).await;
    output.close().await?;
    result
}

/// Writes `metrics` in chunks of `batch_size`, stopping at the first failure.
pub async fn write_batches(output: &OtlpOutput, metrics: &[Metric], batch_size: usize) -> Result<()> {
    for (index, batch) in metrics.chunks(batch_size.max(1)).enumerate() {
        output.write(batch).await.map_err(|e| {
            tracing::error!(batch = index, error = %e, category = e.category(), "Export failed");
            e
        })?;
        tracing::debug!(batch = index, points = batch.len(), "Batch exported");
    }
    Ok(())
}
