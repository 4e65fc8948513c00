//! otlp-bridge - export metric points to OpenTelemetry collectors.
//!
//! The bridge accepts batches of locally typed metric points, converts them
//! into OTLP metrics and sends each batch as one
//! `opentelemetry.proto.collector.metrics.v1.MetricsService/Export` call.
//!
//! # Architecture
//!
//! - `core`: metric points, configuration and errors
//! - `convert`: point to OTLP conversion
//! - `dialect`: vendor profiles (headers, required transport security)
//! - `export`: connection lifecycle and export calls
//! - `cli`: command-line host reading InfluxDB line protocol
//!
//! # Example
//!
//! ```no_run
//! use otlp_bridge::core::{ConfigBuilder, Metric, MetricKind};
//! use otlp_bridge::OtlpOutput;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigBuilder::new()
//!         .service_address("collector:4317")
//!         .attribute("deployment.environment", "prod")
//!         .build()?;
//!
//!     let mut output = OtlpOutput::new(config);
//!     output.connect().await?;
//!
//!     let point = Metric::builder("cpu")
//!         .kind(MetricKind::Gauge)
//!         .tag("host", "web-1")
//!         .field("usage_idle", 93.5)
//!         .build()?;
//!     output.write(&[point]).await?;
//!
//!     output.close().await?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod cli;
pub mod convert;
pub mod core;
pub mod dialect;
pub mod export;

// Re-export core types for convenience
pub use crate::core::{BridgeError, OutputConfig, Result};
pub use crate::export::{OtlpOutput, Output};
