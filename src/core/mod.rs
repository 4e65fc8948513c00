//! Core domain types, configuration and errors for the bridge.

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{ConfigBuilder, OutputConfig, TlsClientConfig};
pub use error::{BridgeError, Result};
pub use types::{FieldValue, Metric, MetricBuilder, MetricKind};
