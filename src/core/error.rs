use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TLS configuration error: {0}")]
    Tls(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Metrics converter error: {0}")]
    Converter(String),

    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("Export failed: {0}")]
    Export(#[from] tonic::Status),

    #[error("Output is not connected")]
    NotConnected,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {message}")]
    Parse { message: String },
}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

impl BridgeError {
    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new TLS error
    pub fn tls<S: Into<String>>(msg: S) -> Self {
        Self::Tls(msg.into())
    }

    /// Creates a new parse error
    pub fn parse<S: Into<String>>(msg: S) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Returns the gRPC status of a failed export, if this is one.
    pub fn status(&self) -> Option<&tonic::Status> {
        match self {
            Self::Export(status) => Some(status),
            _ => None,
        }
    }

    /// Returns the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Tls(_) => "tls",
            Self::InvalidEndpoint(_) | Self::Transport(_) => "connection",
            Self::Converter(_) => "converter",
            Self::Export(_) => "export",
            Self::NotConnected => "lifecycle",
            Self::Io(_) => "io",
            Self::Parse { .. } => "parse",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = BridgeError::config("test message");
        assert_eq!(err.to_string(), "Configuration error: test message");
        assert_eq!(err.category(), "config");
    }

    #[test]
    fn test_export_status_is_preserved() {
        let err = BridgeError::from(tonic::Status::unavailable("backend down"));
        assert_eq!(err.category(), "export");
        let status = err.status().unwrap();
        assert_eq!(status.code(), tonic::Code::Unavailable);
        assert_eq!(status.message(), "backend down");
    }

    #[test]
    fn test_not_connected() {
        let err = BridgeError::NotConnected;
        assert_eq!(err.to_string(), "Output is not connected");
        assert!(err.status().is_none());
    }
}
