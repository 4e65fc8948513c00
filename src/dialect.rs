//! Vendor dialects.
//!
//! A dialect is a named vendor profile that contributes headers and decides
//! whether the transport must be encrypted. The connection manager only asks
//! the policy; it never looks at vendor names itself.

use serde::{Deserialize, Serialize};

/// Dialect selector value for Coralogix
pub const CORALOGIX_DIALECT: &str = "coralogix";

/// Coralogix account settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoralogixConfig {
    /// Application the metrics are attributed to
    pub application_name: String,
    /// Subsystem the metrics are attributed to
    pub subsystem_name: String,
    /// Send-your-data API key
    pub private_key: String,
}

/// Vendor dialect policy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Dialect {
    /// Generic OTLP endpoint
    #[default]
    None,
    /// Coralogix ingress
    Coralogix(CoralogixConfig),
}

impl Dialect {
    /// Headers this dialect sets, overriding configured headers of the same name.
    pub fn derive_headers(&self) -> Vec<(String, String)> {
        match self {
            Dialect::None => Vec::new(),
            Dialect::Coralogix(cx) => vec![
                ("ApplicationName".to_string(), cx.application_name.clone()),
                ("ApiName".to_string(), cx.subsystem_name.clone()),
                ("Authorization".to_string(), format!("Bearer {}", cx.private_key)),
            ],
        }
    }

    /// Whether the endpoint only accepts encrypted transport.
    pub fn requires_tls(&self) -> bool {
        match self {
            Dialect::None => false,
            Dialect::Coralogix(_) => true,
        }
    }

    /// Selector value of this dialect, `none` for the generic endpoint.
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::None => "none",
            Dialect::Coralogix(_) => CORALOGIX_DIALECT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coralogix() -> Dialect {
        Dialect::Coralogix(CoralogixConfig {
            application_name: "app".to_string(),
            subsystem_name: "sub".to_string(),
            private_key: "K".to_string(),
        })
    }

    #[test]
    fn test_coralogix_headers() {
        let headers = coralogix().derive_headers();
        assert_eq!(
            headers,
            vec![
                ("ApplicationName".to_string(), "app".to_string()),
                ("ApiName".to_string(), "sub".to_string()),
                ("Authorization".to_string(), "Bearer K".to_string()),
            ]
        );
    }

    #[test]
    fn test_coralogix_requires_tls() {
        assert!(coralogix().requires_tls());
        assert_eq!(coralogix().name(), "coralogix");
    }

    #[test]
    fn test_generic_dialect_is_inert() {
        assert!(Dialect::None.derive_headers().is_empty());
        assert!(!Dialect::None.requires_tls());
    }

    #[test]
    fn test_dialect_names() {
        assert_eq!(Dialect::None.name(), "none");
        assert_eq!(coralogix().name(), CORALOGIX_DIALECT);
    }
}
