//! Configuration schema definitions.
//!
//! Property buckets for clients and the manifest consumed by the binary.
//! All types derive Serde traits for deserialization from TOML.

use std::collections::{BTreeMap, HashMap};
use serde::{Deserialize, Serialize};
use crate::client::builder::ExceptionPropagation;
use crate::contract::InterfaceMeta;
use crate::observability::LogLevel;
use crate::registrar::descriptor::ClientAttributes;

/// Client properties, normally under `[client]`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientProperties {
    /// Property layer applied after the declarative layer when true.
    pub default_to_properties: bool,

    /// Bucket applied to every client before its own bucket.
    pub default_config: String,

    /// Options come from refreshable cells instead of the property layer.
    pub refresh_enabled: bool,

    /// Keep `%2F` decoded in expanded paths.
    pub decode_slash: bool,

    /// Buckets by client name, plus the default bucket.
    pub config: HashMap<String, ClientConfigProperties>,
}

impl Default for ClientProperties {
    fn default() -> Self {
        Self {
            default_to_properties: true,
            default_config: "default".to_string(),
            refresh_enabled: false,
            decode_slash: true,
            config: HashMap::new(),
        }
    }
}

impl ClientProperties {
    pub fn bucket(&self, name: &str) -> Option<&ClientConfigProperties> {
        self.config.get(name)
    }

    pub fn default_bucket(&self) -> Option<&ClientConfigProperties> {
        self.config.get(&self.default_config)
    }
}

/// One property bucket. Absent fields leave earlier layers untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfigProperties {
    pub logger_level: Option<LogLevel>,

    /// Milliseconds.
    pub connect_timeout: Option<u64>,

    /// Milliseconds.
    pub read_timeout: Option<u64>,

    pub follow_redirects: Option<bool>,

    /// Component names, resolved through the context then the catalog.
    pub retryer: Option<String>,
    pub error_decoder: Option<String>,
    pub request_interceptors: Option<Vec<String>>,
    pub encoder: Option<String>,
    pub decoder: Option<String>,
    pub contract: Option<String>,
    pub query_map_encoder: Option<String>,
    pub capabilities: Option<Vec<String>>,

    pub default_request_headers: Option<BTreeMap<String, Vec<String>>>,
    pub default_query_parameters: Option<BTreeMap<String, Vec<String>>>,

    pub decode_404: Option<bool>,
    pub exception_propagation_policy: Option<ExceptionPropagation>,
}

/// Static service instance for the load-balancing transport.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InstanceConfig {
    pub service_id: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub secure: bool,
}

/// A client declared in a manifest: registration attributes plus its interface.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientDeclaration {
    #[serde(flatten)]
    pub attributes: ClientAttributes,
    pub interface: InterfaceMeta,
}

/// Everything the binary needs to bootstrap clients.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Manifest {
    pub client: ClientProperties,

    /// Properties for `${...}` placeholders.
    pub environment: HashMap<String, String>,

    pub clients: Vec<ClientDeclaration>,

    pub instances: Vec<InstanceConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let props: ClientProperties = toml::from_str("").unwrap();
        assert!(props.default_to_properties);
        assert_eq!(props.default_config, "default");
        assert!(!props.refresh_enabled);
        assert!(props.decode_slash);
    }

    #[test]
    fn test_parse_buckets() {
        let src = r#"
            default_to_properties = false

            [config.default]
            connect_timeout = 2000
            logger_level = "basic"

            [config.users]
            read_timeout = 500
            retryer = "default"
            request_interceptors = ["auth"]
            exception_propagation_policy = "unwrap"

            [config.users.default_request_headers]
            X-Team = ["core"]
        "#;
        let props: ClientProperties = toml::from_str(src).unwrap();
        assert!(!props.default_to_properties);
        let default = props.default_bucket().unwrap();
        assert_eq!(default.connect_timeout, Some(2000));
        assert_eq!(default.logger_level, Some(LogLevel::Basic));
        let users = props.bucket("users").unwrap();
        assert_eq!(users.read_timeout, Some(500));
        assert_eq!(users.exception_propagation_policy, Some(ExceptionPropagation::Unwrap));
        assert_eq!(
            users.default_request_headers.as_ref().unwrap()["X-Team"],
            vec!["core".to_string()]
        );
    }
}
