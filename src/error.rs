//! Error taxonomy.
//!
//! # Categories
//! - `ContractError`: raised while compiling interface metadata; fatal to startup
//! - `ConfigError`: raised while registering or building a client; fatal to startup
//! - `InvocationFault`: raised per call; surfaced to the caller
//! - `PropertiesError`: raised while loading configuration files
//!
//! # Design Decisions
//! - Startup errors abort construction; no partially built client is cached
//! - Invocation faults are never retried here unless a `Retryer` asks for it

use std::time::Duration;
use thiserror::Error;

/// Violations found while compiling a client interface into templates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    /// Routing metadata was declared on the interface itself.
    #[error("routing annotations are not allowed on client interface {type_name}")]
    ClassLevelRoutingNotAllowed { type_name: String },

    /// A method mapping declared zero or several path values.
    #[error("method {method} must declare exactly one path value, found {found}")]
    MultiplePathValues { method: String, found: usize },

    /// A method mapping declared several HTTP verbs.
    #[error("method {method} can only declare one HTTP method, found {found}")]
    MultipleHttpMethods { method: String, found: usize },

    /// A method has no request mapping at all.
    #[error("method {method} is not annotated with an HTTP method type (ex. GET, POST)")]
    MissingRequestMapping { method: String },

    /// A `${...}` placeholder had no value and no default.
    #[error("could not resolve placeholder '{placeholder}' in value \"{value}\"")]
    UnresolvablePlaceholder { placeholder: String, value: String },

    /// A declared base URL is not well formed.
    #[error("{url} is malformed: {reason}")]
    MalformedUrl { url: String, reason: String },

    /// A binding annotation needs a name and none could be found.
    #[error("{kind} annotation was empty on parameter {index} of {method}")]
    MissingParameterName {
        method: String,
        index: usize,
        kind: String,
    },

    /// More than one unannotated parameter.
    #[error("method {method} has too many body parameters")]
    MultipleBodyParameters { method: String },

    /// A body parameter was combined with form parameters.
    #[error("body parameters cannot be used with form parameters on {method}")]
    BodyWithFormParameters { method: String },

    /// A query map or header map parameter was declared twice.
    #[error("{kind} can only be present once on {method}")]
    DuplicateMapParameter { method: String, kind: String },

    /// Two methods compiled to the same configuration key.
    #[error("overloaded method {key} is not supported")]
    DuplicateMethod { key: String },

    /// No template exists for the requested method.
    #[error("no compiled template for {key}")]
    UnknownMethod { key: String },
}

/// Problems found while registering, configuring or building a client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("either 'name' or 'value' must be provided for client {type_name}")]
    MissingName { type_name: String },

    #[error("context id must be set for client {type_name}")]
    MissingContextId { type_name: String },

    #[error("service id not legal hostname ({name})")]
    IllegalServiceName { name: String },

    #[error("client type {type_name} must be an interface")]
    NotAnInterface { type_name: String },

    #[error("fallback {fallback} of client {name} must implement the client interface")]
    FallbackIsInterface { name: String, fallback: String },

    #[error("fallback factory {factory} of client {name} must produce implementations of the client interface")]
    FallbackFactoryIsInterface { name: String, factory: String },

    /// No URL was declared and nothing can pick an instance.
    #[error("no load-balancing transport defined for client '{name}'")]
    NoLoadBalancerTransport { name: String },

    #[error("no {kind} component named '{name}'")]
    UnknownComponent { kind: &'static str, name: String },

    #[error("a client is already registered under '{0}'")]
    DuplicateClient(String),

    #[error("no client registered under '{0}'")]
    UnknownClient(String),

    #[error("more than one primary client implements {type_name}")]
    AmbiguousClient { type_name: String },

    #[error(transparent)]
    Contract(#[from] ContractError),
}

/// Per-call failures.
#[derive(Debug, Error)]
pub enum InvocationFault {
    #[error("I/O error executing {method} {url}: {message}")]
    Io {
        method: String,
        url: String,
        message: String,
    },

    #[error("{url} timed out after {elapsed_ms} ms")]
    Timeout { url: String, elapsed_ms: u64 },

    /// Non-2xx response, as produced by an error decoder.
    #[error("[{status}] during [{method_key}]: {body}")]
    Status {
        status: u16,
        method_key: String,
        body: String,
    },

    #[error("could not expand parameter {index}: {reason}")]
    Expansion { index: usize, reason: String },

    #[error("failed to encode request body: {0}")]
    Encode(String),

    #[error("failed to decode response: {0}")]
    Decode(String),

    /// A fault the retryer may act on.
    #[error("retryable: {source}")]
    Retryable {
        #[source]
        source: Box<InvocationFault>,
        retry_after: Option<Duration>,
    },

    #[error("load balancer does not contain an instance for the service {service_id}")]
    NoInstance { service_id: String },

    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl InvocationFault {
    /// Wrap a fault so the retryer is consulted.
    pub fn retryable(source: InvocationFault, retry_after: Option<Duration>) -> Self {
        Self::Retryable {
            source: Box::new(source),
            retry_after,
        }
    }

    /// I/O failures and explicit retryable faults go through the retryer.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Timeout { .. } | Self::Retryable { .. }
        )
    }

    /// Server-provided delay before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Retryable { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Short label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io { .. } => "io",
            Self::Timeout { .. } => "timeout",
            Self::Status { .. } => "status",
            Self::Expansion { .. } => "expansion",
            Self::Encode(_) => "encode",
            Self::Decode(_) => "decode",
            Self::Retryable { .. } => "retryable",
            Self::NoInstance { .. } => "no_instance",
            Self::Contract(_) => "contract",
        }
    }
}

/// Failures loading a properties file or manifest.
#[derive(Debug, Error)]
pub enum PropertiesError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<crate::config::validation::ValidationError>),
}

fn join_errors(errors: &[crate::config::validation::ValidationError]) -> String {
    errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ContractError::MultiplePathValues {
            method: "get".into(),
            found: 2,
        };
        assert_eq!(
            err.to_string(),
            "method get must declare exactly one path value, found 2"
        );

        let err = ConfigError::NoLoadBalancerTransport { name: "users".into() };
        assert!(err.to_string().contains("users"));
    }

    #[test]
    fn test_retryable_classification() {
        let io = InvocationFault::Io {
            method: "GET".into(),
            url: "http://a".into(),
            message: "refused".into(),
        };
        assert!(io.is_retryable());

        let status = InvocationFault::Status {
            status: 400,
            method_key: "A#b()".into(),
            body: String::new(),
        };
        assert!(!status.is_retryable());

        let wrapped = InvocationFault::retryable(status, Some(Duration::from_secs(2)));
        assert!(wrapped.is_retryable());
        assert_eq!(wrapped.retry_after(), Some(Duration::from_secs(2)));
        assert_eq!(wrapped.kind(), "retryable");
    }
}
