//! Client builder and the effective per-client configuration.
//!
//! # Responsibilities
//! - Carry the configuration resolved for one client
//! - Apply capabilities and compile the contract when the client is built
//!
//! # Design Decisions
//! - Options are either a fixed triple or a handle on a refreshable cell;
//!   the proxy reads them on every call
//! - Capabilities are applied in ascending `order()`

use std::fmt;
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use crate::client::capability::Capability;
use crate::client::codec::{
    Decoder, DefaultErrorDecoder, Encoder, ErrorDecoder, FieldQueryMapEncoder, JsonDecoder, JsonEncoder,
    QueryMapEncoder,
};
use crate::client::interceptor::RequestInterceptor;
use crate::client::proxy::ContractClient;
use crate::client::target::Target;
use crate::config::refresh::OptionsHandle;
use crate::contract::{ContractCompiler, ContractRegistry, ContractStrategy, InterfaceMeta};
use crate::error::ConfigError;
use crate::observability::LogLevel;
use crate::resilience::{NeverRetry, Options, Retryer};
use crate::transport::Transport;

/// What a caller sees when retries are exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExceptionPropagation {
    /// The last fault as raised.
    #[default]
    None,
    /// The cause of a retryable fault instead of the wrapper.
    Unwrap,
}

/// Where a client reads its request options from.
#[derive(Debug, Clone)]
pub enum OptionsSource {
    Static(Options),
    Refreshable(OptionsHandle),
}

impl OptionsSource {
    pub fn current(&self) -> Options {
        match self {
            Self::Static(options) => *options,
            Self::Refreshable(handle) => handle.current(),
        }
    }
}

/// Configuration of one client after all layers are merged.
#[derive(Debug, Clone)]
pub struct EffectiveClientConfig {
    pub log_level: LogLevel,
    pub retryer: Arc<dyn Retryer>,
    pub error_decoder: Arc<dyn ErrorDecoder>,
    pub options: OptionsSource,
    pub interceptors: Vec<Arc<dyn RequestInterceptor>>,
    pub encoder: Arc<dyn Encoder>,
    pub decoder: Arc<dyn Decoder>,
    pub contract: Arc<dyn ContractStrategy>,
    pub query_map_encoder: Arc<dyn QueryMapEncoder>,
    pub decode_404: bool,
    pub exception_propagation: ExceptionPropagation,
    pub capabilities: Vec<Arc<dyn Capability>>,
}

impl Default for EffectiveClientConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::None,
            retryer: Arc::new(NeverRetry),
            error_decoder: Arc::new(DefaultErrorDecoder),
            options: OptionsSource::Static(Options::default()),
            interceptors: Vec::new(),
            encoder: Arc::new(JsonEncoder),
            decoder: Arc::new(JsonDecoder),
            contract: Arc::new(ContractCompiler::new()),
            query_map_encoder: Arc::new(FieldQueryMapEncoder),
            decode_404: false,
            exception_propagation: ExceptionPropagation::None,
            capabilities: Vec::new(),
        }
    }
}

impl EffectiveClientConfig {
    /// JSON view used by the inspector CLI.
    pub fn summary(&self) -> serde_json::Value {
        let options = self.options.current();
        json!({
            "log_level": self.log_level,
            "retryer": format!("{:?}", self.retryer),
            "error_decoder": format!("{:?}", self.error_decoder),
            "options": options,
            "refreshable_options": match &self.options {
                OptionsSource::Static(_) => None,
                OptionsSource::Refreshable(handle) => Some(handle.name().to_string()),
            },
            "interceptors": self.interceptors.iter().map(|i| format!("{:?}", i)).collect::<Vec<_>>(),
            "encoder": format!("{:?}", self.encoder),
            "decoder": format!("{:?}", self.decoder),
            "contract": format!("{:?}", self.contract),
            "query_map_encoder": format!("{:?}", self.query_map_encoder),
            "decode_404": self.decode_404,
            "exception_propagation": self.exception_propagation,
            "capabilities": self.capabilities.iter().map(|c| format!("{:?}", c)).collect::<Vec<_>>(),
        })
    }
}

/// Mutable builder handed to customizers and the targeter.
pub struct ClientBuilder {
    pub config: EffectiveClientConfig,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("config", &self.config)
            .field("transport", &self.transport)
            .finish()
    }
}

impl ClientBuilder {
    pub fn new(config: EffectiveClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn set_transport(&mut self, transport: Arc<dyn Transport>) -> &mut Self {
        self.transport = transport;
        self
    }

    pub fn retryer(&mut self, retryer: Arc<dyn Retryer>) -> &mut Self {
        self.config.retryer = retryer;
        self
    }

    pub fn error_decoder(&mut self, decoder: Arc<dyn ErrorDecoder>) -> &mut Self {
        self.config.error_decoder = decoder;
        self
    }

    pub fn options(&mut self, options: Options) -> &mut Self {
        self.config.options = OptionsSource::Static(options);
        self
    }

    pub fn log_level(&mut self, level: LogLevel) -> &mut Self {
        self.config.log_level = level;
        self
    }

    pub fn request_interceptor(&mut self, interceptor: Arc<dyn RequestInterceptor>) -> &mut Self {
        self.config.interceptors.push(interceptor);
        self
    }

    pub fn encoder(&mut self, encoder: Arc<dyn Encoder>) -> &mut Self {
        self.config.encoder = encoder;
        self
    }

    pub fn decoder(&mut self, decoder: Arc<dyn Decoder>) -> &mut Self {
        self.config.decoder = decoder;
        self
    }

    pub fn decode_404(&mut self, decode_404: bool) -> &mut Self {
        self.config.decode_404 = decode_404;
        self
    }

    /// Apply capabilities, compile the contract and produce the live client.
    pub fn build(
        self,
        contracts: &ContractRegistry,
        interface: &InterfaceMeta,
        target: Target,
        client_name: &str,
    ) -> Result<ContractClient, ConfigError> {
        let Self { mut config, transport } = self;

        config.capabilities.sort_by_key(|c| c.order());
        let mut transport = transport;
        for capability in &config.capabilities {
            transport = capability.enrich_transport(transport);
            config.retryer = capability.enrich_retryer(config.retryer.clone());
            config.error_decoder = capability.enrich_error_decoder(config.error_decoder.clone());
        }

        let contract = contracts.get_or_compile(interface, config.contract.as_ref())?;
        tracing::debug!(
            client = %client_name,
            type_name = %interface.type_name,
            url = %target.url,
            load_balanced = transport.is_load_balanced(),
            "Built client"
        );
        Ok(ContractClient::new(client_name, target, contract, config, transport))
    }
}
