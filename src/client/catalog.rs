//! Named component catalog.
//!
//! Property buckets refer to components by name. A name is looked up in the
//! client's scoped context first, then in this catalog.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use crate::client::capability::Capability;
use crate::client::codec::{
    Decoder, DefaultErrorDecoder, Encoder, ErrorDecoder, FieldQueryMapEncoder, JsonDecoder, JsonEncoder,
    QueryMapEncoder,
};
use crate::client::interceptor::RequestInterceptor;
use crate::context::{ScopedContext, ScopedContextExt};
use crate::contract::{ContractCompiler, ContractStrategy};
use crate::error::ConfigError;
use crate::resilience::{DefaultRetryer, NeverRetry, Retryer};

pub struct ComponentCatalog {
    retryers: HashMap<String, Arc<dyn Retryer>>,
    error_decoders: HashMap<String, Arc<dyn ErrorDecoder>>,
    encoders: HashMap<String, Arc<dyn Encoder>>,
    decoders: HashMap<String, Arc<dyn Decoder>>,
    contracts: HashMap<String, Arc<dyn ContractStrategy>>,
    query_map_encoders: HashMap<String, Arc<dyn QueryMapEncoder>>,
    interceptors: HashMap<String, Arc<dyn RequestInterceptor>>,
    capabilities: HashMap<String, Arc<dyn Capability>>,
}

impl Default for ComponentCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ComponentCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentCatalog")
            .field("retryers", &sorted_keys(&self.retryers))
            .field("error_decoders", &sorted_keys(&self.error_decoders))
            .field("encoders", &sorted_keys(&self.encoders))
            .field("decoders", &sorted_keys(&self.decoders))
            .field("contracts", &sorted_keys(&self.contracts))
            .field("query_map_encoders", &sorted_keys(&self.query_map_encoders))
            .field("interceptors", &sorted_keys(&self.interceptors))
            .field("capabilities", &sorted_keys(&self.capabilities))
            .finish()
    }
}

fn sorted_keys<V: ?Sized>(table: &HashMap<String, Arc<V>>) -> Vec<&str> {
    let mut keys: Vec<&str> = table.keys().map(String::as_str).collect();
    keys.sort_unstable();
    keys
}

/// Context first, then the catalog table.
fn lookup<T: ?Sized + Send + Sync + 'static>(
    context: &dyn ScopedContext,
    identity: &str,
    kind: &'static str,
    name: &str,
    table: &HashMap<String, Arc<T>>,
) -> Result<Arc<T>, ConfigError> {
    context
        .named::<Arc<T>>(identity, name)
        .or_else(|| table.get(name).cloned())
        .ok_or_else(|| ConfigError::UnknownComponent {
            kind,
            name: name.to_string(),
        })
}

impl ComponentCatalog {
    /// Catalog with the built-in components.
    pub fn new() -> Self {
        let mut catalog = Self {
            retryers: HashMap::new(),
            error_decoders: HashMap::new(),
            encoders: HashMap::new(),
            decoders: HashMap::new(),
            contracts: HashMap::new(),
            query_map_encoders: HashMap::new(),
            interceptors: HashMap::new(),
            capabilities: HashMap::new(),
        };
        catalog
            .register_retryer("default", Arc::new(DefaultRetryer::default()))
            .register_retryer("never", Arc::new(NeverRetry))
            .register_error_decoder("default", Arc::new(DefaultErrorDecoder))
            .register_encoder("default", Arc::new(JsonEncoder))
            .register_encoder("json", Arc::new(JsonEncoder))
            .register_decoder("default", Arc::new(JsonDecoder))
            .register_decoder("json", Arc::new(JsonDecoder))
            .register_contract("default", Arc::new(ContractCompiler::new()))
            .register_query_map_encoder("default", Arc::new(FieldQueryMapEncoder))
            .register_query_map_encoder("field", Arc::new(FieldQueryMapEncoder));
        catalog
    }

    pub fn register_retryer(&mut self, name: &str, retryer: Arc<dyn Retryer>) -> &mut Self {
        self.retryers.insert(name.to_string(), retryer);
        self
    }

    pub fn register_error_decoder(&mut self, name: &str, decoder: Arc<dyn ErrorDecoder>) -> &mut Self {
        self.error_decoders.insert(name.to_string(), decoder);
        self
    }

    pub fn register_encoder(&mut self, name: &str, encoder: Arc<dyn Encoder>) -> &mut Self {
        self.encoders.insert(name.to_string(), encoder);
        self
    }

    pub fn register_decoder(&mut self, name: &str, decoder: Arc<dyn Decoder>) -> &mut Self {
        self.decoders.insert(name.to_string(), decoder);
        self
    }

    pub fn register_contract(&mut self, name: &str, contract: Arc<dyn ContractStrategy>) -> &mut Self {
        self.contracts.insert(name.to_string(), contract);
        self
    }

    pub fn register_query_map_encoder(&mut self, name: &str, encoder: Arc<dyn QueryMapEncoder>) -> &mut Self {
        self.query_map_encoders.insert(name.to_string(), encoder);
        self
    }

    pub fn register_interceptor(&mut self, name: &str, interceptor: Arc<dyn RequestInterceptor>) -> &mut Self {
        self.interceptors.insert(name.to_string(), interceptor);
        self
    }

    pub fn register_capability(&mut self, name: &str, capability: Arc<dyn Capability>) -> &mut Self {
        self.capabilities.insert(name.to_string(), capability);
        self
    }

    pub fn retryer(&self, ctx: &dyn ScopedContext, identity: &str, name: &str) -> Result<Arc<dyn Retryer>, ConfigError> {
        lookup(ctx, identity, "retryer", name, &self.retryers)
    }

    pub fn error_decoder(
        &self,
        ctx: &dyn ScopedContext,
        identity: &str,
        name: &str,
    ) -> Result<Arc<dyn ErrorDecoder>, ConfigError> {
        lookup(ctx, identity, "error_decoder", name, &self.error_decoders)
    }

    pub fn encoder(&self, ctx: &dyn ScopedContext, identity: &str, name: &str) -> Result<Arc<dyn Encoder>, ConfigError> {
        lookup(ctx, identity, "encoder", name, &self.encoders)
    }

    pub fn decoder(&self, ctx: &dyn ScopedContext, identity: &str, name: &str) -> Result<Arc<dyn Decoder>, ConfigError> {
        lookup(ctx, identity, "decoder", name, &self.decoders)
    }

    pub fn contract(
        &self,
        ctx: &dyn ScopedContext,
        identity: &str,
        name: &str,
    ) -> Result<Arc<dyn ContractStrategy>, ConfigError> {
        lookup(ctx, identity, "contract", name, &self.contracts)
    }

    pub fn query_map_encoder(
        &self,
        ctx: &dyn ScopedContext,
        identity: &str,
        name: &str,
    ) -> Result<Arc<dyn QueryMapEncoder>, ConfigError> {
        lookup(ctx, identity, "query_map_encoder", name, &self.query_map_encoders)
    }

    pub fn interceptor(
        &self,
        ctx: &dyn ScopedContext,
        identity: &str,
        name: &str,
    ) -> Result<Arc<dyn RequestInterceptor>, ConfigError> {
        lookup(ctx, identity, "request_interceptor", name, &self.interceptors)
    }

    pub fn capability(
        &self,
        ctx: &dyn ScopedContext,
        identity: &str,
        name: &str,
    ) -> Result<Arc<dyn Capability>, ConfigError> {
        lookup(ctx, identity, "capability", name, &self.capabilities)
    }
}
