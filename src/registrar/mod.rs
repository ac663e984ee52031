//! Client registration.
//!
//! # Data Flow
//! ```text
//! ClientAttributes + InterfaceMeta
//!     → descriptor.rs (name rules, normalize.rs, fallback checks)
//!     → declarative module into the scoped context under the client name
//!     → refresh cell seeded from properties (refresh mode only)
//!     → registry.rs (aliases; clients built lazily by the factory)
//! ```

pub mod descriptor;
pub mod normalize;
pub mod registry;

use std::sync::Arc;
use crate::client::catalog::ComponentCatalog;
use crate::client::factory::ClientFactory;
use crate::config::refresh::{options_name, RefreshScope};
use crate::config::resolver::options_from_properties;
use crate::config::schema::{ClientProperties, Manifest};
use crate::context::{ConfigurationModule, NamedContext, DEFAULT_PREFIX};
use crate::contract::environment::Environment;
use crate::contract::{ContractCompiler, ContractRegistry, InterfaceMeta, MapEnvironment};
use crate::error::ConfigError;
use crate::load_balancer::StaticInstanceRegistry;
use crate::transport::{HyperTransport, LoadBalancedTransport, Transport};

pub use descriptor::{ClientAttributes, ClientDescriptor, FallbackStrategy};
pub use normalize::{normalize_path, normalize_service_name, normalize_url};
pub use registry::ClientRegistry;

/// Registers client declarations into a context and a registry.
pub struct Registrar {
    context: Arc<NamedContext>,
    refresh: Arc<RefreshScope>,
    properties: ClientProperties,
    environment: Arc<dyn Environment>,
}

impl Registrar {
    pub fn new(
        context: Arc<NamedContext>,
        refresh: Arc<RefreshScope>,
        properties: ClientProperties,
        environment: Arc<dyn Environment>,
    ) -> Self {
        Self {
            context,
            refresh,
            properties,
            environment,
        }
    }

    /// Module applied to every client scope.
    pub fn register_default_configuration(&self, name: &str, module: ConfigurationModule) {
        self.context
            .register_configuration(&format!("{}{}", DEFAULT_PREFIX, name), module);
    }

    pub fn register(
        &self,
        registry: &ClientRegistry,
        attributes: &ClientAttributes,
        interface: &InterfaceMeta,
    ) -> Result<Arc<ClientDescriptor>, ConfigError> {
        let descriptor = ClientDescriptor::resolve(attributes, interface, self.environment.as_ref())?;
        let descriptor = registry.register(descriptor)?;

        if let Some(module) = &attributes.configuration {
            self.context.register_configuration(&descriptor.client_name, module.clone());
        }
        if self.properties.refresh_enabled {
            let options = options_from_properties(&self.properties, &descriptor.context_id);
            self.refresh.register(&options_name(&descriptor.context_id), options);
        }
        Ok(descriptor)
    }
}

/// Everything built from a manifest.
pub struct Bootstrap {
    pub context: Arc<NamedContext>,
    pub refresh: Arc<RefreshScope>,
    pub contracts: Arc<ContractRegistry>,
    pub registry: ClientRegistry,
    pub registrar: Registrar,
}

/// Register every client in `manifest`. Instances, when present, back a
/// load-balancing transport shared by all clients.
pub fn bootstrap(manifest: &Manifest) -> Result<Bootstrap, ConfigError> {
    let mut environment = MapEnvironment::new();
    for (key, value) in &manifest.environment {
        environment.insert(key.clone(), value.clone());
    }
    let environment: Arc<dyn Environment> = Arc::new(environment);

    let context = Arc::new(NamedContext::new());
    if !manifest.instances.is_empty() {
        let chooser = Arc::new(StaticInstanceRegistry::new(&manifest.instances));
        let transport: Arc<dyn Transport> =
            Arc::new(LoadBalancedTransport::new(Arc::new(HyperTransport::new()), chooser));
        context.register_parent(transport);
    }

    let mut catalog = ComponentCatalog::new();
    catalog.register_contract(
        "default",
        Arc::new(
            ContractCompiler::new()
                .with_environment(environment.clone())
                .with_decode_slash(manifest.client.decode_slash),
        ),
    );

    let refresh = Arc::new(RefreshScope::new());
    let contracts = Arc::new(ContractRegistry::new());
    let factory = ClientFactory::new(
        context.clone(),
        manifest.client.clone(),
        Arc::new(catalog),
        refresh.clone(),
        contracts.clone(),
        Arc::new(HyperTransport::new()),
    );
    let registry = ClientRegistry::new(Arc::new(factory));
    let registrar = Registrar::new(context.clone(), refresh.clone(), manifest.client.clone(), environment);

    for declaration in &manifest.clients {
        registrar.register(&registry, &declaration.attributes, &declaration.interface)?;
    }
    tracing::info!(
        clients = manifest.clients.len(),
        instances = manifest.instances.len(),
        refresh_enabled = manifest.client.refresh_enabled,
        "Bootstrapped clients"
    );

    Ok(Bootstrap {
        context,
        refresh,
        contracts,
        registry,
        registrar,
    })
}
