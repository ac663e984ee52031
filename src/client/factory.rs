//! Client factory.
//!
//! # Data Flow
//! ```text
//! ClientDescriptor
//!     → base config (encoder, decoder, contract from the context or defaults)
//!     → ConfigurationResolver
//!     → BuilderCustomizers (context and factory, by order; ties keep context first)
//!     → target URL and transport
//!         no URL:  http://{name}{path}, load-balancing transport required
//!         URL:     {url}{path}, load-balancing transport unwrapped
//!     → Targeter → CompiledClient (cached per context id)
//! ```
//!
//! # Design Decisions
//! - One build per context id; concurrent callers for the same id wait on a
//!   per-id slot and receive the same instance
//! - A failed build caches nothing

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use dashmap::DashMap;
use crate::client::builder::{ClientBuilder, EffectiveClientConfig};
use crate::client::catalog::ComponentCatalog;
use crate::client::codec::{Decoder, Encoder};
use crate::client::customizer::BuilderCustomizer;
use crate::client::proxy::ContractClient;
use crate::client::target::{DefaultTargeter, Target, Targeter};
use crate::config::refresh::RefreshScope;
use crate::config::resolver::ConfigurationResolver;
use crate::config::schema::ClientProperties;
use crate::context::{ScopedContext, ScopedContextExt};
use crate::contract::{ContractRegistry, ContractStrategy};
use crate::error::ConfigError;
use crate::registrar::descriptor::ClientDescriptor;
use crate::transport::Transport;

/// A built client and what it was built from.
#[derive(Debug)]
pub struct CompiledClient {
    pub descriptor: Arc<ClientDescriptor>,
    pub target: Target,
    pub client: Arc<ContractClient>,
}

type Slot = Arc<Mutex<Option<Arc<CompiledClient>>>>;

pub struct ClientFactory {
    context: Arc<dyn ScopedContext>,
    properties: ClientProperties,
    catalog: Arc<ComponentCatalog>,
    refresh: Arc<RefreshScope>,
    contracts: Arc<ContractRegistry>,
    default_transport: Arc<dyn Transport>,
    default_targeter: Arc<dyn Targeter>,
    customizers: Vec<Arc<dyn BuilderCustomizer>>,
    cache: DashMap<String, Slot>,
}

impl fmt::Debug for ClientFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientFactory")
            .field("catalog", &self.catalog)
            .field("default_transport", &self.default_transport)
            .field("customizers", &self.customizers.len())
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl ClientFactory {
    pub fn new(
        context: Arc<dyn ScopedContext>,
        properties: ClientProperties,
        catalog: Arc<ComponentCatalog>,
        refresh: Arc<RefreshScope>,
        contracts: Arc<ContractRegistry>,
        default_transport: Arc<dyn Transport>,
    ) -> Self {
        let default_targeter = Arc::new(DefaultTargeter::new(contracts.clone()));
        Self {
            context,
            properties,
            catalog,
            refresh,
            contracts,
            default_transport,
            default_targeter,
            customizers: Vec::new(),
            cache: DashMap::new(),
        }
    }

    /// Customizer applied to every client, sorted by order with the context's own.
    pub fn with_customizer(mut self, customizer: Arc<dyn BuilderCustomizer>) -> Self {
        self.customizers.push(customizer);
        self
    }

    pub fn context(&self) -> &Arc<dyn ScopedContext> {
        &self.context
    }

    pub fn properties(&self) -> &ClientProperties {
        &self.properties
    }

    pub fn contracts(&self) -> &Arc<ContractRegistry> {
        &self.contracts
    }

    /// The cached client for `descriptor`, built on first use.
    pub fn build(&self, descriptor: &Arc<ClientDescriptor>) -> Result<Arc<CompiledClient>, ConfigError> {
        let slot = self
            .cache
            .entry(descriptor.context_id.clone())
            .or_default()
            .value()
            .clone();
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = guard.as_ref() {
            return Ok(existing.clone());
        }
        let compiled = Arc::new(self.create(descriptor)?);
        *guard = Some(compiled.clone());
        Ok(compiled)
    }

    /// Cached client for a context id, if built.
    pub fn cached(&self, context_id: &str) -> Option<Arc<CompiledClient>> {
        let slot = self.cache.get(context_id)?.value().clone();
        let guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        guard.clone()
    }

    fn create(&self, descriptor: &Arc<ClientDescriptor>) -> Result<CompiledClient, ConfigError> {
        let ctx = self.context.as_ref();
        let identity = descriptor.context_id.as_str();

        let base = self.base_config(identity)?;
        let resolver = ConfigurationResolver::new(ctx, &self.properties, &self.catalog, &self.refresh);
        let config = resolver.resolve(descriptor, base)?;

        let mut builder = ClientBuilder::new(config, self.default_transport.clone());
        let mut customizers = ctx
            .instances::<Arc<dyn BuilderCustomizer>>(identity)
            .unwrap_or_default()
            .into_iter()
            .map(|(_, c)| c)
            .chain(self.customizers.iter().cloned())
            .collect::<Vec<_>>();
        customizers.sort_by_key(|c| c.order());
        for customizer in &customizers {
            customizer.customize(&mut builder);
        }

        let context_transport = ctx.instance::<Arc<dyn Transport>>(identity);
        let url = if descriptor.url.is_empty() {
            let transport = context_transport
                .filter(|t| t.is_load_balanced())
                .ok_or_else(|| ConfigError::NoLoadBalancerTransport {
                    name: descriptor.name.clone(),
                })?;
            builder.set_transport(transport);
            let base = if descriptor.name.starts_with("http") {
                descriptor.name.clone()
            } else {
                format!("http://{}", descriptor.name)
            };
            format!("{}{}", base, descriptor.path)
        } else {
            if let Some(transport) = context_transport {
                let direct = if transport.is_load_balanced() {
                    transport.delegate().unwrap_or(transport)
                } else {
                    transport
                };
                builder.set_transport(direct);
            }
            let base = if descriptor.url.starts_with("http") {
                descriptor.url.clone()
            } else {
                format!("http://{}", descriptor.url)
            };
            format!("{}{}", base, descriptor.path)
        };

        let target = Target {
            type_name: descriptor.type_name.clone(),
            name: descriptor.name.clone(),
            url,
        };
        let targeter = ctx
            .instance::<Arc<dyn Targeter>>(identity)
            .unwrap_or_else(|| self.default_targeter.clone());
        let client = targeter.target(descriptor, builder, ctx, target.clone())?;

        tracing::info!(
            client = %identity,
            type_name = %descriptor.type_name,
            url = %target.url,
            load_balanced = client.transport().is_load_balanced(),
            "Created client"
        );
        Ok(CompiledClient {
            descriptor: descriptor.clone(),
            target,
            client,
        })
    }

    fn base_config(&self, identity: &str) -> Result<EffectiveClientConfig, ConfigError> {
        let ctx = self.context.as_ref();
        let encoder = match ctx.instance::<Arc<dyn Encoder>>(identity) {
            Some(encoder) => encoder,
            None => self.catalog.encoder(ctx, identity, "default")?,
        };
        let decoder = match ctx.instance::<Arc<dyn Decoder>>(identity) {
            Some(decoder) => decoder,
            None => self.catalog.decoder(ctx, identity, "default")?,
        };
        let contract = match ctx.instance::<Arc<dyn ContractStrategy>>(identity) {
            Some(contract) => contract,
            None => self.catalog.contract(ctx, identity, "default")?,
        };
        Ok(EffectiveClientConfig {
            encoder,
            decoder,
            contract,
            ..EffectiveClientConfig::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::InstanceConfig;
    use crate::context::{ConfigurationModule, NamedContext};
    use crate::contract::{InterfaceMeta, MethodMeta, RequestMapping};
    use crate::load_balancer::StaticInstanceRegistry;
    use crate::registrar::descriptor::FallbackStrategy;
    use crate::transport::{HyperTransport, LoadBalancedTransport};

    fn descriptor(context_id: &str, url: &str, path: &str) -> Arc<ClientDescriptor> {
        Arc::new(ClientDescriptor {
            type_name: "app::UsersClient".into(),
            client_name: context_id.into(),
            name: "users".into(),
            context_id: context_id.into(),
            url: url.into(),
            path: path.into(),
            qualifiers: vec![],
            primary: true,
            fallback: FallbackStrategy::None,
            decode_404: false,
            interface: InterfaceMeta::new("app::UsersClient")
                .method(MethodMeta::new("list").mapping(RequestMapping::get("/users"))),
        })
    }

    fn load_balanced() -> Arc<dyn Transport> {
        let registry = StaticInstanceRegistry::new(&[InstanceConfig {
            service_id: "users".into(),
            host: "127.0.0.1".into(),
            port: 8081,
            secure: false,
        }]);
        Arc::new(LoadBalancedTransport::new(Arc::new(HyperTransport::new()), Arc::new(registry)))
    }

    fn factory(context: Arc<NamedContext>) -> ClientFactory {
        ClientFactory::new(
            context,
            ClientProperties::default(),
            Arc::new(ComponentCatalog::new()),
            Arc::new(RefreshScope::new()),
            Arc::new(ContractRegistry::new()),
            Arc::new(HyperTransport::new()),
        )
    }

    #[test]
    fn test_no_url_requires_load_balancer() {
        let factory = factory(Arc::new(NamedContext::new()));
        let err = factory.build(&descriptor("users", "", "")).unwrap_err();
        assert_eq!(err, ConfigError::NoLoadBalancerTransport { name: "users".into() });
        assert!(factory.cached("users").is_none());
    }

    #[test]
    fn test_no_url_targets_service_name() {
        let context = Arc::new(NamedContext::new());
        context.register_parent(load_balanced());
        let factory = factory(context);

        let compiled = factory.build(&descriptor("users", "", "/api")).unwrap();
        assert_eq!(compiled.target.url, "http://users/api");
        assert!(compiled.client.transport().is_load_balanced());
    }

    #[test]
    fn test_url_unwraps_load_balancer() {
        let context = Arc::new(NamedContext::new());
        context.register_parent(load_balanced());
        let factory = factory(context);

        let compiled = factory.build(&descriptor("users", "localhost:9000", "/v1")).unwrap();
        assert_eq!(compiled.target.url, "http://localhost:9000/v1");
        assert!(!compiled.client.transport().is_load_balanced());
    }

    #[test]
    fn test_build_is_cached_per_context_id() {
        let context = Arc::new(NamedContext::new());
        context.register_parent(load_balanced());
        let factory = Arc::new(factory(context));
        let desc = descriptor("users", "", "");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let factory = factory.clone();
                let desc = desc.clone();
                std::thread::spawn(move || factory.build(&desc).unwrap())
            })
            .collect();
        let built: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(built.iter().all(|c| Arc::ptr_eq(c, &built[0])));
        assert_eq!(factory.contracts().len(), 1);
    }

    #[derive(Debug)]
    struct Counting {
        inner: DefaultTargeter,
        builds: std::sync::atomic::AtomicUsize,
    }

    impl Targeter for Counting {
        fn target(
            &self,
            descriptor: &ClientDescriptor,
            builder: ClientBuilder,
            context: &dyn ScopedContext,
            target: Target,
        ) -> Result<Arc<ContractClient>, ConfigError> {
            self.builds.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(20));
            self.inner.target(descriptor, builder, context, target)
        }
    }

    #[test]
    fn test_concurrent_builds_construct_once() {
        let counting = Arc::new(Counting {
            inner: DefaultTargeter::new(Arc::new(ContractRegistry::new())),
            builds: Default::default(),
        });
        let context = Arc::new(NamedContext::new());
        context.register_parent(counting.clone() as Arc<dyn Targeter>);
        let factory = Arc::new(factory(context));
        let desc = descriptor("users", "http://localhost:1", "");

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let factory = factory.clone();
                let desc = desc.clone();
                std::thread::spawn(move || factory.build(&desc).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counting.builds.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[derive(Debug)]
    struct Ordered(i32, bool);

    impl BuilderCustomizer for Ordered {
        fn customize(&self, builder: &mut ClientBuilder) {
            builder.decode_404(self.1);
        }

        fn order(&self) -> i32 {
            self.0
        }
    }

    #[test]
    fn test_customizers_sorted_across_sources() {
        let context = Arc::new(NamedContext::new());
        context.register_configuration(
            "users",
            ConfigurationModule::new(|scope| {
                scope.register(Arc::new(Ordered(10, true)) as Arc<dyn BuilderCustomizer>);
            }),
        );
        let factory = factory(context).with_customizer(Arc::new(Ordered(-10, false)));

        let compiled = factory.build(&descriptor("users", "http://localhost:1", "")).unwrap();
        assert!(compiled.client.config().decode_404);
    }

    #[test]
    fn test_customizers_run_context_first_then_factory() {
        let context = Arc::new(NamedContext::new());
        context.register_configuration(
            "users",
            ConfigurationModule::new(|scope| {
                let late: Arc<dyn BuilderCustomizer> = Arc::new(|b: &mut ClientBuilder| {
                    b.decode_404(true);
                });
                scope.register(late);
            }),
        );
        let factory = factory(context).with_customizer(Arc::new(|b: &mut ClientBuilder| {
            b.decode_404(false);
        }));

        let compiled = factory.build(&descriptor("users", "http://localhost:1", "")).unwrap();
        assert!(!compiled.client.config().decode_404);
    }
}
