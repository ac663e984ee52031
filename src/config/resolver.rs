//! Configuration resolution.
//!
//! # Responsibilities
//! - Merge the declarative layer (scoped context) with the property layers
//!   (default bucket, then the client's bucket)
//! - Resolve property-named components through the context and the catalog
//!
//! # Data Flow
//! ```text
//! base config (factory defaults)
//!     → layers in MergeOrder
//!         AnnotationsFirst:  declarative → default bucket → client bucket
//!         PropertiesFirst:   default bucket → client bucket → declarative
//!     → interceptors and capabilities sorted by order
//!     → EffectiveClientConfig
//! ```
//!
//! # Design Decisions
//! - Each layer is an overlay of optional values; one routine applies any
//!   ordered list of overlays
//! - Property timeouts fall back to the values accumulated so far and the
//!   options triple is replaced as a whole
//! - In refresh mode options come from the named cell, never from properties

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use crate::client::builder::{EffectiveClientConfig, ExceptionPropagation, OptionsSource};
use crate::client::capability::Capability;
use crate::client::catalog::ComponentCatalog;
use crate::client::codec::{Decoder, Encoder, ErrorDecoder, ErrorDecoderFactory, QueryMapEncoder};
use crate::client::interceptor::{
    DefaultHeadersInterceptor, DefaultQueryParametersInterceptor, RequestInterceptor,
};
use crate::config::refresh::{options_name, RefreshScope};
use crate::config::schema::{ClientConfigProperties, ClientProperties};
use crate::context::{ScopedContext, ScopedContextExt};
use crate::contract::ContractStrategy;
use crate::error::ConfigError;
use crate::observability::LogLevel;
use crate::registrar::descriptor::ClientDescriptor;
use crate::resilience::{Options, Retryer};

/// Per-client switch registered in the scoped context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfigurer {
    /// When false only the client's own declarative layer applies.
    pub inherit_parent_configuration: bool,
}

impl Default for ClientConfigurer {
    fn default() -> Self {
        Self {
            inherit_parent_configuration: true,
        }
    }
}

/// Order of the declarative and property layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOrder {
    /// Declarative first, properties win.
    AnnotationsFirst,
    /// Properties first, declarative wins.
    PropertiesFirst,
}

impl MergeOrder {
    pub fn from_default_to_properties(default_to_properties: bool) -> Self {
        if default_to_properties {
            Self::AnnotationsFirst
        } else {
            Self::PropertiesFirst
        }
    }
}

#[derive(Debug, Clone)]
enum OptionsPatch {
    Replace(OptionsSource),
    Partial {
        connect_timeout: Option<Duration>,
        read_timeout: Option<Duration>,
        follow_redirects: Option<bool>,
    },
}

/// Values contributed by one layer. `None` leaves earlier layers untouched.
#[derive(Debug, Default)]
struct ConfigOverlay {
    log_level: Option<LogLevel>,
    retryer: Option<Arc<dyn Retryer>>,
    error_decoder: Option<Arc<dyn ErrorDecoder>>,
    options: Option<OptionsPatch>,
    interceptors: Vec<Arc<dyn RequestInterceptor>>,
    encoder: Option<Arc<dyn Encoder>>,
    decoder: Option<Arc<dyn Decoder>>,
    contract: Option<Arc<dyn ContractStrategy>>,
    query_map_encoder: Option<Arc<dyn QueryMapEncoder>>,
    capabilities: Vec<Arc<dyn Capability>>,
    decode_404: Option<bool>,
    exception_propagation: Option<ExceptionPropagation>,
}

impl ConfigOverlay {
    fn apply(self, config: &mut EffectiveClientConfig) {
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if let Some(retryer) = self.retryer {
            config.retryer = retryer;
        }
        if let Some(decoder) = self.error_decoder {
            config.error_decoder = decoder;
        }
        match self.options {
            Some(OptionsPatch::Replace(source)) => config.options = source,
            Some(OptionsPatch::Partial {
                connect_timeout,
                read_timeout,
                follow_redirects,
            }) => {
                let current = config.options.current();
                config.options = OptionsSource::Static(Options::new(
                    connect_timeout.unwrap_or(current.connect_timeout),
                    read_timeout.unwrap_or(current.read_timeout),
                    follow_redirects.unwrap_or(current.follow_redirects),
                ));
            }
            None => {}
        }
        config.interceptors.extend(self.interceptors);
        if let Some(encoder) = self.encoder {
            config.encoder = encoder;
        }
        if let Some(decoder) = self.decoder {
            config.decoder = decoder;
        }
        if let Some(contract) = self.contract {
            config.contract = contract;
        }
        if let Some(encoder) = self.query_map_encoder {
            config.query_map_encoder = encoder;
        }
        config.capabilities.extend(self.capabilities);
        if let Some(decode_404) = self.decode_404 {
            config.decode_404 = decode_404;
        }
        if let Some(policy) = self.exception_propagation {
            config.exception_propagation = policy;
        }
    }
}

/// Options a client gets from its property buckets alone.
pub fn options_from_properties(properties: &ClientProperties, context_id: &str) -> Options {
    let mut options = Options::default();
    for bucket in [properties.default_bucket(), properties.bucket(context_id)].into_iter().flatten() {
        options = Options::new(
            bucket.connect_timeout.map(Duration::from_millis).unwrap_or(options.connect_timeout),
            bucket.read_timeout.map(Duration::from_millis).unwrap_or(options.read_timeout),
            bucket.follow_redirects.unwrap_or(options.follow_redirects),
        );
    }
    options
}

/// One fill-absent interceptor per default map, merged across buckets in
/// layer order. A later bucket replaces an earlier one key by key; header
/// keys match case-insensitively.
fn default_interceptors(buckets: &[&ClientConfigProperties]) -> Option<Vec<Arc<dyn RequestInterceptor>>> {
    let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut parameters: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut declared = (false, false);
    for bucket in buckets {
        if let Some(bucket_headers) = &bucket.default_request_headers {
            declared.0 = true;
            for (name, values) in bucket_headers {
                headers.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
                headers.insert(name.clone(), values.clone());
            }
        }
        if let Some(bucket_parameters) = &bucket.default_query_parameters {
            declared.1 = true;
            for (name, values) in bucket_parameters {
                parameters.insert(name.clone(), values.clone());
            }
        }
    }

    let mut interceptors: Vec<Arc<dyn RequestInterceptor>> = Vec::new();
    if declared.0 {
        interceptors.push(Arc::new(DefaultHeadersInterceptor::new(headers)));
    }
    if declared.1 {
        interceptors.push(Arc::new(DefaultQueryParametersInterceptor::new(parameters)));
    }
    (!interceptors.is_empty()).then_some(interceptors)
}

pub struct ConfigurationResolver<'a> {
    context: &'a dyn ScopedContext,
    properties: &'a ClientProperties,
    catalog: &'a ComponentCatalog,
    refresh: &'a Arc<RefreshScope>,
}

impl<'a> ConfigurationResolver<'a> {
    pub fn new(
        context: &'a dyn ScopedContext,
        properties: &'a ClientProperties,
        catalog: &'a ComponentCatalog,
        refresh: &'a Arc<RefreshScope>,
    ) -> Self {
        Self {
            context,
            properties,
            catalog,
            refresh,
        }
    }

    pub fn resolve(
        &self,
        descriptor: &ClientDescriptor,
        base: EffectiveClientConfig,
    ) -> Result<EffectiveClientConfig, ConfigError> {
        let identity = descriptor.context_id.as_str();
        let configurer = self
            .context
            .instance::<ClientConfigurer>(identity)
            .unwrap_or_default();

        let layers = if configurer.inherit_parent_configuration {
            let declarative = self.declarative_layer(descriptor, true);
            let buckets: Vec<_> = [self.properties.default_bucket(), self.properties.bucket(identity)]
                .into_iter()
                .flatten()
                .collect();
            let mut properties = Vec::new();
            for bucket in &buckets {
                properties.push(self.property_layer(identity, bucket)?);
            }
            if let Some(defaults) = default_interceptors(&buckets) {
                if let Some(last) = properties.last_mut() {
                    last.interceptors.extend(defaults);
                }
            }
            match MergeOrder::from_default_to_properties(self.properties.default_to_properties) {
                MergeOrder::AnnotationsFirst => std::iter::once(declarative).chain(properties).collect(),
                MergeOrder::PropertiesFirst => {
                    properties.push(declarative);
                    properties
                }
            }
        } else {
            vec![self.declarative_layer(descriptor, false)]
        };

        let mut config = base;
        for layer in layers {
            layer.apply(&mut config);
        }
        config.interceptors.sort_by_key(|i| i.order());
        config.capabilities.sort_by_key(|c| c.order());

        tracing::debug!(
            client = %identity,
            inherit = configurer.inherit_parent_configuration,
            interceptors = config.interceptors.len(),
            capabilities = config.capabilities.len(),
            "Resolved client configuration"
        );
        Ok(config)
    }

    fn single<T: Clone + Send + Sync + 'static>(&self, identity: &str, ancestors: bool) -> Option<T> {
        if ancestors {
            self.context.instance::<T>(identity)
        } else {
            self.context.instance_without_ancestors::<T>(identity)
        }
    }

    fn all<T: Clone + Send + Sync + 'static>(&self, identity: &str, ancestors: bool) -> Vec<T> {
        let found = if ancestors {
            self.context.instances::<T>(identity)
        } else {
            self.context.instances_without_ancestors::<T>(identity)
        };
        found.unwrap_or_default().into_iter().map(|(_, v)| v).collect()
    }

    fn declarative_layer(&self, descriptor: &ClientDescriptor, ancestors: bool) -> ConfigOverlay {
        let identity = descriptor.context_id.as_str();

        let error_decoder = self
            .single::<Arc<dyn ErrorDecoder>>(identity, ancestors)
            .or_else(|| {
                self.single::<Arc<dyn ErrorDecoderFactory>>(identity, ancestors)
                    .map(|factory| factory.create(&descriptor.type_name))
            });

        let options = match self.single::<Options>(identity, ancestors) {
            Some(options) => Some(OptionsPatch::Replace(OptionsSource::Static(options))),
            None if self.properties.refresh_enabled => {
                let name = options_name(identity);
                self.refresh.current(&name).map(|current| {
                    OptionsPatch::Replace(OptionsSource::Refreshable(self.refresh.handle(&name, current.options)))
                })
            }
            None => None,
        };

        ConfigOverlay {
            log_level: self.single::<LogLevel>(identity, ancestors),
            retryer: self.single::<Arc<dyn Retryer>>(identity, ancestors),
            error_decoder,
            options,
            interceptors: self.all::<Arc<dyn RequestInterceptor>>(identity, ancestors),
            query_map_encoder: self.single::<Arc<dyn QueryMapEncoder>>(identity, ancestors),
            capabilities: self.all::<Arc<dyn Capability>>(identity, ancestors),
            decode_404: descriptor.decode_404.then_some(true),
            exception_propagation: self.single::<ExceptionPropagation>(identity, ancestors),
            ..ConfigOverlay::default()
        }
    }

    fn property_layer(&self, identity: &str, bucket: &ClientConfigProperties) -> Result<ConfigOverlay, ConfigError> {
        let ctx = self.context;
        let catalog = self.catalog;

        let options = (!self.properties.refresh_enabled).then(|| OptionsPatch::Partial {
            connect_timeout: bucket.connect_timeout.map(Duration::from_millis),
            read_timeout: bucket.read_timeout.map(Duration::from_millis),
            follow_redirects: bucket.follow_redirects,
        });

        let mut interceptors = Vec::new();
        for name in bucket.request_interceptors.iter().flatten() {
            interceptors.push(catalog.interceptor(ctx, identity, name)?);
        }

        let mut capabilities = Vec::new();
        for name in bucket.capabilities.iter().flatten() {
            capabilities.push(catalog.capability(ctx, identity, name)?);
        }

        Ok(ConfigOverlay {
            log_level: bucket.logger_level,
            retryer: bucket.retryer.as_deref().map(|n| catalog.retryer(ctx, identity, n)).transpose()?,
            error_decoder: bucket
                .error_decoder
                .as_deref()
                .map(|n| catalog.error_decoder(ctx, identity, n))
                .transpose()?,
            options,
            interceptors,
            encoder: bucket.encoder.as_deref().map(|n| catalog.encoder(ctx, identity, n)).transpose()?,
            decoder: bucket.decoder.as_deref().map(|n| catalog.decoder(ctx, identity, n)).transpose()?,
            contract: bucket.contract.as_deref().map(|n| catalog.contract(ctx, identity, n)).transpose()?,
            query_map_encoder: bucket
                .query_map_encoder
                .as_deref()
                .map(|n| catalog.query_map_encoder(ctx, identity, n))
                .transpose()?,
            capabilities,
            decode_404: bucket.decode_404,
            exception_propagation: bucket.exception_propagation_policy,
        })
    }
}
