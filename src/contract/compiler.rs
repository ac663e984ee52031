//! Template compiler.
//!
//! # Responsibilities
//! - Validate routing metadata on an interface and its methods
//! - Produce one immutable [`RequestTemplate`] per method
//! - Attach converting expanders to HTTP-bound parameters
//!
//! # Design Decisions
//! - Only the first `produces`/`consumes` value is honoured
//! - Explicit `headers` entries replace `Accept`/`Content-Type` set from
//!   `produces`/`consumes`; repeated entries for one key are all kept

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use crate::contract::annotation::{HttpMethod, InterfaceMeta, MethodMeta, ParamAnnotation, RequestMapping};
use crate::contract::environment::{resolve_placeholders, Environment, MapEnvironment};
use crate::contract::expander::{ConversionService, ConvertingExpander, DefaultConversionService};
use crate::contract::processor::{ParameterContext, ProcessorRegistry};
use crate::contract::template::RequestTemplate;
use crate::error::ContractError;

pub const ACCEPT: &str = "Accept";
pub const CONTENT_TYPE: &str = "Content-Type";

/// Compiled templates of one client interface, keyed by config key.
#[derive(Debug, Clone)]
pub struct Contract {
    type_name: String,
    templates: BTreeMap<String, Arc<RequestTemplate>>,
}

impl Contract {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn templates(&self) -> &BTreeMap<String, Arc<RequestTemplate>> {
        &self.templates
    }

    /// Look up by config key, or by method name when that name is unique.
    pub fn template(&self, key: &str) -> Result<&Arc<RequestTemplate>, ContractError> {
        if let Some(template) = self.templates.get(key) {
            return Ok(template);
        }
        let mut by_name = self.templates.iter().filter(|(k, _)| {
            k.split_once('#')
                .and_then(|(_, rest)| rest.split_once('('))
                .is_some_and(|(name, _)| name == key)
        });
        match (by_name.next(), by_name.next()) {
            (Some((_, template)), None) => Ok(template),
            _ => Err(ContractError::UnknownMethod { key: key.to_string() }),
        }
    }
}

/// Turns interface metadata into a [`Contract`].
pub trait ContractStrategy: Send + Sync + fmt::Debug {
    fn parse(&self, interface: &InterfaceMeta) -> Result<Contract, ContractError>;
}

/// Default contract: request mappings plus parameter annotations.
#[derive(Clone)]
pub struct ContractCompiler {
    processors: ProcessorRegistry,
    conversion: Arc<dyn ConversionService>,
    environment: Arc<dyn Environment>,
    decode_slash: bool,
}

impl Default for ContractCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ContractCompiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractCompiler")
            .field("processors", &self.processors)
            .field("decode_slash", &self.decode_slash)
            .finish_non_exhaustive()
    }
}

impl ContractCompiler {
    pub fn new() -> Self {
        Self {
            processors: ProcessorRegistry::with_defaults(),
            conversion: Arc::new(DefaultConversionService::new()),
            environment: Arc::new(MapEnvironment::new()),
            decode_slash: true,
        }
    }

    pub fn with_processors(mut self, processors: ProcessorRegistry) -> Self {
        self.processors = processors;
        self
    }

    pub fn with_conversion(mut self, conversion: Arc<dyn ConversionService>) -> Self {
        self.conversion = conversion;
        self
    }

    pub fn with_environment(mut self, environment: Arc<dyn Environment>) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_decode_slash(mut self, decode_slash: bool) -> Self {
        self.decode_slash = decode_slash;
        self
    }

    fn resolve(&self, value: &str) -> Result<String, ContractError> {
        resolve_placeholders(value, self.environment.as_ref())
    }

    /// Compile a single method.
    pub fn parse_method(
        &self,
        interface: &InterfaceMeta,
        method: &MethodMeta,
    ) -> Result<RequestTemplate, ContractError> {
        let mut template = RequestTemplate::new(method.config_key(&interface.type_name));
        template.decode_slash = self.decode_slash;
        template.return_type = method.returns.clone();

        let mapping = method
            .request_mapping()
            .ok_or_else(|| ContractError::MissingRequestMapping { method: method.name.clone() })?;
        self.apply_mapping(&mut template, method, mapping)?;

        if let Some(format) = method.collection_format_annotation() {
            template.collection_format = format;
        }

        for (index, param) in method.params.iter().enumerate() {
            let mut http_bound = false;
            for annotation in &param.annotations {
                let Some(processor) = self.processors.get(&annotation.kind) else {
                    continue;
                };
                let effective = match (&param.name, annotation.value.is_empty()) {
                    (Some(name), true) => ParamAnnotation::new(annotation.kind.clone(), name),
                    _ => annotation.clone(),
                };
                let mut ctx = ParameterContext { template: &mut template, method, index, param };
                http_bound |= processor.process(&mut ctx, &effective)?;
            }

            if http_bound {
                if !template.has_expander(index)
                    && !is_multipart(&template)
                    && self.conversion.can_convert(param.ty.element())
                {
                    template.index_to_expander.insert(
                        index,
                        Arc::new(ConvertingExpander::new(param.ty.clone(), self.conversion.clone())),
                    );
                }
            } else {
                if !template.form_params.is_empty() {
                    return Err(ContractError::BodyWithFormParameters { method: method.name.clone() });
                }
                if template.body_index.is_some() {
                    return Err(ContractError::MultipleBodyParameters { method: method.name.clone() });
                }
                template.body_index = Some(index);
                template.body_type = Some(param.ty.clone());
            }
        }

        if template.body_index.is_some() && !template.form_params.is_empty() {
            return Err(ContractError::BodyWithFormParameters { method: method.name.clone() });
        }

        tracing::debug!(
            key = %template.config_key,
            method = %template.method,
            uri = %template.uri,
            "Compiled request template"
        );
        Ok(template)
    }

    fn apply_mapping(
        &self,
        template: &mut RequestTemplate,
        method: &MethodMeta,
        mapping: &RequestMapping,
    ) -> Result<(), ContractError> {
        template.method = match mapping.method.as_slice() {
            [] => HttpMethod::Get,
            [verb] => *verb,
            many => {
                return Err(ContractError::MultipleHttpMethods {
                    method: method.name.clone(),
                    found: many.len(),
                })
            }
        };

        let [raw_path] = mapping.path.as_slice() else {
            return Err(ContractError::MultiplePathValues {
                method: method.name.clone(),
                found: mapping.path.len(),
            });
        };
        let path = self.resolve(raw_path)?;
        if !path.is_empty() {
            let (path_part, query_part) = match path.split_once('?') {
                Some((p, q)) => (p, Some(q)),
                None => (path.as_str(), None),
            };
            if !path_part.is_empty() && !path_part.starts_with('/') && !template.uri.ends_with('/') {
                template.append_path("/");
            }
            template.append_path(path_part);
            if let Some(query) = query_part {
                for pair in query.split('&').filter(|p| !p.is_empty()) {
                    match pair.split_once('=') {
                        Some((k, v)) => template.queries.append(k, v),
                        None => template.queries.append(pair, ""),
                    }
                }
            }
        }

        if let Some(accept) = mapping.produces.first().filter(|v| !v.is_empty()) {
            template.headers.replace(ACCEPT, vec![accept.clone()]);
        }
        if let Some(content_type) = mapping.consumes.first().filter(|v| !v.is_empty()) {
            template.headers.replace(CONTENT_TYPE, vec![content_type.clone()]);
        }

        let mut declared: HashSet<String> = HashSet::new();
        for entry in &mapping.headers {
            if entry.contains("!=") {
                continue;
            }
            let Some((key, value)) = entry.split_once('=') else {
                continue;
            };
            let key = self.resolve(key.trim())?;
            let value = self.resolve(value.trim())?;
            if declared.insert(key.to_ascii_lowercase()) {
                template.headers.replace(&key, vec![value]);
            } else {
                template.headers.append(&key, value);
            }
        }
        Ok(())
    }
}

fn is_multipart(template: &RequestTemplate) -> bool {
    template
        .headers
        .first(CONTENT_TYPE)
        .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("multipart/form-data"))
}

impl ContractStrategy for ContractCompiler {
    fn parse(&self, interface: &InterfaceMeta) -> Result<Contract, ContractError> {
        if interface.request_mapping.is_some() {
            return Err(ContractError::ClassLevelRoutingNotAllowed {
                type_name: interface.type_name.clone(),
            });
        }

        let mut templates = BTreeMap::new();
        for method in &interface.methods {
            let template = self.parse_method(interface, method)?;
            let key = template.config_key.clone();
            if templates.insert(key.clone(), Arc::new(template)).is_some() {
                return Err(ContractError::DuplicateMethod { key });
            }
        }

        Ok(Contract {
            type_name: interface.type_name.clone(),
            templates,
        })
    }
}
