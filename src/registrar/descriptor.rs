//! Client declarations and their resolved descriptors.

use serde::{Deserialize, Serialize};
use crate::context::ConfigurationModule;
use crate::contract::environment::{resolve_placeholders, Environment};
use crate::contract::{InterfaceMeta, TypeKind, TypeRef};
use crate::error::ConfigError;
use crate::registrar::normalize::{normalize_path, normalize_service_name, normalize_url};

/// Attributes declared on a client, before resolution.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientAttributes {
    pub name: Option<String>,
    pub value: Option<String>,
    pub service_id: Option<String>,
    pub context_id: Option<String>,
    pub url: Option<String>,
    pub path: Option<String>,
    pub qualifier: Option<String>,
    pub qualifiers: Vec<String>,
    pub primary: bool,
    pub fallback: Option<TypeRef>,
    pub fallback_factory: Option<TypeRef>,
    pub decode_404: bool,
    /// Components registered into this client's scope.
    #[serde(skip)]
    pub configuration: Option<ConfigurationModule>,
}

impl Default for ClientAttributes {
    fn default() -> Self {
        Self {
            name: None,
            value: None,
            service_id: None,
            context_id: None,
            url: None,
            path: None,
            qualifier: None,
            qualifiers: Vec::new(),
            primary: true,
            fallback: None,
            fallback_factory: None,
            decode_404: false,
            configuration: None,
        }
    }
}

impl ClientAttributes {
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    pub fn path(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }

    pub fn context_id(mut self, context_id: &str) -> Self {
        self.context_id = Some(context_id.to_string());
        self
    }

    pub fn configuration(mut self, module: ConfigurationModule) -> Self {
        self.configuration = Some(module);
        self
    }
}

/// What to use when a call fails. The default targeter does not consult it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "type", rename_all = "lowercase")]
pub enum FallbackStrategy {
    None,
    Instance(String),
    Factory(String),
}

/// A client after its attributes are resolved and validated.
#[derive(Debug, Clone, Serialize)]
pub struct ClientDescriptor {
    pub type_name: String,
    /// Name the declarative configuration module is registered under.
    pub client_name: String,
    pub name: String,
    /// Identity key: scope, property bucket, cache and refresh cell.
    pub context_id: String,
    pub url: String,
    pub path: String,
    pub qualifiers: Vec<String>,
    pub primary: bool,
    pub fallback: FallbackStrategy,
    pub decode_404: bool,
    #[serde(skip)]
    pub interface: InterfaceMeta,
}

fn has_text(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn resolve_text(value: &str, env: &dyn Environment) -> Result<String, ConfigError> {
    Ok(resolve_placeholders(value, env)?)
}

impl ClientDescriptor {
    pub fn resolve(
        attributes: &ClientAttributes,
        interface: &InterfaceMeta,
        env: &dyn Environment,
    ) -> Result<Self, ConfigError> {
        let type_name = interface.type_name.clone();
        if interface.kind != TypeKind::Interface {
            return Err(ConfigError::NotAnInterface { type_name });
        }

        let client_name = [&attributes.context_id, &attributes.value, &attributes.name, &attributes.service_id]
            .into_iter()
            .find_map(has_text)
            .ok_or_else(|| ConfigError::MissingName { type_name: type_name.clone() })?;
        let client_name = resolve_text(client_name, env)?;

        let raw_name = [&attributes.service_id, &attributes.name, &attributes.value]
            .into_iter()
            .find_map(has_text)
            .unwrap_or_default();
        let name = normalize_service_name(&resolve_text(raw_name, env)?)?;
        if name.is_empty() {
            return Err(ConfigError::MissingName { type_name });
        }

        let context_id = match has_text(&attributes.context_id) {
            Some(explicit) => normalize_service_name(&resolve_text(explicit, env)?)?,
            None => name.clone(),
        };
        if context_id.is_empty() {
            return Err(ConfigError::MissingContextId { type_name });
        }

        let url = normalize_url(&resolve_text(attributes.url.as_deref().unwrap_or_default(), env)?)?;
        let path = normalize_path(&resolve_text(attributes.path.as_deref().unwrap_or_default(), env)?);

        if let Some(fallback) = attributes.fallback.as_ref().filter(|f| f.kind == TypeKind::Interface) {
            return Err(ConfigError::FallbackIsInterface {
                name: name.clone(),
                fallback: fallback.name.clone(),
            });
        }
        if let Some(factory) = attributes.fallback_factory.as_ref().filter(|f| f.kind == TypeKind::Interface) {
            return Err(ConfigError::FallbackFactoryIsInterface {
                name: name.clone(),
                factory: factory.name.clone(),
            });
        }
        let fallback = match (&attributes.fallback, &attributes.fallback_factory) {
            (Some(instance), _) => FallbackStrategy::Instance(instance.name.clone()),
            (None, Some(factory)) => FallbackStrategy::Factory(factory.name.clone()),
            (None, None) => FallbackStrategy::None,
        };

        let mut qualifiers: Vec<String> = attributes
            .qualifiers
            .iter()
            .filter(|q| !q.trim().is_empty())
            .cloned()
            .collect();
        if qualifiers.is_empty() {
            qualifiers.push(match has_text(&attributes.qualifier) {
                Some(qualifier) => qualifier.to_string(),
                None => format!("{}Client", context_id),
            });
        }

        Ok(Self {
            type_name,
            client_name,
            name,
            context_id,
            url,
            path,
            qualifiers,
            primary: attributes.primary,
            fallback,
            decode_404: attributes.decode_404,
            interface: interface.clone(),
        })
    }
}
