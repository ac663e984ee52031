//! Registered clients, looked up by alias or by type.

use std::sync::Arc;
use dashmap::DashMap;
use crate::client::factory::{ClientFactory, CompiledClient};
use crate::client::proxy::ContractClient;
use crate::error::ConfigError;
use crate::registrar::descriptor::ClientDescriptor;

/// Maps context ids and qualifiers to descriptors. Clients are built on first lookup.
#[derive(Debug)]
pub struct ClientRegistry {
    factory: Arc<ClientFactory>,
    descriptors: DashMap<String, Arc<ClientDescriptor>>,
    aliases: DashMap<String, String>,
}

impl ClientRegistry {
    pub fn new(factory: Arc<ClientFactory>) -> Self {
        Self {
            factory,
            descriptors: DashMap::new(),
            aliases: DashMap::new(),
        }
    }

    pub fn factory(&self) -> &Arc<ClientFactory> {
        &self.factory
    }

    pub fn register(&self, descriptor: ClientDescriptor) -> Result<Arc<ClientDescriptor>, ConfigError> {
        let id = descriptor.context_id.clone();
        if self.descriptors.contains_key(&id) {
            return Err(ConfigError::DuplicateClient(id));
        }
        if let Some(taken) = descriptor
            .qualifiers
            .iter()
            .find(|q| self.aliases.get(q.as_str()).is_some_and(|owner| *owner != id))
        {
            return Err(ConfigError::DuplicateClient(taken.clone()));
        }

        let descriptor = Arc::new(descriptor);
        for qualifier in &descriptor.qualifiers {
            self.aliases.insert(qualifier.clone(), id.clone());
        }
        self.descriptors.insert(id.clone(), descriptor.clone());
        tracing::info!(
            client = %id,
            type_name = %descriptor.type_name,
            qualifiers = ?descriptor.qualifiers,
            "Registered client"
        );
        Ok(descriptor)
    }

    /// Descriptor by context id or qualifier.
    pub fn descriptor(&self, alias: &str) -> Option<Arc<ClientDescriptor>> {
        let id = self
            .aliases
            .get(alias)
            .map(|owner| owner.value().clone())
            .unwrap_or_else(|| alias.to_string());
        self.descriptors.get(&id).map(|d| d.value().clone())
    }

    /// All descriptors, sorted by context id.
    pub fn descriptors(&self) -> Vec<Arc<ClientDescriptor>> {
        let mut all: Vec<_> = self.descriptors.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.context_id.cmp(&b.context_id));
        all
    }

    pub fn compiled(&self, alias: &str) -> Result<Arc<CompiledClient>, ConfigError> {
        let descriptor = self
            .descriptor(alias)
            .ok_or_else(|| ConfigError::UnknownClient(alias.to_string()))?;
        self.factory.build(&descriptor)
    }

    pub fn client(&self, alias: &str) -> Result<Arc<ContractClient>, ConfigError> {
        Ok(self.compiled(alias)?.client.clone())
    }

    /// The only client of a type, or its primary client when there are several.
    pub fn client_for_type(&self, type_name: &str) -> Result<Arc<ContractClient>, ConfigError> {
        let candidates: Vec<_> = self
            .descriptors()
            .into_iter()
            .filter(|d| d.type_name == type_name)
            .collect();
        let chosen = match candidates.as_slice() {
            [] => return Err(ConfigError::UnknownClient(type_name.to_string())),
            [only] => only.clone(),
            many => {
                let mut primaries = many.iter().filter(|d| d.primary);
                match (primaries.next(), primaries.next()) {
                    (Some(primary), None) => primary.clone(),
                    _ => {
                        return Err(ConfigError::AmbiguousClient {
                            type_name: type_name.to_string(),
                        })
                    }
                }
            }
        };
        Ok(self.factory.build(&chosen)?.client.clone())
    }
}
