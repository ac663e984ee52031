//! Targets and targeters.

use std::sync::Arc;
use serde::Serialize;
use crate::client::builder::ClientBuilder;
use crate::client::proxy::ContractClient;
use crate::context::ScopedContext;
use crate::contract::ContractRegistry;
use crate::error::ConfigError;
use crate::registrar::descriptor::ClientDescriptor;

/// Where a client sends its requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    pub type_name: String,
    pub name: String,
    /// Base URL including the path prefix.
    pub url: String,
}

/// Turns a configured builder into a live client.
pub trait Targeter: Send + Sync {
    fn target(
        &self,
        descriptor: &ClientDescriptor,
        builder: ClientBuilder,
        context: &dyn ScopedContext,
        target: Target,
    ) -> Result<Arc<ContractClient>, ConfigError>;
}

/// Builds the client as configured. Fallback declarations are not consulted.
#[derive(Debug, Clone)]
pub struct DefaultTargeter {
    contracts: Arc<ContractRegistry>,
}

impl DefaultTargeter {
    pub fn new(contracts: Arc<ContractRegistry>) -> Self {
        Self { contracts }
    }
}

impl Targeter for DefaultTargeter {
    fn target(
        &self,
        descriptor: &ClientDescriptor,
        builder: ClientBuilder,
        _context: &dyn ScopedContext,
        target: Target,
    ) -> Result<Arc<ContractClient>, ConfigError> {
        let client = builder.build(&self.contracts, &descriptor.interface, target, &descriptor.client_name)?;
        Ok(Arc::new(client))
    }
}
