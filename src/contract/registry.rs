//! Contract registry: one compiled [`Contract`] per client type.

use std::sync::Arc;
use dashmap::DashMap;
use crate::contract::annotation::InterfaceMeta;
use crate::contract::compiler::{Contract, ContractStrategy};
use crate::error::ContractError;

/// Compiled contracts keyed by client type name.
///
/// Compilation runs once per type. A failed compilation registers nothing,
/// so the next call retries and reports the same error.
#[derive(Debug, Default)]
pub struct ContractRegistry {
    contracts: DashMap<String, Arc<Contract>>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, type_name: &str) -> Option<Arc<Contract>> {
        self.contracts.get(type_name).map(|entry| entry.value().clone())
    }

    pub fn get_or_compile(
        &self,
        interface: &InterfaceMeta,
        strategy: &dyn ContractStrategy,
    ) -> Result<Arc<Contract>, ContractError> {
        if let Some(existing) = self.get(&interface.type_name) {
            return Ok(existing);
        }
        let compiled = Arc::new(strategy.parse(interface)?);
        // first writer wins if two callers raced
        let entry = self
            .contracts
            .entry(interface.type_name.clone())
            .or_insert(compiled);
        tracing::debug!(
            type_name = %interface.type_name,
            methods = entry.templates().len(),
            "Registered contract"
        );
        Ok(entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::annotation::{MethodMeta, RequestMapping};
    use crate::contract::compiler::ContractCompiler;

    #[test]
    fn test_compiles_once() {
        let registry = ContractRegistry::new();
        let iface = InterfaceMeta::new("acme::Api")
            .method(MethodMeta::new("list").mapping(RequestMapping::get("/items")));
        let compiler = ContractCompiler::new();

        let first = registry.get_or_compile(&iface, &compiler).unwrap();
        let second = registry.get_or_compile(&iface, &compiler).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_failed_compilation_registers_nothing() {
        let registry = ContractRegistry::new();
        let iface = InterfaceMeta::new("acme::Broken").method(MethodMeta::new("bare"));
        assert!(registry.get_or_compile(&iface, &ContractCompiler::new()).is_err());
        assert!(registry.get("acme::Broken").is_none());
    }
}
