//! Scoped component context.
//!
//! # Responsibilities
//! - Hold one child scope per client identity, built lazily
//! - Share a parent scope across every client
//! - Typed and named component lookups, with or without ancestors
//!
//! # Design Decisions
//! - Child scopes apply `default.*` modules first, then the identity's own
//!   module; for single lookups the last registration wins
//! - Components are stored as `Arc<dyn Any>` and cloned out on lookup

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use dashmap::DashMap;

/// Type-erased component.
pub type Component = Arc<dyn Any + Send + Sync>;

/// Prefix of configuration modules applied to every child scope.
pub const DEFAULT_PREFIX: &str = "default.";

/// Lookup interface used by the resolver and the factory.
pub trait ScopedContext: Send + Sync {
    fn instance_raw(&self, identity: &str, type_id: TypeId, ancestors: bool) -> Option<Component>;

    /// All components of a type; `None` when there are none.
    fn instances_raw(
        &self,
        identity: &str,
        type_id: TypeId,
        ancestors: bool,
    ) -> Option<Vec<(String, Component)>>;

    fn named_raw(&self, identity: &str, name: &str, type_id: TypeId) -> Option<Component>;
}

/// Typed helpers over [`ScopedContext`].
pub trait ScopedContextExt: ScopedContext {
    fn instance<T: Clone + Send + Sync + 'static>(&self, identity: &str) -> Option<T> {
        self.instance_raw(identity, TypeId::of::<T>(), true)
            .and_then(|c| c.downcast_ref::<T>().cloned())
    }

    fn instance_without_ancestors<T: Clone + Send + Sync + 'static>(&self, identity: &str) -> Option<T> {
        self.instance_raw(identity, TypeId::of::<T>(), false)
            .and_then(|c| c.downcast_ref::<T>().cloned())
    }

    fn instances<T: Clone + Send + Sync + 'static>(&self, identity: &str) -> Option<Vec<(String, T)>> {
        self.instances_raw(identity, TypeId::of::<T>(), true).map(downcast_all)
    }

    fn instances_without_ancestors<T: Clone + Send + Sync + 'static>(
        &self,
        identity: &str,
    ) -> Option<Vec<(String, T)>> {
        self.instances_raw(identity, TypeId::of::<T>(), false).map(downcast_all)
    }

    fn named<T: Clone + Send + Sync + 'static>(&self, identity: &str, name: &str) -> Option<T> {
        self.named_raw(identity, name, TypeId::of::<T>())
            .and_then(|c| c.downcast_ref::<T>().cloned())
    }
}

impl<C: ScopedContext + ?Sized> ScopedContextExt for C {}

fn downcast_all<T: Clone + 'static>(entries: Vec<(String, Component)>) -> Vec<(String, T)> {
    entries
        .into_iter()
        .filter_map(|(name, c)| c.downcast_ref::<T>().cloned().map(|v| (name, v)))
        .collect()
}

/// A set of registered components.
#[derive(Default)]
pub struct Scope {
    entries: HashMap<TypeId, Vec<(String, Component)>>,
    counter: usize,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.counter += 1;
        let name = format!("{}#{}", std::any::type_name::<T>(), self.counter);
        self.register_named(&name, value)
    }

    /// Register under a name. A second registration with the same name replaces the first.
    pub fn register_named<T: Send + Sync + 'static>(&mut self, name: &str, value: T) -> &mut Self {
        let slot = self.entries.entry(TypeId::of::<T>()).or_default();
        slot.retain(|(n, _)| n != name);
        slot.push((name.to_string(), Arc::new(value)));
        self
    }

    fn single(&self, type_id: TypeId) -> Option<Component> {
        self.entries.get(&type_id).and_then(|v| v.last()).map(|(_, c)| c.clone())
    }

    fn all(&self, type_id: TypeId) -> Vec<(String, Component)> {
        self.entries.get(&type_id).cloned().unwrap_or_default()
    }

    fn named(&self, name: &str, type_id: TypeId) -> Option<Component> {
        self.entries
            .get(&type_id)
            .and_then(|v| v.iter().find(|(n, _)| n == name))
            .map(|(_, c)| c.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.entries.values().flatten().map(|(n, _)| n.as_str()).collect();
        f.debug_struct("Scope").field("components", &names).finish()
    }
}

/// Declarative configuration attached to a client: registers components into its scope.
#[derive(Clone)]
pub struct ConfigurationModule(Arc<dyn Fn(&mut Scope) + Send + Sync>);

impl ConfigurationModule {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut Scope) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn apply(&self, scope: &mut Scope) {
        (self.0)(scope)
    }
}

impl fmt::Debug for ConfigurationModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ConfigurationModule")
    }
}

/// Default in-memory [`ScopedContext`].
#[derive(Default)]
pub struct NamedContext {
    parent: RwLock<Scope>,
    specifications: RwLock<Vec<(String, ConfigurationModule)>>,
    scopes: DashMap<String, Arc<Scope>>,
}

impl NamedContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component visible to every client through ancestor lookups.
    pub fn register_parent<T: Send + Sync + 'static>(&self, value: T) {
        self.parent.write().unwrap_or_else(PoisonError::into_inner).register(value);
    }

    pub fn register_parent_named<T: Send + Sync + 'static>(&self, name: &str, value: T) {
        self.parent
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register_named(name, value);
    }

    /// Attach a module to `name`, or to every client when `name` starts with `default.`.
    pub fn register_configuration(&self, name: &str, module: ConfigurationModule) {
        self.specifications
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((name.to_string(), module));
        if name.starts_with(DEFAULT_PREFIX) {
            self.scopes.clear();
        } else {
            self.scopes.remove(name);
        }
        tracing::debug!(name = %name, "Registered configuration module");
    }

    /// Identities whose scopes have been built.
    pub fn context_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.scopes.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    fn scope(&self, identity: &str) -> Arc<Scope> {
        if let Some(scope) = self.scopes.get(identity) {
            return scope.value().clone();
        }
        let built = Arc::new(self.build_scope(identity));
        self.scopes
            .entry(identity.to_string())
            .or_insert(built)
            .value()
            .clone()
    }

    fn build_scope(&self, identity: &str) -> Scope {
        let mut scope = Scope::new();
        let specifications = self.specifications.read().unwrap_or_else(PoisonError::into_inner);
        for (_, module) in specifications.iter().filter(|(n, _)| n.starts_with(DEFAULT_PREFIX)) {
            module.apply(&mut scope);
        }
        for (_, module) in specifications.iter().filter(|(n, _)| n == identity) {
            module.apply(&mut scope);
        }
        tracing::debug!(identity = %identity, components = scope.len(), "Created child scope");
        scope
    }
}

impl ScopedContext for NamedContext {
    fn instance_raw(&self, identity: &str, type_id: TypeId, ancestors: bool) -> Option<Component> {
        self.scope(identity).single(type_id).or_else(|| {
            if ancestors {
                self.parent.read().unwrap_or_else(PoisonError::into_inner).single(type_id)
            } else {
                None
            }
        })
    }

    fn instances_raw(
        &self,
        identity: &str,
        type_id: TypeId,
        ancestors: bool,
    ) -> Option<Vec<(String, Component)>> {
        let mut found = self.scope(identity).all(type_id);
        if ancestors {
            let parent = self.parent.read().unwrap_or_else(PoisonError::into_inner);
            for (name, component) in parent.all(type_id) {
                if !found.iter().any(|(n, _)| *n == name) {
                    found.push((name, component));
                }
            }
        }
        (!found.is_empty()).then_some(found)
    }

    fn named_raw(&self, identity: &str, name: &str, type_id: TypeId) -> Option<Component> {
        self.scope(identity).named(name, type_id).or_else(|| {
            self.parent
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .named(name, type_id)
        })
    }
}

impl fmt::Debug for NamedContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedContext")
            .field("scopes", &self.context_names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Marker(&'static str);

    #[test]
    fn test_child_overrides_parent() {
        let ctx = NamedContext::new();
        ctx.register_parent(Marker("parent"));
        ctx.register_configuration("users", ConfigurationModule::new(|s| {
            s.register(Marker("users"));
        }));

        assert_eq!(ctx.instance::<Marker>("users"), Some(Marker("users")));
        assert_eq!(ctx.instance::<Marker>("orders"), Some(Marker("parent")));
        assert_eq!(ctx.instance_without_ancestors::<Marker>("orders"), None);
    }

    #[test]
    fn test_default_modules_apply_before_identity() {
        let ctx = NamedContext::new();
        ctx.register_configuration("default.app", ConfigurationModule::new(|s| {
            s.register(Marker("default"));
            s.register_named("shared", 7u32);
        }));
        ctx.register_configuration("users", ConfigurationModule::new(|s| {
            s.register(Marker("users"));
        }));

        assert_eq!(ctx.instance::<Marker>("users"), Some(Marker("users")));
        assert_eq!(ctx.instance::<Marker>("orders"), Some(Marker("default")));
        assert_eq!(ctx.named::<u32>("orders", "shared"), Some(7));
    }

    #[test]
    fn test_instances_merge_child_then_parent() {
        let ctx = NamedContext::new();
        ctx.register_parent_named("a", Marker("parent-a"));
        ctx.register_parent_named("b", Marker("parent-b"));
        ctx.register_configuration("users", ConfigurationModule::new(|s| {
            s.register_named("a", Marker("child-a"));
        }));

        let all = ctx.instances::<Marker>("users").unwrap();
        assert_eq!(
            all,
            vec![("a".to_string(), Marker("child-a")), ("b".to_string(), Marker("parent-b"))]
        );
        let local = ctx.instances_without_ancestors::<Marker>("users").unwrap();
        assert_eq!(local.len(), 1);
        assert!(ctx.instances_without_ancestors::<Marker>("orders").is_none());
    }

    #[test]
    fn test_late_registration_rebuilds_scope() {
        let ctx = NamedContext::new();
        assert_eq!(ctx.instance::<Marker>("users"), None);
        ctx.register_configuration("users", ConfigurationModule::new(|s| {
            s.register(Marker("late"));
        }));
        assert_eq!(ctx.instance::<Marker>("users"), Some(Marker("late")));
    }
}
