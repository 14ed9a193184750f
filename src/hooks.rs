//! Extenders, lifecycle hooks and rebinding callbacks
//!
//! Everything here is registered once during bootstrap and read on every
//! resolution. Readers clone the callback list out (a `Vec` of `Arc`s) before
//! invoking anything, so no lock is held while user code runs.

use crate::parameters::{Instance, Parameters, Value};
use crate::provider::Attribute;
use crate::{Container, Resolver, Result};
use ahash::RandomState;
use dashmap::DashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Post-construction decorator
pub type ExtenderFn = Arc<dyn Fn(Instance, &Resolver<'_>) -> Result<Instance> + Send + Sync>;

/// Fired before anything is looked up for an identifier
pub type BeforeResolvingFn = Arc<dyn Fn(&str, &Parameters, &Container) + Send + Sync>;

/// Fired with the resolved object (resolving and after-resolving phases)
pub type ResolvingFn = Arc<dyn Fn(&Instance, &Resolver<'_>) + Send + Sync>;

/// Fired with the fresh instance when an identifier is rebound
pub type ReboundFn = Arc<dyn Fn(&Container, &Instance) + Send + Sync>;

/// Fired for an attribute once the object or parameter carrying it is resolved
pub type AttributeCallbackFn = Arc<dyn Fn(&Attribute, &Value, &Resolver<'_>) + Send + Sync>;

/// Produces the value of a parameter that carries a contextual attribute
pub type AttributeHandlerFn = Arc<dyn Fn(&Attribute, &Resolver<'_>) -> Result<Value> + Send + Sync>;

/// Replaces the invocation of a bound method
pub type MethodBindingFn = Arc<dyn Fn(&Instance, &Resolver<'_>) -> Result<Instance> + Send + Sync>;

/// Which resolutions a hook applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookScope {
    /// Every resolution
    Global,
    /// Resolutions of this identifier or of classes declaring it as a supertype
    Type(String),
}

/// One lifecycle phase: global hooks first, then type-scoped ones, each in
/// registration order.
struct PhaseHooks<H> {
    hooks: RwLock<Vec<(HookScope, H)>>,
}

impl<H: Clone> PhaseHooks<H> {
    fn new() -> Self {
        Self {
            hooks: RwLock::new(Vec::new()),
        }
    }

    fn add(&self, scope: HookScope, hook: H) {
        self.hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((scope, hook));
    }

    fn matching(&self, applies: impl Fn(&str) -> bool) -> Vec<H> {
        let hooks = self.hooks.read().unwrap_or_else(PoisonError::into_inner);
        let global = hooks
            .iter()
            .filter(|(scope, _)| *scope == HookScope::Global);
        let typed = hooks
            .iter()
            .filter(|(scope, _)| matches!(scope, HookScope::Type(ty) if applies(ty.as_str())));
        global.chain(typed).map(|(_, hook)| hook.clone()).collect()
    }

    fn len(&self) -> usize {
        self.hooks.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

fn list_map<V>() -> DashMap<String, Vec<V>, RandomState> {
    DashMap::with_hasher(RandomState::new())
}

/// All callback registries of a container.
pub(crate) struct HookRegistry {
    extenders: DashMap<String, Vec<ExtenderFn>, RandomState>,
    before_resolving: PhaseHooks<BeforeResolvingFn>,
    resolving: PhaseHooks<ResolvingFn>,
    after_resolving: PhaseHooks<ResolvingFn>,
    rebound: DashMap<String, Vec<ReboundFn>, RandomState>,
    attribute_callbacks: DashMap<String, Vec<AttributeCallbackFn>, RandomState>,
    attribute_handlers: DashMap<String, AttributeHandlerFn, RandomState>,
    method_bindings: DashMap<String, MethodBindingFn, RandomState>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self {
            extenders: list_map(),
            before_resolving: PhaseHooks::new(),
            resolving: PhaseHooks::new(),
            after_resolving: PhaseHooks::new(),
            rebound: list_map(),
            attribute_callbacks: list_map(),
            attribute_handlers: DashMap::with_hasher(RandomState::new()),
            method_bindings: DashMap::with_hasher(RandomState::new()),
        }
    }

    // =========================================================================
    // Extenders
    // =========================================================================

    pub fn add_extender(&self, id: &str, extender: ExtenderFn) {
        self.extenders.entry(id.to_string()).or_default().push(extender);
    }

    pub fn extenders_for(&self, id: &str) -> Vec<ExtenderFn> {
        self.extenders
            .get(id)
            .map(|list| list.value().clone())
            .unwrap_or_default()
    }

    pub fn erase_extenders(&self, id: &str) -> usize {
        self.extenders.remove(id).map_or(0, |(_, list)| list.len())
    }

    // =========================================================================
    // Lifecycle Hooks
    // =========================================================================

    pub fn add_before_resolving(&self, scope: HookScope, hook: BeforeResolvingFn) {
        self.before_resolving.add(scope, hook);
    }

    pub fn add_resolving(&self, scope: HookScope, hook: ResolvingFn) {
        self.resolving.add(scope, hook);
    }

    pub fn add_after_resolving(&self, scope: HookScope, hook: ResolvingFn) {
        self.after_resolving.add(scope, hook);
    }

    pub fn before_resolving_for(&self, applies: impl Fn(&str) -> bool) -> Vec<BeforeResolvingFn> {
        self.before_resolving.matching(applies)
    }

    /// Resolving hooks followed by after-resolving hooks.
    pub fn resolving_for(&self, applies: impl Fn(&str) -> bool) -> Vec<ResolvingFn> {
        let mut hooks = self.resolving.matching(&applies);
        hooks.extend(self.after_resolving.matching(&applies));
        hooks
    }

    pub fn lifecycle_hook_count(&self) -> usize {
        self.before_resolving.len() + self.resolving.len() + self.after_resolving.len()
    }

    // =========================================================================
    // Rebinding
    // =========================================================================

    pub fn add_rebound(&self, id: &str, callback: ReboundFn) {
        self.rebound.entry(id.to_string()).or_default().push(callback);
    }

    pub fn rebound_for(&self, id: &str) -> Vec<ReboundFn> {
        self.rebound
            .get(id)
            .map(|list| list.value().clone())
            .unwrap_or_default()
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    pub fn add_attribute_callback(&self, name: &str, callback: AttributeCallbackFn) {
        self.attribute_callbacks
            .entry(name.to_string())
            .or_default()
            .push(callback);
    }

    pub fn attribute_callbacks_for(&self, name: &str) -> Vec<AttributeCallbackFn> {
        self.attribute_callbacks
            .get(name)
            .map(|list| list.value().clone())
            .unwrap_or_default()
    }

    pub fn set_attribute_handler(&self, name: &str, handler: AttributeHandlerFn) {
        self.attribute_handlers.insert(name.to_string(), handler);
    }

    /// The first attribute in `attributes` that has a handler, with that handler.
    pub fn contextual_attribute<'a>(
        &self,
        attributes: &'a [Attribute],
    ) -> Option<(&'a Attribute, AttributeHandlerFn)> {
        attributes.iter().find_map(|attribute| {
            self.attribute_handlers
                .get(attribute.name())
                .map(|handler| (attribute, Arc::clone(handler.value())))
        })
    }

    // =========================================================================
    // Method Bindings
    // =========================================================================

    pub fn bind_method(&self, method: &str, callback: MethodBindingFn) {
        self.method_bindings.insert(method.to_string(), callback);
    }

    pub fn has_method_binding(&self, method: &str) -> bool {
        self.method_bindings.contains_key(method)
    }

    pub fn method_binding(&self, method: &str) -> Option<MethodBindingFn> {
        self.method_bindings.get(method).map(|m| Arc::clone(m.value()))
    }
}
