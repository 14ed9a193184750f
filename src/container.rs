//! The service container
//!
//! The `Container` is the core of the crate. It stores bindings, aliases,
//! contextual overrides and shared instances, and resolves identifiers by
//! running them through the resolution pipeline:
//!
//! alias → before hooks → contextual lookup → instance cache → build →
//! extenders → cache write-back → resolving/after hooks.

use crate::config::ContainerConfig;
use crate::context::{FrameKind, ResolutionContext, Resolver};
use crate::contextual::{Contextual, ContextualBindingBuilder, ContextualMap};
use crate::factory::{Binding, FactoryFn, Recipe};
use crate::hooks::{ExtenderFn, HookRegistry, HookScope};
use crate::parameters::{downcast, erase, Arguments, Instance, Parameters, Value};
use crate::provider::{Attribute, Buildable, ClassDescriptor, Lifecycle, Param, ParamKind};
use crate::storage::{AliasTable, BindingRegistry, CachedInstance, ClassTable, InstanceCache};
use crate::{ContainerError, Injectable, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

pub(crate) struct Inner {
    pub(crate) aliases: AliasTable,
    pub(crate) bindings: BindingRegistry,
    pub(crate) instances: InstanceCache,
    pub(crate) classes: ClassTable,
    pub(crate) contextual: ContextualMap,
    pub(crate) hooks: HookRegistry,
    config: ContainerConfig,
    /// Lock state - uses AtomicBool for fast lock checking (no contention)
    locked: AtomicBool,
}

/// Binding-resolution container.
///
/// Cloning a `Container` is cheap and yields another handle to the same
/// registries, so it can be handed to every consumer and shared across threads.
///
/// # Examples
///
/// ```rust
/// use service_container::{Container, Recipe};
/// use std::sync::Arc;
///
/// struct ConsoleLogger;
///
/// let container = Container::new();
/// container.singleton("logger", Recipe::factory(|_, _| Ok(ConsoleLogger))).unwrap();
///
/// let a = container.make("logger").unwrap();
/// let b = container.make("logger").unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// ```
#[derive(Clone)]
pub struct Container {
    pub(crate) inner: Arc<Inner>,
}

/// An object produced by one resolution, with the class it was built from
/// when the builder knows it.
pub(crate) struct Resolved {
    pub(crate) instance: Instance,
    pub(crate) class: Option<String>,
}

impl Container {
    /// Create an empty container with the default configuration.
    #[inline]
    pub fn new() -> Self {
        Self::with_config(ContainerConfig::default())
    }

    pub fn with_config(config: ContainerConfig) -> Self {
        #[cfg(feature = "logging")]
        debug!(
            target: "service_container",
            environment = config.get_environment(),
            max_depth = config.get_max_depth(),
            "Creating service container"
        );

        Self {
            inner: Arc::new(Inner {
                aliases: AliasTable::new(),
                bindings: BindingRegistry::new(),
                instances: InstanceCache::new(),
                classes: ClassTable::new(),
                contextual: ContextualMap::new(),
                hooks: HookRegistry::new(),
                config,
                locked: AtomicBool::new(false),
            }),
        }
    }

    #[inline]
    pub fn config(&self) -> &ContainerConfig {
        &self.inner.config
    }

    /// The configured application environment.
    #[inline]
    pub fn environment(&self) -> Option<&str> {
        self.inner.config.get_environment()
    }

    // =========================================================================
    // Class Table
    // =========================================================================

    /// Make `T` buildable by the container under its descriptor name.
    pub fn register_class<T: Buildable>(&self) {
        self.register_descriptor(T::descriptor());
    }

    /// Add or replace a class descriptor.
    ///
    /// The class table describes the program's types rather than its
    /// bindings, so it survives [`flush`](Self::flush).
    pub fn register_descriptor(&self, descriptor: ClassDescriptor) {
        #[cfg(feature = "logging")]
        debug!(
            target: "service_container",
            class = descriptor.name(),
            params = descriptor.params().map_or(0, <[Param]>::len),
            lifecycle = ?descriptor.declared_lifecycle(),
            "Registering class descriptor"
        );

        self.inner.classes.register(descriptor);
    }

    #[inline]
    pub fn has_class(&self, name: &str) -> bool {
        self.inner.classes.contains(name)
    }

    // =========================================================================
    // Registration Methods
    // =========================================================================

    /// Register a transient binding: every resolve builds a new object.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use service_container::{Container, Recipe};
    /// use std::sync::Arc;
    ///
    /// struct SystemClock;
    ///
    /// let container = Container::new();
    /// container.bind("clock", Recipe::factory(|_, _| Ok(SystemClock))).unwrap();
    ///
    /// let a = container.make("clock").unwrap();
    /// let b = container.make("clock").unwrap();
    /// assert!(!Arc::ptr_eq(&a, &b));
    /// ```
    pub fn bind(&self, id: &str, recipe: impl Into<Recipe>) -> Result<()> {
        self.register_binding(id, recipe.into(), Lifecycle::Transient)
    }

    /// [`bind`](Self::bind) unless something is already registered under `id`.
    pub fn bind_if_unbound(&self, id: &str, recipe: impl Into<Recipe>) -> Result<()> {
        if !self.bound(id) {
            self.bind(id, recipe)?;
        }
        Ok(())
    }

    /// Register a shared binding: the first resolve is cached and reused.
    pub fn singleton(&self, id: &str, recipe: impl Into<Recipe>) -> Result<()> {
        self.register_binding(id, recipe.into(), Lifecycle::Singleton)
    }

    pub fn singleton_if_unbound(&self, id: &str, recipe: impl Into<Recipe>) -> Result<()> {
        if !self.bound(id) {
            self.singleton(id, recipe)?;
        }
        Ok(())
    }

    /// Register a binding shared within one unit of work. Its instance is
    /// forgotten by [`forget_scoped_instances`](Self::forget_scoped_instances).
    pub fn scoped(&self, id: &str, recipe: impl Into<Recipe>) -> Result<()> {
        self.register_binding(id, recipe.into(), Lifecycle::Scoped)
    }

    pub fn scoped_if_unbound(&self, id: &str, recipe: impl Into<Recipe>) -> Result<()> {
        if !self.bound(id) {
            self.scoped(id, recipe)?;
        }
        Ok(())
    }

    fn register_binding(&self, id: &str, recipe: Recipe, lifecycle: Lifecycle) -> Result<()> {
        self.ensure_unlocked()?;

        #[cfg(feature = "logging")]
        debug!(
            target: "service_container",
            id = id,
            recipe = ?recipe,
            lifecycle = ?lifecycle,
            "Registering binding"
        );

        self.inner.aliases.drop_alias(id);
        self.inner.instances.remove(id);
        if lifecycle == Lifecycle::Scoped {
            self.inner.instances.mark_scoped(id);
        } else {
            self.inner.instances.unmark_scoped(id);
        }
        self.inner
            .bindings
            .insert(id, Binding::new(recipe, lifecycle.is_shared()));

        if self.inner.bindings.was_resolved(id) {
            self.rebound(id)?;
        }
        Ok(())
    }

    /// Register an existing object as the shared instance of `id`.
    ///
    /// If `id` was already bound, rebinding callbacks fire with the new object.
    pub fn instance<T: Injectable>(&self, id: &str, value: T) -> Result<()> {
        self.instance_erased(id, erase(value))
    }

    pub fn instance_erased(&self, id: &str, instance: Instance) -> Result<()> {
        self.ensure_unlocked()?;

        let was_bound = self.bound(id);
        self.inner.aliases.drop_alias(id);
        self.inner.instances.unmark_scoped(id);
        self.inner.instances.insert(
            id,
            CachedInstance {
                instance,
                class: None,
            },
        );

        #[cfg(feature = "logging")]
        debug!(
            target: "service_container",
            id = id,
            rebinding = was_bound,
            "Registering shared instance"
        );

        if was_bound {
            self.rebound(id)?;
        }
        Ok(())
    }

    /// Bind `id` to a factory that always hands out `value`.
    ///
    /// Unlike [`instance`](Self::instance) this registers a binding, so the
    /// value is not cached and extenders run on every resolve.
    pub fn set<T: Injectable>(&self, id: &str, value: T) -> Result<()> {
        let value = erase(value);
        self.bind(
            id,
            Recipe::erased(move |_: &Resolver<'_>, _: &Parameters| Ok(Arc::clone(&value))),
        )
    }

    /// Make `alias` resolve to whatever `id` resolves to.
    pub fn alias(&self, id: &str, alias: &str) -> Result<()> {
        self.ensure_unlocked()?;
        self.inner.aliases.alias(id, alias)?;

        #[cfg(feature = "logging")]
        debug!(
            target: "service_container",
            id = id,
            alias = alias,
            "Registering alias"
        );

        Ok(())
    }

    /// Attach `tag` to each identifier in `ids`.
    pub fn tag<I, S>(&self, ids: I, tag: &str) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ensure_unlocked()?;
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();

        #[cfg(feature = "logging")]
        debug!(
            target: "service_container",
            tag = tag,
            ids = ?ids,
            "Tagging bindings"
        );

        self.inner.bindings.tag(&ids, tag);
        Ok(())
    }

    // =========================================================================
    // Extenders
    // =========================================================================

    /// Decorate every object resolved for `id`.
    ///
    /// Extenders run in registration order. If `id` already has a shared
    /// instance, the extender is applied to it right away instead.
    pub fn extend<F>(&self, id: &str, extender: F) -> Result<()>
    where
        F: Fn(Instance, &Resolver<'_>) -> Result<Instance> + Send + Sync + 'static,
    {
        self.extend_erased(id, Arc::new(extender))
    }

    /// Typed form of [`extend`](Self::extend): the object is downcast to `T`
    /// and the decorator's result replaces it.
    pub fn extend_as<T, R, F>(&self, id: &str, extender: F) -> Result<()>
    where
        T: Injectable,
        R: Injectable,
        F: Fn(Arc<T>, &Resolver<'_>) -> Result<R> + Send + Sync + 'static,
    {
        let key = id.to_string();
        self.extend(id, move |instance, resolver| {
            let typed = downcast::<T>(&key, instance)?;
            extender(typed, resolver).map(erase)
        })
    }

    fn extend_erased(&self, id: &str, extender: ExtenderFn) -> Result<()> {
        self.ensure_unlocked()?;
        let id = self.inner.aliases.canonical(id);

        if let Some(cached) = self.inner.instances.get(&id) {
            #[cfg(feature = "logging")]
            debug!(
                target: "service_container",
                id = %id,
                "Extending shared instance in place"
            );

            let context = self.new_context();
            let extended = extender(cached.instance, &Resolver::new(self, &context))?;
            self.inner.instances.insert(
                &id,
                CachedInstance {
                    instance: extended,
                    class: cached.class,
                },
            );
            self.rebound(&id)?;
        } else {
            #[cfg(feature = "logging")]
            debug!(
                target: "service_container",
                id = %id,
                "Registering extender"
            );

            self.inner.hooks.add_extender(&id, extender);
            if self.resolved(&id) {
                self.rebound(&id)?;
            }
        }
        Ok(())
    }

    /// Drop every pending extender for `id`.
    pub fn erase_extenders(&self, id: &str) {
        let id = self.inner.aliases.canonical(id);
        let _erased = self.inner.hooks.erase_extenders(&id);

        #[cfg(feature = "logging")]
        debug!(
            target: "service_container",
            id = %id,
            erased = _erased,
            "Erased extenders"
        );
    }

    // =========================================================================
    // Contextual Bindings
    // =========================================================================

    /// Start a contextual binding that applies while `target` is being built.
    pub fn when(&self, target: &str) -> ContextualBindingBuilder<'_> {
        self.when_any([target])
    }

    /// Start a contextual binding shared by several build targets.
    pub fn when_any<I, S>(&self, targets: I) -> ContextualBindingBuilder<'_>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let targets = targets
            .into_iter()
            .map(|target| self.inner.aliases.canonical(target.as_ref()))
            .collect();
        ContextualBindingBuilder::new(self, targets)
    }

    /// Register how `need` is produced while `target` is being built.
    pub fn add_contextual_binding(
        &self,
        target: &str,
        need: &str,
        contextual: Contextual,
    ) -> Result<()> {
        self.ensure_unlocked()?;
        let target = self.inner.aliases.canonical(target);
        let need = self.inner.aliases.canonical(need);

        #[cfg(feature = "logging")]
        debug!(
            target: "service_container",
            when = %target,
            needs = %need,
            give = ?contextual,
            "Registering contextual binding"
        );

        self.inner.contextual.insert(target, need, contextual);
        Ok(())
    }

    // =========================================================================
    // Lifecycle Hooks
    // =========================================================================

    /// Run `hook` before every resolution, ahead of the cache lookup.
    pub fn before_resolving<F>(&self, hook: F)
    where
        F: Fn(&str, &Parameters, &Container) + Send + Sync + 'static,
    {
        self.inner
            .hooks
            .add_before_resolving(HookScope::Global, Arc::new(hook));
    }

    /// Run `hook` before resolutions of `id` or of classes implementing it.
    pub fn before_resolving_for<F>(&self, id: &str, hook: F)
    where
        F: Fn(&str, &Parameters, &Container) + Send + Sync + 'static,
    {
        let scope = HookScope::Type(self.inner.aliases.canonical(id));
        self.inner.hooks.add_before_resolving(scope, Arc::new(hook));
    }

    /// Run `hook` with every resolved object.
    pub fn resolving<F>(&self, hook: F)
    where
        F: Fn(&Instance, &Resolver<'_>) + Send + Sync + 'static,
    {
        self.inner.hooks.add_resolving(HookScope::Global, Arc::new(hook));
    }

    pub fn resolving_for<F>(&self, id: &str, hook: F)
    where
        F: Fn(&Instance, &Resolver<'_>) + Send + Sync + 'static,
    {
        let scope = HookScope::Type(self.inner.aliases.canonical(id));
        self.inner.hooks.add_resolving(scope, Arc::new(hook));
    }

    /// Run `hook` with every resolved object, after the resolving hooks.
    pub fn after_resolving<F>(&self, hook: F)
    where
        F: Fn(&Instance, &Resolver<'_>) + Send + Sync + 'static,
    {
        self.inner
            .hooks
            .add_after_resolving(HookScope::Global, Arc::new(hook));
    }

    pub fn after_resolving_for<F>(&self, id: &str, hook: F)
    where
        F: Fn(&Instance, &Resolver<'_>) + Send + Sync + 'static,
    {
        let scope = HookScope::Type(self.inner.aliases.canonical(id));
        self.inner.hooks.add_after_resolving(scope, Arc::new(hook));
    }

    /// Run `callback` whenever a class or parameter carrying the attribute
    /// `name` has been resolved.
    pub fn after_resolving_attribute<F>(&self, name: &str, callback: F)
    where
        F: Fn(&Attribute, &Value, &Resolver<'_>) + Send + Sync + 'static,
    {
        self.inner
            .hooks
            .add_attribute_callback(name, Arc::new(callback));
    }

    /// Resolve parameters carrying the attribute `name` with `handler`.
    pub fn when_has_attribute<F>(&self, name: &str, handler: F)
    where
        F: Fn(&Attribute, &Resolver<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        self.inner
            .hooks
            .set_attribute_handler(name, Arc::new(handler));
    }

    // =========================================================================
    // Rebinding
    // =========================================================================

    /// Run `callback` each time `id` is rebound.
    ///
    /// Returns the current object for `id` when it is already bound.
    pub fn rebinding<F>(&self, id: &str, callback: F) -> Result<Option<Instance>>
    where
        F: Fn(&Container, &Instance) + Send + Sync + 'static,
    {
        let id = self.inner.aliases.canonical(id);
        self.inner.hooks.add_rebound(&id, Arc::new(callback));

        if self.bound(&id) {
            self.make(&id).map(Some)
        } else {
            Ok(None)
        }
    }

    fn rebound(&self, id: &str) -> Result<()> {
        let instance = self.make(id)?;
        let callbacks = self.inner.hooks.rebound_for(id);

        #[cfg(feature = "logging")]
        debug!(
            target: "service_container",
            id = id,
            callbacks = callbacks.len(),
            "Identifier rebound"
        );

        for callback in callbacks {
            callback(self, &instance);
        }
        Ok(())
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Resolve `id`.
    #[inline]
    pub fn make(&self, id: &str) -> Result<Instance> {
        self.make_with(id, Parameters::new())
    }

    /// Resolve `id`, forcing the named constructor parameters in `overrides`.
    ///
    /// A non-empty override map always builds a fresh object and never
    /// touches the shared instance cache.
    pub fn make_with(&self, id: &str, overrides: Parameters) -> Result<Instance> {
        let context = self.new_context();
        self.resolve_in(&context, id, overrides, true)
    }

    /// Resolve `id` and downcast the object to `T`.
    pub fn make_as<T: Injectable>(&self, id: &str) -> Result<Arc<T>> {
        downcast(id, self.make(id)?)
    }

    pub fn make_as_with<T: Injectable>(&self, id: &str, overrides: Parameters) -> Result<Arc<T>> {
        downcast(id, self.make_with(id, overrides)?)
    }

    /// Resolve `id`, reporting [`ContainerError::NotFound`] when nothing is
    /// registered under it.
    ///
    /// Failures of registered identifiers and dependency cycles are returned
    /// unchanged.
    pub fn get(&self, id: &str) -> Result<Instance> {
        self.make(id).map_err(|err| {
            if self.has(id) || matches!(err, ContainerError::CircularDependency { .. }) {
                err
            } else {
                ContainerError::NotFound {
                    id: id.to_string(),
                    source: Box::new(err),
                }
            }
        })
    }

    pub fn get_as<T: Injectable>(&self, id: &str) -> Result<Arc<T>> {
        downcast(id, self.get(id)?)
    }

    /// A closure that resolves `id` each time it is called.
    pub fn factory(&self, id: &str) -> impl Fn() -> Result<Instance> + Send + Sync + 'static {
        let container = self.clone();
        let id = id.to_string();
        move || container.make(&id)
    }

    /// Resolve every identifier tagged with `tag`, in tagging order.
    pub fn tagged(&self, tag: &str) -> Result<Vec<Instance>> {
        let context = self.new_context();
        self.tagged_in(&context, tag)
    }

    pub(crate) fn new_context(&self) -> ResolutionContext {
        ResolutionContext::new(
            self.inner.instances.epoch(),
            self.inner.config.get_max_depth(),
        )
    }

    pub(crate) fn tagged_in(&self, context: &ResolutionContext, tag: &str) -> Result<Vec<Instance>> {
        self.resolve_many(context, &self.inner.bindings.tagged(tag))
    }

    fn resolve_many(&self, context: &ResolutionContext, ids: &[String]) -> Result<Vec<Instance>> {
        ids.iter()
            .map(|id| self.resolve_in(context, id, Parameters::new(), true))
            .collect()
    }

    pub(crate) fn resolve_in(
        &self,
        context: &ResolutionContext,
        id: &str,
        overrides: Parameters,
        raise_events: bool,
    ) -> Result<Instance> {
        self.resolve(context, id, overrides, raise_events)
            .map(|resolved| resolved.instance)
    }

    pub(crate) fn resolve(
        &self,
        context: &ResolutionContext,
        id: &str,
        overrides: Parameters,
        raise_events: bool,
    ) -> Result<Resolved> {
        let id = self.inner.aliases.canonical(id);
        let _resolving = context.enter_resolve(&id)?;
        let resolver = Resolver::new(self, context);

        #[cfg(feature = "logging")]
        trace!(
            target: "service_container",
            id = %id,
            overrides = overrides.len(),
            build_stack = ?context.build_stack(),
            "Resolving"
        );

        if raise_events {
            self.fire_before_resolving(&id, &overrides);
        }

        self.apply_bind_metadata(&id);

        let contextual = self.find_contextual(context, &id);
        if contextual.is_some() {
            context.mark_contextual();
        }
        let needs_contextual_build = !overrides.is_empty() || contextual.is_some();

        if !needs_contextual_build {
            if let Some(hit) = self.cached(&id, &resolver, raise_events) {
                return Ok(hit);
            }
        }

        // First construction of a shared identifier is admitted one caller at
        // a time; the others find the cached object once they get in.
        let build_lock = (!needs_contextual_build && self.is_shared_canonical(&id))
            .then(|| self.inner.instances.build_lock(&id));
        let admission = build_lock
            .as_ref()
            .map(|lock| lock.lock().unwrap_or_else(PoisonError::into_inner));

        if admission.is_some() {
            if let Some(hit) = self.cached(&id, &resolver, raise_events) {
                return Ok(hit);
            }
        }

        let _overrides = context.push_overrides(overrides);

        let Resolved {
            mut instance,
            class,
        } = match contextual {
            Some(contextual) => self.build_contextual(context, &id, contextual)?,
            None => {
                let recipe = self.recipe_for(&id);
                self.build_recipe(context, &id, recipe)?
            }
        };

        for extender in self.inner.hooks.extenders_for(&id) {
            instance = extender(instance, &resolver)?;
        }

        if !needs_contextual_build && self.is_shared_canonical(&id) {
            let cached = CachedInstance {
                instance: Arc::clone(&instance),
                class: class.clone(),
            };

            if self
                .inner
                .instances
                .insert_if_current(&id, cached, context.epoch())
            {
                #[cfg(feature = "logging")]
                debug!(
                    target: "service_container",
                    id = %id,
                    class = class.as_deref(),
                    "Cached shared instance"
                );
            } else {
                #[cfg(feature = "logging")]
                debug!(
                    target: "service_container",
                    id = %id,
                    "Scope ended during resolution, not caching scoped instance"
                );
            }
        }
        drop(admission);

        if raise_events {
            self.fire_resolving(&id, class.as_deref(), &instance, &resolver);
        }

        if !needs_contextual_build {
            self.inner.bindings.mark_resolved(&id);
        }

        Ok(Resolved { instance, class })
    }

    fn cached(&self, id: &str, resolver: &Resolver<'_>, raise_events: bool) -> Option<Resolved> {
        let cached = self.inner.instances.get(id)?;

        #[cfg(feature = "logging")]
        trace!(
            target: "service_container",
            id = id,
            "Resolved from instance cache"
        );

        if raise_events {
            self.fire_resolving(id, cached.class.as_deref(), &cached.instance, resolver);
        }

        Some(Resolved {
            instance: cached.instance,
            class: cached.class,
        })
    }

    /// The registered recipe, or `id` itself.
    fn recipe_for(&self, id: &str) -> Recipe {
        self.inner
            .bindings
            .get(id)
            .map(|binding| binding.recipe)
            .unwrap_or_else(|| Recipe::Concrete(id.to_string()))
    }

    /// Turn the bind metadata declared on an unbound class into a binding.
    /// Each identifier is inspected at most once.
    fn apply_bind_metadata(&self, id: &str) {
        if self.inner.classes.bind_metadata_checked(id) || self.inner.bindings.contains(id) {
            return;
        }

        if let Some(descriptor) = self.inner.classes.get(id) {
            if let Some(concrete) = descriptor.select_bind_target(self.environment()) {
                let lifecycle = descriptor.declared_lifecycle().unwrap_or_default();
                if lifecycle == Lifecycle::Scoped {
                    self.inner.instances.mark_scoped(id);
                }

                let binding = Binding::new(Recipe::concrete(concrete), lifecycle.is_shared());
                if self.inner.bindings.insert_if_absent(id, binding) {
                    #[cfg(feature = "logging")]
                    debug!(
                        target: "service_container",
                        id = id,
                        concrete = concrete,
                        lifecycle = ?lifecycle,
                        environment = self.environment(),
                        "Bound from class metadata"
                    );
                }
            }
        }

        self.inner.classes.mark_bind_metadata_checked(id);
    }

    /// Contextual binding for `id` under the innermost build frame, checking
    /// the aliases of `id` as well.
    fn find_contextual(&self, context: &ResolutionContext, id: &str) -> Option<Contextual> {
        let target = context.top_frame()?;

        self.inner.contextual.get(&target, id).or_else(|| {
            self.inner
                .aliases
                .aliases_of(id)
                .iter()
                .find_map(|alias| self.inner.contextual.get(&target, alias))
        })
    }

    fn build_contextual(
        &self,
        context: &ResolutionContext,
        id: &str,
        contextual: Contextual,
    ) -> Result<Resolved> {
        match contextual {
            Contextual::Concrete(concrete) => {
                self.build_recipe(context, id, Recipe::Concrete(concrete))
            }
            Contextual::Factory(factory) => {
                self.build_recipe(context, id, Recipe::Factory(factory))
            }
            Contextual::Value(Value::Instance(instance)) => Ok(Resolved {
                instance,
                class: None,
            }),
            Contextual::Value(_) | Contextual::Many(_) | Contextual::Tagged(_) => {
                Err(ContainerError::binding_resolution(
                    format!("Contextual binding for [{id}] does not produce a single instance"),
                    context.build_stack(),
                ))
            }
        }
    }

    fn build_recipe(&self, context: &ResolutionContext, id: &str, recipe: Recipe) -> Result<Resolved> {
        match recipe {
            Recipe::Factory(factory) => Ok(Resolved {
                instance: self.build_factory(context, id, &factory)?,
                class: None,
            }),
            Recipe::Concrete(concrete) if concrete == id => self.build_class(context, &concrete),
            // The outer resolve fires the hooks for the redirected object
            Recipe::Concrete(concrete) => {
                self.resolve(context, &concrete, context.current_overrides(), false)
            }
        }
    }

    // =========================================================================
    // Builder
    // =========================================================================

    fn build_factory(
        &self,
        context: &ResolutionContext,
        id: &str,
        factory: &FactoryFn,
    ) -> Result<Instance> {
        let _frame = context.push_frame(id, FrameKind::Factory)?;
        let overrides = context.current_overrides();

        #[cfg(feature = "logging")]
        trace!(
            target: "service_container",
            id = id,
            "Invoking factory"
        );

        factory(&Resolver::new(self, context), &overrides)
    }

    fn build_class(&self, context: &ResolutionContext, name: &str) -> Result<Resolved> {
        let Some(descriptor) = self.inner.classes.get(name) else {
            return Err(ContainerError::unknown(name, context.build_stack()));
        };

        if !descriptor.is_instantiable() {
            return Err(ContainerError::not_instantiable(name, context.build_stack()));
        }

        let arguments = {
            let _frame = context.push_frame(name, FrameKind::Class)?;

            #[cfg(feature = "logging")]
            trace!(
                target: "service_container",
                class = name,
                params = descriptor.params().map_or(0, <[Param]>::len),
                "Building class"
            );

            match descriptor.params() {
                Some(params) => self.resolve_dependencies(context, params, name)?,
                None => Arguments::new(),
            }
        };

        let instance = descriptor
            .construct(&arguments)
            .unwrap_or_else(|| Err(ContainerError::not_instantiable(name, context.build_stack())))?;

        let resolver = Resolver::new(self, context);
        let value = Value::Instance(Arc::clone(&instance));
        self.fire_attribute_callbacks(descriptor.attributes(), &value, &resolver);

        Ok(Resolved {
            instance,
            class: Some(name.to_string()),
        })
    }

    /// Resolve `params` in declaration order against the current override frame.
    pub(crate) fn resolve_dependencies(
        &self,
        context: &ResolutionContext,
        params: &[Param],
        owner: &str,
    ) -> Result<Arguments> {
        let resolver = Resolver::new(self, context);
        let mut arguments = Arguments::new();

        for param in params {
            if let Some(value) = context.override_for(param.name()) {
                arguments.push(param.name(), value);
                continue;
            }

            let value = match self.inner.hooks.contextual_attribute(param.attributes()) {
                Some((attribute, handler)) => handler(attribute, &resolver)?,
                None => match param.kind() {
                    ParamKind::Primitive => self.resolve_primitive(context, param, owner)?,
                    ParamKind::Class(id) => self.resolve_class(context, param, id)?,
                },
            };

            self.fire_attribute_callbacks(param.attributes(), &value, &resolver);
            arguments.push(param.name(), value);
        }

        Ok(arguments)
    }

    fn resolve_primitive(
        &self,
        context: &ResolutionContext,
        param: &Param,
        owner: &str,
    ) -> Result<Value> {
        let need = format!("${}", param.name());
        if let Some(contextual) = self.find_contextual(context, &need) {
            return self.contextual_primitive(context, contextual);
        }

        if let Some(default) = param.default_value() {
            return Ok(default.clone());
        }
        if param.is_variadic() {
            return Ok(Value::List(Vec::new()));
        }
        if param.is_nullable() {
            return Ok(Value::Null);
        }

        Err(ContainerError::unresolvable_primitive(param.name(), owner))
    }

    fn contextual_primitive(&self, context: &ResolutionContext, contextual: Contextual) -> Result<Value> {
        match contextual {
            Contextual::Value(value) => Ok(value),
            // A `$name` need given a plain string receives the string itself
            Contextual::Concrete(literal) => Ok(Value::of(literal)),
            Contextual::Factory(factory) => {
                let overrides = context.current_overrides();
                factory(&Resolver::new(self, context), &overrides).map(Value::Instance)
            }
            Contextual::Many(ids) => self.resolve_many(context, &ids).map(Value::List),
            Contextual::Tagged(tag) => self.tagged_in(context, &tag).map(Value::List),
        }
    }

    fn resolve_class(&self, context: &ResolutionContext, param: &Param, id: &str) -> Result<Value> {
        let canonical = self.inner.aliases.canonical(id);

        if let Some(default) = param.default_value() {
            if !self.bound(id) && self.find_contextual(context, &canonical).is_none() {
                return Ok(default.clone());
            }
        }

        if param.is_nullable() && !self.bound(id) && !self.inner.classes.contains(&canonical) {
            return Ok(Value::Null);
        }

        let result = if param.is_variadic() {
            self.resolve_variadic_class(context, id, &canonical)
        } else {
            self.resolve_in(context, id, Parameters::new(), true)
                .map(Value::Instance)
        };

        match result {
            Err(err) if param.is_variadic() && degrades_to_empty(&err) => {
                #[cfg(feature = "logging")]
                trace!(
                    target: "service_container",
                    param = param.name(),
                    class = id,
                    error = %err,
                    "Variadic dependency unresolvable, using an empty list"
                );

                Ok(Value::List(Vec::new()))
            }
            other => other,
        }
    }

    fn resolve_variadic_class(
        &self,
        context: &ResolutionContext,
        id: &str,
        canonical: &str,
    ) -> Result<Value> {
        match self.find_contextual(context, canonical) {
            Some(Contextual::Many(ids)) => self.resolve_many(context, &ids).map(Value::List),
            Some(Contextual::Tagged(tag)) => self.tagged_in(context, &tag).map(Value::List),
            Some(Contextual::Value(list @ Value::List(_))) => Ok(list),
            _ => self
                .resolve_in(context, id, Parameters::new(), true)
                .map(|instance| Value::List(vec![instance])),
        }
    }

    // =========================================================================
    // Hook Dispatch
    // =========================================================================

    fn fire_before_resolving(&self, id: &str, overrides: &Parameters) {
        let descriptor = self.inner.classes.get(id);
        let hooks = self.inner.hooks.before_resolving_for(|ty| {
            ty == id || descriptor.as_ref().is_some_and(|d| d.is_a(ty))
        });

        for hook in hooks {
            hook(id, overrides, self);
        }
    }

    fn fire_resolving(&self, id: &str, class: Option<&str>, instance: &Instance, resolver: &Resolver<'_>) {
        let descriptor = class
            .and_then(|class| self.inner.classes.get(class))
            .or_else(|| self.inner.classes.get(id));
        let hooks = self.inner.hooks.resolving_for(|ty| {
            ty == id || descriptor.as_ref().is_some_and(|d| d.is_a(ty))
        });

        for hook in hooks {
            hook(instance, resolver);
        }
    }

    fn fire_attribute_callbacks(&self, attributes: &[Attribute], value: &Value, resolver: &Resolver<'_>) {
        for attribute in attributes {
            for callback in self.inner.hooks.attribute_callbacks_for(attribute.name()) {
                callback(attribute, value, resolver);
            }
        }
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Whether `id` is bound, has an instance, or is an alias.
    pub fn bound(&self, id: &str) -> bool {
        self.inner.bindings.contains(id)
            || self.inner.instances.contains(id)
            || self.inner.aliases.is_alias(id)
    }

    /// Same as [`bound`](Self::bound).
    #[inline]
    pub fn has(&self, id: &str) -> bool {
        self.bound(id)
    }

    /// Whether `id` has been resolved or holds an instance.
    pub fn resolved(&self, id: &str) -> bool {
        let id = self.inner.aliases.canonical(id);
        self.inner.bindings.was_resolved(&id) || self.inner.instances.contains(&id)
    }

    /// Whether resolving `id` reuses one object.
    pub fn is_shared(&self, id: &str) -> bool {
        let id = self.inner.aliases.canonical(id);
        self.is_shared_canonical(&id)
    }

    fn is_shared_canonical(&self, id: &str) -> bool {
        if self.inner.instances.contains(id) || self.inner.bindings.is_shared(id) {
            return true;
        }

        match self.inner.classes.lifecycle_of(id) {
            Some(Lifecycle::Scoped) => {
                self.inner.instances.mark_scoped(id);
                true
            }
            Some(Lifecycle::Singleton) => true,
            Some(Lifecycle::Transient) | None => false,
        }
    }

    #[inline]
    pub fn is_alias(&self, name: &str) -> bool {
        self.inner.aliases.is_alias(name)
    }

    /// The canonical identifier `name` resolves to.
    #[inline]
    pub fn get_alias(&self, name: &str) -> String {
        self.inner.aliases.canonical(name)
    }

    /// A snapshot of every registered binding.
    pub fn bindings(&self) -> Vec<(String, Binding)> {
        self.inner.bindings.snapshot()
    }

    /// Number of registered bindings.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.bindings.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // =========================================================================
    // Lifecycle Methods
    // =========================================================================

    /// Remove the binding, instance and resolved flag of `id`, and every
    /// alias pointing at it.
    pub fn remove(&self, id: &str) -> bool {
        self.inner.aliases.drop_alias(id);
        self.inner.aliases.prune_target(id);
        let had_binding = self.inner.bindings.remove(id);
        let had_instance = self.inner.instances.remove(id);
        self.inner.instances.unmark_scoped(id);
        self.inner.bindings.forget_resolved(id);
        self.inner.classes.forget_memo(id);

        #[cfg(feature = "logging")]
        debug!(
            target: "service_container",
            id = id,
            had_binding = had_binding,
            had_instance = had_instance,
            "Removed identifier"
        );

        had_binding || had_instance
    }

    /// Forget the shared instance of `id`; the next resolve builds a new one.
    pub fn forget_instance(&self, id: &str) -> bool {
        let id = self.inner.aliases.canonical(id);
        self.inner.instances.remove(&id)
    }

    /// Forget every shared instance.
    pub fn forget_instances(&self) {
        self.inner.instances.clear_instances();

        #[cfg(feature = "logging")]
        debug!(target: "service_container", "Forgot all shared instances");
    }

    /// End the current unit of work: forget every scoped instance.
    ///
    /// Resolutions already in flight do not write their scoped objects back.
    pub fn forget_scoped_instances(&self) -> usize {
        let forgotten = self.inner.instances.forget_scoped();

        #[cfg(feature = "logging")]
        debug!(
            target: "service_container",
            forgotten = forgotten,
            epoch = self.inner.instances.epoch(),
            "Forgot scoped instances"
        );

        forgotten
    }

    /// Clear all bindings, instances and aliases.
    ///
    /// Class descriptors, hooks, extenders and contextual bindings stay.
    pub fn flush(&self) {
        #[cfg(feature = "logging")]
        debug!(
            target: "service_container",
            bindings_removed = self.inner.bindings.len(),
            "Flushing container"
        );

        self.inner.aliases.clear();
        self.inner.bindings.clear();
        self.inner.instances.clear();
        self.inner.classes.clear_memo();
    }

    /// Lock the container to prevent further registrations.
    ///
    /// Useful for ensuring nothing is registered after application bootstrap.
    /// Resolution keeps working, including bindings discovered from class
    /// metadata.
    #[inline]
    pub fn lock(&self) {
        self.inner.locked.store(true, Ordering::Release);

        #[cfg(feature = "logging")]
        debug!(
            target: "service_container",
            bindings = self.inner.bindings.len(),
            "Container locked - no further registrations allowed"
        );
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.inner.locked.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn ensure_unlocked(&self) -> Result<()> {
        if self.inner.locked.load(Ordering::Relaxed) {
            return Err(ContainerError::Locked);
        }
        Ok(())
    }
}

/// Failures a variadic class dependency turns into an empty list.
fn degrades_to_empty(err: &ContainerError) -> bool {
    matches!(
        err,
        ContainerError::BindingResolution { .. }
            | ContainerError::UnknownIdentifier { .. }
            | ContainerError::UnresolvablePrimitive { .. }
    )
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("bindings", &self.inner.bindings.len())
            .field("instances", &self.inner.instances.len())
            .field("aliases", &self.inner.aliases.len())
            .field("classes", &self.inner.classes.len())
            .field("contextual", &self.inner.contextual.len())
            .field("hooks", &self.inner.hooks.lifecycle_hook_count())
            .field("environment", &self.environment())
            .field("locked", &self.is_locked())
            .finish()
    }
}
