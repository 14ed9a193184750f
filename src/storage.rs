//! Concurrent registries backing the container
//!
//! Every table is a `DashMap` keyed by identifier with `ahash` hashing.
//! Callers never hold a map guard across user code: values are cloned out
//! (bindings and instances are cheap `Arc` clones) before anything runs.

use crate::factory::Binding;
use crate::parameters::Instance;
use crate::provider::{ClassDescriptor, Lifecycle};
use crate::{ContainerError, Result};
use ahash::RandomState;
use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

fn map<V>() -> DashMap<String, V, RandomState> {
    // 8 shards is plenty for a container with a few hundred bindings
    DashMap::with_capacity_and_hasher_and_shard_amount(0, RandomState::new(), 8)
}

fn set() -> DashSet<String, RandomState> {
    DashSet::with_hasher(RandomState::new())
}

// =============================================================================
// Alias Table
// =============================================================================

/// Name → name redirections plus the reverse index used for cleanup and
/// contextual lookups.
pub(crate) struct AliasTable {
    /// alias → target
    aliases: DashMap<String, String, RandomState>,
    /// target → aliases pointing directly at it
    abstract_aliases: DashMap<String, Vec<String>, RandomState>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self {
            aliases: map(),
            abstract_aliases: map(),
        }
    }

    /// Register `alias → id`. Rejects self-aliases and aliases that would
    /// close a loop.
    pub fn alias(&self, id: &str, alias: &str) -> Result<()> {
        if alias == id || self.canonical(id) == alias {
            return Err(ContainerError::AliasCycle {
                id: alias.to_string(),
            });
        }

        self.drop_alias(alias);
        self.aliases.insert(alias.to_string(), id.to_string());
        self.abstract_aliases
            .entry(id.to_string())
            .or_default()
            .push(alias.to_string());
        Ok(())
    }

    /// Follow the alias chain to its fixed point.
    pub fn canonical(&self, name: &str) -> String {
        let mut current = name.to_string();
        // Registration rejects loops; the bound only protects against a
        // loop created by a concurrent registration race.
        for _ in 0..=self.aliases.len() {
            match self.aliases.get(&current) {
                Some(target) => current = target.value().clone(),
                None => return current,
            }
        }
        current
    }

    #[inline]
    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }

    /// Aliases pointing directly at `id`.
    pub fn aliases_of(&self, id: &str) -> Vec<String> {
        self.abstract_aliases
            .get(id)
            .map(|list| list.value().clone())
            .unwrap_or_default()
    }

    /// Stop treating `name` as an alias.
    pub fn drop_alias(&self, name: &str) {
        if let Some((_, target)) = self.aliases.remove(name) {
            if let Some(mut list) = self.abstract_aliases.get_mut(&target) {
                list.retain(|a| a != name);
            }
        }
    }

    /// Remove every alias that (transitively) points at `id`.
    pub fn prune_target(&self, id: &str) {
        if let Some((_, list)) = self.abstract_aliases.remove(id) {
            for alias in list {
                self.aliases.remove(&alias);
                self.prune_target(&alias);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn clear(&self) {
        self.aliases.clear();
        self.abstract_aliases.clear();
    }
}

// =============================================================================
// Binding Registry
// =============================================================================

/// Recipes, resolved flags and tags.
pub(crate) struct BindingRegistry {
    bindings: DashMap<String, Binding, RandomState>,
    resolved: DashSet<String, RandomState>,
    tags: DashMap<String, Vec<String>, RandomState>,
}

impl BindingRegistry {
    pub fn new() -> Self {
        Self {
            bindings: map(),
            resolved: set(),
            tags: map(),
        }
    }

    #[inline]
    pub fn insert(&self, id: &str, binding: Binding) {
        self.bindings.insert(id.to_string(), binding);
    }

    /// Store `binding` unless `id` already has one. Returns whether it was stored.
    pub fn insert_if_absent(&self, id: &str, binding: Binding) -> bool {
        match self.bindings.entry(id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(binding);
                true
            }
        }
    }

    #[inline]
    pub fn get(&self, id: &str) -> Option<Binding> {
        self.bindings.get(id).map(|b| b.value().clone())
    }

    #[inline]
    pub fn contains(&self, id: &str) -> bool {
        self.bindings.contains_key(id)
    }

    #[inline]
    pub fn remove(&self, id: &str) -> bool {
        self.bindings.remove(id).is_some()
    }

    #[inline]
    pub fn is_shared(&self, id: &str) -> bool {
        self.bindings.get(id).is_some_and(|b| b.shared)
    }

    pub fn snapshot(&self) -> Vec<(String, Binding)> {
        self.bindings
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[inline]
    pub fn mark_resolved(&self, id: &str) {
        self.resolved.insert(id.to_string());
    }

    #[inline]
    pub fn was_resolved(&self, id: &str) -> bool {
        self.resolved.contains(id)
    }

    #[inline]
    pub fn forget_resolved(&self, id: &str) {
        self.resolved.remove(id);
    }

    pub fn tag(&self, ids: &[String], tag: &str) {
        let mut entry = self.tags.entry(tag.to_string()).or_default();
        for id in ids {
            if !entry.contains(id) {
                entry.push(id.clone());
            }
        }
    }

    pub fn tagged(&self, tag: &str) -> Vec<String> {
        self.tags
            .get(tag)
            .map(|ids| ids.value().clone())
            .unwrap_or_default()
    }

    /// Drop bindings and resolved flags. Tags survive, matching a flush that
    /// only resets what was built.
    pub fn clear(&self) {
        self.bindings.clear();
        self.resolved.clear();
    }
}

// =============================================================================
// Instance Cache
// =============================================================================

/// A realized shared object.
#[derive(Clone)]
pub(crate) struct CachedInstance {
    pub instance: Instance,
    /// Class the instance was built from, when the builder knows it
    pub class: Option<String>,
}

/// Shared (singleton and scoped) instances.
pub(crate) struct InstanceCache {
    instances: DashMap<String, CachedInstance, RandomState>,
    scoped: DashSet<String, RandomState>,
    /// One admission lock per identifier for first construction
    build_locks: DashMap<String, Arc<Mutex<()>>, RandomState>,
    /// Bumped every time scoped instances are forgotten
    epoch: AtomicU64,
    /// Held shared by epoch-checked inserts and exclusively by scope ends
    scope_barrier: RwLock<()>,
}

impl InstanceCache {
    pub fn new() -> Self {
        Self {
            instances: map(),
            scoped: set(),
            build_locks: map(),
            epoch: AtomicU64::new(0),
            scope_barrier: RwLock::new(()),
        }
    }

    #[inline]
    pub fn get(&self, id: &str) -> Option<CachedInstance> {
        self.instances.get(id).map(|c| c.value().clone())
    }

    #[inline]
    pub fn contains(&self, id: &str) -> bool {
        self.instances.contains_key(id)
    }

    #[inline]
    pub fn insert(&self, id: &str, cached: CachedInstance) {
        self.instances.insert(id.to_string(), cached);
    }

    /// Store `cached` unless `id` is scoped and the scope ended after
    /// `epoch` was observed.
    pub fn insert_if_current(&self, id: &str, cached: CachedInstance, epoch: u64) -> bool {
        let _barrier = self.scope_barrier.read().unwrap_or_else(PoisonError::into_inner);
        if self.scoped.contains(id) && self.epoch() != epoch {
            return false;
        }
        self.insert(id, cached);
        true
    }

    #[inline]
    pub fn remove(&self, id: &str) -> bool {
        self.instances.remove(id).is_some()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    #[inline]
    pub fn mark_scoped(&self, id: &str) {
        self.scoped.insert(id.to_string());
    }

    #[inline]
    pub fn unmark_scoped(&self, id: &str) {
        self.scoped.remove(id);
    }

    #[inline]
    pub fn is_scoped(&self, id: &str) -> bool {
        self.scoped.contains(id)
    }

    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Forget every scoped instance and start a new scope epoch.
    pub fn forget_scoped(&self) -> usize {
        let _barrier = self.scope_barrier.write().unwrap_or_else(PoisonError::into_inner);
        self.epoch.fetch_add(1, Ordering::AcqRel);
        let ids: Vec<String> = self.scoped.iter().map(|id| id.key().clone()).collect();
        ids.iter().filter(|id| self.instances.remove(*id).is_some()).count()
    }

    /// Admission lock for building `id` for the first time.
    pub fn build_lock(&self, id: &str) -> Arc<Mutex<()>> {
        Arc::clone(self.build_locks.entry(id.to_string()).or_default().value())
    }

    /// Forget all instances and the scoped set.
    pub fn clear(&self) {
        let _barrier = self.scope_barrier.write().unwrap_or_else(PoisonError::into_inner);
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.instances.clear();
        self.scoped.clear();
        self.build_locks.clear();
    }

    /// Forget all instances but keep the scoped set.
    pub fn clear_instances(&self) {
        self.instances.clear();
    }
}

// =============================================================================
// Class Table
// =============================================================================

/// Registered class descriptors plus the memoized metadata lookups.
pub(crate) struct ClassTable {
    classes: DashMap<String, Arc<ClassDescriptor>, RandomState>,
    checked_bind_metadata: DashSet<String, RandomState>,
    checked_lifecycle: DashMap<String, Option<Lifecycle>, RandomState>,
}

impl ClassTable {
    pub fn new() -> Self {
        Self {
            classes: map(),
            checked_bind_metadata: set(),
            checked_lifecycle: map(),
        }
    }

    pub fn register(&self, descriptor: ClassDescriptor) {
        let name = descriptor.name().to_string();
        self.checked_bind_metadata.remove(&name);
        self.checked_lifecycle.remove(&name);
        self.classes.insert(name, Arc::new(descriptor));
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<Arc<ClassDescriptor>> {
        self.classes.get(name).map(|c| Arc::clone(c.value()))
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    #[inline]
    pub fn bind_metadata_checked(&self, id: &str) -> bool {
        self.checked_bind_metadata.contains(id)
    }

    #[inline]
    pub fn mark_bind_metadata_checked(&self, id: &str) {
        self.checked_bind_metadata.insert(id.to_string());
    }

    /// Declared lifecycle of `id`, inspected at most once.
    pub fn lifecycle_of(&self, id: &str) -> Option<Lifecycle> {
        if let Some(memo) = self.checked_lifecycle.get(id) {
            return *memo.value();
        }
        let lifecycle = self.get(id).and_then(|c| c.declared_lifecycle());
        self.checked_lifecycle.insert(id.to_string(), lifecycle);
        lifecycle
    }

    /// Forget what was learned about `id`.
    pub fn forget_memo(&self, id: &str) {
        self.checked_bind_metadata.remove(id);
        self.checked_lifecycle.remove(id);
    }

    /// Forget the memoized lookups; the descriptors themselves stay.
    pub fn clear_memo(&self) {
        self.checked_bind_metadata.clear();
        self.checked_lifecycle.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::Recipe;

    #[test]
    fn test_alias_chain_resolves_to_fixed_point() {
        let aliases = AliasTable::new();
        aliases.alias("cache.store", "cache").unwrap();
        aliases.alias("cache", "store").unwrap();

        assert_eq!(aliases.canonical("store"), "cache.store");
        assert_eq!(aliases.canonical("cache"), "cache.store");
        assert_eq!(aliases.canonical("cache.store"), "cache.store");
        assert_eq!(aliases.aliases_of("cache.store"), ["cache"]);
    }

    #[test]
    fn test_alias_rejects_self_and_loops() {
        let aliases = AliasTable::new();
        assert!(matches!(
            aliases.alias("log", "log"),
            Err(ContainerError::AliasCycle { .. })
        ));

        aliases.alias("a", "b").unwrap();
        assert!(aliases.alias("b", "a").is_err());
        assert_eq!(aliases.len(), 1);
    }

    #[test]
    fn test_prune_target_removes_dependent_aliases() {
        let aliases = AliasTable::new();
        aliases.alias("db", "database").unwrap();
        aliases.alias("database", "conn").unwrap();
        aliases.alias("queue", "jobs").unwrap();

        aliases.prune_target("db");

        assert!(!aliases.is_alias("database"));
        assert!(!aliases.is_alias("conn"));
        assert!(aliases.is_alias("jobs"));
    }

    #[test]
    fn test_drop_alias_updates_reverse_index() {
        let aliases = AliasTable::new();
        aliases.alias("db", "database").unwrap();
        aliases.drop_alias("database");

        assert!(!aliases.is_alias("database"));
        assert!(aliases.aliases_of("db").is_empty());
    }

    #[test]
    fn test_binding_registry_tags() {
        let registry = BindingRegistry::new();
        registry.insert("cpu", Binding::new(Recipe::concrete("CpuReport"), false));
        registry.tag(&["cpu".into(), "memory".into()], "reports");
        registry.tag(&["cpu".into()], "reports");

        assert_eq!(registry.tagged("reports"), ["cpu", "memory"]);
        assert!(registry.tagged("missing").is_empty());
        assert!(!registry.is_shared("cpu"));
    }

    #[test]
    fn test_forget_scoped_bumps_epoch_and_keeps_singletons() {
        let cache = InstanceCache::new();
        let cached = CachedInstance {
            instance: Arc::new(1u8),
            class: None,
        };
        cache.mark_scoped("request");
        cache.insert("request", cached.clone());
        cache.insert("config", cached.clone());

        let before = cache.epoch();
        assert_eq!(cache.forget_scoped(), 1);
        assert!(!cache.contains("request"));
        assert!(cache.contains("config"));

        // A resolution that started before the scope ended must not write back
        assert!(!cache.insert_if_current("request", cached.clone(), before));
        assert!(cache.insert_if_current("request", cached, cache.epoch()));
    }

    #[test]
    fn test_scope_end_never_interleaves_with_a_stale_insert() {
        use std::thread;

        let cache = Arc::new(InstanceCache::new());
        cache.mark_scoped("request");

        thread::scope(|s| {
            for _ in 0..4 {
                let cache = Arc::clone(&cache);
                s.spawn(move || {
                    for _ in 0..2_000 {
                        let epoch = cache.epoch();
                        let cached = CachedInstance {
                            instance: Arc::new(epoch),
                            class: None,
                        };
                        cache.insert_if_current("request", cached, epoch);
                    }
                });
            }
            let ender = Arc::clone(&cache);
            s.spawn(move || {
                for _ in 0..500 {
                    ender.forget_scoped();
                }
            });
        });

        // Whatever survived was built in the epoch that is current now
        if let Some(cached) = cache.get("request") {
            let built_in = cached.instance.downcast_ref::<u64>().copied();
            assert_eq!(built_in, Some(cache.epoch()));
        }
    }

    #[test]
    fn test_unmark_scoped() {
        let cache = InstanceCache::new();
        cache.mark_scoped("request");
        cache.unmark_scoped("request");
        cache.insert(
            "request",
            CachedInstance {
                instance: Arc::new(1u8),
                class: None,
            },
        );
        assert_eq!(cache.forget_scoped(), 0);
        assert!(cache.contains("request"));
    }

    #[test]
    fn test_lifecycle_is_memoized() {
        let classes = ClassTable::new();
        classes.register(ClassDescriptor::new("Clock").singleton());

        assert_eq!(classes.lifecycle_of("Clock"), Some(Lifecycle::Singleton));
        assert_eq!(classes.lifecycle_of("Unknown"), None);
        assert!(!classes.bind_metadata_checked("Clock"));
        classes.mark_bind_metadata_checked("Clock");
        assert!(classes.bind_metadata_checked("Clock"));

        classes.forget_memo("Clock");
        assert!(!classes.bind_metadata_checked("Clock"));
        classes.mark_bind_metadata_checked("Clock");

        // Re-registering a class forgets what was learned about it
        classes.register(ClassDescriptor::new("Clock"));
        assert!(!classes.bind_metadata_checked("Clock"));
        assert_eq!(classes.lifecycle_of("Clock"), None);
    }

    #[test]
    fn test_build_lock_is_shared_per_id() {
        let cache = InstanceCache::new();
        let a = cache.build_lock("db");
        let b = cache.build_lock("db");
        assert!(Arc::ptr_eq(&a, &b));
    }
}
