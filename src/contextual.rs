//! Contextual bindings
//!
//! A contextual binding replaces how a dependency is produced, but only
//! while a particular target is being built:
//!
//! ```rust
//! use service_container::{ClassDescriptor, Container, Param};
//!
//! struct Greeter {
//!     name: String,
//! }
//!
//! let container = Container::new();
//! container.register_descriptor(
//!     ClassDescriptor::new("Greeter")
//!         .param(Param::primitive("name"))
//!         .constructor(|args| Ok(Greeter { name: args.value::<String>("name")? })),
//! );
//!
//! container.when("Greeter").needs("$name").give_value("Ada".to_string()).unwrap();
//!
//! let greeter = container.make_as::<Greeter>("Greeter").unwrap();
//! assert_eq!(greeter.name, "Ada");
//! ```

use crate::factory::FactoryFn;
use crate::parameters::{erase, Instance, Parameters, Value};
use crate::{Container, Injectable, Resolver, Result};
use ahash::RandomState;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

/// What a contextual binding hands out.
#[derive(Clone)]
pub enum Contextual {
    /// Resolve this identifier instead
    Concrete(String),
    /// Use this value as-is
    Value(Value),
    /// Invoke this factory
    Factory(FactoryFn),
    /// Resolve each identifier (for variadic needs)
    Many(Vec<String>),
    /// Resolve every identifier carrying the tag (for variadic needs)
    Tagged(String),
}

impl Contextual {
    /// Whether this binding produces a list rather than a single value.
    #[inline]
    pub fn is_many(&self) -> bool {
        matches!(self, Contextual::Many(_) | Contextual::Tagged(_))
    }
}

impl std::fmt::Debug for Contextual {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Contextual::Concrete(id) => f.debug_tuple("Concrete").field(id).finish(),
            Contextual::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Contextual::Factory(_) => f.write_str("Factory(..)"),
            Contextual::Many(ids) => f.debug_tuple("Many").field(ids).finish(),
            Contextual::Tagged(tag) => f.debug_tuple("Tagged").field(tag).finish(),
        }
    }
}

/// build target → (need → contextual binding)
pub(crate) struct ContextualMap {
    map: DashMap<String, HashMap<String, Contextual, RandomState>, RandomState>,
}

impl ContextualMap {
    pub fn new() -> Self {
        Self {
            map: DashMap::with_hasher(RandomState::new()),
        }
    }

    pub fn insert(&self, target: String, need: String, contextual: Contextual) {
        self.map.entry(target).or_default().insert(need, contextual);
    }

    pub fn get(&self, target: &str, need: &str) -> Option<Contextual> {
        self.map
            .get(target)
            .and_then(|needs| needs.get(need).cloned())
    }

    pub fn len(&self) -> usize {
        self.map.iter().map(|needs| needs.len()).sum()
    }
}

/// First half of `when(..).needs(..).give(..)`.
#[must_use = "a contextual binding does nothing until `needs(..).give(..)` is called"]
pub struct ContextualBindingBuilder<'a> {
    container: &'a Container,
    targets: Vec<String>,
}

impl<'a> ContextualBindingBuilder<'a> {
    pub(crate) fn new(container: &'a Container, targets: Vec<String>) -> Self {
        Self { container, targets }
    }

    /// The dependency to replace: an identifier, or `$name` for a primitive
    /// parameter.
    pub fn needs(self, need: impl Into<String>) -> ContextualNeed<'a> {
        ContextualNeed {
            container: self.container,
            targets: self.targets,
            need: need.into(),
        }
    }
}

/// Second half of `when(..).needs(..).give(..)`.
#[must_use = "a contextual binding does nothing until `give(..)` is called"]
pub struct ContextualNeed<'a> {
    container: &'a Container,
    targets: Vec<String>,
    need: String,
}

impl ContextualNeed<'_> {
    /// Resolve `id` in place of the need.
    ///
    /// For a `$name` need there is nothing to resolve, so the parameter
    /// receives `id` itself as a `String`.
    pub fn give(self, id: impl Into<String>) -> Result<()> {
        self.give_contextual(Contextual::Concrete(id.into()))
    }

    /// Hand out `value` in place of the need.
    pub fn give_value<T: Injectable>(self, value: T) -> Result<()> {
        self.give_contextual(Contextual::Value(Value::of(value)))
    }

    /// Hand out an existing instance in place of the need.
    pub fn give_instance(self, instance: Instance) -> Result<()> {
        self.give_contextual(Contextual::Value(Value::Instance(instance)))
    }

    /// Invoke `factory` each time the need is resolved.
    pub fn give_factory<T, F>(self, factory: F) -> Result<()>
    where
        T: Injectable,
        F: Fn(&Resolver<'_>, &Parameters) -> Result<T> + Send + Sync + 'static,
    {
        let factory: FactoryFn =
            Arc::new(move |resolver: &Resolver<'_>, params: &Parameters| {
                factory(resolver, params).map(erase)
            });
        self.give_contextual(Contextual::Factory(factory))
    }

    /// Resolve each of `ids` for a variadic need.
    pub fn give_many<I, S>(self, ids: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids = ids.into_iter().map(Into::into).collect();
        self.give_contextual(Contextual::Many(ids))
    }

    /// Resolve everything tagged `tag` for a variadic need.
    pub fn give_tagged(self, tag: impl Into<String>) -> Result<()> {
        self.give_contextual(Contextual::Tagged(tag.into()))
    }

    pub fn give_contextual(self, contextual: Contextual) -> Result<()> {
        for target in &self.targets {
            self.container
                .add_contextual_binding(target, &self.need, contextual.clone())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_lookup_is_per_target() {
        let map = ContextualMap::new();
        map.insert("Mailer".into(), "$host".into(), Contextual::Value(Value::of("smtp")));
        map.insert("Mailer".into(), "Logger".into(), Contextual::Concrete("FileLogger".into()));

        assert!(matches!(map.get("Mailer", "$host"), Some(Contextual::Value(_))));
        assert!(matches!(
            map.get("Mailer", "Logger"),
            Some(Contextual::Concrete(ref c)) if c == "FileLogger"
        ));
        assert!(map.get("Queue", "$host").is_none());
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_is_many() {
        assert!(Contextual::Many(vec![]).is_many());
        assert!(Contextual::Tagged("reports".into()).is_many());
        assert!(!Contextual::Concrete("X".into()).is_many());
    }
}
