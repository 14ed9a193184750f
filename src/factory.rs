//! Recipes and bindings
//!
//! A [`Recipe`] says how an identifier is produced: either by a factory
//! closure or by building another identifier (usually a concrete class).
//! A [`Binding`] pairs a recipe with the shared flag.

use crate::context::Resolver;
use crate::parameters::{erase, Instance, Parameters};
use crate::{Injectable, Result};
use std::sync::Arc;

/// Type-erased factory function
pub type FactoryFn = Arc<dyn Fn(&Resolver<'_>, &Parameters) -> Result<Instance> + Send + Sync>;

/// How to produce an instance for an identifier.
///
/// Using an enum instead of a trait object keeps the two construction paths
/// visible to the resolution engine, which treats them differently: factories
/// are invoked in place, concretes are resolved (and may redirect again).
#[derive(Clone)]
pub enum Recipe {
    /// Invoke a closure with the resolver and the current override frame
    Factory(FactoryFn),
    /// Build this identifier instead (a class name or another binding)
    Concrete(String),
}

impl Recipe {
    /// A factory producing a fresh `T` on each invocation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use service_container::{Container, Recipe};
    ///
    /// struct SystemClock;
    ///
    /// let container = Container::new();
    /// container.bind("clock", Recipe::factory(|_, _| Ok(SystemClock))).unwrap();
    /// assert!(container.make_as::<SystemClock>("clock").is_ok());
    /// ```
    pub fn factory<T, F>(factory: F) -> Self
    where
        T: Injectable,
        F: Fn(&Resolver<'_>, &Parameters) -> Result<T> + Send + Sync + 'static,
    {
        Recipe::Factory(Arc::new(move |resolver: &Resolver<'_>, params: &Parameters| {
            factory(resolver, params).map(erase)
        }))
    }

    /// A factory that already returns an erased instance (e.g. one it resolved itself).
    pub fn erased<F>(factory: F) -> Self
    where
        F: Fn(&Resolver<'_>, &Parameters) -> Result<Instance> + Send + Sync + 'static,
    {
        Recipe::Factory(Arc::new(factory))
    }

    /// Build `concrete` whenever this identifier is resolved.
    #[inline]
    pub fn concrete(concrete: impl Into<String>) -> Self {
        Recipe::Concrete(concrete.into())
    }

    #[inline]
    pub fn is_factory(&self) -> bool {
        matches!(self, Recipe::Factory(_))
    }

    /// The concrete identifier, when this is not a factory.
    #[inline]
    pub fn as_concrete(&self) -> Option<&str> {
        match self {
            Recipe::Concrete(c) => Some(c),
            Recipe::Factory(_) => None,
        }
    }
}

impl From<&str> for Recipe {
    fn from(concrete: &str) -> Self {
        Recipe::Concrete(concrete.to_string())
    }
}

impl From<String> for Recipe {
    fn from(concrete: String) -> Self {
        Recipe::Concrete(concrete)
    }
}

impl From<&String> for Recipe {
    fn from(concrete: &String) -> Self {
        Recipe::Concrete(concrete.clone())
    }
}

impl std::fmt::Debug for Recipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Recipe::Factory(_) => f.write_str("Factory(..)"),
            Recipe::Concrete(c) => f.debug_tuple("Concrete").field(c).finish(),
        }
    }
}

/// A registered recipe plus its shared flag.
#[derive(Clone, Debug)]
pub struct Binding {
    pub recipe: Recipe,
    pub shared: bool,
}

impl Binding {
    #[inline]
    pub fn new(recipe: Recipe, shared: bool) -> Self {
        Self { recipe, shared }
    }
}
