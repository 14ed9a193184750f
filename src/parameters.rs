//! Parameter values, override frames and resolved argument sets
//!
//! `Parameters` is what a caller hands to `make_with`/`call` to force the
//! value of named parameters. `Arguments` is what a constructor or method
//! receives once every parameter has been resolved.

use crate::{ContainerError, Injectable, Result};
use ahash::RandomState;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// A type-erased object produced or stored by the container.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Wrap a value into an [`Instance`].
#[inline]
pub fn erase<T: Injectable>(value: T) -> Instance {
    Arc::new(value) as Instance
}

/// Downcast an [`Instance`] to `Arc<T>`, reporting `id` on mismatch.
#[inline]
pub fn downcast<T: Injectable>(id: &str, instance: Instance) -> Result<Arc<T>> {
    instance
        .downcast::<T>()
        .map_err(|_| ContainerError::type_mismatch::<T>(id))
}

/// A resolved parameter value.
#[derive(Clone)]
pub enum Value {
    /// A single object
    Instance(Instance),
    /// The nullable case: nothing was resolved and the parameter accepts that
    Null,
    /// The variadic case: zero or more objects
    List(Vec<Instance>),
}

impl Value {
    /// Wrap a concrete value.
    #[inline]
    pub fn of<T: Injectable>(value: T) -> Self {
        Value::Instance(erase(value))
    }

    /// Wrap a list of concrete values.
    pub fn list_of<T: Injectable>(values: impl IntoIterator<Item = T>) -> Self {
        Value::List(values.into_iter().map(erase).collect())
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The single instance held by this value, if any.
    #[inline]
    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Value::Instance(instance) => Some(instance),
            _ => None,
        }
    }

    /// Downcast a single-instance value.
    pub fn downcast<T: Injectable>(&self, name: &str) -> Result<Arc<T>> {
        match self {
            Value::Instance(instance) => downcast(name, Arc::clone(instance)),
            _ => Err(ContainerError::type_mismatch::<T>(name)),
        }
    }
}

impl From<Instance> for Value {
    fn from(instance: Instance) -> Self {
        Value::Instance(instance)
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Instance(_) => f.write_str("Instance(..)"),
            Value::Null => f.write_str("Null"),
            Value::List(items) => write!(f, "List(len = {})", items.len()),
        }
    }
}

/// Caller-supplied named arguments for a single resolution.
///
/// # Examples
///
/// ```rust
/// use service_container::Parameters;
///
/// let overrides = Parameters::new()
///     .with("name", "Ada".to_string())
///     .with("retries", 3u32);
///
/// assert_eq!(overrides.len(), 2);
/// assert!(overrides.contains("name"));
/// ```
#[derive(Clone, Default)]
pub struct Parameters {
    values: HashMap<String, Value, RandomState>,
}

impl Parameters {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a concrete value under `name`.
    #[inline]
    pub fn with<T: Injectable>(self, name: impl Into<String>, value: T) -> Self {
        self.with_value(name, Value::of(value))
    }

    /// Add an already type-erased instance under `name`.
    #[inline]
    pub fn with_instance(self, name: impl Into<String>, instance: Instance) -> Self {
        self.with_value(name, Value::Instance(instance))
    }

    /// Add a raw [`Value`] under `name`.
    #[inline]
    pub fn with_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    #[inline]
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    #[inline]
    pub(crate) fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub(crate) fn into_values(self) -> impl Iterator<Item = (String, Value)> {
        self.values.into_iter()
    }

    /// Downcast the value stored under `name`.
    pub fn get_as<T: Injectable>(&self, name: &str) -> Result<Arc<T>> {
        self.get(name)
            .ok_or_else(|| ContainerError::MissingArgument {
                name: name.to_string(),
            })?
            .downcast::<T>(name)
    }
}

impl std::fmt::Debug for Parameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.values.iter()).finish()
    }
}

/// The resolved arguments handed to a constructor or method, in declaration order.
///
/// Overrides that did not match a declared parameter of a method call are kept
/// aside and available through [`Arguments::extra`].
#[derive(Clone, Default)]
pub struct Arguments {
    values: Vec<(String, Value)>,
    extra: Vec<(String, Value)>,
}

impl Arguments {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn push(&mut self, name: impl Into<String>, value: Value) {
        self.values.push((name.into(), value));
    }

    #[inline]
    pub(crate) fn push_extra(&mut self, name: impl Into<String>, value: Value) {
        self.extra.push((name.into(), value));
    }

    /// The raw value resolved for `name`.
    pub fn raw(&self, name: &str) -> Result<&Value> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| ContainerError::MissingArgument {
                name: name.to_string(),
            })
    }

    /// A required object argument.
    pub fn get<T: Injectable>(&self, name: &str) -> Result<Arc<T>> {
        self.raw(name)?.downcast::<T>(name)
    }

    /// A required argument cloned out of its shared instance.
    pub fn value<T: Injectable + Clone>(&self, name: &str) -> Result<T> {
        self.get::<T>(name).map(|arc| (*arc).clone())
    }

    /// A nullable object argument.
    pub fn optional<T: Injectable>(&self, name: &str) -> Result<Option<Arc<T>>> {
        match self.raw(name)? {
            Value::Null => Ok(None),
            value => value.downcast::<T>(name).map(Some),
        }
    }

    /// A nullable argument cloned out of its shared instance.
    pub fn optional_value<T: Injectable + Clone>(&self, name: &str) -> Result<Option<T>> {
        Ok(self.optional::<T>(name)?.map(|arc| (*arc).clone()))
    }

    /// A variadic argument. A single instance counts as a one-element list.
    pub fn list<T: Injectable>(&self, name: &str) -> Result<Vec<Arc<T>>> {
        match self.raw(name)? {
            Value::List(items) => items
                .iter()
                .map(|item| downcast(name, Arc::clone(item)))
                .collect(),
            Value::Instance(instance) => Ok(vec![downcast(name, Arc::clone(instance))?]),
            Value::Null => Ok(Vec::new()),
        }
    }

    /// Overrides passed to a method call that matched no declared parameter.
    #[inline]
    pub fn extra(&self) -> &[(String, Value)] {
        &self.extra
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(n, _)| n.as_str())
    }
}

impl std::fmt::Debug for Arguments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arguments")
            .field("values", &self.values)
            .field("extra", &self.extra.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Port(u16);

    #[test]
    fn test_parameters_builder() {
        let params = Parameters::new().with("port", Port(8080)).with_value("tls", Value::Null);

        assert_eq!(params.len(), 2);
        assert_eq!(*params.get_as::<Port>("port").unwrap(), Port(8080));
        assert!(params.get("tls").unwrap().is_null());
        assert!(params.get_as::<String>("port").is_err());
    }

    #[test]
    fn test_arguments_typed_getters() {
        let mut args = Arguments::new();
        args.push("port", Value::of(Port(80)));
        args.push("fallback", Value::Null);
        args.push("mirrors", Value::list_of([Port(1), Port(2)]));

        assert_eq!(args.value::<Port>("port").unwrap(), Port(80));
        assert!(args.optional::<Port>("fallback").unwrap().is_none());
        assert_eq!(args.list::<Port>("mirrors").unwrap().len(), 2);
        assert_eq!(args.list::<Port>("port").unwrap().len(), 1);
    }

    #[test]
    fn test_arguments_missing_and_mismatch() {
        let mut args = Arguments::new();
        args.push("port", Value::of(Port(80)));

        assert!(matches!(
            args.get::<Port>("host"),
            Err(ContainerError::MissingArgument { .. })
        ));
        assert!(matches!(
            args.get::<String>("port"),
            Err(ContainerError::TypeMismatch { .. })
        ));
    }
}
