//! # Service Container - Binding Resolution for Rust
//!
//! An inversion-of-control container that maps string identifiers to recipes
//! and builds object graphs on demand.
//!
//! ## Features
//!
//! - 🔗 **Bindings** - transient, singleton and scoped recipes under any identifier
//! - 🏷️ **Aliases and tags** - alternate names and named groups of identifiers
//! - 🎯 **Contextual bindings** - "when building X, give Y for Z"
//! - 🧩 **Extenders** - decorate objects after construction, in registration order
//! - 🪝 **Lifecycle hooks** - before, resolving and after callbacks, global or type-scoped
//! - 📞 **Method injection** - `call("Class@method")` resolves method parameters
//! - 🧵 **Thread-safe** - `DashMap` registries, request-local build state, single-flight singletons
//! - 📊 **Observable** - optional tracing integration with JSON or pretty output
//!
//! ## Quick Start
//!
//! ```rust
//! use service_container::{ClassDescriptor, Container, Param, Recipe};
//! use std::sync::Arc;
//!
//! struct ConsoleLogger;
//!
//! struct Greeter {
//!     name: String,
//! }
//!
//! let container = Container::new();
//!
//! // Shared: one object for the life of the container
//! container.singleton("logger", Recipe::factory(|_, _| Ok(ConsoleLogger))).unwrap();
//! let a = container.make("logger").unwrap();
//! let b = container.make("logger").unwrap();
//! assert!(Arc::ptr_eq(&a, &b));
//!
//! // Classes describe their constructor; primitives come from context
//! container.register_descriptor(
//!     ClassDescriptor::new("Greeter")
//!         .param(Param::primitive("name"))
//!         .constructor(|args| Ok(Greeter { name: args.value::<String>("name")? })),
//! );
//! container.when("Greeter").needs("$name").give("Ada").unwrap();
//!
//! let greeter = container.make_as::<Greeter>("Greeter").unwrap();
//! assert_eq!(greeter.name, "Ada");
//! ```
//!
//! ## Lifetimes
//!
//! ```rust
//! use service_container::{Container, Recipe};
//! use std::sync::Arc;
//!
//! struct Clock;
//! struct RequestContext;
//!
//! let container = Container::new();
//!
//! // Transient - new object on every resolve
//! container.bind("clock", Recipe::factory(|_, _| Ok(Clock))).unwrap();
//! assert!(!Arc::ptr_eq(&container.make("clock").unwrap(), &container.make("clock").unwrap()));
//!
//! // Scoped - shared until the unit of work ends
//! container.scoped("request", Recipe::factory(|_, _| Ok(RequestContext))).unwrap();
//! let scope = container.begin_scope();
//! let first = scope.make("request").unwrap();
//! assert!(Arc::ptr_eq(&first, &scope.make("request").unwrap()));
//! drop(scope);
//! assert!(!Arc::ptr_eq(&first, &container.make("request").unwrap()));
//! ```
//!
//! ## Performance
//!
//! - **Lock-free reads**: `DashMap` registries keyed with `AHash`
//! - **No global build state**: each resolution carries its own context, so
//!   concurrent resolutions never serialize on a shared stack
//! - **Single-flight**: a shared identifier is constructed once even when many
//!   threads ask for it at the same time

mod call;
mod config;
mod container;
mod context;
mod contextual;
mod error;
mod factory;
mod global;
mod hooks;
#[cfg(feature = "logging")]
pub mod logging;
mod parameters;
mod provider;
mod scope;
mod storage;

pub use call::CallTarget;
pub use config::{ContainerConfig, DEFAULT_MAX_DEPTH, ENVIRONMENT_VAR, MAX_DEPTH_VAR};
pub use container::Container;
pub use context::Resolver;
pub use contextual::{Contextual, ContextualBindingBuilder, ContextualNeed};
pub use error::{ContainerError, Result};
pub use factory::{Binding, FactoryFn, Recipe};
pub use hooks::{
    AttributeCallbackFn, AttributeHandlerFn, BeforeResolvingFn, ExtenderFn, HookScope,
    MethodBindingFn, ReboundFn, ResolvingFn,
};
pub use parameters::{downcast, erase, Arguments, Instance, Parameters, Value};
pub use provider::{
    Attribute, BindTarget, Buildable, ClassDescriptor, ConstructFn, FunctionDescriptor,
    Injectable, Lifecycle, MethodDescriptor, MethodFn, Param, ParamKind,
};
pub use scope::{Scope, ScopeGuard};

/// Derive [`Buildable`] from a struct definition.
#[cfg(feature = "derive")]
pub use service_container_derive::Buildable;

// Re-export tracing macros for convenience when logging feature is enabled
#[cfg(feature = "logging")]
pub use tracing::{debug, error, info, trace, warn};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Arguments, Buildable, ClassDescriptor, Container, ContainerError, Instance, Param,
        Parameters, Recipe, Resolver, Result, Value,
    };
    pub use std::sync::Arc;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct ConsoleLogger;

    struct Clock(u32);

    struct Greeter {
        name: String,
    }

    #[test]
    fn test_singleton_logger() {
        let container = Container::new();
        container
            .singleton("Logger", Recipe::factory(|_, _| Ok(ConsoleLogger)))
            .unwrap();

        let a = container.make("Logger").unwrap();
        let b = container.make("Logger").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(container.is_shared("Logger"));
    }

    #[test]
    fn test_transient_clock() {
        static TICKS: AtomicU32 = AtomicU32::new(0);

        let container = Container::new();
        container
            .bind(
                "Clock",
                Recipe::factory(|_, _| Ok(Clock(TICKS.fetch_add(1, Ordering::SeqCst)))),
            )
            .unwrap();

        let a = container.make_as::<Clock>("Clock").unwrap();
        let b = container.make_as::<Clock>("Clock").unwrap();
        assert_ne!(a.0, b.0);
    }

    #[test]
    fn test_contextual_primitive() {
        let container = Container::new();
        container.register_descriptor(
            ClassDescriptor::new("Greeter")
                .param(Param::primitive("name"))
                .constructor(|args| Ok(Greeter { name: args.value::<String>("name")? })),
        );
        container
            .when("Greeter")
            .needs("$name")
            .give_value("Ada".to_string())
            .unwrap();

        let greeter = container.make_as::<Greeter>("Greeter").unwrap();
        assert_eq!(greeter.name, "Ada");
    }

    #[test]
    fn test_missing_primitive_is_reported() {
        let container = Container::new();
        container.register_descriptor(
            ClassDescriptor::new("Greeter")
                .param(Param::primitive("name"))
                .constructor(|args| Ok(Greeter { name: args.value::<String>("name")? })),
        );

        match container.make("Greeter") {
            Err(ContainerError::UnresolvablePrimitive { parameter, class }) => {
                assert_eq!(parameter, "name");
                assert_eq!(class, "Greeter");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected an unresolvable primitive"),
        }
    }
}
