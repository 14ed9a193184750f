//! Method injection
//!
//! `call` resolves the parameters of a function or method the same way the
//! builder resolves constructor parameters, then invokes it. While a method
//! runs, its class sits on the build stack, so contextual bindings registered
//! for that class apply to the method's parameters too.
//!
//! ```rust
//! use service_container::{ClassDescriptor, Container, MethodDescriptor, Param, Parameters};
//!
//! struct Report;
//!
//! let container = Container::new();
//! container.register_descriptor(
//!     ClassDescriptor::new("Report")
//!         .constructor(|_| Ok(Report))
//!         .method(
//!             MethodDescriptor::new("render", |_: &Report, args| {
//!                 Ok(format!("rendered as {}", args.value::<String>("format")?))
//!             })
//!             .param(Param::primitive("format")),
//!         ),
//! );
//!
//! let output = container
//!     .call_as::<String>("Report@render", Parameters::new().with("format", "pdf".to_string()), None)
//!     .unwrap();
//! assert_eq!(*output, "rendered as pdf");
//! ```

use crate::context::{FrameKind, ResolutionContext, Resolver};
use crate::parameters::{downcast, Arguments, Instance, Parameters, Value};
use crate::provider::{FunctionDescriptor, Param};
use crate::{Container, ContainerError, Injectable, Result};
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Something `call` can invoke.
#[derive(Clone, Debug)]
pub enum CallTarget {
    /// A free function with declared parameters
    Function(FunctionDescriptor),
    /// `"Class@method"`, or a class name combined with a default method
    Method(String),
    /// A method on an object the caller already holds
    Bound {
        instance: Instance,
        class: String,
        method: String,
    },
}

impl CallTarget {
    pub fn bound(instance: Instance, class: impl Into<String>, method: impl Into<String>) -> Self {
        CallTarget::Bound {
            instance,
            class: class.into(),
            method: method.into(),
        }
    }
}

impl From<&str> for CallTarget {
    fn from(reference: &str) -> Self {
        CallTarget::Method(reference.to_string())
    }
}

impl From<String> for CallTarget {
    fn from(reference: String) -> Self {
        CallTarget::Method(reference)
    }
}

impl From<FunctionDescriptor> for CallTarget {
    fn from(function: FunctionDescriptor) -> Self {
        CallTarget::Function(function)
    }
}

/// Split `"Class@method"`, falling back to `default_method` for a bare class.
fn split_method<'a>(reference: &'a str, default_method: Option<&'a str>) -> Result<(&'a str, &'a str)> {
    match reference.split_once('@') {
        Some((class, method)) => Ok((class, method)),
        None => default_method.map(|method| (reference, method)).ok_or_else(|| {
            ContainerError::binding_resolution(
                format!("Method not provided for [{reference}]."),
                Vec::new(),
            )
        }),
    }
}

impl Container {
    /// Invoke `target`, resolving its parameters.
    ///
    /// Named entries of `overrides` win over resolution. Entries that match
    /// no declared parameter are passed along in [`Arguments::extra`].
    pub fn call(
        &self,
        target: impl Into<CallTarget>,
        overrides: Parameters,
        default_method: Option<&str>,
    ) -> Result<Instance> {
        let context = self.new_context();
        self.call_in(&context, target.into(), overrides, default_method)
    }

    /// [`call`](Self::call) and downcast the result.
    pub fn call_as<T: Injectable>(
        &self,
        target: impl Into<CallTarget>,
        overrides: Parameters,
        default_method: Option<&str>,
    ) -> Result<Arc<T>> {
        downcast("call", self.call(target, overrides, default_method)?)
    }

    /// A closure that performs the call later, each time it is invoked.
    pub fn wrap(
        &self,
        target: impl Into<CallTarget>,
        overrides: Parameters,
    ) -> impl Fn() -> Result<Instance> + Send + Sync + 'static {
        let container = self.clone();
        let target = target.into();
        move || container.call(target.clone(), overrides.clone(), None)
    }

    /// Replace how `"Class@method"` is invoked.
    pub fn bind_method<F>(&self, method: &str, callback: F) -> Result<()>
    where
        F: Fn(&Instance, &Resolver<'_>) -> Result<Instance> + Send + Sync + 'static,
    {
        self.ensure_unlocked()?;

        #[cfg(feature = "logging")]
        debug!(
            target: "service_container",
            method = method,
            "Binding method"
        );

        self.inner.hooks.bind_method(method, Arc::new(callback));
        Ok(())
    }

    #[inline]
    pub fn has_method_binding(&self, method: &str) -> bool {
        self.inner.hooks.has_method_binding(method)
    }

    fn call_in(
        &self,
        context: &ResolutionContext,
        target: CallTarget,
        overrides: Parameters,
        default_method: Option<&str>,
    ) -> Result<Instance> {
        match target {
            CallTarget::Function(function) => {
                let _frame = context.push_frame(function.name(), FrameKind::Call)?;

                #[cfg(feature = "logging")]
                trace!(
                    target: "service_container",
                    function = function.name(),
                    "Calling function"
                );

                let arguments = self.call_arguments(context, function.params(), function.name(), overrides)?;
                function.invoke(&arguments)
            }
            CallTarget::Method(reference) => {
                let (class, method) = split_method(&reference, default_method)?;
                let resolved = self.resolve(context, class, Parameters::new(), true)?;
                let class = resolved
                    .class
                    .unwrap_or_else(|| self.inner.aliases.canonical(class));
                self.call_bound(context, resolved.instance, &class, method, overrides)
            }
            CallTarget::Bound {
                instance,
                class,
                method,
            } => self.call_bound(context, instance, &class, &method, overrides),
        }
    }

    fn call_bound(
        &self,
        context: &ResolutionContext,
        instance: Instance,
        class: &str,
        method: &str,
        overrides: Parameters,
    ) -> Result<Instance> {
        let key = format!("{class}@{method}");
        let _frame = context.push_frame(class, FrameKind::Call)?;

        #[cfg(feature = "logging")]
        trace!(
            target: "service_container",
            method = %key,
            "Calling method"
        );

        if let Some(binding) = self.inner.hooks.method_binding(&key) {
            return binding(&instance, &Resolver::new(self, context));
        }

        let descriptor = self
            .inner
            .classes
            .get(class)
            .ok_or_else(|| ContainerError::unknown(class, context.build_stack()))?;
        let method = descriptor.find_method(method).ok_or_else(|| {
            ContainerError::binding_resolution(
                format!("Method [{key}] does not exist."),
                context.build_stack(),
            )
        })?;

        let arguments = self.call_arguments(context, method.params(), class, overrides)?;
        method.invoke(&instance, &arguments)
    }

    /// Resolve `params` with `overrides` as the current frame; leftovers
    /// become extra arguments.
    fn call_arguments(
        &self,
        context: &ResolutionContext,
        params: &[Param],
        owner: &str,
        overrides: Parameters,
    ) -> Result<Arguments> {
        let mut extra: Vec<(String, Value)> = overrides
            .names()
            .filter(|name| !params.iter().any(|p| p.name() == *name))
            .filter_map(|name| overrides.get(name).map(|value| (name.to_string(), value.clone())))
            .collect();
        extra.sort_by(|a, b| a.0.cmp(&b.0));

        let _overrides = context.push_overrides(overrides);
        let mut arguments = self.resolve_dependencies(context, params, owner)?;
        for (name, value) in extra {
            arguments.push_extra(name, value);
        }
        Ok(arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClassDescriptor, MethodDescriptor, Recipe};

    struct Mailer {
        host: String,
    }

    struct Controller;

    fn container() -> Container {
        let container = Container::new();
        container.register_descriptor(
            ClassDescriptor::new("Controller")
                .constructor(|_| Ok(Controller))
                .method(
                    MethodDescriptor::new("send", |_: &Controller, args| {
                        let mailer = args.get::<Mailer>("mailer")?;
                        let to = args.value::<String>("to")?;
                        Ok(format!("{to} via {}", mailer.host))
                    })
                    .param(Param::class("mailer", "Mailer"))
                    .param(Param::primitive("to")),
                )
                .method(MethodDescriptor::new("count_extra", |_: &Controller, args| {
                    Ok(args.extra().len())
                })),
        );
        container
            .bind(
                "Mailer",
                Recipe::factory(|_, _| Ok(Mailer { host: "smtp".into() })),
            )
            .unwrap();
        container
    }

    #[test]
    fn test_call_method_reference() {
        let container = container();
        let result = container
            .call_as::<String>(
                "Controller@send",
                Parameters::new().with("to", "ada@example.com".to_string()),
                None,
            )
            .unwrap();
        assert_eq!(*result, "ada@example.com via smtp");
    }

    #[test]
    fn test_default_method() {
        let container = container();
        let params = Parameters::new().with("to", "x".to_string());
        assert!(container.call("Controller", params.clone(), Some("send")).is_ok());
        assert!(container.call("Controller", params, None).err().unwrap().is_binding_resolution());
    }

    #[test]
    fn test_contextual_binding_applies_to_method_params() {
        let container = container();
        container.when("Controller").needs("$to").give("ops@example.com").unwrap();

        let result = container
            .call_as::<String>("Controller@send", Parameters::new(), None)
            .unwrap();
        assert_eq!(*result, "ops@example.com via smtp");
    }

    #[test]
    fn test_unused_overrides_become_extra() {
        let container = container();
        let count = container
            .call_as::<usize>(
                "Controller@count_extra",
                Parameters::new().with("a", 1u8).with("b", 2u8),
                None,
            )
            .unwrap();
        assert_eq!(*count, 2);
    }

    #[test]
    fn test_function_target() {
        let container = container();
        let function = FunctionDescriptor::new("greet", |args| {
            Ok(format!("hi from {}", args.get::<Mailer>("mailer")?.host))
        })
        .param(Param::class("mailer", "Mailer"));

        let result = container.call_as::<String>(function, Parameters::new(), None).unwrap();
        assert_eq!(*result, "hi from smtp");
    }

    #[test]
    fn test_bound_target_and_method_binding() {
        let container = container();
        let controller: Instance = Arc::new(Controller);

        container
            .bind_method("Controller@send", |_, _| Ok(Arc::new("intercepted") as Instance))
            .unwrap();
        assert!(container.has_method_binding("Controller@send"));

        let result = container
            .call_as::<&str>(CallTarget::bound(controller, "Controller", "send"), Parameters::new(), None)
            .unwrap();
        assert_eq!(*result, "intercepted");
    }

    #[test]
    fn test_wrap_defers_the_call() {
        let container = container();
        let deferred = container.wrap(
            "Controller@send",
            Parameters::new().with("to", "later".to_string()),
        );
        let result = deferred().unwrap().downcast::<String>().unwrap();
        assert_eq!(*result, "later via smtp");
    }

    #[test]
    fn test_missing_method() {
        let container = container();
        let err = container.call("Controller@nope", Parameters::new(), None).err().unwrap();
        assert!(err.to_string().contains("Controller@nope"));
    }
}
