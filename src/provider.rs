//! Class descriptors: the container's view of a buildable type
//!
//! Rust has no runtime reflection, so every type the container should be
//! able to build on its own registers a [`ClassDescriptor`] describing its
//! constructor parameters, lifecycle metadata and callable methods. The
//! descriptor is inspected exactly like a reflected class would be.

use crate::parameters::{erase, Arguments, Instance, Value};
use crate::Result;
use std::sync::Arc;

/// Marker trait for types that can be stored in the container.
///
/// This is automatically implemented for all types that are `Send + Sync + 'static`.
/// You never need to implement this manually.
pub trait Injectable: Send + Sync + 'static {
    /// Returns the type name for debugging
    #[inline]
    fn type_name_of() -> &'static str
    where
        Self: Sized,
    {
        std::any::type_name::<Self>()
    }
}

// Blanket implementation - everything that's Send + Sync + 'static is Injectable
impl<T: Send + Sync + 'static> Injectable for T {}

/// A type that can describe how the container builds it.
///
/// Implemented by hand or with `#[derive(Buildable)]` (feature `derive`).
pub trait Buildable: Injectable {
    fn descriptor() -> ClassDescriptor;
}

/// Declarative lifecycle carried by a class descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Lifecycle {
    /// New instance on every resolve
    #[default]
    Transient,

    /// One instance shared for the life of the container
    Singleton,

    /// One instance per unit of work, forgotten at the scope boundary
    Scoped,
}

impl Lifecycle {
    #[inline]
    pub fn is_shared(self) -> bool {
        !matches!(self, Lifecycle::Transient)
    }
}

/// Named metadata attached to a class or a parameter.
#[derive(Clone)]
pub struct Attribute {
    name: String,
    payload: Option<Instance>,
}

impl Attribute {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: None,
        }
    }

    /// Attach a value to the attribute (e.g. the key of a `Config` attribute).
    pub fn with_payload<T: crate::Injectable>(mut self, payload: T) -> Self {
        self.payload = Some(erase(payload));
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn payload(&self) -> Option<&Instance> {
        self.payload.as_ref()
    }

    pub fn payload_as<T: crate::Injectable>(&self) -> Option<Arc<T>> {
        self.payload
            .as_ref()
            .and_then(|p| Arc::clone(p).downcast::<T>().ok())
    }
}

impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("has_payload", &self.payload.is_some())
            .finish()
    }
}

/// What a parameter asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    /// A plain value with no class of its own (string, number, config struct)
    Primitive,
    /// Another identifier the container can resolve
    Class(String),
}

/// A constructor or method parameter.
#[derive(Debug, Clone)]
pub struct Param {
    name: String,
    kind: ParamKind,
    default: Option<Value>,
    variadic: bool,
    nullable: bool,
    attributes: Vec<Attribute>,
}

impl Param {
    /// A primitive parameter.
    pub fn primitive(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Primitive,
            default: None,
            variadic: false,
            nullable: false,
            attributes: Vec::new(),
        }
    }

    /// A parameter typed by another identifier.
    pub fn class(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: ParamKind::Class(id.into()),
            ..Self::primitive(name)
        }
    }

    /// Declare a default value.
    pub fn with_default<T: crate::Injectable>(self, value: T) -> Self {
        self.with_default_value(Value::of(value))
    }

    pub fn with_default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> &ParamKind {
        &self.kind
    }

    /// The identifier of a class-typed parameter.
    #[inline]
    pub fn class_id(&self) -> Option<&str> {
        match &self.kind {
            ParamKind::Class(id) => Some(id),
            ParamKind::Primitive => None,
        }
    }

    #[inline]
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    #[inline]
    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    #[inline]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    #[inline]
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }
}

/// Environment-conditioned bind metadata on an abstract type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindTarget {
    pub concrete: String,
    /// Empty means "any environment"
    pub environments: Vec<String>,
}

/// Type-erased constructor
pub type ConstructFn = Arc<dyn Fn(&Arguments) -> Result<Instance> + Send + Sync>;

/// Type-erased method body: receives the target object and its resolved arguments
pub type MethodFn = Arc<dyn Fn(&Instance, &Arguments) -> Result<Instance> + Send + Sync>;

/// A method the container can invoke through `call("Class@method")`.
#[derive(Clone)]
pub struct MethodDescriptor {
    name: String,
    params: Vec<Param>,
    invoke: MethodFn,
}

impl MethodDescriptor {
    pub fn new<T, R, F>(name: impl Into<String>, invoke: F) -> Self
    where
        T: crate::Injectable,
        R: crate::Injectable,
        F: Fn(&T, &Arguments) -> Result<R> + Send + Sync + 'static,
    {
        let name = name.into();
        let method = name.clone();
        Self {
            name,
            params: Vec::new(),
            invoke: Arc::new(move |target: &Instance, args: &Arguments| {
                let target = Arc::clone(target)
                    .downcast::<T>()
                    .map_err(|_| crate::ContainerError::type_mismatch::<T>(method.clone()))?;
                invoke(&*target, args).map(erase)
            }),
        }
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    #[inline]
    pub(crate) fn invoke(&self, target: &Instance, args: &Arguments) -> Result<Instance> {
        (self.invoke)(target, args)
    }
}

impl std::fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

/// A free function the container can invoke through `call`.
#[derive(Clone)]
pub struct FunctionDescriptor {
    name: String,
    params: Vec<Param>,
    invoke: ConstructFn,
}

impl FunctionDescriptor {
    pub fn new<R, F>(name: impl Into<String>, invoke: F) -> Self
    where
        R: crate::Injectable,
        F: Fn(&Arguments) -> Result<R> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            params: Vec::new(),
            invoke: Arc::new(move |args: &Arguments| invoke(args).map(erase)),
        }
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    #[inline]
    pub(crate) fn invoke(&self, args: &Arguments) -> Result<Instance> {
        (self.invoke)(args)
    }
}

impl std::fmt::Debug for FunctionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionDescriptor")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

/// Everything the builder needs to know about a class.
///
/// # Examples
///
/// ```rust
/// use service_container::{ClassDescriptor, Param};
///
/// struct Greeter {
///     name: String,
/// }
///
/// let descriptor = ClassDescriptor::new("Greeter")
///     .param(Param::primitive("name"))
///     .constructor(|args| Ok(Greeter { name: args.value::<String>("name")? }));
///
/// assert!(descriptor.is_instantiable());
/// assert_eq!(descriptor.params().map(|p| p.len()), Some(1));
/// ```
#[derive(Clone)]
pub struct ClassDescriptor {
    name: String,
    implements: Vec<String>,
    instantiable: bool,
    params: Option<Vec<Param>>,
    construct: Option<ConstructFn>,
    lifecycle: Option<Lifecycle>,
    bind_targets: Vec<BindTarget>,
    attributes: Vec<Attribute>,
    methods: Vec<MethodDescriptor>,
}

impl ClassDescriptor {
    /// Describe a concrete class.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            implements: Vec::new(),
            instantiable: true,
            params: None,
            construct: None,
            lifecycle: None,
            bind_targets: Vec::new(),
            attributes: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Describe an interface or abstract type. It can carry bind metadata but
    /// can never be built itself.
    pub fn interface(name: impl Into<String>) -> Self {
        Self {
            instantiable: false,
            ..Self::new(name)
        }
    }

    /// Declare a supertype, used when matching type-scoped hooks.
    pub fn implements(mut self, name: impl Into<String>) -> Self {
        self.implements.push(name.into());
        self
    }

    /// Add a constructor parameter. A class with no parameters at all is
    /// treated as having no constructor.
    pub fn param(mut self, param: Param) -> Self {
        self.params.get_or_insert_with(Vec::new).push(param);
        self
    }

    /// Declare an explicit constructor that takes no parameters.
    pub fn no_params(mut self) -> Self {
        self.params.get_or_insert_with(Vec::new);
        self
    }

    pub fn constructor<T, F>(mut self, construct: F) -> Self
    where
        T: crate::Injectable,
        F: Fn(&Arguments) -> Result<T> + Send + Sync + 'static,
    {
        self.construct = Some(Arc::new(move |args: &Arguments| construct(args).map(erase)));
        self
    }

    /// Constructor that returns an already type-erased instance.
    pub fn constructor_erased<F>(mut self, construct: F) -> Self
    where
        F: Fn(&Arguments) -> Result<Instance> + Send + Sync + 'static,
    {
        self.construct = Some(Arc::new(construct));
        self
    }

    pub fn singleton(self) -> Self {
        self.lifecycle(Lifecycle::Singleton)
    }

    pub fn scoped(self) -> Self {
        self.lifecycle(Lifecycle::Scoped)
    }

    pub fn lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    /// Preferred concrete for this abstract in every environment.
    pub fn bind_to(self, concrete: impl Into<String>) -> Self {
        self.bind_to_in(concrete, std::iter::empty::<String>())
    }

    /// Preferred concrete for this abstract in the listed environments.
    pub fn bind_to_in<I, S>(mut self, concrete: impl Into<String>, environments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bind_targets.push(BindTarget {
            concrete: concrete.into(),
            environments: environments.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn is_instantiable(&self) -> bool {
        self.instantiable && self.construct.is_some()
    }

    /// Constructor parameters; `None` when the class has no constructor.
    #[inline]
    pub fn params(&self) -> Option<&[Param]> {
        self.params.as_deref()
    }

    #[inline]
    pub fn declared_lifecycle(&self) -> Option<Lifecycle> {
        self.lifecycle
    }

    #[inline]
    pub fn bind_targets(&self) -> &[BindTarget] {
        &self.bind_targets
    }

    #[inline]
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Whether this class is, or declares itself as, `name`.
    pub fn is_a(&self, name: &str) -> bool {
        self.name == name || self.implements.iter().any(|i| i == name)
    }

    pub fn find_method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub(crate) fn construct(&self, args: &Arguments) -> Option<Result<Instance>> {
        self.construct.as_ref().map(|construct| construct(args))
    }

    /// Pick the bind target for `environment`: an environment-specific match
    /// wins, otherwise the first unconditional target.
    pub fn select_bind_target(&self, environment: Option<&str>) -> Option<&str> {
        let specific = environment.and_then(|env| {
            self.bind_targets
                .iter()
                .find(|t| t.environments.iter().any(|e| e == env))
        });

        specific
            .or_else(|| self.bind_targets.iter().find(|t| t.environments.is_empty()))
            .map(|t| t.concrete.as_str())
    }
}

impl std::fmt::Debug for ClassDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("name", &self.name)
            .field("implements", &self.implements)
            .field("instantiable", &self.instantiable)
            .field("params", &self.params)
            .field("lifecycle", &self.lifecycle)
            .field("bind_targets", &self.bind_targets)
            .field("attributes", &self.attributes)
            .field("methods", &self.methods.len())
            .finish()
    }
}
