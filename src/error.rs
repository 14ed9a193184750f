//! Error types for the service container

use thiserror::Error;

/// Errors that can occur while registering or resolving bindings
#[derive(Error, Debug)]
pub enum ContainerError {
    /// A concrete could not be instantiated or a required dependency could not be produced
    #[error("{message}")]
    BindingResolution {
        message: String,
        build_stack: Vec<String>,
    },

    /// A primitive parameter has no override, contextual value or default
    #[error("Unresolvable dependency resolving [{parameter}] in class {class}")]
    UnresolvablePrimitive { parameter: String, class: String },

    /// An alias was registered that would point back at itself
    #[error("[{id}] is aliased to itself")]
    AliasCycle { id: String },

    /// Nothing is bound under the identifier and no class carries its name
    #[error("Target class [{id}] does not exist{}", format_stack(.build_stack))]
    UnknownIdentifier {
        id: String,
        build_stack: Vec<String>,
    },

    /// The resolve chain reached an identifier that is already being resolved
    #[error("Circular dependency detected: {}", .chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },

    /// `get()` was called for an identifier the container does not know
    #[error("No entry was found for [{id}]")]
    NotFound {
        id: String,
        #[source]
        source: Box<ContainerError>,
    },

    /// The resolved instance is not of the requested type
    #[error("Instance resolved for [{id}] is not a {expected}")]
    TypeMismatch { id: String, expected: &'static str },

    /// A constructor or method asked for an argument that was never resolved
    #[error("Argument [{name}] was not resolved")]
    MissingArgument { name: String },

    /// Container is locked and cannot be modified
    #[error("Container is locked - cannot register new bindings")]
    Locked,
}

fn format_stack(stack: &[String]) -> String {
    if stack.is_empty() {
        String::new()
    } else {
        format!(" while building [{}]", stack.join(", "))
    }
}

impl ContainerError {
    /// Create a BindingResolution error carrying the current build stack
    #[inline]
    pub fn binding_resolution(message: impl Into<String>, build_stack: Vec<String>) -> Self {
        Self::BindingResolution {
            message: message.into(),
            build_stack,
        }
    }

    /// Create the error raised for interfaces and other non-instantiable classes
    pub fn not_instantiable(concrete: &str, build_stack: Vec<String>) -> Self {
        let message = if build_stack.is_empty() {
            format!("Target [{concrete}] is not instantiable.")
        } else {
            format!(
                "Target [{concrete}] is not instantiable while building [{}].",
                build_stack.join(", ")
            )
        };
        Self::BindingResolution {
            message,
            build_stack,
        }
    }

    /// Create an UnknownIdentifier error
    #[inline]
    pub fn unknown(id: impl Into<String>, build_stack: Vec<String>) -> Self {
        Self::UnknownIdentifier {
            id: id.into(),
            build_stack,
        }
    }

    /// Create an UnresolvablePrimitive error
    #[inline]
    pub fn unresolvable_primitive(parameter: impl Into<String>, class: impl Into<String>) -> Self {
        Self::UnresolvablePrimitive {
            parameter: parameter.into(),
            class: class.into(),
        }
    }

    /// Create a TypeMismatch error for `T`
    #[inline]
    pub fn type_mismatch<T: 'static>(id: impl Into<String>) -> Self {
        Self::TypeMismatch {
            id: id.into(),
            expected: std::any::type_name::<T>(),
        }
    }

    /// Whether this error belongs to the binding-resolution family.
    ///
    /// Cycles count as binding-resolution failures.
    pub fn is_binding_resolution(&self) -> bool {
        matches!(
            self,
            Self::BindingResolution { .. } | Self::CircularDependency { .. }
        )
    }

    /// Whether the error means "nothing is registered under this name"
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::UnknownIdentifier { .. })
    }

    /// The build stack captured when the error was raised, if any
    pub fn build_stack(&self) -> &[String] {
        match self {
            Self::BindingResolution { build_stack, .. }
            | Self::UnknownIdentifier { build_stack, .. } => build_stack,
            Self::CircularDependency { chain } => chain,
            Self::NotFound { source, .. } => source.build_stack(),
            _ => &[],
        }
    }
}

/// Result type alias for container operations
pub type Result<T> = std::result::Result<T, ContainerError>;
