//! Units of work
//!
//! Scoped bindings share one instance until the current unit of work ends
//! (typically one request or one job). A [`ScopeGuard`] marks that boundary:
//! dropping it forgets every scoped instance.

use crate::Container;
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "logging")]
use tracing::debug;

/// Unique scope identifier.
///
/// Each scope gets a unique ID for tracking and debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Scope(u64);

impl Scope {
    /// Generate a new unique scope ID.
    #[inline]
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    #[inline]
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scope-{}", self.0)
    }
}

/// An open unit of work. Scoped instances are forgotten when it is dropped
/// or [ended](ScopeGuard::end).
///
/// # Examples
///
/// ```rust
/// use service_container::{Container, Recipe};
/// use std::sync::Arc;
///
/// struct RequestContext;
///
/// let container = Container::new();
/// container.scoped("request", Recipe::factory(|_, _| Ok(RequestContext))).unwrap();
///
/// let first = {
///     let scope = container.begin_scope();
///     let a = scope.make("request").unwrap();
///     let b = scope.make("request").unwrap();
///     assert!(Arc::ptr_eq(&a, &b));
///     a
/// };
///
/// let second = container.make("request").unwrap();
/// assert!(!Arc::ptr_eq(&first, &second));
/// ```
#[must_use = "the scope ends as soon as the guard is dropped"]
pub struct ScopeGuard {
    container: Container,
    scope: Scope,
    ended: bool,
}

impl ScopeGuard {
    fn new(container: Container) -> Self {
        let scope = Scope::new();

        #[cfg(feature = "logging")]
        debug!(
            target: "service_container",
            scope = %scope,
            "Beginning unit of work"
        );

        Self {
            container,
            scope,
            ended: false,
        }
    }

    #[inline]
    pub fn scope(&self) -> Scope {
        self.scope
    }

    #[inline]
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// End the unit of work now. Returns how many scoped instances were forgotten.
    pub fn end(mut self) -> usize {
        self.finish()
    }

    fn finish(&mut self) -> usize {
        if self.ended {
            return 0;
        }
        self.ended = true;
        let forgotten = self.container.forget_scoped_instances();

        #[cfg(feature = "logging")]
        debug!(
            target: "service_container",
            scope = %self.scope,
            forgotten = forgotten,
            "Ending unit of work"
        );

        forgotten
    }
}

impl std::ops::Deref for ScopeGuard {
    type Target = Container;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.container
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.finish();
    }
}

impl std::fmt::Debug for ScopeGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeGuard")
            .field("scope", &self.scope)
            .field("ended", &self.ended)
            .finish()
    }
}

impl Container {
    /// Open a unit of work; scoped instances live until the guard is dropped.
    pub fn begin_scope(&self) -> ScopeGuard {
        ScopeGuard::new(self.clone())
    }

    /// Run `work` as one unit of work.
    pub fn in_scope<R>(&self, work: impl FnOnce(&Container) -> R) -> R {
        let guard = self.begin_scope();
        work(&guard)
    }
}
