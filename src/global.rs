//! Process-wide container handle
//!
//! Library code should receive a [`Container`] explicitly. The global handle
//! exists for the application entry point, which sets it up once at startup
//! and tears it down at exit (or between tests).
//!
//! ```rust
//! use service_container::Container;
//!
//! let app = Container::new();
//! Container::set_global(app.clone());
//!
//! assert!(Container::has_global());
//! Container::clear_global();
//! ```

use crate::Container;
use once_cell::sync::Lazy;
use std::sync::{PoisonError, RwLock};

#[cfg(feature = "logging")]
use tracing::debug;

static GLOBAL: Lazy<RwLock<Option<Container>>> = Lazy::new(|| RwLock::new(None));

impl Container {
    /// The process-wide container, created empty on first access.
    pub fn global() -> Container {
        if let Some(container) = GLOBAL
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return container.clone();
        }

        GLOBAL
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_or_insert_with(|| {
                #[cfg(feature = "logging")]
                debug!(target: "service_container", "Creating global container");

                Container::new()
            })
            .clone()
    }

    /// Install `container` as the process-wide container, returning the previous one.
    pub fn set_global(container: Container) -> Option<Container> {
        #[cfg(feature = "logging")]
        debug!(target: "service_container", "Installing global container");

        GLOBAL
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(container)
    }

    /// Remove the process-wide container, returning it.
    pub fn clear_global() -> Option<Container> {
        GLOBAL.write().unwrap_or_else(PoisonError::into_inner).take()
    }

    pub fn has_global() -> bool {
        GLOBAL
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Recipe;
    use std::sync::Arc;

    // Single test so parallel test threads never race on the global slot
    #[test]
    fn test_global_lifecycle() {
        Container::clear_global();

        let created = Container::global();
        created.instance("marker", 1u8).unwrap();
        assert!(Container::global().has("marker"));

        let app = Container::new();
        app.singleton("clock", Recipe::factory(|_, _| Ok(()))).unwrap();
        let previous = Container::set_global(app.clone());
        assert!(previous.is_some_and(|p| p.has("marker")));

        let global = Container::global();
        assert!(Arc::ptr_eq(&global.make("clock").unwrap(), &app.make("clock").unwrap()));

        assert!(Container::clear_global().is_some());
        assert!(!Container::has_global());
    }
}
