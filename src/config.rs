//! Container configuration
//!
//! ```rust
//! use service_container::{Container, ContainerConfig};
//!
//! let config = ContainerConfig::new().environment("testing").max_depth(64);
//! let container = Container::with_config(config);
//! assert_eq!(container.environment(), Some("testing"));
//! ```

use std::env;

/// Environment variable naming the application environment
pub const ENVIRONMENT_VAR: &str = "APP_ENV";

/// Environment variable overriding the nested resolution limit
pub const MAX_DEPTH_VAR: &str = "SERVICE_CONTAINER_MAX_DEPTH";

/// Default limit on nested resolutions within one call tree
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Settings fixed at container construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerConfig {
    environment: Option<String>,
    max_depth: usize,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            environment: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ContainerConfig {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `APP_ENV` and `SERVICE_CONTAINER_MAX_DEPTH`. Unset or unparsable
    /// values keep their defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(environment) = env::var(ENVIRONMENT_VAR) {
            if !environment.trim().is_empty() {
                config.environment = Some(environment.trim().to_string());
            }
        }

        if let Some(depth) = env::var(MAX_DEPTH_VAR)
            .ok()
            .and_then(|raw| raw.trim().parse::<usize>().ok())
        {
            config = config.max_depth(depth);
        }

        config
    }

    /// Environment name matched against environment-conditioned bind metadata.
    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Maximum nesting of resolutions in one call tree (at least 1).
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    #[inline]
    pub fn get_environment(&self) -> Option<&str> {
        self.environment.as_deref()
    }

    #[inline]
    pub fn get_max_depth(&self) -> usize {
        self.max_depth
    }
}
