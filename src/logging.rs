//! Subscriber setup for the container's `tracing` events
//!
//! Everything the container emits goes to [`TARGET`]. Registrations, alias
//! changes, cache writes and scope ends are DEBUG events; the individual
//! steps of a resolution (cache hits, factory calls, constructor parameters)
//! are TRACE events. [`Verbosity`] picks between the two and [`Output`]
//! picks how they are rendered.
//!
//! Installing a subscriber needs `logging-json` or `logging-pretty`. With
//! only `logging` enabled the events are still emitted for whatever
//! subscriber the host application installs, and [`LoggingConfig::install`]
//! does nothing.
//!
//! ```rust,ignore
//! use service_container::logging::{LoggingConfig, Output, Verbosity};
//!
//! LoggingConfig::new()
//!     .output(Output::Pretty)
//!     .verbosity(Verbosity::Resolutions)
//!     .container_only()
//!     .install();
//! ```

use tracing::Level;

/// Target of every event the container emits
pub const TARGET: &str = "service_container";

/// How events are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    /// One JSON object per event (falls back to text without `logging-json`)
    Json,
    /// Multi-line human readable output
    Pretty,
    /// Single-line text
    Compact,
}

impl Default for Output {
    fn default() -> Self {
        if cfg!(feature = "logging-json") {
            Output::Json
        } else {
            Output::Pretty
        }
    }
}

/// How much of the container's activity is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Bindings, aliases, cached instances and scope ends
    #[default]
    Registrations,
    /// Every resolution step as well
    Resolutions,
}

impl Verbosity {
    pub fn level(self) -> Level {
        match self {
            Verbosity::Registrations => Level::DEBUG,
            Verbosity::Resolutions => Level::TRACE,
        }
    }
}

/// Subscriber settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingConfig {
    output: Output,
    verbosity: Verbosity,
    container_only: bool,
    thread_ids: bool,
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output(mut self, output: Output) -> Self {
        self.output = output;
        self
    }

    pub fn verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Drop events from other crates. Without this, `RUST_LOG` decides and
    /// the verbosity is only the fallback.
    pub fn container_only(mut self) -> Self {
        self.container_only = true;
        self
    }

    /// Tag each event with the thread it came from, useful when scopes run
    /// on worker threads.
    pub fn with_thread_ids(mut self) -> Self {
        self.thread_ids = true;
        self
    }

    /// Fixed filter directive, if the configuration pins one.
    #[cfg_attr(
        not(any(feature = "logging-json", feature = "logging-pretty")),
        allow(dead_code)
    )]
    fn directive(&self) -> Option<String> {
        self.container_only
            .then(|| format!("{}={}", TARGET, self.verbosity.level()))
    }

    /// Install the subscriber globally. Returns `false` when one was
    /// already installed or no subscriber feature is enabled.
    #[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
    pub fn install(self) -> bool {
        use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

        let filter = match self.directive() {
            Some(directive) => EnvFilter::new(directive),
            None => EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(self.verbosity.level().to_string())),
        };

        let base = fmt::layer().with_target(true).with_thread_ids(self.thread_ids);
        let layer: Box<dyn Layer<Registry> + Send + Sync> = match self.output {
            #[cfg(feature = "logging-json")]
            Output::Json => base.json().boxed(),
            #[cfg(not(feature = "logging-json"))]
            Output::Json => base.boxed(),
            Output::Pretty => base.pretty().boxed(),
            Output::Compact => base.compact().boxed(),
        };

        tracing_subscriber::registry()
            .with(layer)
            .with(filter)
            .try_init()
            .is_ok()
    }

    #[cfg(not(any(feature = "logging-json", feature = "logging-pretty")))]
    pub fn install(self) -> bool {
        false
    }
}

/// Install the default configuration: registrations only, JSON when
/// `logging-json` is enabled and pretty output otherwise.
pub fn init() -> bool {
    LoggingConfig::new().install()
}

#[cfg(all(test, feature = "logging"))]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(Verbosity::default().level(), Level::DEBUG);
        assert_eq!(Verbosity::Resolutions.level(), Level::TRACE);
    }

    #[test]
    fn test_container_only_pins_the_directive() {
        let config = LoggingConfig::new().verbosity(Verbosity::Resolutions);
        assert!(config.directive().is_none());
        assert_eq!(
            config.container_only().directive().as_deref(),
            Some("service_container=TRACE")
        );
    }

    #[test]
    fn test_default_output_follows_features() {
        let expected = if cfg!(feature = "logging-json") {
            Output::Json
        } else {
            Output::Pretty
        };
        assert_eq!(Output::default(), expected);
    }

    #[test]
    fn test_second_install_is_refused() {
        let _ = init();
        assert!(!LoggingConfig::new().output(Output::Compact).install());
    }
}
