//! Logging utilities and configuration for the advisor.
//!
//! The engine emits `tracing` spans and events throughout. [`LogConfig`] gates
//! the chattier categories (per-variable field resolution, queue transitions)
//! so production deployments pay nothing for them, and [`setup`] wires a
//! `tracing-subscriber` for applications that do not bring their own.

use tracing::Level;

/// Logging configuration for the advisor.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base log level for advisor components
    pub base_level: Level,
    /// Whether to log how each variable's field was resolved
    pub log_resolution_details: bool,
    /// Whether to log every queue transition
    pub log_queue_transitions: bool,
    /// Whether to log execution timings
    pub log_execution_timing: bool,
    /// Maximum length for logged field values (generated responses can be large)
    pub max_field_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            base_level: Level::INFO,
            log_resolution_details: false,
            log_queue_transitions: true,
            log_execution_timing: true,
            max_field_length: 256,
        }
    }
}

impl LogConfig {
    /// Everything on, with long response excerpts. Meant for tracing a single plan.
    pub fn verbose() -> Self {
        Self {
            base_level: Level::DEBUG,
            log_resolution_details: true,
            max_field_length: 1024,
            ..Self::default()
        }
    }

    /// Only warnings from the advisor itself; no per-suggestion events.
    pub fn quiet() -> Self {
        Self {
            base_level: Level::WARN,
            log_resolution_details: false,
            log_queue_transitions: false,
            log_execution_timing: false,
            max_field_length: 128,
        }
    }
}

/// Macro for performance-sensitive debug logging.
///
/// Arguments are only evaluated if debug logging is enabled in the config.
#[macro_export]
macro_rules! perf_debug {
    ($config:expr, $($arg:tt)*) => {
        if $config.base_level >= tracing::Level::DEBUG {
            tracing::debug!($($arg)*);
        }
    };
}

/// Macro for conditional field resolution logging.
#[macro_export]
macro_rules! log_resolution {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_resolution_details {
            tracing::debug!($($arg)*);
        }
    };
}

/// Macro for conditional queue transition logging.
#[macro_export]
macro_rules! log_queue {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_queue_transitions {
            tracing::info!($($arg)*);
        }
    };
}

/// Macro for conditional execution timing logging.
#[macro_export]
macro_rules! log_timing {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_execution_timing {
            tracing::info!($($arg)*);
        }
    };
}

/// Truncates a string to at most `max_length` bytes on a character boundary.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    if value.len() <= max_length {
        return value.to_string();
    }
    let mut end = max_length;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...(truncated)", &value[..end])
}

/// Subscriber setup for hosts that do not install their own.
pub mod setup {
    use tracing::Level;

    /// Level and output format for [`init_logging`].
    #[derive(Debug, Clone)]
    pub struct LoggingConfig {
        /// Level for `stat_advisor` targets; other crates stay at `warn`
        pub level: Level,
        pub json_format: bool,
        /// Full filter directive, replacing the one derived from `level`
        pub env_filter: Option<String>,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                level: Level::INFO,
                json_format: false,
                env_filter: None,
            }
        }
    }

    impl LoggingConfig {
        /// Debug output from the advisor in plain text.
        pub fn development() -> Self {
            Self {
                level: Level::DEBUG,
                ..Self::default()
            }
        }

        pub fn with_json_format(mut self, enabled: bool) -> Self {
            self.json_format = enabled;
            self
        }

        pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
            self.env_filter = Some(filter.into());
            self
        }

        pub fn env_filter(&self) -> String {
            match &self.env_filter {
                Some(filter) => filter.clone(),
                None => format!("warn,stat_advisor={}", self.level.as_str().to_lowercase()),
            }
        }
    }

    /// Initializes a global subscriber.
    ///
    /// `RUST_LOG` takes precedence over the configured filter.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use stat_advisor::logging::setup::{init_logging, LoggingConfig};
    ///
    /// init_logging(LoggingConfig::development().with_json_format(true)).unwrap();
    /// ```
    pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.env_filter()));

        let fmt_layer = if config.json_format {
            tracing_subscriber::fmt::layer().json().boxed()
        } else {
            tracing_subscriber::fmt::layer().boxed()
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;

        Ok(())
    }
}
