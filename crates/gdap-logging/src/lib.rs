//! Centralized logging configuration for the gdap bridge
//!
//! Wraps `tracing` and `tracing-subscriber` behind one initialization
//! API. The bridge owns stdout for protocol frames, so logs go to
//! stderr or to a file, never to stdout.
//!
//! # Usage
//!
//! ```rust,ignore
//! use gdap_logging::{init, LogConfig};
//!
//! // Adapter started by the IDE: stderr, default level
//! init(LogConfig::default());
//!
//! // --debug flag
//! init(LogConfig::new().debug(true));
//!
//! // File logging
//! let _guard = init_with_file(LogConfig::new(), Path::new("gdap.log"))?;
//! // Guard must be held for the duration of the program
//! ```

use std::io::IsTerminal;
use std::path::Path;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Re-export tracing macros for standardized imports
pub use tracing::{debug, error, info, span, trace, warn, Level};

// Re-export WorkerGuard for file logging lifetime management
pub use tracing_appender::non_blocking::WorkerGuard;

/// Configuration for logging initialization
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Enable debug-level logging (overrides default_level)
    pub debug: bool,
    /// Default log level when RUST_LOG is not set
    pub default_level: String,
    /// Show module target in log output
    pub show_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            default_level: "info".to_string(),
            show_target: false,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable debug-level logging
    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    /// Set the default log level (used when RUST_LOG is not set)
    pub fn default_level(mut self, level: impl Into<String>) -> Self {
        self.default_level = level.into();
        self
    }

    /// Show or hide module target in log output
    pub fn show_target(mut self, show: bool) -> Self {
        self.show_target = show;
        self
    }

    fn build_filter(&self) -> EnvFilter {
        if self.debug {
            EnvFilter::new("debug")
        } else {
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&self.default_level))
        }
    }
}

/// Initialize stderr logging.
///
/// Call once at startup. `RUST_LOG` overrides the configured level.
///
/// # Panics
///
/// Panics if called more than once (tracing can only be initialized once).
pub fn init(config: LogConfig) {
    let is_tty = std::io::stderr().is_terminal();
    fmt()
        .with_env_filter(config.build_filter())
        .with_target(config.show_target)
        .with_writer(std::io::stderr)
        .with_ansi(is_tty)
        .init();
}

/// Initialize non-blocking file logging.
///
/// The returned `WorkerGuard` must be held until program exit so the
/// writer thread flushes remaining logs.
///
/// # Errors
///
/// Returns an error if the parent directory cannot be created.
pub fn init_with_file(config: LogConfig, log_path: &Path) -> std::io::Result<WorkerGuard> {
    if let Some(parent) = log_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    fmt()
        .with_env_filter(config.build_filter())
        .with_target(config.show_target)
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();

    Ok(guard)
}

/// Initialize logging for tests.
///
/// Uses `with_test_writer()` to capture logs in test output.
/// Safe to call multiple times (uses `try_init` internally).
pub fn init_test() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_test_writer())
        .try_init();
}
