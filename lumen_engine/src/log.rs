//! Engine logging for Lumen
//!
//! Every subsystem reports through the `engine_*!` macros, which route to the
//! logger installed with [`Engine::set_logger`](crate::lumen::Engine::set_logger).
//! Sources follow the `"lumen::<Component>"` convention
//! (`"lumen::FrameRing"`, `"lumen::DescriptorAllocator"`, `"lumen::vulkan"`).

use colored::*;
use std::time::SystemTime;
use chrono::{DateTime, Local};

/// Sink for engine log entries
///
/// Implement this trait to redirect engine logs (file, in-game console, test capture).
///
/// # Example
///
/// ```no_run
/// use lumen_engine::lumen::log::{Logger, LogEntry};
///
/// struct FileLogger {
///     file: std::fs::File,
/// }
///
/// impl Logger for FileLogger {
///     fn log(&self, entry: &LogEntry) {
///         // Write to file...
///     }
/// }
/// ```
pub trait Logger: Send + Sync {
    /// Process one entry
    fn log(&self, entry: &LogEntry);
}

/// One log record
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Severity level
    pub severity: LogSeverity,

    /// Creation time
    pub timestamp: SystemTime,

    /// Emitting component (e.g. "lumen::Renderer", "lumen::vulkan")
    pub source: String,

    /// Formatted message
    pub message: String,

    /// Source file (`engine_error!` only)
    pub file: Option<&'static str>,

    /// Source line (`engine_error!` only)
    pub line: Option<u32>,
}

/// Log severity levels, ordered from most to least verbose
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogSeverity {
    /// Per-frame chatter (fence waits, pool resets)
    Trace,

    /// Development information (pool growth, swapchain details)
    Debug,

    /// Lifecycle events (renderer created, swapchain rebuilt)
    Info,

    /// Recoverable problems (placeholder substitution, skipped frames)
    Warn,

    /// Failures, logged with file:line
    Error,
}

impl LogSeverity {
    /// Fixed-width label used by [`DefaultLogger`]
    pub fn label(self) -> &'static str {
        match self {
            LogSeverity::Trace => "TRACE",
            LogSeverity::Debug => "DEBUG",
            LogSeverity::Info => "INFO ",
            LogSeverity::Warn => "WARN ",
            LogSeverity::Error => "ERROR",
        }
    }
}

/// Colored console logger, installed by default
///
/// Format:
/// - Normal: `[timestamp] [SEVERITY] [source] message`
/// - Error: `[timestamp] [ERROR] [source] message (file:line)`
///
/// Entries below `min_severity` are dropped. Errors go to stderr.
#[derive(Debug, Clone, Copy)]
pub struct DefaultLogger {
    pub min_severity: LogSeverity,
}

impl Default for DefaultLogger {
    fn default() -> Self {
        Self {
            min_severity: if cfg!(debug_assertions) {
                LogSeverity::Debug
            } else {
                LogSeverity::Info
            },
        }
    }
}

impl DefaultLogger {
    /// Logger that prints everything at or above `min_severity`
    pub fn with_min_severity(min_severity: LogSeverity) -> Self {
        Self { min_severity }
    }

    /// Build the uncolored line for an entry
    pub fn format_entry(entry: &LogEntry) -> String {
        let datetime: DateTime<Local> = entry.timestamp.into();
        let timestamp = datetime.format("%Y-%m-%d %H:%M:%S%.3f");
        match (entry.file, entry.line) {
            (Some(file), Some(line)) => format!(
                "[{}] [{}] [{}] {} ({}:{})",
                timestamp, entry.severity.label(), entry.source, entry.message, file, line
            ),
            _ => format!(
                "[{}] [{}] [{}] {}",
                timestamp, entry.severity.label(), entry.source, entry.message
            ),
        }
    }
}

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        if entry.severity < self.min_severity {
            return;
        }

        let datetime: DateTime<Local> = entry.timestamp.into();
        let timestamp = datetime.format("%Y-%m-%d %H:%M:%S%.3f").to_string();

        let label = entry.severity.label();
        let severity_str = match entry.severity {
            LogSeverity::Trace => label.bright_black(),
            LogSeverity::Debug => label.cyan(),
            LogSeverity::Info => label.green(),
            LogSeverity::Warn => label.yellow(),
            LogSeverity::Error => label.red().bold(),
        };
        let source = entry.source.bright_blue();

        match (entry.file, entry.line) {
            (Some(file), Some(line)) => eprintln!(
                "[{}] [{}] [{}] {} ({}:{})",
                timestamp, severity_str, source, entry.message, file, line
            ),
            _ if entry.severity == LogSeverity::Error => eprintln!(
                "[{}] [{}] [{}] {}",
                timestamp, severity_str, source, entry.message
            ),
            _ => println!(
                "[{}] [{}] [{}] {}",
                timestamp, severity_str, source, entry.message
            ),
        }
    }
}

// ===== LOGGING MACROS =====

/// Log a TRACE message
///
/// ```no_run
/// lumen_engine::engine_trace!("lumen::FrameRing", "Waiting on slot {}", 0);
/// ```
#[macro_export]
macro_rules! engine_trace {
    ($source:expr, $($arg:tt)*) => {
        $crate::lumen::Engine::log(
            $crate::lumen::log::LogSeverity::Trace,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a DEBUG message
#[macro_export]
macro_rules! engine_debug {
    ($source:expr, $($arg:tt)*) => {
        $crate::lumen::Engine::log(
            $crate::lumen::log::LogSeverity::Debug,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an INFO message
#[macro_export]
macro_rules! engine_info {
    ($source:expr, $($arg:tt)*) => {
        $crate::lumen::Engine::log(
            $crate::lumen::log::LogSeverity::Info,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a WARN message
#[macro_export]
macro_rules! engine_warn {
    ($source:expr, $($arg:tt)*) => {
        $crate::lumen::Engine::log(
            $crate::lumen::log::LogSeverity::Warn,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an ERROR message with file:line information
///
/// ```no_run
/// lumen_engine::engine_error!("lumen::Renderer", "Failed to submit: {}", "device lost");
/// ```
#[macro_export]
macro_rules! engine_error {
    ($source:expr, $($arg:tt)*) => {
        $crate::lumen::Engine::log_detailed(
            $crate::lumen::log::LogSeverity::Error,
            $source,
            format!($($arg)*),
            file!(),
            line!()
        )
    };
}

/// Log an error and evaluate to `Error::BackendError` with the same message
///
/// ```no_run
/// # use lumen_engine::lumen::Error;
/// let err: Error = lumen_engine::engine_err!("lumen::vulkan", "vkCreateFence failed: {}", -1);
/// ```
#[macro_export]
macro_rules! engine_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::lumen::Engine::log_detailed(
            $crate::lumen::log::LogSeverity::Error,
            $source,
            message.clone(),
            file!(),
            line!()
        );
        $crate::lumen::Error::BackendError(message)
    }};
}

/// Log an error and return `Err(Error::BackendError(..))` from the enclosing function
#[macro_export]
macro_rules! engine_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
