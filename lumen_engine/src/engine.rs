/// Lumen Engine - process-wide services
///
/// Holds the two pieces of global state the renderer needs: the installed
/// logger and the single-renderer guard. The renderer itself is an explicitly
/// constructed object, never a global.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{OnceLock, RwLock};
use std::time::SystemTime;
use crate::error::{Error, Result};
use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};

// ===== INTERNAL STATE =====

/// Global logger (initialized with DefaultLogger)
static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

/// Set while a renderer instance is alive
static RENDERER_ALIVE: AtomicBool = AtomicBool::new(false);

fn logger_lock() -> &'static RwLock<Box<dyn Logger>> {
    LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger::default())))
}

// ===== INSTANCE GUARD =====

/// Proof that the holder is the only live renderer
///
/// Obtained from [`Engine::claim_renderer`]; releases the claim when dropped.
#[derive(Debug)]
pub struct RendererGuard {
    _private: (),
}

impl Drop for RendererGuard {
    fn drop(&mut self) {
        RENDERER_ALIVE.store(false, Ordering::Release);
        crate::engine_debug!("lumen::Engine", "Renderer instance released");
    }
}

// ===== PUBLIC API =====

/// Process-wide engine services
///
/// # Example
///
/// ```no_run
/// use lumen_engine::lumen::Engine;
///
/// let guard = Engine::claim_renderer()?;
/// assert!(Engine::renderer_alive());
/// drop(guard);
/// # Ok::<(), lumen_engine::lumen::Error>(())
/// ```
pub struct Engine;

impl Engine {
    /// Claim the single renderer slot
    ///
    /// # Errors
    ///
    /// `Error::InitializationFailed` if another renderer is still alive.
    pub fn claim_renderer() -> Result<RendererGuard> {
        if RENDERER_ALIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            crate::engine_error!("lumen::Engine", "Renderer already exists");
            return Err(Error::InitializationFailed(
                "Renderer already exists. Drop or shut down the existing renderer first.".to_string(),
            ));
        }
        Ok(RendererGuard { _private: () })
    }

    /// Whether a renderer currently holds the instance guard
    pub fn renderer_alive() -> bool {
        RENDERER_ALIVE.load(Ordering::Acquire)
    }

    // ===== LOGGING API =====

    /// Replace the installed logger
    pub fn set_logger<L: Logger + 'static>(logger: L) {
        if let Ok(mut lock) = logger_lock().write() {
            *lock = Box::new(logger);
        }
    }

    /// Reinstall the [`DefaultLogger`]
    pub fn reset_logger() {
        if let Ok(mut lock) = logger_lock().write() {
            *lock = Box::new(DefaultLogger::default());
        }
    }

    /// Log without file:line (used by `engine_trace!` .. `engine_warn!`)
    pub fn log(severity: LogSeverity, source: &str, message: String) {
        Self::dispatch(LogEntry {
            severity,
            timestamp: SystemTime::now(),
            source: source.to_string(),
            message,
            file: None,
            line: None,
        });
    }

    /// Log with file:line (used by `engine_error!`, `engine_err!`, `engine_bail!`)
    pub fn log_detailed(
        severity: LogSeverity,
        source: &str,
        message: String,
        file: &'static str,
        line: u32,
    ) {
        Self::dispatch(LogEntry {
            severity,
            timestamp: SystemTime::now(),
            source: source.to_string(),
            message,
            file: Some(file),
            line: Some(line),
        });
    }

    fn dispatch(entry: LogEntry) {
        if let Ok(lock) = logger_lock().read() {
            lock.log(&entry);
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
