//! Error types for the Lumen renderer
//!
//! Every fallible GPU call returns a [`Result`]. Callers decide what an error
//! means through [`Error::kind`]: only presentation, pool-exhaustion and asset
//! failures are recoverable, everything else is escalated to [`fatal`].

use std::fmt;

/// Result type for Lumen operations
pub type Result<T> = std::result::Result<T, Error>;

/// Lumen renderer errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Backend-specific error (Vulkan call failure, invalid usage, ...)
    BackendError(String),

    /// Out of GPU or host memory on a core allocation
    OutOfMemory,

    /// The logical device was lost
    DeviceLost,

    /// A bounded fence or acquire wait expired (hung GPU)
    Timeout,

    /// A descriptor pool has no capacity left for the requested layout
    OutOfPoolMemory,

    /// A descriptor pool is too fragmented to serve the requested layout
    FragmentedPool,

    /// The presentation surface no longer matches the swapchain
    SurfaceOutOfDate,

    /// Invalid or missing resource (shader module, texture, scene entry, ...)
    InvalidResource(String),

    /// Initialization failed (device, swapchain, renderer, subsystems)
    InitializationFailed(String),
}

/// Recovery class of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unrecoverable: the process must terminate
    Fatal,
    /// Surface out of date or suboptimal: request a resize and skip the frame
    TransientPresentation,
    /// Descriptor pool exhausted: grow and retry once
    PoolExhausted,
    /// Broken asset: substitute a placeholder and keep rendering
    Asset,
}

impl Error {
    /// Classify this error into its recovery class
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::SurfaceOutOfDate => ErrorKind::TransientPresentation,
            Error::OutOfPoolMemory | Error::FragmentedPool => ErrorKind::PoolExhausted,
            Error::InvalidResource(_) => ErrorKind::Asset,
            Error::BackendError(_)
            | Error::OutOfMemory
            | Error::DeviceLost
            | Error::Timeout
            | Error::InitializationFailed(_) => ErrorKind::Fatal,
        }
    }

    /// Whether this error must terminate the process
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Fatal
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::DeviceLost => write!(f, "GPU device lost"),
            Error::Timeout => write!(f, "GPU wait timed out"),
            Error::OutOfPoolMemory => write!(f, "Descriptor pool out of memory"),
            Error::FragmentedPool => write!(f, "Descriptor pool fragmented"),
            Error::SurfaceOutOfDate => write!(f, "Presentation surface out of date"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

/// Terminate the process after an unrecoverable GPU error
///
/// Logs the error with file:line information through the engine logger,
/// then aborts. Continuing would operate on an inconsistent GPU state.
pub fn fatal(source: &str, error: &Error) -> ! {
    crate::engine_error!(source, "Fatal error, aborting: {}", error);
    std::process::abort()
}

/// Escalate fatal errors at the outermost call site
///
/// ```no_run
/// use lumen_engine::lumen::{OrFatal, Result};
///
/// fn frame() -> Result<u32> { Ok(1) }
/// let presented = frame().or_fatal("app::MainLoop");
/// ```
pub trait OrFatal<T> {
    /// The value, or abort through [`fatal`] if the error is fatal
    ///
    /// Recoverable errors come back as `None`.
    fn or_fatal(self, source: &str) -> Option<T>;
}

impl<T> OrFatal<T> for Result<T> {
    fn or_fatal(self, source: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) if e.is_fatal() => fatal(source, &e),
            Err(e) => {
                crate::engine_warn!(source, "Recoverable error: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
