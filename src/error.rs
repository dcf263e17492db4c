//! Unified error types for the kernel and calibration engine.
//!
//! Follows embedded best practice: a single `Error` enum that every
//! subsystem can convert into, keeping error handling at the dispatch
//! boundary uniform.  All variants are `Copy` so they can be passed
//! through the dispatcher without allocation.
//!
//! Resource-exhaustion paths (queue full, slab empty, task table full)
//! deliberately surface as `bool`/`Option` on the public kernel API —
//! those callers have no error channel and must tolerate loss.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation with an error channel funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Kernel-side failure (task table, app host, event plumbing).
    Kernel(KernelError),
    /// An app image frame or header failed validation.
    Image(ImageError),
    /// The protected-region writer rejected an operation.
    Flash(FlashError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kernel(e) => write!(f, "kernel: {e}"),
            Self::Image(e) => write!(f, "image: {e}"),
            Self::Flash(e) => write!(f, "flash: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Kernel errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// No free slot in the task table.
    TaskTableFull,
    /// The app host failed to load the image.
    AppLoadFailed,
    /// The app's init entry returned failure.
    AppInitFailed,
    /// No live task with the requested TID.
    TaskNotFound,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TaskTableFull => write!(f, "task table full"),
            Self::AppLoadFailed => write!(f, "app load failed"),
            Self::AppInitFailed => write!(f, "app init failed"),
            Self::TaskNotFound => write!(f, "task not found"),
        }
    }
}

impl From<KernelError> for Error {
    fn from(e: KernelError) -> Self {
        Self::Kernel(e)
    }
}

// ---------------------------------------------------------------------------
// Image errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageError {
    /// Frame or header extends past the end of the region.
    Truncated,
    /// Header magic mismatch.
    BadMagic,
    /// Header format version is not the current one.
    BadFormatVersion,
    /// Marker is not `VALID` (deleted or internal-only).
    NotValid,
    /// Frame trailer CRC mismatch.
    BadCrc,
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "truncated"),
            Self::BadMagic => write!(f, "bad magic"),
            Self::BadFormatVersion => write!(f, "bad format version"),
            Self::NotValid => write!(f, "marker not valid"),
            Self::BadCrc => write!(f, "bad CRC"),
        }
    }
}

impl From<ImageError> for Error {
    fn from(e: ImageError) -> Self {
        Self::Image(e)
    }
}

// ---------------------------------------------------------------------------
// Flash errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashError {
    /// Write range falls outside the shared region.
    OutOfBounds,
    /// The underlying programming primitive failed.
    WriteFailed,
}

impl fmt::Display for FlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds => write!(f, "write out of bounds"),
            Self::WriteFailed => write!(f, "write failed"),
        }
    }
}

impl From<FlashError> for Error {
    fn from(e: FlashError) -> Self {
        Self::Flash(e)
    }
}

// ---------------------------------------------------------------------------
// Fatal sink
// ---------------------------------------------------------------------------

/// Unrecoverable-state sink.  Hosts may treat this as a reboot or
/// breakpoint hook; the default logs and panics rather than spinning.
pub fn fatal_error(msg: &str) -> ! {
    log::error!("FATAL: {msg}");
    panic!("{}", msg);
}

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
