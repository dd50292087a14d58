//! Error types for minirel storage operations.

use thiserror::Error;

/// Result type alias using [`MinirelError`].
pub type Result<T> = std::result::Result<T, MinirelError>;

/// Error types for minirel storage operations.
///
/// The taxonomy is deliberately closed: every failure surfaced by the frame
/// manager, the log manager, or recovery maps onto one of these variants.
/// A clean end-of-log is not an error; the log iterator reports it as
/// `Ok(None)`.
#[derive(Debug, Error)]
pub enum MinirelError {
    /// Frame pool or allocator exhaustion at initialization.
    #[error("out of memory: {0}")]
    NoMem(String),

    /// Malformed input: mismatched entry payload, unknown record type.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Invariant violation, e.g. frames still resident at cleanup.
    #[error("internal error: {0}")]
    Internal(String),

    /// Log read/write failure.
    #[error("I/O error: {0}")]
    Io(String),

    /// A log record header or payload ran off the end of the file.
    ///
    /// Distinct from [`MinirelError::Io`] so recovery can treat a torn tail
    /// as "stop scanning and roll back" while real I/O failures propagate.
    #[error("truncated log record at offset {offset}")]
    TruncatedRecord { offset: u64 },
}

impl MinirelError {
    /// Wraps an `std::io::Error` from a log file operation.
    pub(crate) fn io(context: &str, err: std::io::Error) -> Self {
        MinirelError::Io(format!("{context}: {err}"))
    }
}
