//! Error types for plankton.

use thiserror::Error;

/// Main error type for all plankton operations.
///
/// Only structural wire problems surface through this type: bad magic,
/// unknown directives, input that ends in the middle of a frame. Semantic
/// value problems (mutating a frozen value, setting a sink twice, calling a
/// kind-specific mutator on the wrong kind) are reported as `false` returns
/// and never become errors.
#[derive(Debug, Error)]
pub enum PlanktonError {
    /// I/O error on the underlying byte stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream did not start with the plankton magic.
    #[error("stream header mismatch")]
    BadHeader,

    /// An unrecognized directive byte on a socket.
    #[error("unknown socket directive: {0:#04x}")]
    UnknownDirective(u8),

    /// The input ended in the middle of a directive.
    #[error("truncated directive")]
    Truncated,

    /// Protocol error (malformed frame, invalid field, etc.).
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Result type alias using PlanktonError.
pub type Result<T> = std::result::Result<T, PlanktonError>;
