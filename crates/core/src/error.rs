//! Error types for ferry-core
//!
//! Provides a unified error type shared by every s3ferry crate, plus the
//! retryable/fatal classification the transfer engine relies on.

use thiserror::Error;

/// Result type alias for ferry-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for s3ferry operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid or unresolvable path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Object or prefix absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Permission denied by the store
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Network error (retryable)
    #[error("Network error: {0}")]
    Network(String),

    /// Per-call timeout (retryable)
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Content integrity mismatch. Reserved: no code path in this core
    /// produces it yet, but callers may match on it.
    #[error("Integrity check failed: {0}")]
    Integrity(String),

    /// Cancelled by fail-fast or caller-initiated cancellation
    #[error("Aborted: {0}")]
    Aborted(String),

    /// Aggregate failure of a batch or directory operation
    #[error("{failed} of {total} items failed")]
    PartialBatch { failed: usize, total: usize },

    /// Operation the backend rejected as unsupported
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Whether this error is transient and worth retrying under backoff.
    ///
    /// Everything else is fatal: it surfaces immediately and is never
    /// retried (invalid path, not found, access denied, ...).
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Timeout(_))
    }

    /// Whether this error came from a cancellation signal rather than a
    /// real failure of the operation itself.
    pub const fn is_aborted(&self) -> bool {
        matches!(self, Error::Aborted(_))
    }
}
