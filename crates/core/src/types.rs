//! Transfer request, result and report types
//!
//! Every public operation of the engine returns a value from this module;
//! callers never have to infer failure from missing output.

use serde::Serialize;

use crate::config::TransferConfig;
use crate::path::ResolvedPath;

/// One transfer operation: a source, a destination and its options.
/// Consumed read-only by the engines.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub source: ResolvedPath,
    pub destination: ResolvedPath,
    pub options: TransferConfig,
}

impl TransferRequest {
    pub fn new(source: ResolvedPath, destination: ResolvedPath, options: TransferConfig) -> Self {
        Self {
            source,
            destination,
            options,
        }
    }
}

/// Bookkeeping attached to a terminal transfer result
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransferMetadata {
    /// Bytes moved
    pub bytes: u64,
    /// Multipart parts used (0 for single-shot)
    pub parts: usize,
    /// Ranged reads used (0 for single-shot)
    pub ranges: usize,
    /// Strategy the engine chose, e.g. "single-put" or "multipart"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
}

/// Terminal outcome of one transfer operation. Immutable once produced.
#[derive(Debug, Clone, Serialize)]
pub struct TransferResult {
    pub success: bool,
    pub error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub metadata: TransferMetadata,
}

impl TransferResult {
    /// Successful result with its metadata
    pub fn ok(metadata: TransferMetadata) -> Self {
        Self {
            success: true,
            error: false,
            message: None,
            metadata,
        }
    }

    /// Failed result carrying the cause
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: true,
            message: Some(message.into()),
            metadata: TransferMetadata::default(),
        }
    }
}

/// Per-item failure inside a batch report
#[derive(Debug, Clone, Serialize)]
pub struct BatchError {
    /// Input index of the failed item
    pub index: usize,
    pub message: String,
}

/// Aggregate outcome of a batch run
///
/// `results` holds one entry per item that reached a terminal state,
/// ordered by input index. Under fail-fast, items cancelled before
/// reaching a terminal state appear only in `aborted`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub success: bool,
    pub results: Vec<TransferResult>,
    pub errors: Vec<BatchError>,
    pub aborted: Vec<usize>,
}

impl BatchReport {
    /// True iff every item completed successfully and none were aborted.
    pub fn all_succeeded(&self) -> bool {
        self.errors.is_empty() && self.aborted.is_empty() && self.results.iter().all(|r| r.success)
    }
}
