//! SDK error classification
//!
//! Maps aws-sdk-s3 failures onto the typed ferry-core error kinds so the
//! transfer engine can tell retryable failures from fatal ones. The SDK
//! surfaces service errors through their display strings, so matching on
//! the well-known S3 error codes is the portable approach across
//! S3-compatible backends.

use ferry_core::Error;

/// Classify an SDK error string for the given subject (key, bucket, ...).
pub fn classify(err: impl std::fmt::Display, subject: &str) -> Error {
    let text = err.to_string();

    if text.contains("NoSuchKey") || text.contains("NoSuchBucket") || text.contains("NotFound") {
        return Error::NotFound(subject.to_string());
    }
    if text.contains("AccessDenied") || text.contains("Forbidden") {
        return Error::AccessDenied(subject.to_string());
    }
    if text.contains("NotImplemented") || text.contains("MethodNotAllowed") {
        return Error::Unsupported(format!("{subject}: {text}"));
    }
    if text.contains("timed out") || text.contains("timeout") {
        return Error::Timeout(format!("{subject}: {text}"));
    }

    Error::Network(format!("{subject}: {text}"))
}
