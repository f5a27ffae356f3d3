//! ferry-core: Core library for the s3ferry transfer engine
//!
//! This crate provides the SDK-independent building blocks of s3ferry:
//! - Path classification and resolution (local vs remote, bucket/key)
//! - The ObjectStore trait over which the transfer engine operates
//! - Transfer option, result and report types
//! - A shared retry/backoff primitive
//!
//! This crate is designed to be independent of any specific S3 SDK,
//! allowing the engines to be tested against mocks and in-memory stores.

pub mod config;
pub mod error;
pub mod path;
pub mod retry;
pub mod traits;
pub mod types;

pub use config::{StoreConfig, TransferConfig};
pub use error::{Error, Result};
pub use path::{resolve, CloudPath, ResolvedPath};
pub use retry::{with_timeout, RetryPolicy};
pub use traits::{
    ListPage, ObjectMetadata, ObjectStore, ObjectSummary, PartEtag, PresignMethod,
    PresignRequest, PresignedUrl, ResponseOverrides,
};
pub use types::{BatchError, BatchReport, TransferMetadata, TransferRequest, TransferResult};
