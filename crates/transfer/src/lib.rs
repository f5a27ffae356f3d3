//! ferry-transfer: the s3ferry transfer engine
//!
//! Engines for moving data between a local filesystem and an
//! S3-compatible object store, layered over the ObjectStore trait from
//! ferry-core:
//!
//! - [`UploadEngine`]: single put or multipart with bounded buffering
//! - [`DownloadEngine`]: single get or concurrent ranged reads with
//!   adaptive throttling and fail-fast cancellation
//! - [`BatchCoordinator`]: many independent transfers under one
//!   concurrency limit, optionally fail-fast
//! - [`DirectoryService`]: prefix-convention directory emulation
//! - [`CopyOrchestrator`]: object copy with server-side preference and
//!   a two-phase staging fallback
//! - [`ops`]: the stateless operations facade host bindings consume

pub mod batch;
pub mod copy;
pub mod directory;
pub mod download;
pub mod ops;
pub mod strategy;
pub mod upload;

#[cfg(test)]
pub(crate) mod testutil;

pub use batch::{BatchCoordinator, BatchItem};
pub use copy::CopyOrchestrator;
pub use directory::{
    format_entries, DirEntry, DirectoryCopyError, DirectoryCopyReport, DirectoryService,
    ListFormat, TypeFilter,
};
pub use download::DownloadEngine;
pub use strategy::{
    plan_copy, plan_download, plan_upload, ByteRange, CopyStrategy, DownloadStrategy,
    RangePlan, UploadStrategy,
};
pub use upload::{MultipartSession, UploadEngine};
