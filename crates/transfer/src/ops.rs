//! Stateless operations facade
//!
//! One async function per external capability, written over
//! `(&impl ObjectStore, &TransferConfig)` with no global state, so any
//! host binding layer can adapt them without the engine depending on it.
//! Single-object transfer operations convert engine errors into failed
//! [`TransferResult`]s; data-returning operations (`get_bytes`,
//! `object_info`, `presign`, listings) surface typed errors instead.

use std::path::{Path, PathBuf};

use bytes::Bytes;

use ferry_core::{
    resolve, with_timeout, BatchReport, CloudPath, Error, ObjectMetadata, ObjectStore,
    PresignRequest, PresignedUrl, ResolvedPath, Result, TransferConfig, TransferMetadata,
    TransferRequest, TransferResult,
};

use crate::batch::BatchCoordinator;
use crate::copy::CopyOrchestrator;
use crate::directory::{
    format_entries, DirectoryCopyError, DirectoryCopyReport, DirectoryService, ListFormat,
    TypeFilter,
};
use crate::download::DownloadEngine;
use crate::upload::UploadEngine;

fn into_result(outcome: Result<TransferResult>) -> TransferResult {
    match outcome {
        Ok(result) => result,
        Err(err) => TransferResult::failed(err.to_string()),
    }
}

/// Resolve a raw path string against the configured default bucket.
pub fn resolve_path(config: &TransferConfig, raw: &str) -> Result<ResolvedPath> {
    resolve(raw, config.default_bucket.as_deref())
}

/// Upload a local file to the store.
pub async fn upload(
    store: &impl ObjectStore,
    config: &TransferConfig,
    source: &Path,
    dest: &CloudPath,
) -> TransferResult {
    into_result(UploadEngine::new(store, config).upload(source, dest).await)
}

/// Download an object to a local file.
pub async fn download(
    store: &impl ObjectStore,
    config: &TransferConfig,
    source: &CloudPath,
    dest: &Path,
) -> TransferResult {
    into_result(
        DownloadEngine::new(store, config)
            .download(source, dest)
            .await,
    )
}

/// Upload many local files under one concurrency limit.
pub async fn batch_upload(
    store: &impl ObjectStore,
    config: &TransferConfig,
    pairs: Vec<(PathBuf, CloudPath)>,
    concurrency: usize,
    fail_fast: bool,
) -> BatchReport {
    let items = pairs
        .into_iter()
        .map(|(source, dest)| {
            TransferRequest::new(
                ResolvedPath::Local(source),
                ResolvedPath::Remote(dest),
                config.clone(),
            )
        })
        .collect();
    BatchCoordinator::new(store)
        .run_batch(items, concurrency, fail_fast)
        .await
}

/// Download many objects under one concurrency limit.
pub async fn batch_download(
    store: &impl ObjectStore,
    config: &TransferConfig,
    pairs: Vec<(CloudPath, PathBuf)>,
    concurrency: usize,
    fail_fast: bool,
) -> BatchReport {
    let items = pairs
        .into_iter()
        .map(|(source, dest)| {
            TransferRequest::new(
                ResolvedPath::Remote(source),
                ResolvedPath::Local(dest),
                config.clone(),
            )
        })
        .collect();
    BatchCoordinator::new(store)
        .run_batch(items, concurrency, fail_fast)
        .await
}

/// Copy one object between any pairing of local and remote.
pub async fn copy(
    store: &impl ObjectStore,
    config: &TransferConfig,
    source: &ResolvedPath,
    dest: &ResolvedPath,
) -> TransferResult {
    into_result(CopyOrchestrator::new(store, config).copy(source, dest).await)
}

/// Delete one object.
pub async fn delete(
    store: &impl ObjectStore,
    config: &TransferConfig,
    path: &CloudPath,
) -> TransferResult {
    let timeout = config.timeout();
    let outcome = config
        .retry
        .run("delete_object", || async {
            with_timeout("delete_object", timeout, store.delete_object(path)).await
        })
        .await
        .map(|()| {
            TransferResult::ok(TransferMetadata {
                strategy: Some("delete".into()),
                ..Default::default()
            })
        });
    into_result(outcome)
}

/// Fetch a whole object as bytes. Fails with `NotFound` when absent.
pub async fn get_bytes(
    store: &impl ObjectStore,
    config: &TransferConfig,
    path: &CloudPath,
) -> Result<Bytes> {
    let timeout = config.timeout();
    config
        .retry
        .run("get_object", || async {
            with_timeout("get_object", timeout, store.get_object(path)).await
        })
        .await
}

/// Metadata for an object, or the prefix-aggregate form when the key
/// resolves to a directory rather than an object.
pub async fn object_info(
    store: &impl ObjectStore,
    config: &TransferConfig,
    path: &CloudPath,
) -> Result<ObjectMetadata> {
    let service = DirectoryService::new(store, config);
    if path.is_dir() {
        return service.info(path).await;
    }

    let timeout = config.timeout();
    let head = config
        .retry
        .run("head_object", || async {
            with_timeout("head_object", timeout, store.head_object(path)).await
        })
        .await;

    match head {
        Ok(meta) => Ok(meta),
        // No object at the key; it may still name a prefix with content
        Err(Error::NotFound(_)) => match service.info(path).await {
            Ok(meta) => Ok(meta),
            Err(Error::NotFound(_)) => Err(Error::NotFound(path.to_uri())),
            Err(err) => Err(err),
        },
        Err(err) => Err(err),
    }
}

/// Generate a presigned URL for the object.
pub async fn presign(
    store: &impl ObjectStore,
    path: &CloudPath,
    request: &PresignRequest,
) -> Result<PresignedUrl> {
    store.presign(path, request).await
}

/// Create a directory placeholder. Idempotent.
pub async fn directory_create(
    store: &impl ObjectStore,
    config: &TransferConfig,
    prefix: &CloudPath,
) -> TransferResult {
    into_result(DirectoryService::new(store, config).create(prefix).await)
}

/// Whether a directory exists (placeholder or any content).
pub async fn directory_exists(
    store: &impl ObjectStore,
    config: &TransferConfig,
    prefix: &CloudPath,
) -> Result<bool> {
    DirectoryService::new(store, config).exists(prefix).await
}

/// Delete a directory and everything under it.
pub async fn directory_delete(
    store: &impl ObjectStore,
    config: &TransferConfig,
    prefix: &CloudPath,
) -> TransferResult {
    into_result(DirectoryService::new(store, config).delete(prefix).await)
}

/// List a directory, rendered in the requested format.
pub async fn directory_list(
    store: &impl ObjectStore,
    config: &TransferConfig,
    prefix: &CloudPath,
    recurse: bool,
    name_filter: Option<&str>,
    type_filter: TypeFilter,
    format: ListFormat,
) -> Result<Vec<String>> {
    let entries = DirectoryService::new(store, config)
        .list(prefix, recurse, name_filter, type_filter)
        .await?;
    Ok(format_entries(&entries, format))
}

/// Recursively copy a directory tree between prefixes.
pub async fn directory_copy(
    store: &impl ObjectStore,
    config: &TransferConfig,
    source: &CloudPath,
    dest: &CloudPath,
    recurse: bool,
) -> DirectoryCopyReport {
    match DirectoryService::new(store, config)
        .copy_dir(source, dest, recurse)
        .await
    {
        Ok(report) => report,
        Err(err) => DirectoryCopyReport {
            success: false,
            copied: 0,
            errors: vec![DirectoryCopyError {
                key: source.to_dir().key,
                message: err.to_string(),
            }],
        },
    }
}
