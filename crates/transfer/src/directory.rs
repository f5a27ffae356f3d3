//! Directory emulation over the flat namespace
//!
//! A directory is a key convention, not a storage type: a zero-length
//! placeholder object whose key ends in `/`, plus implicitly any object
//! sharing that prefix. This module layers create/exists/list/delete and
//! recursive copy on top of prefix enumeration; directories and objects
//! are the same primitive distinguished only by key shape and content.

use std::collections::BTreeMap;

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use ferry_core::{
    with_timeout, CloudPath, Error, ObjectStore, ObjectMetadata, ObjectSummary, ResolvedPath,
    Result, TransferConfig, TransferMetadata, TransferResult,
};

use crate::copy::CopyOrchestrator;
use crate::strategy::DELETE_BATCH_MAX;

/// Entry type filter for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeFilter {
    #[default]
    All,
    Files,
    Directories,
}

/// Output shape for rendered listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListFormat {
    /// Full `s3://bucket/key` URIs
    #[default]
    Path,
    /// Entry names only
    Name,
    /// Timestamped detail lines
    Detail,
}

/// One logical entry under a prefix
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub path: CloudPath,
    /// Last key component, without any trailing separator
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub last_modified: Option<jiff::Timestamp>,
}

/// Per-key failure inside a directory copy
#[derive(Debug, Clone, Serialize)]
pub struct DirectoryCopyError {
    pub key: String,
    pub message: String,
}

/// Aggregate outcome of a directory copy
#[derive(Debug, Clone, Serialize)]
pub struct DirectoryCopyReport {
    pub success: bool,
    pub copied: usize,
    pub errors: Vec<DirectoryCopyError>,
}

/// Prefix-convention directory operations
pub struct DirectoryService<'a, C: ObjectStore> {
    store: &'a C,
    config: &'a TransferConfig,
}

impl<'a, C: ObjectStore> DirectoryService<'a, C> {
    pub fn new(store: &'a C, config: &'a TransferConfig) -> Self {
        Self { store, config }
    }

    /// Create a directory by writing its zero-length placeholder.
    /// Idempotent: re-creating an existing directory overwrites the
    /// placeholder with itself and succeeds.
    pub async fn create(&self, prefix: &CloudPath) -> Result<TransferResult> {
        let dir = prefix.to_dir();
        let timeout = self.config.timeout();

        self.config
            .retry
            .run("put_placeholder", || async {
                with_timeout(
                    "put_placeholder",
                    timeout,
                    self.store.put_object(&dir, Bytes::new(), None),
                )
                .await
            })
            .await?;

        tracing::debug!("created directory placeholder {dir}");
        Ok(TransferResult::ok(TransferMetadata {
            strategy: Some("directory-create".into()),
            ..Default::default()
        }))
    }

    /// Whether the directory exists: its placeholder is present, or at
    /// least one object lives under the prefix.
    pub async fn exists(&self, prefix: &CloudPath) -> Result<bool> {
        let dir = prefix.to_dir();
        let timeout = self.config.timeout();

        let head = self
            .config
            .retry
            .run("head_placeholder", || async {
                with_timeout("head_placeholder", timeout, self.store.head_object(&dir)).await
            })
            .await;
        match head {
            Ok(_) => return Ok(true),
            Err(Error::NotFound(_)) => {}
            Err(err) => return Err(err),
        }

        // No placeholder; a directory with real content still exists
        let page = self
            .config
            .retry
            .run("list_page", || async {
                with_timeout(
                    "list_page",
                    timeout,
                    self.store
                        .list_page(&dir.bucket, &dir.key, None, None, Some(1)),
                )
                .await
            })
            .await?;

        Ok(!page.objects.is_empty())
    }

    /// Enumerate entries under the prefix.
    ///
    /// With `recurse` unset, keys past the next separator collapse into
    /// one logical sub-directory entry each. The glob `name_filter`
    /// applies to entry names, `type_filter` to the entry kind.
    pub async fn list(
        &self,
        prefix: &CloudPath,
        recurse: bool,
        name_filter: Option<&str>,
        type_filter: TypeFilter,
    ) -> Result<Vec<DirEntry>> {
        let pattern = name_filter
            .map(glob::Pattern::new)
            .transpose()
            .map_err(|e| Error::InvalidPath(format!("invalid filter pattern: {e}")))?;

        let dir = prefix.to_dir();
        let delimiter = if recurse { None } else { Some("/") };
        let (objects, prefixes) = self.collect_pages(&dir, delimiter).await?;

        // Keyed map: collapsed entries and placeholders can overlap
        let mut entries: BTreeMap<String, DirEntry> = BTreeMap::new();

        for sub in prefixes {
            let name = last_component(&sub);
            entries.insert(
                sub.clone(),
                DirEntry {
                    path: CloudPath::new(&dir.bucket, &sub)?,
                    name,
                    is_dir: true,
                    size: 0,
                    last_modified: None,
                },
            );
        }

        for object in objects {
            // The prefix's own placeholder is the marker, not an entry
            if object.key == dir.key {
                continue;
            }
            let is_dir = object.key.ends_with('/');
            entries.insert(
                object.key.clone(),
                DirEntry {
                    path: CloudPath::new(&dir.bucket, &object.key)?,
                    name: last_component(&object.key),
                    is_dir,
                    size: object.size,
                    last_modified: object.last_modified,
                },
            );
        }

        let filtered = entries
            .into_values()
            .filter(|entry| match type_filter {
                TypeFilter::All => true,
                TypeFilter::Files => !entry.is_dir,
                TypeFilter::Directories => entry.is_dir,
            })
            .filter(|entry| {
                pattern
                    .as_ref()
                    .map(|p| p.matches(&entry.name))
                    .unwrap_or(true)
            })
            .collect();

        Ok(filtered)
    }

    /// Delete everything under the prefix, the placeholder included.
    /// Zero matching objects is success, not an error.
    pub async fn delete(&self, prefix: &CloudPath) -> Result<TransferResult> {
        let dir = prefix.to_dir();
        let (objects, _) = self.collect_pages(&dir, None).await?;

        if objects.is_empty() {
            return Ok(TransferResult::ok(TransferMetadata {
                strategy: Some("directory-delete".into()),
                ..Default::default()
            }));
        }

        let total_bytes: u64 = objects.iter().map(|o| o.size).sum();
        let count = objects.len();
        let keys: Vec<String> = objects.into_iter().map(|o| o.key).collect();
        let timeout = self.config.timeout();

        let mut confirmed = 0usize;
        let bucket = dir.bucket.as_str();
        for chunk in keys.chunks(DELETE_BATCH_MAX) {
            let deleted = self
                .config
                .retry
                .run("delete_objects", || {
                    let chunk = chunk.to_vec();
                    async move {
                        with_timeout(
                            "delete_objects",
                            timeout,
                            self.store.delete_objects(bucket, chunk),
                        )
                        .await
                    }
                })
                .await?;
            confirmed += deleted.len();
        }

        if confirmed < count {
            return Err(Error::PartialBatch {
                failed: count - confirmed,
                total: count,
            });
        }

        tracing::info!("deleted {count} object(s) under {dir}");
        Ok(TransferResult::ok(TransferMetadata {
            bytes: total_bytes,
            strategy: Some("directory-delete".into()),
            ..Default::default()
        }))
    }

    /// Aggregate metadata for the prefix: object count, total size and
    /// the latest modification time. `NotFound` when neither placeholder
    /// nor content exists.
    pub async fn info(&self, prefix: &CloudPath) -> Result<ObjectMetadata> {
        let dir = prefix.to_dir();
        let (objects, _) = self.collect_pages(&dir, None).await?;

        if objects.is_empty() {
            return Err(Error::NotFound(dir.to_uri()));
        }

        let mut count = 0u64;
        let mut total = 0u64;
        let mut latest: Option<jiff::Timestamp> = None;
        for object in &objects {
            // Placeholders mark structure; only real objects count
            if object.key.ends_with('/') {
                continue;
            }
            count += 1;
            total += object.size;
            if let Some(ts) = object.last_modified {
                latest = Some(latest.map_or(ts, |cur| cur.max(ts)));
            }
        }

        Ok(ObjectMetadata::directory(&dir.key, count, total, latest))
    }

    /// Copy every object under the source prefix to the destination
    /// prefix, re-basing relative keys. Succeeds only if every
    /// constituent copy succeeds; partial failure reports the failed
    /// keys.
    pub async fn copy_dir(
        &self,
        source: &CloudPath,
        dest: &CloudPath,
        recurse: bool,
    ) -> Result<DirectoryCopyReport> {
        let src_dir = source.to_dir();
        let dst_dir = dest.to_dir();
        let delimiter = if recurse { None } else { Some("/") };
        let (objects, _) = self.collect_pages(&src_dir, delimiter).await?;

        tracing::info!(
            "copying {} object(s) from {src_dir} to {dst_dir}",
            objects.len()
        );

        let cancel = CancellationToken::new();
        let outcomes: Vec<(String, Result<TransferResult>)> = stream::iter(objects)
            .map(|object| {
                let src_dir = &src_dir;
                let dst_dir = &dst_dir;
                let cancel = cancel.clone();
                async move {
                    let relative = object
                        .key
                        .strip_prefix(&src_dir.key)
                        .unwrap_or(&object.key)
                        .to_string();
                    let from = CloudPath::new(&src_dir.bucket, &object.key);
                    let to = CloudPath::new(&dst_dir.bucket, format!("{}{relative}", dst_dir.key));
                    let outcome = match (from, to) {
                        (Ok(from), Ok(to)) => {
                            CopyOrchestrator::new(self.store, self.config)
                                .copy_cancellable(
                                    &ResolvedPath::Remote(from),
                                    &ResolvedPath::Remote(to),
                                    &cancel,
                                )
                                .await
                        }
                        (Err(err), _) | (_, Err(err)) => Err(err),
                    };
                    (object.key, outcome)
                }
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        let mut report = DirectoryCopyReport {
            success: true,
            copied: 0,
            errors: Vec::new(),
        };
        for (key, outcome) in outcomes {
            match outcome {
                Ok(_) => report.copied += 1,
                Err(err) => report.errors.push(DirectoryCopyError {
                    key,
                    message: err.to_string(),
                }),
            }
        }
        report.errors.sort_by(|a, b| a.key.cmp(&b.key));
        report.success = report.errors.is_empty();
        Ok(report)
    }

    /// Paginate a prefix enumeration to exhaustion.
    async fn collect_pages(
        &self,
        dir: &CloudPath,
        delimiter: Option<&str>,
    ) -> Result<(Vec<ObjectSummary>, Vec<String>)> {
        let timeout = self.config.timeout();
        let mut objects = Vec::new();
        let mut prefixes = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let token = continuation_token.clone();
            let page = self
                .config
                .retry
                .run("list_page", || {
                    let token = token.clone();
                    async move {
                        with_timeout(
                            "list_page",
                            timeout,
                            self.store
                                .list_page(&dir.bucket, &dir.key, delimiter, token, None),
                        )
                        .await
                    }
                })
                .await?;

            objects.extend(page.objects);
            prefixes.extend(page.common_prefixes);

            if page.truncated {
                continuation_token = page.continuation_token;
            } else {
                break;
            }
        }

        Ok((objects, prefixes))
    }
}

/// Render entries in the requested output shape.
pub fn format_entries(entries: &[DirEntry], format: ListFormat) -> Vec<String> {
    entries
        .iter()
        .map(|entry| match format {
            ListFormat::Path => entry.path.to_uri(),
            ListFormat::Name => {
                if entry.is_dir {
                    format!("{}/", entry.name)
                } else {
                    entry.name.clone()
                }
            }
            ListFormat::Detail => {
                let date = entry
                    .last_modified
                    .map(|ts| ts.strftime("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "                   ".to_string());
                let size = humansize::format_size(entry.size, humansize::BINARY);
                format!("[{date}] {size:>10} {}", entry.path.to_uri())
            }
        })
        .collect()
}

fn last_component(key: &str) -> String {
    key.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}
