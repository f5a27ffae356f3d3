//! Upload engine
//!
//! Chooses single-put or multipart from the size threshold and drives the
//! multipart protocol: initiate, bounded-concurrency part loop with
//! retries, then commit, or an explicit abort on any failure. A
//! multipart session is never left implicit: every initiation reaches
//! exactly one of complete or abort.

use std::io::SeekFrom;
use std::path::Path;

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::sync::CancellationToken;

use ferry_core::{
    with_timeout, CloudPath, Error, ObjectStore, PartEtag, Result, TransferConfig,
    TransferMetadata, TransferResult,
};

use crate::strategy::{plan_upload, ByteRange, RangePlan, UploadStrategy};

/// Live state of one multipart upload attempt
#[derive(Debug)]
pub struct MultipartSession {
    /// Upload id issued by the store
    pub upload_id: String,
    /// Destination bucket
    pub bucket: String,
    /// Destination key
    pub key: String,
    /// Parts completed so far
    pub parts: Vec<PartEtag>,
}

/// Uploads local files to the object store
pub struct UploadEngine<'a, C: ObjectStore> {
    store: &'a C,
    config: &'a TransferConfig,
}

impl<'a, C: ObjectStore> UploadEngine<'a, C> {
    pub fn new(store: &'a C, config: &'a TransferConfig) -> Self {
        Self { store, config }
    }

    /// Upload a local file to the destination.
    pub async fn upload(&self, source: &Path, dest: &CloudPath) -> Result<TransferResult> {
        self.upload_cancellable(source, dest, &CancellationToken::new())
            .await
    }

    /// Upload with a cancellation token. Cancellation is cooperative: the
    /// part loop stops at the next part boundary and the session is
    /// aborted.
    pub async fn upload_cancellable(
        &self,
        source: &Path,
        dest: &CloudPath,
        cancel: &CancellationToken,
    ) -> Result<TransferResult> {
        if cancel.is_cancelled() {
            return Err(Error::Aborted("upload cancelled".into()));
        }

        let meta = tokio::fs::metadata(source)
            .await
            .map_err(|e| Error::InvalidPath(format!("{}: {e}", source.display())))?;
        if !meta.is_file() {
            return Err(Error::InvalidPath(format!(
                "{} is not a regular file",
                source.display()
            )));
        }
        let size = meta.len();
        let content_type = self.content_type(source);

        tracing::info!("uploading {} ({size} bytes) to {dest}", source.display());

        match plan_upload(size, self.config.multipart_threshold, self.config.part_size) {
            UploadStrategy::SinglePut => {
                self.single_put(source, dest, size, content_type.as_deref())
                    .await
            }
            UploadStrategy::Multipart { part_size } => {
                self.multipart(source, dest, size, part_size, content_type.as_deref(), cancel)
                    .await
            }
        }
    }

    fn content_type(&self, source: &Path) -> Option<String> {
        self.config.content_type.clone().or_else(|| {
            mime_guess::from_path(source)
                .first()
                .map(|m| m.essence_str().to_string())
        })
    }

    async fn single_put(
        &self,
        source: &Path,
        dest: &CloudPath,
        size: u64,
        content_type: Option<&str>,
    ) -> Result<TransferResult> {
        let data = Bytes::from(tokio::fs::read(source).await?);
        let timeout = self.config.timeout();

        self.config
            .retry
            .run("put_object", || {
                let data = data.clone();
                async move {
                    with_timeout("put_object", timeout, self.store.put_object(dest, data, content_type))
                        .await
                }
            })
            .await?;

        Ok(TransferResult::ok(TransferMetadata {
            bytes: size,
            parts: 0,
            ranges: 0,
            strategy: Some("single-put".into()),
        }))
    }

    async fn multipart(
        &self,
        source: &Path,
        dest: &CloudPath,
        size: u64,
        part_size: u64,
        content_type: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<TransferResult> {
        let timeout = self.config.timeout();

        // Initiate. Failure here is fatal: no remote state exists yet.
        let upload_id = self
            .config
            .retry
            .run("create_multipart", || async {
                with_timeout(
                    "create_multipart",
                    timeout,
                    self.store.create_multipart(dest, content_type),
                )
                .await
            })
            .await?;

        let mut session = MultipartSession {
            upload_id,
            bucket: dest.bucket.clone(),
            key: dest.key.clone(),
            parts: Vec::new(),
        };
        tracing::debug!("multipart upload {} started for {dest}", session.upload_id);

        let plan = RangePlan::for_object(size, part_size);
        let total_parts = plan.len();
        let upload_id = session.upload_id.clone();

        // Part loop. buffered(n) holds at most n part buffers in memory
        // at once, never the whole file.
        let mut parts_stream = stream::iter(plan.ranges.iter().copied().enumerate().map(
            |(idx, range)| {
                let part_number = (idx + 1) as i32;
                let upload_id = upload_id.as_str();
                async move {
                    if cancel.is_cancelled() {
                        return Err(Error::Aborted("upload cancelled".into()));
                    }
                    let data = read_file_range(source, range).await?;
                    tracing::debug!(
                        "uploading part {part_number}/{total_parts} ({} bytes) of {dest}",
                        data.len()
                    );
                    let etag = self
                        .config
                        .retry
                        .run("upload_part", || {
                            let data = data.clone();
                            async move {
                                with_timeout(
                                    "upload_part",
                                    timeout,
                                    self.store.upload_part(dest, upload_id, part_number, data),
                                )
                                .await
                            }
                        })
                        .await?;
                    Ok(PartEtag { part_number, etag })
                }
            },
        ))
        .buffered(self.config.max_buffered_parts.max(1));

        let mut failure: Option<Error> = None;
        while let Some(result) = parts_stream.next().await {
            match result {
                Ok(part) => session.parts.push(part),
                Err(err) => {
                    // Dropping the stream drops the in-flight part futures
                    failure = Some(err);
                    break;
                }
            }
        }
        drop(parts_stream);

        if failure.is_none() && cancel.is_cancelled() {
            failure = Some(Error::Aborted("upload cancelled".into()));
        }

        if let Some(err) = failure {
            self.abort(dest, &session.upload_id).await;
            return Err(err);
        }

        // Commit with parts ordered by part number; they may have
        // completed in any order.
        session.parts.sort_by_key(|p| p.part_number);
        let commit = self
            .config
            .retry
            .run("complete_multipart", || async {
                with_timeout(
                    "complete_multipart",
                    timeout,
                    self.store
                        .complete_multipart(dest, &session.upload_id, &session.parts),
                )
                .await
            })
            .await;

        if let Err(err) = commit {
            self.abort(dest, &session.upload_id).await;
            return Err(err);
        }

        tracing::info!(
            "multipart upload {} committed: {total_parts} part(s), {size} bytes",
            session.upload_id
        );
        Ok(TransferResult::ok(TransferMetadata {
            bytes: size,
            parts: total_parts,
            ranges: 0,
            strategy: Some("multipart".into()),
        }))
    }

    /// Best-effort release of the remote session. An abort failure is
    /// logged and the original upload failure stays the reported cause.
    async fn abort(&self, dest: &CloudPath, upload_id: &str) {
        match with_timeout(
            "abort_multipart",
            self.config.timeout(),
            self.store.abort_multipart(dest, upload_id),
        )
        .await
        {
            Ok(()) => tracing::debug!("aborted multipart upload {upload_id} for {dest}"),
            Err(err) => {
                tracing::warn!("failed to abort multipart upload {upload_id} for {dest}: {err}")
            }
        }
    }
}

async fn read_file_range(source: &Path, range: ByteRange) -> Result<Bytes> {
    let mut file = tokio::fs::File::open(source).await?;
    file.seek(SeekFrom::Start(range.start)).await?;
    let mut buf = vec![0u8; range.len() as usize];
    file.read_exact(&mut buf).await?;
    Ok(Bytes::from(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{remote, test_config, MockStore};
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const MIB: u64 = 1024 * 1024;

    fn temp_file(size: usize) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        file.write_all(&data).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test(start_paused = true)]
    async fn test_size_at_threshold_uses_single_put() {
        let source = temp_file(1024);
        let config = test_config().multipart_threshold(1024);
        let dest = remote("file.bin");

        let mut store = MockStore::new();
        store
            .expect_put_object()
            .times(1)
            .returning(|_, _, _| Ok(()));
        store.expect_create_multipart().never();

        let result = UploadEngine::new(&store, &config)
            .upload(source.path(), &dest)
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.metadata.strategy.as_deref(), Some("single-put"));
        assert_eq!(result.metadata.bytes, 1024);
    }

    #[tokio::test(start_paused = true)]
    async fn test_size_over_threshold_uses_multipart() {
        // 11 MiB at a 8 MiB threshold with the 5 MiB part floor -> 3 parts
        let source = temp_file((11 * MIB) as usize);
        let config = test_config()
            .multipart_threshold(8 * MIB)
            .part_size(5 * MIB);
        let dest = remote("large.bin");

        let uploaded = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&uploaded);

        let mut store = MockStore::new();
        store.expect_put_object().never();
        store
            .expect_create_multipart()
            .times(1)
            .returning(|_, _| Ok("upload-1".to_string()));
        store
            .expect_upload_part()
            .times(3)
            .returning(move |_, _, part_number, data| {
                counter.fetch_add(data.len(), Ordering::SeqCst);
                Ok(format!("etag-{part_number}"))
            });
        store
            .expect_complete_multipart()
            .times(1)
            .withf(|_, upload_id, parts| {
                upload_id == "upload-1"
                    && parts.len() == 3
                    && parts.windows(2).all(|p| p[0].part_number < p[1].part_number)
            })
            .returning(|_, _, _| Ok(()));
        store.expect_abort_multipart().never();

        let result = UploadEngine::new(&store, &config)
            .upload(source.path(), &dest)
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.metadata.parts, 3);
        assert_eq!(result.metadata.strategy.as_deref(), Some("multipart"));
        assert_eq!(uploaded.load(Ordering::SeqCst) as u64, 11 * MIB);
    }

    #[tokio::test(start_paused = true)]
    async fn test_part_retry_exhaustion_aborts_session() {
        let source = temp_file((6 * MIB) as usize);
        let config = test_config()
            .multipart_threshold(5 * MIB)
            .part_size(5 * MIB);
        let dest = remote("flaky.bin");

        let mut store = MockStore::new();
        store
            .expect_create_multipart()
            .times(1)
            .returning(|_, _| Ok("upload-2".to_string()));
        // Every attempt fails transiently; budget is 2 attempts
        store
            .expect_upload_part()
            .returning(|_, _, _, _| Err(Error::Network("connection reset".into())));
        store.expect_complete_multipart().never();
        store
            .expect_abort_multipart()
            .times(1)
            .withf(|_, upload_id| upload_id == "upload-2")
            .returning(|_, _| Ok(()));

        let result = UploadEngine::new(&store, &config)
            .upload(source.path(), &dest)
            .await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_failure_aborts_session() {
        let source = temp_file((6 * MIB) as usize);
        let config = test_config()
            .multipart_threshold(5 * MIB)
            .part_size(5 * MIB);
        let dest = remote("half.bin");

        let mut store = MockStore::new();
        store
            .expect_create_multipart()
            .times(1)
            .returning(|_, _| Ok("upload-3".to_string()));
        store
            .expect_upload_part()
            .returning(|_, _, part_number, _| Ok(format!("etag-{part_number}")));
        store
            .expect_complete_multipart()
            .returning(|_, _, _| Err(Error::AccessDenied("commit".into())));
        store
            .expect_abort_multipart()
            .times(1)
            .returning(|_, _| Ok(()));

        let result = UploadEngine::new(&store, &config)
            .upload(source.path(), &dest)
            .await;
        assert!(matches!(result, Err(Error::AccessDenied(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_put_is_retried() {
        let source = temp_file(100);
        let config = test_config();
        let dest = remote("retry.bin");

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut store = MockStore::new();
        store.expect_put_object().times(2).returning(move |_, _, _| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(Error::Timeout("slow".into()))
            } else {
                Ok(())
            }
        });

        let result = UploadEngine::new(&store, &config)
            .upload(source.path(), &dest)
            .await
            .unwrap();
        assert!(result.success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start() {
        let source = temp_file(100);
        let config = test_config();
        let dest = remote("cancelled.bin");

        let store = MockStore::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = UploadEngine::new(&store, &config)
            .upload_cancellable(source.path(), &dest, &cancel)
            .await;
        assert!(matches!(result, Err(Error::Aborted(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_source_is_invalid_path() {
        let config = test_config();
        let dest = remote("missing.bin");
        let store = MockStore::new();

        let result = UploadEngine::new(&store, &config)
            .upload(Path::new("/nonexistent/file.bin"), &dest)
            .await;
        assert!(matches!(result, Err(Error::InvalidPath(_))));
    }
}
