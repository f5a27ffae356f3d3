//! Copy orchestrator
//!
//! Dispatches a single object copy by endpoint kinds: local-to-remote
//! through the upload engine, remote-to-local through the download
//! engine, and remote-to-remote preferring one server-side copy call with
//! a two-phase fallback (download into a staging temp file, then upload
//! from it) when the store cannot satisfy the copy directly. The staging file
//! is owned by this one operation and released on every exit path.

use tokio_util::sync::CancellationToken;

use ferry_core::{
    with_timeout, CloudPath, Error, ObjectStore, ResolvedPath, Result, TransferConfig,
    TransferMetadata, TransferResult,
};

use crate::download::DownloadEngine;
use crate::strategy::{plan_copy, CopyStrategy};
use crate::upload::UploadEngine;

/// Copies single objects between any pairing of local and remote
pub struct CopyOrchestrator<'a, C: ObjectStore> {
    store: &'a C,
    config: &'a TransferConfig,
}

impl<'a, C: ObjectStore> CopyOrchestrator<'a, C> {
    pub fn new(store: &'a C, config: &'a TransferConfig) -> Self {
        Self { store, config }
    }

    /// Copy one object from source to destination.
    pub async fn copy(
        &self,
        source: &ResolvedPath,
        dest: &ResolvedPath,
    ) -> Result<TransferResult> {
        self.copy_cancellable(source, dest, &CancellationToken::new())
            .await
    }

    /// Copy with a cancellation token, for use under a batch or
    /// directory-copy parent.
    pub async fn copy_cancellable(
        &self,
        source: &ResolvedPath,
        dest: &ResolvedPath,
        cancel: &CancellationToken,
    ) -> Result<TransferResult> {
        match (source, dest) {
            (ResolvedPath::Local(src), ResolvedPath::Remote(dst)) => {
                UploadEngine::new(self.store, self.config)
                    .upload_cancellable(src, dst, cancel)
                    .await
            }
            (ResolvedPath::Remote(src), ResolvedPath::Local(dst)) => {
                DownloadEngine::new(self.store, self.config)
                    .download_cancellable(src, dst, cancel)
                    .await
            }
            (ResolvedPath::Remote(src), ResolvedPath::Remote(dst)) => {
                self.remote_to_remote(src, dst, cancel).await
            }
            (ResolvedPath::Local(_), ResolvedPath::Local(_)) => Err(Error::InvalidPath(
                "local-to-local copy is not handled by the transfer engine".into(),
            )),
        }
    }

    async fn remote_to_remote(
        &self,
        src: &CloudPath,
        dst: &CloudPath,
        cancel: &CancellationToken,
    ) -> Result<TransferResult> {
        if cancel.is_cancelled() {
            return Err(Error::Aborted("copy cancelled".into()));
        }

        let timeout = self.config.timeout();
        let meta = self
            .config
            .retry
            .run("head_object", || async {
                with_timeout("head_object", timeout, self.store.head_object(src)).await
            })
            .await?;
        let size = meta.size_bytes.unwrap_or(0);

        match plan_copy(size, self.config.server_side_copy_limit) {
            CopyStrategy::ServerSide => {
                let copied = self
                    .config
                    .retry
                    .run("copy_object", || async {
                        with_timeout("copy_object", timeout, self.store.copy_object(src, dst)).await
                    })
                    .await;

                match copied {
                    Ok(()) => {
                        tracing::info!("server-side copied {src} to {dst} ({size} bytes)");
                        Ok(TransferResult::ok(TransferMetadata {
                            bytes: size,
                            parts: 0,
                            ranges: 0,
                            strategy: Some("server-side-copy".into()),
                        }))
                    }
                    Err(err) if should_fall_back(&err) => {
                        tracing::warn!(
                            "server-side copy of {src} rejected ({err}), falling back to two-phase"
                        );
                        self.two_phase(src, dst, size, cancel).await
                    }
                    Err(err) => Err(err),
                }
            }
            CopyStrategy::TwoPhase => self.two_phase(src, dst, size, cancel).await,
        }
    }

    /// Download into a staging temp file, then upload it. The staging
    /// path is dropped, deleting the file, on success, failure and
    /// cancellation alike.
    async fn two_phase(
        &self,
        src: &CloudPath,
        dst: &CloudPath,
        size: u64,
        cancel: &CancellationToken,
    ) -> Result<TransferResult> {
        let staging = tempfile::NamedTempFile::new()?.into_temp_path();

        DownloadEngine::new(self.store, self.config)
            .download_cancellable(src, &staging, cancel)
            .await?;

        UploadEngine::new(self.store, self.config)
            .upload_cancellable(&staging, dst, cancel)
            .await?;

        tracing::info!("two-phase copied {src} to {dst} ({size} bytes)");
        Ok(TransferResult::ok(TransferMetadata {
            bytes: size,
            parts: 0,
            ranges: 0,
            strategy: Some("two-phase-copy".into()),
        }))
    }
}

/// Whether a server-side copy failure should trigger the two-phase
/// fallback. Fatal object errors (not found, access denied) would fail
/// the fallback the same way, so they surface directly.
fn should_fall_back(err: &Error) -> bool {
    matches!(
        err,
        Error::Unsupported(_) | Error::Network(_) | Error::Timeout(_)
    )
}
