//! Download engine
//!
//! Small objects use a single streamed read; large ones are split into a
//! range plan and fetched concurrently. Each completed range is written
//! at its own offset, so no inter-range ordering is needed. A rolling
//! throttle watches for bursts of connection-class failures and lowers
//! the dispatch concurrency within the download, recovering gradually as
//! ranges succeed. A non-retryable range failure cancels everything
//! in flight and fails the download immediately.

use std::io::SeekFrom;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use ferry_core::{
    with_timeout, CloudPath, Error, ObjectStore, Result, TransferConfig, TransferMetadata,
    TransferResult,
};

use crate::strategy::{plan_download, ByteRange, DownloadStrategy};

/// Consecutive connection-class failures that trigger a reduction
const THROTTLE_STRIKE_BURST: u32 = 3;

/// Successful ranges needed to win back one slot of concurrency
const THROTTLE_RECOVERY_WINDOW: u32 = 8;

#[derive(Debug)]
struct ThrottleState {
    limit: usize,
    strikes: u32,
    successes: u32,
}

/// Rolling concurrency limiter for ranged dispatch
///
/// A burst of [`THROTTLE_STRIKE_BURST`] transient failures halves the
/// active limit (floor 1); every [`THROTTLE_RECOVERY_WINDOW`] successes
/// win one slot back, up to the configured maximum. The dispatch loop
/// consults [`current`](Self::current) before launching each range, so a
/// reduction takes effect immediately.
#[derive(Debug)]
pub(crate) struct Throttle {
    max: usize,
    state: Mutex<ThrottleState>,
}

impl Throttle {
    pub(crate) fn new(max: usize) -> Self {
        let max = max.max(1);
        Self {
            max,
            state: Mutex::new(ThrottleState {
                limit: max,
                strikes: 0,
                successes: 0,
            }),
        }
    }

    pub(crate) fn current(&self) -> usize {
        self.state.lock().unwrap().limit
    }

    pub(crate) fn record_failure(&self) {
        let mut state = self.state.lock().unwrap();
        state.successes = 0;
        state.strikes += 1;
        if state.strikes >= THROTTLE_STRIKE_BURST && state.limit > 1 {
            state.limit = (state.limit / 2).max(1);
            state.strikes = 0;
            tracing::warn!(
                "connection failures observed, reducing range concurrency to {}",
                state.limit
            );
        }
    }

    pub(crate) fn record_success(&self) {
        let mut state = self.state.lock().unwrap();
        state.strikes = 0;
        state.successes += 1;
        if state.successes >= THROTTLE_RECOVERY_WINDOW && state.limit < self.max {
            state.limit += 1;
            state.successes = 0;
            tracing::debug!("range concurrency recovered to {}", state.limit);
        }
    }
}

/// Downloads objects from the store to local files
pub struct DownloadEngine<'a, C: ObjectStore> {
    store: &'a C,
    config: &'a TransferConfig,
}

impl<'a, C: ObjectStore> DownloadEngine<'a, C> {
    pub fn new(store: &'a C, config: &'a TransferConfig) -> Self {
        Self { store, config }
    }

    /// Download an object to the local destination.
    pub async fn download(&self, source: &CloudPath, dest: &Path) -> Result<TransferResult> {
        self.download_cancellable(source, dest, &CancellationToken::new())
            .await
    }

    /// Download with a cancellation token. Cancellation is cooperative:
    /// no new ranges are dispatched, in-flight ranges finish or stop at
    /// their next checkpoint, and the partial file is removed.
    pub async fn download_cancellable(
        &self,
        source: &CloudPath,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<TransferResult> {
        if cancel.is_cancelled() {
            return Err(Error::Aborted("download cancelled".into()));
        }

        let timeout = self.config.timeout();
        let meta = self
            .config
            .retry
            .run("head_object", || async {
                with_timeout("head_object", timeout, self.store.head_object(source)).await
            })
            .await?;
        let size = meta.size_bytes.unwrap_or(0);

        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        tracing::info!("downloading {source} ({size} bytes) to {}", dest.display());

        match plan_download(size, self.config.download_threshold, self.config.range_size) {
            DownloadStrategy::SingleGet => self.single_get(source, dest).await,
            DownloadStrategy::Ranged(plan) => {
                self.ranged(source, dest, size, &plan.ranges, cancel).await
            }
        }
    }

    async fn single_get(&self, source: &CloudPath, dest: &Path) -> Result<TransferResult> {
        let timeout = self.config.timeout();
        let data = self
            .config
            .retry
            .run("get_object", || async {
                with_timeout("get_object", timeout, self.store.get_object(source)).await
            })
            .await?;

        let bytes = data.len() as u64;
        tokio::fs::write(dest, &data).await?;

        Ok(TransferResult::ok(TransferMetadata {
            bytes,
            parts: 0,
            ranges: 0,
            strategy: Some("single-get".into()),
        }))
    }

    async fn ranged(
        &self,
        source: &CloudPath,
        dest: &Path,
        size: u64,
        ranges: &[ByteRange],
        cancel: &CancellationToken,
    ) -> Result<TransferResult> {
        let mut file = tokio::fs::File::create(dest).await?;
        file.set_len(size).await?;

        let throttle = Throttle::new(self.config.concurrency);
        let timeout = self.config.timeout();
        // Child token: fail-fast inside this download must not cancel
        // sibling operations sharing the parent token.
        let local_cancel = cancel.child_token();

        let mut in_flight = FuturesUnordered::new();
        let mut next = 0;
        let mut completed = 0usize;
        let mut failure: Option<Error> = None;

        loop {
            // Dispatch up to the current throttled limit
            if failure.is_none() && !local_cancel.is_cancelled() {
                while next < ranges.len() && in_flight.len() < throttle.current() {
                    let range = ranges[next];
                    next += 1;
                    in_flight.push(self.fetch_range(source, range, &throttle, &local_cancel, timeout));
                }
            }

            match in_flight.next().await {
                Some(Ok((offset, data))) => {
                    if failure.is_none() {
                        match write_at(&mut file, offset, &data).await {
                            Ok(()) => {
                                throttle.record_success();
                                completed += 1;
                            }
                            Err(err) => {
                                local_cancel.cancel();
                                failure = Some(err);
                            }
                        }
                    }
                }
                Some(Err(err)) => {
                    if failure.is_none() {
                        // Fail fast: stop dispatch and signal in-flight ranges
                        local_cancel.cancel();
                        failure = Some(err);
                    }
                }
                None => break,
            }
        }

        if failure.is_none() && local_cancel.is_cancelled() && completed < ranges.len() {
            failure = Some(Error::Aborted("download cancelled".into()));
        }

        if let Some(err) = failure {
            drop(file);
            let _ = tokio::fs::remove_file(dest).await;
            return Err(err);
        }

        file.flush().await?;

        Ok(TransferResult::ok(TransferMetadata {
            bytes: size,
            parts: 0,
            ranges: ranges.len(),
            strategy: Some("ranged".into()),
        }))
    }

    async fn fetch_range(
        &self,
        source: &CloudPath,
        range: ByteRange,
        throttle: &Throttle,
        cancel: &CancellationToken,
        timeout: Duration,
    ) -> Result<(u64, Bytes)> {
        if cancel.is_cancelled() {
            return Err(Error::Aborted("download cancelled".into()));
        }

        let data = self
            .config
            .retry
            .run_observed(
                "get_range",
                || async {
                    with_timeout(
                        "get_range",
                        timeout,
                        self.store.get_range(source, range.start, range.end),
                    )
                    .await
                },
                |_| throttle.record_failure(),
            )
            .await?;

        if data.len() as u64 != range.len() {
            tracing::warn!(
                "range {}..{} of {source} returned {} bytes, expected {}",
                range.start,
                range.end,
                data.len(),
                range.len()
            );
        }

        Ok((range.start, data))
    }
}

async fn write_at(file: &mut tokio::fs::File, offset: u64, data: &Bytes) -> Result<()> {
    file.seek(SeekFrom::Start(offset)).await?;
    file.write_all(data).await?;
    Ok(())
}
