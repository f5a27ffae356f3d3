//! Batch coordinator
//!
//! Runs many independent transfer operations on a bounded worker pool.
//! With fail-fast enabled, the first item failure cancels outstanding and
//! unscheduled items; otherwise every item runs to completion and the
//! report carries one result per input, in input order. Result slots are
//! always ordered by input index regardless of completion order.

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use ferry_core::{
    BatchError, BatchReport, Error, ObjectStore, ResolvedPath, Result, TransferRequest,
    TransferResult,
};

use crate::download::DownloadEngine;
use crate::upload::UploadEngine;

/// One batch entry: a transfer request tagged with its input index,
/// which orders its slot in the report
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub index: usize,
    pub request: TransferRequest,
}

/// Coordinates independent transfers under one concurrency limit
pub struct BatchCoordinator<'a, C: ObjectStore> {
    store: &'a C,
}

impl<'a, C: ObjectStore> BatchCoordinator<'a, C> {
    pub fn new(store: &'a C) -> Self {
        Self { store }
    }

    /// Run the batch with a worker pool of `concurrency` slots.
    ///
    /// Cancellation under fail-fast is cooperative: un-started items
    /// never start, and items mid-flight stop at their next checkpoint
    /// and clean up after themselves (multipart sessions aborted, partial
    /// files removed).
    pub async fn run_batch(
        &self,
        items: Vec<TransferRequest>,
        concurrency: usize,
        fail_fast: bool,
    ) -> BatchReport {
        let total = items.len();
        let cancel = CancellationToken::new();
        let items: Vec<BatchItem> = items
            .into_iter()
            .enumerate()
            .map(|(index, request)| BatchItem { index, request })
            .collect();

        tracing::info!(
            "running batch of {total} item(s) (concurrency={}, fail_fast={fail_fast})",
            concurrency.max(1)
        );

        let mut outcomes: Vec<(usize, Result<TransferResult>)> = stream::iter(items)
            .map(|item| {
                let cancel = cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        return (item.index, Err(Error::Aborted("batch cancelled".into())));
                    }
                    let outcome = self.run_item(&item.request, &cancel).await;
                    if fail_fast {
                        if let Err(err) = &outcome {
                            if !err.is_aborted() {
                                tracing::warn!(
                                    "batch item {} failed, cancelling: {err}",
                                    item.index
                                );
                                cancel.cancel();
                            }
                        }
                    }
                    (item.index, outcome)
                }
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        outcomes.sort_by_key(|(index, _)| *index);

        let mut report = BatchReport::default();
        for (index, outcome) in outcomes {
            match outcome {
                Ok(result) => report.results.push(result),
                Err(err) if err.is_aborted() => report.aborted.push(index),
                Err(err) => {
                    report.errors.push(BatchError {
                        index,
                        message: err.to_string(),
                    });
                    report.results.push(TransferResult::failed(err.to_string()));
                }
            }
        }
        report.success = report.all_succeeded();
        report
    }

    async fn run_item(
        &self,
        request: &TransferRequest,
        cancel: &CancellationToken,
    ) -> Result<TransferResult> {
        match (&request.source, &request.destination) {
            (ResolvedPath::Local(source), ResolvedPath::Remote(dest)) => {
                UploadEngine::new(self.store, &request.options)
                    .upload_cancellable(source, dest, cancel)
                    .await
            }
            (ResolvedPath::Remote(source), ResolvedPath::Local(dest)) => {
                DownloadEngine::new(self.store, &request.options)
                    .download_cancellable(source, dest, cancel)
                    .await
            }
            _ => Err(Error::InvalidPath(
                "batch items must be local-to-remote or remote-to-local".into(),
            )),
        }
    }
}
