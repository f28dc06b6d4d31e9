//! Bounded fan-out of per-document work.
//!
//! Each item runs at most once, on tokio's blocking pool, with at most
//! `concurrency` items in flight. Workers return typed outcomes; the
//! dispatcher partitions them into successes and failures. Nothing is shared
//! between workers except the read-only operation itself.

use crate::error::DocumentError;
use crate::output::Stage;
use crate::progress::ProgressCallback;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared cancellation flag.
///
/// Once set, documents not yet started are recorded as
/// [`DocumentError::Cancelled`]; documents already running finish normally.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Partitioned results of one dispatched stage.
#[derive(Debug)]
pub struct DispatchOutcome<T> {
    /// Successful outputs, in completion order.
    pub succeeded: Vec<T>,
    /// Failures, sorted by identity.
    pub failed: Vec<DocumentError>,
}

impl<T> DispatchOutcome<T> {
    pub fn cancelled(&self) -> usize {
        self.failed
            .iter()
            .filter(|e| matches!(e, DocumentError::Cancelled { .. }))
            .count()
    }
}

/// Work items know their own identity for logging and failure records.
pub trait Identified {
    fn identity(&self) -> &str;
}

impl Identified for crate::document::SourceDocument {
    fn identity(&self) -> &str {
        &self.identity
    }
}

impl Identified for crate::document::NormalizedDocument {
    fn identity(&self) -> &str {
        &self.identity
    }
}

/// Run `op` over `items` with bounded concurrency.
///
/// `op` returns the stage output and the byte length reported to the
/// progress callback. It runs under `spawn_blocking`; a panic inside it is
/// caught and recorded as a failure of that item alone.
pub async fn dispatch<I, T, F>(
    stage: Stage,
    items: Vec<I>,
    concurrency: usize,
    callback: Option<&ProgressCallback>,
    cancel: &CancelToken,
    op: F,
) -> DispatchOutcome<T>
where
    I: Identified + Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Result<(T, usize), DocumentError> + Send + Sync + 'static,
{
    let total = items.len();
    info!("Stage {stage}: {total} documents, concurrency {concurrency}");
    if let Some(cb) = callback {
        cb.on_stage_start(stage, total);
    }

    let op = Arc::new(op);
    let results: Vec<Result<T, DocumentError>> = stream::iter(items.into_iter().map(|item| {
        let op = Arc::clone(&op);
        let cancel = cancel.clone();
        let callback = callback.cloned();
        async move {
            let identity = item.identity().to_string();
            if cancel.is_cancelled() {
                return Err(DocumentError::Cancelled { identity });
            }
            if let Some(ref cb) = callback {
                cb.on_document_start(stage, &identity);
            }
            debug!("[{stage}] start {identity}");

            let joined = tokio::task::spawn_blocking(move || op(item)).await;
            let result = match joined {
                Ok(r) => r,
                Err(e) => Err(panic_failure(stage, &identity, &e.to_string())),
            };

            match &result {
                Ok((_, len)) => {
                    debug!("[{stage}] done {identity} ({len} bytes)");
                    if let Some(ref cb) = callback {
                        cb.on_document_complete(stage, &identity, *len);
                    }
                }
                Err(e) => {
                    warn!("[{stage}] {e}");
                    if let Some(ref cb) = callback {
                        cb.on_document_error(stage, &identity, &e.to_string());
                    }
                }
            }
            result.map(|(value, _)| value)
        }
    }))
    .buffer_unordered(concurrency.max(1))
    .collect()
    .await;

    let mut succeeded = Vec::with_capacity(results.len());
    let mut failed = Vec::new();
    for r in results {
        match r {
            Ok(v) => succeeded.push(v),
            Err(e) => failed.push(e),
        }
    }
    failed.sort_by(|a, b| a.identity().cmp(b.identity()));

    info!(
        "Stage {stage} complete: {}/{} succeeded",
        succeeded.len(),
        total
    );
    if let Some(cb) = callback {
        cb.on_stage_complete(stage, total, succeeded.len());
    }

    DispatchOutcome { succeeded, failed }
}

fn panic_failure(stage: Stage, identity: &str, detail: &str) -> DocumentError {
    let detail = format!("worker aborted: {detail}");
    match stage {
        Stage::Normalize => DocumentError::MalformedInput {
            identity: identity.to_string(),
            detail,
        },
        _ => DocumentError::RenderFailure {
            identity: identity.to_string(),
            detail,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ConversionProgressCallback;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    struct Item(String);

    impl Identified for Item {
        fn identity(&self) -> &str {
            &self.0
        }
    }

    fn items(n: usize) -> Vec<Item> {
        (0..n).map(|i| Item(format!("doc{i:02}"))).collect()
    }

    #[tokio::test]
    async fn every_item_runs_exactly_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = Arc::clone(&seen);
        let out = dispatch(Stage::Normalize, items(20), 4, None, &CancelToken::new(), move |it: Item| {
            seen2.lock().unwrap().push(it.0.clone());
            Ok((it.0, 1))
        })
        .await;

        assert_eq!(out.succeeded.len(), 20);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 20);
        assert_eq!(seen.iter().collect::<HashSet<_>>().len(), 20);
    }

    #[tokio::test]
    async fn failures_are_isolated() {
        let out = dispatch(Stage::Normalize, items(5), 2, None, &CancelToken::new(), |it: Item| {
            if it.0 == "doc03" {
                Err(DocumentError::MalformedInput {
                    identity: it.0,
                    detail: "bad".into(),
                })
            } else {
                Ok((it.0, 1))
            }
        })
        .await;
        assert_eq!(out.succeeded.len(), 4);
        assert_eq!(out.failed.len(), 1);
        assert_eq!(out.failed[0].identity(), "doc03");
    }

    #[tokio::test]
    async fn panics_become_failures() {
        let out = dispatch(Stage::Man, items(3), 3, None, &CancelToken::new(), |it: Item| {
            if it.0 == "doc01" {
                panic!("boom");
            }
            Ok((it.0, 1))
        })
        .await;
        assert_eq!(out.succeeded.len(), 2);
        assert!(matches!(out.failed[0], DocumentError::RenderFailure { .. }));
    }

    #[tokio::test]
    async fn cancelled_before_start_records_every_item() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let out = dispatch(Stage::Normalize, items(6), 2, None, &cancel, |it: Item| Ok((it.0, 1))).await;
        assert!(out.succeeded.is_empty());
        assert_eq!(out.cancelled(), 6);
    }

    #[tokio::test]
    async fn cancel_mid_run_stops_unstarted_items() {
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let out = dispatch(Stage::Normalize, items(10), 1, None, &cancel, move |it: Item| {
            if it.0 == "doc02" {
                trigger.cancel();
            }
            Ok((it.0, 1))
        })
        .await;
        // Concurrency 1: doc00..doc02 ran, the rest never started.
        assert_eq!(out.succeeded.len(), 3);
        assert_eq!(out.cancelled(), 7);
    }

    #[derive(Default)]
    struct Counting {
        completes: AtomicUsize,
        errors: AtomicUsize,
        success: AtomicUsize,
    }

    impl ConversionProgressCallback for Counting {
        fn on_document_complete(&self, _: Stage, _: &str, _: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }
        fn on_document_error(&self, _: Stage, _: &str, _: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
        fn on_stage_complete(&self, _: Stage, _: usize, success: usize) {
            self.success.store(success, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn callbacks_fire_per_document() {
        let counting = Arc::new(Counting::default());
        let cb: ProgressCallback = counting.clone();
        let out = dispatch(Stage::Normalize, items(4), 2, Some(&cb), &CancelToken::new(), |it: Item| {
            if it.0 == "doc00" {
                Err(DocumentError::MalformedInput {
                    identity: it.0,
                    detail: "x".into(),
                })
            } else {
                Ok((it.0, 10))
            }
        })
        .await;
        assert_eq!(out.succeeded.len(), 3);
        assert_eq!(counting.completes.load(Ordering::SeqCst), 3);
        assert_eq!(counting.errors.load(Ordering::SeqCst), 1);
        assert_eq!(counting.success.load(Ordering::SeqCst), 3);
    }
}
