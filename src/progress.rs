//! Progress-callback trait for per-document conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the dispatcher processes each document.
//!
//! # Example
//!
//! ```rust
//! use sdlwiki_convert::{ConversionProgressCallback, ConversionConfig, Stage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, _stage: Stage, identity: &str, _output_len: usize) {
//!         let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{done}: {identity}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::Stage;
use std::sync::Arc;

/// Called by the pipeline as it processes each document.
///
/// Implementations must be `Send + Sync`: document events arrive from
/// concurrent worker tasks, in completion order. All methods default to
/// no-ops so callers only override what they care about.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once per dispatched stage before any document starts.
    fn on_stage_start(&self, stage: Stage, total_documents: usize) {
        let _ = (stage, total_documents);
    }

    /// Called when a worker picks up a document.
    fn on_document_start(&self, stage: Stage, identity: &str) {
        let _ = (stage, identity);
    }

    /// Called when a document finishes the stage.
    ///
    /// `output_len` is the byte length of what was produced (Markdown or roff).
    fn on_document_complete(&self, stage: Stage, identity: &str, output_len: usize) {
        let _ = (stage, identity, output_len);
    }

    /// Called when a document fails the stage.
    fn on_document_error(&self, stage: Stage, identity: &str, error: &str) {
        let _ = (stage, identity, error);
    }

    /// Called once per dispatched stage after every document is terminal.
    fn on_stage_complete(&self, stage: Stage, total_documents: usize, success_count: usize) {
        let _ = (stage, total_documents, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        stage_total: AtomicUsize,
        stage_success: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_stage_start(&self, _stage: Stage, total: usize) {
            self.stage_total.store(total, Ordering::SeqCst);
        }

        fn on_document_start(&self, _stage: Stage, _identity: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_document_complete(&self, _stage: Stage, _identity: &str, _len: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_document_error(&self, _stage: Stage, _identity: &str, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_stage_complete(&self, _stage: Stage, _total: usize, success: usize) {
            self.stage_success.store(success, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage_start(Stage::Normalize, 2);
        cb.on_document_start(Stage::Normalize, "SDL_Init");
        cb.on_document_complete(Stage::Normalize, "SDL_Init", 42);
        cb.on_document_error(Stage::Man, "SDL_Quit", "boom");
        cb.on_stage_complete(Stage::Normalize, 2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_stage_start(Stage::Normalize, 3);
        tracker.on_document_start(Stage::Normalize, "A");
        tracker.on_document_complete(Stage::Normalize, "A", 10);
        tracker.on_document_start(Stage::Normalize, "B");
        tracker.on_document_error(Stage::Normalize, "B", "malformed");
        tracker.on_stage_complete(Stage::Normalize, 3, 1);

        assert_eq!(tracker.stage_total.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.stage_success.load(Ordering::SeqCst), 1);
    }
}
