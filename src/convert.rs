//! Conversion entry points.
//!
//! A run is: discover sources → normalize every page (bounded pool, results
//! persisted to the intermediate store) → barrier → render each requested
//! target. Targets are independent: a failed PDF does not remove the text
//! file, and a failed man page only removes that page.

use crate::config::{ConversionConfig, Target};
use crate::document::{find_collisions, DocumentState, NormalizedDocument, SourceDocument};
use crate::error::{DocumentError, WikiError};
use crate::output::{OutputArtifact, RunReport, Stage};
use crate::pipeline::dispatch::{dispatch, CancelToken};
use crate::pipeline::external::find_on_path;
use crate::pipeline::links::LinkResolver;
use crate::pipeline::store::{FsStore, IntermediateStore, StoreKey};
use crate::pipeline::{concat, input, man, normalize, pdf};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert the wiki checkout at `config.repo_path`.
///
/// # Returns
/// `Ok(RunReport)` once every target has been attempted, even if documents
/// or targets failed (check [`RunReport::is_success`]).
///
/// # Errors
/// Returns `Err(WikiError)` only for fatal errors, detected before any
/// document is touched:
/// - the checkout (or every category directory in it) is missing
/// - the only requested target needs a tool that is not installed
pub async fn convert(config: &ConversionConfig) -> Result<RunReport, WikiError> {
    convert_with_cancel(config, &CancelToken::new()).await
}

/// [`convert`] with an external cancellation token (Ctrl-C in the CLI).
pub async fn convert_with_cancel(
    config: &ConversionConfig,
    cancel: &CancelToken,
) -> Result<RunReport, WikiError> {
    preflight(config)?;
    let layout = config.layout();

    let discovered = {
        let layout = layout.clone();
        tokio::task::spawn_blocking(move || input::discover_sources(&layout))
            .await
            .map_err(|e| WikiError::Internal(format!("source discovery aborted: {e}")))??
    };
    let store: Arc<dyn IntermediateStore> = Arc::new(FsStore::new(layout));
    run(config, discovered.documents, discovered.unreadable, store, cancel).await
}

/// Convert pages the caller already holds in memory.
///
/// Intermediate and final files still go under `config.output_root`.
pub async fn convert_sources(
    config: &ConversionConfig,
    sources: Vec<SourceDocument>,
) -> Result<RunReport, WikiError> {
    let store: Arc<dyn IntermediateStore> = Arc::new(FsStore::new(config.layout()));
    convert_sources_with(config, sources, store, &CancelToken::new()).await
}

/// [`convert_sources`] with an explicit intermediate store and cancellation
/// token.
pub async fn convert_sources_with(
    config: &ConversionConfig,
    sources: Vec<SourceDocument>,
    store: Arc<dyn IntermediateStore>,
    cancel: &CancelToken,
) -> Result<RunReport, WikiError> {
    preflight(config)?;
    run(config, sources, Vec::new(), store, cancel).await
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(config: &ConversionConfig) -> Result<RunReport, WikiError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| WikiError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Reject runs that cannot produce anything.
///
/// A missing pandoc is fatal only when the PDF is the sole target; otherwise
/// it surfaces later as a PDF render failure while the other targets run.
fn preflight(config: &ConversionConfig) -> Result<(), WikiError> {
    let pdf_only = config
        .targets
        .iter()
        .all(|t| matches!(t, Target::Pdf(_)));
    if let (true, Some(opts)) = (pdf_only, config.pdf_options()) {
        if find_on_path(&opts.pandoc).is_none() {
            return Err(WikiError::MissingTool {
                tool: opts.pandoc.display().to_string(),
                hint: "Install pandoc (https://pandoc.org/installing.html) or request --type text."
                    .to_string(),
            });
        }
        if find_on_path(std::path::Path::new(&opts.engine)).is_none() {
            return Err(WikiError::MissingTool {
                tool: opts.engine.clone(),
                hint: "Install a TeX distribution that provides the PDF engine.".to_string(),
            });
        }
    }
    Ok(())
}

/// Per-document lifecycle bookkeeping.
struct StateTracker {
    states: HashMap<String, DocumentState>,
}

impl StateTracker {
    fn new<'a>(identities: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            states: identities
                .into_iter()
                .map(|id| (id.to_string(), DocumentState::Pending))
                .collect(),
        }
    }

    fn advance(&mut self, identity: &str, next: DocumentState) {
        let state = self
            .states
            .entry(identity.to_string())
            .or_insert(DocumentState::Pending);
        match state.advance(next) {
            Some(s) => *state = s,
            None => debug!("{identity}: ignoring transition {state} → {next}"),
        }
    }

    fn fail(&mut self, identity: &str) {
        self.advance(identity, DocumentState::Failed);
    }

    fn into_map(self) -> BTreeMap<String, DocumentState> {
        self.states.into_iter().collect()
    }
}

async fn run(
    config: &ConversionConfig,
    sources: Vec<SourceDocument>,
    unreadable: Vec<DocumentError>,
    store: Arc<dyn IntermediateStore>,
    cancel: &CancelToken,
) -> Result<RunReport, WikiError> {
    let total_start = Instant::now();
    let layout = config.layout();
    let target_names = config.targets.iter().map(|t| t.name().to_string()).collect();
    let mut report = RunReport::new(
        config.version,
        target_names,
        sources.len() + unreadable.len(),
    );
    info!(
        "Converting SDL Wiki v{}: {} documents → {:?}",
        config.version,
        report.total_documents,
        report.targets
    );

    let mut states = StateTracker::new(
        sources
            .iter()
            .map(|s| s.identity.as_str())
            .chain(unreadable.iter().map(DocumentError::identity)),
    );
    for err in unreadable {
        states.fail(err.identity());
        report.record_failure(Stage::Normalize, err);
    }

    // ── Step 1: Exclude colliding identities ────────────────────────────
    let collisions = find_collisions(sources.iter().map(|s| s.identity.as_str()));
    let (sources, colliding): (Vec<_>, Vec<_>) = sources
        .into_iter()
        .partition(|s| !collisions.contains_key(&s.identity));
    for src in colliding {
        warn!("{} collides with {:?}; excluded", src.identity, collisions[&src.identity]);
        states.fail(&src.identity);
        report.record_failure(
            Stage::Normalize,
            DocumentError::IdentityCollision {
                identity: src.identity.clone(),
                others: collisions[&src.identity].clone(),
            },
        );
    }

    // ── Step 2: Normalize (bounded pool, store writes as we go) ─────────
    let resolver = Arc::new(LinkResolver::new(sources.iter().map(|s| s.identity.clone())));
    for src in &sources {
        states.advance(&src.identity, DocumentState::Normalizing);
    }
    let normalized = {
        let store = Arc::clone(&store);
        dispatch(
            Stage::Normalize,
            sources,
            config.concurrency,
            config.progress_callback.as_ref(),
            cancel,
            move |src: SourceDocument| {
                let doc = normalize::normalize(&src, &resolver)?;
                store.put(&doc).map_err(|e| DocumentError::StoreFailed {
                    identity: doc.identity.clone(),
                    detail: e.to_string(),
                })?;
                let len = doc.text.len();
                Ok((doc, len))
            },
        )
        .await
    };

    report.record_success(Stage::Normalize, normalized.succeeded.len());
    for doc in &normalized.succeeded {
        states.advance(&doc.identity, DocumentState::Normalized);
    }
    if normalized.cancelled() > 0 {
        report.cancelled = true;
    }
    for err in normalized.failed {
        states.fail(err.identity());
        report.record_failure(Stage::Normalize, err);
    }
    if report.cancelled {
        warn!("Run cancelled; skipping output targets");
        return Ok(finish(report, states, total_start));
    }

    // ── Barrier: every target reads the stored pages back ───────────────
    let keys: BTreeSet<StoreKey> = normalized.succeeded.iter().map(StoreKey::of).collect();
    drop(normalized.succeeded);
    let (docs, unloaded) = {
        let store = Arc::clone(&store);
        tokio::task::spawn_blocking(move || read_back(store.as_ref(), &keys))
            .await
            .map_err(|e| WikiError::Internal(format!("intermediate read aborted: {e}")))?
    };
    for err in unloaded {
        warn!("{err}");
        states.fail(err.identity());
        report.record_failure(Stage::Normalize, err);
    }

    // ── Step 3: Text corpus (also the PDF input) ────────────────────────
    let mut text_ready = false;
    if let Some(text_opts) = config.text_options() {
        let corpus = concat::concatenate(&docs, &text_opts);
        for err in corpus.excluded {
            report.record_failure(Stage::Concatenate, err);
        }
        let text_file = layout.text_file();
        match concat::write_corpus(&text_file, &corpus.text).await {
            Ok(()) => {
                info!(
                    "Text corpus: {} documents → {}",
                    corpus.included.len(),
                    text_file.display()
                );
                report.record_success(Stage::Concatenate, corpus.included.len());
                for id in &corpus.included {
                    states.advance(id, DocumentState::Rendering);
                    states.advance(id, DocumentState::Rendered);
                }
                report.artifacts.push(OutputArtifact::TextFile(text_file));
                text_ready = true;
            }
            Err(e) => {
                warn!("Text corpus failed: {e}");
                report.record_failure(Stage::Concatenate, e);
            }
        }
    }

    // ── Step 4: PDF ─────────────────────────────────────────────────────
    if let Some(pdf_opts) = config.pdf_options() {
        let pdf_file = layout.pdf_file();
        let result = if text_ready {
            pdf::render_pdf(&layout.text_file(), &pdf_file, pdf_opts).await
        } else {
            Err(DocumentError::RenderFailure {
                identity: concat::file_label(&pdf_file),
                detail: "text corpus was not produced".to_string(),
            })
        };
        match result {
            Ok(()) => {
                report.record_success(Stage::Pdf, 1);
                report.artifacts.push(OutputArtifact::PdfFile(pdf_file));
            }
            Err(e) => report.record_failure(Stage::Pdf, e),
        }
    }

    // ── Step 5: Man pages (bounded pool, one page per document) ─────────
    if let Some(man_opts) = config.man_options() {
        let man_opts = man_opts.clone();
        let date = man::page_date(&man_opts);
        let man_layout = layout.clone();
        for doc in &docs {
            states.advance(&doc.identity, DocumentState::Rendering);
        }
        let pages = dispatch(
            Stage::Man,
            docs,
            config.concurrency,
            config.progress_callback.as_ref(),
            cancel,
            move |doc: NormalizedDocument| {
                let path = man_layout.man_page(&doc.identity, man_opts.section, man_opts.compress);
                let len = man::write_man_page(&doc, &man_opts, &date, &path)?;
                Ok(((doc.identity, path), len))
            },
        )
        .await;

        report.record_success(Stage::Man, pages.succeeded.len());
        if pages.cancelled() > 0 {
            report.cancelled = true;
        }
        let mut set = BTreeMap::new();
        for (identity, path) in pages.succeeded {
            states.advance(&identity, DocumentState::Rendered);
            set.insert(identity, path);
        }
        for err in pages.failed {
            states.fail(err.identity());
            report.record_failure(Stage::Man, err);
        }
        info!("Man pages: {} written to {}", set.len(), layout.man_dir().display());
        report.artifacts.push(OutputArtifact::ManPageSet(set));
    }

    Ok(finish(report, states, total_start))
}

/// Load this run's documents from `store`, in key order.
///
/// Keys the store does not list, or cannot read, come back as
/// [`DocumentError::StoreFailed`].
fn read_back(
    store: &dyn IntermediateStore,
    keys: &BTreeSet<StoreKey>,
) -> (Vec<NormalizedDocument>, Vec<DocumentError>) {
    let listed: BTreeSet<StoreKey> = match store.list() {
        Ok(listed) => listed.into_iter().collect(),
        Err(e) => {
            let failed = keys
                .iter()
                .map(|k| DocumentError::StoreFailed {
                    identity: k.identity.clone(),
                    detail: format!("cannot list intermediate store: {e}"),
                })
                .collect();
            return (Vec::new(), failed);
        }
    };

    let mut docs = Vec::with_capacity(keys.len());
    let mut failed = Vec::new();
    for key in keys {
        let fail = |detail: String| DocumentError::StoreFailed {
            identity: key.identity.clone(),
            detail,
        };
        if !listed.contains(key) {
            failed.push(fail("missing from intermediate store".to_string()));
            continue;
        }
        match store.get(key) {
            Ok(Some(doc)) => docs.push(doc),
            Ok(None) => failed.push(fail("missing from intermediate store".to_string())),
            Err(e) => failed.push(fail(format!("read: {e}"))),
        }
    }
    debug!("Read back {} of {} stored documents", docs.len(), keys.len());
    (docs, failed)
}

fn finish(mut report: RunReport, states: StateTracker, start: Instant) -> RunReport {
    report.document_states = states.into_map();
    report.duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Conversion complete: {} failures, {}ms total",
        report.failed_documents(),
        report.duration_ms
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OutputType, PdfOptions};
    use crate::document::Category;
    use crate::config::WikiVersion;
    use crate::pipeline::store::MemoryStore;

    fn page(id: &str, html: &str) -> SourceDocument {
        SourceDocument::html(id, Category::new("SDL2", 0), html, WikiVersion::V2)
    }

    #[test]
    fn pdf_only_without_pandoc_is_fatal() {
        let config = ConversionConfig::builder()
            .targets(vec![Target::Pdf(PdfOptions {
                pandoc: "/nonexistent/pandoc".into(),
                ..PdfOptions::default()
            })])
            .build()
            .unwrap();
        let err = preflight(&config).unwrap_err();
        assert!(matches!(err, WikiError::MissingTool { .. }));
        assert!(err.is_configuration());
    }

    #[test]
    fn pdf_with_text_is_not_fatal() {
        let mut targets = OutputType::Pdf.targets();
        if let Some(Target::Pdf(opts)) = targets.get_mut(1) {
            opts.pandoc = "/nonexistent/pandoc".into();
        }
        let config = ConversionConfig::builder().targets(targets).build().unwrap();
        assert!(preflight(&config).is_ok());
    }

    #[test]
    fn state_tracker_rejects_leaving_failed() {
        let mut t = StateTracker::new(["A"]);
        t.fail("A");
        t.advance("A", DocumentState::Normalizing);
        assert_eq!(t.into_map()["A"], DocumentState::Failed);
    }

    #[tokio::test]
    async fn memory_store_receives_every_normalized_page() {
        let tmp = tempfile::tempdir().unwrap();
        let config = ConversionConfig::builder()
            .output_root(tmp.path())
            .output_type(OutputType::Text)
            .build()
            .unwrap();
        let store = Arc::new(MemoryStore::new());
        let report = convert_sources_with(
            &config,
            vec![page("SDL_Init", "<h1>SDL_Init</h1>"), page("SDL_Quit", "<h1>SDL_Quit</h1>")],
            store.clone(),
            &CancelToken::new(),
        )
        .await
        .unwrap();
        assert!(report.is_success());
        assert_eq!(store.len(), 2);
        assert_eq!(report.document_states["SDL_Init"], DocumentState::Rendered);
    }

    /// Serves stored pages with a marker appended and refuses one key.
    struct MarkingStore {
        inner: MemoryStore,
        refuse: &'static str,
    }

    impl IntermediateStore for MarkingStore {
        fn put(&self, doc: &NormalizedDocument) -> std::io::Result<()> {
            self.inner.put(doc)
        }

        fn get(&self, key: &StoreKey) -> std::io::Result<Option<NormalizedDocument>> {
            if key.identity == self.refuse {
                return Err(std::io::Error::other("disk gone"));
            }
            Ok(self.inner.get(key)?.map(|mut doc| {
                doc.text.push_str("\nread back from store\n");
                doc
            }))
        }

        fn list(&self) -> std::io::Result<Vec<StoreKey>> {
            self.inner.list()
        }
    }

    #[tokio::test]
    async fn targets_read_pages_from_the_store() {
        let tmp = tempfile::tempdir().unwrap();
        let config = ConversionConfig::builder()
            .output_root(tmp.path())
            .output_type(OutputType::Text)
            .build()
            .unwrap();
        let store = Arc::new(MarkingStore {
            inner: MemoryStore::new(),
            refuse: "SDL_Quit",
        });
        let report = convert_sources_with(
            &config,
            vec![page("SDL_Init", "<h1>SDL_Init</h1>"), page("SDL_Quit", "<h1>SDL_Quit</h1>")],
            store,
            &CancelToken::new(),
        )
        .await
        .unwrap();

        let corpus = std::fs::read_to_string(config.layout().text_file()).unwrap();
        assert!(corpus.contains("# SDL_Init"));
        assert!(corpus.contains("read back from store"));
        assert!(!corpus.contains("SDL_Quit"));

        assert!(!report.is_success());
        assert_eq!(report.document_states["SDL_Init"], DocumentState::Rendered);
        assert_eq!(report.document_states["SDL_Quit"], DocumentState::Failed);
        assert!(report
            .failures
            .iter()
            .any(|f| f.identity() == "SDL_Quit" && f.error.kind() == "StoreFailed"));
    }

    #[tokio::test]
    async fn cancelled_run_skips_targets() {
        let tmp = tempfile::tempdir().unwrap();
        let config = ConversionConfig::builder()
            .output_root(tmp.path())
            .output_type(OutputType::Text)
            .build()
            .unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let report = convert_sources_with(
            &config,
            vec![page("SDL_Init", "<h1>SDL_Init</h1>")],
            Arc::new(MemoryStore::new()),
            &cancel,
        )
        .await
        .unwrap();
        assert!(report.cancelled);
        assert!(!report.is_success());
        assert!(report.text_file().is_none());
        assert!(!config.layout().text_file().exists());
    }
}
