//! Deterministic merge of normalized documents into one Markdown corpus.
//!
//! The order is a pure function of the documents' ordering keys, never of
//! completion order or directory traversal, so two runs over the same input
//! produce byte-identical text.

use crate::config::TextOptions;
use crate::document::{find_collisions, NormalizedDocument};
use crate::error::DocumentError;
use crate::pipeline::store::write_atomic;
use std::path::Path;
use tracing::{debug, warn};

/// The merged corpus and what was left out of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Corpus {
    pub text: String,
    /// Identities in output order.
    pub included: Vec<String>,
    /// One `IdentityCollision` per excluded document.
    pub excluded: Vec<DocumentError>,
}

/// Order `docs` and join them with the configured separator.
///
/// Identities that collide case-insensitively are all excluded: there is no
/// principled way to pick a winner.
pub fn concatenate(docs: &[NormalizedDocument], opts: &TextOptions) -> Corpus {
    let collisions = find_collisions(docs.iter().map(|d| d.identity.as_str()));

    let mut excluded: Vec<DocumentError> = Vec::new();
    let mut kept: Vec<&NormalizedDocument> = Vec::with_capacity(docs.len());
    for doc in docs {
        match collisions.get(&doc.identity) {
            Some(others) => {
                warn!("Excluding {} from corpus: collides with {:?}", doc.identity, others);
                excluded.push(DocumentError::IdentityCollision {
                    identity: doc.identity.clone(),
                    others: others.clone(),
                });
            }
            None => kept.push(doc),
        }
    }
    excluded.sort_by(|a, b| a.identity().cmp(b.identity()));

    kept.sort_by_cached_key(|d| d.ordering_key(opts.ordering));

    let mut text = String::with_capacity(kept.iter().map(|d| d.text.len() + 2).sum());
    for (i, doc) in kept.iter().enumerate() {
        if i > 0 {
            text.push_str(&opts.separator.render(&doc.identity));
        }
        text.push_str(&doc.text);
        if !doc.text.ends_with('\n') {
            text.push('\n');
        }
    }
    debug!("Concatenated {} documents ({} bytes)", kept.len(), text.len());

    Corpus {
        text,
        included: kept.iter().map(|d| d.identity.clone()).collect(),
        excluded,
    }
}

/// Write the corpus to `path` atomically.
///
/// A failure is reported against the file name so it lands in the run
/// report like any other target failure.
pub async fn write_corpus(path: &Path, text: &str) -> Result<(), DocumentError> {
    let fail = |detail: String| DocumentError::RenderFailure {
        identity: file_label(path),
        detail,
    };

    let target = path.to_path_buf();
    let bytes = text.as_bytes().to_vec();
    tokio::task::spawn_blocking(move || write_atomic(&target, &bytes))
        .await
        .map_err(|e| fail(format!("write task aborted: {e}")))?
        .map_err(|e| fail(format!("write {}: {e}", path.display())))
}

pub(crate) fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
