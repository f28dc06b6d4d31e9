//! Run results: artifacts, per-stage counts, and failure records.

use crate::config::WikiVersion;
use crate::document::DocumentState;
use crate::error::DocumentError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Pipeline stage a count or failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// HTML/Markdown → normalized Markdown (plus the store write).
    Normalize,
    /// Ordering and merging for the text target.
    Concatenate,
    /// External typesetting.
    Pdf,
    /// Per-document man page synthesis.
    Man,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Normalize => "normalize",
            Stage::Concatenate => "concatenate",
            Stage::Pdf => "pdf",
            Stage::Man => "man",
        };
        f.write_str(s)
    }
}

/// A terminal output of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputArtifact {
    TextFile(PathBuf),
    PdfFile(PathBuf),
    /// Identity → generated man page; one entry per surviving document.
    ManPageSet(BTreeMap<String, PathBuf>),
}

/// One recorded failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub stage: Stage,
    pub error: DocumentError,
}

impl FailureRecord {
    pub fn new(stage: Stage, error: DocumentError) -> Self {
        Self { stage, error }
    }

    pub fn identity(&self) -> &str {
        self.error.identity()
    }
}

/// Success/failure counts for one stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSummary {
    pub succeeded: usize,
    pub failed: usize,
}

/// Structured result of a run.
///
/// `Ok(RunReport)` is returned even when documents failed; check
/// [`RunReport::is_success`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub version: WikiVersion,
    /// Target names in request order.
    pub targets: Vec<String>,
    /// Number of source documents discovered.
    pub total_documents: usize,
    pub stages: BTreeMap<Stage, StageSummary>,
    pub failures: Vec<FailureRecord>,
    pub artifacts: Vec<OutputArtifact>,
    /// Final lifecycle state of every document, by identity.
    #[serde(default)]
    pub document_states: BTreeMap<String, DocumentState>,
    /// The run was interrupted; some documents were never started.
    pub cancelled: bool,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn new(version: WikiVersion, targets: Vec<String>, total_documents: usize) -> Self {
        Self {
            version,
            targets,
            total_documents,
            stages: BTreeMap::new(),
            failures: Vec::new(),
            artifacts: Vec::new(),
            document_states: BTreeMap::new(),
            cancelled: false,
            duration_ms: 0,
        }
    }

    pub fn record_success(&mut self, stage: Stage, count: usize) {
        self.stages.entry(stage).or_default().succeeded += count;
    }

    pub fn record_failure(&mut self, stage: Stage, error: DocumentError) {
        self.stages.entry(stage).or_default().failed += 1;
        self.failures.push(FailureRecord::new(stage, error));
    }

    pub fn stage(&self, stage: Stage) -> StageSummary {
        self.stages.get(&stage).copied().unwrap_or_default()
    }

    pub fn failed_documents(&self) -> usize {
        self.failures.len()
    }

    /// True when nothing failed and the run was not interrupted.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    /// Failures of one stage.
    pub fn failures_in(&self, stage: Stage) -> impl Iterator<Item = &FailureRecord> {
        self.failures.iter().filter(move |f| f.stage == stage)
    }

    pub fn text_file(&self) -> Option<&PathBuf> {
        self.artifacts.iter().find_map(|a| match a {
            OutputArtifact::TextFile(p) => Some(p),
            _ => None,
        })
    }

    pub fn pdf_file(&self) -> Option<&PathBuf> {
        self.artifacts.iter().find_map(|a| match a {
            OutputArtifact::PdfFile(p) => Some(p),
            _ => None,
        })
    }

    pub fn man_pages(&self) -> Option<&BTreeMap<String, PathBuf>> {
        self.artifacts.iter().find_map(|a| match a {
            OutputArtifact::ManPageSet(m) => Some(m),
            _ => None,
        })
    }

    /// Human-readable end-of-run summary.
    ///
    /// `verbose` adds one line per artifact.
    pub fn summary(&self, verbose: bool) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "SDL Wiki v{}: {} documents, targets [{}], {}ms\n",
            self.version,
            self.total_documents,
            self.targets.join(", "),
            self.duration_ms
        ));
        for (stage, s) in &self.stages {
            out.push_str(&format!(
                "  {:<12} {:>5} ok  {:>5} failed\n",
                stage.to_string(),
                s.succeeded,
                s.failed
            ));
        }
        if self.cancelled {
            out.push_str("  run was cancelled before all documents were processed\n");
        }
        for f in &self.failures {
            out.push_str(&format!(
                "  ✗ [{}] {} ({}): {}\n",
                f.stage,
                f.identity(),
                f.error.kind(),
                f.error
            ));
        }
        if verbose {
            for artifact in &self.artifacts {
                match artifact {
                    OutputArtifact::TextFile(p) => {
                        out.push_str(&format!("  text → {}\n", p.display()));
                    }
                    OutputArtifact::PdfFile(p) => {
                        out.push_str(&format!("  pdf  → {}\n", p.display()));
                    }
                    OutputArtifact::ManPageSet(pages) => {
                        for (id, p) in pages {
                            out.push_str(&format!("  man  {id} → {}\n", p.display()));
                        }
                    }
                }
            }
        }
        out
    }
}
