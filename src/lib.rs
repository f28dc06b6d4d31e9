//! # sdlwiki-convert
//!
//! Convert the SDL Wiki (HTML or Markdown pages for SDL and its satellite
//! libraries) into a single Markdown corpus, a typeset PDF, or one Unix man
//! page per documented symbol.
//!
//! ## Pipeline Overview
//!
//! ```text
//! <repo>/SDL2, SDL2_image, SDL2_mixer, SDL2_net, SDL2_ttf
//!  │
//!  ├─ 1. Input      walk category directories, read every page
//!  ├─ 2. Normalize  HTML → sanitized Markdown (concurrent, spawn_blocking)
//!  ├─ 3. Polish     post-processing rules (quotes, rules, whitespace)
//!  ├─ 4. Store      output/text/intermediate/<category>/<id>.md
//!  ├─ 5. Text       ordered merge → output/text/SDL-Wiki-v2.md
//!  ├─ 6. PDF        pandoc + xelatex → output/pdf/SDL-Wiki-v2.pdf
//!  └─ 7. Man        native roff → output/man/<id>.3.gz (concurrent)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sdlwiki_convert::{convert, ConversionConfig, OutputType, WikiVersion};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .repo_path("sdlwiki")
//!         .version(WikiVersion::V3)
//!         .output_type(OutputType::Man)
//!         .build()?;
//!     let report = convert(&config).await?;
//!     print!("{}", report.summary(false));
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `sdlwiki` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! sdlwiki-convert = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod document;
pub mod error;
pub mod layout;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConversionConfig, ConversionConfigBuilder, CorpusSeparator, ManOptions, OrderingPolicy,
    OutputType, PdfOptions, Target, TextOptions, WikiVersion,
};
pub use convert::{convert, convert_sources, convert_sources_with, convert_sync, convert_with_cancel};
pub use document::{Category, DocumentState, NormalizedDocument, SourceDocument, SourceFormat};
pub use error::{DocumentError, WikiError};
pub use layout::OutputLayout;
pub use output::{FailureRecord, OutputArtifact, RunReport, Stage, StageSummary};
pub use pipeline::dispatch::CancelToken;
pub use pipeline::store::{FsStore, IntermediateStore, MemoryStore};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
