//! Configuration types for SDL Wiki conversion.
//!
//! All run behaviour is controlled through [`ConversionConfig`], built via its
//! [`ConversionConfigBuilder`]. Every knob lives in one struct so a config can
//! be shared across worker tasks, logged at startup, and compared between runs.
//!
//! Output targets are a closed set of tagged variants ([`Target`]); each
//! variant carries only the options that target needs.

use crate::document::Category;
use crate::error::WikiError;
use crate::layout::OutputLayout;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Configuration for one conversion run.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use sdlwiki_convert::{ConversionConfig, OutputType, WikiVersion};
///
/// let config = ConversionConfig::builder()
///     .repo_path("sdlwiki")
///     .output_root("build")
///     .version(WikiVersion::V3)
///     .output_type(OutputType::Man)
///     .concurrency(8)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Local checkout of the wiki. Each category is a sub-directory of it.
    pub repo_path: PathBuf,

    /// Parent directory of the `output/` tree.
    pub output_root: PathBuf,

    /// Documentation version to convert. Default: 2.
    pub version: WikiVersion,

    /// Targets produced by this run, in the order they are rendered.
    ///
    /// Default: `[Text, Pdf]`, matching the CLI's default `--type pdf`.
    pub targets: Vec<Target>,

    /// Maximum documents processed at once. Default: available parallelism.
    ///
    /// Normalization and man rendering are CPU-bound, so values above the
    /// core count only add scheduling overhead.
    pub concurrency: usize,

    /// Include per-artifact detail in the run summary.
    pub verbose: bool,

    /// Per-document progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            repo_path: PathBuf::from("sdlwiki"),
            output_root: PathBuf::from("."),
            version: WikiVersion::default(),
            targets: OutputType::default().targets(),
            concurrency: default_concurrency(),
            verbose: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("repo_path", &self.repo_path)
            .field("output_root", &self.output_root)
            .field("version", &self.version)
            .field("targets", &self.targets)
            .field("concurrency", &self.concurrency)
            .field("verbose", &self.verbose)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Paths of every intermediate and final artifact for this run.
    pub fn layout(&self) -> OutputLayout {
        OutputLayout::new(&self.repo_path, &self.output_root, self.version)
    }

    /// Options for the concatenated text, whether or not `Text` was requested
    /// explicitly. The PDF target is always built from the text artifact.
    pub fn text_options(&self) -> Option<TextOptions> {
        let explicit = self.targets.iter().find_map(|t| match t {
            Target::Text(opts) => Some(opts.clone()),
            _ => None,
        });
        let needs_text = self
            .targets
            .iter()
            .any(|t| matches!(t, Target::Text(_) | Target::Pdf(_)));
        match explicit {
            Some(opts) => Some(opts),
            None if needs_text => Some(TextOptions::default()),
            None => None,
        }
    }

    /// PDF options if a PDF was requested.
    pub fn pdf_options(&self) -> Option<&PdfOptions> {
        self.targets.iter().find_map(|t| match t {
            Target::Pdf(opts) => Some(opts),
            _ => None,
        })
    }

    /// Man options if man pages were requested.
    pub fn man_options(&self) -> Option<&ManOptions> {
        self.targets.iter().find_map(|t| match t {
            Target::Man(opts) => Some(opts),
            _ => None,
        })
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn repo_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.repo_path = path.into();
        self
    }

    pub fn output_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output_root = path.into();
        self
    }

    pub fn version(mut self, version: WikiVersion) -> Self {
        self.config.version = version;
        self
    }

    /// Replace the target list with the targets implied by `ty`.
    pub fn output_type(mut self, ty: OutputType) -> Self {
        self.config.targets = ty.targets();
        self
    }

    /// Replace the target list.
    pub fn targets(mut self, targets: Vec<Target>) -> Self {
        self.config.targets = targets;
        self
    }

    /// Add one target, replacing any existing target of the same kind.
    pub fn target(mut self, target: Target) -> Self {
        self.config
            .targets
            .retain(|t| std::mem::discriminant(t) != std::mem::discriminant(&target));
        self.config.targets.push(target);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn verbose(mut self, v: bool) -> Self {
        self.config.verbose = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, WikiError> {
        let c = &self.config;
        if c.targets.is_empty() {
            return Err(WikiError::InvalidConfig(
                "At least one output target is required".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(WikiError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        for target in &c.targets {
            match target {
                Target::Text(_) => {}
                Target::Pdf(pdf) => {
                    if pdf.timeout_secs == 0 {
                        return Err(WikiError::InvalidConfig(
                            "PDF render timeout must be ≥ 1 second".into(),
                        ));
                    }
                    if pdf.engine.trim().is_empty() {
                        return Err(WikiError::InvalidConfig(
                            "PDF engine must not be empty".into(),
                        ));
                    }
                }
                Target::Man(man) => {
                    if !(1..=9).contains(&man.section) {
                        return Err(WikiError::InvalidConfig(format!(
                            "Man section must be 1–9, got {}",
                            man.section
                        )));
                    }
                }
            }
        }
        Ok(self.config)
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Published documentation versions of the wiki.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WikiVersion {
    /// SDL2 and its satellite libraries. (default)
    #[default]
    V2,
    /// SDL3 and its satellite libraries.
    V3,
}

/// Satellite libraries documented alongside the core library, in the order
/// their pages appear in the concatenated output.
const CATEGORY_SUFFIXES: [&str; 5] = ["", "_image", "_mixer", "_net", "_ttf"];

impl WikiVersion {
    /// The major version number.
    pub fn number(self) -> u8 {
        match self {
            WikiVersion::V2 => 2,
            WikiVersion::V3 => 3,
        }
    }

    /// Source sub-directories for this version, ranked by output order.
    pub fn categories(self) -> Vec<Category> {
        CATEGORY_SUFFIXES
            .iter()
            .enumerate()
            .map(|(rank, suffix)| Category::new(format!("SDL{}{}", self.number(), suffix), rank))
            .collect()
    }
}

impl fmt::Display for WikiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

impl FromStr for WikiVersion {
    type Err = WikiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "2" | "sdl2" => Ok(WikiVersion::V2),
            "3" | "sdl3" => Ok(WikiVersion::V3),
            other => Err(WikiError::UnknownVersion(other.to_string())),
        }
    }
}

/// The user-facing output selector (`--type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputType {
    /// Concatenated Markdown only.
    Text,
    /// Concatenated Markdown plus a typeset PDF built from it. (default)
    #[default]
    Pdf,
    /// One man page per document.
    Man,
}

impl OutputType {
    /// Targets this output type expands to, with default options.
    pub fn targets(self) -> Vec<Target> {
        match self {
            OutputType::Text => vec![Target::Text(TextOptions::default())],
            OutputType::Pdf => vec![
                Target::Text(TextOptions::default()),
                Target::Pdf(PdfOptions::default()),
            ],
            OutputType::Man => vec![Target::Man(ManOptions::default())],
        }
    }
}

impl FromStr for OutputType {
    type Err = WikiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "md" | "markdown" => Ok(OutputType::Text),
            "pdf" => Ok(OutputType::Pdf),
            "man" => Ok(OutputType::Man),
            other => Err(WikiError::UnknownOutputType(other.to_string())),
        }
    }
}

/// One output target with its own options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Target {
    Text(TextOptions),
    Pdf(PdfOptions),
    Man(ManOptions),
}

impl Target {
    /// Short name used in logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            Target::Text(_) => "text",
            Target::Pdf(_) => "pdf",
            Target::Man(_) => "man",
        }
    }
}

/// Options for the concatenated Markdown target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextOptions {
    /// Ordering of documents in the concatenated file.
    pub ordering: OrderingPolicy,
    /// Boundary inserted between documents.
    pub separator: CorpusSeparator,
}

/// Options for the pandoc PDF target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfOptions {
    /// The pandoc executable (name on PATH or absolute path). Default: `pandoc`.
    pub pandoc: PathBuf,
    /// LaTeX engine passed to `--pdf-engine`. Default: `xelatex`.
    pub engine: String,
    /// `geometry` paper name. Default: `a4paper`.
    pub paper: String,
    /// `geometry` margin. Default: `0.5in`.
    pub margin: String,
    /// Body font. A monospace face keeps C signatures aligned. Default: `Noto Sans Mono`.
    pub main_font: String,
    /// Default: `10pt`.
    pub font_size: String,
    /// Default: `1.2`.
    pub line_stretch: String,
    /// Wall-clock bound on the pandoc process. Default: 600.
    ///
    /// A full SDL3 build takes a few minutes on a laptop; after this the child
    /// is killed and the target reports a render failure.
    pub timeout_secs: u64,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            pandoc: PathBuf::from("pandoc"),
            engine: "xelatex".to_string(),
            paper: "a4paper".to_string(),
            margin: "0.5in".to_string(),
            main_font: "Noto Sans Mono".to_string(),
            font_size: "10pt".to_string(),
            line_stretch: "1.2".to_string(),
            timeout_secs: 600,
        }
    }
}

/// Options for the man page target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManOptions {
    /// Manual section; library calls live in section 3. Default: 3.
    pub section: u8,
    /// `.TH` source field. Default: `SDL Wiki`.
    pub source: String,
    /// `.TH` manual field. Default: `SDL Library Manual`.
    pub manual: String,
    /// Gzip each page to `<name>.<section>.gz`. Default: true.
    pub compress: bool,
    /// Fixed `.TH` date (`YYYY-MM-DD`). `None` uses today's local date.
    pub date: Option<String>,
}

impl Default for ManOptions {
    fn default() -> Self {
        Self {
            section: 3,
            source: "SDL Wiki".to_string(),
            manual: "SDL Library Manual".to_string(),
            compress: true,
            date: None,
        }
    }
}

/// Ordering key policy for the concatenated corpus.
///
/// Both policies are total orders over identities; neither depends on
/// completion order or directory traversal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OrderingPolicy {
    /// Category rank first (core library, then image, mixer, net, ttf),
    /// then identity bytewise. (default)
    #[default]
    CategoryThenIdentity,
    /// Identity bytewise, ignoring category.
    Identity,
}

impl FromStr for OrderingPolicy {
    type Err = WikiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "category" | "category-then-identity" => Ok(OrderingPolicy::CategoryThenIdentity),
            "identity" | "lexical" => Ok(OrderingPolicy::Identity),
            other => Err(WikiError::InvalidConfig(format!(
                "Unknown ordering policy '{other}' (expected: category, identity)"
            ))),
        }
    }
}

/// How to separate documents in the concatenated Markdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CorpusSeparator {
    /// One blank line. (default)
    #[default]
    BlankLine,
    /// Horizontal rule: "\n---\n\n"
    HorizontalRule,
    /// HTML comment naming the next document; pandoc strips it from the PDF.
    Comment,
}

impl CorpusSeparator {
    /// Render the separator placed before the document `identity`.
    ///
    /// Every block already ends in a single newline.
    pub fn render(&self, identity: &str) -> String {
        match self {
            CorpusSeparator::BlankLine => "\n".to_string(),
            CorpusSeparator::HorizontalRule => "\n---\n\n".to_string(),
            CorpusSeparator::Comment => format!("\n<!-- {identity} -->\n\n"),
        }
    }
}

impl FromStr for CorpusSeparator {
    type Err = WikiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blank" | "none" => Ok(CorpusSeparator::BlankLine),
            "hr" | "---" => Ok(CorpusSeparator::HorizontalRule),
            "comment" => Ok(CorpusSeparator::Comment),
            other => Err(WikiError::InvalidConfig(format!(
                "Unknown separator '{other}' (expected: blank, hr, comment)"
            ))),
        }
    }
}
