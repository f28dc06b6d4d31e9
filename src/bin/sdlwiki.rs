//! CLI binary for sdlwiki-convert.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig`, wires Ctrl-C to cancellation, and prints the report.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use sdlwiki_convert::{
    convert_with_cancel, CancelToken, ConversionConfig, ConversionProgressCallback,
    CorpusSeparator, ManOptions, OrderingPolicy, OutputType, PdfOptions, ProgressCallback,
    RunReport, Stage, Target, TextOptions, WikiError, WikiVersion,
};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one bar per dispatched stage, failures logged above it.
///
/// Documents finish out of order, so per-document start times are keyed by
/// identity rather than position.
struct CliProgressCallback {
    bar: ProgressBar,
    verbose: bool,
    start_times: Mutex<HashMap<String, Instant>>,
}

impl CliProgressCallback {
    fn new(verbose: bool) -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading wiki checkout…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            verbose,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn elapsed_secs(&self, identity: &str) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(identity))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Normalize => "Normalizing",
        Stage::Concatenate => "Merging",
        Stage::Pdf => "Typesetting",
        Stage::Man => "Man pages",
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage, total_documents: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>5}/{len} docs  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.reset();
        self.bar.set_length(total_documents as u64);
        self.bar.set_style(style);
        self.bar.set_prefix(stage_label(stage));
        self.bar.set_message("");
    }

    fn on_document_start(&self, _stage: Stage, identity: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(identity.to_string(), Instant::now());
        }
        self.bar.set_message(identity.to_string());
    }

    fn on_document_complete(&self, stage: Stage, identity: &str, output_len: usize) {
        let secs = self.elapsed_secs(identity);
        if self.verbose {
            self.bar.println(format!(
                "  {} {:<6} {:<40} {}  {}",
                green("✓"),
                stage.to_string(),
                identity,
                dim(&format!("{output_len:>7} bytes")),
                dim(&format!("{secs:.2}s")),
            ));
        }
        self.bar.inc(1);
    }

    fn on_document_error(&self, stage: Stage, identity: &str, error: &str) {
        self.elapsed_secs(identity);

        let msg = match error.char_indices().nth(100) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error.to_string(),
        };
        self.bar.println(format!(
            "  {} {:<6} {:<40} {}",
            red("✗"),
            stage.to_string(),
            identity,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_stage_complete(&self, stage: Stage, total_documents: usize, success_count: usize) {
        let failed = total_documents.saturating_sub(success_count);
        let mark = if failed == 0 {
            green("✔")
        } else if failed == total_documents {
            red("✘")
        } else {
            cyan("⚠")
        };
        self.bar.println(format!(
            "{mark} {:<12} {}/{} documents{}",
            stage_label(stage),
            bold(&success_count.to_string()),
            total_documents,
            if failed > 0 {
                format!("  ({} failed)", red(&failed.to_string()))
            } else {
                String::new()
            }
        ));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Markdown + PDF of the SDL2 wiki (default)
  sdlwiki --repo ~/src/sdlwiki

  # Only the concatenated Markdown, SDL3
  sdlwiki --repo ~/src/sdlwiki --version 3 --type text

  # Man pages, uncompressed, reproducible date
  sdlwiki --type man --no-compress --man-date 2024-01-01

  # Machine-readable report
  sdlwiki --type man --json > report.json

OUTPUT LAYOUT (under --root):
  output/text/intermediate/<category>/<page>.md   normalized pages
  output/text/SDL-Wiki-v<N>.md                    concatenated corpus
  output/pdf/SDL-Wiki-v<N>.pdf                    typeset corpus
  output/man/<page>.<section>.gz                  one man page per page

EXTERNAL TOOLS:
  The PDF target runs pandoc with a LaTeX engine (xelatex by default).
  Text and man targets need no external tools.

EXIT STATUS:
  0  every document and target succeeded
  1  the run finished but some documents or targets failed
  2  the run could not start (bad configuration, missing checkout or tool)
"#;

/// Convert the SDL Wiki to Markdown, PDF, or man pages.
#[derive(Parser, Debug)]
#[command(
    name = "sdlwiki",
    about = "Convert the SDL Wiki to Markdown, PDF, or Unix man pages",
    long_about = "Convert a local checkout of the SDL Wiki (HTML or Markdown pages for SDL \
and its satellite libraries) into a single Markdown corpus, a typeset PDF built with pandoc, \
or one gzipped man page per documented symbol.",
    disable_version_flag = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Output type: text, pdf, or man.
    #[arg(short = 't', long = "type", env = "SDLWIKI_TYPE", default_value = "pdf")]
    output_type: String,

    /// Wiki version to convert: 2 or 3.
    #[arg(short = 'V', long, env = "SDLWIKI_VERSION", default_value = "2")]
    version: String,

    /// Local checkout of the wiki (contains SDL2/, SDL2_image/, …).
    #[arg(short, long, env = "SDLWIKI_REPO", default_value = "sdlwiki")]
    repo: PathBuf,

    /// Directory that receives the output/ tree.
    #[arg(long, env = "SDLWIKI_ROOT", default_value = ".")]
    root: PathBuf,

    /// Documents processed at once (default: available cores).
    #[arg(short, long, env = "SDLWIKI_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Corpus ordering: category or identity.
    #[arg(long, env = "SDLWIKI_ORDERING", default_value = "category")]
    ordering: String,

    /// Corpus separator: blank, hr, or comment.
    #[arg(long, env = "SDLWIKI_SEPARATOR", default_value = "blank")]
    separator: String,

    /// pandoc executable for the PDF target.
    #[arg(long, env = "SDLWIKI_PANDOC", default_value = "pandoc")]
    pandoc: PathBuf,

    /// LaTeX engine passed to pandoc.
    #[arg(long, env = "SDLWIKI_PDF_ENGINE", default_value = "xelatex")]
    pdf_engine: String,

    /// PDF render timeout in seconds.
    #[arg(long, env = "SDLWIKI_RENDER_TIMEOUT", default_value_t = 600)]
    render_timeout: u64,

    /// Man section for generated pages (1–9).
    #[arg(long, env = "SDLWIKI_MAN_SECTION", default_value_t = 3)]
    man_section: u8,

    /// Fixed .TH date (YYYY-MM-DD) instead of today.
    #[arg(long, env = "SDLWIKI_MAN_DATE")]
    man_date: Option<String>,

    /// Write plain roff instead of gzipped man pages.
    #[arg(long, env = "SDLWIKI_NO_COMPRESS")]
    no_compress: bool,

    /// Print the run report as JSON on stdout.
    #[arg(long, env = "SDLWIKI_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "SDLWIKI_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs and per-document lines.
    #[arg(short, long, env = "SDLWIKI_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SDLWIKI_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar carries the per-document feedback; keep library INFO
    // logs out of its way unless asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match run(&cli, show_progress).await {
        Ok(report) if report.is_success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(1),
        Err(e) => {
            eprintln!("{} {e:#}", red("error:"));
            if e.downcast_ref::<WikiError>().is_some() {
                ExitCode::from(2)
            } else {
                ExitCode::from(1)
            }
        }
    }
}

async fn run(cli: &Cli, show_progress: bool) -> Result<RunReport> {
    let progress = show_progress.then(|| CliProgressCallback::new(cli.verbose));
    let config = build_config(cli, progress.clone().map(|p| p as ProgressCallback))?;

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted; finishing in-flight documents");
                cancel.cancel();
            }
        });
    }

    let result = convert_with_cancel(&config, &cancel).await;
    if let Some(ref p) = progress {
        p.finish();
    }
    // Fatal errors keep their type so `main` can pick the exit status.
    let report = result?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        eprint!("{}", report.summary(cli.verbose));
        let mark = if report.is_success() {
            green("✔")
        } else {
            cyan("⚠")
        };
        let dest = report
            .pdf_file()
            .or(report.text_file())
            .map(|p| p.display().to_string())
            .or_else(|| {
                report
                    .man_pages()
                    .map(|pages| format!("{} man pages", pages.len()))
            })
            .unwrap_or_else(|| "no output".to_string());
        eprintln!(
            "{mark}  {} failed  {}ms  →  {}",
            report.failed_documents(),
            report.duration_ms,
            bold(&dest)
        );
    }

    Ok(report)
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let version: WikiVersion = cli.version.parse()?;
    let output_type: OutputType = cli.output_type.parse()?;
    let ordering: OrderingPolicy = cli.ordering.parse()?;
    let separator: CorpusSeparator = cli.separator.parse()?;

    let targets = output_type
        .targets()
        .into_iter()
        .map(|target| match target {
            Target::Text(_) => Target::Text(TextOptions {
                ordering,
                separator,
            }),
            Target::Pdf(_) => Target::Pdf(PdfOptions {
                pandoc: cli.pandoc.clone(),
                engine: cli.pdf_engine.clone(),
                timeout_secs: cli.render_timeout,
                ..PdfOptions::default()
            }),
            Target::Man(_) => Target::Man(ManOptions {
                section: cli.man_section,
                compress: !cli.no_compress,
                date: cli.man_date.clone(),
                ..ManOptions::default()
            }),
        })
        .collect();

    let mut builder = ConversionConfig::builder()
        .repo_path(cli.repo.clone())
        .output_root(cli.root.clone())
        .version(version)
        .targets(targets)
        .verbose(cli.verbose);
    if let Some(n) = cli.concurrency {
        builder = builder.concurrency(n);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    Ok(builder.build()?)
}
