//! PDF target: typeset the concatenated Markdown with pandoc.

use crate::config::PdfOptions;
use crate::error::DocumentError;
use crate::pipeline::concat::file_label;
use crate::pipeline::external::{run_tool, ToolError};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// pandoc command line for `input` → `output`.
///
/// Raw TeX is disabled so stray backslashes in API prose cannot break the
/// LaTeX run; comments (including corpus separators) are stripped.
pub fn pandoc_args(input: &Path, output: &Path, opts: &PdfOptions) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        input.into(),
        "-o".into(),
        output.into(),
        format!("--pdf-engine={}", opts.engine).into(),
        "--from".into(),
        "markdown-raw_tex".into(),
        "--strip-comments".into(),
        "--wrap=preserve".into(),
    ];
    let vars = [
        format!("geometry:margin={}", opts.margin),
        format!("geometry:{}", opts.paper),
        format!("mainfont={}", opts.main_font),
        format!("fontsize={}", opts.font_size),
        format!("linestretch={}", opts.line_stretch),
        "colorlinks=true".to_string(),
        "linkcolor=blue".to_string(),
    ];
    for var in vars {
        args.push("-V".into());
        args.push(var.into());
    }
    args
}

/// Scratch name pandoc writes to; keeps the `.pdf` extension pandoc uses to
/// pick its writer.
fn partial_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    output.with_file_name(format!("{stem}.partial.pdf"))
}

/// Render `input` to `output`.
///
/// The PDF appears at `output` only if pandoc succeeds; on any failure the
/// partial file is removed and a [`DocumentError::RenderFailure`] names the
/// output file.
pub async fn render_pdf(input: &Path, output: &Path, opts: &PdfOptions) -> Result<(), DocumentError> {
    let fail = |detail: String| DocumentError::RenderFailure {
        identity: file_label(output),
        detail,
    };

    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| fail(format!("create {}: {e}", parent.display())))?;
    }

    let partial = partial_path(output);
    let args = pandoc_args(input, &partial, opts);
    let start = Instant::now();
    let result = run_tool(&opts.pandoc, &args, Duration::from_secs(opts.timeout_secs)).await;

    let warnings = match result {
        Ok(warnings) => warnings,
        Err(e) => {
            let _ = tokio::fs::remove_file(&partial).await;
            let detail = match &e {
                ToolError::NotFound(_) => {
                    format!("{e}; install pandoc and a LaTeX engine ({})", opts.engine)
                }
                _ => e.to_string(),
            };
            warn!("PDF render failed: {detail}");
            return Err(fail(detail));
        }
    };
    for line in warnings.lines().filter(|l| !l.trim().is_empty()) {
        warn!("pandoc: {line}");
    }

    tokio::fs::rename(&partial, output)
        .await
        .map_err(|e| fail(format!("rename into {}: {e}", output.display())))?;
    info!(
        "PDF written to {} in {}ms",
        output.display(),
        start.elapsed().as_millis()
    );
    Ok(())
}
