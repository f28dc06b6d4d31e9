//! Running external tools with a wall-clock bound.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Longest stderr excerpt kept in failure messages.
const STDERR_LIMIT: usize = 2000;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("'{0}' was not found on PATH")]
    NotFound(String),

    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' did not finish within {}s and was killed", .after.as_secs())]
    TimedOut { program: String, after: Duration },

    #[error("'{program}' exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
}

/// Locate `program` the way a shell would.
///
/// Paths with a directory component are checked as-is; bare names are
/// searched in `PATH`.
pub fn find_on_path(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 {
        return program.is_file().then(|| program.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

/// Run `program args…` and wait at most `timeout`.
///
/// The child is killed if the deadline passes. A non-zero exit becomes
/// [`ToolError::Failed`] with the tail of its stderr; a successful run
/// returns that tail instead, since pandoc reports warnings there.
pub async fn run_tool(
    program: &Path,
    args: &[OsString],
    timeout: Duration,
) -> Result<String, ToolError> {
    let name = program.display().to_string();
    if find_on_path(program).is_none() {
        return Err(ToolError::NotFound(name));
    }
    debug!("Running {} {:?}", name, args);

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ToolError::Spawn {
            program: name.clone(),
            source,
        })?;

    // Dropping the wait future on timeout drops the child, which kills it.
    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|source| ToolError::Spawn {
            program: name.clone(),
            source,
        })?,
        Err(_) => {
            return Err(ToolError::TimedOut {
                program: name,
                after: timeout,
            })
        }
    };

    debug!("{} wrote {} bytes to stdout", name, output.stdout.len());
    let stderr = tail(&String::from_utf8_lossy(&output.stderr), STDERR_LIMIT);
    if !output.status.success() {
        return Err(ToolError::Failed {
            program: name,
            status: output.status,
            stderr,
        });
    }
    Ok(stderr)
}

/// Last `limit` bytes of `s`, cut on a char boundary. LaTeX puts the
/// interesting part of its log at the end.
fn tail(s: &str, limit: usize) -> String {
    let s = s.trim_end();
    if s.len() <= limit {
        return s.to_string();
    }
    let mut start = s.len() - limit;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    format!("…{}", &s[start..])
}
