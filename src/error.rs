//! Error types for the sdlwiki-convert library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`WikiError`] — **Fatal**: the run cannot start or cannot continue at all
//!   (unknown version, missing source tree, no renderer for a PDF-only run).
//!   Returned as `Err(WikiError)` from the top-level `convert*` functions.
//!
//! * [`DocumentError`] — **Non-fatal**: a single document (or a single
//!   output target) failed, but every sibling is fine. Stored inside
//!   [`crate::output::FailureRecord`] so callers can inspect partial success
//!   rather than losing the whole corpus to one bad page.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the sdlwiki-convert library.
///
/// Per-document failures use [`DocumentError`] and are collected in
/// [`crate::output::RunReport`] rather than propagated here.
#[derive(Debug, Error)]
pub enum WikiError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The documentation version is not one the wiki publishes.
    #[error("Unknown wiki version '{0}'\nSupported versions: 2, 3")]
    UnknownVersion(String),

    /// The output type string did not name a known target.
    #[error("Unknown output type '{0}'\nSupported types: text, pdf, man")]
    UnknownOutputType(String),

    /// The wiki checkout (or one expected directory in it) does not exist.
    #[error("Source directory not found: '{path}'\nPoint --repo at a local sdlwiki checkout.")]
    SourceNotFound { path: PathBuf },

    /// Every requested target needs an external tool that is not installed.
    #[error("Required tool '{tool}' was not found on PATH.\n{hint}")]
    MissingTool { tool: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create an output directory or read the source tree.
    #[error("Failed to write output '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WikiError {
    /// True for errors raised before any document is touched.
    ///
    /// The CLI maps these to a distinct exit status.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            WikiError::InvalidConfig(_)
                | WikiError::UnknownVersion(_)
                | WikiError::UnknownOutputType(_)
                | WikiError::SourceNotFound { .. }
                | WikiError::MissingTool { .. }
        )
    }
}

/// A non-fatal error for a single document or output target.
///
/// The run continues; the failure is recorded with its stage in the report.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum DocumentError {
    /// The source could not be decoded or held no usable content.
    #[error("{identity}: malformed input: {detail}")]
    MalformedInput { identity: String, detail: String },

    /// An output renderer failed (non-zero exit, timeout, or write error).
    #[error("{identity}: render failed: {detail}")]
    RenderFailure { identity: String, detail: String },

    /// Two or more sources map to the same output identity.
    #[error("{identity}: identity collides with {}", others.join(", "))]
    IdentityCollision {
        identity: String,
        others: Vec<String>,
    },

    /// The normalized document could not be persisted.
    #[error("{identity}: intermediate store write failed: {detail}")]
    StoreFailed { identity: String, detail: String },

    /// The run was interrupted before this document was started.
    #[error("{identity}: cancelled before processing")]
    Cancelled { identity: String },
}

impl DocumentError {
    /// The identity the failure belongs to.
    pub fn identity(&self) -> &str {
        match self {
            DocumentError::MalformedInput { identity, .. }
            | DocumentError::RenderFailure { identity, .. }
            | DocumentError::IdentityCollision { identity, .. }
            | DocumentError::StoreFailed { identity, .. }
            | DocumentError::Cancelled { identity } => identity,
        }
    }

    /// Short machine-friendly kind label used in summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            DocumentError::MalformedInput { .. } => "MalformedInput",
            DocumentError::RenderFailure { .. } => "RenderFailure",
            DocumentError::IdentityCollision { .. } => "IdentityCollision",
            DocumentError::StoreFailed { .. } => "StoreFailed",
            DocumentError::Cancelled { .. } => "Cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_input_display() {
        let e = DocumentError::MalformedInput {
            identity: "SDL_Init".into(),
            detail: "invalid UTF-8 at byte 3".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("SDL_Init"), "got: {msg}");
        assert!(msg.contains("byte 3"), "got: {msg}");
        assert_eq!(e.kind(), "MalformedInput");
    }

    #[test]
    fn collision_lists_others() {
        let e = DocumentError::IdentityCollision {
            identity: "SDL_Foo".into(),
            others: vec!["sdl_foo".into(), "SDL_FOO".into()],
        };
        assert!(e.to_string().contains("sdl_foo, SDL_FOO"));
        assert_eq!(e.identity(), "SDL_Foo");
    }

    #[test]
    fn configuration_errors_are_flagged() {
        assert!(WikiError::UnknownVersion("4".into()).is_configuration());
        assert!(WikiError::MissingTool {
            tool: "pandoc".into(),
            hint: String::new(),
        }
        .is_configuration());
        assert!(!WikiError::Internal("boom".into()).is_configuration());
    }

    #[test]
    fn unknown_version_display() {
        let e = WikiError::UnknownVersion("4".into());
        assert!(e.to_string().contains("'4'"));
    }
}
