//! Pipeline stages for SDL Wiki conversion.
//!
//! Each submodule implements exactly one transformation step, so each is
//! independently testable.
//!
//! ## Data Flow
//!
//! ```text
//!                       ┌──────────────── dispatch (bounded pool) ───────────────┐
//! input ──▶ SourceSet ──▶ normalize ─▶ postprocess ─▶ store                      │
//! (walkdir)             (html5ever)   (regex rules)  (fs / memory)               │
//!                       └────────────────────────────────┬───────────────────────┘
//!                                                        │ barrier
//!                          ┌─────────────────────────────┴──────────────┐
//!                          ▼                                            ▼
//!                concat ──▶ SDL-Wiki-vN.md ──▶ pdf (pandoc)     man (dispatch, per page)
//! ```
//!
//! 1. [`input`] — walk the category directories of the checkout
//! 2. [`normalize`] — HTML → Markdown, sanitized; [`links`] rewrites
//!    cross-page links to local identities
//! 3. [`postprocess`] — deterministic text-cleanup rules
//! 4. [`store`] — intermediate Markdown, one file per page
//! 5. [`dispatch`] — bounded fan-out with typed outcomes and cancellation
//! 6. [`concat`] — ordered merge for the text/PDF targets
//! 7. [`pdf`] — pandoc + LaTeX through [`external`], with a timeout
//! 8. [`man`] — native roff writer, optional gzip

pub mod concat;
pub mod dispatch;
pub mod external;
pub mod input;
pub mod links;
pub mod man;
pub mod normalize;
pub mod pdf;
pub mod postprocess;
pub mod store;
