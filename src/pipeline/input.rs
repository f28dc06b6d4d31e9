//! Source discovery: walk the wiki checkout and read every page.
//!
//! Each category of the requested version is a directory under the repo
//! (`SDL2`, `SDL2_image`, …). Pages are `.html`/`.htm` or `.md`/`.markdown`
//! files anywhere below it; the file stem is the page identity. Everything
//! else (images, hidden files, `.git`) is skipped.

use crate::document::{SourceDocument, SourceFormat};
use crate::error::{DocumentError, WikiError};
use crate::layout::OutputLayout;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Pages found under the repo, plus the files that could not be used.
#[derive(Debug, Default)]
pub struct SourceSet {
    /// Readable pages, in traversal order (sorted by file name per directory).
    pub documents: Vec<SourceDocument>,
    /// Pages that exist but could not be read.
    pub unreadable: Vec<DocumentError>,
    /// Files with an unsupported extension.
    pub skipped: Vec<PathBuf>,
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|s| s.starts_with('.'))
}

/// A directory entry the walk could not visit (permissions, dangling or
/// looping symlinks). Named after the entry's stem so it reads like a page.
fn walk_error(dir: &Path, err: &walkdir::Error) -> DocumentError {
    let path = err.path().unwrap_or(dir);
    let identity = path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string());
    DocumentError::MalformedInput {
        identity,
        detail: format!("walk {}: {err}", path.display()),
    }
}

/// Walk every category directory of `layout`'s version.
///
/// # Errors
/// [`WikiError::SourceNotFound`] when the repo, or every category directory
/// in it, is missing. A single missing satellite library is only a warning.
pub fn discover_sources(layout: &OutputLayout) -> Result<SourceSet, WikiError> {
    let repo = layout.repo();
    if !repo.is_dir() {
        return Err(WikiError::SourceNotFound {
            path: repo.to_path_buf(),
        });
    }

    let dirs = layout.source_dirs();
    let present: Vec<_> = dirs.iter().filter(|(_, dir)| dir.is_dir()).collect();
    if present.is_empty() {
        let core = dirs
            .first()
            .map(|(_, d)| d.clone())
            .unwrap_or_else(|| repo.to_path_buf());
        return Err(WikiError::SourceNotFound { path: core });
    }

    let mut set = SourceSet::default();
    for (category, dir) in &dirs {
        if !dir.is_dir() {
            warn!("Category {} not found at {}; skipping", category.name(), dir.display());
            continue;
        }
        let before = set.documents.len();
        let walker = WalkDir::new(dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e));

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Cannot read entry under {}: {e}", dir.display());
                    set.unreadable.push(walk_error(dir, &e));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let format = path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(SourceFormat::from_extension);
            let (Some(format), Some(identity)) =
                (format, path.file_stem().and_then(|s| s.to_str()))
            else {
                debug!("Skipping unsupported file {}", path.display());
                set.skipped.push(path.to_path_buf());
                continue;
            };

            match std::fs::read(path) {
                Ok(content) => set.documents.push(SourceDocument {
                    identity: identity.to_string(),
                    category: category.clone(),
                    format,
                    content,
                    version: layout.version(),
                    origin: Some(path.to_path_buf()),
                }),
                Err(e) => {
                    warn!("Cannot read {}: {e}", path.display());
                    set.unreadable.push(DocumentError::MalformedInput {
                        identity: identity.to_string(),
                        detail: format!("read {}: {e}", path.display()),
                    });
                }
            }
        }
        debug!(
            "{}: {} pages",
            category.name(),
            set.documents.len() - before
        );
    }

    if !set.skipped.is_empty() {
        warn!("Skipped {} files with unsupported extensions", set.skipped.len());
    }
    info!(
        "Discovered {} pages for SDL{} in {}",
        set.documents.len(),
        layout.version(),
        repo.display()
    );
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WikiVersion;
    use std::fs;

    #[test]
    fn missing_repo_is_fatal() {
        let layout = OutputLayout::new("/nonexistent/sdlwiki", "/tmp", WikiVersion::V2);
        let err = discover_sources(&layout).unwrap_err();
        assert!(matches!(err, WikiError::SourceNotFound { .. }));
    }

    #[test]
    fn repo_without_categories_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("SDL3")).unwrap();
        let layout = OutputLayout::new(tmp.path(), tmp.path(), WikiVersion::V2);
        let err = discover_sources(&layout).unwrap_err();
        assert!(err.to_string().contains("SDL2"));
    }

    #[test]
    fn walks_categories_and_skips_junk() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = tmp.path().join("wiki");
        fs::create_dir_all(repo.join("SDL2/nested")).unwrap();
        fs::create_dir_all(repo.join("SDL2_ttf")).unwrap();
        fs::create_dir_all(repo.join("SDL2/.git")).unwrap();
        fs::write(repo.join("SDL2/SDL_Quit.html"), "<p>q</p>").unwrap();
        fs::write(repo.join("SDL2/SDL_Init.md"), "# SDL_Init\n").unwrap();
        fs::write(repo.join("SDL2/nested/SDL_Delay.htm"), "<p>d</p>").unwrap();
        fs::write(repo.join("SDL2/logo.png"), [0u8, 1, 2]).unwrap();
        fs::write(repo.join("SDL2/.git/HEAD.md"), "x").unwrap();
        fs::write(repo.join("SDL2_ttf/TTF_Init.html"), "<p>t</p>").unwrap();

        let layout = OutputLayout::new(&repo, tmp.path(), WikiVersion::V2);
        let set = discover_sources(&layout).unwrap();

        let ids: Vec<_> = set.documents.iter().map(|d| d.identity.as_str()).collect();
        assert_eq!(ids, vec!["SDL_Init", "SDL_Quit", "SDL_Delay", "TTF_Init"]);
        assert_eq!(set.documents[0].format, SourceFormat::Markdown);
        assert_eq!(set.documents[3].category.name(), "SDL2_ttf");
        assert_eq!(set.skipped.len(), 1);
        assert!(set.unreadable.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn unvisitable_entries_are_recorded() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = tmp.path().join("wiki");
        fs::create_dir_all(repo.join("SDL2")).unwrap();
        fs::write(repo.join("SDL2/SDL_Init.html"), "<p>i</p>").unwrap();
        std::os::unix::fs::symlink(repo.join("SDL2/gone.html"), repo.join("SDL2/SDL_Gone.html"))
            .unwrap();

        let layout = OutputLayout::new(&repo, tmp.path(), WikiVersion::V2);
        let set = discover_sources(&layout).unwrap();

        assert_eq!(set.documents.len(), 1);
        assert_eq!(set.unreadable.len(), 1);
        assert_eq!(set.unreadable[0].identity(), "SDL_Gone");
        assert!(matches!(set.unreadable[0], DocumentError::MalformedInput { .. }));
    }
}
