//! On-disk layout of sources, intermediate files, and final artifacts.
//!
//! ```text
//! <repo>/<category>/<identity>.html|.md                 source pages
//! <root>/output/text/intermediate/<category>/<id>.md    normalized pages
//! <root>/output/text/SDL-Wiki-v<N>.md                   concatenated text
//! <root>/output/pdf/SDL-Wiki-v<N>.pdf                   typeset PDF
//! <root>/output/man/<id>.<section>[.gz]                 man pages
//! ```
//!
//! Other tools (the man-page installer, caches) rely on these names, so they
//! are computed in exactly one place.

use crate::config::WikiVersion;
use crate::document::Category;
use std::path::{Path, PathBuf};

/// Every path a run reads from or writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    repo: PathBuf,
    output_dir: PathBuf,
    version: WikiVersion,
}

impl OutputLayout {
    pub fn new(repo: impl Into<PathBuf>, root: impl AsRef<Path>, version: WikiVersion) -> Self {
        Self {
            repo: repo.into(),
            output_dir: root.as_ref().join("output"),
            version,
        }
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    pub fn version(&self) -> WikiVersion {
        self.version
    }

    /// Source directories for the version, paired with their category.
    pub fn source_dirs(&self) -> Vec<(Category, PathBuf)> {
        self.version
            .categories()
            .into_iter()
            .map(|c| {
                let dir = self.repo.join(c.name());
                (c, dir)
            })
            .collect()
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn text_dir(&self) -> PathBuf {
        self.output_dir.join("text")
    }

    pub fn pdf_dir(&self) -> PathBuf {
        self.output_dir.join("pdf")
    }

    pub fn man_dir(&self) -> PathBuf {
        self.output_dir.join("man")
    }

    /// Root of the intermediate store.
    pub fn intermediate_dir(&self) -> PathBuf {
        self.text_dir().join("intermediate")
    }

    /// Normalized Markdown for one document.
    pub fn intermediate_path(&self, category: &str, identity: &str) -> PathBuf {
        self.intermediate_dir()
            .join(category)
            .join(format!("{identity}.md"))
    }

    /// Concatenated Markdown file, also the PDF input.
    pub fn text_file(&self) -> PathBuf {
        self.text_dir()
            .join(format!("SDL-Wiki-v{}.md", self.version.number()))
    }

    pub fn pdf_file(&self) -> PathBuf {
        self.pdf_dir()
            .join(format!("SDL-Wiki-v{}.pdf", self.version.number()))
    }

    /// Man page for one document, e.g. `SDL_Init.3.gz`.
    pub fn man_page(&self, identity: &str, section: u8, compressed: bool) -> PathBuf {
        let name = if compressed {
            format!("{identity}.{section}.gz")
        } else {
            format!("{identity}.{section}")
        };
        self.man_dir().join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_follow_contract() {
        let layout = OutputLayout::new("wiki", "/tmp/run", WikiVersion::V2);
        assert_eq!(
            layout.intermediate_path("SDL2_ttf", "TTF_Init"),
            PathBuf::from("/tmp/run/output/text/intermediate/SDL2_ttf/TTF_Init.md")
        );
        assert_eq!(
            layout.text_file(),
            PathBuf::from("/tmp/run/output/text/SDL-Wiki-v2.md")
        );
        assert_eq!(
            layout.pdf_file(),
            PathBuf::from("/tmp/run/output/pdf/SDL-Wiki-v2.pdf")
        );
        assert_eq!(
            layout.man_page("SDL_Init", 3, true),
            PathBuf::from("/tmp/run/output/man/SDL_Init.3.gz")
        );
        assert_eq!(
            layout.man_page("SDL_Init", 3, false),
            PathBuf::from("/tmp/run/output/man/SDL_Init.3")
        );
    }

    #[test]
    fn source_dirs_cover_satellite_libraries() {
        let layout = OutputLayout::new("wiki", ".", WikiVersion::V3);
        let dirs: Vec<_> = layout.source_dirs().into_iter().map(|(_, p)| p).collect();
        assert_eq!(dirs.len(), 5);
        assert_eq!(dirs[0], PathBuf::from("wiki/SDL3"));
        assert_eq!(dirs[4], PathBuf::from("wiki/SDL3_ttf"));
    }
}
