//! Document data model: sources, normalized documents, ordering, lifecycle.

use crate::config::{OrderingPolicy, WikiVersion};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

/// A source sub-directory of the wiki, e.g. `SDL2_image`.
///
/// The rank is the directory's position in the version's category list and
/// drives the default concatenation order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category {
    name: String,
    rank: usize,
}

impl Category {
    pub fn new(name: impl Into<String>, rank: usize) -> Self {
        Self {
            name: name.into(),
            rank,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rank(&self) -> usize {
        self.rank
    }
}

/// Markup of a source page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceFormat {
    /// Rendered wiki page; converted to Markdown.
    Html,
    /// Page already stored as Markdown; only post-processed.
    Markdown,
}

impl SourceFormat {
    /// Format implied by a file extension, if supported.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "html" | "htm" => Some(SourceFormat::Html),
            "md" | "markdown" => Some(SourceFormat::Markdown),
            _ => None,
        }
    }
}

/// One raw documentation page. Immutable once read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    /// Stable name derived from the page, e.g. `SDL_Init`.
    pub identity: String,
    pub category: Category,
    pub format: SourceFormat,
    /// Raw bytes; decoding is the normalizer's job so bad encodings surface
    /// as per-document failures.
    pub content: Vec<u8>,
    pub version: WikiVersion,
    /// Where the page was read from, if it came from disk.
    pub origin: Option<PathBuf>,
}

impl SourceDocument {
    /// An in-memory HTML page.
    pub fn html(
        identity: impl Into<String>,
        category: Category,
        content: impl Into<Vec<u8>>,
        version: WikiVersion,
    ) -> Self {
        Self {
            identity: identity.into(),
            category,
            format: SourceFormat::Html,
            content: content.into(),
            version,
            origin: None,
        }
    }

    /// An in-memory Markdown page.
    pub fn markdown(
        identity: impl Into<String>,
        category: Category,
        content: impl Into<Vec<u8>>,
        version: WikiVersion,
    ) -> Self {
        Self {
            format: SourceFormat::Markdown,
            ..Self::html(identity, category, content, version)
        }
    }
}

/// Sort key for deterministic concatenation.
///
/// A total order: rank (0 under [`OrderingPolicy::Identity`]) then identity
/// bytes. Completion order and traversal order never leak into it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderingKey {
    rank: usize,
    identity: String,
}

impl OrderingKey {
    pub fn new(policy: OrderingPolicy, category: &Category, identity: &str) -> Self {
        let rank = match policy {
            OrderingPolicy::CategoryThenIdentity => category.rank(),
            OrderingPolicy::Identity => 0,
        };
        Self {
            rank,
            identity: identity.to_string(),
        }
    }
}

impl Ord for OrderingKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank
            .cmp(&other.rank)
            .then_with(|| self.identity.as_bytes().cmp(other.identity.as_bytes()))
    }
}

impl PartialOrd for OrderingKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Sanitized Markdown for one page. Written once to the store, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedDocument {
    pub identity: String,
    pub category: Category,
    pub text: String,
    pub version: WikiVersion,
}

impl NormalizedDocument {
    /// Ordering key under the given policy.
    pub fn ordering_key(&self, policy: OrderingPolicy) -> OrderingKey {
        OrderingKey::new(policy, &self.category, &self.identity)
    }

    /// Text of the first `# ` heading, if any.
    pub fn title(&self) -> Option<&str> {
        self.text
            .lines()
            .find_map(|l| l.strip_prefix("# "))
            .map(str::trim)
    }
}

/// Per-document lifecycle.
///
/// ```text
/// Pending → Normalizing → Normalized → Rendering → Rendered
///                │              │            │
///                └──────────────┴────────────┴──▶ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentState {
    Pending,
    Normalizing,
    Normalized,
    Rendering,
    Rendered,
    Failed,
}

impl DocumentState {
    pub fn is_terminal(self) -> bool {
        matches!(self, DocumentState::Rendered | DocumentState::Failed)
    }

    /// Move to `next`, or `None` if the transition is not allowed.
    ///
    /// `Normalized` is terminal for runs that only build the corpus; it may
    /// still advance to `Rendering` when a per-document target follows.
    pub fn advance(self, next: DocumentState) -> Option<DocumentState> {
        use DocumentState::*;
        let ok = matches!(
            (self, next),
            (Pending, Normalizing)
                | (Pending, Failed)
                | (Normalizing, Normalized)
                | (Normalizing, Failed)
                | (Normalized, Rendering)
                | (Rendering, Rendered)
                | (Rendering, Failed)
        );
        ok.then_some(next)
    }
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Identities that collide once case is ignored (case-insensitive file
/// systems would merge them). Each colliding identity maps to the others
/// in its group.
pub fn find_collisions<'a>(
    identities: impl IntoIterator<Item = &'a str>,
) -> BTreeMap<String, Vec<String>> {
    let mut groups: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
    let mut seen_exact: BTreeMap<&str, usize> = BTreeMap::new();
    for id in identities {
        groups.entry(id.to_lowercase()).or_default().insert(id);
        *seen_exact.entry(id).or_default() += 1;
    }

    let mut collisions = BTreeMap::new();
    for members in groups.values() {
        let exact_dupes = members.iter().any(|m| seen_exact[m] > 1);
        if members.len() < 2 && !exact_dupes {
            continue;
        }
        for member in members {
            let others: Vec<String> = members
                .iter()
                .filter(|o| *o != member)
                .map(|o| o.to_string())
                .collect();
            let others = if others.is_empty() {
                // Same identity from two categories.
                vec![member.to_string()]
            } else {
                others
            };
            collisions.insert(member.to_string(), others);
        }
    }
    collisions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cat(name: &str, rank: usize) -> Category {
        Category::new(name, rank)
    }

    #[test]
    fn ordering_key_category_first() {
        let core = cat("SDL2", 0);
        let ttf = cat("SDL2_ttf", 4);
        let a = OrderingKey::new(OrderingPolicy::CategoryThenIdentity, &ttf, "AAA");
        let b = OrderingKey::new(OrderingPolicy::CategoryThenIdentity, &core, "ZZZ");
        assert!(b < a);

        let a = OrderingKey::new(OrderingPolicy::Identity, &ttf, "AAA");
        let b = OrderingKey::new(OrderingPolicy::Identity, &core, "ZZZ");
        assert!(a < b);
    }

    #[test]
    fn ordering_key_is_bytewise() {
        let core = cat("SDL2", 0);
        let upper = OrderingKey::new(OrderingPolicy::Identity, &core, "SDL_Z");
        let lower = OrderingKey::new(OrderingPolicy::Identity, &core, "SDL_a");
        assert!(upper < lower);
    }

    #[test]
    fn state_machine_rejects_leaving_terminal() {
        use DocumentState::*;
        assert_eq!(Pending.advance(Normalizing), Some(Normalizing));
        assert_eq!(Normalizing.advance(Failed), Some(Failed));
        assert_eq!(Normalized.advance(Rendering), Some(Rendering));
        assert_eq!(Failed.advance(Normalizing), None);
        assert_eq!(Rendered.advance(Rendering), None);
        assert_eq!(Pending.advance(Rendered), None);
        assert!(Rendered.is_terminal());
        assert!(!Normalized.is_terminal());
    }

    #[test]
    fn collisions_are_case_insensitive() {
        let found = find_collisions(["SDL_Init", "SDL_Foo", "sdl_foo", "SDL_Quit"]);
        assert_eq!(found.len(), 2);
        assert_eq!(found["SDL_Foo"], vec!["sdl_foo".to_string()]);
        assert_eq!(found["sdl_foo"], vec!["SDL_Foo".to_string()]);
    }

    #[test]
    fn exact_duplicates_collide() {
        let found = find_collisions(["IMG_Load", "IMG_Load"]);
        assert_eq!(found.len(), 1);
        assert!(found.contains_key("IMG_Load"));
    }

    #[test]
    fn title_reads_first_h1() {
        let doc = NormalizedDocument {
            identity: "SDL_Init".into(),
            category: cat("SDL2", 0),
            text: "# SDL_Init\n\nInitializes SDL.\n".into(),
            version: WikiVersion::V2,
        };
        assert_eq!(doc.title(), Some("SDL_Init"));
    }
}
