//! Intermediate store for normalized documents.
//!
//! The dispatcher writes each normalized page here as soon as it is ready;
//! the concatenator and the man renderer read from here. Two backends:
//!
//! * [`FsStore`] — the on-disk layout under `output/text/intermediate/`.
//!   Writes go to a temp file in the target directory and are renamed into
//!   place, so readers never see a partial page.
//! * [`MemoryStore`] — sharded in-memory map for tests and library callers
//!   that do not want intermediate files.

use crate::config::WikiVersion;
use crate::document::{Category, NormalizedDocument};
use crate::layout::OutputLayout;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::io::{self, Write};
use std::path::Path;
use std::sync::RwLock;
use tracing::debug;
use walkdir::WalkDir;

/// Store key: category name plus identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StoreKey {
    pub category: String,
    pub identity: String,
}

impl StoreKey {
    pub fn new(category: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            identity: identity.into(),
        }
    }

    pub fn of(doc: &NormalizedDocument) -> Self {
        Self::new(doc.category.name(), doc.identity.clone())
    }
}

/// Persistence for normalized documents, keyed by (category, identity).
///
/// Implementations are shared across worker threads and must tolerate
/// concurrent `put`s for different keys.
pub trait IntermediateStore: Send + Sync {
    /// Persist one document. A second `put` for the same key replaces it.
    fn put(&self, doc: &NormalizedDocument) -> io::Result<()>;

    /// Load one document, `None` if it was never stored.
    fn get(&self, key: &StoreKey) -> io::Result<Option<NormalizedDocument>>;

    /// Every stored key, sorted.
    fn list(&self) -> io::Result<Vec<StoreKey>>;
}

// ── Filesystem ──────────────────────────────────────────────────────────────

/// Store backed by `<root>/output/text/intermediate/<category>/<id>.md`.
#[derive(Debug, Clone)]
pub struct FsStore {
    layout: OutputLayout,
}

impl FsStore {
    pub fn new(layout: OutputLayout) -> Self {
        Self { layout }
    }

    fn category(&self, name: &str) -> Category {
        category_by_name(self.layout.version(), name)
    }
}

impl IntermediateStore for FsStore {
    fn put(&self, doc: &NormalizedDocument) -> io::Result<()> {
        let path = self
            .layout
            .intermediate_path(doc.category.name(), &doc.identity);
        write_atomic(&path, doc.text.as_bytes())?;
        debug!("Stored {} → {}", doc.identity, path.display());
        Ok(())
    }

    fn get(&self, key: &StoreKey) -> io::Result<Option<NormalizedDocument>> {
        let path = self.layout.intermediate_path(&key.category, &key.identity);
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Some(NormalizedDocument {
                identity: key.identity.clone(),
                category: self.category(&key.category),
                text,
                version: self.layout.version(),
            })),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn list(&self) -> io::Result<Vec<StoreKey>> {
        let root = self.layout.intermediate_dir();
        if !root.is_dir() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for entry in WalkDir::new(&root).min_depth(2).max_depth(2) {
            let entry = entry.map_err(io::Error::other)?;
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().is_none_or(|e| e != "md") {
                continue;
            }
            let (Some(stem), Some(category)) = (
                path.file_stem().and_then(|s| s.to_str()),
                path.parent()
                    .and_then(Path::file_name)
                    .and_then(|s| s.to_str()),
            ) else {
                continue;
            };
            keys.push(StoreKey::new(category, stem));
        }
        keys.sort();
        Ok(keys)
    }
}

/// Category with its rank for `version`; unknown names sort last.
pub(crate) fn category_by_name(version: WikiVersion, name: &str) -> Category {
    version
        .categories()
        .into_iter()
        .find(|c| c.name() == name)
        .unwrap_or_else(|| Category::new(name, usize::MAX))
}

/// Write `bytes` to `path` via a temp file in the same directory + rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

// ── In-memory ───────────────────────────────────────────────────────────────

const DEFAULT_SHARDS: usize = 16;

type Shard = RwLock<HashMap<StoreKey, NormalizedDocument>>;

/// In-memory store split into independently locked shards.
#[derive(Debug)]
pub struct MemoryStore {
    shards: Vec<Shard>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shards(n: usize) -> Self {
        Self {
            shards: (0..n.max(1)).map(|_| RwLock::new(HashMap::new())).collect(),
        }
    }

    fn shard(&self, key: &StoreKey) -> &Shard {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let idx = (hasher.finish() % self.shards.len() as u64) as usize;
        &self.shards[idx]
    }

    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.read().map(|m| m.len()).unwrap_or(0))
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> io::Error {
    io::Error::other("intermediate store lock poisoned")
}

impl IntermediateStore for MemoryStore {
    fn put(&self, doc: &NormalizedDocument) -> io::Result<()> {
        let key = StoreKey::of(doc);
        self.shard(&key)
            .write()
            .map_err(|_| poisoned())?
            .insert(key, doc.clone());
        Ok(())
    }

    fn get(&self, key: &StoreKey) -> io::Result<Option<NormalizedDocument>> {
        Ok(self
            .shard(key)
            .read()
            .map_err(|_| poisoned())?
            .get(key)
            .cloned())
    }

    fn list(&self) -> io::Result<Vec<StoreKey>> {
        let mut keys = Vec::new();
        for shard in &self.shards {
            keys.extend(shard.read().map_err(|_| poisoned())?.keys().cloned());
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn doc(cat: &str, id: &str, text: &str) -> NormalizedDocument {
        NormalizedDocument {
            identity: id.into(),
            category: category_by_name(WikiVersion::V2, cat),
            text: text.into(),
            version: WikiVersion::V2,
        }
    }

    #[test]
    fn fs_store_round_trip_and_list() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new("wiki", tmp.path(), WikiVersion::V2);
        let store = FsStore::new(layout.clone());

        store.put(&doc("SDL2", "SDL_Init", "# SDL_Init\n")).unwrap();
        store.put(&doc("SDL2_ttf", "TTF_Init", "# TTF_Init\n")).unwrap();

        let path = layout.intermediate_path("SDL2", "SDL_Init");
        assert_eq!(std::fs::read_to_string(path).unwrap(), "# SDL_Init\n");

        let got = store.get(&StoreKey::new("SDL2_ttf", "TTF_Init")).unwrap().unwrap();
        assert_eq!(got.category.rank(), 4);
        assert_eq!(got.text, "# TTF_Init\n");

        assert_eq!(
            store.list().unwrap(),
            vec![
                StoreKey::new("SDL2", "SDL_Init"),
                StoreKey::new("SDL2_ttf", "TTF_Init")
            ]
        );
        assert!(store.get(&StoreKey::new("SDL2", "Nope")).unwrap().is_none());
    }

    #[test]
    fn fs_store_leaves_no_temp_files() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new("wiki", tmp.path(), WikiVersion::V2);
        let store = FsStore::new(layout.clone());
        store.put(&doc("SDL2", "SDL_Quit", "old\n")).unwrap();
        store.put(&doc("SDL2", "SDL_Quit", "new\n")).unwrap();

        let dir = layout.intermediate_dir().join("SDL2");
        let names: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["SDL_Quit.md".to_string()]);
        let got = store.get(&StoreKey::new("SDL2", "SDL_Quit")).unwrap().unwrap();
        assert_eq!(got.text, "new\n");
    }

    #[test]
    fn memory_store_concurrent_puts() {
        let store = Arc::new(MemoryStore::with_shards(4));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for j in 0..25 {
                        let id = format!("SDL_Fn{i}_{j}");
                        store.put(&doc("SDL2", &id, "x\n")).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.len(), 200);
        let keys = store.list().unwrap();
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
    }
}
