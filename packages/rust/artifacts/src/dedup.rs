//! Content-hash keyed name table shared by satellites and assets.
//!
//! One map lives for one pipeline invocation. It guarantees that identical
//! content is emitted once and that different content never shares a name.

use std::collections::{HashMap, HashSet};

use sha2::{Digest, Sha256};

/// Outcome of claiming an output name for some content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// First time this content is seen; the caller must emit it here.
    New(String),
    /// Identical content was already emitted at this path.
    Existing(String),
}

impl Claim {
    /// The relative output path, whichever way it was obtained.
    pub fn path(&self) -> &str {
        match self {
            Self::New(path) | Self::Existing(path) => path,
        }
    }

    /// Whether the caller has to emit the content.
    pub fn is_new(&self) -> bool {
        matches!(self, Self::New(_))
    }
}

/// Hash → output path, plus the set of names already taken.
#[derive(Debug, Default)]
pub struct DedupMap {
    by_hash: HashMap<String, String>,
    taken: HashSet<String>,
}

impl DedupMap {
    /// Empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a name that is emitted outside the map (the primary file).
    pub fn reserve(&mut self, relative_path: impl Into<String>) {
        self.taken.insert(relative_path.into());
    }

    /// Path already assigned to `hash`, if any.
    pub fn lookup(&self, hash: &str) -> Option<&str> {
        self.by_hash.get(hash).map(String::as_str)
    }

    /// Get the output path for content with `hash`, preferring `desired`.
    ///
    /// On a name collision with different content, `-2`, `-3`, ... is
    /// appended before the extension.
    pub fn claim(&mut self, hash: &str, desired: &str) -> Claim {
        if let Some(existing) = self.by_hash.get(hash) {
            return Claim::Existing(existing.clone());
        }

        let mut candidate = desired.to_string();
        let mut counter = 2;
        while self.taken.contains(&candidate) {
            candidate = numbered(desired, counter);
            counter += 1;
        }

        self.taken.insert(candidate.clone());
        self.by_hash.insert(hash.to_string(), candidate.clone());
        Claim::New(candidate)
    }

    /// Number of distinct contents recorded.
    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    /// Whether nothing has been claimed yet.
    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }
}

/// `dir/name.ext` → `dir/name-N.ext`.
fn numbered(path: &str, n: usize) -> String {
    let (dir, file) = match path.rfind('/') {
        Some(index) => path.split_at(index + 1),
        None => ("", path),
    };
    match file.rfind('.') {
        Some(dot) if dot > 0 => format!("{dir}{}-{n}{}", &file[..dot], &file[dot..]),
        _ => format!("{dir}{file}-{n}"),
    }
}

/// SHA-256 of a text artifact, hex encoded.
pub fn text_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_content_reuses_path() {
        let mut map = DedupMap::new();
        let first = map.claim("h1", "assets/logo.png");
        let second = map.claim("h1", "assets/other.png");
        assert_eq!(first, Claim::New("assets/logo.png".into()));
        assert_eq!(second, Claim::Existing("assets/logo.png".into()));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn different_content_same_name_gets_suffix() {
        let mut map = DedupMap::new();
        map.claim("h1", "assets/logo.png");
        assert_eq!(map.claim("h2", "assets/logo.png").path(), "assets/logo-2.png");
        assert_eq!(map.claim("h3", "assets/logo.png").path(), "assets/logo-3.png");
    }

    #[test]
    fn reserved_names_are_skipped() {
        let mut map = DedupMap::new();
        map.reserve("board.md");
        let claim = map.claim("h", "board.md");
        assert!(claim.is_new());
        assert_eq!(claim.path(), "board-2.md");
        assert_eq!(map.lookup("h"), Some("board-2.md"));
    }

    #[test]
    fn suffix_without_extension() {
        assert_eq!(numbered("README", 2), "README-2");
        assert_eq!(numbered(".hidden", 2), ".hidden-2");
        assert_eq!(numbered("a.b/c.tar.gz", 3), "a.b/c.tar-3.gz");
    }

    #[test]
    fn text_hash_is_hex_sha256() {
        let hash = text_hash("hello");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }
}
