/*!
 * Core types and data structures for codext
 */

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{CodextError, Result};

/// Root-relative, `/`-delimited identity of a filesystem entry.
///
/// `"."` is the root. Every other key is a sequence of names joined by `/`
/// without a leading `./`. Two entries are the same node iff their keys are
/// equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathKey(String);

impl PathKey {
    /// The root key
    pub fn root() -> Self {
        Self(".".to_string())
    }

    /// Parse a user-supplied key, normalizing `./` prefixes and trailing slashes.
    ///
    /// Absolute paths and keys containing `..` are rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.starts_with('/') || trimmed.starts_with('\\') {
            return Err(CodextError::InvalidPath(raw.to_string()));
        }

        let mut segments = Vec::new();
        for segment in trimmed.split('/') {
            match segment {
                "" | "." => continue,
                ".." => return Err(CodextError::InvalidPath(raw.to_string())),
                name => segments.push(name),
            }
        }

        if segments.is_empty() {
            Ok(Self::root())
        } else {
            Ok(Self(segments.join("/")))
        }
    }

    pub fn is_root(&self) -> bool {
        self.0 == "."
    }

    /// Key of the child `name` of this directory
    pub fn join(&self, name: &str) -> Self {
        if self.is_root() {
            Self(name.to_string())
        } else {
            Self(format!("{}/{}", self.0, name))
        }
    }

    /// Key of the containing directory (`"."` for top-level entries)
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => Some(Self::root()),
        }
    }

    /// Basename of the entry
    pub fn name(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }

    /// True when `other` lies strictly below this directory
    pub fn is_ancestor_of(&self, other: &PathKey) -> bool {
        if self.is_root() {
            return !other.is_root();
        }
        other.0.len() > self.0.len()
            && other.0.starts_with(&self.0)
            && other.0.as_bytes()[self.0.len()] == b'/'
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the path segments (empty for the root)
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        let inner = if self.is_root() { "" } else { self.0.as_str() };
        inner.split('/').filter(|s| !s.is_empty())
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for PathKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Kind of a filesystem entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// One immediate child of a directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryNode {
    /// Entry name
    pub name: String,
    /// Root-relative key
    pub path: PathKey,
    /// File or directory
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

impl EntryNode {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Children of one directory, in listing order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryListing {
    pub entries: Vec<EntryNode>,
    /// More entries are available past this page (paginated sources only)
    pub has_more: bool,
}

/// Lazily populated map of directory key to its listing
pub type TreeState = HashMap<PathKey, DirectoryListing>;

/// Set of explicitly selected file keys, iterated in insertion order.
#[derive(Debug, Clone, Default)]
pub struct SelectedSet {
    next: u64,
    order: BTreeMap<u64, PathKey>,
    index: HashMap<PathKey, u64>,
}

impl SelectedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `path`; returns false if it was already selected
    pub fn insert(&mut self, path: PathKey) -> bool {
        if self.index.contains_key(&path) {
            return false;
        }
        self.order.insert(self.next, path.clone());
        self.index.insert(path, self.next);
        self.next += 1;
        true
    }

    /// Remove `path`; returns false if it was not selected
    pub fn remove(&mut self, path: &PathKey) -> bool {
        match self.index.remove(path) {
            Some(seq) => {
                self.order.remove(&seq);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, path: &PathKey) -> bool {
        self.index.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Keys in the order they were selected
    pub fn iter(&self) -> impl Iterator<Item = &PathKey> {
        self.order.values()
    }
}

impl FromIterator<PathKey> for SelectedSet {
    fn from_iter<I: IntoIterator<Item = PathKey>>(iter: I) -> Self {
        let mut set = SelectedSet::new();
        for path in iter {
            set.insert(path);
        }
        set
    }
}

/// Derived checkbox state of a directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
    Unchecked,
    Checked,
    Indeterminate,
}

/// Output format of the context bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown-flavored text tree followed by fenced file contents
    #[default]
    Text,
    /// `<codebase_context>` XML document
    Xml,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_key_parse_normalizes() {
        assert_eq!(PathKey::parse(".").unwrap(), PathKey::root());
        assert_eq!(PathKey::parse("").unwrap(), PathKey::root());
        assert_eq!(PathKey::parse("./src/a.ts").unwrap().as_str(), "src/a.ts");
        assert_eq!(PathKey::parse("src/").unwrap().as_str(), "src");
        assert!(PathKey::parse("/etc").is_err());
        assert!(PathKey::parse("src/../../etc").is_err());
    }

    #[test]
    fn test_path_key_navigation() {
        let root = PathKey::root();
        let src = root.join("src");
        let file = src.join("a.ts");

        assert_eq!(src.as_str(), "src");
        assert_eq!(file.as_str(), "src/a.ts");
        assert_eq!(file.parent(), Some(src.clone()));
        assert_eq!(src.parent(), Some(root.clone()));
        assert_eq!(root.parent(), None);
        assert_eq!(file.name(), "a.ts");
        assert!(root.is_ancestor_of(&file));
        assert!(src.is_ancestor_of(&file));
        assert!(!src.is_ancestor_of(&PathKey::parse("srcx/a.ts").unwrap()));
        assert!(!src.is_ancestor_of(&src));
        assert_eq!(file.segments().collect::<Vec<_>>(), vec!["src", "a.ts"]);
        assert_eq!(root.segments().count(), 0);
    }

    #[test]
    fn test_selected_set_keeps_insertion_order() {
        let mut set = SelectedSet::new();
        for name in ["b", "a", "c"] {
            assert!(set.insert(PathKey::root().join(name)));
        }
        assert!(!set.insert(PathKey::root().join("a")));
        assert!(set.remove(&PathKey::root().join("b")));
        set.insert(PathKey::root().join("b"));

        let order: Vec<_> = set.iter().map(|p| p.as_str()).collect();
        assert_eq!(order, vec!["a", "c", "b"]);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_entry_node_json_shape() {
        let node = EntryNode {
            name: "src".to_string(),
            path: PathKey::root().join("src"),
            kind: EntryKind::Directory,
        };
        let json = serde_json::to_string(&node).unwrap();
        assert_eq!(json, r#"{"name":"src","path":"src","type":"directory"}"#);
    }
}
