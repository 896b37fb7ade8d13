//! Path-addressed, paginated source over the local filesystem
//!
//! No cursor or snapshot is kept between calls: every page re-reads and
//! re-sorts the whole directory, so consecutive pages of an unchanged
//! directory never skip or repeat entries.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use super::{
    locale_cmp, read_text, sort_entries, DirectorySource, Listing, Page, SortOrder,
    DEFAULT_PAGE_SIZE,
};
use crate::error::{CodextError, Result};
use crate::patterns::IgnoreSet;
use crate::types::{DirectoryListing, EntryKind, EntryNode, PathKey};

/// Content of one selected file, as returned by the listing endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedFileData {
    pub path: String,
    pub content: String,
}

/// Local filesystem source addressed by path, listing one page per call
#[derive(Debug, Clone)]
pub struct PagedSource {
    root: PathBuf,
    page_size: usize,
}

impl PagedSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    /// Filesystem location of `path`
    fn resolve(&self, path: &PathKey) -> PathBuf {
        path.segments().fold(self.root.clone(), |acc, seg| acc.join(seg))
    }

    /// Read and sort the full listing of `path`
    fn read_sorted(&self, path: &PathKey) -> Result<Vec<EntryNode>> {
        let dir = self.resolve(path);
        let reader = fs::read_dir(&dir).map_err(|e| CodextError::listing(path, e))?;

        let mut entries = Vec::new();
        for item in reader {
            let item = item.map_err(|e| CodextError::listing(path, e))?;
            let name = item.file_name().to_string_lossy().to_string();
            let is_dir = item.file_type().map(|t| t.is_dir()).unwrap_or(false);
            entries.push(EntryNode {
                path: path.join(&name),
                name,
                kind: if is_dir {
                    EntryKind::Directory
                } else {
                    EntryKind::File
                },
            });
        }

        sort_entries(&mut entries, SortOrder::Name);
        Ok(entries)
    }

    /// One page of the listing of `path`
    pub fn list_page(&self, path: &PathKey, page: Page) -> Result<DirectoryListing> {
        let all = self.read_sorted(path)?;
        let total = all.len();
        let entries: Vec<EntryNode> = all.into_iter().skip(page.offset).take(page.limit).collect();

        debug!(
            "Listed {} [{}..{}] of {}",
            path,
            page.offset,
            page.offset.saturating_add(entries.len()),
            total
        );

        Ok(DirectoryListing {
            entries,
            has_more: page.offset.saturating_add(page.limit) < total,
        })
    }

    /// Indented text rendering of the whole tree below `path`.
    ///
    /// Two spaces per depth level, directories suffixed with `/`, pure name
    /// order, ignored directories pruned with their subtree.
    pub fn full_tree_text(&self, path: &PathKey, ignore: &IgnoreSet) -> Result<String> {
        let dir = self.resolve(path);
        if !dir.is_dir() {
            return Err(CodextError::listing(path, "not a directory"));
        }

        let walker = WalkDir::new(&dir)
            .min_depth(1)
            .sort_by(|a, b| {
                locale_cmp(&a.file_name().to_string_lossy(), &b.file_name().to_string_lossy())
            })
            .into_iter()
            .filter_entry(|e| {
                !(e.file_type().is_dir() && ignore.is_ignored(&e.file_name().to_string_lossy()))
            });

        let mut text = String::new();
        for entry in walker {
            let entry = entry.map_err(|e| CodextError::listing(path, e))?;
            let indent = "  ".repeat(entry.depth() - 1);
            let name = entry.file_name().to_string_lossy();
            if entry.file_type().is_dir() {
                text.push_str(&format!("{}{}/\n", indent, name));
            } else {
                text.push_str(&format!("{}{}\n", indent, name));
            }
        }
        Ok(text)
    }

    /// Contents of the requested files. Unreadable or invalid paths are
    /// omitted from the result.
    pub fn read_selected<S: AsRef<str>>(&self, paths: &[S]) -> Vec<SelectedFileData> {
        paths
            .iter()
            .filter_map(|raw| {
                let key = PathKey::parse(raw.as_ref()).ok()?;
                let content = read_text(&self.resolve(&key)).ok()?;
                Some(SelectedFileData {
                    path: raw.as_ref().to_string(),
                    content,
                })
            })
            .collect()
    }
}

impl DirectorySource for PagedSource {
    type Handle = PathKey;

    fn open_root(&self) -> Result<PathKey> {
        if !self.root.is_dir() {
            return Err(CodextError::Access(format!(
                "{} is not a readable directory",
                self.root.display()
            )));
        }
        Ok(PathKey::root())
    }

    fn list(
        &self,
        _dir: &PathKey,
        path: &PathKey,
        page: Option<Page>,
    ) -> Result<Listing<PathKey>> {
        let listing = self.list_page(path, page.unwrap_or(Page::first(self.page_size)))?;
        let subdirs = listing
            .entries
            .iter()
            .filter(|e| e.is_dir())
            .map(|e| (e.path.clone(), e.path.clone()))
            .collect();
        Ok(Listing { listing, subdirs })
    }

    fn read_file(&self, _dir: &PathKey, path: &PathKey) -> Result<String> {
        read_text(&self.resolve(path)).map_err(|e| CodextError::read(path, e))
    }

    fn page_size(&self) -> usize {
        self.page_size
    }
}
