/*!
 * Directory sources
 *
 * A directory source answers one question: what are the immediate children
 * of this directory? Three implementations exist:
 *
 * - [`LocalSource`] walks the local filesystem through opaque directory
 *   handles and always returns complete listings.
 * - [`PagedSource`] lists the local filesystem by path, one page at a time,
 *   re-reading and re-sorting the directory on every call.
 * - [`HttpSource`] talks to a remote listing endpoint served by
 *   [`crate::api::ListingServer`].
 */

mod http;
mod local;
mod paged;

pub use http::HttpSource;
pub use local::{DirHandle, LocalSource};
pub use paged::{PagedSource, SelectedFileData};

use std::cmp::Ordering;
use std::fmt::Debug;
use std::fs;
use std::io;
use std::path::Path;

use crate::error::Result;
use crate::types::{DirectoryListing, EntryNode, PathKey};

/// Default number of entries per page for paginated sources
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// A slice of a directory listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    pub fn first(limit: usize) -> Self {
        Self { offset: 0, limit }
    }

    pub fn next(self) -> Self {
        Self {
            offset: self.offset.saturating_add(self.limit),
            limit: self.limit,
        }
    }
}

/// Result of listing one directory
#[derive(Debug, Clone)]
pub struct Listing<H> {
    pub listing: DirectoryListing,
    /// Handle of every subdirectory in `listing`, keyed by its path
    pub subdirs: Vec<(PathKey, H)>,
}

/// Capability to list directories and read files below a chosen root
pub trait DirectorySource {
    /// Reference needed to re-enter a directory later
    type Handle: Clone + Debug;

    /// Acquire the root directory.
    ///
    /// May fail with `UserCancelled`, which callers treat as a no-op.
    fn open_root(&self) -> Result<Self::Handle>;

    /// List the immediate children of `dir`, whose key is `path`.
    ///
    /// Entries come back sorted by name. Sources without pagination ignore
    /// `page` and always report `has_more == false`.
    fn list(&self, dir: &Self::Handle, path: &PathKey, page: Option<Page>)
        -> Result<Listing<Self::Handle>>;

    /// Read the text content of `path`, a file directly inside `dir`
    fn read_file(&self, dir: &Self::Handle, path: &PathKey) -> Result<String>;

    /// Page size used by [`DirectorySource::list_all`]
    fn page_size(&self) -> usize {
        DEFAULT_PAGE_SIZE
    }

    /// List every child of `dir`, following pages until the source reports
    /// no more entries.
    fn list_all(&self, dir: &Self::Handle, path: &PathKey) -> Result<Listing<Self::Handle>> {
        let mut page = Page::first(self.page_size().max(1));
        let mut all = self.list(dir, path, Some(page))?;

        while all.listing.has_more {
            page = page.next();
            let next = self.list(dir, path, Some(page))?;
            if next.listing.entries.is_empty() {
                break;
            }
            all.listing.entries.extend(next.listing.entries);
            all.subdirs.extend(next.subdirs);
            all.listing.has_more = next.listing.has_more;
        }

        all.listing.has_more = false;
        Ok(all)
    }
}

/// Ordering applied to the entries of one directory level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Pure name order
    Name,
    /// Directories before files, then name order
    DirectoriesFirst,
}

/// Read a file as text, replacing invalid UTF-8 with U+FFFD
pub(crate) fn read_text(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

/// Human-oriented name comparison.
///
/// Names compare case-insensitively first; names equal up to case put the
/// lowercase spelling first, and code-point order breaks remaining ties.
pub fn locale_cmp(a: &str, b: &str) -> Ordering {
    let primary = a
        .chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase));
    if primary != Ordering::Equal {
        return primary;
    }

    let tertiary = a
        .chars()
        .map(char::is_uppercase)
        .cmp(b.chars().map(char::is_uppercase));
    if tertiary != Ordering::Equal {
        return tertiary;
    }

    a.cmp(b)
}

/// Sort entries in place according to `order`
pub fn sort_entries(entries: &mut [EntryNode], order: SortOrder) {
    entries.sort_by(|a, b| {
        if order == SortOrder::DirectoriesFirst && a.kind != b.kind {
            return if a.is_dir() {
                Ordering::Less
            } else {
                Ordering::Greater
            };
        }
        locale_cmp(&a.name, &b.name)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntryKind;

    fn entry(name: &str, kind: EntryKind) -> EntryNode {
        EntryNode {
            name: name.to_string(),
            path: PathKey::root().join(name),
            kind,
        }
    }

    fn names(entries: &[EntryNode]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_locale_cmp() {
        assert_eq!(locale_cmp("apple", "Banana"), Ordering::Less);
        assert_eq!(locale_cmp("Zeta", "alpha"), Ordering::Greater);
        assert_eq!(locale_cmp("a", "A"), Ordering::Less);
        assert_eq!(locale_cmp("readme", "readme"), Ordering::Equal);
    }

    #[test]
    fn test_sort_orders() {
        let mut entries = vec![
            entry("b.rs", EntryKind::File),
            entry("Src", EntryKind::Directory),
            entry("a.rs", EntryKind::File),
            entry("docs", EntryKind::Directory),
        ];

        sort_entries(&mut entries, SortOrder::Name);
        assert_eq!(names(&entries), vec!["a.rs", "b.rs", "docs", "Src"]);

        sort_entries(&mut entries, SortOrder::DirectoriesFirst);
        assert_eq!(names(&entries), vec!["docs", "Src", "a.rs", "b.rs"]);
    }

    #[test]
    fn test_page_advance() {
        let page = Page::first(50).next().next();
        assert_eq!(page, Page { offset: 100, limit: 50 });
    }
}
