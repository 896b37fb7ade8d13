//! Handle-based source over the local filesystem

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};
use walkdir::WalkDir;

use super::{read_text, sort_entries, DirectorySource, Listing, Page, SortOrder};
use crate::error::{CodextError, Result};
use crate::types::{DirectoryListing, EntryKind, EntryNode, PathKey};

/// Opaque reference to a directory discovered by a [`LocalSource`].
///
/// Handles can only be obtained from the source, so a directory is always
/// re-entered through the reference that discovered it.
#[derive(Clone, PartialEq, Eq)]
pub struct DirHandle(Arc<PathBuf>);

impl DirHandle {
    fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Debug for DirHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DirHandle({})", self.0.display())
    }
}

/// Complete, unpaginated listings of a local directory tree
#[derive(Debug, Clone)]
pub struct LocalSource {
    root: PathBuf,
}

impl LocalSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory this source was created for
    pub fn root_path(&self) -> &Path {
        &self.root
    }
}

impl DirectorySource for LocalSource {
    type Handle = DirHandle;

    fn open_root(&self) -> Result<DirHandle> {
        let abs = fs::canonicalize(&self.root)
            .map_err(|e| CodextError::Access(format!("{}: {}", self.root.display(), e)))?;
        if !abs.is_dir() {
            return Err(CodextError::Access(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }
        Ok(DirHandle(Arc::new(abs)))
    }

    fn list(
        &self,
        dir: &DirHandle,
        path: &PathKey,
        _page: Option<Page>,
    ) -> Result<Listing<DirHandle>> {
        let meta = fs::metadata(dir.path()).map_err(|e| CodextError::listing(path, e))?;
        if !meta.is_dir() {
            return Err(CodextError::listing(path, "not a directory"));
        }

        let mut entries = Vec::new();
        let mut subdirs = Vec::new();

        for item in WalkDir::new(dir.path()).min_depth(1).max_depth(1) {
            let entry = match item {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => return Err(CodextError::listing(path, e)),
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {}", path, e);
                    continue;
                }
            };

            let name = entry.file_name().to_string_lossy().to_string();
            let child = path.join(&name);
            let kind = if entry.file_type().is_dir() {
                subdirs.push((child.clone(), DirHandle(Arc::new(entry.path().to_path_buf()))));
                EntryKind::Directory
            } else {
                EntryKind::File
            };

            entries.push(EntryNode {
                name,
                path: child,
                kind,
            });
        }

        sort_entries(&mut entries, SortOrder::Name);
        debug!("Listed {} ({} entries)", path, entries.len());

        Ok(Listing {
            listing: DirectoryListing {
                entries,
                has_more: false,
            },
            subdirs,
        })
    }

    fn read_file(&self, dir: &DirHandle, path: &PathKey) -> Result<String> {
        let file = dir.path().join(path.name());
        if !file.is_file() {
            return Err(CodextError::read(path, "not a regular file"));
        }
        read_text(&file).map_err(|e| CodextError::read(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_list_root_and_subdir() -> Result<()> {
        let temp = tempdir()?;
        fs::create_dir(temp.path().join("src"))?;
        File::create(temp.path().join("src").join("main.rs"))?.write_all(b"fn main() {}")?;
        File::create(temp.path().join("README.md"))?;
        File::create(temp.path().join("build.rs"))?;

        let source = LocalSource::new(temp.path());
        let root = source.open_root()?;
        let listing = source.list(&root, &PathKey::root(), None)?;

        let names: Vec<_> = listing.listing.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["build.rs", "README.md", "src"]);
        assert!(!listing.listing.has_more);
        assert_eq!(listing.subdirs.len(), 1);

        let (src_key, src_handle) = &listing.subdirs[0];
        assert_eq!(src_key.as_str(), "src");

        let nested = source.list(src_handle, src_key, None)?;
        assert_eq!(nested.listing.entries[0].path.as_str(), "src/main.rs");

        let content = source.read_file(src_handle, &nested.listing.entries[0].path)?;
        assert_eq!(content, "fn main() {}");
        Ok(())
    }

    #[test]
    fn test_missing_root_is_access_error() {
        let source = LocalSource::new("/definitely/not/here/codext");
        assert!(matches!(source.open_root(), Err(CodextError::Access(_))));
    }

    #[test]
    fn test_deleted_directory_is_listing_error() -> Result<()> {
        let temp = tempdir()?;
        fs::create_dir(temp.path().join("gone"))?;

        let source = LocalSource::new(temp.path());
        let root = source.open_root()?;
        let listing = source.list(&root, &PathKey::root(), None)?;
        let (key, handle) = listing.subdirs[0].clone();

        fs::remove_dir(temp.path().join("gone"))?;
        match source.list(&handle, &key, None) {
            Err(CodextError::Listing { path, .. }) => assert_eq!(path, "gone"),
            other => panic!("expected listing error, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_binary_file_reads_lossily() -> Result<()> {
        let temp = tempdir()?;
        File::create(temp.path().join("logo.png"))?.write_all(&[0x89, b'P', b'N', b'G'])?;

        let source = LocalSource::new(temp.path());
        let root = source.open_root()?;
        let text = source.read_file(&root, &PathKey::parse("logo.png")?)?;
        assert_eq!(text, "\u{FFFD}PNG");
        Ok(())
    }
}
