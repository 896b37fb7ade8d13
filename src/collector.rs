/*!
 * Recursive collection of the files and directories below a directory
 *
 * Used by batch selection. Directories whose basename matches an ignore
 * pattern are pruned together with their whole subtree. Directory handles
 * cannot form cycles in the supported sources, so no visited set is kept.
 */

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::Result;
use crate::patterns::IgnoreSet;
use crate::source::DirectorySource;
use crate::types::{EntryNode, PathKey};

/// Everything found below one directory
#[derive(Debug, Clone)]
pub struct Collection<H> {
    /// Every non-ignored descendant file
    pub files: Vec<PathKey>,
    /// Every non-ignored descendant directory with its handle
    pub dirs: Vec<(PathKey, H)>,
    /// Nested directories that could not be listed and were skipped
    pub errors: usize,
}

impl<H> Default for Collection<H> {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            dirs: Vec::new(),
            errors: 0,
        }
    }
}

/// Walk the tree below `dir` depth-first.
///
/// Failure to list `dir` itself is returned as an error; failures on nested
/// directories are counted in [`Collection::errors`] and their subtree is
/// skipped.
pub fn collect<S: DirectorySource>(
    source: &S,
    dir: &S::Handle,
    base: &PathKey,
    ignore: &IgnoreSet,
) -> Result<Collection<S::Handle>> {
    let mut out = Collection::default();
    let listing = source.list_all(dir, base)?;
    walk(source, listing.listing.entries, listing.subdirs, ignore, &mut out);
    Ok(out)
}

fn walk<S: DirectorySource>(
    source: &S,
    entries: Vec<EntryNode>,
    subdirs: Vec<(PathKey, S::Handle)>,
    ignore: &IgnoreSet,
    out: &mut Collection<S::Handle>,
) {
    let mut handles: HashMap<PathKey, S::Handle> = subdirs.into_iter().collect();

    for entry in entries {
        if !entry.is_dir() {
            out.files.push(entry.path);
            continue;
        }
        if ignore.is_ignored(&entry.name) {
            debug!("Pruned {}", entry.path);
            continue;
        }

        let Some(handle) = handles.remove(&entry.path) else {
            warn!("No handle for directory {}", entry.path);
            out.errors += 1;
            continue;
        };

        match source.list_all(&handle, &entry.path) {
            Ok(child) => {
                out.dirs.push((entry.path, handle));
                walk(source, child.listing.entries, child.subdirs, ignore, out);
            }
            Err(e) => {
                warn!("Skipping {}: {}", entry.path, e);
                out.errors += 1;
            }
        }
    }
}

/// All non-ignored files below `dir`
pub fn collect_files<S: DirectorySource>(
    source: &S,
    dir: &S::Handle,
    base: &PathKey,
    ignore: &IgnoreSet,
) -> Result<Vec<PathKey>> {
    Ok(collect(source, dir, base, ignore)?.files)
}

/// All non-ignored directories below `dir`, with their handles
pub fn collect_dirs<S: DirectorySource>(
    source: &S,
    dir: &S::Handle,
    base: &PathKey,
    ignore: &IgnoreSet,
) -> Result<Vec<(PathKey, S::Handle)>> {
    Ok(collect(source, dir, base, ignore)?.dirs)
}

/// Hit/miss counters of a [`CollectionCache`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

/// Memoized collections keyed by directory and ignore-set identity
#[derive(Debug)]
pub struct CollectionCache<H> {
    entries: HashMap<(PathKey, String), Arc<Collection<H>>>,
    stats: CacheStats,
}

impl<H> Default for CollectionCache<H> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::default(),
        }
    }
}

impl<H: Clone> CollectionCache<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached collection for `base` under `ignore`, walking the tree on a miss.
    ///
    /// Collections that skipped unreadable directories are returned but not
    /// cached, so a later call retries them.
    pub fn get_or_collect<S>(
        &mut self,
        source: &S,
        dir: &H,
        base: &PathKey,
        ignore: &IgnoreSet,
    ) -> Result<Arc<Collection<H>>>
    where
        S: DirectorySource<Handle = H>,
    {
        let key = (base.clone(), ignore.fingerprint());
        if let Some(hit) = self.entries.get(&key) {
            self.stats.hits += 1;
            debug!("Collection cache hit for {}", base);
            return Ok(Arc::clone(hit));
        }

        self.stats.misses += 1;
        let collection = Arc::new(collect(source, dir, base, ignore)?);
        if collection.errors == 0 {
            self.entries.insert(key, Arc::clone(&collection));
        }
        Ok(collection)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every cached collection
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
