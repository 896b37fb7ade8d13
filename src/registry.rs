//! Path-keyed registry of directory handles
//!
//! Directories are always re-entered through the handle that discovered
//! them, looked up by path. The registry only grows during a session and is
//! rebuilt from scratch when the root changes or is refreshed.

use std::collections::HashMap;

use crate::types::PathKey;

/// Directory handles keyed by the path they were discovered at
#[derive(Debug, Clone)]
pub struct HandleRegistry<H> {
    handles: HashMap<PathKey, H>,
}

impl<H> Default for HandleRegistry<H> {
    fn default() -> Self {
        Self {
            handles: HashMap::new(),
        }
    }
}

impl<H: Clone> HandleRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with the root handle
    pub fn with_root(root: H) -> Self {
        let mut registry = Self::new();
        registry.insert(PathKey::root(), root);
        registry
    }

    /// Record the handle of `path`. An existing handle is kept.
    pub fn insert(&mut self, path: PathKey, handle: H) {
        self.handles.entry(path).or_insert(handle);
    }

    pub fn get(&self, path: &PathKey) -> Option<&H> {
        self.handles.get(path)
    }

    /// Handle of the directory containing `file`
    pub fn containing(&self, file: &PathKey) -> Option<&H> {
        self.get(&file.parent()?)
    }

    pub fn contains(&self, path: &PathKey) -> bool {
        self.handles.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl<H: Clone> Extend<(PathKey, H)> for HandleRegistry<H> {
    fn extend<I: IntoIterator<Item = (PathKey, H)>>(&mut self, iter: I) {
        for (path, handle) in iter {
            self.insert(path, handle);
        }
    }
}
