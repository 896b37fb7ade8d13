/*!
 * Tree state store
 *
 * Owns everything a browsing session knows about the chosen root: loaded
 * listings, expanded directories, selected files, directory handles and
 * memoized recursive collections.
 *
 * Every mutating operation computes its results first and commits them only
 * after the last fallible step, so a failure leaves the previous state as
 * it was.
 */

use std::collections::BTreeSet;
use std::iter;

use tracing::{debug, warn};

use crate::collector::{CacheStats, CollectionCache};
use crate::error::{CodextError, Result};
use crate::notify::{Notice, Notifier};
use crate::patterns::IgnoreSet;
use crate::registry::HandleRegistry;
use crate::selection::SelectionEvaluator;
use crate::source::{DirectorySource, Listing, Page};
use crate::types::{DirectoryListing, PathKey, SelectedSet, SelectionState, TreeState};

/// Outcome of a batch (whole-directory) selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    /// Directory the batch was applied to
    pub path: PathKey,
    /// Whether files were selected or deselected
    pub select: bool,
    /// Files added to or removed from the selection
    pub files: usize,
    /// Directories newly loaded
    pub loaded: usize,
    /// Directories that could not be listed and were skipped
    pub errors: usize,
}

/// Browsing session over one root: loaded listings, expansion, selection
/// and the handles needed to re-enter directories
pub struct TreeStore<S: DirectorySource> {
    source: S,
    notifier: Box<dyn Notifier>,
    root: Option<S::Handle>,
    tree: TreeState,
    expanded: BTreeSet<PathKey>,
    selected: SelectedSet,
    registry: HandleRegistry<S::Handle>,
    cache: CollectionCache<S::Handle>,
    batch_updating: bool,
}

impl<S: DirectorySource> TreeStore<S> {
    /// Create an empty store; nothing is loaded until [`TreeStore::pick_root`]
    pub fn new(source: S, notifier: impl Notifier + 'static) -> Self {
        Self {
            source,
            notifier: Box::new(notifier),
            root: None,
            tree: TreeState::new(),
            expanded: BTreeSet::new(),
            selected: SelectedSet::new(),
            registry: HandleRegistry::new(),
            cache: CollectionCache::new(),
            batch_updating: false,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn root_handle(&self) -> Option<&S::Handle> {
        self.root.as_ref()
    }

    pub fn tree(&self) -> &TreeState {
        &self.tree
    }

    pub fn listing(&self, path: &PathKey) -> Option<&DirectoryListing> {
        self.tree.get(path)
    }

    pub fn expanded(&self) -> &BTreeSet<PathKey> {
        &self.expanded
    }

    pub fn is_expanded(&self, path: &PathKey) -> bool {
        self.expanded.contains(path)
    }

    pub fn selected(&self) -> &SelectedSet {
        &self.selected
    }

    pub fn registry(&self) -> &HandleRegistry<S::Handle> {
        &self.registry
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// True while a batch selection is running
    pub fn is_batch_updating(&self) -> bool {
        self.batch_updating
    }

    /// Evaluator for the current state
    pub fn evaluator<'a>(&'a self, ignore: &'a IgnoreSet) -> SelectionEvaluator<'a> {
        SelectionEvaluator::new(&self.tree, &self.selected, ignore)
    }

    /// Derived check state of `dir`
    pub fn selection_state(&self, dir: &PathKey, ignore: &IgnoreSet) -> SelectionState {
        self.evaluator(ignore).dir_state(dir)
    }

    fn first_page(&self) -> Page {
        Page::first(self.source.page_size().max(1))
    }

    fn report_listing_failure(&self, path: &PathKey, err: &CodextError) {
        self.notifier.notify(&Notice::ListingFailed {
            path: path.clone(),
            reason: err.to_string(),
        });
    }

    /// Acquire a new root and start a fresh session on it.
    ///
    /// Returns `Ok(false)` when the user dismissed the picker; the current
    /// session is then left untouched.
    pub fn pick_root(&mut self) -> Result<bool> {
        let handle = match self.source.open_root() {
            Ok(handle) => handle,
            Err(CodextError::UserCancelled) => {
                debug!("Root selection cancelled");
                return Ok(false);
            }
            Err(err) => {
                self.notifier.notify(&Notice::AccessDenied(err.to_string()));
                return Err(err);
            }
        };

        self.start_session(handle)?;
        Ok(true)
    }

    /// Reload the current root from scratch, discarding all session state
    pub fn refresh_root(&mut self) -> Result<()> {
        let Some(handle) = self.root.clone() else {
            let err = CodextError::Access("no directory has been picked".to_string());
            self.notifier.notify(&Notice::AccessDenied(err.to_string()));
            return Err(err);
        };
        self.start_session(handle)
    }

    fn start_session(&mut self, handle: S::Handle) -> Result<()> {
        let root = PathKey::root();
        let listing = match self.source.list(&handle, &root, Some(self.first_page())) {
            Ok(listing) => listing,
            Err(err) => {
                self.report_listing_failure(&root, &err);
                return Err(err);
            }
        };

        let mut registry = HandleRegistry::with_root(handle.clone());
        registry.extend(listing.subdirs);

        self.root = Some(handle);
        self.tree = TreeState::from([(root, listing.listing)]);
        self.expanded = BTreeSet::new();
        self.selected = SelectedSet::new();
        self.registry = registry;
        self.cache = CollectionCache::new();

        debug!("Session started with {} root entries", self.tree[&PathKey::root()].entries.len());
        Ok(())
    }

    /// Fetch the first page of `path` through its registered handle
    fn fetch(&self, path: &PathKey) -> Result<Listing<S::Handle>> {
        let handle = self
            .registry
            .get(path)
            .ok_or_else(|| CodextError::listing(path, "directory has not been discovered"))?;
        self.source.list(handle, path, Some(self.first_page()))
    }

    /// Load `path` unless a listing is already cached
    fn ensure_loaded(&mut self, path: &PathKey) -> Result<()> {
        if self.tree.contains_key(path) {
            return Ok(());
        }

        match self.fetch(path) {
            Ok(listing) => {
                self.registry.extend(listing.subdirs);
                self.tree.insert(path.clone(), listing.listing);
                Ok(())
            }
            Err(err) => {
                self.report_listing_failure(path, &err);
                Err(err)
            }
        }
    }

    /// Collapse `path` if expanded; otherwise load it if needed and expand it.
    ///
    /// Collapsing keeps the loaded listing. A path is only marked expanded
    /// once its listing is present.
    pub fn toggle_expand(&mut self, path: &PathKey) -> Result<()> {
        if self.expanded.remove(path) {
            return Ok(());
        }
        self.ensure_loaded(path)?;
        self.expanded.insert(path.clone());
        Ok(())
    }

    /// Expand every ancestor directory of `path` (and `path` itself when it
    /// is a directory), loading listings on the way.
    pub fn expand_to(&mut self, path: &PathKey) -> Result<()> {
        let mut current = PathKey::root();
        for segment in path.segments() {
            let next = current.join(segment);
            self.ensure_loaded(&current)?;

            let is_dir = self.tree[&current]
                .entries
                .iter()
                .any(|e| e.path == next && e.is_dir());
            if !is_dir {
                break;
            }
            self.ensure_loaded(&next)?;
            self.expanded.insert(next.clone());
            current = next;
        }
        Ok(())
    }

    /// Append the next page to a partially loaded listing.
    ///
    /// Returns whether further pages remain.
    pub fn load_more(&mut self, path: &PathKey) -> Result<bool> {
        if !self.tree.contains_key(path) {
            self.ensure_loaded(path)?;
            return Ok(self.tree[path].has_more);
        }
        let current = &self.tree[path];
        if !current.has_more {
            return Ok(false);
        }

        let page = Page {
            offset: current.entries.len(),
            limit: self.source.page_size().max(1),
        };
        let handle = self
            .registry
            .get(path)
            .ok_or_else(|| CodextError::listing(path, "directory has not been discovered"))?;

        let next = match self.source.list(handle, path, Some(page)) {
            Ok(next) => next,
            Err(err) => {
                self.report_listing_failure(path, &err);
                return Err(err);
            }
        };

        let mut entries = current.entries.clone();
        entries.extend(next.listing.entries);
        let has_more = next.listing.has_more;

        self.registry.extend(next.subdirs);
        self.tree
            .insert(path.clone(), DirectoryListing { entries, has_more });
        Ok(has_more)
    }

    /// Flip the selection of a file; returns whether it is now selected.
    ///
    /// The path is not validated; a stale selection fails later when read.
    pub fn toggle_file_selection(&mut self, path: &PathKey) -> bool {
        if self.selected.remove(path) {
            false
        } else {
            self.selected.insert(path.clone());
            true
        }
    }

    /// Select or deselect a single file
    pub fn set_file_selected(&mut self, path: &PathKey, select: bool) {
        if select {
            self.selected.insert(path.clone());
        } else {
            self.selected.remove(path);
        }
    }

    /// Select or deselect every non-ignored file below `path`.
    ///
    /// Selecting also loads and expands `path` and every non-ignored
    /// directory below it. Deselecting only touches the selection.
    pub fn toggle_directory_selection(
        &mut self,
        path: &PathKey,
        select: bool,
        ignore: &IgnoreSet,
    ) -> Result<BatchSummary> {
        if self.batch_updating {
            return Err(CodextError::BatchInProgress);
        }

        self.batch_updating = true;
        self.notifier
            .notify(&Notice::BatchStarted { path: path.clone() });

        let result = self.apply_batch(path, select, ignore);

        self.batch_updating = false;
        let files = result.as_ref().map(|s| s.files).unwrap_or(0);
        self.notifier.notify(&Notice::BatchFinished {
            path: path.clone(),
            files,
        });
        result
    }

    fn apply_batch(
        &mut self,
        path: &PathKey,
        select: bool,
        ignore: &IgnoreSet,
    ) -> Result<BatchSummary> {
        let Some(handle) = self.registry.get(path).cloned() else {
            let err = CodextError::listing(path, "directory has not been discovered");
            self.report_listing_failure(path, &err);
            return Err(err);
        };

        let collection = match self.cache.get_or_collect(&self.source, &handle, path, ignore) {
            Ok(collection) => collection,
            Err(err) => {
                self.report_listing_failure(path, &err);
                return Err(err);
            }
        };

        if !select {
            let removed = collection
                .files
                .iter()
                .filter(|f| self.selected.remove(f))
                .count();
            return Ok(BatchSummary {
                path: path.clone(),
                select,
                files: removed,
                loaded: 0,
                errors: collection.errors,
            });
        }

        // Stage handles, listings and expansions; commit below in that order
        let mut handles: Vec<(PathKey, S::Handle)> = collection.dirs.clone();
        let mut loaded: Vec<(PathKey, DirectoryListing)> = Vec::new();
        let mut expand: Vec<PathKey> = Vec::new();
        let mut errors = collection.errors;

        let targets = iter::once((path.clone(), handle)).chain(collection.dirs.iter().cloned());
        for (dir, dir_handle) in targets {
            if self.tree.contains_key(&dir) {
                expand.push(dir);
                continue;
            }
            match self.source.list(&dir_handle, &dir, Some(self.first_page())) {
                Ok(listing) => {
                    handles.extend(listing.subdirs);
                    loaded.push((dir.clone(), listing.listing));
                    expand.push(dir);
                }
                Err(err) => {
                    warn!("Skipping {} during batch selection: {}", dir, err);
                    errors += 1;
                }
            }
        }

        let added = collection
            .files
            .iter()
            .filter(|f| self.selected.insert((*f).clone()))
            .count();
        let loaded_count = loaded.len();

        self.registry.extend(handles);
        self.tree.extend(loaded);
        self.expanded.extend(expand);

        if errors > 0 {
            self.notifier.notify(&Notice::ReadFailures { count: errors });
        }

        debug!(
            "Batch selected {} file(s) under {} ({} directories loaded)",
            added, path, loaded_count
        );

        Ok(BatchSummary {
            path: path.clone(),
            select,
            files: added,
            loaded: loaded_count,
            errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    use crate::types::{EntryKind, EntryNode};

    /// In-memory source: directory key -> children (name, is_dir)
    #[derive(Default)]
    struct FakeSource {
        dirs: HashMap<String, Vec<(&'static str, bool)>>,
        broken: RefCell<Vec<String>>,
        cancel: bool,
        calls: RefCell<usize>,
    }

    impl FakeSource {
        fn with(mut self, dir: &str, children: &[(&'static str, bool)]) -> Self {
            self.dirs.insert(dir.to_string(), children.to_vec());
            self
        }

        fn sample() -> Self {
            FakeSource::default()
                .with(".", &[("src", true), ("node_modules", true), ("README.md", false)])
                .with("src", &[("a.ts", false), ("b.ts", false), ("util", true)])
                .with("src/util", &[("c.ts", false)])
                .with("node_modules", &[("x.js", false)])
        }

        fn break_dir(&self, dir: &str) {
            self.broken.borrow_mut().push(dir.to_string());
        }
    }

    impl DirectorySource for FakeSource {
        type Handle = String;

        fn open_root(&self) -> Result<String> {
            if self.cancel {
                return Err(CodextError::UserCancelled);
            }
            Ok(".".to_string())
        }

        fn list(&self, dir: &String, path: &PathKey, _page: Option<Page>) -> Result<Listing<String>> {
            *self.calls.borrow_mut() += 1;
            if self.broken.borrow().contains(dir) {
                return Err(CodextError::listing(path, "broken"));
            }
            let children = self
                .dirs
                .get(dir)
                .ok_or_else(|| CodextError::listing(path, "missing"))?;

            let mut entries = Vec::new();
            let mut subdirs = Vec::new();
            for (name, is_dir) in children {
                let child = path.join(name);
                if *is_dir {
                    subdirs.push((child.clone(), child.to_string()));
                }
                entries.push(EntryNode {
                    name: name.to_string(),
                    path: child,
                    kind: if *is_dir { EntryKind::Directory } else { EntryKind::File },
                });
            }
            Ok(Listing {
                listing: DirectoryListing { entries, has_more: false },
                subdirs,
            })
        }

        fn read_file(&self, _dir: &String, path: &PathKey) -> Result<String> {
            Ok(format!("content of {}", path))
        }
    }

    fn recorder() -> (Rc<RefCell<Vec<Notice>>>, impl Notifier + 'static) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        (log, move |n: &Notice| sink.borrow_mut().push(n.clone()))
    }

    fn key(raw: &str) -> PathKey {
        PathKey::parse(raw).unwrap()
    }

    fn store() -> TreeStore<FakeSource> {
        let mut store = TreeStore::new(FakeSource::sample(), crate::notify::NullNotifier);
        assert!(store.pick_root().unwrap());
        store
    }

    #[test]
    fn test_pick_root_loads_root_listing() {
        let store = store();
        assert_eq!(store.listing(&PathKey::root()).unwrap().entries.len(), 3);
        assert!(store.registry().contains(&key("src")));
        assert!(store.expanded().is_empty());
        assert!(store.selected().is_empty());
    }

    #[test]
    fn test_cancelled_pick_is_noop() {
        let mut store = store();
        store.toggle_file_selection(&key("README.md"));

        let (log, notifier) = recorder();
        let mut source = FakeSource::sample();
        source.cancel = true;
        let mut cancelled = TreeStore::new(source, notifier);
        assert!(!cancelled.pick_root().unwrap());
        assert!(cancelled.root_handle().is_none());
        assert!(log.borrow().is_empty());

        // a store with an existing session keeps it
        assert!(store.selected().contains(&key("README.md")));
    }

    #[test]
    fn test_toggle_expand_loads_then_expands_and_collapse_keeps_data() {
        let mut store = store();
        let src = key("src");

        store.toggle_expand(&src).unwrap();
        assert!(store.is_expanded(&src));
        assert!(store.listing(&src).is_some());

        store.toggle_expand(&src).unwrap();
        assert!(!store.is_expanded(&src));
        assert!(store.listing(&src).is_some());

        let calls = *store.source().calls.borrow();
        store.toggle_expand(&src).unwrap();
        assert_eq!(*store.source().calls.borrow(), calls);
    }

    #[test]
    fn test_listing_failure_leaves_other_state_intact() {
        let (log, notifier) = recorder();
        let mut store = TreeStore::new(FakeSource::sample(), notifier);
        store.pick_root().unwrap();
        store.toggle_expand(&key("node_modules")).unwrap();

        store.source().break_dir("src");
        let err = store.toggle_expand(&key("src")).unwrap_err();
        assert!(matches!(err, CodextError::Listing { .. }));
        assert!(!store.is_expanded(&key("src")));
        assert!(store.listing(&key("src")).is_none());
        assert!(store.listing(&key("node_modules")).is_some());
        assert!(store.is_expanded(&key("node_modules")));
        assert!(matches!(log.borrow()[0], Notice::ListingFailed { .. }));
    }

    #[test]
    fn test_toggle_file_twice_restores_membership() {
        let mut store = store();
        let file = key("src/a.ts");
        assert!(store.toggle_file_selection(&file));
        assert!(!store.toggle_file_selection(&file));
        assert!(!store.selected().contains(&file));
    }

    #[test]
    fn test_batch_select_loads_expands_and_selects() {
        let (log, notifier) = recorder();
        let mut store = TreeStore::new(FakeSource::sample(), notifier);
        store.pick_root().unwrap();
        let ignore = IgnoreSet::new(["node_modules"]).unwrap();

        let summary = store
            .toggle_directory_selection(&PathKey::root(), true, &ignore)
            .unwrap();
        assert_eq!(summary.files, 4);
        assert_eq!(summary.errors, 0);
        assert!(!store.is_batch_updating());

        for file in ["README.md", "src/a.ts", "src/b.ts", "src/util/c.ts"] {
            assert!(store.selected().contains(&key(file)), "{}", file);
        }
        assert!(!store.selected().contains(&key("node_modules/x.js")));
        for dir in [".", "src", "src/util"] {
            assert!(store.is_expanded(&key(dir)), "{}", dir);
            assert!(store.registry().contains(&key(dir)));
        }
        assert!(!store.is_expanded(&key("node_modules")));
        assert_eq!(
            store.selection_state(&PathKey::root(), &ignore),
            SelectionState::Checked
        );

        let log = log.borrow();
        assert_eq!(log.first(), Some(&Notice::BatchStarted { path: PathKey::root() }));
        assert_eq!(
            log.last(),
            Some(&Notice::BatchFinished { path: PathKey::root(), files: 4 })
        );
    }

    #[test]
    fn test_batch_deselect_keeps_expansion() {
        let mut store = store();
        let ignore = IgnoreSet::new(["node_modules"]).unwrap();
        let src = key("src");
        store.toggle_expand(&src).unwrap();
        store.toggle_directory_selection(&src, true, &ignore).unwrap();
        store.toggle_file_selection(&key("README.md"));

        let summary = store.toggle_directory_selection(&src, false, &ignore).unwrap();
        assert_eq!(summary.files, 3);
        assert_eq!(store.selected().len(), 1);
        assert!(store.is_expanded(&src));
        assert!(store.is_expanded(&key("src/util")));
        assert_eq!(store.selection_state(&src, &ignore), SelectionState::Unchecked);
    }

    #[test]
    fn test_batch_reuses_cached_collection() {
        let mut store = store();
        let ignore = IgnoreSet::new(["node_modules"]).unwrap();
        let src = key("src");
        store.toggle_expand(&src).unwrap();

        store.toggle_directory_selection(&src, true, &ignore).unwrap();
        store.toggle_directory_selection(&src, false, &ignore).unwrap();
        store.toggle_directory_selection(&src, true, &ignore).unwrap();
        assert_eq!(store.cache_stats(), CacheStats { hits: 2, misses: 1 });

        store.refresh_root().unwrap();
        assert_eq!(store.cache_stats(), CacheStats::default());
        assert!(store.selected().is_empty());
        assert!(store.expanded().is_empty());
        assert!(store.listing(&src).is_none());
    }

    #[test]
    fn test_batch_on_unknown_directory_fails_without_changes() {
        let mut store = store();
        let ignore = IgnoreSet::default();
        let err = store
            .toggle_directory_selection(&key("src/util"), true, &ignore)
            .unwrap_err();
        assert!(matches!(err, CodextError::Listing { .. }));
        assert!(store.selected().is_empty());
        assert!(!store.is_batch_updating());
    }

    #[test]
    fn test_batch_counts_nested_failures() {
        let (log, notifier) = recorder();
        let mut store = TreeStore::new(FakeSource::sample(), notifier);
        store.pick_root().unwrap();
        store.source().break_dir("src/util");

        let summary = store
            .toggle_directory_selection(&PathKey::root(), true, &IgnoreSet::default())
            .unwrap();
        assert_eq!(summary.errors, 1);
        assert!(store.selected().contains(&key("src/a.ts")));
        assert!(!store.selected().contains(&key("src/util/c.ts")));
        assert!(log
            .borrow()
            .contains(&Notice::ReadFailures { count: 1 }));
    }

    #[test]
    fn test_indeterminate_from_deep_selection_before_expansion() {
        let mut store = store();
        let ignore = IgnoreSet::default();
        store.toggle_file_selection(&key("src/util/c.ts"));
        assert_eq!(
            store.selection_state(&key("src"), &ignore),
            SelectionState::Indeterminate
        );
        assert_eq!(
            store.selection_state(&PathKey::root(), &ignore),
            SelectionState::Indeterminate
        );
    }

    #[test]
    fn test_expand_to_reveals_ancestors() {
        let mut store = store();
        store.expand_to(&key("src/util/c.ts")).unwrap();
        assert!(store.is_expanded(&key("src")));
        assert!(store.is_expanded(&key("src/util")));
        assert!(store.registry().contains(&key("src/util")));
    }

    #[test]
    fn test_refresh_without_root_is_access_error() {
        let mut store = TreeStore::new(FakeSource::sample(), crate::notify::NullNotifier);
        assert!(matches!(store.refresh_root(), Err(CodextError::Access(_))));
    }
}
