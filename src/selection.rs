/*!
 * Tri-state directory selection
 *
 * Directory check state is never stored. It is derived on demand from the
 * selected files and whatever listings have been loaded so far.
 */

use crate::patterns::IgnoreSet;
use crate::types::{PathKey, SelectedSet, SelectionState, TreeState};

/// Read-only view used to evaluate directory states
#[derive(Debug, Clone, Copy)]
pub struct SelectionEvaluator<'a> {
    tree: &'a TreeState,
    selected: &'a SelectedSet,
    ignore: &'a IgnoreSet,
}

impl<'a> SelectionEvaluator<'a> {
    pub fn new(tree: &'a TreeState, selected: &'a SelectedSet, ignore: &'a IgnoreSet) -> Self {
        Self {
            tree,
            selected,
            ignore,
        }
    }

    /// State of the file `path`
    pub fn file_state(&self, path: &PathKey) -> SelectionState {
        if self.selected.contains(path) {
            SelectionState::Checked
        } else {
            SelectionState::Unchecked
        }
    }

    /// State of the directory `dir`.
    ///
    /// Without a loaded listing the directory is Indeterminate when some
    /// selected file lies below it. With a listing, every direct child that
    /// is not an ignored directory contributes; an empty contribution set is
    /// Unchecked.
    pub fn dir_state(&self, dir: &PathKey) -> SelectionState {
        let Some(listing) = self.tree.get(dir) else {
            return if self.selected.iter().any(|p| dir.is_ancestor_of(p)) {
                SelectionState::Indeterminate
            } else {
                SelectionState::Unchecked
            };
        };

        let mut total = 0usize;
        let mut checked = 0usize;
        let mut partial = false;

        for entry in &listing.entries {
            let state = if entry.is_dir() {
                if self.ignore.is_ignored(&entry.name) {
                    continue;
                }
                self.dir_state(&entry.path)
            } else {
                self.file_state(&entry.path)
            };

            total += 1;
            match state {
                SelectionState::Checked => checked += 1,
                SelectionState::Indeterminate => partial = true,
                SelectionState::Unchecked => {}
            }
        }

        if total > 0 && checked == total {
            SelectionState::Checked
        } else if checked > 0 || partial {
            SelectionState::Indeterminate
        } else {
            SelectionState::Unchecked
        }
    }
}

/// Derive the state of directory `dir`
pub fn selection_state(
    tree: &TreeState,
    selected: &SelectedSet,
    ignore: &IgnoreSet,
    dir: &PathKey,
) -> SelectionState {
    SelectionEvaluator::new(tree, selected, ignore).dir_state(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DirectoryListing, EntryKind, EntryNode};

    fn key(raw: &str) -> PathKey {
        PathKey::parse(raw).unwrap()
    }

    fn listing(dir: &str, children: &[(&str, EntryKind)]) -> (PathKey, DirectoryListing) {
        let dir = key(dir);
        let entries = children
            .iter()
            .map(|(name, kind)| EntryNode {
                name: name.to_string(),
                path: dir.join(name),
                kind: *kind,
            })
            .collect();
        (
            dir,
            DirectoryListing {
                entries,
                has_more: false,
            },
        )
    }

    /// . -> { a/ -> { b/ -> { c/ -> { x.rs, y.rs }, z.rs }, top.rs }, node_modules/ }
    fn deep_tree() -> TreeState {
        use EntryKind::*;
        TreeState::from([
            listing(".", &[("a", Directory), ("node_modules", Directory)]),
            listing("a", &[("b", Directory), ("top.rs", File)]),
            listing("a/b", &[("c", Directory), ("z.rs", File)]),
            listing("a/b/c", &[("x.rs", File), ("y.rs", File)]),
            listing("node_modules", &[("dep.js", File)]),
        ])
    }

    fn state_of(tree: &TreeState, selected: &[&str], dir: &str) -> SelectionState {
        let selected: SelectedSet = selected.iter().map(|s| key(s)).collect();
        let ignore = IgnoreSet::new(["node_modules"]).unwrap();
        selection_state(tree, &selected, &ignore, &key(dir))
    }

    #[test]
    fn test_all_descendants_selected_is_checked() {
        let tree = deep_tree();
        let all = ["a/top.rs", "a/b/z.rs", "a/b/c/x.rs", "a/b/c/y.rs"];
        assert_eq!(state_of(&tree, &all, "."), SelectionState::Checked);
        assert_eq!(state_of(&tree, &all, "a/b"), SelectionState::Checked);
    }

    #[test]
    fn test_nothing_selected_is_unchecked() {
        let tree = deep_tree();
        assert_eq!(state_of(&tree, &[], "."), SelectionState::Unchecked);
        assert_eq!(state_of(&tree, &[], "a/b/c"), SelectionState::Unchecked);
    }

    #[test]
    fn test_mixed_selection_is_indeterminate_up_the_chain() {
        let tree = deep_tree();
        let some = ["a/b/c/x.rs"];
        assert_eq!(state_of(&tree, &some, "a/b/c"), SelectionState::Indeterminate);
        assert_eq!(state_of(&tree, &some, "a/b"), SelectionState::Indeterminate);
        assert_eq!(state_of(&tree, &some, "a"), SelectionState::Indeterminate);
        assert_eq!(state_of(&tree, &some, "."), SelectionState::Indeterminate);

        let deep_full = ["a/b/c/x.rs", "a/b/c/y.rs"];
        assert_eq!(state_of(&tree, &deep_full, "a/b/c"), SelectionState::Checked);
        assert_eq!(state_of(&tree, &deep_full, "a/b"), SelectionState::Indeterminate);
    }

    #[test]
    fn test_ignored_subtrees_do_not_count() {
        let tree = deep_tree();
        let all = ["a/top.rs", "a/b/z.rs", "a/b/c/x.rs", "a/b/c/y.rs"];
        // node_modules/dep.js is unselected but ignored
        assert_eq!(state_of(&tree, &all, "."), SelectionState::Checked);
    }

    #[test]
    fn test_unloaded_directory_uses_prefix_rule() {
        let tree = deep_tree();
        assert_eq!(
            state_of(&tree, &["lib/deep/file.rs"], "lib"),
            SelectionState::Indeterminate
        );
        assert_eq!(state_of(&tree, &["libx/file.rs"], "lib"), SelectionState::Unchecked);
        assert_eq!(state_of(&tree, &[], "lib"), SelectionState::Unchecked);
    }

    #[test]
    fn test_empty_directory_is_unchecked() {
        let tree = TreeState::from([listing("empty", &[])]);
        assert_eq!(state_of(&tree, &["other.rs"], "empty"), SelectionState::Unchecked);
    }

    #[test]
    fn test_unloaded_child_with_selection_makes_parent_indeterminate() {
        use EntryKind::*;
        let tree = TreeState::from([listing(".", &[("lib", Directory), ("main.rs", File)])]);
        assert_eq!(
            state_of(&tree, &["main.rs", "lib/x.rs"], "."),
            SelectionState::Indeterminate
        );
    }
}
