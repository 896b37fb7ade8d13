//! Text rendering of the selection tree
//!
//! Only loaded listings are shown, and only expanded directories descend.

use std::collections::{BTreeSet, HashSet};

use crate::patterns::IgnoreSet;
use crate::selection::SelectionEvaluator;
use crate::source::{sort_entries, DirectorySource, SortOrder};
use crate::store::TreeStore;
use crate::types::{PathKey, SelectionState, TreeState};

fn marker(state: SelectionState) -> &'static str {
    match state {
        SelectionState::Checked => "[x]",
        SelectionState::Unchecked => "[ ]",
        SelectionState::Indeterminate => "[-]",
    }
}

/// Render the tree held by `store`
pub fn render_tree<S: DirectorySource>(store: &TreeStore<S>, ignore: &IgnoreSet) -> String {
    let evaluator = store.evaluator(ignore);
    let mut out = String::new();
    let root = PathKey::root();

    if !store.tree().contains_key(&root) {
        return out;
    }

    out.push_str(&format!("{} ▾ .\n", marker(evaluator.dir_state(&root))));
    let view = TreeView {
        tree: store.tree(),
        evaluator,
        ignore,
        expanded: store.expanded(),
    };
    view.render_children(&root, 1, HashSet::from([root.clone()]), &mut out);
    out
}

struct TreeView<'a> {
    tree: &'a TreeState,
    evaluator: SelectionEvaluator<'a>,
    ignore: &'a IgnoreSet,
    expanded: &'a BTreeSet<PathKey>,
}

impl TreeView<'_> {
    fn render_children(
        &self,
        dir: &PathKey,
        depth: usize,
        visited: HashSet<PathKey>,
        out: &mut String,
    ) {
        let Some(listing) = self.tree.get(dir) else {
            return;
        };

        let indent = "  ".repeat(depth);
        let mut entries = listing.entries.clone();
        sort_entries(&mut entries, SortOrder::DirectoriesFirst);

        for entry in &entries {
            if !entry.is_dir() {
                out.push_str(&format!(
                    "{}{} {}\n",
                    indent,
                    marker(self.evaluator.file_state(&entry.path)),
                    entry.name
                ));
                continue;
            }
            if self.ignore.is_ignored(&entry.name) || visited.contains(&entry.path) {
                continue;
            }

            let open = self.expanded.contains(&entry.path);
            out.push_str(&format!(
                "{}{} {} {}/\n",
                indent,
                marker(self.evaluator.dir_state(&entry.path)),
                if open { "▾" } else { "▸" },
                entry.name
            ));

            if open {
                let mut branch = visited.clone();
                branch.insert(entry.path.clone());
                self.render_children(&entry.path, depth + 1, branch, out);
            }
        }

        if listing.has_more {
            out.push_str(&format!("{}…\n", indent));
        }
    }
}
