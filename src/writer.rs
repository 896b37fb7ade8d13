/*!
 * Context bundle writer
 *
 * Produces the XML or text bundle from a fresh walk of the whole root
 * (independent of what is loaded or expanded in the tree store) plus the
 * contents of the selected files.
 */

use std::collections::HashMap;
use std::sync::Arc;

use indicatif::ProgressBar;
use quick_xml::escape::partial_escape;
use tracing::{debug, warn};

use crate::error::Result;
use crate::notify::{Notice, Notifier, NullNotifier};
use crate::patterns::IgnoreSet;
use crate::registry::HandleRegistry;
use crate::source::{locale_cmp, DirectorySource};
use crate::types::{EntryKind, EntryNode, OutputFormat, PathKey, SelectedSet};
use crate::utils::{estimate_tokens, fence_language};

/// Generated bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub output: String,
    /// `ceil(chars / 4)` of `output`
    pub token_estimate: usize,
    pub format: OutputFormat,
    /// Selected files included
    pub documents: usize,
    /// Character count of every included file, in document order
    pub document_sizes: Vec<(PathKey, usize)>,
    /// Files and directories skipped because they could not be read
    pub errors: usize,
}

/// Directory tree captured by the fresh walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
    Directory {
        name: String,
        path: PathKey,
        children: Vec<TreeNode>,
    },
    File {
        name: String,
        path: PathKey,
    },
}

impl TreeNode {
    pub fn name(&self) -> &str {
        match self {
            TreeNode::Directory { name, .. } | TreeNode::File { name, .. } => name,
        }
    }

    /// Every file path in the tree, depth-first
    pub fn file_paths(&self) -> Vec<PathKey> {
        let mut out = Vec::new();
        self.push_files(&mut out);
        out
    }

    fn push_files(&self, out: &mut Vec<PathKey>) {
        match self {
            TreeNode::File { path, .. } => out.push(path.clone()),
            TreeNode::Directory { children, .. } => {
                children.iter().for_each(|c| c.push_files(out));
            }
        }
    }
}

/// Escape text content
pub fn escape_text(text: &str) -> String {
    partial_escape(text).into_owned()
}

/// Escape an attribute value
pub fn escape_attribute(value: &str) -> String {
    partial_escape(value).replace('"', "&quot;")
}

/// Wrap `content` in CDATA. A literal `]]>` is split across two sections so
/// the concatenated sections still equal `content`.
fn cdata(content: &str) -> String {
    format!("<![CDATA[{}]]>", content.replace("]]>", "]]]]><![CDATA[>"))
}

/// Bundle writer over a directory source
pub struct BundleWriter<'a, S: DirectorySource> {
    source: &'a S,
    progress: Arc<ProgressBar>,
    notifier: &'a dyn Notifier,
}

impl<'a, S: DirectorySource> BundleWriter<'a, S> {
    /// Create a new bundle writer
    pub fn new(source: &'a S, progress: Arc<ProgressBar>) -> Self {
        Self {
            source,
            progress,
            notifier: &NullNotifier,
        }
    }

    /// Report aggregate read failures to `notifier`
    pub fn with_notifier(mut self, notifier: &'a dyn Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// Generate the bundle.
    ///
    /// Files are resolved through the directory that contains them in
    /// `registry`. A file that cannot be resolved or read is counted and
    /// skipped; only a failure to list the root aborts generation.
    pub fn generate(
        &self,
        root: &S::Handle,
        selected: &SelectedSet,
        registry: &HandleRegistry<S::Handle>,
        ignore: &IgnoreSet,
        format: OutputFormat,
    ) -> Result<Bundle> {
        let mut errors = 0;
        let tree = self.build_tree(root, ignore, &mut errors)?;
        let documents = self.read_documents(selected, registry, &mut errors);

        let output = match format {
            OutputFormat::Xml => render_xml(&tree, &documents),
            OutputFormat::Text => render_text(&tree, &documents),
        };

        if errors > 0 {
            self.notifier.notify(&Notice::ReadFailures { count: errors });
        }

        Ok(Bundle {
            token_estimate: estimate_tokens(&output),
            output,
            format,
            documents: documents.len(),
            document_sizes: documents
                .iter()
                .map(|(path, content)| (path.clone(), content.chars().count()))
                .collect(),
            errors,
        })
    }

    /// Walk the whole tree below `root`, pruning ignored directories
    pub fn build_tree(
        &self,
        root: &S::Handle,
        ignore: &IgnoreSet,
        errors: &mut usize,
    ) -> Result<TreeNode> {
        let path = PathKey::root();
        let listing = self.source.list_all(root, &path)?;
        let children = self.build_children(listing.listing.entries, listing.subdirs, ignore, errors);
        Ok(TreeNode::Directory {
            name: ".".to_string(),
            path,
            children,
        })
    }

    fn build_children(
        &self,
        entries: Vec<EntryNode>,
        subdirs: Vec<(PathKey, S::Handle)>,
        ignore: &IgnoreSet,
        errors: &mut usize,
    ) -> Vec<TreeNode> {
        let mut handles: HashMap<PathKey, S::Handle> = subdirs.into_iter().collect();
        let mut nodes = Vec::with_capacity(entries.len());

        for entry in entries {
            match entry.kind {
                EntryKind::File => nodes.push(TreeNode::File {
                    name: entry.name,
                    path: entry.path,
                }),
                EntryKind::Directory if ignore.is_ignored(&entry.name) => continue,
                EntryKind::Directory => {
                    let children = match handles.remove(&entry.path) {
                        Some(handle) => match self.source.list_all(&handle, &entry.path) {
                            Ok(listing) => self.build_children(
                                listing.listing.entries,
                                listing.subdirs,
                                ignore,
                                errors,
                            ),
                            Err(e) => {
                                warn!("Cannot list {}: {}", entry.path, e);
                                *errors += 1;
                                Vec::new()
                            }
                        },
                        None => {
                            *errors += 1;
                            Vec::new()
                        }
                    };
                    nodes.push(TreeNode::Directory {
                        name: entry.name,
                        path: entry.path,
                        children,
                    });
                }
            }
        }
        nodes
    }

    /// Read every selected file, in selection order
    fn read_documents(
        &self,
        selected: &SelectedSet,
        registry: &HandleRegistry<S::Handle>,
        errors: &mut usize,
    ) -> Vec<(PathKey, String)> {
        self.progress.set_length(selected.len() as u64);
        let mut documents = Vec::with_capacity(selected.len());

        for path in selected.iter() {
            self.progress.inc(1);
            self.progress.set_message(format!("Reading {}", path));

            let Some(dir) = registry.containing(path) else {
                warn!("No directory handle for {}", path);
                *errors += 1;
                continue;
            };

            match self.source.read_file(dir, path) {
                Ok(content) => documents.push((path.clone(), content)),
                Err(e) => {
                    warn!("{}", e);
                    *errors += 1;
                }
            }
        }

        debug!("Read {} of {} selected file(s)", documents.len(), selected.len());
        documents
    }
}

/// `<codebase_context>` document
pub fn render_xml(tree: &TreeNode, documents: &[(PathKey, String)]) -> String {
    let mut structure = String::new();
    write_xml_node(tree, "  ", &mut structure);

    let mut docs = String::new();
    for (id, (path, content)) in documents.iter().enumerate() {
        docs.push_str(&format!("  <document id=\"{}\">\n", id + 1));
        docs.push_str(&format!(
            "    <file_path>{}</file_path>\n",
            escape_text(path.as_str())
        ));
        docs.push_str(&format!(
            "    <document_content>{}</document_content>\n",
            cdata(content)
        ));
        docs.push_str("  </document>\n");
    }

    format!(
        "<codebase_context>\n<directory_structure>\n{}</directory_structure>\n\n<documents>\n{}</documents>\n</codebase_context>",
        structure, docs
    )
}

fn write_xml_node(node: &TreeNode, indent: &str, out: &mut String) {
    match node {
        TreeNode::File { name, .. } => {
            out.push_str(&format!("{}<file name=\"{}\" />\n", indent, escape_attribute(name)));
        }
        TreeNode::Directory { name, children, .. } => {
            out.push_str(&format!(
                "{}<directory name=\"{}\">\n",
                indent,
                escape_attribute(name)
            ));
            let child_indent = format!("{}  ", indent);
            for child in children {
                write_xml_node(child, &child_indent, out);
            }
            out.push_str(&format!("{}</directory>\n", indent));
        }
    }
}

/// Markdown-flavored text bundle
pub fn render_text(tree: &TreeNode, documents: &[(PathKey, String)]) -> String {
    let mut out = String::from("# CODEBASE STRUCTURE\n\n");
    out.push_str(&format!("📁 {}\n", tree.name()));
    if let TreeNode::Directory { children, .. } = tree {
        write_text_children(children, "", &mut out);
    }

    out.push_str("\n# CODE FILES\n\n");

    let mut sorted: Vec<&(PathKey, String)> = documents.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    for (path, content) in sorted {
        let fence = fence_for(content);
        out.push_str(&format!("## File: {}\n", path));
        out.push_str(&format!("{}{}\n", fence, fence_language(path.name())));
        out.push_str(content);
        if !content.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&format!("{}\n\n", fence));
    }

    out
}

/// Backtick fence longer than any backtick run inside `content`
fn fence_for(content: &str) -> String {
    let longest = content
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    "`".repeat(longest.max(2) + 1)
}

fn write_text_children(children: &[TreeNode], prefix: &str, out: &mut String) {
    let mut ordered: Vec<&TreeNode> = children.iter().collect();
    ordered.sort_by(|a, b| {
        let a_dir = matches!(a, TreeNode::Directory { .. });
        let b_dir = matches!(b, TreeNode::Directory { .. });
        b_dir.cmp(&a_dir).then_with(|| locale_cmp(a.name(), b.name()))
    });

    let count = ordered.len();
    for (idx, child) in ordered.into_iter().enumerate() {
        let last = idx + 1 == count;
        let connector = if last { "└── " } else { "├── " };
        match child {
            TreeNode::File { name, .. } => {
                out.push_str(&format!("{}{}📄 {}\n", prefix, connector, name));
            }
            TreeNode::Directory { name, children, .. } => {
                out.push_str(&format!("{}{}📁 {}\n", prefix, connector, name));
                let next = format!("{}{}", prefix, if last { "    " } else { "│   " });
                write_text_children(children, &next, out);
            }
        }
    }
}
