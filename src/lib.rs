/*!
 * codext - Bundle selected source files into LLM context
 *
 * Browses a directory tree lazily through a pluggable directory source,
 * tracks a file selection with derived tri-state directory states, and
 * serializes the full directory structure plus the selected files into an
 * XML or plain-text bundle.
 */

pub mod api;
pub mod clipboard;
pub mod collector;
pub mod config;
pub mod error;
pub mod notify;
pub mod patterns;
pub mod registry;
pub mod render;
pub mod report;
pub mod selection;
pub mod source;
pub mod store;
pub mod types;
pub mod utils;
pub mod writer;


// Re-export main components for easier access
pub use config::Config;
pub use error::{CodextError, Result};
pub use notify::{LogNotifier, Notice, Notifier, NullNotifier};
pub use patterns::IgnoreSet;
pub use report::{BundleReport, ReportFormat, Reporter};
pub use source::{DirectorySource, HttpSource, LocalSource, PagedSource};
pub use store::TreeStore;
pub use types::{DirectoryListing, EntryKind, EntryNode, OutputFormat, PathKey, SelectedSet, SelectionState};
pub use utils::estimate_tokens;
pub use writer::{Bundle, BundleWriter};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
