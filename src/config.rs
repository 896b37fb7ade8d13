/*!
 * Configuration handling for codext
 */

use std::path::PathBuf;

use clap::Parser;
use clap_complete::Shell;

use crate::error::Result;
use crate::patterns::{IgnoreSet, DEFAULT_IGNORE};
use crate::source::DEFAULT_PAGE_SIZE;
use crate::types::{OutputFormat, PathKey};
use crate::{bail, ensure};

/// Command-line arguments for codext
#[derive(Parser, Debug, Clone)]
#[clap(
    name = "codext",
    version = env!("CARGO_PKG_VERSION"),
    about = "Bundle selected source files into a prompt-ready context document",
    long_about = "Browses a directory tree, selects files and whole directories, and emits their contents together with the full directory structure as an XML or plain-text bundle for Large Language Models (LLMs)."
)]
pub struct Args {
    /// Root directory to browse (or serve)
    #[clap(default_value = ".")]
    pub directory_path: String,

    /// Comma-separated list of directory name patterns to ignore (`*` is a wildcard)
    #[clap(long, value_delimiter = ',', default_values_t = DEFAULT_IGNORE.iter().map(|p| p.to_string()).collect::<Vec<_>>())]
    pub ignore_patterns: Vec<String>,

    /// Comma-separated list of files to select, relative to the root
    #[clap(long, value_delimiter = ',')]
    pub select: Vec<String>,

    /// Comma-separated list of directories whose files are all selected
    #[clap(long, value_delimiter = ',')]
    pub select_dir: Vec<String>,

    /// Output format
    #[clap(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Print the selection tree instead of generating a bundle
    #[clap(long)]
    pub tree: bool,

    /// Serve the HTTP listing endpoint over the root on this address
    #[clap(long, value_name = "ADDR")]
    pub serve: Option<String>,

    /// Browse a remote listing endpoint instead of the local filesystem
    #[clap(long, value_name = "URL")]
    pub remote: Option<String>,

    /// Entries per page for paginated sources
    #[clap(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,

    /// Copy output to clipboard
    #[clap(long, help = "Copy output to system clipboard")]
    pub clip: bool,

    /// Generate shell completions
    #[clap(long = "generate", value_enum)]
    pub generate: Option<Shell>,

    /// Enable debug logging
    #[clap(short, long)]
    pub verbose: bool,
}

/// What the binary does once configured
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Print shell completions
    Completions(Shell),
    /// Serve the listing endpoint
    Serve(String),
    /// Print the selection tree
    Tree,
    /// Generate a bundle
    Generate,
}

/// Where listings come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Local(PathBuf),
    Remote(String),
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub backend: Backend,
    pub mode: Mode,
    pub ignore: IgnoreSet,
    /// Files to select, in command-line order
    pub select: Vec<PathKey>,
    /// Directories to batch-select
    pub select_dirs: Vec<PathKey>,
    pub format: OutputFormat,
    pub page_size: usize,
    pub clip: bool,
    pub verbose: bool,
    /// `--serve` and `--remote` were both given
    conflicting_backends: bool,
}

impl Config {
    /// Create configuration from command-line arguments
    pub fn from_args(args: Args) -> Result<Self> {
        let parse_keys = |raw: &[String]| -> Result<Vec<PathKey>> {
            raw.iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(PathKey::parse)
                .collect()
        };

        let mode = match (args.generate, &args.serve, args.tree) {
            (Some(shell), _, _) => Mode::Completions(shell),
            (None, Some(addr), _) => Mode::Serve(addr.clone()),
            (None, None, true) => Mode::Tree,
            (None, None, false) => Mode::Generate,
        };

        let backend = match &args.remote {
            Some(url) => Backend::Remote(url.clone()),
            None => Backend::Local(PathBuf::from(&args.directory_path)),
        };

        Ok(Self {
            backend,
            mode,
            ignore: IgnoreSet::new(&args.ignore_patterns)?,
            select: parse_keys(&args.select)?,
            select_dirs: parse_keys(&args.select_dir)?,
            format: args.format,
            page_size: args.page_size,
            clip: args.clip,
            verbose: args.verbose,
            conflicting_backends: args.serve.is_some() && args.remote.is_some(),
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if matches!(self.mode, Mode::Completions(_)) {
            return Ok(());
        }

        ensure!(
            !self.conflicting_backends,
            Config,
            "--serve and --remote cannot be used together"
        );
        ensure!(self.page_size > 0, Config, "--page-size must be at least 1");

        if let Backend::Local(root) = &self.backend {
            if !root.is_dir() {
                bail!(Config, "Target directory not found: {}", root.display());
            }
        }

        Ok(())
    }
}
