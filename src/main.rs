/*!
 * Command-line interface for codext
 */

use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{CommandFactory, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use codext::api::ListingServer;
use codext::clipboard::copy_and_notify;
use codext::config::{Args, Backend, Config, Mode};
use codext::error::ResultExt;
use codext::notify::LogNotifier;
use codext::render::render_tree;
use codext::report::{BundleReport, ReportFormat, Reporter};
use codext::source::{DirectorySource, HttpSource, LocalSource, PagedSource};
use codext::store::TreeStore;
use codext::writer::BundleWriter;
use codext::{CodextError, Result};

fn main() -> io::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = Config::from_args(args)?;
    config.validate()?;

    match (&config.mode, &config.backend) {
        (Mode::Completions(shell), _) => {
            clap_complete::generate(*shell, &mut Args::command(), "codext", &mut io::stdout());
        }
        (Mode::Serve(addr), Backend::Local(root)) => {
            let source = PagedSource::new(root).with_page_size(config.page_size);
            let server = ListingServer::bind(addr, source)?;
            if let Some(local) = server.local_addr() {
                info!("Serving {} on http://{}/api/files", root.display(), local);
                eprintln!("Listening on http://{}/api/files", local);
            }
            server.run()?;
        }
        (Mode::Serve(_), Backend::Remote(_)) => {
            return Err(CodextError::Config("--serve needs a local directory".into()).into());
        }
        (_, Backend::Local(root)) => browse(LocalSource::new(root), &config)?,
        (_, Backend::Remote(url)) => {
            let source = HttpSource::new(url)?.with_page_size(config.page_size);
            browse(source, &config)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Open the root, apply the requested selection, then print either the
/// tree view or the bundle.
fn browse<S: DirectorySource>(source: S, config: &Config) -> Result<()> {
    let mut store = TreeStore::new(source, LogNotifier);
    if !store.pick_root()? {
        return Ok(());
    }

    for path in &config.select {
        if let Some(parent) = path.parent() {
            store.expand_to(&parent)?;
        }
        store.set_file_selected(path, true);
    }

    for dir in &config.select_dirs {
        let summary = store.toggle_directory_selection(dir, true, &config.ignore)?;
        debug!(
            "Selected {} file(s) under {} ({} directories loaded)",
            summary.files, summary.path, summary.loaded
        );
    }

    if config.mode == Mode::Tree {
        print!("{}", render_tree(&store, &config.ignore));
        return Ok(());
    }

    let progress = ProgressBar::new(0);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix:.bold.cyan} {wide_msg:.dim.white} {pos}/{len} ({percent}%)")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    progress.enable_steady_tick(Duration::from_millis(100));
    progress.set_prefix("📊 Bundling");

    let root = store
        .root_handle()
        .ok_or_else(|| CodextError::Unexpected("root handle missing after pick".into()))?;

    let start_time = Instant::now();
    let bundle = BundleWriter::new(store.source(), Arc::new(progress.clone()))
        .with_notifier(&LogNotifier)
        .generate(
            root,
            store.selected(),
            store.registry(),
            &config.ignore,
            config.format,
        )?;
    let duration = start_time.elapsed();
    progress.finish_and_clear();

    let mut stdout = io::stdout().lock();
    stdout
        .write_all(bundle.output.as_bytes())
        .and_then(|_| stdout.flush())
        .with_context(|| "Failed to write bundle to stdout")?;

    let mut report = BundleReport::from_bundle(&bundle, duration);
    if !config.select_dirs.is_empty() {
        report = report.with_cache(store.cache_stats());
    }
    Reporter::new(ReportFormat::ConsoleTable).print_report(&report);

    if config.clip {
        copy_and_notify(&bundle.output, &LogNotifier);
    }

    Ok(())
}
