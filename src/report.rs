/*!
 * Reporting functionality for codext
 *
 * Summarizes a generated bundle using tabled tables.
 */

use std::time::Duration;

use tabled::{
    settings::{object::Columns, Alignment, Modify, Padding, Style},
    Table, Tabled,
};

use crate::collector::CacheStats;
use crate::types::{OutputFormat, PathKey};
use crate::utils::{format_number, TokenLoad};
use crate::writer::Bundle;

/// Statistics of one bundle generation
#[derive(Debug, Clone)]
pub struct BundleReport {
    pub format: OutputFormat,
    /// Time taken to generate
    pub duration: Duration,
    pub documents: usize,
    pub read_failures: usize,
    /// Characters in the bundle
    pub total_chars: usize,
    pub token_estimate: usize,
    /// Character count of every included file
    pub files: Vec<(PathKey, usize)>,
    /// Collection cache statistics, when directories were selected
    pub cache: Option<CacheStats>,
}

impl BundleReport {
    pub fn from_bundle(bundle: &Bundle, duration: Duration) -> Self {
        Self {
            format: bundle.format,
            duration,
            documents: bundle.documents,
            read_failures: bundle.errors,
            total_chars: bundle.output.chars().count(),
            token_estimate: bundle.token_estimate,
            files: bundle.document_sizes.clone(),
            cache: None,
        }
    }

    pub fn with_cache(mut self, stats: CacheStats) -> Self {
        self.cache = Some(stats);
        self
    }
}

/// Format of the report output
pub enum ReportFormat {
    /// Console table output
    ConsoleTable,
}

/// Report generator for bundles
pub struct Reporter {
    format: ReportFormat,
}

impl Reporter {
    pub fn new(format: ReportFormat) -> Self {
        Self { format }
    }

    /// Generate a report string
    pub fn generate_report(&self, report: &BundleReport) -> String {
        match self.format {
            ReportFormat::ConsoleTable => self.generate_console_report(report),
        }
    }

    /// Print the report to stderr, keeping stdout for the bundle itself
    pub fn print_report(&self, report: &BundleReport) {
        eprintln!("\n{}", self.generate_report(report));
    }

    fn create_summary_table(&self, report: &BundleReport) -> String {
        #[derive(Tabled)]
        struct SummaryRow {
            #[tabled(rename = "Metric")]
            key: String,

            #[tabled(rename = "Value")]
            value: String,
        }

        let mut rows = vec![
            SummaryRow {
                key: "🧾 Format".to_string(),
                value: report.format.to_string(),
            },
            SummaryRow {
                key: "⏱️ Process Time".to_string(),
                value: format!("{:.4?}", report.duration),
            },
            SummaryRow {
                key: "📄 Documents".to_string(),
                value: format_number(report.documents),
            },
            SummaryRow {
                key: "⚠️ Read Failures".to_string(),
                value: report.read_failures.to_string(),
            },
            SummaryRow {
                key: "🔤 Characters".to_string(),
                value: format_number(report.total_chars),
            },
            SummaryRow {
                key: "📦 LLM Tokens".to_string(),
                value: format!(
                    "{} tokens (estimated, {})",
                    format_number(report.token_estimate),
                    TokenLoad::for_tokens(report.token_estimate)
                ),
            },
        ];

        if let Some(stats) = report.cache {
            let total = stats.hits + stats.misses;
            let hit_rate = if total > 0 {
                format!("{:.1}%", (stats.hits as f64 / total as f64) * 100.0)
            } else {
                "0.0%".to_string()
            };
            rows.push(SummaryRow {
                key: "🔄 Cache Hit Rate".to_string(),
                value: format!("{} ({} hits / {} total)", hit_rate, stats.hits, total),
            });
        }

        let mut table = Table::new(rows);
        table
            .with(Style::rounded())
            .with(Padding::new(1, 1, 0, 0))
            .with(Modify::new(Columns::new(..)).with(Alignment::left()));

        table.to_string()
    }

    fn create_files_table(&self, report: &BundleReport) -> String {
        #[derive(Tabled)]
        struct FileRow {
            #[tabled(rename = "File Path")]
            path: String,

            #[tabled(rename = "Chars")]
            chars: String,

            #[tabled(rename = "Est. Tokens")]
            tokens: String,
        }

        let mut files: Vec<_> = report.files.iter().collect();
        files.sort_by(|(_, a), (_, b)| b.cmp(a));

        let files_to_show = if files.len() > 15 {
            &files[..10]
        } else {
            &files[..]
        };

        let rows: Vec<FileRow> = files_to_show
            .iter()
            .map(|(path, chars)| FileRow {
                path: truncate_path(path.as_str(), 60),
                chars: format_number(*chars),
                tokens: format_number(chars.div_ceil(4)),
            })
            .collect();

        let mut table = Table::new(rows);
        table
            .with(Style::rounded())
            .with(Padding::new(1, 1, 0, 0))
            .with(Modify::new(Columns::new(..)).with(Alignment::left()));

        table.to_string()
    }

    fn generate_console_report(&self, report: &BundleReport) -> String {
        let summary_table = self.create_summary_table(report);
        let summary_title = "✅  BUNDLE COMPLETE";

        if report.files.is_empty() {
            return format!("{}\n{}", summary_title, summary_table);
        }

        let files_table = self.create_files_table(report);
        let files_title = if report.files.len() > 15 {
            "📋  TOP 10 LARGEST FILES BY CHARACTER COUNT  📋"
        } else {
            "📋  INCLUDED FILES"
        };

        format!(
            "{}\n{}\n\n{}\n{}",
            files_title, files_table, summary_title, summary_table
        )
    }
}

/// Keep the trailing segments of `path` that fit in `max_len`
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let mut kept = Vec::new();
    let mut len = 3;
    for part in path.rsplit('/') {
        let part_len = part.chars().count() + 1;
        if len + part_len > max_len {
            break;
        }
        kept.push(part);
        len += part_len;
    }

    if kept.is_empty() {
        let tail: String = path
            .chars()
            .rev()
            .take(max_len.saturating_sub(3))
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        return format!("...{}", tail);
    }

    kept.reverse();
    format!(".../{}", kept.join("/"))
}
