/*!
 * Utility functions for codext
 */

use std::fmt;
use std::path::Path;

/// Rough token cost of `text`: one token per four characters, rounded up.
///
/// This is a heuristic, not a tokenizer.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// How heavy a bundle is for a prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenLoad {
    Low,
    Medium,
    High,
}

impl TokenLoad {
    pub fn for_tokens(tokens: usize) -> Self {
        if tokens < 5_000 {
            TokenLoad::Low
        } else if tokens < 15_000 {
            TokenLoad::Medium
        } else {
            TokenLoad::High
        }
    }
}

impl fmt::Display for TokenLoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TokenLoad::Low => "Low",
            TokenLoad::Medium => "Medium",
            TokenLoad::High => "High",
        };
        f.write_str(label)
    }
}

/// Language tag for a fenced code block: the file extension, if any
pub fn fence_language(name: &str) -> &str {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
}

/// Format a number with human-readable units
pub fn format_number(num: usize) -> String {
    if num >= 1_000_000 {
        format!("{:.1}M", num as f64 / 1_000_000.0)
    } else if num >= 1_000 {
        format!("{:.1}K", num as f64 / 1_000.0)
    } else {
        num.to_string()
    }
}
