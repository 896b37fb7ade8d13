/*!
 * Ignore-pattern matching for directory names
 *
 * A pattern without `*` matches a basename by exact equality. A pattern with
 * `*` is compiled into an anchored regular expression where every `*` stands
 * for any run of characters (including none) and everything else is literal.
 * `**`, `?` and character classes have no special meaning.
 */

use std::collections::BTreeSet;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Result;

/// Ignore input used when the user supplies none
pub static DEFAULT_IGNORE: Lazy<Vec<&'static str>> =
    Lazy::new(|| vec!["node_modules", ".*", "_*", "dist", "build"]);

#[derive(Debug, Clone)]
enum Matcher {
    Exact(String),
    Glob(Regex),
}

impl Matcher {
    fn compile(pattern: &str) -> Result<Self> {
        if !pattern.contains('*') {
            return Ok(Matcher::Exact(pattern.to_string()));
        }
        Ok(Matcher::Glob(Regex::new(&glob_to_regex(pattern))?))
    }

    fn matches(&self, name: &str) -> bool {
        match self {
            Matcher::Exact(exact) => exact == name,
            Matcher::Glob(regex) => regex.is_match(name),
        }
    }
}

/// Translate a `*` glob into an anchored regular expression source
pub fn glob_to_regex(pattern: &str) -> String {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    format!("^{}$", body)
}

/// A compiled, deduplicated set of ignore patterns.
///
/// Each pattern is compiled once when the set is built, so a set can be
/// shared across a whole traversal.
#[derive(Debug, Clone, Default)]
pub struct IgnoreSet {
    patterns: BTreeSet<String>,
    matchers: Vec<Matcher>,
}

impl IgnoreSet {
    /// Build a set from individual patterns. Blank patterns are dropped.
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: BTreeSet<String> = patterns
            .into_iter()
            .map(|p| p.as_ref().trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        let matchers = patterns
            .iter()
            .map(|p| Matcher::compile(p))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { patterns, matchers })
    }

    /// Parse a comma-separated ignore input such as `"node_modules, .*, dist"`
    pub fn parse_list(input: &str) -> Result<Self> {
        Self::new(input.split(','))
    }

    /// The default ignore set
    pub fn defaults() -> Self {
        // Default patterns are plain literals and globs; compilation cannot fail
        Self::new(DEFAULT_IGNORE.iter()).unwrap_or_default()
    }

    /// True if any pattern matches `name` in full
    pub fn is_ignored(&self, name: &str) -> bool {
        self.matchers.iter().any(|m| m.matches(name))
    }

    /// Stable identity of the pattern set, usable as a cache key
    pub fn fingerprint(&self) -> String {
        self.patterns.iter().cloned().collect::<Vec<_>>().join("\u{1f}")
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl fmt::Display for IgnoreSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.patterns().collect();
        f.write_str(&joined.join(", "))
    }
}

/// One-shot check of `name` against `patterns`.
///
/// Compiles every pattern on each call; traversals should build an
/// [`IgnoreSet`] once instead.
pub fn is_ignored<S: AsRef<str>>(name: &str, patterns: &[S]) -> bool {
    patterns.iter().any(|p| {
        Matcher::compile(p.as_ref())
            .map(|m| m.matches(name))
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_patterns() {
        let set = IgnoreSet::new(["node_modules", "dist"]).unwrap();
        assert!(set.is_ignored("node_modules"));
        assert!(set.is_ignored("dist"));
        assert!(!set.is_ignored("node_modules2"));
        assert!(!set.is_ignored("Dist"));
        assert!(!set.is_ignored("mydist"));
    }

    #[test]
    fn test_dot_star_pattern() {
        let set = IgnoreSet::new([".*"]).unwrap();
        assert!(set.is_ignored(".git"));
        assert!(set.is_ignored(".env"));
        assert!(set.is_ignored("."));
        assert!(!set.is_ignored("agit"));
    }

    #[test]
    fn test_prefix_and_infix_patterns() {
        let set = IgnoreSet::new(["test*", "a*b"]).unwrap();
        assert!(set.is_ignored("test"));
        assert!(set.is_ignored("testing"));
        assert!(!set.is_ignored("atest"));
        assert!(set.is_ignored("ab"));
        assert!(set.is_ignored("a-middle-b"));
        assert!(!set.is_ignored("a-middle-bc"));
    }

    #[test]
    fn test_metacharacters_are_literal() {
        let set = IgnoreSet::new(["build(1)*", "v1.0"]).unwrap();
        assert!(set.is_ignored("build(1)-old"));
        assert!(!set.is_ignored("build1-old"));
        assert!(set.is_ignored("v1.0"));
        assert!(!set.is_ignored("v1x0"));
        assert_eq!(glob_to_regex("a.b*"), r"^a\.b.*$");
    }

    #[test]
    fn test_question_mark_and_classes_are_not_special() {
        let set = IgnoreSet::new(["?", "[ab]*"]).unwrap();
        assert!(set.is_ignored("?"));
        assert!(!set.is_ignored("x"));
        assert!(set.is_ignored("[ab]c"));
        assert!(!set.is_ignored("ac"));
    }

    #[test]
    fn test_parse_list_trims_and_dedupes() {
        let a = IgnoreSet::parse_list(" node_modules , .*,, dist ,node_modules").unwrap();
        let b = IgnoreSet::new(["dist", ".*", "node_modules"]).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.patterns().count(), 3);
        assert!(IgnoreSet::parse_list(" , ").unwrap().is_empty());
    }

    #[test]
    fn test_free_function_agrees_with_set() {
        let patterns = ["node_modules", ".*", "_*"];
        let set = IgnoreSet::new(patterns).unwrap();
        for name in ["node_modules", ".git", "_build", "src", "a_b", "node"] {
            assert_eq!(is_ignored(name, &patterns), set.is_ignored(name), "{}", name);
        }
    }

    #[test]
    fn test_defaults() {
        let set = IgnoreSet::defaults();
        assert!(set.is_ignored("node_modules"));
        assert!(set.is_ignored(".git"));
        assert!(set.is_ignored("_next"));
        assert!(set.is_ignored("build"));
        assert!(!set.is_ignored("src"));
    }
}
