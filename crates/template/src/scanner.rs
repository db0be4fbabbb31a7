//! Placeholder scanning
//!
//! A placeholder is `${name}`, `${name:arg1:arg2}` or `${name:key=value}`.
//! The name runs up to the first `:` or `}`; everything after the first `:`
//! is a colon-separated argument list.

use regex::{Captures, Regex};
use std::borrow::Cow;
use std::ops::Range;
use std::sync::OnceLock;

/// Pattern matching any placeholder
pub fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\$\{([^:}]*)((?::[^}]*)?)\}").expect("valid regex"))
}

/// Pattern matching every occurrence of one placeholder name, with or without arguments
pub fn occurrence_regex(name: &str) -> Regex {
    let pattern = format!(r"(?i)\$\{{{}((?::[^}}]*)?)\}}", regex::escape(name));
    // An escaped literal always yields a valid pattern
    Regex::new(&pattern).unwrap_or_else(|_| placeholder_regex().clone())
}

/// A placeholder occurrence inside a piece of text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder<'a> {
    /// Whole token, `${...}` included
    pub raw: &'a str,
    /// Variable name
    pub name: &'a str,
    /// Argument section without the leading `:` (empty when absent)
    pub args: &'a str,
    /// Byte span of `raw` within the scanned text
    pub span: Range<usize>,
}

impl<'a> Placeholder<'a> {
    fn from_captures(caps: &Captures<'a>) -> Option<Self> {
        let whole = caps.get(0)?;
        let name = caps.get(1)?.as_str();
        let args = caps
            .get(2)
            .map(|m| m.as_str().strip_prefix(':').unwrap_or(""))
            .unwrap_or("");
        Some(Self {
            raw: whole.as_str(),
            name,
            args,
            span: whole.range(),
        })
    }

    /// Name with the argument section, as written (`img:60x40`)
    pub fn name_with_args(&self) -> &'a str {
        &self.raw[2..self.raw.len() - 1]
    }

    /// Individual arguments
    pub fn arg_list(&self) -> Vec<&'a str> {
        if self.name_with_args().len() == self.name.len() {
            Vec::new()
        } else {
            self.args.split(':').collect()
        }
    }
}

/// Every placeholder occurrence in `text`, in order
pub fn scan(text: &str) -> impl Iterator<Item = Placeholder<'_>> {
    placeholder_regex()
        .captures_iter(text)
        .filter_map(|caps| Placeholder::from_captures(&caps))
}

/// Distinct placeholder names in `text`, in order of first appearance
pub fn names(text: &str) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for placeholder in scan(text) {
        if !seen.iter().any(|n| n == placeholder.name) {
            seen.push(placeholder.name.to_string());
        }
    }
    seen
}

/// Rewrite placeholders in `text`
///
/// `rewrite` returns the replacement for a placeholder, or `None` to keep it.
pub fn rewrite<'t, F>(text: &'t str, mut rewrite: F) -> Cow<'t, str>
where
    F: FnMut(&Placeholder<'_>) -> Option<String>,
{
    placeholder_regex().replace_all(text, |caps: &Captures<'_>| {
        match Placeholder::from_captures(caps) {
            Some(placeholder) => rewrite(&placeholder).unwrap_or_else(|| placeholder.raw.to_string()),
            None => caps[0].to_string(),
        }
    })
}

/// Build a placeholder token from a name and argument section
pub fn token(name: &str, args: &str) -> String {
    if args.is_empty() {
        format!("${{{name}}}")
    } else {
        format!("${{{name}:{args}}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_scan_plain_and_args() {
        let found: Vec<_> = scan("Hi ${name}, total ${total:currency=USD} ${img:60x40:f}").collect();
        assert_eq!(found.len(), 3);

        assert_eq!(found[0].name, "name");
        assert_eq!(found[0].args, "");
        assert_eq!(found[0].span, 3..10);

        assert_eq!(found[1].name, "total");
        assert_eq!(found[1].args, "currency=USD");
        assert_eq!(found[1].name_with_args(), "total:currency=USD");

        assert_eq!(found[2].arg_list(), vec!["60x40", "f"]);
    }

    #[test]
    fn test_empty_args_are_kept() {
        let p = scan("${img::}").next().unwrap();
        assert_eq!(p.name, "img");
        assert_eq!(p.arg_list(), vec!["", ""]);

        let p = scan("${img}").next().unwrap();
        assert!(p.arg_list().is_empty());
    }

    #[test]
    fn test_names_deduplicates() {
        assert_eq!(
            names("${a} ${b:1} ${a:2} ${c}"),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
        assert!(names("no placeholders, just $ and {braces}").is_empty());
    }

    #[test]
    fn test_occurrence_regex_exact_name() {
        let re = occurrence_regex("a");
        assert!(re.is_match("${a}"));
        assert!(re.is_match("${a:1:2}"));
        assert!(!re.is_match("${ab}"));
        assert!(!re.is_match("${b}"));
    }

    #[test]
    fn test_occurrence_regex_is_regex_safe() {
        let re = occurrence_regex("price (net)*");
        assert!(re.is_match("${price (net)*}"));
        assert!(!re.is_match("${price net}"));

        let re = occurrence_regex("item#2");
        assert!(re.is_match("${item#2:60x40}"));
    }

    #[test]
    fn test_occurrence_regex_case_insensitive() {
        assert!(occurrence_regex("Name").is_match("${NAME}"));
    }

    #[test]
    fn test_rewrite() {
        let out = rewrite("${a} ${b:x} ${c}", |p| {
            (p.name != "c").then(|| token(&format!("{}#1", p.name), p.args))
        });
        assert_eq!(out, "${a#1} ${b#1:x} ${c}");
    }
}
