//! Scalar substitution

use crate::scanner::occurrence_regex;
use regex::NoExpand;

/// Convert a JSON value to the text written into the document
pub fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => String::new(),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => value.to_string(),
    }
}

/// Escape a value for word-processing XML
///
/// Values arriving with `&amp;` already escaped are normalised first so the
/// ampersand is escaped exactly once.
pub fn escape_markup(value: &str) -> String {
    let normalized = value.replace("&amp;", "&");
    opc_core::xml::escape_text(&normalized).into_owned()
}

/// Replace occurrences of `${name(:args)*}` in `text` with a literal value
///
/// At most `limit` occurrences are replaced (`0` = all). Other placeholders
/// are left untouched. Returns the new text and the number of replacements.
pub fn substitute(text: &str, name: &str, value: &str, limit: usize) -> (String, usize) {
    let re = occurrence_regex(name);
    let found = re.find_iter(text).count();
    if found == 0 {
        return (text.to_string(), 0);
    }

    let replaced = re.replacen(text, limit, NoExpand(value)).into_owned();
    let count = if limit == 0 { found } else { found.min(limit) };
    (replaced, count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_value_to_string() {
        assert_eq!(value_to_string(&json!("hello")), "hello");
        assert_eq!(value_to_string(&json!(42)), "42");
        assert_eq!(value_to_string(&json!(1.5)), "1.5");
        assert_eq!(value_to_string(&json!(true)), "true");
        assert_eq!(value_to_string(&json!(null)), "");
        assert_eq!(value_to_string(&json!([1, 2])), "[1,2]");
    }

    #[test]
    fn test_substitute_with_arguments() {
        let (out, count) = substitute("Total: ${total:currency=USD} ${other}", "total", "42", 0);
        assert_eq!(out, "Total: 42 ${other}");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_substitute_all_and_limited() {
        let (out, count) = substitute("${a}-${a}-${a}", "a", "x", 0);
        assert_eq!(out, "x-x-x");
        assert_eq!(count, 3);

        let (out, count) = substitute("${a}-${a}-${a}", "a", "x", 2);
        assert_eq!(out, "x-x-${a}");
        assert_eq!(count, 2);
    }

    #[test]
    fn test_substitute_absent_name_is_noop() {
        let (out, count) = substitute("${b}", "a", "x", 0);
        assert_eq!(out, "${b}");
        assert_eq!(count, 0);
    }

    #[test]
    fn test_substitute_value_is_literal() {
        let (out, _) = substitute("${price}", "price", "$1 ${2}", 0);
        assert_eq!(out, "$1 ${2}");
    }

    #[test]
    fn test_substitute_regex_significant_name() {
        let (out, _) = substitute("${a.b} ${axb}", "a.b", "x", 0);
        assert_eq!(out, "x ${axb}");
    }

    #[test]
    fn test_escape_markup() {
        assert_eq!(escape_markup("Fish & Chips"), "Fish &amp; Chips");
        assert_eq!(escape_markup("Fish &amp; Chips"), "Fish &amp; Chips");
        assert_eq!(escape_markup("a < b"), "a &lt; b");
    }
}
