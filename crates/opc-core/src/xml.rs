//! Small helpers for working with XML text without a full parser

use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::OnceLock;

/// Escape text content (`&`, `<`, `>`)
pub fn escape_text(raw: &str) -> Cow<'_, str> {
    quick_xml::escape::partial_escape(raw)
}

/// Escape an attribute value (also escapes quotes)
pub fn escape_attr(raw: &str) -> Cow<'_, str> {
    quick_xml::escape::escape(raw)
}

/// Resolve entity and character references in text content
///
/// Returns the offending text in the error so callers can attach the part name.
pub fn unescape(raw: &str) -> std::result::Result<Cow<'_, str>, String> {
    quick_xml::escape::unescape(raw).map_err(|e| format!("{e} in {raw:?}"))
}

/// Any `name="value"` or `name='value'` pair, with its leading whitespace
fn attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?:^|\s+)([^\s=/>]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid regex")
    })
}

/// Read an attribute value from the attribute section of a start tag
///
/// `attrs` is everything between the element name and the closing `>`.
pub fn attr(attrs: &str, name: &str) -> Option<String> {
    attr_re()
        .captures_iter(attrs)
        .find(|caps| &caps[1] == name)
        .and_then(|caps| caps.get(2).or_else(|| caps.get(3)))
        .map(|m| m.as_str().to_string())
}

/// Remove an attribute (and its leading whitespace) from an attribute section
pub fn remove_attr(attrs: &str, name: &str) -> String {
    attr_re()
        .replace_all(attrs, |caps: &Captures<'_>| {
            if &caps[1] == name {
                String::new()
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// Insert `fragment` immediately before the last occurrence of `closing`
///
/// Returns `None` when the closing tag is absent.
pub fn insert_before_closing(xml: &str, closing: &str, fragment: &str) -> Option<String> {
    let pos = xml.rfind(closing)?;
    let mut out = String::with_capacity(xml.len() + fragment.len());
    out.push_str(&xml[..pos]);
    out.push_str(fragment);
    out.push_str(&xml[pos..]);
    Some(out)
}
