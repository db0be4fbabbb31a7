//! `[Content_Types].xml` registry

use crate::xml::{attr, escape_attr, insert_before_closing};
use regex::Regex;
use std::sync::OnceLock;

fn default_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<Default\b([^>]*)/?>").expect("valid regex"))
}

fn override_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<Override\b([^>]*)/?>").expect("valid regex"))
}

const EMPTY_TYPES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"></Types>"#
);

/// Content type registrations of a package
///
/// Registrations are appended to the existing XML text so that entries the
/// engine does not touch are preserved verbatim.
#[derive(Debug, Clone)]
pub struct ContentTypes {
    xml: String,
}

impl Default for ContentTypes {
    fn default() -> Self {
        Self {
            xml: EMPTY_TYPES.to_string(),
        }
    }
}

impl ContentTypes {
    /// Part name of the registry inside a package
    pub const PART_NAME: &'static str = "[Content_Types].xml";

    /// Wrap existing registry XML
    pub fn parse(xml: &str) -> Self {
        if xml.contains("</Types>") {
            Self {
                xml: xml.to_string(),
            }
        } else {
            Self::default()
        }
    }

    /// Content type registered for an extension
    pub fn default_for(&self, extension: &str) -> Option<String> {
        default_re()
            .captures_iter(&self.xml)
            .filter_map(|caps| {
                let ext = attr(&caps[1], "Extension")?;
                ext.eq_ignore_ascii_case(extension)
                    .then(|| attr(&caps[1], "ContentType"))
                    .flatten()
            })
            .next()
    }

    /// Content type registered for a specific part (leading `/` optional)
    pub fn override_for(&self, part_name: &str) -> Option<String> {
        let wanted = normalize_part_name(part_name);
        override_re()
            .captures_iter(&self.xml)
            .filter_map(|caps| {
                let name = attr(&caps[1], "PartName")?;
                (name == wanted)
                    .then(|| attr(&caps[1], "ContentType"))
                    .flatten()
            })
            .next()
    }

    /// Part names registered with the given content type
    pub fn parts_with_type(&self, content_type: &str) -> Vec<String> {
        override_re()
            .captures_iter(&self.xml)
            .filter(|caps| attr(&caps[1], "ContentType").as_deref() == Some(content_type))
            .filter_map(|caps| attr(&caps[1], "PartName"))
            .map(|name| name.trim_start_matches('/').to_string())
            .collect()
    }

    /// Register a content type for an extension (no-op if already present)
    pub fn add_default(&mut self, extension: &str, content_type: &str) {
        if self.default_for(extension).is_some() {
            return;
        }
        let entry = format!(
            r#"<Default Extension="{}" ContentType="{}"/>"#,
            escape_attr(extension),
            escape_attr(content_type)
        );
        self.append(&entry);
    }

    /// Register a content type for a part (no-op if already present)
    pub fn add_override(&mut self, part_name: &str, content_type: &str) {
        if self.override_for(part_name).is_some() {
            return;
        }
        let entry = format!(
            r#"<Override PartName="{}" ContentType="{}"/>"#,
            escape_attr(&normalize_part_name(part_name)),
            escape_attr(content_type)
        );
        self.append(&entry);
    }

    fn append(&mut self, entry: &str) {
        if let Some(xml) = insert_before_closing(&self.xml, "</Types>", entry) {
            self.xml = xml;
        }
    }

    /// Registry XML
    pub fn to_xml(&self) -> String {
        self.xml.clone()
    }
}

fn normalize_part_name(part_name: &str) -> String {
    format!("/{}", part_name.trim_start_matches('/'))
}
