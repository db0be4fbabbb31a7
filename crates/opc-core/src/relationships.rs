//! `*.rels` relationship registries

use crate::xml::{attr, escape_attr, insert_before_closing};
use regex::Regex;
use std::sync::OnceLock;

fn relationship_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<Relationship\b([^>]*?)/?>").expect("valid regex"))
}

const EMPTY_RELATIONSHIPS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"></Relationships>"#
);

/// A single relationship entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
}

/// Relationships of one source part
#[derive(Debug, Clone)]
pub struct Relationships {
    xml: String,
}

impl Default for Relationships {
    fn default() -> Self {
        Self {
            xml: EMPTY_RELATIONSHIPS.to_string(),
        }
    }
}

impl Relationships {
    /// Wrap existing relationship XML
    pub fn parse(xml: &str) -> Self {
        if xml.contains("</Relationships>") {
            Self {
                xml: xml.to_string(),
            }
        } else if xml.contains("<Relationships") && xml.trim_end().ends_with("/>") {
            // Self-closing root: `<Relationships .../>`
            let trimmed = xml.trim_end();
            Self {
                xml: format!("{}></Relationships>", &trimmed[..trimmed.len() - 2]),
            }
        } else {
            Self::default()
        }
    }

    /// All relationships in document order
    pub fn entries(&self) -> Vec<Relationship> {
        relationship_re()
            .captures_iter(&self.xml)
            .filter_map(|caps| {
                Some(Relationship {
                    id: attr(&caps[1], "Id")?,
                    rel_type: attr(&caps[1], "Type").unwrap_or_default(),
                    target: attr(&caps[1], "Target")?,
                })
            })
            .collect()
    }

    /// Target of the relationship with the given id
    pub fn target(&self, id: &str) -> Option<String> {
        self.entries()
            .into_iter()
            .find(|r| r.id == id)
            .map(|r| r.target)
    }

    /// All relationships of a given type
    pub fn by_type(&self, rel_type: &str) -> Vec<Relationship> {
        self.entries()
            .into_iter()
            .filter(|r| r.rel_type == rel_type)
            .collect()
    }

    /// Next free `rIdN` identifier
    pub fn next_id(&self) -> String {
        let max = self
            .entries()
            .iter()
            .filter_map(|r| r.id.strip_prefix("rId")?.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        format!("rId{}", max + 1)
    }

    /// Append a relationship and return its id
    pub fn add(&mut self, rel_type: &str, target: &str) -> String {
        let id = self.next_id();
        let entry = format!(
            r#"<Relationship Id="{}" Type="{}" Target="{}"/>"#,
            id,
            escape_attr(rel_type),
            escape_attr(target)
        );
        if let Some(xml) = insert_before_closing(&self.xml, "</Relationships>", &entry) {
            self.xml = xml;
        }
        id
    }

    /// Registry XML
    pub fn to_xml(&self) -> String {
        self.xml.clone()
    }
}

/// Relationship part path for a source part
///
/// `word/document.xml` → `word/_rels/document.xml.rels`
pub fn rels_path_for(part_name: &str) -> String {
    let part_name = part_name.trim_start_matches('/');
    match part_name.rfind('/') {
        Some(pos) => format!(
            "{}/_rels/{}.rels",
            &part_name[..pos],
            &part_name[pos + 1..]
        ),
        None => format!("_rels/{part_name}.rels"),
    }
}

/// Resolve a relationship target against its source part
///
/// Absolute targets start at the package root; relative targets are resolved
/// against the directory of the source part (`..` segments allowed).
pub fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = source_part
        .trim_start_matches('/')
        .split('/')
        .collect();
    segments.pop(); // source file name

    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    segments.join("/")
}
