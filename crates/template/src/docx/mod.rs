//! Word-processing templates (`.docx`)
//!
//! The main document part, headers and footers are held as XML text. Each
//! data node is dispatched over every part in processing order; the handlers
//! are pure functions of (markup, node, scope) so that cloned rows and blocks
//! can be processed recursively with their own iteration data.

mod clone;
mod picture;

use crate::index::{PartVariables, VariableIndex, Variables};
use crate::node::{sorted_nodes, NodeKey, NodeKind};
use crate::options::ProcessOptions;
use crate::scalar::{escape_markup, substitute, value_to_string};
use crate::scanner::{placeholder_regex, scan};
use crate::{data_object, Result, TemplateError};
use opc_core::{
    rels_path_for, ContentTypes, DocumentPart, MediaRegistry, Package, Relationships, XmlPart,
};
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::BTreeMap;
use std::ops::Range;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, trace};

const MAIN_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml";
const DEFAULT_MAIN_PART: &str = "word/document.xml";

fn header_footer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^word/(header|footer)\d*\.xml$").expect("valid regex"))
}

/// `$` and `{...}` separated by run markup
fn split_placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$(?:\{|[^{$]*?>\{)[^}$]*?\}").expect("valid regex"))
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid regex"))
}

/// Merge placeholders a word processor split across several runs
///
/// `<w:t>$</w:t></w:r><w:r><w:t>{name}</w:t>` becomes `<w:t>${name}</w:t>`.
pub fn repair_split_placeholders(xml: &str) -> String {
    split_placeholder_re()
        .replace_all(xml, |caps: &Captures<'_>| tag_re().replace_all(&caps[0], "").into_owned())
        .into_owned()
}

/// Package state shared by every part during a processing pass
#[derive(Debug)]
pub(crate) struct Assets {
    package: Package,
    content_types: ContentTypes,
    /// Relationship registries loaded so far, by source part
    relations: BTreeMap<String, Relationships>,
    media: MediaRegistry,
}

/// Context handed to node handlers
pub(crate) struct Scope<'a> {
    /// Name of the part being processed
    pub part: &'a str,
    /// File stem of that part, used in media names
    pub stem: &'a str,
    pub assets: &'a mut Assets,
    pub options: &'a ProcessOptions,
}

/// Apply one data node to a region of markup
pub(crate) fn process_node(
    xml: String,
    key: &NodeKey,
    value: &Value,
    scope: &mut Scope<'_>,
) -> Result<String> {
    match key.kind {
        NodeKind::SheetScope => {
            debug!(key = %key, "sheet scope has no meaning in a word-processing part");
            Ok(xml)
        }
        NodeKind::Block => clone::expand_blocks(xml, &key.name, value, scope),
        NodeKind::Row => clone::expand_rows(xml, &key.name, value, scope),
        NodeKind::Image => picture::embed(xml, &key.name, value, scope),
        NodeKind::Scalar => {
            let text = escape_markup(&value_to_string(value));
            let (out, count) =
                substitute(&xml, &key.name, &text, scope.options.replacement_limit());
            if count > 0 {
                trace!(part = scope.part, name = %key.name, count, "substituted scalar");
            }
            Ok(out)
        }
    }
}

/// A loaded word-processing template
#[derive(Debug)]
pub struct DocxTemplate {
    assets: Assets,
    /// Main part first, then headers, then footers
    parts: Vec<XmlPart>,
    index: VariableIndex<String, Range<usize>>,
}

impl DocxTemplate {
    /// Open a template file with default options
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_package(Package::open(path)?, &ProcessOptions::default())
    }

    /// Load a template from package bytes with default options
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_package(Package::from_bytes(data)?, &ProcessOptions::default())
    }

    /// Load a template from an opened package
    pub fn from_package(package: Package, options: &ProcessOptions) -> Result<Self> {
        let content_types = match package.read_xml_opt(ContentTypes::PART_NAME)? {
            Some(xml) => ContentTypes::parse(&xml),
            None => ContentTypes::default(),
        };

        let main = content_types
            .parts_with_type(MAIN_CONTENT_TYPE)
            .into_iter()
            .next()
            .unwrap_or_else(|| DEFAULT_MAIN_PART.to_string());
        if !package.has_part(&main) {
            return Err(TemplateError::Malformed(format!(
                "word-processing package has no main document part ({main})"
            )));
        }

        let mut names = vec![main];
        let mut headers: Vec<&str> = Vec::new();
        let mut footers: Vec<&str> = Vec::new();
        for name in package.part_names() {
            if let Some(caps) = header_footer_re().captures(name) {
                match &caps[1] {
                    "header" => headers.push(name),
                    _ => footers.push(name),
                }
            }
        }
        headers.sort_unstable();
        footers.sort_unstable();
        names.extend(headers.into_iter().chain(footers).map(str::to_string));

        let mut parts = Vec::with_capacity(names.len());
        for name in names {
            let mut xml = package.read_xml(&name)?;
            if options.repair_split_placeholders {
                xml = repair_split_placeholders(&xml);
            }
            parts.push(XmlPart::new(name, xml));
        }

        let mut template = Self {
            assets: Assets {
                package,
                content_types,
                relations: BTreeMap::new(),
                media: MediaRegistry::new(),
            },
            parts,
            index: VariableIndex::new(),
        };
        template.rebuild_index();
        debug!(parts = template.parts.len(), names = template.index.len(), "loaded word-processing template");
        Ok(template)
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for part in &self.parts {
            for span in part.locate(placeholder_regex()) {
                if let Some(placeholder) = scan(&part.read()[span.clone()]).next() {
                    self.index.insert(placeholder.name, part.name().to_string(), span);
                }
            }
        }
    }

    /// Names of the parts that are searched for placeholders
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|p| p.name())
    }

    /// Current XML of a searched part
    pub fn part(&self, name: &str) -> Option<&str> {
        self.parts.iter().find(|p| p.name() == name).map(|p| p.read())
    }

    /// Byte spans of every occurrence of `name`, by part
    pub fn locations(&self, name: &str) -> &[(String, Range<usize>)] {
        self.index.lookup(name)
    }

    /// Distinct placeholder names across all parts
    pub fn variables(&mut self) -> Variables {
        self.rebuild_index();
        Variables::Flat(self.index.names().map(str::to_string).collect())
    }

    /// Distinct placeholder names grouped by part
    pub fn variables_by_part(&mut self) -> Variables {
        self.rebuild_index();
        Variables::Grouped(
            self.index
                .names_by_part()
                .into_iter()
                .map(|(part, names)| PartVariables { part, names })
                .collect(),
        )
    }

    /// Fill the template with a data tree
    pub fn process(&mut self, data: &Value, options: &ProcessOptions) -> Result<()> {
        let nodes = sorted_nodes(data_object(data)?);

        for part in &mut self.parts {
            let name = part.name().to_string();
            let stem = part.stem().to_string();
            let mut scope = Scope {
                part: &name,
                stem: &stem,
                assets: &mut self.assets,
                options,
            };

            let mut xml = part.read().to_string();
            for (key, value) in &nodes {
                xml = process_node(xml, key, value, &mut scope)?;
            }
            part.write(xml);
        }

        self.rebuild_index();
        Ok(())
    }

    /// Serialize the filled package
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        for part in self.parts.iter().filter(|p| p.is_modified()) {
            self.assets.package.set_part(part.name(), part.read());
        }
        for (part, rels) in &self.assets.relations {
            self.assets.package.set_part(&rels_path_for(part), rels.to_xml());
        }
        self.assets
            .package
            .set_part(ContentTypes::PART_NAME, self.assets.content_types.to_xml());

        Ok(self.assets.package.to_bytes()?)
    }

    /// Write the filled package to a file
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}
