//! Spreadsheet templates (`.xlsx`)
//!
//! Placeholders live in string cells. Locations are `(sheet index, cell)`
//! pairs, so every structural change (row insertion or deletion) is followed
//! by an index rebuild before the next lookup.

mod drawing;
mod sheet;

pub use drawing::Picture;
pub use sheet::{column_index, column_letters, Cell, CellContent, CellRef, Row, Worksheet};

use crate::image::{ImageArgs, ImageSource, ImageSpec};
use crate::index::{PartVariables, VariableIndex, Variables};
use crate::node::{iterations, membership, sorted_nodes, Membership, NodeKey, NodeKind};
use crate::options::ProcessOptions;
use crate::scalar::{substitute, value_to_string};
use crate::scanner::{rewrite, scan, token};
use crate::{data_object, Result, TemplateError};
use opc_core::{
    rel_types, rels_path_for, resolve_target, ContentTypes, MediaRegistry, Package, Relationships,
};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, trace};

const WORKBOOK_CONTENT_TYPES: &[&str] = &[
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml",
    "application/vnd.ms-excel.sheet.macroEnabled.main+xml",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.template.main+xml",
];
const DEFAULT_WORKBOOK_PART: &str = "xl/workbook.xml";
const DEFAULT_SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";

fn xml_error(err: quick_xml::Error) -> TemplateError {
    TemplateError::ParseError(err.to_string())
}

/// `(name, relationship id)` of every `<sheet>` in workbook order
fn workbook_sheets(xml: &str) -> Result<Vec<(String, String)>> {
    let mut reader = Reader::from_str(xml);
    let mut sheets = Vec::new();

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                let mut name = None;
                let mut rid = None;
                for attr in e.attributes().filter_map(std::result::Result::ok) {
                    let value = attr.unescape_value().map_err(xml_error)?.into_owned();
                    match attr.key.local_name().as_ref() {
                        b"name" => name = Some(value),
                        b"id" if attr.key.prefix().is_some() => rid = Some(value),
                        _ => {}
                    }
                }
                if let (Some(name), Some(rid)) = (name, rid) {
                    sheets.push((name, rid));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(sheets)
}

/// Plain text of every `<si>` entry; phonetic runs are skipped
fn shared_strings(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut in_phonetic = false;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"t" => in_text = !in_phonetic,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => strings.push(std::mem::take(&mut current)),
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(e) if in_text => current.push_str(&e.unescape().map_err(xml_error)?),
            Event::CData(e) if in_text => current.push_str(&String::from_utf8_lossy(&e)),
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(strings)
}

/// Cell text with container markers removed and qualified fields unqualified
///
/// `${rows}` disappears and `${t:rows->qty:arg}` becomes `${qty:arg}`.
fn unqualify(text: &str, container: &str) -> String {
    rewrite(text, |placeholder| match membership(placeholder, NodeKind::Row, container) {
        Membership::Anchor => Some(String::new()),
        Membership::Field { field, args } => Some(token(field, args)),
        Membership::Unrelated => None,
    })
    .into_owned()
}

/// A loaded spreadsheet template
#[derive(Debug)]
pub struct XlsxTemplate {
    package: Package,
    content_types: ContentTypes,
    /// Worksheets in workbook order
    sheets: Vec<Worksheet>,
    media: MediaRegistry,
    index: VariableIndex<usize, CellRef>,
}

impl XlsxTemplate {
    /// Open a template file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_package(Package::open(path)?)
    }

    /// Load a template from package bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_package(Package::from_bytes(data)?)
    }

    /// Load a template from an opened package
    pub fn from_package(package: Package) -> Result<Self> {
        let content_types = match package.read_xml_opt(ContentTypes::PART_NAME)? {
            Some(xml) => ContentTypes::parse(&xml),
            None => ContentTypes::default(),
        };

        let workbook = WORKBOOK_CONTENT_TYPES
            .iter()
            .flat_map(|ct| content_types.parts_with_type(ct))
            .next()
            .unwrap_or_else(|| DEFAULT_WORKBOOK_PART.to_string());
        let workbook_xml = package.read_xml_opt(&workbook)?.ok_or_else(|| {
            TemplateError::Malformed(format!("spreadsheet package has no workbook part ({workbook})"))
        })?;
        let relationships = match package.read_xml_opt(&rels_path_for(&workbook))? {
            Some(xml) => Relationships::parse(&xml),
            None => Relationships::default(),
        };

        let shared_part = relationships
            .by_type(rel_types::SHARED_STRINGS)
            .first()
            .map(|rel| resolve_target(&workbook, &rel.target))
            .unwrap_or_else(|| DEFAULT_SHARED_STRINGS_PART.to_string());
        let shared = match package.read_xml_opt(&shared_part)? {
            Some(xml) => shared_strings(&xml)?,
            None => Vec::new(),
        };

        let mut sheets = Vec::new();
        for (name, rid) in workbook_sheets(&workbook_xml)? {
            let target = relationships.target(&rid).ok_or_else(|| {
                TemplateError::Malformed(format!("sheet {name} refers to unknown relationship {rid}"))
            })?;
            let part = resolve_target(&workbook, &target);
            let xml = package.read_xml(&part)?;
            sheets.push(Worksheet::parse(&name, &part, &xml, &shared)?);
        }

        let mut template = Self {
            package,
            content_types,
            sheets,
            media: MediaRegistry::new(),
            index: VariableIndex::new(),
        };
        template.rebuild_index();
        debug!(sheets = template.sheets.len(), names = template.index.len(), "loaded spreadsheet template");
        Ok(template)
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for (i, sheet) in self.sheets.iter().enumerate() {
            for (at, cell) in sheet.cells() {
                if let Some(text) = cell.text() {
                    for placeholder in scan(text) {
                        self.index.insert(placeholder.name, i, at);
                    }
                }
            }
        }
    }

    /// Worksheets in workbook order
    pub fn sheets(&self) -> &[Worksheet] {
        &self.sheets
    }

    /// Worksheet by its workbook name
    pub fn sheet(&self, name: &str) -> Option<&Worksheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// Cells holding `name`, as `(sheet index, cell)`
    pub fn locations(&self, name: &str) -> &[(usize, CellRef)] {
        self.index.lookup(name)
    }

    /// Distinct placeholder names across all sheets
    pub fn variables(&mut self) -> Variables {
        self.rebuild_index();
        Variables::Flat(self.index.names().map(str::to_string).collect())
    }

    /// Distinct placeholder names grouped by sheet name
    pub fn variables_by_sheet(&mut self) -> Variables {
        self.rebuild_index();
        Variables::Grouped(
            self.index
                .names_by_part()
                .into_iter()
                .map(|(sheet, names)| PartVariables {
                    part: self.sheets[sheet].name.clone(),
                    names,
                })
                .collect(),
        )
    }

    /// Fill the template with a data tree
    pub fn process(&mut self, data: &Value, options: &ProcessOptions) -> Result<()> {
        for (key, value) in sorted_nodes(data_object(data)?) {
            self.process_node(&key, value, None, options)?;
        }
        self.rebuild_index();
        Ok(())
    }

    /// Apply one data node, optionally restricted to one row of one sheet
    fn process_node(
        &mut self,
        key: &NodeKey,
        value: &Value,
        scope: Option<(usize, u32)>,
        options: &ProcessOptions,
    ) -> Result<()> {
        match key.kind {
            NodeKind::SheetScope => {
                debug!(key = %key, "sheet scope is reserved");
                Ok(())
            }
            NodeKind::Block => {
                debug!(key = %key, "paragraph blocks have no meaning in a workbook");
                Ok(())
            }
            NodeKind::Row if scope.is_some() => {
                debug!(key = %key, "nested row containers are not expanded");
                Ok(())
            }
            NodeKind::Row => self.expand_rows(&key.name, value, options),
            NodeKind::Image => self.set_image(&key.name, value, scope, options),
            NodeKind::Scalar => {
                self.set_value(&key.name, &value_to_string(value), scope);
                Ok(())
            }
        }
    }

    fn scoped_locations(&self, name: &str, scope: Option<(usize, u32)>) -> Vec<(usize, CellRef)> {
        self.index
            .lookup(name)
            .iter()
            .filter(|(sheet, at)| scope.map_or(true, |(s, row)| *sheet == s && at.row == row))
            .copied()
            .collect()
    }

    fn set_value(&mut self, name: &str, value: &str, scope: Option<(usize, u32)>) {
        let locations = self.scoped_locations(name, scope);
        if locations.is_empty() {
            debug!(name, "no cell holds this placeholder");
            return;
        }

        for (sheet, at) in locations {
            let worksheet = &mut self.sheets[sheet];
            let Some(text) = worksheet.cell_text(at) else {
                continue;
            };
            let (out, count) = substitute(text, name, value, 0);
            if count > 0 {
                worksheet.set_cell_text(at, out);
                trace!(sheet = %worksheet.name, cell = %at, name, count, "substituted scalar");
            }
        }
    }

    fn set_image(
        &mut self,
        name: &str,
        value: &Value,
        scope: Option<(usize, u32)>,
        options: &ProcessOptions,
    ) -> Result<()> {
        let source = ImageSource::from_value(value)?;
        for (sheet, at) in self.scoped_locations(name, scope) {
            let worksheet = &mut self.sheets[sheet];
            let Some(text) = worksheet.cell_text(at).map(str::to_string) else {
                continue;
            };

            if let Some(source) = &source {
                for placeholder in scan(&text).filter(|p| p.name.eq_ignore_ascii_case(name)) {
                    let args = ImageArgs::parse(&placeholder.arg_list());
                    let spec = ImageSpec::resolve(source, &args, options)?;
                    debug!(sheet = %worksheet.name, cell = %at, width = %spec.width, height = %spec.height, "anchored picture");
                    worksheet.pictures.push(Picture {
                        anchor: at,
                        width: spec.width_emu(),
                        height: spec.height_emu(),
                        info: spec.info,
                    });
                }
            }

            let (out, _) = substitute(&text, name, "", 0);
            worksheet.set_cell_text(at, out);
        }
        Ok(())
    }

    /// Expand every row marked by `container`, bottom-up within each sheet
    fn expand_rows(&mut self, container: &str, value: &Value, options: &ProcessOptions) -> Result<()> {
        let items = iterations(value);

        for sheet in 0..self.sheets.len() {
            let mut anchors: Vec<u32> = self.sheets[sheet]
                .cells()
                .filter(|(_, cell)| {
                    cell.text().is_some_and(|text| {
                        scan(text)
                            .any(|p| membership(&p, NodeKind::Row, container).marks_container())
                    })
                })
                .map(|(at, _)| at.row)
                .collect();
            anchors.sort_unstable();
            anchors.dedup();

            if anchors.is_empty() {
                continue;
            }
            for row in anchors.into_iter().rev() {
                self.expand_row(sheet, row, container, &items, options)?;
            }
        }
        Ok(())
    }

    /// Replace one anchor row by a copy per iteration and fill each copy
    fn expand_row(
        &mut self,
        sheet: usize,
        row: u32,
        container: &str,
        items: &[Map<String, Value>],
        options: &ProcessOptions,
    ) -> Result<()> {
        let count = items.len() as u32;
        let worksheet = &mut self.sheets[sheet];
        worksheet.insert_copies(row, count);

        let rewrites: Vec<(CellRef, String)> = worksheet
            .cells()
            .filter(|(at, _)| at.row > row && at.row <= row + count)
            .filter_map(|(at, cell)| {
                let text = cell.text()?;
                let out = unqualify(text, container);
                (out != text).then_some((at, out))
            })
            .collect();
        for (at, text) in rewrites {
            worksheet.set_cell_text(at, text);
        }

        worksheet.remove_row(row);
        debug!(sheet = %worksheet.name, row, container, copies = count, "expanded row");
        self.rebuild_index();

        for (i, item) in items.iter().enumerate() {
            let scope = Some((sheet, row + i as u32));
            for (key, value) in sorted_nodes(item) {
                self.process_node(&key, value, scope, options)?;
            }
        }
        Ok(())
    }

    /// Serialize the filled package
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        for sheet in &mut self.sheets {
            drawing::materialize(sheet, &mut self.package, &mut self.content_types, &mut self.media)?;
            if sheet.is_dirty() {
                self.package.set_part(&sheet.part, sheet.to_xml());
            }
        }
        self.package
            .set_part(ContentTypes::PART_NAME, self.content_types.to_xml());

        Ok(self.package.to_bytes()?)
    }

    /// Write the filled package to a file
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}
