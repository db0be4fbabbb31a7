//! Worksheet cell model
//!
//! Only `<sheetData>` is modelled as rows and cells. Everything before it
//! (sheet properties, columns) and after it (merged cells, drawings, page
//! setup) is kept as text, so a sheet the engine never touches is written
//! back byte-identical.

use super::drawing::Picture;
use crate::{Result, TemplateError};
use opc_core::xml::{attr, escape_attr, escape_text, remove_attr, unescape};
use regex::{Captures, Regex};
use std::fmt;
use std::sync::OnceLock;

fn row_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<row\b([^>]*?)(?:/>|>(.*?)</row>)").expect("valid regex"))
}

fn cell_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<c\b([^>]*?)(?:/>|>(.*?)</c>)").expect("valid regex"))
}

fn value_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<v>(.*?)</v>").expect("valid regex"))
}

fn inline_text_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<t(?:\s[^>]*)?>(.*?)</t>").expect("valid regex"))
}

fn range_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(<(?:mergeCell|dimension)\b[^>]*?\bref=")([^"]*)("[^>]*>)"#).expect("valid regex")
    })
}

fn merge_count_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(<mergeCells\b[^>]*?\bcount=")\d+(")"#).expect("valid regex"))
}

fn cell_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\$?([A-Za-z]{1,3})\$?([0-9]+)$").expect("valid regex"))
}

/// Column letters for a 1-based column index (`1` → `A`, `27` → `AA`)
pub fn column_letters(mut col: u32) -> String {
    let mut letters = Vec::new();
    while col > 0 {
        let rem = ((col - 1) % 26) as u8;
        letters.push(b'A' + rem);
        col = (col - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// 1-based column index for column letters
pub fn column_index(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    letters.chars().try_fold(0u32, |acc, ch| {
        let ch = ch.to_ascii_uppercase();
        ch.is_ascii_uppercase()
            .then(|| acc * 26 + (ch as u32 - 'A' as u32 + 1))
    })
}

/// A cell coordinate (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    pub fn new(col: u32, row: u32) -> Self {
        Self { row, col }
    }

    /// Parse an `A1` style reference (`$` markers allowed)
    pub fn parse(reference: &str) -> Option<Self> {
        let caps = cell_ref_re().captures(reference.trim())?;
        let col = column_index(&caps[1])?;
        let row = caps[2].parse().ok().filter(|&r: &u32| r > 0)?;
        Some(Self { row, col })
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letters(self.col), self.row)
    }
}

/// Content of a cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellContent {
    /// String cell; `shared` is its shared-string index while unmodified
    Text { text: String, shared: Option<usize> },
    /// Any other value (numbers, booleans, formulas), kept verbatim
    Raw { kind: Option<String>, inner: String },
    /// No value
    Empty,
}

/// One `<c>` element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub col: u32,
    /// Attributes other than `r` and `t`
    attrs: String,
    pub content: CellContent,
}

impl Cell {
    fn parse(attrs: &str, inner: Option<&str>, col: u32, shared: &[String]) -> Self {
        let kind = attr(attrs, "t");
        let rest = remove_attr(&remove_attr(attrs, "r"), "t").trim().to_string();
        let inner = inner.unwrap_or("");

        let content = match kind.as_deref() {
            Some("s") => value_re()
                .captures(inner)
                .and_then(|caps| caps[1].trim().parse::<usize>().ok())
                .and_then(|idx| shared.get(idx).map(|text| (idx, text)))
                .map(|(idx, text)| CellContent::Text {
                    text: text.clone(),
                    shared: Some(idx),
                })
                .unwrap_or_else(|| CellContent::Raw {
                    kind: kind.clone(),
                    inner: inner.to_string(),
                }),
            Some("inlineStr") => {
                let text: String = inline_text_re()
                    .captures_iter(inner)
                    .map(|caps| {
                        unescape(&caps[1])
                            .map(|t| t.into_owned())
                            .unwrap_or_else(|_| caps[1].to_string())
                    })
                    .collect();
                CellContent::Text { text, shared: None }
            }
            _ if inner.trim().is_empty() => CellContent::Empty,
            _ => CellContent::Raw {
                kind: kind.clone(),
                inner: inner.to_string(),
            },
        };

        Self {
            col,
            attrs: rest,
            content,
        }
    }

    /// String value, if this is a string cell
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            CellContent::Text { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Replace the string value; returns whether anything changed
    fn set_text(&mut self, new_text: String) -> bool {
        match &self.content {
            CellContent::Text { text, .. } if *text == new_text => false,
            _ => {
                self.content = CellContent::Text {
                    text: new_text,
                    shared: None,
                };
                true
            }
        }
    }

    fn write(&self, row: u32, out: &mut String) {
        let reference = CellRef::new(self.col, row);
        out.push_str(&format!(r#"<c r="{reference}""#));
        if !self.attrs.is_empty() {
            out.push(' ');
            out.push_str(&self.attrs);
        }

        match &self.content {
            CellContent::Text {
                shared: Some(idx), ..
            } => out.push_str(&format!(r#" t="s"><v>{idx}</v></c>"#)),
            CellContent::Text { text, .. } if text.is_empty() => out.push_str("/>"),
            CellContent::Text { text, .. } => out.push_str(&format!(
                r#" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                escape_text(text)
            )),
            CellContent::Raw { kind, inner } => {
                if let Some(kind) = kind {
                    out.push_str(&format!(r#" t="{}""#, escape_attr(kind)));
                }
                out.push('>');
                out.push_str(inner);
                out.push_str("</c>");
            }
            CellContent::Empty => out.push_str("/>"),
        }
    }
}

/// One `<row>` element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub index: u32,
    /// Attributes other than `r`
    attrs: String,
    pub cells: Vec<Cell>,
}

impl Row {
    fn write(&self, out: &mut String) {
        out.push_str(&format!(r#"<row r="{}""#, self.index));
        if !self.attrs.is_empty() {
            out.push(' ');
            out.push_str(&self.attrs);
        }
        if self.cells.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for cell in &self.cells {
            cell.write(self.index, out);
        }
        out.push_str("</row>");
    }
}

/// A worksheet part
#[derive(Debug, Clone)]
pub struct Worksheet {
    /// Sheet name shown in the workbook
    pub name: String,
    /// Part name inside the package
    pub part: String,
    source: String,
    head: String,
    rows: Vec<Row>,
    tail: String,
    dirty: bool,
    /// Pictures waiting to be written into the sheet's drawing
    pub(super) pictures: Vec<Picture>,
}

impl Worksheet {
    /// Parse worksheet XML; `shared` are the workbook's shared strings
    pub fn parse(name: &str, part: &str, xml: &str, shared: &[String]) -> Result<Self> {
        let malformed = || TemplateError::Malformed(format!("worksheet {part} has no sheetData"));
        let start = xml.find("<sheetData").ok_or_else(malformed)?;
        let open_end = xml[start..].find('>').map(|i| start + i + 1).ok_or_else(malformed)?;

        let (body, tail_start) = if xml[start..open_end].ends_with("/>") {
            ("", open_end)
        } else {
            let close = xml[open_end..]
                .find("</sheetData>")
                .map(|i| open_end + i)
                .ok_or_else(malformed)?;
            (&xml[open_end..close], close + "</sheetData>".len())
        };

        let mut rows = Vec::new();
        let mut last_row = 0;
        for caps in row_re().captures_iter(body) {
            let attrs = &caps[1];
            let index = attr(attrs, "r")
                .and_then(|r| r.parse().ok())
                .unwrap_or(last_row + 1);
            last_row = index;

            let mut cells = Vec::new();
            let mut last_col = 0;
            if let Some(inner) = caps.get(2) {
                for cell in cell_re().captures_iter(inner.as_str()) {
                    let col = attr(&cell[1], "r")
                        .and_then(|r| CellRef::parse(&r))
                        .map(|r| r.col)
                        .unwrap_or(last_col + 1);
                    last_col = col;
                    cells.push(Cell::parse(&cell[1], cell.get(2).map(|m| m.as_str()), col, shared));
                }
            }

            rows.push(Row {
                index,
                attrs: remove_attr(attrs, "r").trim().to_string(),
                cells,
            });
        }

        Ok(Self {
            name: name.to_string(),
            part: part.to_string(),
            source: xml.to_string(),
            head: xml[..start].to_string(),
            rows,
            tail: xml[tail_start..].to_string(),
            dirty: false,
            pictures: Vec::new(),
        })
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Whether the sheet differs from what was loaded
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Every cell with its coordinate, in document order
    pub fn cells(&self) -> impl Iterator<Item = (CellRef, &Cell)> {
        self.rows
            .iter()
            .flat_map(|row| row.cells.iter().map(move |c| (CellRef::new(c.col, row.index), c)))
    }

    pub fn cell(&self, at: CellRef) -> Option<&Cell> {
        self.rows
            .iter()
            .find(|r| r.index == at.row)?
            .cells
            .iter()
            .find(|c| c.col == at.col)
    }

    /// String value of a cell
    pub fn cell_text(&self, at: CellRef) -> Option<&str> {
        self.cell(at)?.text()
    }

    /// Overwrite a cell's string value (the cell must exist)
    pub fn set_cell_text(&mut self, at: CellRef, text: String) -> bool {
        let Some(cell) = self
            .rows
            .iter_mut()
            .find(|r| r.index == at.row)
            .and_then(|r| r.cells.iter_mut().find(|c| c.col == at.col))
        else {
            return false;
        };
        let changed = cell.set_text(text);
        self.dirty |= changed;
        changed
    }

    /// Insert `count` copies of row `at` immediately below it
    ///
    /// Rows, merged ranges and picture anchors below `at` move down.
    pub fn insert_copies(&mut self, at: u32, count: u32) {
        if count == 0 {
            return;
        }
        self.shift_rows(at, count as i64);
        self.stretch_dimension(at, count as i64);

        let Some(pos) = self.rows.iter().position(|r| r.index == at) else {
            self.dirty = true;
            return;
        };
        let template = self.rows[pos].clone();
        let copies = (1..=count).map(|k| Row {
            index: at + k,
            ..template.clone()
        });
        self.rows.splice(pos + 1..pos + 1, copies);

        let merges: Vec<String> = range_ref_re()
            .captures_iter(&self.tail)
            .filter(|caps| caps[1].starts_with("<mergeCell"))
            .filter_map(|caps| single_row_range(&caps[2], at))
            .collect();
        for (k, range) in (1..=count).flat_map(|k| merges.iter().map(move |m| (k, m))) {
            let copy = shift_range(range, at.saturating_sub(1), k as i64).unwrap_or_default();
            let entry = format!(r#"<mergeCell ref="{copy}"/>"#);
            if let Some(tail) = opc_core::xml::insert_before_closing(&self.tail, "</mergeCells>", &entry) {
                self.tail = tail;
            }
        }
        self.update_merge_count();
        self.dirty = true;
    }

    /// Delete row `at`; everything below moves up
    pub fn remove_row(&mut self, at: u32) {
        self.rows.retain(|r| r.index != at);
        self.pictures.retain(|p| p.anchor.row != at);

        // ranges living only on the deleted row disappear
        self.tail = range_ref_re()
            .replace_all(&self.tail, |caps: &Captures<'_>| {
                if caps[1].starts_with("<mergeCell") && single_row_range(&caps[2], at).is_some() {
                    String::new()
                } else {
                    caps[0].to_string()
                }
            })
            .into_owned();
        self.stretch_dimension(at, -1);
        self.shift_rows(at, -1);
        self.update_merge_count();
        self.dirty = true;
    }

    /// Move every row below `at` by `delta`
    fn shift_rows(&mut self, at: u32, delta: i64) {
        for row in self.rows.iter_mut().filter(|r| r.index > at) {
            row.index = (row.index as i64 + delta).max(1) as u32;
        }
        for picture in self.pictures.iter_mut().filter(|p| p.anchor.row > at) {
            picture.anchor.row = (picture.anchor.row as i64 + delta).max(1) as u32;
        }

        let shift = |caps: &Captures<'_>| match shift_range(&caps[2], at, delta) {
            Some(range) => format!("{}{}{}", &caps[1], range, &caps[3]),
            None => caps[0].to_string(),
        };
        self.head = range_ref_re().replace_all(&self.head, shift).into_owned();
        self.tail = range_ref_re().replace_all(&self.tail, shift).into_owned();
    }

    /// Move the end of `<dimension ref>` by `delta` when it lies on row `at`
    fn stretch_dimension(&mut self, at: u32, delta: i64) {
        self.head = range_ref_re()
            .replace_all(&self.head, |caps: &Captures<'_>| {
                match stretch_range(&caps[2], at, delta).filter(|_| caps[1].starts_with("<dimension")) {
                    Some(range) => format!("{}{}{}", &caps[1], range, &caps[3]),
                    None => caps[0].to_string(),
                }
            })
            .into_owned();
    }

    fn update_merge_count(&mut self) {
        let count = self.tail.matches("<mergeCell ").count();
        self.tail = merge_count_re()
            .replace(&self.tail, |caps: &Captures<'_>| format!("{}{}{}", &caps[1], count, &caps[2]))
            .into_owned();
    }

    /// Insert markup into the text after `<sheetData>`, before the first of `before`
    /// (or before the closing root tag)
    pub(super) fn insert_after_data(&mut self, fragment: &str, before: &[&str]) {
        let pos = before
            .iter()
            .filter_map(|tag| self.tail.find(tag))
            .min()
            .or_else(|| self.tail.rfind("</worksheet>"));
        match pos {
            Some(pos) => self.tail.insert_str(pos, fragment),
            None => self.tail.push_str(fragment),
        }
        self.dirty = true;
    }

    /// Attribute value of the first `<tag ...>` after the cell data
    pub(super) fn tail_attr(&self, tag: &str, name: &str) -> Option<String> {
        let start = self.tail.find(&format!("<{tag} "))?;
        let end = self.tail[start..].find('>')? + start;
        attr(&self.tail[start + tag.len() + 1..end], name)
    }

    /// Current worksheet XML
    pub fn to_xml(&self) -> String {
        if !self.dirty {
            return self.source.clone();
        }
        let mut out = String::with_capacity(self.source.len());
        out.push_str(&self.head);
        out.push_str("<sheetData>");
        for row in &self.rows {
            row.write(&mut out);
        }
        out.push_str("</sheetData>");
        out.push_str(&self.tail);
        out
    }
}

/// `range` if it spans row `row` only
fn single_row_range(range: &str, row: u32) -> Option<String> {
    let (a, b) = range.split_once(':').unwrap_or((range, range));
    let (a, b) = (CellRef::parse(a)?, CellRef::parse(b)?);
    (a.row == row && b.row == row).then(|| range.to_string())
}

/// Shift the rows of a cell or range reference below `at` by `delta`
fn shift_range(range: &str, at: u32, delta: i64) -> Option<String> {
    let shift = |cell: &str| -> Option<String> {
        let mut r = CellRef::parse(cell)?;
        if r.row > at {
            r.row = (r.row as i64 + delta).max(1) as u32;
        }
        Some(r.to_string())
    };
    match range.split_once(':') {
        Some((a, b)) => Some(format!("{}:{}", shift(a)?, shift(b)?)),
        None => shift(range),
    }
}

/// `range` with its end cell moved by `delta` when that cell is on row `at`
///
/// The end never moves above the start.
fn stretch_range(range: &str, at: u32, delta: i64) -> Option<String> {
    let (a, b) = range.split_once(':').unwrap_or((range, range));
    let (start, mut end) = (CellRef::parse(a)?, CellRef::parse(b)?);
    if end.row != at {
        return None;
    }
    end.row = (end.row as i64 + delta).max(start.row as i64) as u32;
    Some(format!("{start}:{end}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use opc_core::{ImageFormat, ImageInfo};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use std::time::{Duration, Instant};

    fn sheet(data: &str, tail: &str) -> Worksheet {
        let xml = format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
                r#"<dimension ref="A1:B3"/><sheetData>{}</sheetData>{}</worksheet>"#
            ),
            data, tail
        );
        Worksheet::parse("Sheet1", "xl/worksheets/sheet1.xml", &xml, &["shared ${a}".to_string()])
            .unwrap()
    }

    fn texts(sheet: &Worksheet) -> Vec<(String, String)> {
        sheet
            .cells()
            .filter_map(|(at, c)| Some((at.to_string(), c.text()?.to_string())))
            .collect()
    }

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letters(1), "A");
        assert_eq!(column_letters(26), "Z");
        assert_eq!(column_letters(27), "AA");
        assert_eq!(column_letters(703), "AAA");
        assert_eq!(column_index("AB"), Some(28));
        assert_eq!(column_index("a"), Some(1));
        assert_eq!(column_index("A1"), None);
    }

    #[test]
    fn test_cell_ref() {
        let r = CellRef::parse("$C$12").unwrap();
        assert_eq!(r, CellRef::new(3, 12));
        assert_eq!(r.to_string(), "C12");
        assert_eq!(CellRef::parse("A0"), None);
        assert_eq!(CellRef::parse("12"), None);
    }

    #[test]
    fn test_parse_cells() {
        let ws = sheet(
            concat!(
                r#"<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="inlineStr"><is><t>x &amp; ${b}</t></is></c></row>"#,
                r#"<row r="2" ht="20"><c r="A2" s="3"><v>42</v></c><c r="B2" s="1"/></row>"#
            ),
            "",
        );
        assert_eq!(
            texts(&ws),
            vec![
                ("A1".to_string(), "shared ${a}".to_string()),
                ("B1".to_string(), "x & ${b}".to_string()),
            ]
        );
        assert_eq!(
            ws.cell(CellRef::new(1, 2)).unwrap().content,
            CellContent::Raw {
                kind: None,
                inner: "<v>42</v>".to_string()
            }
        );
        assert_eq!(ws.cell(CellRef::new(2, 2)).unwrap().content, CellContent::Empty);
    }

    #[test]
    fn test_untouched_sheet_is_identical() {
        let xml = r#"<worksheet><sheetData><row r="1"><c r="A1" t="s"><v>0</v></c></row></sheetData></worksheet>"#;
        let ws = Worksheet::parse("S", "p", xml, &["a".to_string()]).unwrap();
        assert!(!ws.is_dirty());
        assert_eq!(ws.to_xml(), xml);
    }

    #[test]
    fn test_empty_sheet_data() {
        let ws = Worksheet::parse("S", "p", "<worksheet><sheetData/></worksheet>", &[]).unwrap();
        assert!(ws.rows().is_empty());
        assert!(Worksheet::parse("S", "p", "<worksheet/>", &[]).is_err());
    }

    #[test]
    fn test_set_text_writes_inline_string() {
        let mut ws = sheet(r#"<row r="1"><c r="A1" s="2" t="s"><v>0</v></c><c r="B1"><v>1</v></c></row>"#, "");
        assert!(ws.set_cell_text(CellRef::new(1, 1), "a < b".to_string()));
        assert!(!ws.set_cell_text(CellRef::new(5, 5), "missing".to_string()));

        let xml = ws.to_xml();
        assert!(xml.contains(
            r#"<row r="1"><c r="A1" s="2" t="inlineStr"><is><t xml:space="preserve">a &lt; b</t></is></c><c r="B1"><v>1</v></c></row>"#
        ), "{xml}");
    }

    #[test]
    fn test_insert_copies_and_remove() {
        let mut ws = sheet(
            concat!(
                r#"<row r="1"><c r="A1" t="inlineStr"><is><t>head</t></is></c></row>"#,
                r#"<row r="2"><c r="A2" t="inlineStr"><is><t>${x}</t></is></c></row>"#,
                r#"<row r="3"><c r="A3" t="inlineStr"><is><t>foot</t></is></c></row>"#
            ),
            r#"<mergeCells count="2"><mergeCell ref="A2:B2"/><mergeCell ref="A3:B3"/></mergeCells>"#,
        );

        ws.insert_copies(2, 2);
        ws.remove_row(2);

        assert_eq!(
            texts(&ws),
            vec![
                ("A1".to_string(), "head".to_string()),
                ("A2".to_string(), "${x}".to_string()),
                ("A3".to_string(), "${x}".to_string()),
                ("A4".to_string(), "foot".to_string()),
            ]
        );
        let xml = ws.to_xml();
        assert!(xml.contains(
            r#"<mergeCells count="3"><mergeCell ref="A4:B4"/><mergeCell ref="A2:B2"/><mergeCell ref="A3:B3"/></mergeCells>"#
        ), "{xml}");
        assert!(xml.contains(r#"<dimension ref="A1:B4"/>"#), "{xml}");
    }

    #[test]
    fn test_zero_copies_then_remove_shifts_up() {
        let mut ws = sheet(
            concat!(
                r#"<row r="1"><c r="A1" t="inlineStr"><is><t>${x}</t></is></c></row>"#,
                r#"<row r="2"><c r="A2" t="inlineStr"><is><t>below</t></is></c></row>"#
            ),
            "",
        );
        ws.insert_copies(1, 0);
        ws.remove_row(1);
        assert_eq!(texts(&ws), vec![("A1".to_string(), "below".to_string())]);
    }

    #[test]
    fn test_dimension_grows_when_anchor_is_last_row() {
        let xml = concat!(
            r#"<worksheet><dimension ref="A1:B2"/><sheetData>"#,
            r#"<row r="1"><c r="A1" t="inlineStr"><is><t>head</t></is></c></row>"#,
            r#"<row r="2"><c r="A2" t="inlineStr"><is><t>${x}</t></is></c></row>"#,
            r#"</sheetData></worksheet>"#
        );
        let mut ws = Worksheet::parse("S", "p", xml, &[]).unwrap();
        ws.insert_copies(2, 3);
        ws.remove_row(2);

        assert_eq!(ws.rows().last().map(|r| r.index), Some(4));
        assert!(ws.to_xml().contains(r#"<dimension ref="A1:B4"/>"#));
    }

    #[test]
    fn test_dimension_shrinks_when_last_row_is_removed() {
        let xml = concat!(
            r#"<worksheet><dimension ref="A1:B2"/><sheetData>"#,
            r#"<row r="1"><c r="A1" t="inlineStr"><is><t>head</t></is></c></row>"#,
            r#"<row r="2"><c r="A2" t="inlineStr"><is><t>${x}</t></is></c></row>"#,
            r#"</sheetData></worksheet>"#
        );
        let mut ws = Worksheet::parse("S", "p", xml, &[]).unwrap();
        ws.insert_copies(2, 0);
        ws.remove_row(2);
        assert!(ws.to_xml().contains(r#"<dimension ref="A1:B1"/>"#));
    }

    #[test]
    fn test_remove_row_drops_its_pictures() {
        let mut ws = sheet(
            concat!(
                r#"<row r="1"><c r="A1"><v>1</v></c></row>"#,
                r#"<row r="2"><c r="A2"><v>2</v></c></row>"#,
                r#"<row r="3"><c r="A3"><v>3</v></c></row>"#
            ),
            "",
        );
        let picture = |row| Picture {
            anchor: CellRef::new(1, row),
            info: ImageInfo {
                path: PathBuf::from("a.png"),
                width: 1,
                height: 1,
                format: ImageFormat::Png,
            },
            width: 9_525,
            height: 9_525,
        };
        ws.pictures = vec![picture(1), picture(2), picture(3)];

        ws.insert_copies(1, 1);
        assert_eq!(
            ws.pictures.iter().map(|p| p.anchor.row).collect::<Vec<_>>(),
            vec![1, 3, 4]
        );

        ws.remove_row(3);
        assert_eq!(
            ws.pictures.iter().map(|p| p.anchor.row).collect::<Vec<_>>(),
            vec![1, 3]
        );
    }

    #[test]
    fn test_parse_large_sheet() {
        let mut data = String::new();
        for r in 1..=2000 {
            data.push_str(&format!(r#"<row r="{r}" spans="1:10">"#));
            for c in 1..=10 {
                data.push_str(&format!(r#"<c r="{}{r}" s="1"><v>{}</v></c>"#, column_letters(c), r * c));
            }
            data.push_str("</row>");
        }
        let xml = format!("<worksheet><sheetData>{data}</sheetData></worksheet>");

        let started = Instant::now();
        let ws = Worksheet::parse("Big", "p", &xml, &[]).unwrap();
        let elapsed = started.elapsed();

        assert_eq!(ws.rows().len(), 2000);
        assert_eq!(ws.rows().iter().map(|r| r.cells.len()).sum::<usize>(), 20_000);
        let last = ws.cells().last().map(|(at, _)| at.to_string());
        assert_eq!(last.as_deref(), Some("J2000"));
        assert!(elapsed < Duration::from_secs(10), "parsing took {elapsed:?}");
    }

    #[test]
    fn test_stretch_range() {
        assert_eq!(stretch_range("A1:C2", 2, 3), Some("A1:C5".to_string()));
        assert_eq!(stretch_range("A1:C3", 2, 3), None);
        assert_eq!(stretch_range("A2:C2", 2, -1), Some("A2:C2".to_string()));
    }

    #[test]
    fn test_shift_range() {
        assert_eq!(shift_range("A3:C5", 2, 2), Some("A5:C7".to_string()));
        assert_eq!(shift_range("A1:C5", 2, 2), Some("A1:C7".to_string()));
        assert_eq!(shift_range("B4", 3, -1), Some("B3".to_string()));
        assert_eq!(shift_range("bogus", 1, 1), None);
    }
}
