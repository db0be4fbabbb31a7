//! Worksheet drawings
//!
//! Pictures placed by the engine are held on their worksheet until save and
//! then written into the sheet's drawing part, creating the part when the
//! sheet has none.

use super::sheet::{CellRef, Worksheet};
use crate::{Result, TemplateError};
use opc_core::xml::insert_before_closing;
use opc_core::{
    content_type, rel_types, rels_path_for, resolve_target, ContentTypes, ImageInfo, MediaRegistry,
    Package, Relationships,
};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

const RELATIONSHIP_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const DRAWING_SKELETON: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<xdr:wsDr xmlns:xdr="http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing" "#,
    r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
    "</xdr:wsDr>"
);

/// Worksheet elements that must follow `<drawing>`
const AFTER_DRAWING: &[&str] = &[
    "<legacyDrawing ",
    "<legacyDrawingHF ",
    "<drawingHF ",
    "<picture ",
    "<oleObjects",
    "<controls",
    "<webPublishItems",
    "<tableParts",
    "<extLst",
];

fn shape_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"cNvPr\b[^>]*?\bid="(\d+)""#).expect("valid regex"))
}

/// A picture anchored at a cell
#[derive(Debug, Clone, PartialEq)]
pub struct Picture {
    /// Top-left cell
    pub anchor: CellRef,
    pub info: ImageInfo,
    /// Width in EMUs
    pub width: i64,
    /// Height in EMUs
    pub height: i64,
}

impl Picture {
    /// `xdr:oneCellAnchor` element for this picture
    fn anchor_xml(&self, shape_id: u32, rid: &str) -> String {
        let mut xml = String::with_capacity(900);
        xml.push_str("<xdr:oneCellAnchor>");
        xml.push_str("<xdr:from>");
        xml.push_str(&format!("<xdr:col>{}</xdr:col><xdr:colOff>0</xdr:colOff>", self.anchor.col - 1));
        xml.push_str(&format!("<xdr:row>{}</xdr:row><xdr:rowOff>0</xdr:rowOff>", self.anchor.row - 1));
        xml.push_str("</xdr:from>");
        xml.push_str(&format!(r#"<xdr:ext cx="{}" cy="{}"/>"#, self.width, self.height));
        xml.push_str("<xdr:pic>");
        xml.push_str("<xdr:nvPicPr>");
        xml.push_str(&format!(r#"<xdr:cNvPr id="{shape_id}" name="Picture {shape_id}"/>"#));
        xml.push_str(r#"<xdr:cNvPicPr><a:picLocks noChangeAspect="1"/></xdr:cNvPicPr>"#);
        xml.push_str("</xdr:nvPicPr>");
        xml.push_str("<xdr:blipFill>");
        xml.push_str(&format!(r#"<a:blip xmlns:r="{RELATIONSHIP_NS}" r:embed="{rid}"/>"#));
        xml.push_str("<a:stretch><a:fillRect/></a:stretch>");
        xml.push_str("</xdr:blipFill>");
        xml.push_str("<xdr:spPr>");
        xml.push_str(&format!(
            r#"<a:xfrm><a:off x="0" y="0"/><a:ext cx="{}" cy="{}"/></a:xfrm>"#,
            self.width, self.height
        ));
        xml.push_str(r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom>"#);
        xml.push_str("</xdr:spPr>");
        xml.push_str("</xdr:pic>");
        xml.push_str("<xdr:clientData/>");
        xml.push_str("</xdr:oneCellAnchor>");
        xml
    }
}

/// First `{prefix}{n}{suffix}` part name not yet in the package
fn free_part_name(package: &Package, prefix: &str, suffix: &str) -> String {
    (1..)
        .map(|n| format!("{prefix}{n}{suffix}"))
        .find(|name| !package.has_part(name))
        .unwrap_or_else(|| format!("{prefix}0{suffix}"))
}

/// Relative target from the directory of `from` to `to` (both under `xl/`)
fn relative_to(from: &str, to: &str) -> String {
    let from_dir: Vec<&str> = from.split('/').collect();
    let to_parts: Vec<&str> = to.split('/').collect();
    let from_dir = &from_dir[..from_dir.len().saturating_sub(1)];

    let common = from_dir
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let mut segments: Vec<&str> = vec![".."; from_dir.len() - common];
    segments.extend(&to_parts[common..]);
    segments.join("/")
}

fn load_relationships(
    package: &Package,
    content_types: &mut ContentTypes,
    part: &str,
) -> Result<Relationships> {
    let path = rels_path_for(part);
    Ok(match package.read_xml_opt(&path)? {
        Some(xml) => Relationships::parse(&xml),
        None => {
            content_types.add_override(&path, content_type::RELATIONSHIPS);
            Relationships::default()
        }
    })
}

/// Write a sheet's pending pictures into its drawing part
pub(super) fn materialize(
    sheet: &mut Worksheet,
    package: &mut Package,
    content_types: &mut ContentTypes,
    media: &mut MediaRegistry,
) -> Result<()> {
    if sheet.pictures.is_empty() {
        return Ok(());
    }

    let mut sheet_rels = load_relationships(package, content_types, &sheet.part)?;
    let existing = sheet
        .tail_attr("drawing", "r:id")
        .and_then(|rid| sheet_rels.target(&rid))
        .map(|target| resolve_target(&sheet.part, &target));

    let (drawing_part, mut drawing_xml) = match existing {
        Some(part) => {
            let xml = package.read_xml(&part)?;
            (part, xml)
        }
        None => {
            let part = free_part_name(package, "xl/drawings/drawing", ".xml");
            content_types.add_override(&part, content_type::DRAWING);
            let rid = sheet_rels.add(rel_types::DRAWING, &relative_to(&sheet.part, &part));
            sheet.insert_after_data(
                &format!(r#"<drawing xmlns:r="{RELATIONSHIP_NS}" r:id="{rid}"/>"#),
                AFTER_DRAWING,
            );
            package.set_part(&rels_path_for(&sheet.part), sheet_rels.to_xml());
            (part, DRAWING_SKELETON.to_string())
        }
    };

    let mut drawing_rels = load_relationships(package, content_types, &drawing_part)?;
    let mut shape_id = shape_id_re()
        .captures_iter(&drawing_xml)
        .filter_map(|caps| caps[1].parse::<u32>().ok())
        .max()
        .unwrap_or(0);

    for picture in sheet.pictures.drain(..) {
        let extension = format!(".{}", picture.info.format.extension());
        let candidate = free_part_name(package, "xl/media/image", &extension);
        let media_part = media.store(package, content_types, &picture.info, |_| candidate)?;
        let rid = drawing_rels.add(rel_types::IMAGE, &relative_to(&drawing_part, &media_part));
        shape_id += 1;

        drawing_xml = insert_before_closing(&drawing_xml, "</xdr:wsDr>", &picture.anchor_xml(shape_id, &rid))
            .ok_or_else(|| {
                TemplateError::Malformed(format!("drawing {drawing_part} has no xdr:wsDr root"))
            })?;
        debug!(sheet = %sheet.name, cell = %picture.anchor, media = %media_part, "placed picture");
    }

    package.set_part(&drawing_part, drawing_xml);
    package.set_part(&rels_path_for(&drawing_part), drawing_rels.to_xml());
    Ok(())
}
