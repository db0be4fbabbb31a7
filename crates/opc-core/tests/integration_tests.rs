//! Integration tests for opc-core
//!
//! These tests wire parts, relationships, content types and media together
//! the way a document writer does and read the saved package back.

use opc_core::{
    content_type, rel_types, rels_path_for, ContentTypes, ImageFormat, ImageInfo, MediaRegistry,
    OpcError, Package, Relationships,
};
use pretty_assertions::assert_eq;

fn minimal_package() -> Package {
    let mut package = Package::new();
    package.set_part("word/document.xml", "<w:document/>");
    package.set_part(ContentTypes::PART_NAME, ContentTypes::default().to_xml());
    package
}

#[test]
fn test_save_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.docx");

    let package = minimal_package();
    package.save(&path).unwrap();

    let reopened = Package::open(&path).unwrap();
    // content types always come first on disk
    assert_eq!(
        reopened.part_names().collect::<Vec<_>>(),
        vec![ContentTypes::PART_NAME, "word/document.xml"]
    );
    assert_eq!(reopened.read_xml("word/document.xml").unwrap(), "<w:document/>");
}

#[test]
fn test_open_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = Package::open(dir.path().join("nope.docx")).unwrap_err();
    assert!(matches!(err, OpcError::OpenError(_)));
}

#[test]
fn test_embed_image_once() {
    let dir = tempfile::tempdir().unwrap();
    let logo = dir.path().join("logo.png");
    image::RgbImage::new(4, 2).save(&logo).unwrap();

    let info = ImageInfo::probe(&logo).unwrap();
    assert_eq!((info.width, info.height, info.format), (4, 2, ImageFormat::Png));

    let mut package = minimal_package();
    let mut types = ContentTypes::parse(&package.read_xml(ContentTypes::PART_NAME).unwrap());
    let mut rels = Relationships::default();
    let mut media = MediaRegistry::new();

    for _ in 0..2 {
        let part = media
            .store(&mut package, &mut types, &info, |i| {
                format!("word/media/logo.{}", i.format.extension())
            })
            .unwrap();
        rels.add(rel_types::IMAGE, part.trim_start_matches("word/"));
    }
    let rels_part = rels_path_for("word/document.xml");
    types.add_override(&rels_part, content_type::RELATIONSHIPS);
    package.set_part(&rels_part, rels.to_xml());
    package.set_part(ContentTypes::PART_NAME, types.to_xml());

    let reopened = Package::from_bytes(&package.to_bytes().unwrap()).unwrap();
    assert_eq!(media.len(), 1);
    assert!(reopened.has_part("word/media/logo.png"));

    let rels = Relationships::parse(&reopened.read_xml(&rels_part).unwrap());
    let ids: Vec<String> = rels.entries().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec!["rId1", "rId2"]);
    assert_eq!(rels.target("rId2").as_deref(), Some("media/logo.png"));

    let types = ContentTypes::parse(&reopened.read_xml(ContentTypes::PART_NAME).unwrap());
    assert_eq!(types.default_for("png").as_deref(), Some("image/png"));
    assert_eq!(
        types.override_for("word/_rels/document.xml.rels").as_deref(),
        Some(content_type::RELATIONSHIPS)
    );
}

#[test]
fn test_unsupported_image() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, b"definitely not an image").unwrap();

    let err = ImageInfo::probe(&path).unwrap_err();
    assert!(matches!(err, OpcError::UnsupportedImage(_)));
}
