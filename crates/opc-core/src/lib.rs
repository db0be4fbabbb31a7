//! OPC Core - Low-level OOXML package manipulation
//!
//! This crate provides functionality for:
//! - Opening and saving zipped OOXML packages (`.docx`, `.xlsx`)
//! - Keeping `[Content_Types].xml` and `*.rels` registries consistent
//! - Probing image assets for their intrinsic size and MIME type
//! - Storing embedded media once per source asset
//!
//! # Example
//!
//! ```ignore
//! use opc_core::{ContentTypes, Package, Relationships};
//!
//! let mut package = Package::open("template.docx")?;
//! let mut types = ContentTypes::parse(&package.read_xml(ContentTypes::PART_NAME)?);
//! types.add_default("png", "image/png");
//! package.set_part(ContentTypes::PART_NAME, types.to_xml());
//! package.save("output.docx")?;
//! ```

mod content_types;
mod media;
mod package;
mod part;
mod probe;
mod relationships;
pub mod xml;

pub use content_types::ContentTypes;
pub use probe::{detect_format, ImageFormat, ImageInfo};
pub use media::MediaRegistry;
pub use package::Package;
pub use part::{DocumentPart, XmlPart};
pub use relationships::{rels_path_for, resolve_target, Relationship, Relationships};

use thiserror::Error;

/// Errors that can occur during package operations
#[derive(Debug, Error)]
pub enum OpcError {
    #[error("Failed to open package: {0}")]
    OpenError(String),

    #[error("Failed to save package: {0}")]
    SaveError(String),

    #[error("Part not found: {0}")]
    PartNotFound(String),

    #[error("Invalid XML in {part}: {message}")]
    InvalidXml { part: String, message: String },

    #[error("Image error: {0}")]
    ImageError(String),

    #[error("Unsupported image type: {0}")]
    UnsupportedImage(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Zip error: {0}")]
    ZipError(#[from] zip::result::ZipError),
}

/// Result type for package operations
pub type Result<T> = std::result::Result<T, OpcError>;

/// Relationship type URIs used when wiring new parts into a package
pub mod rel_types {
    /// Image relationship
    pub const IMAGE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
    /// Worksheet to drawing relationship
    pub const DRAWING: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/drawing";
    /// Workbook to worksheet relationship
    pub const WORKSHEET: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
    /// Workbook to shared strings relationship
    pub const SHARED_STRINGS: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings";
}

/// Content type strings for parts created by this crate
pub mod content_type {
    /// Relationship parts
    pub const RELATIONSHIPS: &str = "application/vnd.openxmlformats-package.relationships+xml";
    /// Spreadsheet drawing parts
    pub const DRAWING: &str = "application/vnd.openxmlformats-officedocument.drawing+xml";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OpcError::PartNotFound("word/document.xml".to_string());
        assert_eq!(err.to_string(), "Part not found: word/document.xml");

        let err = OpcError::InvalidXml {
            part: "xl/workbook.xml".to_string(),
            message: "bad entity".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid XML in xl/workbook.xml: bad entity");
    }
}
