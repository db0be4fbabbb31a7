//! Template Engine - placeholder substitution for OOXML documents
//!
//! This crate provides:
//! - Placeholder scanning (`${name}`, `${name:arg1:arg2}`)
//! - Data node classification and processing order
//! - Scalar substitution, repeating table rows and paragraph blocks
//! - Image embedding with aspect-ratio aware sizing
//! - Word-processing (`.docx`) and spreadsheet (`.xlsx`) back-ends
//!
//! # Example
//!
//! ```ignore
//! use template::{DocxTemplate, ProcessOptions};
//!
//! let mut doc = DocxTemplate::open("invoice.docx")?;
//! let data: serde_json::Value = serde_json::from_str(data_json)?;
//! doc.process(&data, &ProcessOptions::default())?;
//! doc.save("invoice-filled.docx")?;
//! ```

pub mod docx;
pub mod image;
pub mod index;
mod io;
pub mod node;
pub mod options;
pub mod scalar;
pub mod scanner;
pub mod xlsx;

pub use docx::DocxTemplate;
pub use index::{PartVariables, VariableIndex, Variables};
pub use io::{fill, variables, TemplateKind};
pub use node::{NodeKey, NodeKind};
pub use options::ProcessOptions;
pub use xlsx::XlsxTemplate;

use thiserror::Error;

/// Errors that can occur during template processing
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Failed to parse options: {0}")]
    ParseError(String),

    #[error("Invalid data binding: {0}")]
    BindingError(String),

    #[error("Malformed template: {0}")]
    Malformed(String),

    #[error("Unsupported template format: {0}")]
    UnsupportedFormat(String),

    #[error("Unsupported image type: {0}")]
    UnsupportedImage(String),

    #[error("Image error: {0}")]
    ImageError(String),

    #[error("Package error: {0}")]
    Package(#[from] opc_core::OpcError),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for template operations
pub type Result<T> = std::result::Result<T, TemplateError>;

/// Top-level data object of a fill request
pub(crate) fn data_object(data: &serde_json::Value) -> Result<&serde_json::Map<String, serde_json::Value>> {
    data.as_object()
        .ok_or_else(|| TemplateError::BindingError("data must be a JSON object".to_string()))
}
