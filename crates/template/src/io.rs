//! Entry points dispatching on the template's file extension

use crate::docx::DocxTemplate;
use crate::index::Variables;
use crate::options::ProcessOptions;
use crate::xlsx::XlsxTemplate;
use crate::{Result, TemplateError};
use opc_core::Package;
use serde_json::Value;
use std::path::Path;
use tracing::info;

/// Template flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    Docx,
    Xlsx,
}

impl TemplateKind {
    /// Kind of a template file, from its extension (case-insensitive)
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("docx") => Ok(TemplateKind::Docx),
            Some("xlsx") => Ok(TemplateKind::Xlsx),
            _ => Err(TemplateError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Fill `template` with `data` and write the result to `output`
///
/// Both paths must name the same kind of document.
pub fn fill<P, Q>(template: P, output: Q, data: &Value, options: &ProcessOptions) -> Result<()>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let (template, output) = (template.as_ref(), output.as_ref());
    let kind = TemplateKind::from_path(template)?;
    if TemplateKind::from_path(output)? != kind {
        return Err(TemplateError::UnsupportedFormat(format!(
            "cannot write a {kind:?} template to {}",
            output.display()
        )));
    }

    let package = Package::open(template)?;
    match kind {
        TemplateKind::Docx => {
            let mut doc = DocxTemplate::from_package(package, options)?;
            doc.process(data, options)?;
            doc.save(output)?;
        }
        TemplateKind::Xlsx => {
            let mut book = XlsxTemplate::from_package(package)?;
            book.process(data, options)?;
            book.save(output)?;
        }
    }
    info!(template = %template.display(), output = %output.display(), "filled template");
    Ok(())
}

/// Placeholder names of a template file, flat or grouped by part / sheet name
pub fn variables<P: AsRef<Path>>(template: P, grouped: bool) -> Result<Variables> {
    let template = template.as_ref();
    let package = Package::open(template)?;
    Ok(match TemplateKind::from_path(template)? {
        TemplateKind::Docx => {
            let mut doc = DocxTemplate::from_package(package, &ProcessOptions::default())?;
            if grouped {
                doc.variables_by_part()
            } else {
                doc.variables()
            }
        }
        TemplateKind::Xlsx => {
            let mut book = XlsxTemplate::from_package(package)?;
            if grouped {
                book.variables_by_sheet()
            } else {
                book.variables()
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_kind_from_path() {
        assert_eq!(TemplateKind::from_path("a/report.docx").unwrap(), TemplateKind::Docx);
        assert_eq!(TemplateKind::from_path("BOOK.XLSX").unwrap(), TemplateKind::Xlsx);
        assert!(matches!(
            TemplateKind::from_path("slides.pptx"),
            Err(TemplateError::UnsupportedFormat(_))
        ));
        assert!(TemplateKind::from_path("noextension").is_err());
    }

    #[test]
    fn test_fill_rejects_mismatched_kinds() {
        let err = fill("in.docx", "out.xlsx", &Value::Null, &ProcessOptions::default()).unwrap_err();
        assert!(matches!(err, TemplateError::UnsupportedFormat(_)));
    }
}
