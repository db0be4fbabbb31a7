//! Processing options

use crate::{Result, TemplateError};
use serde::{Deserialize, Serialize};

fn default_image_width() -> String {
    "115px".to_string()
}

fn default_image_height() -> String {
    "70px".to_string()
}

fn default_true() -> bool {
    true
}

/// Options controlling a substitution pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOptions {
    /// Maximum replacements per placeholder name in one word-processing part
    /// (`None` = unlimited)
    #[serde(default)]
    pub max_replacements: Option<usize>,

    /// Width used when neither the data nor the placeholder pins one and the
    /// aspect ratio is not preserved
    #[serde(default = "default_image_width")]
    pub default_image_width: String,

    /// Height counterpart of `default_image_width`
    #[serde(default = "default_image_height")]
    pub default_image_height: String,

    /// Merge placeholders that a word processor split across several runs
    #[serde(default = "default_true")]
    pub repair_split_placeholders: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            max_replacements: None,
            default_image_width: default_image_width(),
            default_image_height: default_image_height(),
            repair_split_placeholders: true,
        }
    }
}

impl ProcessOptions {
    /// Parse options from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| TemplateError::ParseError(e.to_string()))
    }

    /// Replacement limit in the form the regex engine expects (0 = all)
    pub(crate) fn replacement_limit(&self) -> usize {
        self.max_replacements.unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let options = ProcessOptions::default();
        assert_eq!(options.max_replacements, None);
        assert_eq!(options.default_image_width, "115px");
        assert_eq!(options.default_image_height, "70px");
        assert!(options.repair_split_placeholders);
        assert_eq!(options.replacement_limit(), 0);
    }

    #[test]
    fn test_from_json_partial() {
        let options = ProcessOptions::from_json(r#"{ "maxReplacements": 1 }"#).unwrap();
        assert_eq!(options.max_replacements, Some(1));
        assert_eq!(options.replacement_limit(), 1);
        assert_eq!(options.default_image_width, "115px");
    }

    #[test]
    fn test_from_json_full() {
        let options = ProcessOptions::from_json(
            r#"{
                "defaultImageWidth": "4cm",
                "defaultImageHeight": "3cm",
                "repairSplitPlaceholders": false
            }"#,
        )
        .unwrap();
        assert_eq!(options.default_image_width, "4cm");
        assert!(!options.repair_split_placeholders);
    }

    #[test]
    fn test_from_json_invalid() {
        assert!(matches!(
            ProcessOptions::from_json("{ not json"),
            Err(TemplateError::ParseError(_))
        ));
    }
}
