//! Document part capability

use regex::Regex;
use std::ops::Range;

/// A named unit of textual content the template engine can rewrite
///
/// The engine only needs to read the current content, replace it wholesale
/// and find byte spans matching a pattern. Anything that can do that can be
/// filled, regardless of which package library loaded it.
pub trait DocumentPart {
    /// Part name inside the package (e.g. `word/header1.xml`)
    fn name(&self) -> &str;

    /// Current content
    fn read(&self) -> &str;

    /// Replace the content
    fn write(&mut self, content: String);

    /// Byte spans of every match of `pattern` in the current content
    fn locate(&self, pattern: &Regex) -> Vec<Range<usize>> {
        pattern.find_iter(self.read()).map(|m| m.range()).collect()
    }
}

/// An XML part held as text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlPart {
    name: String,
    content: String,
    modified: bool,
}

impl XmlPart {
    /// Create a part from its name and XML text
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            modified: false,
        }
    }

    /// Whether `write` changed the content since loading
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// File stem of the part name (`word/header1.xml` → `header1`)
    pub fn stem(&self) -> &str {
        let file = self.name.rsplit('/').next().unwrap_or(&self.name);
        file.split('.').next().unwrap_or(file)
    }
}

impl DocumentPart for XmlPart {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> &str {
        &self.content
    }

    fn write(&mut self, content: String) {
        if content != self.content {
            self.modified = true;
            self.content = content;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_write_tracks_modification() {
        let mut part = XmlPart::new("word/document.xml", "<w:t>a</w:t>");
        part.write("<w:t>a</w:t>".to_string());
        assert!(!part.is_modified());

        part.write("<w:t>b</w:t>".to_string());
        assert!(part.is_modified());
        assert_eq!(part.read(), "<w:t>b</w:t>");
    }

    #[test]
    fn test_locate() {
        let part = XmlPart::new("word/document.xml", "${a} and ${b}");
        let re = Regex::new(r"\$\{[^}]*\}").unwrap();
        assert_eq!(part.locate(&re), vec![0..4, 9..13]);
    }

    #[test]
    fn test_stem() {
        assert_eq!(XmlPart::new("word/footer2.xml", "").stem(), "footer2");
        assert_eq!(XmlPart::new("document.xml", "").stem(), "document");
    }
}
