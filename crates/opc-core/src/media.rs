//! Embedded media bookkeeping

use crate::{ContentTypes, ImageInfo, OpcError, Package, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Tracks which source assets were already copied into a package
///
/// An asset referenced by several placeholders is stored once; each
/// placeholder still gets its own relationship pointing at the shared part.
#[derive(Debug, Clone, Default)]
pub struct MediaRegistry {
    stored: HashMap<PathBuf, String>,
}

impl MediaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Part name already used for a source asset
    pub fn part_for(&self, source: &Path) -> Option<&str> {
        self.stored.get(source).map(String::as_str)
    }

    /// Number of distinct assets stored
    pub fn len(&self) -> usize {
        self.stored.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stored.is_empty()
    }

    /// Copy an asset into the package unless it is already there
    ///
    /// `part_name` is only called for assets seen for the first time. The
    /// asset's extension is registered as a default content type.
    pub fn store<F>(
        &mut self,
        package: &mut Package,
        content_types: &mut ContentTypes,
        info: &ImageInfo,
        part_name: F,
    ) -> Result<String>
    where
        F: FnOnce(&ImageInfo) -> String,
    {
        if let Some(existing) = self.stored.get(&info.path) {
            return Ok(existing.clone());
        }

        let data = std::fs::read(&info.path)
            .map_err(|e| OpcError::ImageError(format!("{}: {}", info.path.display(), e)))?;
        let name = part_name(info);

        package.set_part(&name, data);
        content_types.add_default(info.format.extension(), info.format.mime_type());
        tracing::debug!(source = %info.path.display(), part = %name, "stored media");

        self.stored.insert(info.path.clone(), name.clone());
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write_png(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        image::RgbImage::new(4, 2).save(&path).unwrap();
        path
    }

    #[test]
    fn test_store_once_per_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "logo.png");
        let info = ImageInfo::probe(&path).unwrap();

        let mut package = Package::new();
        let mut types = ContentTypes::default();
        let mut media = MediaRegistry::new();

        let first = media
            .store(&mut package, &mut types, &info, |_| "word/media/image1.png".to_string())
            .unwrap();
        let second = media
            .store(&mut package, &mut types, &info, |_| "word/media/image2.png".to_string())
            .unwrap();

        assert_eq!(first, "word/media/image1.png");
        assert_eq!(second, first);
        assert_eq!(media.len(), 1);
        assert!(package.has_part("word/media/image1.png"));
        assert!(!package.has_part("word/media/image2.png"));
        assert_eq!(types.default_for("png"), Some("image/png".to_string()));
        assert_eq!(media.part_for(&path), Some("word/media/image1.png"));
    }

    #[test]
    fn test_distinct_sources_get_distinct_parts() {
        let dir = tempfile::tempdir().unwrap();
        let a = ImageInfo::probe(write_png(dir.path(), "a.png")).unwrap();
        let b = ImageInfo::probe(write_png(dir.path(), "b.png")).unwrap();

        let mut package = Package::new();
        let mut types = ContentTypes::default();
        let mut media = MediaRegistry::new();

        let mut counter = 0;
        let mut next = |info: &ImageInfo| {
            counter += 1;
            format!("xl/media/image{}.{}", counter, info.format.extension())
        };
        let pa = media.store(&mut package, &mut types, &a, &mut next).unwrap();
        let pb = media.store(&mut package, &mut types, &b, &mut next).unwrap();

        assert_eq!(pa, "xl/media/image1.png");
        assert_eq!(pb, "xl/media/image2.png");
    }
}
