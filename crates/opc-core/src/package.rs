//! Zipped package wrapper

use crate::{OpcError, Result};
use std::io::{Cursor, Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Name of the content types part, always written first
const CONTENT_TYPES: &str = "[Content_Types].xml";

/// An OOXML package held fully in memory
///
/// Entries keep their original order so that an unmodified package is
/// written back with the same layout.
#[derive(Debug, Clone, Default)]
pub struct Package {
    entries: Vec<(String, Vec<u8>)>,
}

impl Package {
    /// Create an empty package
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a package from a file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|e| OpcError::OpenError(format!("{}: {}", path.display(), e)))?;
        Self::from_bytes(&data)
    }

    /// Open a package from bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(data))
            .map_err(|e| OpcError::OpenError(e.to_string()))?;

        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut bytes = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut bytes)?;
            entries.push((name, bytes));
        }

        tracing::debug!(parts = entries.len(), "opened package");
        Ok(Self { entries })
    }

    /// Names of all parts, in package order
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Check whether a part exists
    pub fn has_part(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Raw bytes of a part
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, bytes)| bytes.as_slice())
    }

    /// Read a part as UTF-8 XML text
    pub fn read_xml(&self, name: &str) -> Result<String> {
        let bytes = self
            .part(name)
            .ok_or_else(|| OpcError::PartNotFound(name.to_string()))?;
        String::from_utf8(bytes.to_vec()).map_err(|e| OpcError::InvalidXml {
            part: name.to_string(),
            message: e.to_string(),
        })
    }

    /// Read a part as XML text if it exists
    pub fn read_xml_opt(&self, name: &str) -> Result<Option<String>> {
        if self.has_part(name) {
            self.read_xml(name).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Add or replace a part
    pub fn set_part(&mut self, name: &str, data: impl Into<Vec<u8>>) {
        let data = data.into();
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = data,
            None => self.entries.push((name.to_string(), data)),
        }
    }

    /// Remove a part, returning its bytes
    pub fn remove_part(&mut self, name: &str) -> Option<Vec<u8>> {
        let pos = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(pos).1)
    }

    /// Save the package to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)
            .map_err(|e| OpcError::SaveError(format!("{}: {}", path.display(), e)))?;
        Ok(())
    }

    /// Serialize the package to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let ordered = self
            .entries
            .iter()
            .filter(|(n, _)| n == CONTENT_TYPES)
            .chain(self.entries.iter().filter(|(n, _)| n != CONTENT_TYPES));

        for (name, bytes) in ordered {
            writer.start_file(name.as_str(), options)?;
            writer.write_all(bytes)?;
        }

        let cursor = writer
            .finish()
            .map_err(|e| OpcError::SaveError(e.to_string()))?;
        Ok(cursor.into_inner())
    }
}
