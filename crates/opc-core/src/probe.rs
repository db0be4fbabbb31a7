//! Image metadata probing

use crate::{OpcError, Result};
use image::{ImageFormat as CodecFormat, ImageReader};
use std::io::Cursor;
use std::path::{Path, PathBuf};

impl From<image::ImageError> for OpcError {
    fn from(err: image::ImageError) -> Self {
        OpcError::ImageError(err.to_string())
    }
}

/// Image formats that can be embedded into a package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Bmp,
}

impl ImageFormat {
    /// MIME type used for content type registration
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Bmp => "image/bmp",
        }
    }

    /// File extension used for the embedded media part
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Gif => "gif",
            ImageFormat::Bmp => "bmp",
        }
    }

    fn codec(&self) -> CodecFormat {
        match self {
            ImageFormat::Png => CodecFormat::Png,
            ImageFormat::Jpeg => CodecFormat::Jpeg,
            ImageFormat::Gif => CodecFormat::Gif,
            ImageFormat::Bmp => CodecFormat::Bmp,
        }
    }
}

/// Detect image format from magic bytes
pub fn detect_format(data: &[u8]) -> Result<ImageFormat> {
    if data.len() < 8 {
        return Err(OpcError::ImageError("Image data too short".to_string()));
    }

    // JPEG starts with FF D8 FF
    if data[0] == 0xFF && data[1] == 0xD8 && data[2] == 0xFF {
        return Ok(ImageFormat::Jpeg);
    }

    // PNG starts with 89 50 4E 47 0D 0A 1A 0A
    if data[0..8] == [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A] {
        return Ok(ImageFormat::Png);
    }

    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return Ok(ImageFormat::Gif);
    }

    if data.starts_with(b"BM") {
        return Ok(ImageFormat::Bmp);
    }

    Err(OpcError::UnsupportedImage("unknown format".to_string()))
}

/// Intrinsic metadata of an image asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    /// Source path the asset was read from
    pub path: PathBuf,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Detected format
    pub format: ImageFormat,
}

impl ImageInfo {
    /// Read an image file and probe its size and format
    pub fn probe<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|e| OpcError::ImageError(format!("{}: {}", path.display(), e)))?;
        Self::from_bytes(path, &data)
    }

    /// Probe image bytes, recording `path` as their source
    pub fn from_bytes<P: AsRef<Path>>(path: P, data: &[u8]) -> Result<Self> {
        let path = path.as_ref();
        let format = detect_format(data).map_err(|e| match e {
            OpcError::UnsupportedImage(_) => {
                OpcError::UnsupportedImage(path.display().to_string())
            }
            other => other,
        })?;

        let (width, height) =
            ImageReader::with_format(Cursor::new(data), format.codec()).into_dimensions()?;
        if width == 0 || height == 0 {
            return Err(OpcError::ImageError(format!(
                "{}: image has no pixels",
                path.display()
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            width,
            height,
            format,
        })
    }

    /// Width divided by height
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::new(width, height);
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), CodecFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_detect_jpeg() {
        let data = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46];
        assert_eq!(detect_format(&data).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_detect_png() {
        let data = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        assert_eq!(detect_format(&data).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn test_detect_gif_and_bmp() {
        assert_eq!(detect_format(b"GIF89a\x01\x00").unwrap(), ImageFormat::Gif);
        assert_eq!(detect_format(b"BM\x00\x00\x00\x00\x00\x00").unwrap(), ImageFormat::Bmp);
    }

    #[test]
    fn test_detect_unknown() {
        assert!(matches!(
            detect_format(b"%PDF-1.7 not an image"),
            Err(OpcError::UnsupportedImage(_))
        ));
    }

    #[test]
    fn test_detect_format_too_short() {
        assert!(matches!(
            detect_format(&[0xFF, 0xD8]),
            Err(OpcError::ImageError(_))
        ));
    }

    #[test]
    fn test_format_metadata() {
        assert_eq!(ImageFormat::Jpeg.mime_type(), "image/jpeg");
        assert_eq!(ImageFormat::Jpeg.extension(), "jpeg");
        assert_eq!(ImageFormat::Png.extension(), "png");
    }

    #[test]
    fn test_probe_png_bytes() {
        let info = ImageInfo::from_bytes("logo.png", &png_bytes(200, 100)).unwrap();
        assert_eq!(info.width, 200);
        assert_eq!(info.height, 100);
        assert_eq!(info.format, ImageFormat::Png);
        assert_eq!(info.aspect_ratio(), 2.0);
    }

    #[test]
    fn test_probe_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        std::fs::write(&path, png_bytes(30, 60)).unwrap();

        let info = ImageInfo::probe(&path).unwrap();
        assert_eq!((info.width, info.height), (30, 60));
        assert_eq!(info.path, path);
    }

    #[test]
    fn test_probe_missing_file() {
        assert!(matches!(
            ImageInfo::probe("/definitely/not/here.png"),
            Err(OpcError::ImageError(_))
        ));
    }

    #[test]
    fn test_probe_unsupported_names_path() {
        let err = ImageInfo::from_bytes("doc.pdf", b"%PDF-1.7 not an image").unwrap_err();
        assert_eq!(err.to_string(), "Unsupported image type: doc.pdf");
    }
}
