//! Image placeholder arguments and size resolution
//!
//! Sizes follow VML style lengths: a number with an optional unit
//! (`cm`, `mm`, `in`, `pt`, `pc`, `px`, `%`, `em`, `ex`), or `auto`.
//! A number without a unit is in pixels.

use crate::options::ProcessOptions;
use crate::{Result, TemplateError};
use opc_core::{ImageInfo, OpcError};
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::sync::OnceLock;

/// EMUs per pixel at 96 DPI
const EMU_PER_PX: f64 = 9525.0;

fn length_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:(\d+(?:\.\d+)?|\.\d+)(cm|mm|in|pt|pc|px|%|em|ex)?|auto|)$")
            .expect("valid regex")
    })
}

fn size_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^((?:\d+(?:\.\d+)?)?(?:cm|mm|in|pt|pc|px|%|em|ex)?|auto)x((?:\d+(?:\.\d+)?)?(?:cm|mm|in|pt|pc|px|%|em|ex)?|auto)$",
        )
        .expect("valid regex")
    })
}

/// A concrete length
#[derive(Debug, Clone, PartialEq)]
pub struct Length {
    pub value: f64,
    pub unit: String,
}

impl Length {
    pub fn px(value: f64) -> Self {
        Self {
            value,
            unit: "px".to_string(),
        }
    }

    fn with_unit(value: f64, unit: &str) -> Self {
        Self {
            value,
            unit: unit.to_string(),
        }
    }

    /// Convert to EMUs; relative units resolve against `reference_px`
    pub fn to_emu(&self, reference_px: u32) -> i64 {
        let emu = match self.unit.to_ascii_lowercase().as_str() {
            "px" => self.value * EMU_PER_PX,
            "pt" => self.value * 12_700.0,
            "pc" => self.value * 152_400.0,
            "in" => self.value * 914_400.0,
            "cm" => self.value * 360_000.0,
            "mm" => self.value * 36_000.0,
            "em" => self.value * 16.0 * EMU_PER_PX,
            "ex" => self.value * 8.0 * EMU_PER_PX,
            "%" => reference_px as f64 * self.value / 100.0 * EMU_PER_PX,
            _ => reference_px as f64 * EMU_PER_PX,
        };
        emu.round() as i64
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rounded = (self.value * 1000.0).round() / 1000.0;
        write!(f, "{}{}", rounded, self.unit)
    }
}

/// A requested dimension
#[derive(Debug, Clone, PartialEq)]
pub enum Dimension {
    /// Explicitly left to the image (`""` or `auto`)
    Auto,
    /// Explicit length
    Fixed(Length),
}

impl Dimension {
    /// Parse a length; `None` for text that is not a valid length
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let caps = length_re().captures(text)?;
        match caps.get(1) {
            None => Some(Dimension::Auto),
            Some(number) => {
                let value: f64 = number.as_str().parse().ok()?;
                let unit = caps
                    .get(2)
                    .map(|u| u.as_str().to_ascii_lowercase())
                    .unwrap_or_else(|| "px".to_string());
                Some(Dimension::Fixed(Length::with_unit(value, &unit)))
            }
        }
    }

    fn fixed(&self) -> Option<&Length> {
        match self {
            Dimension::Fixed(length) => Some(length),
            Dimension::Auto => None,
        }
    }
}

/// Arguments written inline in an image placeholder
///
/// `${img:60x40}`, `${img:size=60x40}`, `${img:60:40:f}`, `${img:width=3cm:ratio=false}`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageArgs {
    pub width: Option<String>,
    pub height: Option<String>,
    pub ratio: Option<String>,
}

impl ImageArgs {
    /// Parse a placeholder's argument list
    pub fn parse(args: &[&str]) -> Self {
        let mut parsed = Self::default();

        for (index, arg) in args.iter().enumerate() {
            match arg.find('=') {
                Some(pos) if pos > 0 => {
                    let key = arg[..pos].to_ascii_lowercase();
                    let value = &arg[pos + 1..];
                    match key.as_str() {
                        "size" => parsed.set_size(value),
                        "width" => parsed.width = Some(value.to_string()),
                        "height" => parsed.height = Some(value.to_string()),
                        "ratio" => parsed.ratio = Some(value.to_string()),
                        _ => {}
                    }
                }
                _ if size_token_re().is_match(arg) => parsed.set_size(arg),
                _ => match index {
                    0 => parsed.width = Some(arg.to_string()),
                    1 => parsed.height = Some(arg.to_string()),
                    2 => parsed.ratio = Some(arg.to_string()),
                    _ => {}
                },
            }
        }

        parsed
    }

    fn set_size(&mut self, value: &str) {
        match size_token_re().captures(value) {
            Some(caps) => {
                self.width = Some(caps[1].to_string());
                self.height = Some(caps[2].to_string());
            }
            None => self.width = Some(value.to_string()),
        }
    }
}

/// Dimension value in an image descriptor (`100` or `"3cm"`)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DimensionValue {
    Number(f64),
    Text(String),
}

impl DimensionValue {
    fn to_dimension(&self) -> Option<Dimension> {
        match self {
            DimensionValue::Number(n) => Some(Dimension::Fixed(Length::px(*n))),
            DimensionValue::Text(text) => Dimension::parse(text),
        }
    }
}

/// Ratio flag in an image descriptor (`false` or `"f"`)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RatioValue {
    Flag(bool),
    Text(String),
}

/// Structured image value `{ "path": ..., "width": ..., "height": ..., "ratio": ... }`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImageDescriptor {
    pub path: String,
    #[serde(default)]
    pub width: Option<DimensionValue>,
    #[serde(default)]
    pub height: Option<DimensionValue>,
    #[serde(default)]
    pub ratio: Option<RatioValue>,
}

/// Image data value: a bare path or a descriptor
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ImageSource {
    Path(String),
    Descriptor(ImageDescriptor),
}

impl ImageSource {
    /// Read an image value from the data tree
    ///
    /// `null`, `false` and `""` mean "no image": the placeholder is removed.
    pub fn from_value(value: &serde_json::Value) -> Result<Option<Self>> {
        match value {
            serde_json::Value::Null | serde_json::Value::Bool(false) => Ok(None),
            serde_json::Value::String(s) if s.is_empty() => Ok(None),
            other => serde_json::from_value(other.clone())
                .map(Some)
                .map_err(|e| TemplateError::BindingError(format!("invalid image value: {e}"))),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            ImageSource::Path(path) => path,
            ImageSource::Descriptor(d) => &d.path,
        }
    }

    fn descriptor(&self) -> Option<&ImageDescriptor> {
        match self {
            ImageSource::Descriptor(d) => Some(d),
            ImageSource::Path(_) => None,
        }
    }
}

/// A probed image with its final rendering size
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSpec {
    pub info: ImageInfo,
    pub width: Length,
    pub height: Length,
}

impl ImageSpec {
    /// Probe the asset and resolve its rendering size
    ///
    /// Descriptor values win over inline arguments, which win over the
    /// configured defaults.
    pub fn resolve(source: &ImageSource, args: &ImageArgs, options: &ProcessOptions) -> Result<Self> {
        let info = ImageInfo::probe(source.path()).map_err(image_error)?;
        let descriptor = source.descriptor();

        let width = descriptor
            .and_then(|d| d.width.as_ref())
            .and_then(DimensionValue::to_dimension)
            .or_else(|| args.width.as_deref().and_then(Dimension::parse));
        let height = descriptor
            .and_then(|d| d.height.as_ref())
            .and_then(DimensionValue::to_dimension)
            .or_else(|| args.height.as_deref().and_then(Dimension::parse));

        let keep_ratio = match descriptor.and_then(|d| d.ratio.as_ref()) {
            Some(RatioValue::Flag(flag)) => *flag,
            Some(RatioValue::Text(text)) => !is_false_like(text),
            None => args.ratio.as_deref().map_or(true, |r| !is_false_like(r)),
        };

        let (width, height) = if keep_ratio {
            fit_to_ratio(width, height, &info)
        } else {
            (
                pinned_or_default(width, &options.default_image_width, 115.0, info.width),
                pinned_or_default(height, &options.default_image_height, 70.0, info.height),
            )
        };

        Ok(Self {
            info,
            width,
            height,
        })
    }

    /// Width in EMUs
    pub fn width_emu(&self) -> i64 {
        self.width.to_emu(self.info.width)
    }

    /// Height in EMUs
    pub fn height_emu(&self) -> i64 {
        self.height.to_emu(self.info.height)
    }
}

fn image_error(err: OpcError) -> TemplateError {
    match err {
        OpcError::UnsupportedImage(what) => TemplateError::UnsupportedImage(what),
        other => TemplateError::ImageError(other.to_string()),
    }
}

/// Ratio arguments that disable aspect-ratio correction
fn is_false_like(ratio: &str) -> bool {
    matches!(
        ratio.trim().to_ascii_lowercase().as_str(),
        "" | "-" | "f" | "false"
    )
}

fn pinned_or_default(dim: Option<Dimension>, default: &str, fallback: f64, intrinsic: u32) -> Length {
    match dim {
        Some(Dimension::Fixed(length)) => length,
        Some(Dimension::Auto) => Length::px(intrinsic as f64),
        None => match Dimension::parse(default) {
            Some(Dimension::Fixed(length)) => length,
            Some(Dimension::Auto) => Length::px(intrinsic as f64),
            None => Length::px(fallback),
        },
    }
}

/// Resolve a size that keeps the image's aspect ratio
///
/// A missing dimension is derived from the pinned one. When both are pinned
/// in the same unit the image is shrunk to fit: the dimension along which the
/// image is relatively wider is kept (width on a tie). Pinned dimensions in
/// different units are used as given.
fn fit_to_ratio(width: Option<Dimension>, height: Option<Dimension>, info: &ImageInfo) -> (Length, Length) {
    let ratio = info.aspect_ratio();
    let width = width.as_ref().and_then(Dimension::fixed).cloned();
    let height = height.as_ref().and_then(Dimension::fixed).cloned();

    match (width, height) {
        (None, None) => (
            Length::px(info.width as f64),
            Length::px(info.height as f64),
        ),
        (Some(w), None) => {
            let h = Length::with_unit(w.value / ratio, &w.unit);
            (w, h)
        }
        (None, Some(h)) => {
            let w = Length::with_unit(h.value * ratio, &h.unit);
            (w, h)
        }
        (Some(w), Some(h)) => {
            if !w.unit.eq_ignore_ascii_case(&h.unit) || h.value == 0.0 {
                return (w, h);
            }
            let defined = w.value / h.value;
            if ratio > defined {
                let h = Length::with_unit(w.value / ratio, &w.unit);
                (w, h)
            } else if ratio < defined {
                let w = Length::with_unit(h.value * ratio, &h.unit);
                (w, h)
            } else {
                (w, h)
            }
        }
    }
}
