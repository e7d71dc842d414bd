//! Parameter types for conversions.
//!
//! These types describe *what* to produce, not *how*. They are the interface
//! between the batch orchestrator (which decides what every image becomes)
//! and the [`backend`](super::backend) (which does the pixel work). Keeping
//! them separate lets tests swap in a mock backend without touching the
//! orchestration logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 90). Clamped on construction.
//! - [`TargetFormat`]: The closed set of output formats: `jpg`, `png`, `webp`, `ico`.
//! - [`IcoMode`]: What an `ico` conversion writes: a bare PNG payload or a real ICO container.
//! - [`ConversionRequest`]: Format + quality + ICO mode, applied uniformly to a whole batch.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Edge length of the square canvas every ICO conversion is stretched onto.
pub const ICO_SIZE: u32 = 256;

/// Quality setting for lossy image encoding (1-100).
///
/// Only constructible through [`Quality::new`], so the value is always in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u32);

impl Quality {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 100;

    pub fn new(value: u32) -> Self {
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// Quality as the `0.0..=1.0` fraction canvas-style encoders expect.
    pub fn fraction(self) -> f32 {
        self.0 as f32 / 100.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Output format for a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Jpg,
    Png,
    Webp,
    Ico,
}

impl TargetFormat {
    pub fn all() -> [TargetFormat; 4] {
        [
            TargetFormat::Jpg,
            TargetFormat::Png,
            TargetFormat::Webp,
            TargetFormat::Ico,
        ]
    }

    /// File extension used for the download name, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            TargetFormat::Jpg => "jpg",
            TargetFormat::Png => "png",
            TargetFormat::Webp => "webp",
            TargetFormat::Ico => "ico",
        }
    }

    /// MIME type of the bytes the encoder emits for this format.
    ///
    /// `ico` reports `image/png` in [`IcoMode::PngPayload`] because that is
    /// literally what gets written; see [`ConversionRequest::output_mime_type`].
    pub fn mime_type(self) -> &'static str {
        match self {
            TargetFormat::Jpg => "image/jpeg",
            TargetFormat::Png => "image/png",
            TargetFormat::Webp => "image/webp",
            TargetFormat::Ico => "image/x-icon",
        }
    }

    /// Whether the quality slider means anything for this format.
    pub fn uses_quality(self) -> bool {
        matches!(self, TargetFormat::Jpg | TargetFormat::Webp)
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown output format '{0}' (expected one of: jpg, png, webp, ico)")]
pub struct UnknownFormat(pub String);

impl FromStr for TargetFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(TargetFormat::Jpg),
            "png" => Ok(TargetFormat::Png),
            "webp" => Ok(TargetFormat::Webp),
            "ico" => Ok(TargetFormat::Ico),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}

/// What an `ico` conversion writes after stretching to 256×256.
///
/// `PngPayload` matches what canvas-based browser converters produce: the `.ico`
/// file holds plain PNG bytes with no icon directory. Most viewers accept
/// it, Windows Explorer does not. `Container` writes a real single-entry ICO
/// (directory header + one embedded PNG frame).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IcoMode {
    #[default]
    PngPayload,
    Container,
}

/// Parameters governing one batch conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionRequest {
    pub target_format: TargetFormat,
    pub quality: Quality,
    pub ico_mode: IcoMode,
}

impl ConversionRequest {
    pub fn new(target_format: TargetFormat, quality: Quality) -> Self {
        Self {
            target_format,
            quality,
            ico_mode: IcoMode::default(),
        }
    }

    pub fn with_ico_mode(mut self, ico_mode: IcoMode) -> Self {
        self.ico_mode = ico_mode;
        self
    }

    /// The quality actually handed to the codec: `None` for png and ico.
    pub fn effective_quality(&self) -> Option<Quality> {
        self.target_format
            .uses_quality()
            .then_some(self.quality)
    }

    pub fn output_mime_type(&self) -> &'static str {
        match (self.target_format, self.ico_mode) {
            (TargetFormat::Ico, IcoMode::PngPayload) => "image/png",
            (format, _) => format.mime_type(),
        }
    }
}
