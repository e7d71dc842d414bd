//! Conversion backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations every backend must
//! support: decode a selected image into a [`Bitmap`], and encode a bitmap
//! for a [`ConversionRequest`].
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend). Tests use the
//! `MockBackend` below, which records calls and can be told to fail or stall
//! for specific files.

use super::params::{ConversionRequest, TargetFormat};
use crate::selection::SelectedImage;
use image::DynamicImage;
use thiserror::Error;

/// Per-image failure inside a conversion.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    #[error("Failed to decode {name}: {reason}")]
    Decode { name: String, reason: String },
    #[error("Failed to encode {name} as {format}: {reason}")]
    Encode {
        name: String,
        format: TargetFormat,
        reason: String,
    },
}

impl ConvertError {
    /// Display name of the file the error belongs to.
    pub fn name(&self) -> &str {
        match self {
            ConvertError::Decode { name, .. } | ConvertError::Encode { name, .. } => name,
        }
    }
}

/// Pixel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Decoded pixel buffer: the interchange shape between decode and encode.
#[derive(Debug, Clone)]
pub struct Bitmap {
    pixels: DynamicImage,
}

impl Bitmap {
    pub fn new(pixels: DynamicImage) -> Self {
        Self { pixels }
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.pixels.width(),
            height: self.pixels.height(),
        }
    }

    pub fn as_image(&self) -> &DynamicImage {
        &self.pixels
    }
}

/// Trait for conversion backends.
///
/// `Sync` because the orchestrator fans images out over rayon and every task
/// borrows the same backend.
pub trait ImageBackend: Sync {
    /// Decode the image's preview bytes into a bitmap.
    fn decode(&self, image: &SelectedImage) -> Result<Bitmap, ConvertError>;

    /// Encode a bitmap according to `request`. `name` is only used to tag errors.
    fn encode(
        &self,
        bitmap: &Bitmap,
        request: &ConversionRequest,
        name: &str,
    ) -> Result<Vec<u8>, ConvertError>;
}
