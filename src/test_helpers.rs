//! Shared test utilities for the imgshift test suite.
//!
//! Builds in-memory images and the file/selection types that wrap them, so
//! unit tests never touch fixtures on disk.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let mut store = SelectionStore::new();
//! store.add(vec![raw_png("cat.png", 8, 8), text_file("notes.txt")]).unwrap();
//!
//! let image = selected_png("dog.png", 16, 9);
//! assert_eq!(image.content_type(), "image/png");
//! ```

use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;

use crate::selection::{RawFile, SelectedImage};

// =========================================================================
// Pixels
// =========================================================================

/// RGB gradient: red grows left to right, green top to bottom.
pub fn gradient(width: u32, height: u32) -> DynamicImage {
    let img = RgbImage::from_fn(width, height, |x, y| {
        let r = (x * 255 / width.max(1)) as u8;
        let g = (y * 255 / height.max(1)) as u8;
        image::Rgb([r, g, 128])
    });
    DynamicImage::ImageRgb8(img)
}

/// PNG-encoded [`gradient`].
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    gradient(width, height)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

// =========================================================================
// Files and selections
// =========================================================================

/// A PNG file as it would arrive from a picker.
pub fn raw_png(name: &str, width: u32, height: u32) -> RawFile {
    RawFile::new(name, "image/png", png_bytes(width, height))
}

/// A file the selection store must reject.
pub fn text_file(name: &str) -> RawFile {
    RawFile::new(name, "text/plain", b"not an image".to_vec())
}

/// An accepted PNG, preview included.
pub fn selected_png(name: &str, width: u32, height: u32) -> SelectedImage {
    SelectedImage::from_raw(raw_png(name, width, height))
}
