//! Decoding and encoding: the pixel half of the pipeline.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` over the preview's data-URI payload |
//! | **Encode JPEG / PNG / ICO** | `image` codecs |
//! | **Encode WebP** | `webp` (libwebp, lossy) |
//! | **ICO canvas** | `resize_exact` to 256×256 (stretch) |
//!
//! The module is split into:
//! - **Parameters**: what to produce ([`TargetFormat`], [`Quality`], [`ConversionRequest`])
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Data URIs**: the preview representation the decoder reads from

pub mod backend;
pub mod data_uri;
mod params;
pub mod rust_backend;

pub use backend::{Bitmap, ConvertError, Dimensions, ImageBackend};
pub use params::{ConversionRequest, ICO_SIZE, IcoMode, Quality, TargetFormat, UnknownFormat};
pub use rust_backend::RustBackend;
