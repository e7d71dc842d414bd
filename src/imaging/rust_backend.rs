//! Pure Rust conversion backend, plus libwebp for lossy WebP.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, WebP, GIF, BMP, TIFF, ICO) | `image::ImageReader` with content-guessed format |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` (quality 1–100) |
//! | Encode → PNG | `image::codecs::png::PngEncoder` (no quality axis) |
//! | Encode → WebP | `webp::Encoder` (lossy, quality 1–100) |
//! | ICO resample | `image::DynamicImage::resize_exact` with `Lanczos3`, always 256×256 |
//! | Encode → ICO container | `image::codecs::ico::IcoEncoder` (one PNG frame) |

use super::backend::{Bitmap, ConvertError, ImageBackend};
use super::data_uri;
use super::params::{ConversionRequest, ICO_SIZE, IcoMode, Quality, TargetFormat};
use crate::selection::SelectedImage;
use image::codecs::ico::IcoEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, ImageReader};
use std::io::Cursor;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode raw encoded bytes, sniffing the codec from the content.
pub fn decode_bytes(bytes: &[u8]) -> Result<DynamicImage, String> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| e.to_string())?
        .decode()
        .map_err(|e| e.to_string())
}

/// Encode a bitmap for `request`.
///
/// The ICO branch stretches to 256×256 before encoding; every other branch
/// keeps the source dimensions.
pub fn encode_bitmap(bitmap: &Bitmap, request: &ConversionRequest) -> Result<Vec<u8>, String> {
    let img = bitmap.as_image();
    match request.target_format {
        TargetFormat::Jpg => encode_jpeg(img, request.quality),
        TargetFormat::Png => encode_png(img),
        TargetFormat::Webp => encode_webp(img, request.quality),
        TargetFormat::Ico => {
            let canvas = img.resize_exact(ICO_SIZE, ICO_SIZE, FilterType::Lanczos3);
            match request.ico_mode {
                IcoMode::PngPayload => encode_png(&canvas),
                IcoMode::Container => encode_ico(&canvas),
            }
        }
    }
}

/// JPEG has no alpha channel; transparent pixels are flattened by dropping alpha.
fn encode_jpeg(img: &DynamicImage, quality: Quality) -> Result<Vec<u8>, String> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality.value() as u8);
    rgb.write_with_encoder(encoder)
        .map_err(|e| format!("JPEG encode failed: {}", e))?;
    Ok(buf)
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, String> {
    let mut buf = Vec::new();
    let encoder = PngEncoder::new(&mut buf);
    // PNG cannot store float samples; everything else goes through untouched
    // so round-trips stay pixel-identical.
    let result = match img.color() {
        ColorType::Rgb32F | ColorType::Rgba32F => {
            DynamicImage::ImageRgba16(img.to_rgba16()).write_with_encoder(encoder)
        }
        _ => img.write_with_encoder(encoder),
    };
    result.map_err(|e| format!("PNG encode failed: {}", e))?;
    Ok(buf)
}

fn encode_webp(img: &DynamicImage, quality: Quality) -> Result<Vec<u8>, String> {
    let rgba = img.to_rgba8();
    let encoder = webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height());
    let encoded = encoder
        .encode_simple(false, quality.value() as f32)
        .map_err(|e| format!("WebP encode failed: {:?}", e))?;
    Ok(encoded.to_vec())
}

fn encode_ico(img: &DynamicImage) -> Result<Vec<u8>, String> {
    let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
    let mut buf = Vec::new();
    let encoder = IcoEncoder::new(&mut buf);
    rgba.write_with_encoder(encoder)
        .map_err(|e| format!("ICO encode failed: {}", e))?;
    Ok(buf)
}

impl ImageBackend for RustBackend {
    fn decode(&self, image: &SelectedImage) -> Result<Bitmap, ConvertError> {
        let fail = |reason: String| ConvertError::Decode {
            name: image.display_name().to_string(),
            reason,
        };
        let (_, bytes) = data_uri::decode(image.preview_data_uri()).map_err(|e| fail(e.to_string()))?;
        decode_bytes(&bytes).map(Bitmap::new).map_err(fail)
    }

    fn encode(
        &self,
        bitmap: &Bitmap,
        request: &ConversionRequest,
        name: &str,
    ) -> Result<Vec<u8>, ConvertError> {
        encode_bitmap(bitmap, request).map_err(|reason| ConvertError::Encode {
            name: name.to_string(),
            format: request.target_format,
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::RawFile;
    use crate::test_helpers::{gradient, png_bytes, selected_png};

    fn convert(img: DynamicImage, request: ConversionRequest) -> Vec<u8> {
        encode_bitmap(&Bitmap::new(img), &request).unwrap()
    }

    #[test]
    fn decode_selected_png() {
        let backend = RustBackend::new();
        let bitmap = backend.decode(&selected_png("a.png", 40, 30)).unwrap();
        assert_eq!(bitmap.dimensions().width, 40);
        assert_eq!(bitmap.dimensions().height, 30);
    }

    #[test]
    fn decode_corrupt_bytes_names_the_file() {
        let backend = RustBackend::new();
        let image = SelectedImage::from_raw(RawFile::new(
            "broken.png",
            "image/png",
            b"definitely not a png".to_vec(),
        ));
        let err = backend.decode(&image).unwrap_err();
        assert!(matches!(&err, ConvertError::Decode { name, .. } if name == "broken.png"));
    }

    #[test]
    fn decode_empty_file_errors() {
        let backend = RustBackend::new();
        let image = SelectedImage::from_raw(RawFile::new("empty.jpg", "image/jpeg", Vec::new()));
        assert!(backend.decode(&image).is_err());
    }

    #[test]
    fn jpeg_round_trip_keeps_dimensions() {
        let bytes = convert(
            gradient(64, 48),
            ConversionRequest::new(TargetFormat::Jpg, Quality::new(80)),
        );
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        let decoded = decode_bytes(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    #[test]
    fn webp_round_trip_keeps_dimensions() {
        let bytes = convert(
            gradient(50, 70),
            ConversionRequest::new(TargetFormat::Webp, Quality::new(60)),
        );
        assert_eq!(&bytes[..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WEBP");
        let decoded = decode_bytes(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (50, 70));
    }

    #[test]
    fn png_round_trip_is_pixel_identical() {
        let source = gradient(33, 17);
        let bytes = convert(
            source.clone(),
            ConversionRequest::new(TargetFormat::Png, Quality::default()),
        );
        let decoded = decode_bytes(&bytes).unwrap();
        assert_eq!(decoded.to_rgb8(), source.to_rgb8());
    }

    #[test]
    fn png_round_trip_keeps_alpha() {
        let mut rgba = image::RgbaImage::new(8, 8);
        for (x, y, px) in rgba.enumerate_pixels_mut() {
            *px = image::Rgba([x as u8 * 30, y as u8 * 30, 7, (x * y) as u8]);
        }
        let source = DynamicImage::ImageRgba8(rgba);
        let bytes = convert(
            source.clone(),
            ConversionRequest::new(TargetFormat::Png, Quality::default()),
        );
        assert_eq!(decode_bytes(&bytes).unwrap().to_rgba8(), source.to_rgba8());
    }

    #[test]
    fn png_output_ignores_quality() {
        let low = convert(
            gradient(20, 20),
            ConversionRequest::new(TargetFormat::Png, Quality::new(1)),
        );
        let high = convert(
            gradient(20, 20),
            ConversionRequest::new(TargetFormat::Png, Quality::new(100)),
        );
        assert_eq!(low, high);
    }

    #[test]
    fn ico_output_ignores_quality() {
        let low = convert(
            gradient(20, 40),
            ConversionRequest::new(TargetFormat::Ico, Quality::new(1)),
        );
        let high = convert(
            gradient(20, 40),
            ConversionRequest::new(TargetFormat::Ico, Quality::new(100)),
        );
        assert_eq!(low, high);
    }

    #[test]
    fn jpeg_quality_changes_output_size() {
        let low = convert(
            gradient(128, 128),
            ConversionRequest::new(TargetFormat::Jpg, Quality::new(5)),
        );
        let high = convert(
            gradient(128, 128),
            ConversionRequest::new(TargetFormat::Jpg, Quality::new(100)),
        );
        assert!(low.len() < high.len());
    }

    #[test]
    fn out_of_range_quality_reaches_encoders_clamped() {
        // 300 must not wrap to 300 as u8 == 44.
        let over = convert(
            gradient(128, 128),
            ConversionRequest::new(TargetFormat::Jpg, Quality::new(300)),
        );
        let max = convert(
            gradient(128, 128),
            ConversionRequest::new(TargetFormat::Jpg, Quality::new(100)),
        );
        let wrapped = convert(
            gradient(128, 128),
            ConversionRequest::new(TargetFormat::Jpg, Quality::new(44)),
        );
        assert_eq!(over, max);
        assert_ne!(over, wrapped);

        for q in [0, 300] {
            let request = ConversionRequest::new(TargetFormat::Webp, Quality::new(q));
            let bytes = encode_bitmap(&Bitmap::new(gradient(32, 32)), &request).unwrap();
            assert_eq!(&bytes[8..12], b"WEBP", "quality {q}");
        }
    }

    #[test]
    fn ico_is_always_256_square() {
        for (w, h) in [(10, 300), (640, 480), (1, 1), (300, 10)] {
            let bytes = convert(
                gradient(w, h),
                ConversionRequest::new(TargetFormat::Ico, Quality::default()),
            );
            let decoded = decode_bytes(&bytes).unwrap();
            assert_eq!(
                (decoded.width(), decoded.height()),
                (256, 256),
                "source {w}x{h}"
            );
        }
    }

    #[test]
    fn ico_payload_mode_writes_png_bytes() {
        let bytes = convert(
            gradient(16, 16),
            ConversionRequest::new(TargetFormat::Ico, Quality::default()),
        );
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn ico_container_mode_writes_icon_directory() {
        let bytes = convert(
            gradient(16, 16),
            ConversionRequest::new(TargetFormat::Ico, Quality::default())
                .with_ico_mode(IcoMode::Container),
        );
        // ICONDIR: reserved 0, type 1 (icon), one entry
        assert_eq!(&bytes[..6], &[0, 0, 1, 0, 1, 0]);
        let decoded = decode_bytes(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (256, 256));
    }

    #[test]
    fn png_input_can_become_any_format() {
        let backend = RustBackend::new();
        let source = SelectedImage::from_raw(RawFile::new(
            "in.png",
            "image/png",
            png_bytes(24, 12),
        ));
        let bitmap = backend.decode(&source).unwrap();
        for format in TargetFormat::all() {
            let bytes = backend
                .encode(&bitmap, &ConversionRequest::new(format, Quality::new(75)), "in.png")
                .unwrap();
            assert!(!bytes.is_empty(), "{format} produced no bytes");
        }
    }
}
