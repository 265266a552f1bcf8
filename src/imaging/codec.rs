//! Decoding and encoding on top of the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP, GIF, BMP) | `image::load_from_memory` |
//! | Identify | `ImageReader::into_dimensions` (header only) |
//! | Encode → PNG | `image::codecs::png::PngEncoder` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` (quality from [`EncodeParams`]) |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` (lossless only) |
//!
//! Decoding is the one operation the pipeline awaits: [`decode_image`] moves
//! the work to tokio's blocking pool so the runtime thread stays responsive.

use super::params::EncodeParams;
use crate::types::OutputFormat;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImagingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Failed to encode {format}: {message}")]
    Encode {
        format: &'static str,
        message: String,
    },
}

const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("webp", ImageFormat::WebP),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("gif", ImageFormat::Gif),
    ("bmp", ImageFormat::Bmp),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    PHOTO_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Whether `path` has one of the [`supported_input_extensions`].
pub fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| {
            supported_input_extensions()
                .iter()
                .any(|s| s.eq_ignore_ascii_case(e))
        })
}

/// Media type sniffed from the leading bytes, `application/octet-stream` if unknown.
pub fn media_type(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(|f| f.to_mime_type())
        .unwrap_or("application/octet-stream")
}

/// Read pixel dimensions from the header without decoding pixel data.
pub fn read_dimensions(bytes: &[u8]) -> Result<(u32, u32), ImagingError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_dimensions()
        .map_err(|e| ImagingError::Decode(e.to_string()))
}

/// Decode an in-memory image synchronously.
pub fn decode_bytes(bytes: &[u8]) -> Result<DynamicImage, ImagingError> {
    image::load_from_memory(bytes).map_err(|e| ImagingError::Decode(e.to_string()))
}

/// Decode an in-memory image on the blocking pool.
pub async fn decode_image(bytes: Vec<u8>) -> Result<DynamicImage, ImagingError> {
    tokio::task::spawn_blocking(move || decode_bytes(&bytes))
        .await
        .map_err(|e| ImagingError::Decode(format!("decode task failed: {e}")))?
}

/// Encode as PNG, the lossless format used for transmission and job output.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, ImagingError> {
    let mut buf = Vec::new();
    img.write_with_encoder(PngEncoder::new(&mut buf))
        .map_err(|e| encode_error(OutputFormat::Png, e))?;
    Ok(buf)
}

/// Encode into the requested download format.
pub fn encode(img: &DynamicImage, params: EncodeParams) -> Result<Vec<u8>, ImagingError> {
    let mut buf = Vec::new();
    let result = match params.format {
        OutputFormat::Png => img.write_with_encoder(PngEncoder::new(&mut buf)),
        OutputFormat::Jpg => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(
                &mut buf,
                params.quality.value(),
            ))
        }
        OutputFormat::Webp => {
            let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
            rgba.write_with_encoder(WebPEncoder::new_lossless(&mut buf))
        }
    };
    result.map_err(|e| encode_error(params.format, e))?;
    Ok(buf)
}

fn encode_error(format: OutputFormat, err: image::ImageError) -> ImagingError {
    ImagingError::Encode {
        format: format.extension(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::params::Quality;
    use crate::test_helpers::{gradient_image, png_bytes};

    #[test]
    fn supported_extensions_match_decodable_formats() {
        let exts = supported_input_extensions();
        for expected in &["jpg", "jpeg", "png", "webp", "tif", "tiff"] {
            assert!(
                exts.contains(expected),
                "expected {expected} in supported extensions"
            );
        }
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        assert!(has_supported_extension(Path::new("/a/IMG_001.JPG")));
        assert!(has_supported_extension(Path::new("b.webp")));
        assert!(!has_supported_extension(Path::new("notes.txt")));
        assert!(!has_supported_extension(Path::new("no-extension")));
    }

    #[test]
    fn read_dimensions_from_png_header() {
        let bytes = png_bytes(&gradient_image(64, 48));
        assert_eq!(read_dimensions(&bytes).unwrap(), (64, 48));
    }

    #[test]
    fn read_dimensions_rejects_garbage() {
        assert!(read_dimensions(b"definitely not an image").is_err());
    }

    #[test]
    fn media_type_sniffs_png() {
        let bytes = png_bytes(&gradient_image(4, 4));
        assert_eq!(media_type(&bytes), "image/png");
        assert_eq!(media_type(b"????"), "application/octet-stream");
    }

    #[tokio::test]
    async fn decode_image_async_roundtrip() {
        let bytes = png_bytes(&gradient_image(20, 10));
        let img = decode_image(bytes).await.unwrap();
        assert_eq!((img.width(), img.height()), (20, 10));
    }

    #[tokio::test]
    async fn decode_image_reports_failure() {
        let err = decode_image(vec![0, 1, 2, 3]).await.unwrap_err();
        assert!(matches!(err, ImagingError::Decode(_)));
    }

    #[test]
    fn encode_each_format_produces_that_format() {
        let img = gradient_image(32, 24);
        for (format, expected) in [
            (OutputFormat::Png, ImageFormat::Png),
            (OutputFormat::Jpg, ImageFormat::Jpeg),
            (OutputFormat::Webp, ImageFormat::WebP),
        ] {
            let bytes = encode(
                &img,
                EncodeParams {
                    format,
                    quality: Quality::default(),
                },
            )
            .unwrap();
            assert_eq!(image::guess_format(&bytes).unwrap(), expected);
        }
    }

    #[test]
    fn png_encoding_is_lossless() {
        let img = gradient_image(16, 16);
        let decoded = decode_bytes(&encode_png(&img).unwrap()).unwrap();
        assert_eq!(decoded.to_rgba8(), img.to_rgba8());
    }
}
