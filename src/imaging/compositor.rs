//! Canvas compositing for expansion requests and results.
//!
//! Two steps, both pure over `image` buffers:
//!
//! 1. [`build_mask`] — fill the expanded canvas with [`MASK_COLOR`] and draw
//!    the original at the computed offset. The model repaints the magenta
//!    border; no alpha channel support is needed on its side.
//! 2. [`composite_final`] — stretch the model's image over the whole canvas,
//!    then draw the original on top again. Opaque original pixels are copied
//!    exactly, so the subject region never carries model artifacts no matter
//!    what resolution the model returned.

use super::calculations::ExpansionGeometry;
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};

/// Sentinel color marking the region the model must fill (`#FF00FF`).
pub const MASK_COLOR: Rgba<u8> = Rgba([255, 0, 255, 255]);

/// Build the masked request canvas.
pub fn build_mask(original: &DynamicImage, geometry: &ExpansionGeometry) -> RgbaImage {
    let mut surface = RgbaImage::from_pixel(geometry.width, geometry.height, MASK_COLOR);
    paste_original(&mut surface, original, geometry);
    surface
}

/// Composite the model's result with the original at full resolution.
pub fn composite_final(
    generated: &DynamicImage,
    original: &DynamicImage,
    geometry: &ExpansionGeometry,
) -> RgbaImage {
    let generated = generated.to_rgba8();
    let mut surface = if generated.dimensions() == (geometry.width, geometry.height) {
        generated
    } else {
        imageops::resize(&generated, geometry.width, geometry.height, FilterType::Lanczos3)
    };
    paste_original(&mut surface, original, geometry);
    surface
}

/// Source-over `original` at the geometry offset. Opaque pixels land verbatim.
fn paste_original(surface: &mut RgbaImage, original: &DynamicImage, geometry: &ExpansionGeometry) {
    imageops::overlay(
        surface,
        &original.to_rgba8(),
        i64::from(geometry.offset_x),
        i64::from(geometry.offset_y),
    );
}
