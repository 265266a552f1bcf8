//! One job, start to finish: geometry → mask → model → composite.
//!
//! ```text
//! original ──► calculate_expansion ──► build_mask ──► PNG ──► ImageExpander
//!                                                                  │
//!           PNG ◄── composite_final(original on top) ◄── decode ◄──┘
//! ```
//!
//! The model only ever sees the masked canvas; the final image always
//! carries the original pixels verbatim at the computed offset, so any
//! softening the model applied to the subject is discarded.

use crate::imaging::{
    self, ExpansionGeometry, GeometryError, ImagingError, build_mask, calculate_expansion,
    composite_final, decode_image, media_type,
};
use crate::service::{ExpandRequest, ImageExpander, ServiceError};
use image::DynamicImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Imaging(#[from] ImagingError),
    #[error("Could not load the generated image from AI.")]
    GeneratedUnreadable,
}

/// Expand `original` to `ratio` and return the composited PNG.
pub async fn expand_image(
    expander: &dyn ImageExpander,
    original: &DynamicImage,
    ratio: &str,
    max_dimension: u32,
    prompt: &str,
) -> Result<Vec<u8>, PipelineError> {
    let geometry = calculate_expansion((original.width(), original.height()), ratio, max_dimension)?;
    let masked = masked_canvas(original, &geometry)?;

    let request = ExpandRequest {
        image: &masked,
        mime_type: media_type(&masked),
        prompt,
    };
    let generated = expander.expand(&request).await?;
    let generated = decode_image(generated)
        .await
        .map_err(|_| PipelineError::GeneratedUnreadable)?;

    let composed = composite_final(&generated, original, &geometry);
    Ok(imaging::encode_png(&DynamicImage::ImageRgba8(composed))?)
}

/// Encoded request canvas: magenta everywhere except the original.
pub fn masked_canvas(
    original: &DynamicImage,
    geometry: &ExpansionGeometry,
) -> Result<Vec<u8>, ImagingError> {
    imaging::encode_png(&DynamicImage::ImageRgba8(build_mask(original, geometry)))
}
