//! Pure calculation functions for canvas expansion.
//!
//! All functions here are pure and testable without any I/O or images.

use crate::types::AspectRatio;
use thiserror::Error;

/// Ratios closer than this to the original are treated as already matching.
pub const RATIO_TOLERANCE: f64 = 0.01;

/// Default ceiling for either side of an expanded canvas, in pixels.
pub const MAX_DIMENSION: u32 = 5000;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Invalid aspect ratio: \"{0}\". Please use positive numbers.")]
    InvalidRatio(String),
    #[error("Image already has the selected aspect ratio.")]
    NoOpExpansion,
    #[error("Expanded image ({width}x{height}) would exceed the {limit}px limit.")]
    DimensionLimitExceeded { width: u32, height: u32, limit: u32 },
}

/// Size of the expanded canvas and where the original sits inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpansionGeometry {
    pub original_width: u32,
    pub original_height: u32,
    pub width: u32,
    pub height: u32,
    /// Left edge of the original inside the canvas.
    pub offset_x: u32,
    /// Top edge of the original inside the canvas.
    pub offset_y: u32,
}

/// Calculate the expanded canvas for `original` at the target `ratio`.
///
/// One side of the original is always kept; the other grows so the canvas
/// matches the ratio. Offsets centre the original and are rounded down.
///
/// # Examples
/// ```
/// # use batch_expand::imaging::calculate_expansion;
/// // 1000x1000 square to 16:9 → 1778x1000, original centred at x=389
/// let g = calculate_expansion((1000, 1000), "16:9", 5000).unwrap();
/// assert_eq!((g.width, g.height), (1778, 1000));
/// assert_eq!((g.offset_x, g.offset_y), (389, 0));
/// ```
pub fn calculate_expansion(
    original: (u32, u32),
    ratio: &str,
    max_dimension: u32,
) -> Result<ExpansionGeometry, GeometryError> {
    let (orig_w, orig_h) = original;
    let target = AspectRatio::parse(ratio)
        .ok_or_else(|| GeometryError::InvalidRatio(ratio.to_string()))?;

    let target_ratio = target.value();
    let original_ratio = orig_w as f64 / orig_h as f64;

    if (target_ratio - original_ratio).abs() < RATIO_TOLERANCE {
        return Err(GeometryError::NoOpExpansion);
    }

    let (width, height) = if target_ratio > original_ratio {
        // Wider target: keep height, grow width
        let h = orig_h;
        let w = (h as f64 * target_ratio).round() as u32;
        (w, h)
    } else {
        // Taller target: keep width, grow height
        let w = orig_w;
        let h = (w as f64 / target_ratio).round() as u32;
        (w, h)
    };

    if width > max_dimension || height > max_dimension {
        return Err(GeometryError::DimensionLimitExceeded {
            width,
            height,
            limit: max_dimension,
        });
    }

    Ok(ExpansionGeometry {
        original_width: orig_w,
        original_height: orig_h,
        width,
        height,
        offset_x: width.saturating_sub(orig_w) / 2,
        offset_y: height.saturating_sub(orig_h) / 2,
    })
}
