//! Image processing — geometry, compositing and codecs.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `ImageReader::into_dimensions` |
//! | **Decode** | `image::load_from_memory` on the blocking pool |
//! | **Mask / composite** | `RgbaImage` drawing + `imageops::resize` (Lanczos3) |
//! | **Encode** | PNG / JPEG / lossless WebP encoders from `image` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for canvas expansion math (unit testable)
//! - **Parameters**: Data structures describing encode operations
//! - **Compositor**: Mask build and final composite over pixel buffers
//! - **Codec**: Decode/encode between bytes and `DynamicImage`

mod calculations;
pub mod codec;
pub mod compositor;
mod params;

pub use calculations::{
    ExpansionGeometry, GeometryError, MAX_DIMENSION, RATIO_TOLERANCE, calculate_expansion,
};
pub use codec::{ImagingError, decode_image, encode, encode_png, media_type};
pub use compositor::{MASK_COLOR, build_mask, composite_final};
pub use params::{EncodeParams, Quality};
