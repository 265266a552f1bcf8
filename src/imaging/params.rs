//! Parameter types for encoding operations.
//!
//! These structs describe *what* to produce, not *how*. The export packager
//! builds them from config; [`codec`](super::codec) does the byte work.
//!
//! - [`Quality`] — Lossy encoding quality (1–100, default 95). Clamped on construction.
//! - [`EncodeParams`] — Target format plus quality for one re-encode.

use crate::types::OutputFormat;

/// Quality setting for lossy image encoding (1-100).
///
/// Only JPEG output is lossy; PNG and WebP are written losslessly and ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u8);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(95)
    }
}

/// Parameters for re-encoding a finished image for download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncodeParams {
    pub format: OutputFormat,
    pub quality: Quality,
}
