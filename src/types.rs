//! Shared value types: aspect ratio selection and download formats.
//!
//! Both are queue-wide settings (see [`crate::jobs::JobQueue`]) and are read
//! by the batch runner and the export packager respectively.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ratio presets offered by the CLI, in display order.
pub const ASPECT_RATIO_PRESETS: [&str; 9] = [
    "1:1", "2:3", "3:2", "3:4", "4:3", "4:5", "5:4", "9:16", "16:9",
];

/// Ratio selected when nothing else is configured.
pub const DEFAULT_ASPECT_RATIO: &str = "1:1";

/// Whether `ratio` is one of [`ASPECT_RATIO_PRESETS`] (otherwise it is custom).
pub fn is_preset(ratio: &str) -> bool {
    ASPECT_RATIO_PRESETS.contains(&ratio)
}

/// A parsed `W:H` ratio. Both components are positive and finite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AspectRatio {
    pub width: f64,
    pub height: f64,
}

impl AspectRatio {
    /// Parse `"W:H"`. Components are trimmed; anything other than exactly two
    /// positive finite numbers yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split(':');
        let width = parse_component(parts.next()?)?;
        let height = parse_component(parts.next()?)?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self { width, height })
    }

    pub fn value(self) -> f64 {
        self.width / self.height
    }
}

fn parse_component(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().parse().ok()?;
    (value.is_finite() && value > 0.0).then_some(value)
}

/// Raster format applied to every image at export time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpg,
    #[default]
    Png,
    Webp,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(Self::Jpg),
            "png" => Ok(Self::Png),
            "webp" => Ok(Self::Webp),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
