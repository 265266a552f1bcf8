//! Upload intake: validate files before they become jobs.
//!
//! A file is accepted when it is at most [`IntakeLimits::max_file_bytes`]
//! long, decodes as an image, and neither side exceeds
//! [`IntakeLimits::max_dimension`]. Rejections are not fatal: they are
//! collected in the [`IntakeReport`] and summarised in one line next to
//! whatever was accepted.
//!
//! Directory inputs are walked recursively for files with a supported image
//! extension, in file-name order.

use crate::imaging::codec::{self, has_supported_extension};
use crate::imaging::{ImagingError, MAX_DIMENSION};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

pub const MAX_FILE_SIZE_MB: u64 = 15;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntakeError {
    #[error("{name}: {size} bytes exceeds the {limit_mb}MB size limit")]
    TooLarge { name: String, size: u64, limit_mb: u64 },
    #[error("{name}: {width}x{height} exceeds the {limit}px dimension limit")]
    TooManyPixels {
        name: String,
        width: u32,
        height: u32,
        limit: u32,
    },
    #[error("{name}: could not be read ({reason})")]
    Unreadable { name: String, reason: String },
}

/// Size ceilings applied at intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntakeLimits {
    pub max_file_bytes: u64,
    pub max_dimension: u32,
}

impl IntakeLimits {
    pub fn max_file_mb(&self) -> u64 {
        self.max_file_bytes / (1024 * 1024)
    }
}

impl Default for IntakeLimits {
    fn default() -> Self {
        Self {
            max_file_bytes: MAX_FILE_SIZE_MB * 1024 * 1024,
            max_dimension: MAX_DIMENSION,
        }
    }
}

/// Raw upload: original file name plus its bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// A file that passed validation, with its decoded pixels.
#[derive(Debug)]
pub struct AcceptedFile {
    pub source: SourceFile,
    pub image: DynamicImage,
}

/// Outcome of one intake round.
#[derive(Debug, Default)]
pub struct IntakeReport {
    pub accepted: Vec<AcceptedFile>,
    pub rejected: Vec<IntakeError>,
}

/// Rejection tallies by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RejectionCounts {
    pub oversized: usize,
    pub overdimensioned: usize,
    pub unreadable: usize,
}

impl IntakeReport {
    pub fn counts(&self) -> RejectionCounts {
        let mut counts = RejectionCounts::default();
        for rejection in &self.rejected {
            match rejection {
                IntakeError::TooLarge { .. } => counts.oversized += 1,
                IntakeError::TooManyPixels { .. } => counts.overdimensioned += 1,
                IntakeError::Unreadable { .. } => counts.unreadable += 1,
            }
        }
        counts
    }

    /// One-line banner describing rejections, `None` when everything was accepted.
    pub fn summary(&self, limits: &IntakeLimits) -> Option<String> {
        let counts = self.counts();
        let mut parts = Vec::new();
        if counts.oversized > 0 {
            parts.push(format!(
                "{} exceeded {}MB size limit",
                counts.oversized,
                limits.max_file_mb()
            ));
        }
        if counts.overdimensioned > 0 {
            parts.push(format!(
                "{} exceeded {}px dimension limit",
                counts.overdimensioned, limits.max_dimension
            ));
        }
        if counts.unreadable > 0 {
            parts.push(format!("{} could not be read", counts.unreadable));
        }
        if parts.is_empty() {
            None
        } else {
            Some(format!("Some images were not added: {}.", parts.join(", ")))
        }
    }
}

/// Validate one in-memory upload.
pub async fn validate(source: SourceFile, limits: &IntakeLimits) -> Result<AcceptedFile, IntakeError> {
    let size = source.bytes.len() as u64;
    if size > limits.max_file_bytes {
        return Err(IntakeError::TooLarge {
            name: source.name,
            size,
            limit_mb: limits.max_file_mb(),
        });
    }

    // Header check first so oversized canvases are never fully decoded
    let (width, height) =
        codec::read_dimensions(&source.bytes).map_err(|e| unreadable(&source.name, e))?;
    if width > limits.max_dimension || height > limits.max_dimension {
        return Err(IntakeError::TooManyPixels {
            name: source.name,
            width,
            height,
            limit: limits.max_dimension,
        });
    }

    let image = codec::decode_image(source.bytes.clone())
        .await
        .map_err(|e| unreadable(&source.name, e))?;
    Ok(AcceptedFile { source, image })
}

fn unreadable(name: &str, err: ImagingError) -> IntakeError {
    IntakeError::Unreadable {
        name: name.to_string(),
        reason: err.to_string(),
    }
}

/// Read and validate files from disk, one after another.
pub async fn intake_paths(paths: &[PathBuf], limits: &IntakeLimits) -> IntakeReport {
    let mut report = IntakeReport::default();
    for path in paths {
        let outcome = match read_source(path, limits).await {
            Ok(source) => validate(source, limits).await,
            Err(rejection) => Err(rejection),
        };
        match outcome {
            Ok(accepted) => report.accepted.push(accepted),
            Err(rejection) => report.rejected.push(rejection),
        }
    }
    for rejection in &report.rejected {
        log::debug!("intake rejected {rejection}");
    }
    report
}

async fn read_source(path: &Path, limits: &IntakeLimits) -> Result<SourceFile, IntakeError> {
    let name = display_name(path);
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| unreadable(&name, e.into()))?;
    if meta.len() > limits.max_file_bytes {
        return Err(IntakeError::TooLarge {
            name,
            size: meta.len(),
            limit_mb: limits.max_file_mb(),
        });
    }
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| unreadable(&name, e.into()))?;
    Ok(SourceFile { name, bytes })
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Expand CLI inputs into a flat list of files.
///
/// Files are kept as given (unsupported ones fail later as unreadable);
/// directories contribute every supported image below them.
pub fn collect_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            files.extend(
                WalkDir::new(input)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file() && has_supported_extension(e.path()))
                    .map(|e| e.into_path()),
            );
        } else {
            files.push(input.clone());
        }
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{gradient_image, png_bytes};
    use tempfile::TempDir;

    fn source(name: &str, bytes: Vec<u8>) -> SourceFile {
        SourceFile {
            name: name.to_string(),
            bytes,
        }
    }

    #[tokio::test]
    async fn accepts_valid_image() {
        let bytes = png_bytes(&gradient_image(30, 20));
        let accepted = validate(source("a.png", bytes), &IntakeLimits::default())
            .await
            .unwrap();
        assert_eq!(accepted.source.name, "a.png");
        assert_eq!((accepted.image.width(), accepted.image.height()), (30, 20));
    }

    #[tokio::test]
    async fn rejects_oversized_file() {
        let limits = IntakeLimits {
            max_file_bytes: 10,
            ..IntakeLimits::default()
        };
        let err = validate(source("big.png", vec![0; 11]), &limits)
            .await
            .unwrap_err();
        assert!(matches!(err, IntakeError::TooLarge { size: 11, .. }));
    }

    #[tokio::test]
    async fn rejects_overdimensioned_image() {
        let limits = IntakeLimits {
            max_dimension: 25,
            ..IntakeLimits::default()
        };
        let bytes = png_bytes(&gradient_image(30, 20));
        let err = validate(source("wide.png", bytes), &limits).await.unwrap_err();
        assert_eq!(
            err,
            IntakeError::TooManyPixels {
                name: "wide.png".into(),
                width: 30,
                height: 20,
                limit: 25
            }
        );
    }

    #[tokio::test]
    async fn rejects_unreadable_bytes() {
        let err = validate(source("notes.jpg", b"plain text".to_vec()), &IntakeLimits::default())
            .await
            .unwrap_err();
        assert!(matches!(err, IntakeError::Unreadable { .. }));
    }

    #[test]
    fn summary_lists_only_nonzero_kinds() {
        let report = IntakeReport {
            accepted: Vec::new(),
            rejected: vec![
                IntakeError::TooLarge {
                    name: "a".into(),
                    size: 1,
                    limit_mb: 15,
                },
                IntakeError::Unreadable {
                    name: "b".into(),
                    reason: "x".into(),
                },
                IntakeError::Unreadable {
                    name: "c".into(),
                    reason: "x".into(),
                },
            ],
        };
        assert_eq!(
            report.summary(&IntakeLimits::default()).unwrap(),
            "Some images were not added: 1 exceeded 15MB size limit, 2 could not be read."
        );
        assert_eq!(
            report.counts(),
            RejectionCounts {
                oversized: 1,
                overdimensioned: 0,
                unreadable: 2
            }
        );
    }

    #[test]
    fn summary_is_none_when_clean() {
        assert!(IntakeReport::default()
            .summary(&IntakeLimits::default())
            .is_none());
    }

    #[tokio::test]
    async fn intake_paths_mixes_accepts_and_rejects() {
        let tmp = TempDir::new().unwrap();
        let good = tmp.path().join("good.png");
        let bad = tmp.path().join("bad.png");
        std::fs::write(&good, png_bytes(&gradient_image(8, 8))).unwrap();
        std::fs::write(&bad, b"nope").unwrap();
        let missing = tmp.path().join("missing.png");

        let report = intake_paths(&[good, bad, missing], &IntakeLimits::default()).await;
        assert_eq!(report.accepted.len(), 1);
        assert_eq!(report.accepted[0].source.name, "good.png");
        assert_eq!(report.counts().unreadable, 2);
    }

    #[test]
    fn collect_inputs_walks_directories_in_name_order() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("nested");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(tmp.path().join("b.jpg"), b"").unwrap();
        std::fs::write(tmp.path().join("a.png"), b"").unwrap();
        std::fs::write(tmp.path().join("readme.txt"), b"").unwrap();
        std::fs::write(nested.join("c.webp"), b"").unwrap();

        let files = collect_inputs(&[tmp.path().to_path_buf()]);
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.png", "b.jpg", "c.webp"]);
    }

    #[test]
    fn collect_inputs_keeps_explicit_files() {
        let explicit = PathBuf::from("/does/not/exist.txt");
        assert_eq!(collect_inputs(&[explicit.clone()]), vec![explicit]);
    }
}
