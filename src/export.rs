//! Export packaging: re-encode finished jobs and bundle them for download.
//!
//! Completed jobs hold lossless PNG output. Export converts each one into the
//! queue's download format, names it (see [`crate::naming`]) and either
//! writes everything into one zip archive ([`package`]) or hands back
//! standalone files ([`export_single`], [`export_separate`]).
//!
//! ## Crate mapping
//!
//! | Step | Crate / function |
//! |---|---|
//! | Re-encode | [`imaging::encode`](crate::imaging::encode) in parallel via `rayon::par_iter` |
//! | Archive | `zip::ZipWriter` over an in-memory `Cursor`, deflate compressed |
//!
//! Conversion runs on the rayon pool and never touches the job queue; entries
//! are then written to the archive sequentially in queue order. An image
//! that fails to convert is skipped with a warning. An export that ends up
//! with no files at all is an error.

use crate::imaging::codec::decode_bytes;
use crate::imaging::{EncodeParams, ImagingError, Quality, encode};
use crate::jobs::CompletedJob;
use crate::naming::{self, DEFAULT_SUFFIX};
use crate::types::OutputFormat;
use rayon::prelude::*;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use thiserror::Error;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const DEFAULT_ARCHIVE_NAME: &str = "expanded-images.zip";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("No images were successfully converted to download.")]
    NothingToExport,
    #[error(transparent)]
    Imaging(#[from] ImagingError),
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportSettings {
    /// JPEG quality. PNG and WebP output is lossless.
    pub quality: Quality,
    /// Appended to the stem of every exported file.
    pub suffix: String,
    pub archive_name: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            quality: Quality::default(),
            suffix: DEFAULT_SUFFIX.to_string(),
            archive_name: DEFAULT_ARCHIVE_NAME.to_string(),
        }
    }
}

/// One downloadable file.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// A job that could not be converted.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedExport {
    /// Original upload name.
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportReport {
    /// File names written, in queue order.
    pub written: Vec<String>,
    pub skipped: Vec<SkippedExport>,
}

/// A finished zip archive, ready to save.
#[derive(Debug)]
pub struct Archive {
    pub name: String,
    pub bytes: Vec<u8>,
    pub report: ExportReport,
}

/// Decode a job's PNG output and encode it in the download format.
pub fn convert(png: &[u8], params: EncodeParams) -> Result<Vec<u8>, ImagingError> {
    encode(&decode_bytes(png)?, params)
}

fn params_for(format: OutputFormat, settings: &ExportSettings) -> EncodeParams {
    EncodeParams {
        format,
        quality: settings.quality,
    }
}

/// Convert jobs in parallel, keeping queue order in the result.
fn convert_all(
    completed: &[CompletedJob],
    params: EncodeParams,
) -> Vec<Result<Vec<u8>, ImagingError>> {
    completed
        .par_iter()
        .map(|job| convert(&job.image, params))
        .collect()
}

fn skip(job: &CompletedJob, err: ImagingError, report: &mut ExportReport) {
    log::warn!("failed to convert {} for download: {err}", job.name);
    report.skipped.push(SkippedExport {
        name: job.name.clone(),
        reason: err.to_string(),
    });
}

/// Bundle every completed job into one zip archive.
pub fn package(
    completed: &[CompletedJob],
    format: OutputFormat,
    settings: &ExportSettings,
) -> Result<Archive, ExportError> {
    let converted = convert_all(completed, params_for(format, settings));

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut report = ExportReport::default();
    let mut taken = HashSet::new();

    for (index, (job, result)) in completed.iter().zip(converted).enumerate() {
        let bytes = match result {
            Ok(bytes) => bytes,
            Err(e) => {
                skip(job, e, &mut report);
                continue;
            }
        };
        let entry_name = naming::unique_name(
            naming::archive_entry_name(&job.name, index, &settings.suffix, format),
            &mut taken,
        );
        zip.start_file(entry_name.as_str(), options)?;
        zip.write_all(&bytes)?;
        report.written.push(entry_name);
    }

    if report.written.is_empty() {
        return Err(ExportError::NothingToExport);
    }

    let bytes = zip.finish()?.into_inner();
    Ok(Archive {
        name: settings.archive_name.clone(),
        bytes,
        report,
    })
}

/// Convert one completed job for a standalone download.
pub fn export_single(
    job: &CompletedJob,
    format: OutputFormat,
    settings: &ExportSettings,
) -> Result<ExportEntry, ExportError> {
    let bytes = convert(&job.image, params_for(format, settings))?;
    Ok(ExportEntry {
        name: naming::download_name(&job.name, &settings.suffix, format),
        bytes,
    })
}

/// Convert every completed job into its own file, names made unique.
pub fn export_separate(
    completed: &[CompletedJob],
    format: OutputFormat,
    settings: &ExportSettings,
) -> Result<(Vec<ExportEntry>, ExportReport), ExportError> {
    let converted = convert_all(completed, params_for(format, settings));
    let mut report = ExportReport::default();
    let mut taken = HashSet::new();
    let mut entries = Vec::new();

    for (job, result) in completed.iter().zip(converted) {
        match result {
            Ok(bytes) => {
                let name = naming::unique_name(
                    naming::download_name(&job.name, &settings.suffix, format),
                    &mut taken,
                );
                report.written.push(name.clone());
                entries.push(ExportEntry { name, bytes });
            }
            Err(e) => skip(job, e, &mut report),
        }
    }

    if entries.is_empty() {
        return Err(ExportError::NothingToExport);
    }
    Ok((entries, report))
}
