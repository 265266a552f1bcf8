//! CLI output formatting for every command.
//!
//! # Information-First Display
//!
//! Each image is shown by its positional index and original file name, with
//! details (dimensions, planned canvas, failure message) as indented context
//! lines. The same two-level shape is used from intake to export so a user
//! can follow one image through the whole run.
//!
//! # Output Format
//!
//! ## Intake
//!
//! ```text
//! Images (2 accepted)
//! 001 dawn.jpg
//!     1200x800
//! 002 harbour.png
//!     640x960
//! Some images were not added: 1 exceeded 15MB size limit.
//!     huge.tiff: 18874368 bytes exceeds the 15MB size limit
//! ```
//!
//! ## Batch
//!
//! ```text
//! [1/2] dawn.jpg
//!     done
//! [2/2] harbour.png
//!     error: The AI finished successfully but did not return an image.
//! Expanded 1 of 2 images (1 failed)
//! ```
//!
//! ## Check
//!
//! ```text
//! Plan at 16:9
//! 001 dawn.jpg
//!     1200x800 → 1422x800 (offset 111, 0)
//! 002 wide.png
//!     Image already has the selected aspect ratio.
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure —
//! no I/O, no side effects.

use crate::batch::{BatchEvent, BatchOutcome};
use crate::export::ExportReport;
use crate::imaging::calculate_expansion;
use crate::intake::{AcceptedFile, IntakeLimits, IntakeReport};
use crate::jobs::JobQueue;
use crate::types::{ASPECT_RATIO_PRESETS, is_preset};
use std::path::{Path, PathBuf};

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

// ============================================================================
// Intake
// ============================================================================

/// Accepted images with their dimensions, then the rejection banner.
pub fn format_intake(report: &IntakeReport, limits: &IntakeLimits) -> Vec<String> {
    let mut lines = vec![format!("Images ({} accepted)", report.accepted.len())];
    for (i, file) in report.accepted.iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), file.source.name));
        lines.push(format!(
            "{}{}x{}",
            indent(1),
            file.image.width(),
            file.image.height()
        ));
    }
    if let Some(summary) = report.summary(limits) {
        lines.push(summary);
        for rejection in &report.rejected {
            lines.push(format!("{}{}", indent(1), rejection));
        }
    }
    lines
}

pub fn print_intake(report: &IntakeReport, limits: &IntakeLimits) {
    print_lines(format_intake(report, limits));
}

// ============================================================================
// Check: geometry plan without model calls
// ============================================================================

pub fn format_check_plan(files: &[AcceptedFile], ratio: &str, max_dimension: u32) -> Vec<String> {
    let mut lines = vec![format!("Plan at {}", ratio)];
    for (i, file) in files.iter().enumerate() {
        let (w, h) = (file.image.width(), file.image.height());
        lines.push(format!("{} {}", format_index(i + 1), file.source.name));
        let detail = match calculate_expansion((w, h), ratio, max_dimension) {
            Ok(g) => format!(
                "{}x{} → {}x{} (offset {}, {})",
                w, h, g.width, g.height, g.offset_x, g.offset_y
            ),
            Err(e) => e.to_string(),
        };
        lines.push(format!("{}{}", indent(1), detail));
    }
    lines
}

pub fn print_check_plan(files: &[AcceptedFile], ratio: &str, max_dimension: u32) {
    print_lines(format_check_plan(files, ratio, max_dimension));
}

// ============================================================================
// Batch progress
// ============================================================================

/// Format a single batch progress event as display lines.
pub fn format_batch_event(event: &BatchEvent) -> Vec<String> {
    match event {
        BatchEvent::Started {
            name, index, total, ..
        } => vec![format!("[{}/{}] {}", index + 1, total, name)],
        BatchEvent::Finished { .. } => vec![format!("{}done", indent(1))],
        BatchEvent::Failed { message, .. } => vec![format!("{}error: {}", indent(1), message)],
        BatchEvent::Discarded { .. } => vec![format!("{}removed, result discarded", indent(1))],
    }
}

pub fn format_batch_outcome(outcome: &BatchOutcome) -> Vec<String> {
    match outcome {
        BatchOutcome::Completed(summary) => {
            let mut line = format!(
                "Expanded {} of {}",
                summary.succeeded,
                plural(summary.attempted, "image")
            );
            if summary.failed > 0 {
                line.push_str(&format!(" ({} failed)", summary.failed));
            }
            if summary.discarded > 0 {
                line.push_str(&format!(" ({} discarded)", summary.discarded));
            }
            vec![line]
        }
        BatchOutcome::AlreadyRunning => vec!["A batch is already running".to_string()],
        BatchOutcome::NothingQueued => vec!["No images queued for expansion".to_string()],
        BatchOutcome::NotEligible => vec!["Image is not queued or failed".to_string()],
    }
}

pub fn print_batch_outcome(outcome: &BatchOutcome) {
    print_lines(format_batch_outcome(outcome));
}

/// Every job with its status; failures carry their message.
pub fn format_job_table(queue: &JobQueue) -> Vec<String> {
    let counts = queue.counts();
    let mut lines = vec![format!(
        "Jobs ({} done, {} error, {} queued)",
        counts.done, counts.error, counts.queued
    )];
    for (i, job) in queue.jobs().iter().enumerate() {
        lines.push(format!("{} {} [{}]", format_index(i + 1), job.name(), job.status()));
        if let Some(message) = job.error() {
            lines.push(format!("{}{}", indent(1), message));
        }
    }
    if let Some(notice) = queue.notice() {
        lines.push(notice.to_string());
    }
    lines
}

pub fn print_job_table(queue: &JobQueue) {
    print_lines(format_job_table(queue));
}

// ============================================================================
// Export
// ============================================================================

pub fn format_archive_written(path: &Path, report: &ExportReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Wrote {} → {}",
        plural(report.written.len(), "image"),
        path.display()
    )];
    for name in &report.written {
        lines.push(format!("{}{}", indent(1), name));
    }
    lines.extend(format_skipped(report));
    lines
}

pub fn format_files_written(paths: &[PathBuf], report: &ExportReport) -> Vec<String> {
    let mut lines = vec![format!("Wrote {}", plural(paths.len(), "image"))];
    for path in paths {
        lines.push(format!("{}{}", indent(1), path.display()));
    }
    lines.extend(format_skipped(report));
    lines
}

fn format_skipped(report: &ExportReport) -> Vec<String> {
    report
        .skipped
        .iter()
        .map(|s| format!("Skipped {}: {}", s.name, s.reason))
        .collect()
}

// ============================================================================
// Ratios
// ============================================================================

/// Preset list, marking the configured default.
pub fn format_ratios(default_ratio: &str) -> Vec<String> {
    let mut lines: Vec<String> = ASPECT_RATIO_PRESETS
        .iter()
        .map(|r| {
            if *r == default_ratio {
                format!("{} (default)", r)
            } else {
                r.to_string()
            }
        })
        .collect();
    if !is_preset(default_ratio) {
        lines.push(format!("{} (default, custom)", default_ratio));
    }
    lines
}

pub fn print_ratios(default_ratio: &str) {
    print_lines(format_ratios(default_ratio));
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchSummary;
    use crate::export::SkippedExport;
    use crate::intake::IntakeError;
    use crate::jobs::JobUpdate;
    use crate::test_helpers::accepted_file;
    use uuid::Uuid;

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn format_index_pads_to_three_digits() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(1000), "1000");
    }

    #[test]
    fn plural_handles_one() {
        assert_eq!(plural(1, "image"), "1 image");
        assert_eq!(plural(0, "image"), "0 images");
    }

    // =========================================================================
    // Intake
    // =========================================================================

    #[test]
    fn intake_lists_accepted_then_banner() {
        let report = IntakeReport {
            accepted: vec![accepted_file("dawn.jpg", 12, 8)],
            rejected: vec![IntakeError::Unreadable {
                name: "notes.txt".into(),
                reason: "unknown format".into(),
            }],
        };
        let lines = format_intake(&report, &IntakeLimits::default());
        assert_eq!(
            lines,
            vec![
                "Images (1 accepted)",
                "001 dawn.jpg",
                "    12x8",
                "Some images were not added: 1 could not be read.",
                "    notes.txt: could not be read (unknown format)",
            ]
        );
    }

    #[test]
    fn intake_without_rejections_has_no_banner() {
        let report = IntakeReport {
            accepted: vec![accepted_file("a.png", 2, 2)],
            rejected: vec![],
        };
        let lines = format_intake(&report, &IntakeLimits::default());
        assert_eq!(lines.len(), 3);
    }

    // =========================================================================
    // Check
    // =========================================================================

    #[test]
    fn check_plan_shows_geometry_or_reason() {
        let files = vec![accepted_file("sq.png", 100, 100), accepted_file("wide.png", 160, 90)];
        let lines = format_check_plan(&files, "16:9", 5000);
        assert_eq!(lines[0], "Plan at 16:9");
        assert_eq!(lines[2], "    100x100 → 178x100 (offset 39, 0)");
        assert_eq!(lines[4], "    Image already has the selected aspect ratio.");
    }

    // =========================================================================
    // Batch
    // =========================================================================

    #[test]
    fn batch_events_render_progress() {
        let id = Uuid::new_v4();
        assert_eq!(
            format_batch_event(&BatchEvent::Started {
                id,
                name: "dawn.jpg".into(),
                index: 0,
                total: 3
            }),
            vec!["[1/3] dawn.jpg"]
        );
        assert_eq!(
            format_batch_event(&BatchEvent::Failed {
                id,
                name: "dawn.jpg".into(),
                message: "boom".into()
            }),
            vec!["    error: boom"]
        );
    }

    #[test]
    fn batch_outcome_summarises() {
        let outcome = BatchOutcome::Completed(BatchSummary {
            attempted: 3,
            succeeded: 2,
            failed: 1,
            discarded: 0,
        });
        assert_eq!(
            format_batch_outcome(&outcome),
            vec!["Expanded 2 of 3 images (1 failed)"]
        );
        assert_eq!(
            format_batch_outcome(&BatchOutcome::NothingQueued),
            vec!["No images queued for expansion"]
        );
    }

    #[test]
    fn job_table_shows_errors_and_notice() {
        let mut queue = JobQueue::new();
        let ids = queue.enqueue(vec![accepted_file("a.png", 2, 2), accepted_file("b.png", 2, 2)]);
        queue.update_status(ids[1], JobUpdate::Processing).unwrap();
        queue
            .update_status(ids[1], JobUpdate::Failed("nope".into()))
            .unwrap();
        queue.set_notice(Some("No images were successfully converted to download.".into()));

        let lines = format_job_table(&queue);
        assert_eq!(
            lines,
            vec![
                "Jobs (0 done, 1 error, 1 queued)",
                "001 a.png [queued]",
                "002 b.png [error]",
                "    nope",
                "No images were successfully converted to download.",
            ]
        );
    }

    // =========================================================================
    // Export / ratios
    // =========================================================================

    #[test]
    fn archive_written_lists_entries_and_skips() {
        let report = ExportReport {
            written: vec!["a-expanded.png".into()],
            skipped: vec![SkippedExport {
                name: "b.png".into(),
                reason: "bad".into(),
            }],
        };
        let lines = format_archive_written(Path::new("out/expanded-images.zip"), &report);
        assert_eq!(
            lines,
            vec![
                "Wrote 1 image → out/expanded-images.zip",
                "    a-expanded.png",
                "Skipped b.png: bad",
            ]
        );
    }

    #[test]
    fn ratios_mark_default() {
        let lines = format_ratios("16:9");
        assert_eq!(lines.len(), 9);
        assert_eq!(lines[8], "16:9 (default)");
        assert_eq!(lines[0], "1:1");
    }

    #[test]
    fn custom_default_ratio_is_appended() {
        let lines = format_ratios("2.39:1");
        assert_eq!(lines.len(), 10);
        assert_eq!(lines[9], "2.39:1 (default, custom)");
    }
}
