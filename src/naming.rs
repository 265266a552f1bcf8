//! Download file names for expanded images.
//!
//! Every exported file is named `<stem><suffix>.<ext>`:
//! - the stem is the upload's file name up to its last `.`;
//! - characters outside `[A-Za-z0-9_.-]` become `_`;
//! - the suffix defaults to `-expanded` and the extension follows the
//!   download format.
//!
//! When the stem comes out empty (`photo`, `.hidden`), archive entries fall
//! back to `image-<index>` and single downloads keep the whole file name:
//! - `Beach Day.jpg` → `Beach_Day-expanded.png`
//! - `.hidden` in an archive at index 3 → `image-3-expanded.png`
//! - `photo` as a single download → `photo-expanded.png`

use crate::types::OutputFormat;
use std::collections::HashSet;

pub const DEFAULT_SUFFIX: &str = "-expanded";

/// Name up to the last `.`, or `None` when that is empty.
pub fn stem(file_name: &str) -> Option<&str> {
    match file_name.rfind('.') {
        Some(0) | None => None,
        Some(dot) => Some(&file_name[..dot]),
    }
}

/// Replace every character outside `[A-Za-z0-9_.-]` with `_`.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Entry name inside the archive for the `index`-th exported image.
pub fn archive_entry_name(file_name: &str, index: usize, suffix: &str, format: OutputFormat) -> String {
    let base = stem(file_name)
        .map(str::to_string)
        .unwrap_or_else(|| format!("image-{index}"));
    format!("{}{suffix}.{}", sanitize(&base), format.extension())
}

/// File name for a single-image download.
pub fn download_name(file_name: &str, suffix: &str, format: OutputFormat) -> String {
    let base = stem(file_name).unwrap_or(file_name);
    format!("{}{suffix}.{}", sanitize(base), format.extension())
}

/// Make `name` unique within `taken` by numbering repeats: `a.png`, `a-2.png`, ...
pub fn unique_name(name: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.clone()) {
        return name;
    }
    let (base, ext) = match name.rfind('.') {
        Some(dot) => (&name[..dot], &name[dot..]),
        None => (name.as_str(), ""),
    };
    let mut n = 2;
    loop {
        let candidate = format!("{base}-{n}{ext}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
