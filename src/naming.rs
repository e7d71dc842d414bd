//! File name handling for conversion output.
//!
//! Every converted image is offered for download as
//! `<original name without extension>.<target extension>`:
//! - `photo.png` → `photo.webp`
//! - `photo.v1.png` → `photo.v1.webp` (only the last extension goes)
//! - `noext` → `noext.webp`
//! - `.hidden` → `.hidden.webp` (a leading dot is part of the name, not an extension)
//!
//! When the destination already holds a file of that name, the download sink
//! asks [`numbered_file_name`] for `photo (1).webp`, `photo (2).webp`, and so
//! on, the way browsers do.

use crate::imaging::TargetFormat;

/// Strip the extension after the last `.` from a display name.
///
/// A name whose only dot is its first character keeps the dot.
pub fn output_base_name(display_name: &str) -> &str {
    match display_name.rfind('.') {
        Some(pos) if pos > 0 => &display_name[..pos],
        _ => display_name,
    }
}

/// Download name for an already-stripped base name: `photo.v1` → `photo.v1.webp`.
pub fn file_name_for(base_name: &str, format: TargetFormat) -> String {
    format!("{}.{}", base_name, format.extension())
}

/// `photo.webp` + 2 → `photo (2).webp`.
pub fn numbered_file_name(file_name: &str, n: u32) -> String {
    let base = output_base_name(file_name);
    match file_name.get(base.len()..) {
        Some(ext) if !ext.is_empty() => format!("{} ({}){}", base, n, ext),
        _ => format!("{} ({})", file_name, n),
    }
}
