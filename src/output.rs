//! CLI output formatting.
//!
//! # Display
//!
//! Every image is shown by its positional index and display name, with size
//! and type as indented context. Batch lines are prefixed with the batch id
//! so the "converting" line and its outcome can be matched up when several
//! batches share a terminal log.
//!
//! ## Selection (`imgshift list`)
//!
//! ```text
//! Selected 2 images (48.21 KB)
//! 001 cat.png (12.05 KB)
//!     Type: image/png
//! 002 dog.jpg (36.16 KB)
//!     Type: image/jpeg
//! ```
//!
//! ## Conversion events
//!
//! ```text
//! Added 2 images
//! [1f3a9c02] Converting 2 images to WEBP...
//!     cat.webp → converted/cat.webp (9.87 KB)
//!     dog.webp → converted/dog.webp (20.02 KB)
//! [1f3a9c02] Converted 2 images
//! ```
//!
//! ## Usage (`imgshift usage`)
//!
//! ```text
//! Usage today (guest)
//!     Used: 3 of 5
//!     Remaining: 2
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::convert::ConvertEvent;
use crate::selection::SelectionStore;
use crate::usage::Audience;

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

/// Byte count as kilobytes with two decimals, e.g. `12.05 KB`.
pub fn format_kb(bytes: u64) -> String {
    format!("{:.2} KB", bytes as f64 / 1024.0)
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "image" } else { "images" }
}

// ============================================================================
// Selection
// ============================================================================

/// Format the selection as an indexed inventory.
pub fn format_selection(store: &SelectionStore) -> Vec<String> {
    if store.is_empty() {
        return vec!["No images selected".to_string()];
    }
    let mut lines = vec![format!(
        "Selected {} {} ({})",
        store.len(),
        plural(store.len()),
        format_kb(store.total_bytes())
    )];
    for (i, image) in store.iter().enumerate() {
        lines.push(format!(
            "{} {} ({})",
            format_index(i + 1),
            image.display_name(),
            image.size_label()
        ));
        lines.push(format!("{}Type: {}", indent(1), image.content_type()));
    }
    lines
}

pub fn print_selection(store: &SelectionStore) {
    for line in format_selection(store) {
        println!("{}", line);
    }
}

// ============================================================================
// Conversion events
// ============================================================================

/// Format a single store/orchestrator event as display lines.
pub fn format_event(event: &ConvertEvent) -> Vec<String> {
    match event {
        ConvertEvent::FilesAdded { count } => {
            vec![format!("Added {} {}", count, plural(*count))]
        }
        ConvertEvent::NotAnImage => vec!["The selected files are not images".to_string()],
        ConvertEvent::BatchStarted {
            batch,
            count,
            format,
        } => vec![format!(
            "[{}] Converting {} {} to {}...",
            batch,
            count,
            plural(*count),
            format.to_string().to_uppercase()
        )],
        ConvertEvent::ImageSaved {
            name, path, bytes, ..
        } => vec![format!(
            "{}{} → {} ({})",
            indent(1),
            name,
            path.display(),
            format_kb(*bytes as u64)
        )],
        ConvertEvent::BatchSucceeded { batch, count } => {
            vec![format!("[{}] Converted {} {}", batch, count, plural(*count))]
        }
        ConvertEvent::BatchPartial {
            batch,
            converted,
            failed,
        } => {
            let mut lines = vec![format!(
                "[{}] Converted {} {}, {} failed",
                batch,
                converted,
                plural(*converted),
                failed.len()
            )];
            lines.extend(
                failed
                    .iter()
                    .map(|name| format!("{}Failed: {}", indent(1), name)),
            );
            lines
        }
        ConvertEvent::BatchFailed { batch, message } => {
            vec![format!("[{}] {}", batch, message)]
        }
    }
}

pub fn print_event(event: &ConvertEvent) {
    for line in format_event(event) {
        println!("{}", line);
    }
}

// ============================================================================
// Usage
// ============================================================================

/// Format today's usage for one audience.
pub fn format_usage(audience: Audience, used: u32, remaining: u32, limit: u32) -> Vec<String> {
    vec![
        format!("Usage today ({})", audience),
        format!("{}Used: {} of {}", indent(1), used, limit),
        format!("{}Remaining: {}", indent(1), remaining),
    ]
}

pub fn print_usage(audience: Audience, used: u32, remaining: u32, limit: u32) {
    for line in format_usage(audience, used, remaining, limit) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::BatchId;
    use crate::imaging::TargetFormat;
    use crate::test_helpers::raw_png;
    use std::path::PathBuf;

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(1000), "1000");
    }

    #[test]
    fn format_kb_two_decimals() {
        assert_eq!(format_kb(0), "0.00 KB");
        assert_eq!(format_kb(1024), "1.00 KB");
        assert_eq!(format_kb(1536), "1.50 KB");
        assert_eq!(format_kb(100), "0.10 KB");
    }

    // =========================================================================
    // Selection
    // =========================================================================

    #[test]
    fn empty_selection() {
        assert_eq!(
            format_selection(&SelectionStore::new()),
            vec!["No images selected"]
        );
    }

    #[test]
    fn selection_lists_images_in_order() {
        let mut store = SelectionStore::new();
        store
            .add(vec![raw_png("b.png", 2, 2), raw_png("a.png", 2, 2)])
            .unwrap();

        let lines = format_selection(&store);
        assert!(lines[0].starts_with("Selected 2 images ("));
        assert!(lines[1].starts_with("001 b.png ("));
        assert_eq!(lines[2], "    Type: image/png");
        assert!(lines[3].starts_with("002 a.png ("));
        assert_eq!(lines.len(), 5);
    }

    // =========================================================================
    // Events
    // =========================================================================

    #[test]
    fn files_added_singular_and_plural() {
        assert_eq!(
            format_event(&ConvertEvent::FilesAdded { count: 1 }),
            vec!["Added 1 image"]
        );
        assert_eq!(
            format_event(&ConvertEvent::FilesAdded { count: 3 }),
            vec!["Added 3 images"]
        );
    }

    #[test]
    fn batch_lines_carry_batch_id() {
        let batch = BatchId::new();
        let started = format_event(&ConvertEvent::BatchStarted {
            batch,
            count: 2,
            format: TargetFormat::Webp,
        });
        assert_eq!(started, vec![format!("[{batch}] Converting 2 images to WEBP...")]);

        let done = format_event(&ConvertEvent::BatchSucceeded { batch, count: 2 });
        assert_eq!(done, vec![format!("[{batch}] Converted 2 images")]);
    }

    #[test]
    fn image_saved_is_indented() {
        let lines = format_event(&ConvertEvent::ImageSaved {
            batch: BatchId::new(),
            name: "cat.webp".into(),
            path: PathBuf::from("out/cat.webp"),
            bytes: 2048,
        });
        assert_eq!(lines, vec!["    cat.webp → out/cat.webp (2.00 KB)"]);
    }

    #[test]
    fn partial_lists_failures() {
        let batch = BatchId::new();
        let lines = format_event(&ConvertEvent::BatchPartial {
            batch,
            converted: 1,
            failed: vec!["bad.png".into()],
        });
        assert_eq!(
            lines,
            vec![
                format!("[{batch}] Converted 1 image, 1 failed"),
                "    Failed: bad.png".to_string(),
            ]
        );
    }

    #[test]
    fn failed_shows_message_only() {
        let batch = BatchId::new();
        let lines = format_event(&ConvertEvent::BatchFailed {
            batch,
            message: "boom".into(),
        });
        assert_eq!(lines, vec![format!("[{batch}] boom")]);
    }

    // =========================================================================
    // Usage
    // =========================================================================

    #[test]
    fn usage_lines() {
        assert_eq!(
            format_usage(Audience::Guest, 3, 2, 5),
            vec!["Usage today (guest)", "    Used: 3 of 5", "    Remaining: 2"]
        );
    }
}
