//! # imgshift
//!
//! Local batch image conversion. Pick some images, pick a format (JPEG, PNG,
//! WEBP or ICO) and a quality, and get one converted file per input, with no
//! server involved.
//!
//! # Architecture: Select → Convert → Hand Off
//!
//! ```text
//! 1. Select   files        →  SelectionStore   (filter to image/*, build previews)
//! 2. Convert  selection    →  ConversionResult (decode → encode, one task per image)
//! 3. Hand off results      →  DownloadSink     (transient handle → file on disk)
//! ```
//!
//! A [`session::ConversionSession`] owns the selection and the chosen output
//! settings, and freezes the selection while a batch runs.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`selection`] | Selection store: MIME filtering, data-URI previews, ordered removal |
//! | [`imaging`] | Decoder and encoder behind the `ImageBackend` trait; format/quality types |
//! | [`convert`] | Batch orchestrator: fan-out over rayon, ordered join, all-or-nothing or partial |
//! | [`download`] | Transient handles with revocation, and the download sinks |
//! | [`session`] | `Idle → Converting → Succeeded/Failed` state machine around a batch |
//! | [`naming`] | Output file names: extension stripping and clash numbering |
//! | [`usage`] | Per-day conversion counter for guests and users |
//! | [`config`] | `imgshift.toml` loading, validation, and merging over stock defaults |
//! | [`output`] | CLI output formatting for selections, events, and usage |
//!
//! # Design Decisions
//!
//! ## Uniform Requests
//!
//! One [`imaging::ConversionRequest`] applies to the whole batch. PNG and ICO
//! ignore quality entirely; ICO always stretches to a 256×256 canvas with no
//! aspect-ratio preservation, matching what browser-based converters produce.
//!
//! ## Order Over Completion
//!
//! Images convert concurrently but results are joined by position, so the
//! downloads always follow the selection order.
//!
//! ## One Error Per Batch
//!
//! By default a batch either delivers every image or none, and the user sees
//! a single generic failure message. Individual errors still reach the logs.

pub mod config;
pub mod convert;
pub mod download;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod selection;
pub mod session;
pub mod usage;

#[cfg(test)]
pub(crate) mod test_helpers;
