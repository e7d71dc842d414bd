//! Batch conversion: decode → encode every selected image, then hand the
//! results to a download sink.
//!
//! ## Flow
//!
//! ```text
//! selection [A, B, C]
//!   ├─ A: decode → encode ┐
//!   ├─ B: decode → encode ├─ fan-out (rayon), join in input order
//!   └─ C: decode → encode ┘
//!        │
//!   all ok? ── no ──▶ BatchFailed, nothing downloaded
//!        │
//!       yes ─▶ for A, B, C in order: create handle → download → release
//!        │
//!   BatchSucceeded { count }
//! ```
//!
//! Images are independent, so they run concurrently; the join collects by
//! position, so the output order is the input order whatever finishes first.
//!
//! ## Policies
//!
//! [`BatchPolicy::AllOrNothing`] (the default) treats any per-image failure
//! as a failure of the batch: one error, zero downloads.
//! [`BatchPolicy::Partial`] downloads whatever converted and reports the
//! failures alongside.
//!
//! ## Events
//!
//! Progress is reported as [`ConvertEvent`]s on an optional channel. Every
//! batch-level event carries the batch's [`BatchId`] so a listener can
//! replace the "converting…" line with the outcome.

use crate::download::{DownloadSink, TransientStore};
use crate::imaging::{ConversionRequest, ConvertError, ImageBackend, RustBackend, TargetFormat};
use crate::naming;
use crate::selection::{ImageId, SelectedImage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum BatchError {
    /// Aggregate failure: the user sees one generic message, the individual
    /// errors are kept for logs.
    #[error("Failed to convert {} of {total} images", .failed.len())]
    Conversion {
        failed: Vec<ConvertError>,
        total: usize,
    },
    #[error("Failed to save {file_name}: {source}")]
    Download {
        file_name: String,
        #[source]
        source: std::io::Error,
    },
}

/// What to do when some images in a batch fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BatchPolicy {
    #[default]
    AllOrNothing,
    Partial,
}

/// Correlation id shared by every event of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchId(Uuid);

impl BatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is plenty for correlating log lines.
        let s = self.0.simple().to_string();
        f.write_str(&s[..8])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Loading,
    Success,
    Error,
}

/// User-facing notifications emitted by the store and the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum ConvertEvent {
    FilesAdded {
        count: usize,
    },
    NotAnImage,
    BatchStarted {
        batch: BatchId,
        count: usize,
        format: TargetFormat,
    },
    ImageSaved {
        batch: BatchId,
        name: String,
        path: PathBuf,
        bytes: usize,
    },
    BatchSucceeded {
        batch: BatchId,
        count: usize,
    },
    BatchPartial {
        batch: BatchId,
        converted: usize,
        failed: Vec<String>,
    },
    BatchFailed {
        batch: BatchId,
        message: String,
    },
}

impl ConvertEvent {
    pub fn severity(&self) -> Severity {
        match self {
            ConvertEvent::BatchStarted { .. } => Severity::Loading,
            ConvertEvent::FilesAdded { .. }
            | ConvertEvent::ImageSaved { .. }
            | ConvertEvent::BatchSucceeded { .. } => Severity::Success,
            ConvertEvent::NotAnImage
            | ConvertEvent::BatchPartial { .. }
            | ConvertEvent::BatchFailed { .. } => Severity::Error,
        }
    }

    pub fn batch(&self) -> Option<BatchId> {
        match self {
            ConvertEvent::FilesAdded { .. } | ConvertEvent::NotAnImage => None,
            ConvertEvent::BatchStarted { batch, .. }
            | ConvertEvent::ImageSaved { batch, .. }
            | ConvertEvent::BatchSucceeded { batch, .. }
            | ConvertEvent::BatchPartial { batch, .. }
            | ConvertEvent::BatchFailed { batch, .. } => Some(*batch),
        }
    }
}

/// Generic message shown when a batch fails.
pub const BATCH_FAILED_MESSAGE: &str = "An error occurred while converting the images";

/// One converted image, ready for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionResult {
    pub source_id: ImageId,
    pub output_base_name: String,
    pub target_format: TargetFormat,
    pub encoded: Vec<u8>,
}

impl ConversionResult {
    /// Suggested download name: `<base>.<ext>`.
    pub fn file_name(&self) -> String {
        naming::file_name_for(&self.output_base_name, self.target_format)
    }
}

/// Outcome of a batch that ran.
#[derive(Debug)]
pub struct BatchReport {
    pub batch: BatchId,
    pub results: Vec<ConversionResult>,
    /// Where each result ended up, same order as `results`.
    pub saved: Vec<PathBuf>,
    /// Per-image failures; always empty under `AllOrNothing`.
    pub failures: Vec<ConvertError>,
}

/// Collaborators a batch needs besides the backend.
pub struct BatchContext<'a> {
    pub sink: &'a dyn DownloadSink,
    pub transient: &'a TransientStore,
    pub events: Option<&'a Sender<ConvertEvent>>,
    pub policy: BatchPolicy,
}

impl<'a> BatchContext<'a> {
    pub fn new(sink: &'a dyn DownloadSink, transient: &'a TransientStore) -> Self {
        Self {
            sink,
            transient,
            events: None,
            policy: BatchPolicy::default(),
        }
    }

    pub fn with_events(mut self, events: &'a Sender<ConvertEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_policy(mut self, policy: BatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn emit(&self, event: ConvertEvent) {
        if let Some(tx) = self.events {
            let _ = tx.send(event);
        }
    }
}

/// Convert and download a batch with the default [`RustBackend`].
pub fn convert_all(
    images: &[SelectedImage],
    request: &ConversionRequest,
    ctx: &BatchContext<'_>,
) -> Result<Option<BatchReport>, BatchError> {
    convert_all_with_backend(&RustBackend::new(), images, request, ctx)
}

/// Convert and download a batch using a specific backend (allows testing with mock).
///
/// Returns `Ok(None)` without doing anything when `images` is empty.
pub fn convert_all_with_backend(
    backend: &impl ImageBackend,
    images: &[SelectedImage],
    request: &ConversionRequest,
    ctx: &BatchContext<'_>,
) -> Result<Option<BatchReport>, BatchError> {
    if images.is_empty() {
        return Ok(None);
    }

    let batch = BatchId::new();
    let total = images.len();
    info!(
        %batch,
        count = total,
        format = %request.target_format,
        quality = ?request.effective_quality().map(|q| q.value()),
        "converting batch"
    );
    ctx.emit(ConvertEvent::BatchStarted {
        batch,
        count: total,
        format: request.target_format,
    });

    let started = Instant::now();
    let (results, failures): (Vec<_>, Vec<_>) = convert_each(backend, images, request)
        .into_iter()
        .partition(Result::is_ok);
    let results: Vec<ConversionResult> = results.into_iter().filter_map(Result::ok).collect();
    let failures: Vec<ConvertError> = failures.into_iter().filter_map(Result::err).collect();

    for failure in &failures {
        warn!(%batch, error = %failure, "image failed");
    }

    let all_failed = results.is_empty();
    if !failures.is_empty() && (ctx.policy == BatchPolicy::AllOrNothing || all_failed) {
        ctx.emit(ConvertEvent::BatchFailed {
            batch,
            message: BATCH_FAILED_MESSAGE.to_string(),
        });
        return Err(BatchError::Conversion { failed: failures, total });
    }

    let saved = match deliver(batch, &results, ctx) {
        Ok(saved) => saved,
        Err(e) => {
            warn!(%batch, error = %e, "download failed");
            ctx.emit(ConvertEvent::BatchFailed {
                batch,
                message: BATCH_FAILED_MESSAGE.to_string(),
            });
            return Err(e);
        }
    };

    info!(
        %batch,
        converted = results.len(),
        failed = failures.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "batch finished"
    );
    if failures.is_empty() {
        ctx.emit(ConvertEvent::BatchSucceeded {
            batch,
            count: results.len(),
        });
    } else {
        ctx.emit(ConvertEvent::BatchPartial {
            batch,
            converted: results.len(),
            failed: failures.iter().map(|f| f.name().to_string()).collect(),
        });
    }

    Ok(Some(BatchReport {
        batch,
        results,
        saved,
        failures,
    }))
}

/// Fan out decode → encode over every image and join, keeping input order.
pub fn convert_each(
    backend: &impl ImageBackend,
    images: &[SelectedImage],
    request: &ConversionRequest,
) -> Vec<Result<ConversionResult, ConvertError>> {
    images
        .par_iter()
        .map(|image| convert_single(backend, image, request))
        .collect()
}

/// Decode → encode one image.
pub fn convert_single(
    backend: &impl ImageBackend,
    image: &SelectedImage,
    request: &ConversionRequest,
) -> Result<ConversionResult, ConvertError> {
    let started = Instant::now();
    let bitmap = backend.decode(image)?;
    let encoded = backend.encode(&bitmap, request, image.display_name())?;
    debug!(
        name = image.display_name(),
        width = bitmap.dimensions().width,
        height = bitmap.dimensions().height,
        bytes = encoded.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "converted"
    );
    Ok(ConversionResult {
        source_id: image.id(),
        output_base_name: naming::output_base_name(image.display_name()).to_string(),
        target_format: request.target_format,
        encoded,
    })
}

/// Hand each result to the sink in order, releasing its handle right after.
fn deliver(
    batch: BatchId,
    results: &[ConversionResult],
    ctx: &BatchContext<'_>,
) -> Result<Vec<PathBuf>, BatchError> {
    let mut saved = Vec::with_capacity(results.len());
    for result in results {
        let file_name = result.file_name();
        let handle = ctx.transient.create(result.encoded.as_slice());
        let outcome = ctx.sink.download(&handle, &file_name);
        handle.release();
        let path = outcome.map_err(|source| BatchError::Download {
            file_name: file_name.clone(),
            source,
        })?;
        ctx.emit(ConvertEvent::ImageSaved {
            batch,
            name: file_name,
            path: path.clone(),
            bytes: result.encoded.len(),
        });
        saved.push(path);
    }
    Ok(saved)
}
