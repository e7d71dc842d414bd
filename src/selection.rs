//! The selection store: images waiting to be converted.
//!
//! Files arrive as [`RawFile`]s (name, declared content type, bytes). Only
//! files whose content type starts with `image/` are accepted; each accepted
//! file becomes a [`SelectedImage`] holding a base64 data-URI preview that
//! the decoder later reads from.
//!
//! ## Identity
//!
//! The store is an ordered list. Position drives display and
//! [`SelectionStore::remove`], which shifts later entries down by one, so an
//! index is only meaningful until the next removal. Each image also carries
//! a stable [`ImageId`] assigned at creation; [`SelectionStore::remove_by_id`]
//! is the safe choice for callers that may act on stale positions.
//!
//! ## Previews
//!
//! Building previews is independent per file, so `add` fans the work out
//! over rayon and joins before appending. Input order is preserved.

use crate::convert::ConvertEvent;
use crate::imaging::data_uri;
use rayon::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;
use walkdir::WalkDir;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("None of the selected files is an image")]
    NoImageSelected,
}

/// Content type reported for files whose extension is not recognised.
pub const UNKNOWN_CONTENT_TYPE: &str = "application/octet-stream";

/// A user-supplied file before filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl RawFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, declaring its content type from the extension.
    ///
    /// Only `image/*` files are read. Anything else is checked for existence
    /// and kept with no bytes so the selection can still reject it.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let content_type = content_type_for(path);
        let bytes = if content_type.starts_with("image/") {
            std::fs::read(path)?
        } else {
            std::fs::metadata(path)?;
            Vec::new()
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, content_type, bytes))
    }

    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Declared content type for a path, by extension.
///
/// Extensions the `image` crate knows map to its MIME types, whether or not
/// a decoder is compiled in; a few common image types it does not know
/// (HEIF, SVG) are still declared as images so they reach the decoder and
/// fail there with a per-file error.
pub fn content_type_for(path: &Path) -> String {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return UNKNOWN_CONTENT_TYPE.to_string();
    };
    if let Some(format) = image::ImageFormat::from_extension(ext) {
        return format.to_mime_type().to_string();
    }
    match ext.to_ascii_lowercase().as_str() {
        "heic" | "heif" => "image/heif",
        "svg" => "image/svg+xml",
        "txt" | "md" => "text/plain",
        "pdf" => "application/pdf",
        "json" => "application/json",
        _ => UNKNOWN_CONTENT_TYPE,
    }
    .to_string()
}

/// Expand command-line paths into files, in the order given.
///
/// Directories contribute their files sorted by name: direct children only,
/// or the whole tree when `recursive` is set. Content types are declared by
/// extension and only image files are loaded; filtering is left to
/// [`SelectionStore::add`].
pub fn files_from_paths(paths: &[PathBuf], recursive: bool) -> std::io::Result<Vec<RawFile>> {
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            files.push(RawFile::from_path(path)?);
            continue;
        }
        let max_depth = if recursive { usize::MAX } else { 1 };
        for entry in WalkDir::new(path)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
        {
            let entry = entry.map_err(std::io::Error::from)?;
            if entry.file_type().is_file() {
                files.push(RawFile::from_path(entry.path())?);
            }
        }
    }
    debug!(paths = paths.len(), files = files.len(), recursive, "paths expanded");
    Ok(files)
}

/// Stable identifier of a selected image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageId(Uuid);

impl ImageId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// One accepted image pending conversion. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct SelectedImage {
    id: ImageId,
    source: RawFile,
    preview_data_uri: String,
}

impl SelectedImage {
    /// Build the preview for an accepted file.
    pub fn from_raw(source: RawFile) -> Self {
        let preview_data_uri = data_uri::encode(&source.content_type, &source.bytes);
        Self {
            id: ImageId::new(),
            source,
            preview_data_uri,
        }
    }

    pub fn id(&self) -> ImageId {
        self.id
    }

    pub fn display_name(&self) -> &str {
        &self.source.name
    }

    pub fn content_type(&self) -> &str {
        &self.source.content_type
    }

    pub fn byte_size(&self) -> u64 {
        self.source.size()
    }

    pub fn preview_data_uri(&self) -> &str {
        &self.preview_data_uri
    }

    /// Size for display, e.g. `12.50 KB`.
    pub fn size_label(&self) -> String {
        crate::output::format_kb(self.byte_size())
    }
}

/// Ordered list of selected images.
#[derive(Debug, Default)]
pub struct SelectionStore {
    images: Vec<SelectedImage>,
    events: Option<Sender<ConvertEvent>>,
}

impl SelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `FilesAdded` / `NotAnImage` on this channel.
    pub fn with_events(events: Sender<ConvertEvent>) -> Self {
        Self {
            images: Vec::new(),
            events: Some(events),
        }
    }

    /// Accept the image files among `files` and append them in order.
    ///
    /// Returns how many were added. Non-image files are dropped silently as
    /// long as at least one image remains; if none does, nothing is added.
    pub fn add(&mut self, files: Vec<RawFile>) -> Result<usize, SelectionError> {
        let offered = files.len();
        let accepted: Vec<RawFile> = files.into_iter().filter(RawFile::is_image).collect();

        if accepted.is_empty() {
            warn!(offered, "no image files among selection");
            self.emit(ConvertEvent::NotAnImage);
            return Err(SelectionError::NoImageSelected);
        }

        let added: Vec<SelectedImage> = accepted
            .into_par_iter()
            .map(SelectedImage::from_raw)
            .collect();
        let count = added.len();
        debug!(
            offered,
            accepted = count,
            total = self.images.len() + count,
            "selection extended"
        );
        self.images.extend(added);
        self.emit(ConvertEvent::FilesAdded { count });
        Ok(count)
    }

    /// Remove the image at `index`; later images shift down by one.
    pub fn remove(&mut self, index: usize) -> Option<SelectedImage> {
        (index < self.images.len()).then(|| self.images.remove(index))
    }

    /// Remove the image with the given id, wherever it currently sits.
    pub fn remove_by_id(&mut self, id: ImageId) -> Option<SelectedImage> {
        let index = self.position(id)?;
        Some(self.images.remove(index))
    }

    pub fn clear(&mut self) {
        self.images.clear();
    }

    /// Current position of an image, resolved at call time.
    pub fn position(&self, id: ImageId) -> Option<usize> {
        self.images.iter().position(|img| img.id() == id)
    }

    pub fn get(&self, index: usize) -> Option<&SelectedImage> {
        self.images.get(index)
    }

    pub fn images(&self) -> &[SelectedImage] {
        &self.images
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SelectedImage> {
        self.images.iter()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Sum of the original file sizes.
    pub fn total_bytes(&self) -> u64 {
        self.images.iter().map(SelectedImage::byte_size).sum()
    }

    fn emit(&self, event: ConvertEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver means nobody is listening; not an error.
            let _ = tx.send(event);
        }
    }
}
