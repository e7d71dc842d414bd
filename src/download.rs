//! Download handoff: transient handles and sinks.
//!
//! Converted bytes reach the user in two steps, mirroring a browser's
//! `URL.createObjectURL` + `<a download>` dance:
//!
//! 1. [`TransientStore::create`] registers the bytes and hands back a
//!    [`TransientHandle`] addressed by a `blob:` id.
//! 2. A [`DownloadSink`] is triggered with the handle and a suggested file
//!    name.
//!
//! The handle must be released afterwards. Dropping it revokes the id, so a
//! handle can't outlive its scope; [`TransientStore::live_count`] exposes how
//! many are outstanding, which is what the leak tests check.

use crate::naming::numbered_file_name;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;
use uuid::Uuid;

type Registry = Arc<Mutex<HashMap<String, Arc<[u8]>>>>;

fn lock(registry: &Registry) -> MutexGuard<'_, HashMap<String, Arc<[u8]>>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Registry of in-memory blobs exposed for download.
#[derive(Debug, Clone, Default)]
pub struct TransientStore {
    registry: Registry,
}

impl TransientStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `bytes` and return a handle that revokes them when dropped.
    pub fn create(&self, bytes: impl Into<Arc<[u8]>>) -> TransientHandle {
        let url = format!("blob:imgshift/{}", Uuid::new_v4());
        let bytes = bytes.into();
        lock(&self.registry).insert(url.clone(), Arc::clone(&bytes));
        TransientHandle {
            url,
            bytes,
            registry: Arc::clone(&self.registry),
        }
    }

    /// Look up the bytes behind a live handle id.
    pub fn resolve(&self, url: &str) -> Option<Arc<[u8]>> {
        lock(&self.registry).get(url).cloned()
    }

    /// Number of handles created and not yet released.
    pub fn live_count(&self) -> usize {
        lock(&self.registry).len()
    }
}

/// Temporary reference to encoded bytes. Revoked on drop.
#[derive(Debug)]
pub struct TransientHandle {
    url: String,
    bytes: Arc<[u8]>,
    registry: Registry,
}

impl TransientHandle {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Revoke now. Equivalent to dropping, but reads better at call sites.
    pub fn release(self) {}
}

impl Drop for TransientHandle {
    fn drop(&mut self) {
        lock(&self.registry).remove(&self.url);
    }
}

/// Where converted files go. Fire-and-forget from the caller's view; the
/// return value only says whether the save could be started.
pub trait DownloadSink {
    fn download(&self, handle: &TransientHandle, file_name: &str) -> io::Result<PathBuf>;
}

/// Saves downloads into a directory, never overwriting: a clash gets a
/// ` (1)`, ` (2)`, … suffix before the extension.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the first free name and write `bytes` into it.
    ///
    /// Names are claimed with `create_new`, so two writers racing for the
    /// same name end up in different files.
    fn write_new(&self, file_name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let candidates = std::iter::once(file_name.to_string())
            .chain((1..=u32::MAX).map(|n| numbered_file_name(file_name, n)));
        for name in candidates {
            let path = self.dir.join(name);
            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            };
            if let Err(e) = file.write_all(bytes) {
                let _ = fs::remove_file(&path);
                return Err(e);
            }
            return Ok(path);
        }
        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free file name for {file_name:?}"),
        ))
    }
}

impl DownloadSink for DirectorySink {
    fn download(&self, handle: &TransientHandle, file_name: &str) -> io::Result<PathBuf> {
        // Suggested names come from user files; keep only the final component.
        let file_name = Path::new(file_name)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("unusable download name: {file_name:?}"),
                )
            })?;
        fs::create_dir_all(&self.dir)?;
        let path = self.write_new(file_name, handle.bytes())?;
        debug!(url = handle.url(), path = %path.display(), "saved download");
        Ok(path)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Sink that remembers every download instead of writing files.
    #[derive(Default)]
    pub struct RecordingSink {
        pub downloads: Mutex<Vec<(String, Vec<u8>)>>,
        fail_on: Option<String>,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_on(file_name: &str) -> Self {
            Self {
                downloads: Mutex::new(Vec::new()),
                fail_on: Some(file_name.to_string()),
            }
        }

        pub fn file_names(&self) -> Vec<String> {
            self.downloads
                .lock()
                .unwrap()
                .iter()
                .map(|(name, _)| name.clone())
                .collect()
        }
    }

    impl DownloadSink for RecordingSink {
        fn download(&self, handle: &TransientHandle, file_name: &str) -> io::Result<PathBuf> {
            if self.fail_on.as_deref() == Some(file_name) {
                return Err(io::Error::other("disk full"));
            }
            self.downloads
                .lock()
                .unwrap()
                .push((file_name.to_string(), handle.bytes().to_vec()));
            Ok(PathBuf::from(file_name))
        }
    }

    #[test]
    fn handle_is_resolvable_until_released() {
        let store = TransientStore::new();
        let handle = store.create(vec![1u8, 2, 3]);
        let url = handle.url().to_string();

        assert!(url.starts_with("blob:imgshift/"));
        assert_eq!(store.live_count(), 1);
        assert_eq!(store.resolve(&url).as_deref(), Some(&[1u8, 2, 3][..]));

        handle.release();
        assert_eq!(store.live_count(), 0);
        assert!(store.resolve(&url).is_none());
    }

    #[test]
    fn dropping_handle_revokes_it() {
        let store = TransientStore::new();
        {
            let _a = store.create(vec![0u8]);
            let _b = store.create(vec![1u8]);
            assert_eq!(store.live_count(), 2);
        }
        assert_eq!(store.live_count(), 0);
    }

    #[test]
    fn directory_sink_writes_file() {
        let tmp = TempDir::new().unwrap();
        let sink = DirectorySink::new(tmp.path().join("out"));
        let store = TransientStore::new();
        let handle = store.create(b"hello".to_vec());

        let path = sink.download(&handle, "photo.webp").unwrap();
        assert_eq!(path, tmp.path().join("out/photo.webp"));
        assert_eq!(fs::read(&path).unwrap(), b"hello");
    }

    #[test]
    fn directory_sink_never_overwrites() {
        let tmp = TempDir::new().unwrap();
        let sink = DirectorySink::new(tmp.path());
        let store = TransientStore::new();

        let first = sink.download(&store.create(b"1".to_vec()), "a.png").unwrap();
        let second = sink.download(&store.create(b"2".to_vec()), "a.png").unwrap();
        let third = sink.download(&store.create(b"3".to_vec()), "a.png").unwrap();

        assert_eq!(first, tmp.path().join("a.png"));
        assert_eq!(second, tmp.path().join("a (1).png"));
        assert_eq!(third, tmp.path().join("a (2).png"));
        assert_eq!(fs::read(&first).unwrap(), b"1");
    }

    #[test]
    fn directory_sink_keeps_existing_files() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.png"), b"old").unwrap();
        fs::write(tmp.path().join("a (1).png"), b"older").unwrap();
        let sink = DirectorySink::new(tmp.path());
        let store = TransientStore::new();

        let path = sink.download(&store.create(b"new".to_vec()), "a.png").unwrap();
        assert_eq!(path, tmp.path().join("a (2).png"));
        assert_eq!(fs::read(tmp.path().join("a.png")).unwrap(), b"old");
        assert_eq!(fs::read(tmp.path().join("a (1).png")).unwrap(), b"older");
        assert_eq!(fs::read(&path).unwrap(), b"new");
    }

    #[test]
    fn concurrent_downloads_of_one_name_get_distinct_files() {
        let tmp = TempDir::new().unwrap();
        let sink = DirectorySink::new(tmp.path());
        let store = TransientStore::new();

        let mut paths: Vec<PathBuf> = std::thread::scope(|s| {
            let workers: Vec<_> = (0..8u8)
                .map(|i| {
                    let handle = store.create(vec![i]);
                    let sink = &sink;
                    s.spawn(move || sink.download(&handle, "same.jpg").unwrap())
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        let mut contents: Vec<u8> = paths
            .iter()
            .map(|p| fs::read(p).unwrap()[0])
            .collect();
        contents.sort_unstable();
        assert_eq!(contents, (0..8u8).collect::<Vec<_>>());
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 8);
    }

    #[test]
    fn directory_sink_strips_path_components() {
        let tmp = TempDir::new().unwrap();
        let sink = DirectorySink::new(tmp.path().join("out"));
        let store = TransientStore::new();

        let path = sink
            .download(&store.create(b"x".to_vec()), "../../escape.jpg")
            .unwrap();
        assert_eq!(path, tmp.path().join("out/escape.jpg"));
    }

    #[test]
    fn directory_sink_rejects_empty_name() {
        let tmp = TempDir::new().unwrap();
        let sink = DirectorySink::new(tmp.path());
        let store = TransientStore::new();
        assert!(sink.download(&store.create(b"x".to_vec()), "..").is_err());
    }
}
