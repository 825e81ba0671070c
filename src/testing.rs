//! In-memory doubles shared by the unit tests.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;

use crate::error::{Error, Result};
use crate::fs::FileSystem;
use crate::remote::{RemoteBody, RemoteSource};
use crate::transfer::TransferProgress;

/// File system that only knows file sizes and directory names.
pub struct MockFileSystem {
    files: Mutex<HashMap<PathBuf, u64>>,
    dirs: Mutex<BTreeSet<PathBuf>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            dirs: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn add_file(&self, path: impl Into<PathBuf>, size: u64) {
        self.files.lock().unwrap().insert(path.into(), size);
    }

    pub fn add_dir(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        let mut dirs = self.dirs.lock().unwrap();
        for ancestor in path.ancestors() {
            if !ancestor.as_os_str().is_empty() {
                dirs.insert(ancestor.to_path_buf());
            }
        }
    }

    pub fn has_dir(&self, path: impl AsRef<Path>) -> bool {
        self.dirs.lock().unwrap().contains(path.as_ref())
    }
}

#[async_trait]
impl FileSystem for MockFileSystem {
    async fn file_size(&self, path: &Path) -> Option<u64> {
        self.files.lock().unwrap().get(path).copied()
    }

    async fn dir_exists(&self, path: &Path) -> bool {
        self.has_dir(path)
    }

    async fn list_dirs(&self, path: &Path) -> std::io::Result<Vec<String>> {
        if !self.has_dir(path) {
            return Err(std::io::Error::new(std::io::ErrorKind::NotFound, "mock"));
        }
        Ok(self
            .dirs
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.parent() == Some(path))
            .filter_map(|d| d.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect())
    }

    async fn create_dir_all(&self, path: &Path) -> std::io::Result<()> {
        self.add_dir(path);
        Ok(())
    }

    async fn open_for_write(&self, _path: &Path, _append: bool) -> std::io::Result<tokio::fs::File> {
        Err(std::io::Error::new(std::io::ErrorKind::Unsupported, "mock"))
    }
}

/// How a [`MemorySource`] serves one object.
#[derive(Clone)]
pub struct MemoryObject {
    pub data: Bytes,
    pub declare_length: bool,
    pub honour_range: bool,
    /// Stop the body after this many bytes while still declaring the full length.
    pub truncate_at: Option<usize>,
    pub chunk: usize,
}

impl MemoryObject {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            declare_length: true,
            honour_range: true,
            truncate_at: None,
            chunk: 1000,
        }
    }

    pub fn filled(len: usize) -> Self {
        Self::new((0..len).map(|i| (i % 251) as u8).collect::<Vec<_>>())
    }
}

/// Remote source serving objects from memory and recording every request.
pub struct MemorySource {
    objects: Mutex<HashMap<String, MemoryObject>>,
    requests: Mutex<Vec<(String, u64)>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn insert(&self, link: &str, object: MemoryObject) {
        self.objects.lock().unwrap().insert(link.to_string(), object);
    }

    /// `(link, offset)` of every `open` call, in order.
    pub fn requests(&self) -> Vec<(String, u64)> {
        self.requests.lock().unwrap().clone()
    }

    fn object(&self, link: &str) -> Result<MemoryObject> {
        self.objects
            .lock()
            .unwrap()
            .get(link)
            .cloned()
            .ok_or_else(|| Error::Transfer {
                label: link.to_string(),
                reason: "404 Not Found".to_string(),
            })
    }
}

#[async_trait]
impl RemoteSource for MemorySource {
    async fn content_length(&self, link: &str) -> Result<Option<u64>> {
        let object = self.object(link)?;
        Ok(object.declare_length.then_some(object.data.len() as u64))
    }

    async fn open(&self, link: &str, offset: u64) -> Result<RemoteBody> {
        self.requests.lock().unwrap().push((link.to_string(), offset));
        let object = self.object(link)?;

        let range_honoured = offset == 0 || object.honour_range;
        let start = if range_honoured {
            usize::try_from(offset).unwrap().min(object.data.len())
        } else {
            0
        };
        let declared = object.data.len() - start;
        let end = object.truncate_at.unwrap_or(object.data.len());
        let body = object.data.slice(start..end.max(start));

        let chunks: Vec<Result<Bytes>> = body
            .chunks(object.chunk)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();

        Ok(RemoteBody {
            content_length: object.declare_length.then_some(declared as u64),
            range_honoured,
            chunks: futures::stream::iter(chunks).boxed(),
        })
    }
}

/// A progress event captured by [`RecordingProgress`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Start { label: String, offset: u64, total: Option<u64> },
    Progress { done: u64, total: Option<u64> },
    Complete { label: String },
    Error { label: String },
}

/// Progress sink that stores every event.
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    /// `(done, total)` of every progress event.
    pub fn progress(&self) -> Vec<(u64, Option<u64>)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::Progress { done, total } => Some((done, total)),
                _ => None,
            })
            .collect()
    }
}

impl TransferProgress for RecordingProgress {
    fn on_start(&self, label: &str, offset: u64, total: Option<u64>) {
        self.events.lock().unwrap().push(ProgressEvent::Start {
            label: label.to_string(),
            offset,
            total,
        });
    }

    fn on_progress(&self, done: u64, total: Option<u64>, _label: &str) {
        self.events
            .lock()
            .unwrap()
            .push(ProgressEvent::Progress { done, total });
    }

    fn on_complete(&self, label: &str, _stats: &crate::stats::TransferStats) {
        self.events.lock().unwrap().push(ProgressEvent::Complete {
            label: label.to_string(),
        });
    }

    fn on_error(&self, label: &str, _error: &str) {
        self.events.lock().unwrap().push(ProgressEvent::Error {
            label: label.to_string(),
        });
    }
}
