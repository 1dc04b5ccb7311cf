use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{ProgramStore, StoreError, StoreResult};

type RecordLog = Vec<(u64, Vec<u8>)>;

/// In-memory program store.
///
/// Clones share the same record logs, so a test can keep one handle while a
/// session owns another and inspect what was persisted after shutdown. Logs
/// are kept per path, mirroring one file per path on disk.
///
/// # Example
///
/// ```ignore
/// let store = MemoryProgramStore::new();
/// let session = RenderingSession::with_store(backend, config, Box::new(store.clone()))?;
/// // ...
/// session.shutdown()?;
/// assert_eq!(store.records(&path).len(), 1);
/// ```
#[derive(Clone, Default)]
pub struct MemoryProgramStore {
    logs: Arc<Mutex<HashMap<PathBuf, RecordLog>>>,
    open: Option<PathBuf>,
    sync_count: Arc<Mutex<usize>>,
}

impl MemoryProgramStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record to the log at `path` without opening it.
    pub fn insert(&self, path: impl Into<PathBuf>, key: u64, value: Vec<u8>) {
        self.logs
            .lock()
            .entry(path.into())
            .or_default()
            .push((key, value));
    }

    /// Records currently in the log at `path`.
    pub fn records(&self, path: &Path) -> Vec<(u64, Vec<u8>)> {
        self.logs.lock().get(path).cloned().unwrap_or_default()
    }

    /// Number of successful [`sync`](ProgramStore::sync) calls across all
    /// clones.
    pub fn sync_count(&self) -> usize {
        *self.sync_count.lock()
    }
}

impl ProgramStore for MemoryProgramStore {
    fn open_and_read(
        &mut self,
        path: &Path,
        reader: &mut dyn FnMut(u64, &[u8]),
    ) -> StoreResult<usize> {
        if let Some(open) = &self.open {
            return Err(StoreError::AlreadyOpen(open.display().to_string()));
        }

        // Snapshot so the reader can't observe its own appends.
        let records = self.logs.lock().entry(path.to_path_buf()).or_default().clone();
        for (key, value) in &records {
            reader(*key, value);
        }

        self.open = Some(path.to_path_buf());
        Ok(records.len())
    }

    fn append(&mut self, key: u64, value: &[u8]) -> StoreResult<()> {
        let path = self.open.as_ref().ok_or(StoreError::NotOpen)?;
        self.logs
            .lock()
            .entry(path.clone())
            .or_default()
            .push((key, value.to_vec()));
        Ok(())
    }

    fn sync(&mut self) -> StoreResult<()> {
        if self.open.is_none() {
            return Err(StoreError::NotOpen);
        }
        *self.sync_count.lock() += 1;
        Ok(())
    }

    fn close(&mut self) -> StoreResult<()> {
        self.open = None;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.is_some()
    }
}

impl std::fmt::Debug for MemoryProgramStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryProgramStore")
            .field("open", &self.open)
            .field("logs", &self.logs.lock().len())
            .finish()
    }
}
