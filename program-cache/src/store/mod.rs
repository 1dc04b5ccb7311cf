//! Persistent key/value stores for linked program binaries.
//!
//! A store is an append-only log of `(u64 key, bytes)` records. The cache
//! reads it once when a session starts and appends to it once at shutdown;
//! it never rewrites or removes records.
//!
//! # Available Stores
//!
//! - [`MemoryProgramStore`]: shared in-memory records, for tests and hosts
//!   that persist by other means
//! - [`FileProgramStore`]: a single record file on disk

mod file;
mod memory;

pub use file::FileProgramStore;
pub use memory::MemoryProgramStore;

use std::path::Path;

use thiserror::Error;

/// Errors reported by a [`ProgramStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// The underlying file could not be read or written.
    #[error("program store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An operation that needs an open store was called before
    /// [`ProgramStore::open_and_read`] or after [`ProgramStore::close`].
    #[error("program store is not open")]
    NotOpen,

    /// [`ProgramStore::open_and_read`] was called on a store that is already
    /// open.
    #[error("program store is already open at {0}")]
    AlreadyOpen(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Append-only persistent store of program binaries.
pub trait ProgramStore: Send {
    /// Open the store at `path`, creating it if missing, and feed every
    /// record to `reader` in file order.
    ///
    /// Returns the number of records read. After this call the store accepts
    /// appends until [`close`](Self::close).
    fn open_and_read(
        &mut self,
        path: &Path,
        reader: &mut dyn FnMut(u64, &[u8]),
    ) -> StoreResult<usize>;

    /// Append one record.
    fn append(&mut self, key: u64, value: &[u8]) -> StoreResult<()>;

    /// Flush appended records to durable storage.
    fn sync(&mut self) -> StoreResult<()>;

    /// Close the store. Closing a store that is not open does nothing.
    fn close(&mut self) -> StoreResult<()>;

    /// Whether the store is currently open.
    fn is_open(&self) -> bool;
}
