//! Bridge between the program cache and a persistent program store.
//!
//! At session start the bridge opens the store and hands every record to the
//! cache as a restored program. At shutdown the cache appends the binaries
//! of the programs it linked and the bridge syncs and closes the store.
//!
//! Records are `identity -> format tag ++ binary`, where the identity is the
//! 64-bit form of the shader pair. A record written by a driver with another
//! binary format, or one that no longer loads, is a silent cache miss: the
//! pair is simply linked again the first time it is used.

use std::path::{Path, PathBuf};

use crate::error::{ProgramCacheError, ProgramCacheResult};
use crate::program::ProgramCache;
use crate::store::ProgramStore;
use crate::types::{ProgramBinary, ShaderPairKey};

/// Outcome of restoring a store into a cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreStats {
    /// Records found in the store.
    pub records: usize,
    /// Records inserted into the cache.
    pub restored: usize,
    /// Records written for a different binary format.
    pub format_mismatches: usize,
    /// Records skipped for any other reason.
    pub skipped: usize,
}

/// Owns the program store for one session.
pub struct DiskCacheBridge {
    store: Box<dyn ProgramStore>,
    path: PathBuf,
}

impl DiskCacheBridge {
    /// Wrap a store that will be opened at `path`.
    pub fn new(store: Box<dyn ProgramStore>, path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            path: path.into(),
        }
    }

    /// Path of the store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the store is open and accepting appends.
    pub fn is_open(&self) -> bool {
        self.store.is_open()
    }

    /// Open the store and insert every loadable record into `cache`.
    ///
    /// Does nothing when the cache has no binary format to restore into.
    /// Only store failures are returned; bad records are skipped.
    pub fn restore(&mut self, cache: &mut ProgramCache) -> ProgramCacheResult<RestoreStats> {
        let mut stats = RestoreStats::default();
        if cache.binary_format().is_none() {
            return Ok(stats);
        }

        let records = self
            .store
            .open_and_read(&self.path, &mut |identity, value| {
                let key = ShaderPairKey::from_bits(identity);
                let Some(binary) = ProgramBinary::decode(value) else {
                    log::debug!("Skipping undecodable persisted program {}", key);
                    stats.skipped += 1;
                    return;
                };

                match cache.insert_restored(key, &binary) {
                    Ok(true) => stats.restored += 1,
                    Ok(false) => {
                        log::debug!("Skipping persisted program {}: not loadable", key);
                        stats.skipped += 1;
                    }
                    Err(e @ ProgramCacheError::FormatMismatch { .. }) => {
                        log::debug!("Skipping persisted program {}: {}", key, e);
                        stats.format_mismatches += 1;
                    }
                    Err(e) => {
                        log::debug!("Skipping persisted program {}: {}", key, e);
                        stats.skipped += 1;
                    }
                }
            })?;
        stats.records = records;

        log::info!(
            "Restored {} of {} programs from {}",
            stats.restored,
            stats.records,
            self.path.display()
        );
        Ok(stats)
    }

    /// Append one program binary under its identity.
    pub fn append(&mut self, identity: u64, binary: &ProgramBinary) -> ProgramCacheResult<()> {
        self.store.append(identity, &binary.encode())?;
        Ok(())
    }

    /// Flush appended records.
    pub fn sync(&mut self) -> ProgramCacheResult<()> {
        self.store.sync()?;
        Ok(())
    }

    /// Close the store.
    pub fn close(&mut self) -> ProgramCacheResult<()> {
        self.store.close()?;
        Ok(())
    }
}

impl std::fmt::Debug for DiskCacheBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskCacheBridge")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .finish()
    }
}
