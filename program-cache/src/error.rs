//! Program cache error types.

use thiserror::Error;

use crate::staging::ConstantBlock;
use crate::store::StoreError;
use crate::types::ShaderPairKey;

/// Errors that can occur in the program cache and constant staging.
#[derive(Error, Debug)]
pub enum ProgramCacheError {
    /// A null shader id was passed to resolve. No state was changed.
    #[error("invalid shader id pair (fs {fragment}, vs {vertex})")]
    InvalidShaderId { fragment: u32, vertex: u32 },

    /// The driver failed to link the program. The native program was
    /// released and nothing was inserted into the cache.
    #[error("program link failed for {key}: {log}")]
    LinkFailure { key: ShaderPairKey, log: String },

    /// A restored binary was produced for a different driver binary format.
    #[error("program binary format mismatch: expected {expected:#x}, found {found:#x}")]
    FormatMismatch { expected: u32, found: u32 },

    /// A checked constant write would leave its block.
    #[error("{block:?} constant write out of range: offset {offset} + count {count} > capacity {capacity}")]
    OutOfRangeWrite {
        block: ConstantBlock,
        offset: usize,
        count: usize,
        capacity: usize,
    },

    /// Staging alignment is not a power of two.
    #[error("uniform buffer offset alignment must be a power of 2, got {0}")]
    InvalidAlignment(u64),

    /// The streaming buffer cannot hold the requested region.
    #[error("stream buffer exhausted: requested {requested} bytes, capacity {capacity}")]
    StreamBufferExhausted { requested: u64, capacity: u64 },

    /// A native resource could not be created.
    #[error("backend error: {0}")]
    Backend(String),

    /// The persistent program store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ProgramCacheError {
    /// Whether this error came from a failed link.
    pub fn is_link_failure(&self) -> bool {
        matches!(self, Self::LinkFailure { .. })
    }
}

pub type ProgramCacheResult<T> = Result<T, ProgramCacheError>;
