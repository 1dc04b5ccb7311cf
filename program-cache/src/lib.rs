//! # RedLilium Program Cache
//!
//! GPU program cache and shader constant staging for GL-style backends.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`ProgramCache`] - Links each `(fragment, vertex)` shader pair once and
//!   rebinds it cheaply afterwards
//! - [`ConstantStagingBuffer`] - CPU staging of fragment and vertex constants,
//!   uploaded once per batch through a [`StreamBuffer`]
//! - [`DiskCacheBridge`] - Persists linked program binaries between runs
//! - [`RenderingSession`] - Ties the above to one graphics context
//! - [`ProgramBackend`] - Trait for platform backends, with a recording
//!   [`DummyBackend`](backend::dummy::DummyBackend) for tests
//!
//! ## Example
//!
//! ```ignore
//! use redlilium_program_cache::{RenderingSession, SessionConfig, ShaderId};
//!
//! let mut session = RenderingSession::new(backend, SessionConfig::new()
//!     .with_cache_dir("cache/shaders")
//!     .with_unique_id("GZLE01"))?;
//!
//! session.resolve_program(ShaderId(7), ShaderId(3))?;
//! session.flush_constants()?;
//! // draw...
//! session.shutdown()?;
//! ```

pub mod backend;
pub mod bindings;
pub mod capabilities;
pub mod config;
pub mod disk_cache;
pub mod error;
pub mod program;
pub mod session;
pub mod staging;
pub mod store;
pub mod stream_buffer;
pub mod types;

// Re-export main types for convenience
pub use backend::{LinkStatus, ProgramBackend};
pub use bindings::Uniform;
pub use capabilities::{CapabilityFlags, PlatformCapabilities};
pub use config::SessionConfig;
pub use disk_cache::{DiskCacheBridge, RestoreStats};
pub use error::{ProgramCacheError, ProgramCacheResult};
pub use program::{CacheStats, ProgramCache, ProgramEntry};
pub use session::RenderingSession;
pub use staging::{BoundConstantRanges, ConstantBlock, ConstantStagingBuffer, Vec4};
pub use store::{FileProgramStore, MemoryProgramStore, ProgramStore, StoreError};
pub use stream_buffer::{StreamBuffer, StreamingBuffer};
pub use types::{
    BufferHandle, ProgramBinary, ProgramHandle, ShaderId, ShaderPairKey, UniformLocation,
};

/// Program cache library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the program cache subsystem.
///
/// This should be called before creating a session.
pub fn init() {
    log::info!("RedLilium Program Cache v{} initialized", VERSION);
}
