//! Common utilities for program cache integration tests.
//!
//! Tests run against the dummy backend configured as the platform profiles
//! the cache has to handle, from a full desktop driver down to one without
//! uniform blocks, dual-source blending or binary retrieval.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use redlilium_program_cache::backend::dummy::{BackendCall, DummyBackend, DUMMY_BINARY_FORMAT};
use redlilium_program_cache::{
    CapabilityFlags, MemoryProgramStore, PlatformCapabilities, ProgramBinary, RenderingSession,
    SessionConfig, ShaderId, ShaderPairKey,
};

/// Cache path used with the in-memory store.
pub const CACHE_PATH: &str = "cache/ogl-TEST01-shaders.cache";

// ============================================================================
// Platform profiles
// ============================================================================

/// Platform capability profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Uniform blocks, dual-source blending and binary retrieval.
    Desktop,
    /// Uniform blocks and binary retrieval, no dual-source blending.
    NoDualSource,
    /// Uniform blocks only.
    NoBinary,
    /// No optional features at all.
    Legacy,
}

impl Platform {
    /// Capability flags of the profile.
    pub fn flags(self) -> CapabilityFlags {
        match self {
            Platform::Desktop => CapabilityFlags::all(),
            Platform::NoDualSource => {
                CapabilityFlags::UNIFORM_BLOCKS | CapabilityFlags::PROGRAM_BINARY
            }
            Platform::NoBinary => CapabilityFlags::UNIFORM_BLOCKS,
            Platform::Legacy => CapabilityFlags::empty(),
        }
    }

    /// Capabilities of the profile with the given alignment.
    pub fn capabilities(self, alignment: u64) -> PlatformCapabilities {
        PlatformCapabilities::new(self.flags(), alignment)
    }
}

// ============================================================================
// Test context
// ============================================================================

/// A session on a dummy backend with an in-memory store.
pub struct TestContext {
    pub backend: Arc<DummyBackend>,
    pub store: MemoryProgramStore,
    pub session: RenderingSession,
}

impl TestContext {
    /// Start a session with an empty store.
    pub fn new(platform: Platform) -> Self {
        Self::with_store(platform, MemoryProgramStore::new())
    }

    /// Start a session on a store that may already hold records.
    pub fn with_store(platform: Platform, store: MemoryProgramStore) -> Self {
        Self::with_backend(
            DummyBackend::with_capabilities(platform.capabilities(256)),
            store,
        )
    }

    /// Start a session on a preconfigured backend.
    pub fn with_backend(backend: DummyBackend, store: MemoryProgramStore) -> Self {
        init_logging();
        let backend = Arc::new(backend);
        let config = SessionConfig::new().with_cache_path(CACHE_PATH);
        let session =
            RenderingSession::with_store(backend.clone(), config, Box::new(store.clone()))
                .expect("session creation failed");
        Self {
            backend,
            store,
            session,
        }
    }

    /// Records persisted at [`CACHE_PATH`].
    pub fn persisted(&self) -> Vec<(u64, Vec<u8>)> {
        self.store.records(Path::new(CACHE_PATH))
    }

    /// Calls recorded since the last [`DummyBackend::clear_calls`].
    pub fn calls(&self) -> Vec<BackendCall> {
        self.backend.calls()
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Initialize test logging once.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Shader pair key from raw ids.
pub fn pair(fragment: u32, vertex: u32) -> ShaderPairKey {
    ShaderPairKey::new(ShaderId(fragment), ShaderId(vertex))
}

/// A binary the dummy driver accepts for the given pair, encoded as a store
/// value.
pub fn dummy_record(fragment: u32, vertex: u32) -> Vec<u8> {
    let mut data = b"RLDB".to_vec();
    data.extend_from_slice(&vertex.to_le_bytes());
    data.extend_from_slice(&fragment.to_le_bytes());
    ProgramBinary::new(DUMMY_BINARY_FORMAT, data).encode()
}

/// A store pre-populated with the given records at [`CACHE_PATH`].
pub fn store_with(records: &[(u64, Vec<u8>)]) -> MemoryProgramStore {
    let store = MemoryProgramStore::new();
    for (key, value) in records {
        store.insert(CACHE_PATH, *key, value.clone());
    }
    store
}

/// Fresh cache file path inside a temporary directory.
pub fn temp_cache_path(dir: &tempfile::TempDir, unique_id: &str) -> PathBuf {
    dir.path().join(format!("ogl-{unique_id}-shaders.cache"))
}
