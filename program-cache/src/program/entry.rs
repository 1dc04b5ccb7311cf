//! A linked program and the state resolved for it.

use crate::bindings::{Uniform, NUM_UNIFORMS};
use crate::types::{ProgramHandle, ShaderId, ShaderPairKey, UniformLocation};

/// Table of resolved uniform locations, indexed by [`Uniform`].
pub type UniformLocations = [Option<UniformLocation>; NUM_UNIFORMS];

/// How an entry came into the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOrigin {
    /// Linked from shader objects during this session.
    Linked,
    /// Loaded from a persisted binary.
    Restored,
}

/// A linked program owned by the [`ProgramCache`](super::ProgramCache).
///
/// Entries are only mutated while they are being built or restored. The
/// native program is released by the cache, never by the entry.
#[derive(Debug, Clone)]
pub struct ProgramEntry {
    pub(crate) handle: ProgramHandle,
    pub(crate) key: ShaderPairKey,
    pub(crate) binary_format: u32,
    pub(crate) uniform_locations: UniformLocations,
    pub(crate) origin: EntryOrigin,
}

impl ProgramEntry {
    pub(crate) fn new(handle: ProgramHandle, key: ShaderPairKey, origin: EntryOrigin) -> Self {
        Self {
            handle,
            key,
            binary_format: 0,
            uniform_locations: [None; NUM_UNIFORMS],
            origin,
        }
    }

    /// Native program handle.
    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    /// The shader pair this program was linked from.
    pub fn key(&self) -> ShaderPairKey {
        self.key
    }

    /// Fragment shader the program was linked from.
    pub fn fragment(&self) -> ShaderId {
        self.key.fragment
    }

    /// Vertex shader the program was linked from.
    pub fn vertex(&self) -> ShaderId {
        self.key.vertex
    }

    /// Stable identity used as the persistent store key.
    pub fn identity(&self) -> u64 {
        self.key.to_bits()
    }

    /// Binary format tag the program is persisted with. Zero when binary
    /// retrieval is unavailable.
    pub fn binary_format(&self) -> u32 {
        self.binary_format
    }

    /// Resolved location of a named uniform, if the program has it.
    pub fn uniform_location(&self, uniform: Uniform) -> Option<UniformLocation> {
        self.uniform_locations[uniform.index()]
    }

    /// Every resolved uniform location.
    pub fn uniform_locations(&self) -> &UniformLocations {
        &self.uniform_locations
    }

    /// How the entry came into the cache.
    pub fn origin(&self) -> EntryOrigin {
        self.origin
    }

    /// Whether the entry was loaded from a persisted binary.
    pub fn is_restored(&self) -> bool {
        self.origin == EntryOrigin::Restored
    }
}
