//! Shader-pair to linked-program cache.

use std::collections::HashMap;
use std::sync::Arc;

use crate::backend::{LinkStatus, ProgramBackend};
use crate::bindings::{
    Uniform, ATTRIBUTE_BINDINGS, DUAL_SOURCE_OUTPUTS, FRAGMENT_BLOCK_BINDING, FRAGMENT_BLOCK_NAME,
    NUM_UNIFORMS, SAMPLER_UNIFORMS, SINGLE_OUTPUT, VERTEX_BLOCK_BINDING, VERTEX_BLOCK_NAME,
};
use crate::capabilities::PlatformCapabilities;
use crate::disk_cache::DiskCacheBridge;
use crate::error::{ProgramCacheError, ProgramCacheResult};
use crate::types::{ProgramBinary, ProgramHandle, ShaderId, ShaderPairKey};

use super::entry::{EntryOrigin, ProgramEntry};

/// Counters describing how resolves were served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Resolves that rebound an existing entry.
    pub hits: u64,
    /// Resolves of the pair that was already bound.
    pub redundant_binds: u64,
    /// Programs linked from shader objects.
    pub builds: u64,
    /// Link attempts that failed.
    pub link_failures: u64,
    /// Programs loaded from persisted binaries.
    pub restored: u64,
}

/// Cache of linked programs keyed by their shader pair.
///
/// Every `(fragment, vertex)` pair is linked at most once per session. The
/// first resolve of a pair creates a native program, wires the fixed binding
/// tables into it, links it and resolves its uniforms; later resolves only
/// bind it, and resolving the pair that is already bound does nothing.
///
/// A failed link is reported to the caller and leaves no trace in the cache,
/// so the same pair is built again on the next resolve.
///
/// # Example
///
/// ```ignore
/// let mut cache = ProgramCache::new(backend.clone());
/// let entry = cache.resolve(ShaderId(7), ShaderId(3))?;
/// let color = entry.uniform_location(Uniform::Colors);
/// ```
pub struct ProgramCache {
    backend: Arc<dyn ProgramBackend>,
    capabilities: PlatformCapabilities,
    binary_format: Option<u32>,
    entries: HashMap<ShaderPairKey, ProgramEntry>,
    bound: Option<ShaderPairKey>,
    stats: CacheStats,
}

impl ProgramCache {
    /// Create an empty cache. Platform capabilities are read once, here.
    pub fn new(backend: Arc<dyn ProgramBackend>) -> Self {
        let capabilities = backend.capabilities();

        let binary_format = if capabilities.supports_program_binary() {
            let format = backend.program_binary_formats().first().copied();
            if format.is_none() {
                log::warn!(
                    "{} supports program binaries but reports no binary formats, \
                     disabling the program disk cache",
                    backend.name()
                );
            }
            format
        } else {
            None
        };

        Self {
            backend,
            capabilities,
            binary_format,
            entries: HashMap::new(),
            bound: None,
            stats: CacheStats::default(),
        }
    }

    /// Capabilities the cache was created with.
    pub fn capabilities(&self) -> PlatformCapabilities {
        self.capabilities
    }

    /// Binary format programs are persisted with, or `None` if binary
    /// retrieval is unavailable.
    pub fn binary_format(&self) -> Option<u32> {
        self.binary_format
    }

    /// Bind the program linked from the given shaders, building it first if
    /// this pair has not been seen.
    ///
    /// Null shader ids are rejected before any state changes. On a link
    /// failure the previously bound program stays bound.
    pub fn resolve(
        &mut self,
        fragment: ShaderId,
        vertex: ShaderId,
    ) -> ProgramCacheResult<&ProgramEntry> {
        let key = ShaderPairKey::new(fragment, vertex);
        if key.has_null() {
            return Err(ProgramCacheError::InvalidShaderId {
                fragment: fragment.raw(),
                vertex: vertex.raw(),
            });
        }

        if self.bound == Some(key) {
            self.stats.redundant_binds += 1;
        } else if let Some(entry) = self.entries.get(&key) {
            self.backend.use_program(Some(entry.handle));
            self.bound = Some(key);
            self.stats.hits += 1;
        } else {
            let entry = self.build(key)?;
            self.entries.insert(key, entry);
            self.bound = Some(key);
        }

        self.entries.get(&key).ok_or_else(|| {
            ProgramCacheError::Backend(format!("bound program {key} is missing from the cache"))
        })
    }

    /// Link a new program for `key` and bind it. The entry is returned to the
    /// caller for insertion.
    fn build(&mut self, key: ShaderPairKey) -> ProgramCacheResult<ProgramEntry> {
        let backend = Arc::clone(&self.backend);
        let program = backend
            .create_program()
            .map_err(ProgramCacheError::Backend)?;

        backend.attach_shader(program, key.vertex);
        backend.attach_shader(program, key.fragment);
        if self.binary_format.is_some() {
            backend.set_binary_retrievable_hint(program);
        }

        self.wire_bindings(program);

        if backend.link_program(program) == LinkStatus::Failed {
            let info_log = backend.program_info_log(program);
            backend.delete_program(program);
            self.stats.link_failures += 1;
            log::warn!("Failed to link program {}: {}", key, info_log);
            return Err(ProgramCacheError::LinkFailure { key, log: info_log });
        }

        let info_log = backend.program_info_log(program);
        if !info_log.is_empty() {
            log::debug!("Program {} linked with messages: {}", key, info_log);
        }

        backend.use_program(Some(program));

        let mut entry = ProgramEntry::new(program, key, EntryOrigin::Linked);
        entry.binary_format = self.binary_format.unwrap_or(0);
        self.resolve_uniforms(&mut entry);

        self.stats.builds += 1;
        log::trace!("Built program {:?} for {}", program, key);
        Ok(entry)
    }

    /// Bind fragment outputs and vertex attributes. Runs before linking.
    fn wire_bindings(&self, program: ProgramHandle) {
        if self.capabilities.supports_dual_source_blend() {
            for output in DUAL_SOURCE_OUTPUTS {
                self.backend.bind_frag_data_location_indexed(
                    program,
                    output.color_number,
                    output.index,
                    output.name,
                );
            }
        } else {
            self.backend.bind_frag_data_location(
                program,
                SINGLE_OUTPUT.color_number,
                SINGLE_OUTPUT.name,
            );
        }

        for (name, slot) in ATTRIBUTE_BINDINGS {
            self.backend.bind_attrib_location(program, slot, name);
        }
    }

    /// Bind uniform blocks, look up uniform locations and assign sampler
    /// units. Runs after linking or after loading a binary.
    fn resolve_uniforms(&self, entry: &mut ProgramEntry) {
        let program = entry.handle;
        let uniform_blocks = self.capabilities.supports_uniform_blocks();

        if uniform_blocks {
            for (name, binding) in [
                (FRAGMENT_BLOCK_NAME, FRAGMENT_BLOCK_BINDING),
                (VERTEX_BLOCK_NAME, VERTEX_BLOCK_BINDING),
            ] {
                if let Some(block) = self.backend.uniform_block_index(program, name) {
                    self.backend.uniform_block_binding(program, block, binding);
                }
            }
        }

        // Block platforms still set the color uniform directly.
        let individual = if uniform_blocks { 1 } else { NUM_UNIFORMS };
        for uniform in &Uniform::ALL[..individual] {
            entry.uniform_locations[uniform.index()] =
                self.backend.uniform_location(program, uniform.name());
        }

        for (unit, name) in SAMPLER_UNIFORMS.iter().enumerate() {
            if let Some(location) = self.backend.uniform_location(program, name) {
                self.backend.set_uniform_i32(program, location, unit as i32);
            }
        }
    }

    /// Insert a program loaded from a persisted binary.
    ///
    /// Returns `Ok(false)` when the pair is already cached or the driver
    /// rejects the binary. Nothing is bound.
    pub(crate) fn insert_restored(
        &mut self,
        key: ShaderPairKey,
        binary: &ProgramBinary,
    ) -> ProgramCacheResult<bool> {
        if key.has_null() {
            return Err(ProgramCacheError::InvalidShaderId {
                fragment: key.fragment.raw(),
                vertex: key.vertex.raw(),
            });
        }

        let Some(expected) = self.binary_format else {
            return Ok(false);
        };
        if binary.format != expected {
            return Err(ProgramCacheError::FormatMismatch {
                expected,
                found: binary.format,
            });
        }

        if self.entries.contains_key(&key) {
            return Ok(false);
        }

        let program = self
            .backend
            .create_program()
            .map_err(ProgramCacheError::Backend)?;
        if !self.backend.load_program_binary(program, binary) {
            self.backend.delete_program(program);
            return Ok(false);
        }

        let mut entry = ProgramEntry::new(program, key, EntryOrigin::Restored);
        entry.binary_format = binary.format;
        self.resolve_uniforms(&mut entry);

        self.entries.insert(key, entry);
        self.stats.restored += 1;
        Ok(true)
    }

    /// Persist linked programs, then release everything.
    ///
    /// With binary retrieval and an open disk cache, each program linked in
    /// this session has its binary appended; programs restored from the disk
    /// cache are already there. Native programs are released whether or not
    /// persisting succeeded, and a persisting error is returned afterwards.
    ///
    /// Returns the number of binaries written.
    pub fn shutdown(&mut self, disk: Option<&mut DiskCacheBridge>) -> ProgramCacheResult<usize> {
        let result = match disk {
            Some(disk) if self.binary_format.is_some() && disk.is_open() => {
                let appended = self.append_binaries(disk);
                let synced = appended.and_then(|written| disk.sync().map(|()| written));
                let closed = disk.close();
                synced.and_then(|written| closed.map(|()| written))
            }
            Some(disk) => disk.close().map(|()| 0),
            None => Ok(0),
        };

        let released = self.entries.len();
        self.clear();
        log::debug!("Program cache shut down, released {} programs", released);
        result
    }

    fn append_binaries(&mut self, disk: &mut DiskCacheBridge) -> ProgramCacheResult<usize> {
        let mut written = 0;
        for entry in self.entries.values_mut() {
            if entry.is_restored() {
                continue;
            }

            let Some(binary) = self.backend.program_binary(entry.handle) else {
                log::debug!("No binary available for program {}", entry.key);
                continue;
            };

            entry.binary_format = binary.format;
            disk.append(entry.identity(), &binary)?;
            written += 1;
        }
        Ok(written)
    }

    /// Release every program without persisting and unbind.
    pub fn clear(&mut self) {
        self.backend.use_program(None);
        for (_, entry) in self.entries.drain() {
            self.backend.delete_program(entry.handle);
        }
        self.bound = None;
    }

    /// Unbind the current program. The next resolve binds again.
    pub fn unbind(&mut self) {
        if self.bound.take().is_some() {
            self.backend.use_program(None);
        }
    }

    /// Native handle of the bound program.
    pub fn current_program(&self) -> Option<ProgramHandle> {
        self.current_entry().map(ProgramEntry::handle)
    }

    /// Shader pair of the bound program.
    pub fn current_key(&self) -> Option<ShaderPairKey> {
        self.bound
    }

    /// The bound program's entry.
    pub fn current_entry(&self) -> Option<&ProgramEntry> {
        self.bound.and_then(|key| self.entries.get(&key))
    }

    /// Look up an entry without binding it.
    pub fn get(&self, key: ShaderPairKey) -> Option<&ProgramEntry> {
        self.entries.get(&key)
    }

    /// Whether a program for `key` is cached.
    pub fn contains(&self, key: ShaderPairKey) -> bool {
        self.entries.contains_key(&key)
    }

    /// Iterate over all cached entries in arbitrary order.
    pub fn entries(&self) -> impl Iterator<Item = &ProgramEntry> {
        self.entries.values()
    }

    /// Number of cached programs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve counters.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

impl Drop for ProgramCache {
    fn drop(&mut self) {
        if self.entries.is_empty() {
            return;
        }

        // The context may already be gone, so don't touch the backend.
        log::warn!(
            "ProgramCache dropped with {} live programs. Call shutdown() or clear() first.",
            self.entries.len()
        );
    }
}

impl std::fmt::Debug for ProgramCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramCache")
            .field("backend", &self.backend.name())
            .field("capabilities", &self.capabilities)
            .field("binary_format", &self.binary_format)
            .field("entries", &self.entries.len())
            .field("bound", &self.bound)
            .field("stats", &self.stats)
            .finish()
    }
}
