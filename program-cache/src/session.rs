//! Rendering session: the program cache, constant staging and disk cache of
//! one graphics context.

use std::sync::Arc;

use crate::backend::ProgramBackend;
use crate::capabilities::PlatformCapabilities;
use crate::config::SessionConfig;
use crate::disk_cache::{DiskCacheBridge, RestoreStats};
use crate::error::ProgramCacheResult;
use crate::program::{ProgramCache, ProgramEntry};
use crate::staging::{BoundConstantRanges, ConstantStagingBuffer};
use crate::store::{FileProgramStore, ProgramStore};
use crate::stream_buffer::StreamBuffer;
use crate::types::{ProgramHandle, ShaderId};

/// Staging buffer and the stream it uploads through.
struct ConstantUploads {
    staging: ConstantStagingBuffer,
    stream: StreamBuffer,
}

/// Per-context program and constant state.
///
/// A session is created when the graphics context comes up and shut down
/// before it goes away. Creating it reads the platform capabilities once,
/// restores persisted programs and, on platforms with uniform blocks, sets up
/// the constant staging buffer. Shutting it down persists newly linked
/// programs and releases every native object.
///
/// All methods must be called from the thread that owns the context.
///
/// # Example
///
/// ```ignore
/// let config = SessionConfig::new()
///     .with_cache_dir(cache_dir)
///     .with_unique_id(title_id);
/// let mut session = RenderingSession::new(backend, config)?;
///
/// session.resolve_program(pixel_shader, vertex_shader)?;
/// if let Some(constants) = session.constants_mut() {
///     constants.write_vertex_constants(0, &projection);
/// }
/// session.flush_constants()?;
/// // draw
///
/// session.shutdown()?;
/// ```
pub struct RenderingSession {
    backend: Arc<dyn ProgramBackend>,
    config: SessionConfig,
    capabilities: PlatformCapabilities,
    cache: ProgramCache,
    constants: Option<ConstantUploads>,
    disk_cache: Option<DiskCacheBridge>,
    restore_stats: RestoreStats,
    shut_down: bool,
}

impl RenderingSession {
    /// Start a session persisting programs to a file at
    /// [`SessionConfig::cache_file_path`].
    pub fn new(backend: Arc<dyn ProgramBackend>, config: SessionConfig) -> ProgramCacheResult<Self> {
        Self::with_store(backend, config, Box::new(FileProgramStore::new()))
    }

    /// Start a session persisting programs to the given store.
    ///
    /// The store is opened at [`SessionConfig::cache_file_path`]; it is not
    /// used if that is `None` or the platform cannot retrieve binaries. A
    /// store that fails to open is logged and the session starts with an
    /// empty cache.
    pub fn with_store(
        backend: Arc<dyn ProgramBackend>,
        config: SessionConfig,
        store: Box<dyn ProgramStore>,
    ) -> ProgramCacheResult<Self> {
        let capabilities = backend.capabilities();
        let mut cache = ProgramCache::new(Arc::clone(&backend));

        let constants = if capabilities.supports_uniform_blocks() {
            let alignment = capabilities.uniform_buffer_offset_alignment;
            Some(ConstantUploads {
                staging: ConstantStagingBuffer::new(alignment)?,
                stream: StreamBuffer::new(
                    Arc::clone(&backend),
                    config.stream_buffer_size,
                    alignment,
                )?,
            })
        } else {
            None
        };

        let mut restore_stats = RestoreStats::default();
        let disk_cache = match config.cache_file_path() {
            Some(path) if cache.binary_format().is_some() => {
                let mut bridge = DiskCacheBridge::new(store, path);
                match bridge.restore(&mut cache) {
                    Ok(stats) => restore_stats = stats,
                    Err(e) => log::warn!(
                        "Failed to open program cache {}: {}",
                        bridge.path().display(),
                        e
                    ),
                }
                Some(bridge)
            }
            _ => None,
        };

        log::info!(
            "Rendering session started on {} ({:?}, {} programs restored, disk cache {})",
            backend.name(),
            capabilities.flags,
            restore_stats.restored,
            if disk_cache.as_ref().is_some_and(DiskCacheBridge::is_open) {
                "enabled"
            } else {
                "disabled"
            }
        );

        Ok(Self {
            backend,
            config,
            capabilities,
            cache,
            constants,
            disk_cache,
            restore_stats,
            shut_down: false,
        })
    }

    /// Bind the program for a shader pair, linking it on first use.
    pub fn resolve_program(
        &mut self,
        fragment: ShaderId,
        vertex: ShaderId,
    ) -> ProgramCacheResult<&ProgramEntry> {
        self.cache.resolve(fragment, vertex)
    }

    /// Handle of the bound program.
    pub fn current_program(&self) -> Option<ProgramHandle> {
        self.cache.current_program()
    }

    /// The bound program's entry.
    pub fn current_entry(&self) -> Option<&ProgramEntry> {
        self.cache.current_entry()
    }

    /// The constant staging buffer, present on platforms with uniform blocks.
    pub fn constants(&self) -> Option<&ConstantStagingBuffer> {
        self.constants.as_ref().map(|c| &c.staging)
    }

    /// Mutable access to the constant staging buffer for writes.
    pub fn constants_mut(&mut self) -> Option<&mut ConstantStagingBuffer> {
        self.constants.as_mut().map(|c| &mut c.staging)
    }

    /// Upload and bind staged constants if any were written.
    ///
    /// Must be called after a batch of constant writes and before the draw
    /// that reads them. Returns `None` when nothing was uploaded.
    pub fn flush_constants(&mut self) -> ProgramCacheResult<Option<BoundConstantRanges>> {
        match &mut self.constants {
            Some(c) => c.staging.flush_if_dirty(&mut c.stream, self.backend.as_ref()),
            None => Ok(None),
        }
    }

    /// The program cache.
    pub fn cache(&self) -> &ProgramCache {
        &self.cache
    }

    /// Mutable access to the program cache.
    pub fn cache_mut(&mut self) -> &mut ProgramCache {
        &mut self.cache
    }

    /// Capabilities read at session start.
    pub fn capabilities(&self) -> PlatformCapabilities {
        self.capabilities
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// What was restored from the disk cache at session start.
    pub fn restore_stats(&self) -> RestoreStats {
        self.restore_stats
    }

    /// Whether the disk cache is open and will receive programs at shutdown.
    pub fn disk_cache_enabled(&self) -> bool {
        self.disk_cache
            .as_ref()
            .is_some_and(DiskCacheBridge::is_open)
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Persist newly linked programs and release all native objects.
    ///
    /// Every program and buffer is released even if persisting fails; the
    /// persisting error is returned afterwards. Calling this again does
    /// nothing. Returns the number of programs written to the disk cache.
    pub fn shutdown(&mut self) -> ProgramCacheResult<usize> {
        if self.shut_down {
            return Ok(0);
        }
        self.shut_down = true;

        let programs = self.cache.len();
        let result = self.cache.shutdown(self.disk_cache.as_mut());

        if let Some(constants) = self.constants.take() {
            constants.stream.destroy();
        }

        match &result {
            Ok(written) => log::info!(
                "Rendering session shut down: released {} programs, persisted {}",
                programs,
                written
            ),
            Err(e) => log::warn!(
                "Rendering session shut down: released {} programs, persisting failed: {}",
                programs,
                e
            ),
        }
        result
    }
}

impl Drop for RenderingSession {
    fn drop(&mut self) {
        if !self.shut_down {
            log::warn!(
                "RenderingSession dropped without shutdown(). \
                 Native programs and buffers may have leaked."
            );
        }
    }
}

impl std::fmt::Debug for RenderingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderingSession")
            .field("backend", &self.backend.name())
            .field("capabilities", &self.capabilities)
            .field("cache", &self.cache)
            .field("disk_cache", &self.disk_cache)
            .field("shut_down", &self.shut_down)
            .finish()
    }
}
