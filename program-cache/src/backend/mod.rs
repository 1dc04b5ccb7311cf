//! Platform backend abstraction.
//!
//! The program cache drives a GL-style program object API: create a program,
//! attach shaders, bind locations, link, query uniforms and move binaries in
//! and out. Each platform implements [`ProgramBackend`] on top of its native
//! API; the cache itself never talks to a driver directly.
//!
//! # Available Backends
//!
//! - `dummy` (default feature): records every call, for tests and headless
//!   runs
//!
//! All calls are made from the rendering thread that owns the context.

#[cfg(any(test, feature = "dummy"))]
pub mod dummy;

use crate::capabilities::PlatformCapabilities;
use crate::types::{
    BufferHandle, ProgramBinary, ProgramHandle, ShaderId, UniformBlockIndex, UniformLocation,
};

/// Result of a native link step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    /// The program linked.
    Linked,
    /// The program failed to link.
    Failed,
}

/// GL-style program object API consumed by the cache.
pub trait ProgramBackend: Send + Sync + 'static {
    /// Get the backend name.
    fn name(&self) -> &'static str;

    /// Capabilities of the platform. Must not change while a session is alive.
    fn capabilities(&self) -> PlatformCapabilities;

    /// Binary formats the driver can produce, most preferred first.
    fn program_binary_formats(&self) -> Vec<u32>;

    // --- Program objects ---

    /// Create an empty program object.
    fn create_program(&self) -> Result<ProgramHandle, String>;

    /// Attach a compiled shader object to a program.
    fn attach_shader(&self, program: ProgramHandle, shader: ShaderId);

    /// Ask the driver to keep the linked binary retrievable.
    fn set_binary_retrievable_hint(&self, program: ProgramHandle);

    /// Bind a fragment output to a color number, without a blend index.
    fn bind_frag_data_location(&self, program: ProgramHandle, color_number: u32, name: &str);

    /// Bind a fragment output to a color number and blend source index.
    fn bind_frag_data_location_indexed(
        &self,
        program: ProgramHandle,
        color_number: u32,
        index: u32,
        name: &str,
    );

    /// Bind a vertex attribute name to a slot.
    fn bind_attrib_location(&self, program: ProgramHandle, slot: u32, name: &str);

    /// Link the program.
    fn link_program(&self, program: ProgramHandle) -> LinkStatus;

    /// Driver diagnostic text for the last link. Empty if none.
    fn program_info_log(&self, program: ProgramHandle) -> String;

    /// Make a program current, or unbind with `None`.
    fn use_program(&self, program: Option<ProgramHandle>);

    /// Release a program object.
    fn delete_program(&self, program: ProgramHandle);

    // --- Uniforms ---

    /// Location of a named uniform, or `None` if the program has none.
    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;

    /// Set an integer uniform on a program (used for sampler units).
    fn set_uniform_i32(&self, program: ProgramHandle, location: UniformLocation, value: i32);

    /// Index of a named uniform block, or `None` if the program has none.
    fn uniform_block_index(&self, program: ProgramHandle, name: &str)
        -> Option<UniformBlockIndex>;

    /// Bind a uniform block to a buffer binding point.
    fn uniform_block_binding(&self, program: ProgramHandle, block: UniformBlockIndex, binding: u32);

    // --- Binaries ---

    /// Retrieve the linked binary, if the driver can provide it.
    fn program_binary(&self, program: ProgramHandle) -> Option<ProgramBinary>;

    /// Load a previously retrieved binary into an empty program. Returns
    /// `false` if the driver rejects it.
    fn load_program_binary(&self, program: ProgramHandle, binary: &ProgramBinary) -> bool;

    // --- Uniform buffers ---

    /// Create a uniform buffer of the given size.
    fn create_uniform_buffer(&self, size: u64) -> Result<BufferHandle, String>;

    /// Write bytes into a buffer at an offset.
    fn write_buffer(&self, buffer: BufferHandle, offset: u64, data: &[u8]);

    /// Bind `[offset, offset + size)` of a buffer to a uniform binding point.
    fn bind_buffer_range(&self, binding: u32, buffer: BufferHandle, offset: u64, size: u64);

    /// Release a buffer.
    fn delete_buffer(&self, buffer: BufferHandle);
}
