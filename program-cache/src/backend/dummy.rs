//! Dummy program backend for testing and development.
//!
//! This backend doesn't talk to a driver. It keeps just enough state to
//! behave like one (program objects, attached shaders, link results,
//! retrievable binaries, buffer contents) and records every call so tests
//! can check exactly what the cache asked the platform to do.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use crate::bindings::{
    FRAGMENT_BLOCK_NAME, SAMPLER_UNIFORMS, UNIFORM_NAMES, VERTEX_BLOCK_NAME,
};
use crate::capabilities::PlatformCapabilities;
use crate::types::{
    BufferHandle, ProgramBinary, ProgramHandle, ShaderId, UniformBlockIndex, UniformLocation,
};

use super::{LinkStatus, ProgramBackend};

/// Binary format tag reported by the dummy driver by default.
pub const DUMMY_BINARY_FORMAT: u32 = 0x5244_4231;

/// Magic prefix of binaries produced by the dummy driver.
const DUMMY_BINARY_MAGIC: &[u8; 4] = b"RLDB";

/// A call made against the dummy backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    CreateProgram(ProgramHandle),
    AttachShader(ProgramHandle, ShaderId),
    BinaryRetrievableHint(ProgramHandle),
    BindFragDataLocation {
        program: ProgramHandle,
        color_number: u32,
        name: String,
    },
    BindFragDataLocationIndexed {
        program: ProgramHandle,
        color_number: u32,
        index: u32,
        name: String,
    },
    BindAttribLocation {
        program: ProgramHandle,
        slot: u32,
        name: String,
    },
    LinkProgram(ProgramHandle),
    UseProgram(Option<ProgramHandle>),
    DeleteProgram(ProgramHandle),
    GetUniformLocation(ProgramHandle, String),
    SetUniformI32 {
        program: ProgramHandle,
        location: UniformLocation,
        value: i32,
    },
    GetUniformBlockIndex(ProgramHandle, String),
    UniformBlockBinding {
        program: ProgramHandle,
        block: UniformBlockIndex,
        binding: u32,
    },
    GetProgramBinary(ProgramHandle),
    LoadProgramBinary(ProgramHandle),
    CreateBuffer(BufferHandle, u64),
    WriteBuffer {
        buffer: BufferHandle,
        offset: u64,
        len: usize,
    },
    BindBufferRange {
        binding: u32,
        buffer: BufferHandle,
        offset: u64,
        size: u64,
    },
    DeleteBuffer(BufferHandle),
}

#[derive(Debug, Default)]
struct DummyProgram {
    shaders: Vec<ShaderId>,
    retrievable: bool,
    linked: bool,
    info_log: String,
}

#[derive(Debug, Default)]
struct DummyState {
    next_program: u32,
    next_buffer: u32,
    programs: HashMap<u32, DummyProgram>,
    buffers: HashMap<u32, Vec<u8>>,
    failing_pairs: Vec<(ShaderId, ShaderId)>,
    hidden_names: HashSet<String>,
    reject_binaries: bool,
    calls: Vec<BackendCall>,
}

/// Dummy program backend.
#[derive(Debug)]
pub struct DummyBackend {
    capabilities: PlatformCapabilities,
    binary_formats: Vec<u32>,
    state: Mutex<DummyState>,
}

impl DummyBackend {
    /// Create a dummy backend with every capability enabled.
    pub fn new() -> Self {
        Self::with_capabilities(PlatformCapabilities::default())
    }

    /// Create a dummy backend reporting the given capabilities.
    pub fn with_capabilities(capabilities: PlatformCapabilities) -> Self {
        Self {
            capabilities,
            binary_formats: vec![DUMMY_BINARY_FORMAT],
            state: Mutex::new(DummyState {
                next_program: 1,
                next_buffer: 1,
                ..Default::default()
            }),
        }
    }

    /// Report a different set of binary formats.
    pub fn with_binary_formats(mut self, formats: Vec<u32>) -> Self {
        self.binary_formats = formats;
        self
    }

    /// Make every program containing both shaders fail to link.
    pub fn fail_link_for(&self, fragment: ShaderId, vertex: ShaderId) {
        self.state.lock().failing_pairs.push((fragment, vertex));
    }

    /// Let programs containing both shaders link again.
    pub fn clear_link_failures(&self) {
        self.state.lock().failing_pairs.clear();
    }

    /// Report the named uniform or uniform block as absent from every program.
    pub fn hide_name(&self, name: &str) {
        self.state.lock().hidden_names.insert(name.to_string());
    }

    /// Reject every binary passed to [`ProgramBackend::load_program_binary`].
    pub fn reject_binaries(&self, reject: bool) {
        self.state.lock().reject_binaries = reject;
    }

    /// All calls recorded so far.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.state.lock().calls.clone()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Count recorded calls matching a predicate.
    pub fn count_calls(&self, predicate: impl Fn(&BackendCall) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| predicate(c)).count()
    }

    /// Number of link attempts recorded.
    pub fn link_count(&self) -> usize {
        self.count_calls(|c| matches!(c, BackendCall::LinkProgram(_)))
    }

    /// Number of program objects not yet deleted.
    pub fn live_programs(&self) -> usize {
        self.state.lock().programs.len()
    }

    /// Whether a program object exists and is linked.
    pub fn is_linked(&self, program: ProgramHandle) -> bool {
        self.state
            .lock()
            .programs
            .get(&program.0)
            .is_some_and(|p| p.linked)
    }

    /// Number of buffers not yet deleted.
    pub fn live_buffers(&self) -> usize {
        self.state.lock().buffers.len()
    }

    /// Current contents of a buffer.
    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<Vec<u8>> {
        self.state.lock().buffers.get(&buffer.0).cloned()
    }

    fn record(state: &mut DummyState, call: BackendCall) {
        log::trace!("DummyBackend: {:?}", call);
        state.calls.push(call);
    }

    fn fake_binary(format: u32, shaders: &[ShaderId]) -> ProgramBinary {
        let mut data = DUMMY_BINARY_MAGIC.to_vec();
        for shader in shaders {
            data.extend_from_slice(&shader.raw().to_le_bytes());
        }
        ProgramBinary::new(format, data)
    }

    fn fake_binary_shaders(binary: &ProgramBinary) -> Option<Vec<ShaderId>> {
        let body = binary.data.strip_prefix(DUMMY_BINARY_MAGIC.as_slice())?;
        if body.len() % 4 != 0 {
            return None;
        }
        Some(
            body.chunks_exact(4)
                .map(|c| ShaderId(u32::from_le_bytes([c[0], c[1], c[2], c[3]])))
                .collect(),
        )
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy Backend"
    }

    fn capabilities(&self) -> PlatformCapabilities {
        self.capabilities
    }

    fn program_binary_formats(&self) -> Vec<u32> {
        self.binary_formats.clone()
    }

    fn create_program(&self) -> Result<ProgramHandle, String> {
        let mut state = self.state.lock();
        let handle = ProgramHandle(state.next_program);
        state.next_program += 1;
        state.programs.insert(handle.0, DummyProgram::default());
        Self::record(&mut state, BackendCall::CreateProgram(handle));
        Ok(handle)
    }

    fn attach_shader(&self, program: ProgramHandle, shader: ShaderId) {
        let mut state = self.state.lock();
        if let Some(p) = state.programs.get_mut(&program.0) {
            p.shaders.push(shader);
        }
        Self::record(&mut state, BackendCall::AttachShader(program, shader));
    }

    fn set_binary_retrievable_hint(&self, program: ProgramHandle) {
        let mut state = self.state.lock();
        if let Some(p) = state.programs.get_mut(&program.0) {
            p.retrievable = true;
        }
        Self::record(&mut state, BackendCall::BinaryRetrievableHint(program));
    }

    fn bind_frag_data_location(&self, program: ProgramHandle, color_number: u32, name: &str) {
        let mut state = self.state.lock();
        Self::record(
            &mut state,
            BackendCall::BindFragDataLocation {
                program,
                color_number,
                name: name.to_string(),
            },
        );
    }

    fn bind_frag_data_location_indexed(
        &self,
        program: ProgramHandle,
        color_number: u32,
        index: u32,
        name: &str,
    ) {
        let mut state = self.state.lock();
        Self::record(
            &mut state,
            BackendCall::BindFragDataLocationIndexed {
                program,
                color_number,
                index,
                name: name.to_string(),
            },
        );
    }

    fn bind_attrib_location(&self, program: ProgramHandle, slot: u32, name: &str) {
        let mut state = self.state.lock();
        Self::record(
            &mut state,
            BackendCall::BindAttribLocation {
                program,
                slot,
                name: name.to_string(),
            },
        );
    }

    fn link_program(&self, program: ProgramHandle) -> LinkStatus {
        let mut state = self.state.lock();
        Self::record(&mut state, BackendCall::LinkProgram(program));

        let failing = state.failing_pairs.clone();
        let Some(p) = state.programs.get_mut(&program.0) else {
            return LinkStatus::Failed;
        };
        let fails = failing
            .iter()
            .any(|(fs, vs)| p.shaders.contains(fs) && p.shaders.contains(vs));
        if fails || p.shaders.len() < 2 {
            p.linked = false;
            p.info_log = format!(
                "error: linking shaders {:?} failed (dummy driver)",
                p.shaders
            );
            LinkStatus::Failed
        } else {
            p.linked = true;
            p.info_log.clear();
            LinkStatus::Linked
        }
    }

    fn program_info_log(&self, program: ProgramHandle) -> String {
        self.state
            .lock()
            .programs
            .get(&program.0)
            .map(|p| p.info_log.clone())
            .unwrap_or_default()
    }

    fn use_program(&self, program: Option<ProgramHandle>) {
        let mut state = self.state.lock();
        Self::record(&mut state, BackendCall::UseProgram(program));
    }

    fn delete_program(&self, program: ProgramHandle) {
        let mut state = self.state.lock();
        state.programs.remove(&program.0);
        Self::record(&mut state, BackendCall::DeleteProgram(program));
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let mut state = self.state.lock();
        Self::record(
            &mut state,
            BackendCall::GetUniformLocation(program, name.to_string()),
        );
        if state.hidden_names.contains(name) {
            return None;
        }
        UNIFORM_NAMES
            .iter()
            .chain(SAMPLER_UNIFORMS.iter())
            .position(|n| *n == name)
            .map(|i| UniformLocation(i as i32))
    }

    fn set_uniform_i32(&self, program: ProgramHandle, location: UniformLocation, value: i32) {
        let mut state = self.state.lock();
        Self::record(
            &mut state,
            BackendCall::SetUniformI32 {
                program,
                location,
                value,
            },
        );
    }

    fn uniform_block_index(
        &self,
        program: ProgramHandle,
        name: &str,
    ) -> Option<UniformBlockIndex> {
        let mut state = self.state.lock();
        Self::record(
            &mut state,
            BackendCall::GetUniformBlockIndex(program, name.to_string()),
        );
        if state.hidden_names.contains(name) {
            return None;
        }
        [FRAGMENT_BLOCK_NAME, VERTEX_BLOCK_NAME]
            .iter()
            .position(|n| *n == name)
            .map(|i| UniformBlockIndex(i as u32))
    }

    fn uniform_block_binding(&self, program: ProgramHandle, block: UniformBlockIndex, binding: u32) {
        let mut state = self.state.lock();
        Self::record(
            &mut state,
            BackendCall::UniformBlockBinding {
                program,
                block,
                binding,
            },
        );
    }

    fn program_binary(&self, program: ProgramHandle) -> Option<ProgramBinary> {
        let mut state = self.state.lock();
        Self::record(&mut state, BackendCall::GetProgramBinary(program));
        let format = *self.binary_formats.first()?;
        let p = state.programs.get(&program.0)?;
        if !p.linked || !p.retrievable {
            return None;
        }
        Some(Self::fake_binary(format, &p.shaders))
    }

    fn load_program_binary(&self, program: ProgramHandle, binary: &ProgramBinary) -> bool {
        let mut state = self.state.lock();
        Self::record(&mut state, BackendCall::LoadProgramBinary(program));
        if state.reject_binaries || !self.binary_formats.contains(&binary.format) {
            return false;
        }
        let Some(shaders) = Self::fake_binary_shaders(binary) else {
            return false;
        };
        match state.programs.get_mut(&program.0) {
            Some(p) => {
                p.shaders = shaders;
                p.linked = true;
                p.retrievable = true;
                true
            }
            None => false,
        }
    }

    fn create_uniform_buffer(&self, size: u64) -> Result<BufferHandle, String> {
        let mut state = self.state.lock();
        let handle = BufferHandle(state.next_buffer);
        state.next_buffer += 1;
        state.buffers.insert(handle.0, vec![0u8; size as usize]);
        Self::record(&mut state, BackendCall::CreateBuffer(handle, size));
        Ok(handle)
    }

    fn write_buffer(&self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        let mut state = self.state.lock();
        if let Some(contents) = state.buffers.get_mut(&buffer.0) {
            let start = offset as usize;
            let end = start + data.len();
            if end <= contents.len() {
                contents[start..end].copy_from_slice(data);
            } else {
                log::warn!(
                    "DummyBackend: write past end of buffer {:?} ({}..{} > {})",
                    buffer,
                    start,
                    end,
                    contents.len()
                );
            }
        }
        Self::record(
            &mut state,
            BackendCall::WriteBuffer {
                buffer,
                offset,
                len: data.len(),
            },
        );
    }

    fn bind_buffer_range(&self, binding: u32, buffer: BufferHandle, offset: u64, size: u64) {
        let mut state = self.state.lock();
        Self::record(
            &mut state,
            BackendCall::BindBufferRange {
                binding,
                buffer,
                offset,
                size,
            },
        );
    }

    fn delete_buffer(&self, buffer: BufferHandle) {
        let mut state = self.state.lock();
        state.buffers.remove(&buffer.0);
        Self::record(&mut state, BackendCall::DeleteBuffer(buffer));
    }
}

static_assertions::assert_impl_all!(DummyBackend: Send, Sync);
