//! Streaming buffer for shader constant uploads.
//!
//! The staging buffer uploads its whole constant region every time it is
//! flushed, many times per frame. Instead of creating a new buffer per upload
//! or waiting for the GPU, the region is written into consecutive slices of
//! one large buffer, wrapping around when the end is reached.
//!
//! The cache only depends on the [`StreamingBuffer`] contract; [`StreamBuffer`]
//! is the ring-backed implementation used by sessions.
//!
//! # Example
//!
//! ```ignore
//! let mut stream = StreamBuffer::new(backend.clone(), 4 * 1024 * 1024, 256)?;
//!
//! stream.reserve(region.len() as u64)?;
//! let offset = stream.upload(&region)?;
//! backend.bind_buffer_range(1, stream.buffer(), offset, region.len() as u64);
//! ```

use std::sync::Arc;

use crate::backend::ProgramBackend;
use crate::error::{ProgramCacheError, ProgramCacheResult};
use crate::types::BufferHandle;

/// Default streaming buffer size (4 MiB).
pub const DEFAULT_STREAM_BUFFER_SIZE: u64 = 4 * 1024 * 1024;

/// Upload contract consumed by the constant staging buffer.
pub trait StreamingBuffer {
    /// Make room for an upload of `size` bytes.
    fn reserve(&mut self, size: u64) -> ProgramCacheResult<()>;

    /// Upload `data` into the reserved space and return its byte offset in
    /// the physical buffer.
    fn upload(&mut self, data: &[u8]) -> ProgramCacheResult<u64>;

    /// The physical buffer uploads land in.
    fn buffer(&self) -> BufferHandle;
}

/// A sub-allocation from a stream buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamAllocation {
    /// Byte offset into the stream buffer.
    pub offset: u64,
    /// Size of the allocation in bytes.
    pub size: u64,
}

impl StreamAllocation {
    /// Create a new allocation.
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }
}

/// Ring-allocated uniform buffer.
///
/// Allocations are aligned to the platform's uniform buffer offset alignment
/// so every upload can be bound as a uniform range directly. When an
/// allocation does not fit in the space left, the write offset wraps to the
/// start of the buffer.
///
/// # Thread Safety
///
/// `StreamBuffer` is NOT thread-safe. It belongs to the rendering thread
/// that owns the session.
pub struct StreamBuffer {
    backend: Arc<dyn ProgramBackend>,
    buffer: BufferHandle,
    capacity: u64,
    write_offset: u64,
    alignment: u64,
    wrap_count: u64,
    reserved: Option<StreamAllocation>,
}

impl StreamBuffer {
    /// Create a stream buffer of `capacity` bytes.
    ///
    /// # Arguments
    ///
    /// * `backend` - The backend that owns the physical buffer
    /// * `capacity` - Total size of the buffer in bytes
    /// * `alignment` - Alignment for allocations (must be power of 2)
    pub fn new(
        backend: Arc<dyn ProgramBackend>,
        capacity: u64,
        alignment: u64,
    ) -> ProgramCacheResult<Self> {
        if !alignment.is_power_of_two() {
            return Err(ProgramCacheError::InvalidAlignment(alignment));
        }

        if capacity == 0 {
            return Err(ProgramCacheError::Backend(
                "stream buffer capacity cannot be zero".to_string(),
            ));
        }

        let capacity = align_up(capacity, alignment);
        let buffer = backend
            .create_uniform_buffer(capacity)
            .map_err(ProgramCacheError::Backend)?;

        log::debug!(
            "Created {} byte constant stream buffer {:?} on {}",
            capacity,
            buffer,
            backend.name()
        );

        Ok(Self {
            backend,
            buffer,
            capacity,
            write_offset: 0,
            alignment,
            wrap_count: 0,
            reserved: None,
        })
    }

    /// Get the total capacity of the buffer.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Get the current write offset.
    pub fn write_offset(&self) -> u64 {
        self.write_offset
    }

    /// Get the number of times the buffer has wrapped around.
    pub fn wrap_count(&self) -> u64 {
        self.wrap_count
    }

    /// Get the amount of space remaining before wrapping.
    pub fn remaining(&self) -> u64 {
        self.capacity - self.write_offset
    }

    /// Allocate `size` bytes at the next aligned offset, wrapping to the start
    /// of the buffer if the allocation would run past the end.
    fn allocate(&mut self, size: u64) -> ProgramCacheResult<StreamAllocation> {
        if size > self.capacity {
            return Err(ProgramCacheError::StreamBufferExhausted {
                requested: size,
                capacity: self.capacity,
            });
        }

        let mut offset = align_up(self.write_offset, self.alignment);
        if offset + size > self.capacity {
            offset = 0;
            self.wrap_count += 1;
        }

        Ok(StreamAllocation::new(offset, size))
    }

    /// Release the physical buffer.
    pub fn destroy(self) {
        self.backend.delete_buffer(self.buffer);
    }
}

impl StreamingBuffer for StreamBuffer {
    fn reserve(&mut self, size: u64) -> ProgramCacheResult<()> {
        let allocation = self.allocate(size)?;
        self.reserved = Some(allocation);
        Ok(())
    }

    fn upload(&mut self, data: &[u8]) -> ProgramCacheResult<u64> {
        let size = data.len() as u64;
        let allocation = match self.reserved.take() {
            Some(reserved) if reserved.size >= size => reserved,
            _ => self.allocate(size)?,
        };

        self.backend.write_buffer(self.buffer, allocation.offset, data);
        self.write_offset = allocation.offset + size;
        Ok(allocation.offset)
    }

    fn buffer(&self) -> BufferHandle {
        self.buffer
    }
}

impl std::fmt::Debug for StreamBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamBuffer")
            .field("buffer", &self.buffer)
            .field("capacity", &self.capacity)
            .field("write_offset", &self.write_offset)
            .field("alignment", &self.alignment)
            .field("wrap_count", &self.wrap_count)
            .finish()
    }
}

/// Align a value up to the given alignment.
#[inline]
pub(crate) fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}
