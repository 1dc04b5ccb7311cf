//! CPU-side staging of shader constants.
//!
//! Fragment and vertex constants live in one register buffer, fragment block
//! first. The vertex block starts at the fragment block size rounded up to
//! the uniform buffer offset alignment, so after an upload each block can be
//! bound as its own uniform range out of the same physical buffer.
//!
//! Writes only touch the CPU copy and set the dirty flag. Nothing reaches the
//! GPU until [`ConstantStagingBuffer::flush_if_dirty`] is called, which the
//! caller must do after a batch of writes and before the draw that reads them.

use std::ops::Range;

use crate::backend::ProgramBackend;
use crate::bindings::{FRAGMENT_BLOCK_BINDING, VERTEX_BLOCK_BINDING};
use crate::error::{ProgramCacheError, ProgramCacheResult};
use crate::stream_buffer::{align_up, StreamingBuffer};
use crate::types::BufferHandle;

/// A four-component constant register.
pub type Vec4 = [f32; 4];

/// Size of one constant register in bytes.
pub const VEC4_SIZE: usize = std::mem::size_of::<Vec4>();

/// Number of fragment-stage constant registers.
pub const FRAGMENT_CONSTANT_VECTORS: usize = 74;

/// Number of vertex-stage constant registers.
pub const VERTEX_CONSTANT_VECTORS: usize = 239;

static_assertions::const_assert_eq!(VEC4_SIZE, 16);

/// One of the two constant blocks in the staging buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstantBlock {
    Fragment,
    Vertex,
}

impl ConstantBlock {
    /// Uniform buffer binding point the block is bound to.
    pub const fn binding(self) -> u32 {
        match self {
            Self::Fragment => FRAGMENT_BLOCK_BINDING,
            Self::Vertex => VERTEX_BLOCK_BINDING,
        }
    }

    /// Number of registers the block holds.
    pub const fn capacity(self) -> usize {
        match self {
            Self::Fragment => FRAGMENT_CONSTANT_VECTORS,
            Self::Vertex => VERTEX_CONSTANT_VECTORS,
        }
    }
}

/// Uniform ranges bound by a flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundConstantRanges {
    /// Physical buffer the ranges point into.
    pub buffer: BufferHandle,
    /// Byte range bound to the fragment block binding point.
    pub fragment: Range<u64>,
    /// Byte range bound to the vertex block binding point.
    pub vertex: Range<u64>,
}

/// Staging buffer for fragment and vertex shader constants.
pub struct ConstantStagingBuffer {
    data: Vec<Vec4>,
    vertex_start: usize,
    alignment: u64,
    dirty: bool,
    upload_count: u64,
}

impl ConstantStagingBuffer {
    /// Lay out both blocks for the given uniform buffer offset alignment.
    ///
    /// The buffer starts zero-filled and dirty, so the first flush always
    /// uploads.
    pub fn new(alignment: u64) -> ProgramCacheResult<Self> {
        if !alignment.is_power_of_two() {
            return Err(ProgramCacheError::InvalidAlignment(alignment));
        }

        let fragment_size = align_up((FRAGMENT_CONSTANT_VECTORS * VEC4_SIZE) as u64, alignment);
        let vertex_size = align_up((VERTEX_CONSTANT_VECTORS * VEC4_SIZE) as u64, alignment);
        let registers = (fragment_size + vertex_size) as usize / VEC4_SIZE;

        Ok(Self {
            data: vec![[0.0; 4]; registers],
            vertex_start: fragment_size as usize / VEC4_SIZE,
            alignment,
            dirty: true,
            upload_count: 0,
        })
    }

    /// Byte offset where the vertex block starts.
    pub fn vertex_offset(&self) -> usize {
        self.vertex_start * VEC4_SIZE
    }

    /// Size of the fragment block in bytes, including alignment padding.
    pub fn fragment_block_size(&self) -> usize {
        self.vertex_offset()
    }

    /// Size of the vertex block in bytes, including alignment padding.
    pub fn vertex_block_size(&self) -> usize {
        (self.data.len() - self.vertex_start) * VEC4_SIZE
    }

    /// Total size of the staged region in bytes.
    pub fn total_size(&self) -> usize {
        self.data.len() * VEC4_SIZE
    }

    /// Alignment the layout was computed for.
    pub fn alignment(&self) -> u64 {
        self.alignment
    }

    /// Whether anything was written since the last flush.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of uploads performed so far.
    pub fn upload_count(&self) -> u64 {
        self.upload_count
    }

    /// The staged bytes.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    /// Read back staged registers of a block.
    pub fn read(&self, block: ConstantBlock, offset: usize, count: usize) -> &[Vec4] {
        &self.block(block)[offset..offset + count]
    }

    /// Copy registers into the fragment block starting at register `offset`.
    ///
    /// The caller must keep `offset + values.len()` within
    /// [`FRAGMENT_CONSTANT_VECTORS`]. A violation panics; it never spills into
    /// the vertex block.
    #[inline]
    pub fn write_fragment_constants(&mut self, offset: usize, values: &[Vec4]) {
        self.write(ConstantBlock::Fragment, offset, values);
    }

    /// Copy registers into the vertex block starting at register `offset`.
    ///
    /// The caller must keep `offset + values.len()` within
    /// [`VERTEX_CONSTANT_VECTORS`].
    #[inline]
    pub fn write_vertex_constants(&mut self, offset: usize, values: &[Vec4]) {
        self.write(ConstantBlock::Vertex, offset, values);
    }

    /// Copy registers into a block.
    #[inline]
    pub fn write(&mut self, block: ConstantBlock, offset: usize, values: &[Vec4]) {
        debug_assert!(
            offset + values.len() <= block.capacity(),
            "{block:?} constant write out of range: {offset} + {} > {}",
            values.len(),
            block.capacity()
        );

        self.block_mut(block)[offset..offset + values.len()].copy_from_slice(values);
        self.dirty = true;
    }

    /// Bounds-checked form of [`write`](Self::write).
    pub fn try_write(
        &mut self,
        block: ConstantBlock,
        offset: usize,
        values: &[Vec4],
    ) -> ProgramCacheResult<()> {
        let capacity = block.capacity();
        if offset
            .checked_add(values.len())
            .map_or(true, |end| end > capacity)
        {
            return Err(ProgramCacheError::OutOfRangeWrite {
                block,
                offset,
                count: values.len(),
                capacity,
            });
        }
        self.write(block, offset, values);
        Ok(())
    }

    /// Upload the staged region and bind both blocks, if anything changed.
    ///
    /// Returns the bound ranges, or `None` if the buffer was clean. On error
    /// the buffer stays dirty so the next flush retries.
    pub fn flush_if_dirty(
        &mut self,
        stream: &mut dyn StreamingBuffer,
        backend: &dyn ProgramBackend,
    ) -> ProgramCacheResult<Option<BoundConstantRanges>> {
        if !self.dirty {
            return Ok(None);
        }

        let total = self.total_size() as u64;
        let split = self.vertex_offset() as u64;

        stream.reserve(total)?;
        let base = stream.upload(self.as_bytes())?;
        let buffer = stream.buffer();

        let ranges = BoundConstantRanges {
            buffer,
            fragment: base..base + split,
            vertex: base + split..base + total,
        };
        backend.bind_buffer_range(FRAGMENT_BLOCK_BINDING, buffer, base, split);
        backend.bind_buffer_range(VERTEX_BLOCK_BINDING, buffer, base + split, total - split);

        self.dirty = false;
        self.upload_count += 1;
        Ok(Some(ranges))
    }

    fn block(&self, block: ConstantBlock) -> &[Vec4] {
        match block {
            ConstantBlock::Fragment => &self.data[..self.vertex_start],
            ConstantBlock::Vertex => &self.data[self.vertex_start..],
        }
    }

    fn block_mut(&mut self, block: ConstantBlock) -> &mut [Vec4] {
        match block {
            ConstantBlock::Fragment => &mut self.data[..self.vertex_start],
            ConstantBlock::Vertex => &mut self.data[self.vertex_start..],
        }
    }
}

impl std::fmt::Debug for ConstantStagingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstantStagingBuffer")
            .field("total_size", &self.total_size())
            .field("vertex_offset", &self.vertex_offset())
            .field("alignment", &self.alignment)
            .field("dirty", &self.dirty)
            .finish()
    }
}
