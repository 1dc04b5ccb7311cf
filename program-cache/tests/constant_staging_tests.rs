//! Constant staging integration tests: writes through a session, uploads
//! through the stream buffer and the uniform ranges bound for each block.

mod common;

use rstest::rstest;

use common::{Platform, TestContext};
use redlilium_program_cache::backend::dummy::{BackendCall, DummyBackend};
use redlilium_program_cache::staging::{FRAGMENT_CONSTANT_VECTORS, VERTEX_CONSTANT_VECTORS};
use redlilium_program_cache::{
    ConstantBlock, ConstantStagingBuffer, MemoryProgramStore, ProgramCacheError,
};

fn bound_ranges(ctx: &TestContext) -> Vec<(u32, u64, u64)> {
    ctx.calls()
        .into_iter()
        .filter_map(|c| match c {
            BackendCall::BindBufferRange {
                binding,
                offset,
                size,
                ..
            } => Some((binding, offset, size)),
            _ => None,
        })
        .collect()
}

#[rstest]
#[case::align_4(4)]
#[case::align_64(64)]
#[case::align_256(256)]
#[case::align_1024(1024)]
fn test_flush_binds_block_sized_ranges(#[case] alignment: u64) {
    let backend = DummyBackend::with_capabilities(Platform::Desktop.capabilities(alignment));
    let mut ctx = TestContext::with_backend(backend, MemoryProgramStore::new());

    let constants = ctx.session.constants_mut().unwrap();
    constants.write_fragment_constants(10, &[[1.0, 0.5, 0.25, 0.0]; 4]);
    let fragment_size = constants.fragment_block_size() as u64;
    let total = constants.total_size() as u64;
    assert_eq!(fragment_size % alignment, 0);

    let ranges = ctx.session.flush_constants().unwrap().unwrap();
    assert_eq!(ranges.fragment.end - ranges.fragment.start, fragment_size);
    assert_eq!(ranges.vertex.end - ranges.vertex.start, total - fragment_size);
    assert_eq!(ranges.fragment.start % alignment, 0);

    assert_eq!(
        bound_ranges(&ctx),
        vec![
            (1, ranges.fragment.start, fragment_size),
            (2, ranges.vertex.start, total - fragment_size),
        ]
    );
    ctx.session.shutdown().unwrap();
}

#[test]
fn test_flush_without_writes_is_noop() {
    let mut ctx = TestContext::new(Platform::Desktop);

    // Fresh buffers start dirty so the first draw sees zeroed constants.
    assert!(ctx.session.flush_constants().unwrap().is_some());
    assert!(ctx.session.flush_constants().unwrap().is_none());
    assert!(ctx.session.flush_constants().unwrap().is_none());

    assert_eq!(
        ctx.backend
            .count_calls(|c| matches!(c, BackendCall::WriteBuffer { .. })),
        1
    );
    assert_eq!(bound_ranges(&ctx).len(), 2);
    ctx.session.shutdown().unwrap();
}

#[test]
fn test_uploaded_bytes_match_staging() {
    let mut ctx = TestContext::new(Platform::Desktop);
    {
        let constants = ctx.session.constants_mut().unwrap();
        constants.write_fragment_constants(0, &[[1.0, 2.0, 3.0, 4.0]]);
        constants.write_vertex_constants(
            VERTEX_CONSTANT_VECTORS - 1,
            &[[5.0, 6.0, 7.0, 8.0]],
        );
    }

    let ranges = ctx.session.flush_constants().unwrap().unwrap();
    let uploaded = ctx.backend.buffer_contents(ranges.buffer).unwrap();
    let staged = ctx.session.constants().unwrap().as_bytes();
    let start = ranges.fragment.start as usize;
    assert_eq!(&uploaded[start..start + staged.len()], staged);

    let vertex = ctx.session.constants().unwrap().read(
        ConstantBlock::Vertex,
        VERTEX_CONSTANT_VECTORS - 1,
        1,
    );
    assert_eq!(vertex, &[[5.0, 6.0, 7.0, 8.0]]);
    ctx.session.shutdown().unwrap();
}

#[test]
fn test_successive_flushes_advance_through_stream() {
    let mut ctx = TestContext::new(Platform::Desktop);
    let mut starts = Vec::new();

    for frame in 0..4 {
        ctx.session
            .constants_mut()
            .unwrap()
            .write_vertex_constants(0, &[[frame as f32; 4]]);
        let ranges = ctx.session.flush_constants().unwrap().unwrap();
        starts.push(ranges.fragment.start);
    }

    let total = ctx.session.constants().unwrap().total_size() as u64;
    for pair in starts.windows(2) {
        assert_eq!(pair[1] - pair[0], total);
    }
    ctx.session.shutdown().unwrap();
}

#[rstest]
#[case::fragment(ConstantBlock::Fragment, FRAGMENT_CONSTANT_VECTORS)]
#[case::vertex(ConstantBlock::Vertex, VERTEX_CONSTANT_VECTORS)]
fn test_checked_write_bounds(#[case] block: ConstantBlock, #[case] capacity: usize) {
    let mut staging = ConstantStagingBuffer::new(256).unwrap();

    staging.try_write(block, capacity - 2, &[[1.0; 4]; 2]).unwrap();

    let err = staging
        .try_write(block, capacity - 1, &[[1.0; 4]; 2])
        .unwrap_err();
    match err {
        ProgramCacheError::OutOfRangeWrite {
            block: failed,
            offset,
            count,
            capacity: reported,
        } => {
            assert_eq!(failed, block);
            assert_eq!(offset, capacity - 1);
            assert_eq!(count, 2);
            assert_eq!(reported, capacity);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_no_staging_without_uniform_blocks() {
    let mut ctx = TestContext::new(Platform::Legacy);
    assert!(ctx.session.constants().is_none());
    assert_eq!(ctx.session.flush_constants().unwrap(), None);
    assert_eq!(ctx.backend.live_buffers(), 0);
    ctx.session.shutdown().unwrap();
}

#[test]
fn test_shutdown_releases_stream_buffer() {
    let mut ctx = TestContext::new(Platform::Desktop);
    assert_eq!(ctx.backend.live_buffers(), 1);
    ctx.session.shutdown().unwrap();
    assert_eq!(ctx.backend.live_buffers(), 0);
}
