//! Program disk cache integration tests: restoring persisted binaries at
//! session start and appending new ones at shutdown.

mod common;

use std::sync::Arc;

use rstest::rstest;

use common::{dummy_record, pair, store_with, temp_cache_path, Platform, TestContext};
use redlilium_program_cache::backend::dummy::{BackendCall, DummyBackend, DUMMY_BINARY_FORMAT};
use redlilium_program_cache::{
    FileProgramStore, ProgramBinary, RenderingSession, SessionConfig, ShaderId,
};

#[test]
fn test_restore_rejects_foreign_format() {
    let foreign = ProgramBinary::new(
        DUMMY_BINARY_FORMAT ^ 0xFFFF,
        b"RLDB\x03\0\0\0\x07\0\0\0".to_vec(),
    );
    let store = store_with(&[(pair(7, 3).to_bits(), foreign.encode())]);

    let mut ctx = TestContext::with_store(Platform::Desktop, store);

    assert!(ctx.session.cache().is_empty());
    assert_eq!(ctx.session.restore_stats().records, 1);
    assert_eq!(ctx.session.restore_stats().format_mismatches, 1);
    assert_eq!(ctx.backend.live_programs(), 0);
    ctx.session.shutdown().unwrap();
}

#[test]
fn test_restore_matching_format_binds_without_link() {
    let store = store_with(&[(pair(7, 3).to_bits(), dummy_record(7, 3))]);
    let mut ctx = TestContext::with_store(Platform::Desktop, store);

    assert_eq!(ctx.session.cache().len(), 1);
    assert_eq!(ctx.session.restore_stats().restored, 1);
    assert!(ctx.session.cache().get(pair(7, 3)).unwrap().is_restored());
    assert_eq!(ctx.session.current_program(), None);

    let program = ctx
        .session
        .resolve_program(ShaderId(7), ShaderId(3))
        .unwrap()
        .handle();
    assert_eq!(ctx.backend.link_count(), 0);
    assert!(ctx.backend.is_linked(program));
    assert!(ctx
        .calls()
        .contains(&BackendCall::LoadProgramBinary(program)));
    ctx.session.shutdown().unwrap();
}

#[test]
fn test_restored_program_resolves_uniforms() {
    let store = store_with(&[(pair(7, 3).to_bits(), dummy_record(7, 3))]);
    let mut ctx = TestContext::with_store(Platform::Desktop, store);

    let entry = ctx.session.cache().get(pair(7, 3)).unwrap();
    assert!(entry
        .uniform_location(redlilium_program_cache::Uniform::Colors)
        .is_some());
    assert_eq!(
        ctx.backend
            .count_calls(|c| matches!(c, BackendCall::UniformBlockBinding { .. })),
        2
    );
    ctx.session.shutdown().unwrap();
}

#[test]
fn test_restore_skips_bad_records() {
    let store = store_with(&[
        (pair(0, 3).to_bits(), dummy_record(0, 3)),
        (pair(1, 2).to_bits(), vec![0xAB]),
        (pair(4, 5).to_bits(), dummy_record(4, 5)),
        (pair(4, 5).to_bits(), dummy_record(4, 5)),
    ]);
    let mut ctx = TestContext::with_store(Platform::Desktop, store);

    let stats = ctx.session.restore_stats();
    assert_eq!(stats.records, 4);
    assert_eq!(stats.restored, 1);
    assert_eq!(stats.skipped, 3);
    assert!(ctx.session.cache().contains(pair(4, 5)));
    ctx.session.shutdown().unwrap();
}

#[test]
fn test_driver_rejecting_binaries_falls_back_to_link() {
    let backend = DummyBackend::new();
    backend.reject_binaries(true);
    let store = store_with(&[(pair(7, 3).to_bits(), dummy_record(7, 3))]);
    let mut ctx = TestContext::with_backend(backend, store);

    assert!(ctx.session.cache().is_empty());
    assert_eq!(ctx.backend.live_programs(), 0);

    ctx.session
        .resolve_program(ShaderId(7), ShaderId(3))
        .unwrap();
    assert_eq!(ctx.backend.link_count(), 1);
    ctx.session.shutdown().unwrap();
}

#[rstest]
#[case::no_binary(Platform::NoBinary)]
#[case::legacy(Platform::Legacy)]
fn test_no_restore_without_binary_support(#[case] platform: Platform) {
    let store = store_with(&[(pair(7, 3).to_bits(), dummy_record(7, 3))]);
    let mut ctx = TestContext::with_store(platform, store);

    assert!(!ctx.session.disk_cache_enabled());
    assert!(ctx.session.cache().is_empty());
    assert_eq!(
        ctx.backend
            .count_calls(|c| matches!(c, BackendCall::LoadProgramBinary(_))),
        0
    );
    ctx.session.shutdown().unwrap();
    assert_eq!(ctx.persisted().len(), 1);
}

#[test]
fn test_restored_programs_not_appended_again() {
    let store = store_with(&[(pair(7, 3).to_bits(), dummy_record(7, 3))]);
    let mut ctx = TestContext::with_store(Platform::Desktop, store);

    ctx.session
        .resolve_program(ShaderId(7), ShaderId(3))
        .unwrap();
    ctx.session
        .resolve_program(ShaderId(9), ShaderId(3))
        .unwrap();

    assert_eq!(ctx.session.shutdown().unwrap(), 1);
    let identities: Vec<u64> = ctx.persisted().iter().map(|(k, _)| *k).collect();
    assert_eq!(
        identities,
        vec![pair(7, 3).to_bits(), pair(9, 3).to_bits()]
    );
    assert_eq!(ctx.store.sync_count(), 1);
}

#[test]
fn test_file_store_across_sessions() {
    common::init_logging();
    let dir = tempfile::tempdir().unwrap();
    let config = SessionConfig::new()
        .with_cache_dir(dir.path())
        .with_unique_id("GZLE01");
    assert_eq!(
        config.cache_file_path(),
        Some(temp_cache_path(&dir, "GZLE01"))
    );

    // First run links two programs and persists them.
    let backend = Arc::new(DummyBackend::new());
    let mut session = RenderingSession::new(backend.clone(), config.clone()).unwrap();
    session.resolve_program(ShaderId(7), ShaderId(3)).unwrap();
    session.resolve_program(ShaderId(8), ShaderId(3)).unwrap();
    assert_eq!(session.shutdown().unwrap(), 2);
    assert!(temp_cache_path(&dir, "GZLE01").exists());

    // Second run restores both and links nothing.
    let backend = Arc::new(DummyBackend::new());
    let mut session = RenderingSession::new(backend.clone(), config.clone()).unwrap();
    assert_eq!(session.restore_stats().restored, 2);
    session.resolve_program(ShaderId(7), ShaderId(3)).unwrap();
    session.resolve_program(ShaderId(8), ShaderId(3)).unwrap();
    assert_eq!(backend.link_count(), 0);
    assert_eq!(session.shutdown().unwrap(), 0);

    // A driver with another binary format ignores the file.
    let backend = Arc::new(DummyBackend::new().with_binary_formats(vec![0x1234]));
    let mut session = RenderingSession::new(backend.clone(), config).unwrap();
    assert_eq!(session.cache().len(), 0);
    assert_eq!(session.restore_stats().format_mismatches, 2);
    session.shutdown().unwrap();
}

#[test]
fn test_unopenable_store_is_not_fatal() {
    common::init_logging();
    let dir = tempfile::tempdir().unwrap();
    // A directory where the cache file should be makes the open fail.
    let path = dir.path().join("blocked.cache");
    std::fs::create_dir(&path).unwrap();

    let backend = Arc::new(DummyBackend::new());
    let config = SessionConfig::new().with_cache_path(path.clone());
    let mut session =
        RenderingSession::with_store(backend.clone(), config, Box::new(FileProgramStore::new()))
            .unwrap();

    assert!(!session.disk_cache_enabled());
    session.resolve_program(ShaderId(7), ShaderId(3)).unwrap();
    assert_eq!(session.shutdown().unwrap(), 0);
    assert_eq!(backend.live_programs(), 0);
}
