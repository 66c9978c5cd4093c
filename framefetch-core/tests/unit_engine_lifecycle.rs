//! Lifecycle, failure and backpressure tests for the prefetch engine

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{numbered, CountingLoader, Fixture};
use framefetch_core::runtime::{FetchRuntime, RuntimeConfig};
use framefetch_core::{EngineState, FetchError, PrefetchEngine};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_missing_frame_is_fatal_and_sticky() {
    let fixture = Fixture::new();
    fixture.image("ok.png", 4, 4, [1, 2, 3]).label("lbl.png", [0, 0, 0]);
    let manifest = fixture.manifest(&["ok.png lbl.png", "missing.png lbl.png"]);

    let mut engine = PrefetchEngine::new(fixture.config(manifest, 2, 1));
    engine.start().unwrap();

    let err = engine.next_batch().await.unwrap_err();
    match &err {
        FetchError::DecodeFailed { path, .. } => assert!(path.ends_with("missing.png")),
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(engine.next_batch().await.unwrap_err(), err);
    assert_eq!(engine.try_next_batch().unwrap_err(), err);
    assert_eq!(engine.state(), EngineState::Stopped);
    engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_missing_label_is_fatal() {
    let fixture = Fixture::new();
    fixture.image("a.png", 4, 4, [1, 2, 3]).label("lbl.png", [0, 0, 0]);
    let manifest = fixture.manifest(&["a.png lbl.png", "a.png nolabel.png"]);

    let mut engine = PrefetchEngine::new(fixture.config(manifest, 1, 1));
    engine.start().unwrap();

    // The first batch may already be queued; the failure surfaces either way
    let mut result = engine.next_batch().await.map(|b| b.sequence);
    if result.is_ok() {
        result = engine.next_batch().await.map(|b| b.sequence);
    }
    assert!(matches!(result, Err(FetchError::DecodeFailed { .. })));
}

#[tokio::test]
async fn test_setup_probe_failure_rejects_start() {
    let fixture = Fixture::new();
    let manifest = fixture.manifest(&["missing.png lbl.png"]);

    let mut engine = PrefetchEngine::new(fixture.config(manifest, 1, 1));
    let err = engine.start().unwrap_err();
    assert!(matches!(err, FetchError::DecodeFailed { .. }));
    assert_eq!(engine.state(), EngineState::Stopped);
    assert_eq!(engine.next_batch().await.unwrap_err(), FetchError::NotRunning);
}

#[tokio::test]
async fn test_setup_errors() {
    let fixture = Fixture::new();

    let empty = fixture.manifest(&[""]);
    let err = PrefetchEngine::new(fixture.config(empty, 1, 1)).start().unwrap_err();
    assert!(matches!(err, FetchError::EmptyManifest { .. }));

    let malformed = fixture.manifest(&["no_separator"]);
    let err = PrefetchEngine::new(fixture.config(malformed, 1, 1)).start().unwrap_err();
    assert!(matches!(err, FetchError::ManifestParse { line: 1, .. }));

    let (fixture, manifest) = numbered(2);
    let mut config = fixture.config(manifest, 1, 1);
    config.rand_skip = 2;
    let err = PrefetchEngine::new(config).start().unwrap_err();
    assert_eq!(err, FetchError::SkipExceedsSize { skip: 2, len: 2 });

    let missing = fixture.root().join("does-not-exist.txt");
    let err = PrefetchEngine::new(fixture.config(missing, 1, 1)).start().unwrap_err();
    assert!(matches!(err, FetchError::Io { .. }));
    assert!(err.is_setup_error());
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let (fixture, manifest) = numbered(1);
    let mut config = fixture.config(manifest, 1, 1);
    config.new_height = 32;
    let err = PrefetchEngine::new(config).start().unwrap_err();
    assert!(matches!(err, FetchError::InvalidConfig { .. }));
}

#[tokio::test]
async fn test_mean_count_mismatch_rejects_start() {
    let (fixture, manifest) = numbered(2);
    let mut config = fixture.config(manifest, 1, 1);
    config.transform.mean_values = vec![1.0, 2.0];

    let mut engine = PrefetchEngine::new(config);
    let err = engine.start().unwrap_err();
    assert!(matches!(err, FetchError::InvalidConfig { .. }));
    assert!(err.is_setup_error());
    assert_eq!(engine.state(), EngineState::Stopped);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_double_start_rejected() {
    let (fixture, manifest) = numbered(2);
    let mut engine = PrefetchEngine::new(fixture.config(manifest, 1, 1));
    engine.start().unwrap();
    assert_eq!(engine.start().unwrap_err(), FetchError::AlreadyRunning);
    engine.shutdown().await;
}

#[tokio::test]
async fn test_next_batch_before_start() {
    let (fixture, manifest) = numbered(1);
    let mut engine = PrefetchEngine::new(fixture.config(manifest, 1, 1));
    assert_eq!(engine.state(), EngineState::Idle);
    assert_eq!(engine.next_batch().await.unwrap_err(), FetchError::NotRunning);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_is_idempotent() {
    let (fixture, manifest) = numbered(3);
    let mut engine = PrefetchEngine::new(fixture.config(manifest, 1, 1));
    engine.start().unwrap();
    let _ = engine.next_batch().await.unwrap();

    engine.stop();
    engine.stop();
    assert!(matches!(engine.state(), EngineState::Stopping | EngineState::Stopped));
    assert_eq!(engine.next_batch().await.unwrap_err(), FetchError::NotRunning);

    engine.stop();
    engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_interrupts_a_long_batch() {
    let (fixture, manifest) = numbered(2);
    let loader = CountingLoader::with_delay(Duration::from_millis(20));
    // 100 items x 2 decodes x 20ms: seconds per batch
    let mut engine = PrefetchEngine::new(fixture.config(manifest, 100, 1)).with_loader(loader.clone());
    engine.start().unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    engine.stop();
    let metrics = engine.metrics();
    engine.shutdown().await;

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(metrics.batches_produced.get(), 0);
    assert!(loader.calls() < 200);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_handle_wakes_waiting_consumer() {
    let (fixture, manifest) = numbered(2);
    let loader = CountingLoader::with_delay(Duration::from_millis(20));
    let mut engine = PrefetchEngine::new(fixture.config(manifest, 100, 1)).with_loader(loader);
    engine.start().unwrap();

    let handle = engine.stop_handle();
    let stopper = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.stop();
        handle
    });

    let started = Instant::now();
    let result = tokio::time::timeout(Duration::from_secs(2), engine.next_batch()).await;
    assert_eq!(result.expect("consumer woke").unwrap_err(), FetchError::NotRunning);
    assert!(started.elapsed() < Duration::from_secs(1));

    let handle = stopper.await.unwrap();
    assert!(handle.is_stopped());
    handle.stop();
    engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_backpressure_holds_leased_buffer() {
    let (fixture, manifest) = numbered(4);
    let loader = CountingLoader::new();
    let mut config = fixture.config(manifest, 2, 1);
    config.prefetch_depth = 1;
    let mut engine = PrefetchEngine::new(config).with_loader(loader.clone());
    engine.start().unwrap();

    // Setup decodes one group and one label; each batch decodes 2 x (1 + 1)
    let held = engine.next_batch().await.unwrap();
    let snapshot = held.data.data().to_vec();
    let entries = held.entries.clone();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(loader.calls(), 2 + 4);
    assert!(engine.try_next_batch().unwrap().is_none());
    assert_eq!(held.data.data(), &snapshot[..]);
    assert_eq!(held.entries, entries);
    assert_eq!(engine.leased_count(), 1);

    held.release();
    let next = engine.next_batch().await.unwrap();
    assert_eq!(next.sequence, 1);
    assert_eq!(next.entries[0].group_root, "f2.png");

    drop(next);
    engine.shutdown().await;
}

#[test]
fn test_synchronous_host() {
    let (fixture, manifest) = numbered(3);
    let runtime = FetchRuntime::new(RuntimeConfig {
        worker_threads: 1,
        blocking_threads: 2,
        thread_name: "framefetch-test".into(),
    })
    .unwrap();

    let mut engine = PrefetchEngine::new(fixture.config(manifest, 2, 1));
    engine.start_on(&runtime.handle()).unwrap();

    let mut sequences = Vec::new();
    for _ in 0..4 {
        let batch = engine.next_batch_blocking().unwrap();
        sequences.push(batch.sequence);
    }
    assert_eq!(sequences, vec![0, 1, 2, 3]);
    assert_eq!(engine.batches_delivered(), 4);

    runtime.block_on(engine.shutdown());
    runtime.shutdown();
}

#[test]
fn test_start_without_runtime_fails() {
    let (fixture, manifest) = numbered(1);
    let mut engine = PrefetchEngine::new(fixture.config(manifest, 1, 1));
    assert!(matches!(engine.start(), Err(FetchError::Internal { .. })));
    assert_eq!(engine.state(), EngineState::Idle);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_custom_loader_is_used_for_labels_and_frames() {
    let (fixture, manifest) = numbered(2);
    let loader = CountingLoader::new();
    let mut engine = PrefetchEngine::new(fixture.config(manifest, 1, 3)).with_loader(Arc::clone(&loader) as _);
    engine.start().unwrap();
    let _ = engine.next_batch().await.unwrap();

    // Setup probe plus at least one batch, each with 3 frames and one label
    assert!(loader.calls() >= 8);
    engine.shutdown().await;
}
