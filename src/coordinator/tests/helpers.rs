use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

use crate::coordinator::{Coordinator, CoordinatorConfig};
use crate::sstable::writer::CompressionConfig;

/// Enables `tracing` output (controlled by `RUST_LOG`) for the duration of
/// the test binary, so the coordinator's background flush/compaction logs
/// (`coordinator::background`'s `debug!`/`info!`/`warn!`/`error!` calls) are
/// visible when a test is run with `RUST_LOG=debug` instead of silently
/// discarded. Safe to call from every test — only the first call takes
/// effect.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn open_with_threshold(threshold: usize) -> (TempDir, Coordinator) {
    let tmp = TempDir::new().unwrap();
    let config = CoordinatorConfig {
        flush_threshold_bytes: threshold,
        compression: CompressionConfig::None,
    };
    let coordinator = Coordinator::open(tmp.path(), config).unwrap();
    (tmp, coordinator)
}

pub fn open_with_config(threshold: usize, compression: CompressionConfig) -> (TempDir, Coordinator) {
    let tmp = TempDir::new().unwrap();
    let config = CoordinatorConfig {
        flush_threshold_bytes: threshold,
        compression,
    };
    let coordinator = Coordinator::open(tmp.path(), config).unwrap();
    (tmp, coordinator)
}

pub fn reopen(tmp: &TempDir, threshold: usize) -> Coordinator {
    let config = CoordinatorConfig {
        flush_threshold_bytes: threshold,
        compression: CompressionConfig::None,
    };
    Coordinator::open(tmp.path(), config).unwrap()
}

/// Polls `get_range` until a background flush/compaction this test
/// dispatched has visibly completed (its effect is observable through the
/// public API), bounding the wait so a genuine bug fails the test instead
/// of hanging the suite.
pub fn wait_until(mut cond: impl FnMut() -> bool) {
    use std::time::{Duration, Instant};
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        if Instant::now() > deadline {
            panic!("condition did not become true within 5s");
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}
