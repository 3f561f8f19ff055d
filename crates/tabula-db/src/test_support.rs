//! Helpers for the crate's unit tests.
//!
//! In-memory `SQLite` databases are private to each connection, so pooled
//! tests run against a file in a temporary directory that lives as long as
//! the returned guard.

use std::time::Duration;

use tempfile::TempDir;

use crate::Engine;
use crate::pool::PoolOptions;

/// Install a `tracing` subscriber filtered by `TABULA_LOG`. Safe to call
/// from every test.
pub(crate) fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("TABULA_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Pool options for tests: short checkout timeout, generous busy timeout.
pub(crate) fn test_pool_options() -> PoolOptions {
    PoolOptions {
        size: 2,
        max_overflow: 2,
        timeout: Duration::from_secs(2),
        ..PoolOptions::default()
    }
    .pragma("busy_timeout", "5000")
}

/// File-backed engine in a fresh temp dir.
pub(crate) async fn test_engine_with(options: PoolOptions) -> (Engine, TempDir) {
    init_tracing();
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("tabula-test.db");
    let engine = Engine::open_local(path.to_str().expect("utf-8 path"), options)
        .await
        .expect("open engine");
    (engine, dir)
}

/// File-backed engine with the `users` table created.
pub(crate) async fn test_engine() -> (Engine, TempDir) {
    let (engine, dir) = test_engine_with(test_pool_options()).await;
    engine
        .create_table::<tabula_core::entities::User>()
        .await
        .expect("create users table");
    (engine, dir)
}
