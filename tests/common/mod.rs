//! Shared helpers for integration tests.

use tracing_subscriber::EnvFilter;

/// Route crate logs to the test output; filter with `RUST_LOG`, e.g.
/// `RUST_LOG=groq_client=debug cargo test`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
