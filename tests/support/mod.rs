//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod socket_guard;

use tracing_subscriber::EnvFilter;

/// Installs a test-writer subscriber once; `RUST_LOG` controls verbosity.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cookie_session=debug")),
        )
        .with_test_writer()
        .try_init();
}
