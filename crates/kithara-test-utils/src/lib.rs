#![forbid(unsafe_code)]
#![expect(
    clippy::missing_panics_doc,
    reason = "test utility crate, panic documentation not needed"
)]

//! Shared test utilities for the kithara workspace.

pub mod mock_connection;
pub mod rng;

pub use mock_connection::{MockConnection, MockControl, MockStats, pattern};
pub use rng::*;

/// Install a test-writer subscriber once. `RUST_LOG` overrides the default
/// `kithara=debug` filter.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("kithara=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
