//! Tracing subscriber bootstrap, shared by both binaries.
//!
//! Reads `RUST_LOG` through `tracing_subscriber::EnvFilter` and defaults to
//! `info` when the variable isn't set.

use tracing_subscriber::{fmt, EnvFilter};

/// Installs a global `tracing` subscriber. Safe to call once per process;
/// a second call is a no-op (the error from the global subscriber already
/// being set is swallowed, matching this crate's policy of never letting a
/// secondary failure during setup/teardown propagate).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = fmt().with_env_filter(filter).with_target(true).try_init();
}
