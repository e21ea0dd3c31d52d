//! Core A tunables.
//!
//! A plain `pub`-field struct with a [`Default`] impl carrying the baseline
//! numeric defaults, overridden field-by-field from the environment rather
//! than a `clap` CLI surface.

use std::time::Duration;

use crate::core_a::arrival::PModeKind;
use crate::env::{var_or, var_or_logged};

/// Default listen address for Core A.
pub const DEFAULT_LISTEN: &str = "0.0.0.0:80";
/// There is no sensible default upstream; operators must set
/// `SLOTPROXY_BACKEND`.
pub const DEFAULT_BACKEND: &str = "127.0.0.1:8080";

#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub backend: String,
    pub max_slots: usize,
    pub max_pending: usize,
    pub first_timeout: Duration,
    pub second_timeout: Duration,
    pub hard_header_timeout: Duration,
    pub max_header_bytes: usize,
    pub buffer_size: usize,
    pub p_mode: PModeKind,
    /// Bounded wait for a `PendingPermit`, roughly 50 ms by default.
    pub pending_acquire_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            backend: DEFAULT_BACKEND.to_string(),
            max_slots: 20,
            max_pending: 200,
            first_timeout: Duration::from_secs(5),
            second_timeout: Duration::from_secs(10),
            hard_header_timeout: Duration::from_secs(15),
            max_header_bytes: 64 * 1024,
            buffer_size: crate::core_a::forward::BUFFER_SIZE,
            p_mode: PModeKind::AvgGap,
            pending_acquire_timeout: Duration::from_millis(50),
        }
    }
}

impl Config {
    /// Reads every tunable from its `SLOTPROXY_*` environment variable,
    /// falling back to [`Default::default`] per field when unset or
    /// unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            listen: std::env::var("SLOTPROXY_LISTEN").unwrap_or(defaults.listen),
            backend: std::env::var("SLOTPROXY_BACKEND").unwrap_or(defaults.backend),
            max_slots: var_or_logged("SLOTPROXY_MAX_SLOTS", defaults.max_slots),
            max_pending: var_or_logged("SLOTPROXY_MAX_PENDING", defaults.max_pending),
            first_timeout: Duration::from_millis(var_or_logged(
                "SLOTPROXY_FIRST_TIMEOUT_MS",
                defaults.first_timeout.as_millis() as u64,
            )),
            second_timeout: Duration::from_millis(var_or_logged(
                "SLOTPROXY_SECOND_TIMEOUT_MS",
                defaults.second_timeout.as_millis() as u64,
            )),
            hard_header_timeout: Duration::from_millis(var_or_logged(
                "SLOTPROXY_HARD_HEADER_TIMEOUT_MS",
                defaults.hard_header_timeout.as_millis() as u64,
            )),
            max_header_bytes: var_or_logged("SLOTPROXY_MAX_HEADER_BYTES", defaults.max_header_bytes),
            buffer_size: var_or_logged("SLOTPROXY_BUFFER_SIZE", defaults.buffer_size),
            p_mode: var_or("SLOTPROXY_P_MODE", defaults.p_mode),
            pending_acquire_timeout: Duration::from_millis(var_or_logged(
                "SLOTPROXY_PENDING_ACQUIRE_TIMEOUT_MS",
                defaults.pending_acquire_timeout.as_millis() as u64,
            )),
        }
    }
}
