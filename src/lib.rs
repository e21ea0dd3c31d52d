//! slotproxy - a slowloris-resistant TCP reverse proxy.
//!
//! Two independent cores share this crate:
//!
//! - [`core_a`]: **SlotProxy**, the admission/eviction engine. A fixed-
//!   capacity slot table keyed by an evolving badness score that decides,
//!   per accepted connection, whether it earns a backend slot, and evicts
//!   slots whose score degrades after admission.
//! - [`core_b`]: **WSJFScheduler**, a priority scheduler that multiplexes
//!   many client streams onto a single backend pipe, ordering records by
//!   inverse throughput with a stable FIFO tie-break.
//!
//! A deployment runs exactly one core; see `src/bin/slot_proxy.rs` and
//! `src/bin/wsjf_scheduler.rs` for the two entry points.

pub mod core_a;
pub mod core_b;
pub(crate) mod env;
pub mod logging;
