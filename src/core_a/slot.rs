//! The fixed-capacity slot table.
//!
//! A slot conceptually owns its client stream, its backend stream, and its
//! forwarding pumps. Storing live `TcpStream`s behind the table's mutex
//! would mean either holding the lock across every read/write or
//! constantly taking the lock mid-read, which doesn't compose with
//! `tokio::io::AsyncRead`. Instead the table is pure bookkeeping, `conn_id`
//! and score `p`, and physical socket ownership stays with the
//! connection-handler task that accepted the peer. Eviction initiated by a
//! different task (the admission-displacement path) is delivered as a
//! one-shot notification rather than a direct close, so the owning task
//! always performs its own teardown.

use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::oneshot;

/// A newly scored connection about to attempt admission.
pub struct NewSlot {
    pub conn_id: u64,
    pub p: f64,
    /// Fired by [`SlotTable::evict`] if this slot is later displaced by a
    /// better-scoring admission. The connection handler races this receiver
    /// against its own I/O so it can close itself the moment it loses its
    /// slot.
    pub evict_tx: oneshot::Sender<()>,
}

/// A slot removed from the table by [`SlotTable::admit`], handed back to the
/// connection that displaced it so it can notify the loser.
pub struct EvictedSlot {
    pub conn_id: u64,
    evict_tx: oneshot::Sender<()>,
}

struct SlotRecord {
    p: f64,
    evict_tx: Option<oneshot::Sender<()>>,
}

#[derive(Default)]
struct Inner {
    slots: HashMap<u64, SlotRecord>,
}

/// Fixed-capacity admission table.
///
/// Every method below takes the single internal mutex for the duration of an
/// in-memory mutation only; none of them ever hold it across an `.await`.
pub struct SlotTable {
    inner: Mutex<Inner>,
    max_slots: usize,
}

impl SlotTable {
    pub fn new(max_slots: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_slots,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts outright while under capacity; otherwise displaces the
    /// current worst occupant only if `slot.p` beats it strictly.
    pub fn admit(&self, slot: NewSlot) -> (bool, Option<EvictedSlot>) {
        let mut inner = self.inner.lock().unwrap();

        if inner.slots.len() < self.max_slots {
            inner.slots.insert(
                slot.conn_id,
                SlotRecord {
                    p: slot.p,
                    evict_tx: Some(slot.evict_tx),
                },
            );
            return (true, None);
        }

        let worst_id = inner
            .slots
            .iter()
            .max_by(|a, b| a.1.p.partial_cmp(&b.1.p).unwrap())
            .map(|(id, record)| (*id, record.p));

        let Some((worst_id, worst_p)) = worst_id else {
            // max_slots == 0: nothing to displace, nothing fits.
            return (false, None);
        };

        if slot.p < worst_p {
            let worst_record = inner.slots.remove(&worst_id).expect("just located by key");
            inner.slots.insert(
                slot.conn_id,
                SlotRecord {
                    p: slot.p,
                    evict_tx: Some(slot.evict_tx),
                },
            );

            let evicted = EvictedSlot {
                conn_id: worst_id,
                evict_tx: worst_record
                    .evict_tx
                    .expect("admitted slots always carry an evict_tx"),
            };
            (true, Some(evicted))
        } else {
            (false, None)
        }
    }

    /// Overwrites the score in place; never evicts.
    pub fn update_p(&self, conn_id: u64, p_new: f64) {
        if let Some(record) = self.inner.lock().unwrap().slots.get_mut(&conn_id) {
            record.p = p_new;
        }
    }

    /// Updates the score, then, only when the table is at capacity and this
    /// slot is now a weak argmax, reports that the caller should evict
    /// itself. The slot is left in the table; the caller removes it via
    /// [`SlotTable::release`] once it has finished tearing itself down.
    pub fn update_p_and_maybe_evict_self(&self, conn_id: u64, p_new: f64) -> bool {
        let mut inner = self.inner.lock().unwrap();

        if let Some(record) = inner.slots.get_mut(&conn_id) {
            record.p = p_new;
        } else {
            return false;
        }

        if inner.slots.len() < self.max_slots {
            return false;
        }

        let worst_p = inner
            .slots
            .values()
            .map(|record| record.p)
            .fold(f64::MIN, f64::max);

        inner.slots.get(&conn_id).is_some_and(|record| record.p >= worst_p)
    }

    /// Confirms the slot is still resident right after a backend dial
    /// completes. `false` means the caller lost its slot to a concurrent
    /// admission while the dial was in flight and should tear down instead
    /// of starting to forward.
    pub fn attach_backend(&self, conn_id: u64) -> bool {
        self.inner.lock().unwrap().slots.contains_key(&conn_id)
    }

    /// Idempotent removal, no notification (the caller is always the
    /// slot's own owner here).
    pub fn release(&self, conn_id: u64) {
        self.inner.lock().unwrap().slots.remove(&conn_id);
    }

    /// Notifies the displaced connection. The record was already excised
    /// from the table by [`SlotTable::admit`]; this just delivers the
    /// signal. Best-effort: if the receiver is already gone (the handler
    /// exited on its own) the send is silently dropped.
    pub fn evict(&self, evicted: EvictedSlot) {
        let _ = evicted.evict_tx.send(());
    }
}
