//! `PriorityQueue`: min-ordered on `(priority, seq)`, nonblocking enqueue,
//! blocking dequeue. `seq` is a process-global strictly increasing
//! tiebreaker allocated here via an `AtomicU64`, so items with an identical
//! priority still dequeue in arrival order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::core_b::session::ConnectionSession;

/// One enqueued record: priority, FIFO tiebreaker, payload bytes, a
/// reference back to the owning session, and the parsed `tag`/`cid`.
pub struct QueueItem {
    pub priority: f64,
    pub seq: u64,
    pub payload: Vec<u8>,
    pub session: Arc<Mutex<ConnectionSession>>,
    pub tag: String,
    pub cid: String,
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}
impl Eq for QueueItem {}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueItem {
    /// `BinaryHeap` is a max-heap, so this is reversed from the natural
    /// `(priority, seq)` order: the item popped first by `BinaryHeap::pop`
    /// must be the lowest `priority`, and among equal priorities the lowest
    /// `seq`.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .partial_cmp(&self.priority)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Allocates the process-global FIFO tiebreaker.
#[derive(Default)]
pub struct SeqAllocator(AtomicU64);

impl SeqAllocator {
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, AtomicOrdering::Relaxed)
    }
}

/// The shared priority queue itself: a `Mutex`-guarded `BinaryHeap` plus a
/// `Notify` so `dequeue` can block without polling, the same
/// wake-one-waiter shape `tokio::sync::Notify` is built for.
#[derive(Default)]
pub struct PriorityQueue {
    heap: Mutex<BinaryHeap<QueueItem>>,
    notify: Notify,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Never blocks: pushes onto the heap and wakes one waiter.
    pub fn enqueue(&self, item: QueueItem) {
        self.heap.lock().unwrap().push(item);
        self.notify.notify_one();
    }

    /// Blocks until an item is available.
    pub async fn dequeue(&self) -> QueueItem {
        loop {
            if let Some(item) = self.heap.lock().unwrap().pop() {
                return item;
            }
            self.notify.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.heap.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
