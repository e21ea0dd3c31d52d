//! A bounded-concurrency token held between accept and admission so a
//! flood of never-admitting peers can't grow memory without bound.
//! Implemented as a thin wrapper over [`tokio::sync::Semaphore`], the
//! idiomatic tokio primitive for an "at most N concurrent holders" shape.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{AcquireError, Semaphore, SemaphorePermit};

/// Capacity-bounded pool of admission tickets.
pub struct PendingPermits {
    semaphore: Arc<Semaphore>,
}

impl PendingPermits {
    pub fn new(max_pending: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_pending)),
        }
    }

    /// Acquires a permit, waiting at most `timeout`. `None` means the pool
    /// was saturated and the caller must respond with the fixed 503 and
    /// close.
    pub async fn acquire(&self, timeout: Duration) -> Option<SemaphorePermit<'_>> {
        match tokio::time::timeout(timeout, self.semaphore.acquire()).await {
            Ok(Ok(permit)) => Some(permit),
            Ok(Err(AcquireError { .. })) | Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquires_immediately_under_capacity() {
        let permits = PendingPermits::new(2);
        let permit = permits.acquire(Duration::from_millis(50)).await;
        assert!(permit.is_some());
    }

    #[tokio::test]
    async fn released_on_drop_frees_capacity_for_the_next_waiter() {
        let permits = PendingPermits::new(1);
        {
            let _held = permits.acquire(Duration::from_millis(50)).await.unwrap();
            assert!(permits.acquire(Duration::from_millis(20)).await.is_none());
        }
        assert!(permits.acquire(Duration::from_millis(50)).await.is_some());
    }

    #[tokio::test]
    async fn times_out_when_saturated() {
        let permits = PendingPermits::new(1);
        let _held = permits.acquire(Duration::from_millis(50)).await.unwrap();

        let start = tokio::time::Instant::now();
        let second = permits.acquire(Duration::from_millis(50)).await;
        assert!(second.is_none());
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
