//! Sender loop: exactly one instance runs process-wide.
//!
//! Opens the single persistent backend pipe with unbounded retry, drains
//! (and discards) the backend-to-proxy direction in a background task, and
//! requeues the in-flight item unchanged on a write failure so ordering is
//! preserved across a reconnect.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core_b::queue::{PriorityQueue, QueueItem};

/// Interval between backend reconnect attempts.
const RECONNECT_INTERVAL: Duration = Duration::from_secs(1);

/// Drives the queue forever: dial, drain, send-with-requeue-on-failure,
/// reconnect, repeat. Never returns under normal operation.
pub async fn run(backend_addr: String, queue: Arc<PriorityQueue>, send_delay: Duration) {
    loop {
        let backend = connect_with_retry(&backend_addr).await;
        let (read_half, mut write_half) = backend.into_split();
        let drain_task = spawn_drain_task(read_half);

        send_until_failure(&mut write_half, &queue, send_delay).await;
        drain_task.abort();
        warn!("backend connection lost, reconnecting");
    }
}

async fn send_until_failure(backend: &mut OwnedWriteHalf, queue: &PriorityQueue, send_delay: Duration) {
    loop {
        let item = queue.dequeue().await;

        if !send_delay.is_zero() {
            tokio::time::sleep(send_delay).await;
        }

        debug!(priority = item.priority, tag = %item.tag, cid = %item.cid, "sending queued record");

        if let Err(err) = backend.write_all(&item.payload).await {
            warn!(%err, tag = %item.tag, "backend write failed, requeueing");
            requeue_unchanged(queue, item);
            return;
        }
    }
}

/// Requeues the same item with its original `(priority, seq)` so ordering
/// stays consistent across a reconnect.
fn requeue_unchanged(queue: &PriorityQueue, item: QueueItem) {
    queue.enqueue(item);
}

async fn connect_with_retry(backend_addr: &str) -> TcpStream {
    loop {
        match TcpStream::connect(backend_addr).await {
            Ok(stream) => {
                info!(backend = backend_addr, "connected to backend");
                return stream;
            }
            Err(err) => {
                warn!(%err, backend = backend_addr, "backend connect failed, retrying");
                tokio::time::sleep(RECONNECT_INTERVAL).await;
            }
        }
    }
}

/// Reads and discards the backend-to-proxy direction; responses are never
/// routed back to clients in this core.
fn spawn_drain_task(mut backend_read_half: tokio::net::tcp::OwnedReadHalf) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        loop {
            match backend_read_half.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(_) => {}
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_b::queue::SeqAllocator;
    use crate::core_b::session::ConnectionSession;
    use std::sync::Mutex;
    use tokio::io::AsyncWriteExt as _;
    use tokio::net::TcpListener;

    fn item(payload: &[u8], seq: u64) -> QueueItem {
        QueueItem {
            priority: 0.1,
            seq,
            payload: payload.to_vec(),
            session: Arc::new(Mutex::new(ConnectionSession::new("X".to_string()))),
            tag: "0001".to_string(),
            cid: "X".to_string(),
        }
    }

    #[tokio::test]
    async fn sends_queued_payload_to_backend() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let queue = Arc::new(PriorityQueue::new());
        queue.enqueue(item(b"hello\n", 0));

        let sender_task = {
            let queue = queue.clone();
            tokio::spawn(async move { run(addr.to_string(), queue, Duration::from_millis(0)).await })
        };

        let (mut backend_sock, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 64];
        use tokio::io::AsyncReadExt as _;
        let n = backend_sock.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hello\n");

        sender_task.abort();
    }

    #[tokio::test]
    async fn requeues_on_write_failure_and_redelivers_after_reconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let queue = Arc::new(PriorityQueue::new());
        queue.enqueue(item(b"first\n", 0));

        let sender_task = {
            let queue = queue.clone();
            tokio::spawn(async move { run(addr.to_string(), queue, Duration::from_millis(0)).await })
        };

        let (backend_sock, _) = listener.accept().await.unwrap();
        // SO_LINGER(0) forces an RST on drop instead of a graceful FIN, so
        // the sender's next write reliably fails instead of racing a
        // half-open socket.
        socket2::SockRef::from(&backend_sock).set_linger(Some(Duration::ZERO)).unwrap();
        drop(backend_sock);

        let (mut backend_sock2, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 64];
        use tokio::io::AsyncReadExt as _;
        let n = backend_sock2.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"first\n");

        sender_task.abort();
    }
}
