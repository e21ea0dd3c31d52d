//! The per-connection state machine.
//!
//! One instance of [`handle`] is spawned per accepted peer. It owns the
//! client socket for its entire lifetime; the only data another task ever
//! sees about this connection is its `conn_id`, its current score in the
//! [`SlotTable`], and a one-shot eviction notification.

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::core_a::arrival::{FirstReadOutcome, PMode};
use crate::core_a::config::Config;
use crate::core_a::errors::ErrorKind;
use crate::core_a::forward;
use crate::core_a::pending::PendingPermits;
use crate::core_a::rewrite::rewrite_request;
use crate::core_a::slot::{NewSlot, SlotTable};

/// Runs one accepted peer end to end: admission, header completion, rewrite,
/// backend dial, forwarding. Never returns an error to its caller; every
/// failure path is handled in place with a best-effort 503 and close, so
/// nothing propagates out of a connection handler into the listener.
pub async fn handle(
    conn_id: u64,
    mut client: TcpStream,
    config: Arc<Config>,
    pending: Arc<PendingPermits>,
    slots: Arc<SlotTable>,
) {
    if let Err(kind) = run(conn_id, &mut client, &config, &pending, &slots).await {
        debug!(conn_id, ?kind, "connection handler exiting");
        let _ = client.write_all(kind.as_503()).await;
        let _ = client.shutdown().await;
    }
    slots.release(conn_id);
}

async fn run(
    conn_id: u64,
    client: &mut TcpStream,
    config: &Config,
    pending: &PendingPermits,
    slots: &SlotTable,
) -> Result<(), ErrorKind> {
    let _permit = pending
        .acquire(config.pending_acquire_timeout)
        .await
        .ok_or(ErrorKind::PendingExhausted)?;

    let mut mode = PMode::new(config.p_mode);
    let mut header_buf: Vec<u8> = Vec::with_capacity(4096);
    let mut read_buf = vec![0u8; config.buffer_size];

    // READ_FIRST
    let t1 = Instant::now();
    let n = read_with_deadline(client, &mut read_buf, config.first_timeout)
        .await
        .map_err(|_| ErrorKind::ClientTimeout)?;
    if n == 0 {
        return Err(ErrorKind::ClientEof);
    }
    header_buf.extend_from_slice(&read_buf[..n]);

    let (p, mut last_read_at) = match mode.score_first(&header_buf) {
        FirstReadOutcome::ImmediateAdmit { p } => (p, t1),
        FirstReadOutcome::NeedSecondRead => {
            let n = read_with_deadline(client, &mut read_buf, config.second_timeout)
                .await
                .map_err(|_| ErrorKind::ClientTimeout)?;
            if n == 0 {
                return Err(ErrorKind::ClientEof);
            }
            header_buf.extend_from_slice(&read_buf[..n]);
            let t2 = Instant::now();
            (mode.score_second(t2.duration_since(t1)), t2)
        }
    };

    let (evict_tx, mut evict_rx) = oneshot::channel();
    let new_slot = NewSlot { conn_id, p, evict_tx };
    let (admitted, evicted) = slots.admit(new_slot);
    if !admitted {
        return Err(ErrorKind::AdmissionDenied);
    }
    if let Some(evicted) = evicted {
        debug!(conn_id, evicted_conn_id = evicted.conn_id, "admission displaced a slot");
        slots.evict(evicted);
    }
    drop(_permit);

    // READ_HEADER_TAIL, bounded by HARD_HEADER_TIMEOUT measured from t1.
    let hard_deadline = t1 + config.hard_header_timeout;
    while crate::core_a::rewrite::find_header_terminator(&header_buf).is_none() {
        if header_buf.len() > config.max_header_bytes {
            return Err(ErrorKind::ClientTimeout);
        }

        let remaining = hard_deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(ErrorKind::ClientTimeout);
        }

        let n = read_with_deadline(client, &mut read_buf, remaining)
            .await
            .map_err(|_| ErrorKind::ClientTimeout)?;
        if n == 0 {
            return Err(ErrorKind::ClientEof);
        }
        header_buf.extend_from_slice(&read_buf[..n]);

        let now = Instant::now();
        let gap = now.duration_since(last_read_at);
        last_read_at = now;

        if let Some(p_est) = mode.update(gap) {
            if slots.update_p_and_maybe_evict_self(conn_id, p_est) {
                return Err(ErrorKind::SelfEvicted);
            }
        }

        // Listen for a concurrent admission displacing us while we're still
        // assembling the header.
        if evict_rx.try_recv().is_ok() {
            return Err(ErrorKind::Replaced);
        }
    }

    if header_buf.len() > config.max_header_bytes {
        return Err(ErrorKind::ClientTimeout);
    }

    let rewritten = rewrite_request(&header_buf);

    // A concurrent admission may have evicted us between the last header
    // read and here; check once more before paying for a backend dial.
    if evict_rx.try_recv().is_ok() || !slots.attach_backend(conn_id) {
        return Err(ErrorKind::Replaced);
    }

    let mut backend = TcpStream::connect(&config.backend)
        .await
        .map_err(|_| ErrorKind::BackendDialFailed)?;
    set_nodelay_best_effort(&backend);

    if backend.write_all(&rewritten).await.is_err() {
        return Err(ErrorKind::BackendWriteFailed);
    }

    tokio::select! {
        biased;
        _ = &mut evict_rx => Err(ErrorKind::Replaced),
        result = forward::pump(client, &mut backend) => result.map_err(ErrorKind::from),
    }
}

/// Races a single read against a deadline; used for every deadline-bound
/// read in this module.
async fn read_with_deadline(stream: &mut TcpStream, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
    use tokio::io::AsyncReadExt;
    tokio::select! {
        biased;
        result = stream.read(buf) => result,
        _ = tokio::time::sleep(timeout) => {
            Err(io::Error::new(io::ErrorKind::TimedOut, "read timeout"))
        }
    }
}

/// The backend leg needs `TCP_NODELAY` just as much as the client leg:
/// Nagle-coalesced forwarding would blur the exact byte-arrival timing the
/// rest of this module measures.
fn set_nodelay_best_effort(stream: &TcpStream) {
    if let Err(err) = socket2::SockRef::from(stream).set_nodelay(true) {
        warn!(%err, "failed to set TCP_NODELAY on backend socket");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt as _};
    use tokio::net::TcpListener;

    async fn backend_echo() -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            loop {
                match sock.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if sock.write_all(&buf[..n]).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });
        addr
    }

    #[tokio::test]
    async fn honest_one_segment_request_is_admitted_and_forwarded() {
        let backend_addr = backend_echo().await;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let proxy_addr = listener.local_addr().unwrap();

        let mut config = Config::default();
        config.backend = backend_addr.to_string();
        config.p_mode = crate::core_a::arrival::PModeKind::AvgGap;
        let config = Arc::new(config);
        let pending = Arc::new(PendingPermits::new(config.max_pending));
        let slots = Arc::new(SlotTable::new(config.max_slots));

        let server_task = {
            let config = config.clone();
            let pending = pending.clone();
            let slots = slots.clone();
            tokio::spawn(async move {
                let (sock, _) = listener.accept().await.unwrap();
                handle(1, sock, config, pending, slots).await;
            })
        };

        let mut client = TcpStream::connect(proxy_addr).await.unwrap();
        client.write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();

        let mut buf = vec![0u8; 4096];
        let n = client.read(&mut buf).await.unwrap();
        let echoed = String::from_utf8_lossy(&buf[..n]);
        assert!(echoed.contains("Connection: close"));
        assert!(!echoed.to_lowercase().contains("proxy-connection"));

        drop(client);
        let _ = server_task.await;
    }

    #[tokio::test]
    async fn empty_first_read_yields_client_eof_and_no_slot() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let proxy_addr = listener.local_addr().unwrap();

        let config = Arc::new(Config::default());
        let pending = Arc::new(PendingPermits::new(config.max_pending));
        let slots = Arc::new(SlotTable::new(config.max_slots));

        let server_task = {
            let config = config.clone();
            let pending = pending.clone();
            let slots = slots.clone();
            tokio::spawn(async move {
                let (sock, _) = listener.accept().await.unwrap();
                handle(1, sock, config, pending, slots.clone()).await;
                assert!(slots.is_empty());
            })
        };

        let client = TcpStream::connect(proxy_addr).await.unwrap();
        drop(client);
        let _ = server_task.await;
    }
}
