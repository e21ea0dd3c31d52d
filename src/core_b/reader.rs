//! Client reader: one task per accepted peer, reading newline-delimited
//! records and enqueueing each with a freshly scored priority. A record is
//! the bytes up to and including `\n`; `tag` and `cid` are parsed from its
//! leading tokens.

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::core_b::queue::{PriorityQueue, QueueItem, SeqAllocator};
use crate::core_b::session::ConnectionSession;

/// Reads `client` until EOF, splitting on `\n`, enqueueing one
/// [`QueueItem`] per record. Returns once the peer closes its write side.
pub async fn read_into_queue(mut client: TcpStream, cid_hint: String, queue: Arc<PriorityQueue>, seq: Arc<SeqAllocator>) {
    let session = Arc::new(Mutex::new(ConnectionSession::new(cid_hint.clone())));
    let mut carry: Vec<u8> = Vec::new();
    let mut chunk = vec![0u8; 4096];

    loop {
        let n = match client.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        carry.extend_from_slice(&chunk[..n]);

        while let Some(newline_at) = carry.iter().position(|&b| b == b'\n') {
            let record: Vec<u8> = carry.drain(..=newline_at).collect();
            let (tag, cid) = parse_tag_cid(&record, &cid_hint);

            let priority = session.lock().unwrap().record_and_score(record.len());
            let item = QueueItem {
                priority,
                seq: seq.next(),
                payload: record,
                session: session.clone(),
                tag,
                cid,
            };
            queue.enqueue(item);
        }
    }

    let _ = client.shutdown().await;
    debug!(cid = %cid_hint, "client reader closed");
}

/// The first two whitespace-separated tokens are observable as `tag` and
/// `cid` for logging but have no semantic effect on scheduling. Falls back
/// to `cid_hint` (the peer address) when the record doesn't carry two
/// leading tokens.
fn parse_tag_cid(record: &[u8], cid_hint: &str) -> (String, String) {
    let text = String::from_utf8_lossy(record);
    let mut tokens = text.split_whitespace();
    let tag = tokens.next().unwrap_or("").to_string();
    let cid = tokens.next().unwrap_or(cid_hint).to_string();
    (tag, cid)
}
