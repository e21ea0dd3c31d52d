//! Listener and lifecycle glue, shaped the same as Core A's
//! [`crate::core_a::server`]: a builder assembling the process-wide
//! `PriorityQueue` and `SeqAllocator`, a `run` loop that accepts peers and
//! spawns one reader per peer, plus the sender loop and a periodic monitor
//! as background tasks.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::core_b::config::Config;
use crate::core_b::queue::{PriorityQueue, SeqAllocator};
use crate::core_b::reader;
use crate::core_b::sender;

pub struct ServerBuilder {
    config: Config,
}

impl ServerBuilder {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn build(self) -> Server {
        Server {
            config: Arc::new(self.config),
            queue: Arc::new(PriorityQueue::new()),
            seq: Arc::new(SeqAllocator::default()),
        }
    }
}

pub struct Server {
    config: Arc<Config>,
    queue: Arc<PriorityQueue>,
    seq: Arc<SeqAllocator>,
}

impl Server {
    pub async fn run(self) -> std::io::Result<()> {
        let listener = TcpListener::bind(&self.config.listen).await?;
        info!(listen = %self.config.listen, backend = %self.config.backend, "wsjf-scheduler listening");

        let sender_task = tokio::spawn(sender::run(self.config.backend.clone(), self.queue.clone(), self.config.send_delay));
        let monitor_task = tokio::spawn(monitor_loop(self.queue.clone()));

        let cid_seq = AtomicU64::new(0);

        loop {
            tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    info!("received shutdown signal, exiting");
                    sender_task.abort();
                    monitor_task.abort();
                    return Ok(());
                }
                accepted = listener.accept() => {
                    let (stream, peer_addr) = match accepted {
                        Ok(pair) => pair,
                        Err(err) => {
                            warn!(%err, "accept failed");
                            continue;
                        }
                    };

                    if let Err(err) = socket2::SockRef::from(&stream).set_nodelay(true) {
                        warn!(%err, "failed to set TCP_NODELAY on client socket");
                    }

                    let n = cid_seq.fetch_add(1, AtomicOrdering::Relaxed);
                    let cid_hint = format!("{peer_addr}#{n}");
                    let queue = self.queue.clone();
                    let seq = self.seq.clone();

                    tokio::spawn(async move {
                        debug!(%peer_addr, "accepted connection");
                        reader::read_into_queue(stream, cid_hint, queue, seq).await;
                    });
                }
            }
        }
    }
}

/// Periodic session monitor: logs the pending queue depth every second at
/// `debug`. Purely diagnostic, never consulted by the scheduler.
async fn monitor_loop(queue: Arc<PriorityQueue>) {
    loop {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let depth = queue.len();
        if depth == 0 {
            continue;
        }
        debug!(queue_depth = depth, "priority queue depth");
    }
}

pub async fn run_from_env() -> std::io::Result<()> {
    let config = Config::from_env();
    ServerBuilder::new(config).build().run().await
}
