//! Listener and lifecycle glue: a listener accepts TCP peers and launches
//! one connection handler per peer.
//!
//! A builder assembles the shared, process-wide resources (`SlotTable`,
//! `PendingPermits`, `Config`), then a `run` loop accepts and spawns.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::core_a::config::Config;
use crate::core_a::connection;
use crate::core_a::pending::PendingPermits;
use crate::core_a::slot::SlotTable;

/// Builds a [`Server`] from a [`Config`].
pub struct ServerBuilder {
    config: Config,
}

impl ServerBuilder {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn build(self) -> Server {
        let pending = Arc::new(PendingPermits::new(self.config.max_pending));
        let slots = Arc::new(SlotTable::new(self.config.max_slots));
        Server {
            config: Arc::new(self.config),
            pending,
            slots,
        }
    }
}

pub struct Server {
    config: Arc<Config>,
    pending: Arc<PendingPermits>,
    slots: Arc<SlotTable>,
}

impl Server {
    /// Binds the configured listen address and runs the accept loop until
    /// `ctrl_c` is received. The exit is abrupt: in-flight connections are
    /// not drained, the process simply stops accepting and returns.
    pub async fn run(self) -> std::io::Result<()> {
        let listener = TcpListener::bind(&self.config.listen).await?;
        info!(listen = %self.config.listen, backend = %self.config.backend, "slot-proxy listening");

        let mut conn_seq: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    info!("received shutdown signal, exiting");
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

                    conn_seq += 1;
                    let conn_id = conn_seq;
                    let config = self.config.clone();
                    let pending = self.pending.clone();
                    let slots = self.slots.clone();

                    tokio::spawn(async move {
                        info!(conn_id, %peer_addr, "accepted connection");
                        connection::handle(conn_id, stream, config, pending, slots).await;
                    });
                }
            }
        }
    }
}

/// Convenience entry point for the `slot-proxy` binary: builds and runs a
/// server from environment-derived configuration. Kept out of `main.rs`
/// itself so the wiring is testable without a process boundary.
pub async fn run_from_env() -> std::io::Result<()> {
    let config = Config::from_env();
    if let Err(err) = ServerBuilder::new(config).build().run().await {
        error!(%err, "slot-proxy exited with error");
        return Err(err);
    }
    Ok(())
}
