use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use futures::future;
use futures_util::StreamExt;
use inventory::limits::ConnectionTracker;
use inventory::store::RedisStore;
use inventory::*;
use tarpc::server::{self, Channel};
use tarpc::tokio_serde::formats::Json;

#[derive(Parser)]
#[command(name = "inventory-server", about = "Inventory RPC server backed by Redis")]
struct Cli {
    /// Address to accept RPC connections on.
    #[arg(long, default_value = "[::]:50051", env = "INVENTORY_LISTEN")]
    listen: SocketAddr,

    /// Redis endpoint holding the products.
    #[arg(long, default_value = "redis://localhost:6379", env = "INVENTORY_REDIS_URL")]
    redis_url: String,

    /// Requests handled at the same time; further requests wait for a slot.
    #[arg(long, default_value_t = 10, env = "INVENTORY_MAX_IN_FLIGHT")]
    max_in_flight: usize,

    /// Concurrent client connections; one per peer IP.
    #[arg(long, default_value_t = 10, env = "INVENTORY_MAX_CONNECTIONS")]
    max_connections: usize,

    /// Whether a product listing blocks writers until it finishes.
    #[arg(long, value_enum, default_value_t = ScanLockPolicy::HoldForScan, env = "INVENTORY_SCAN_LOCK")]
    scan_lock: ScanLockPolicy,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, default_value = "info", env = "INVENTORY_LOG_LEVEL")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing(&cli.log_level);

    let store = Arc::new(RedisStore::open(&cli.redis_url)?);
    // Requests report an unreachable store themselves; this is only a heads-up.
    if let Err(e) = store.ping().await {
        tracing::warn!(error = %e, url = %cli.redis_url, "redis is not reachable yet");
    }

    let server = InventoryServer::new(
        InventoryHandler::new(store, cli.scan_lock),
        cli.max_in_flight,
    );
    let tracker = ConnectionTracker::new(1, cli.max_connections);

    let mut listener = tarpc::serde_transport::tcp::listen(&cli.listen, Json::default)
        .await
        .with_context(|| format!("failed to listen on {}", cli.listen))?;
    listener.config_mut().max_frame_length(usize::MAX);

    tracing::info!(
        addr = %listener.local_addr(),
        max_connections = cli.max_connections,
        max_in_flight = cli.max_in_flight,
        scan_lock = ?cli.scan_lock,
        "server started, kill with Ctrl+C"
    );

    let serve = listener
        // A failed accept only loses that one peer.
        .filter_map(|r| future::ready(r.ok()))
        .for_each(|transport| {
            let server = server.clone();
            let tracker = tracker.clone();
            async move {
                let peer = match transport.peer_addr() {
                    Ok(peer) => peer,
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping connection without a peer address");
                        return;
                    }
                };
                let slot = match tracker.try_connect(peer.ip()) {
                    Ok(slot) => slot,
                    Err(rejection) => {
                        tracing::warn!(%peer, ?rejection, "connection rejected");
                        return;
                    }
                };
                tracing::info!(
                    %peer,
                    active = tracker.active(),
                    max = tracker.max_total(),
                    "new connection"
                );

                let fut = server::BaseChannel::with_defaults(transport).execute(server.serve());

                // The slot lives until the channel closes.
                tokio::spawn(async move {
                    fut.await;
                    drop(slot);
                    tracing::info!(%peer, active = tracker.active(), "client disconnected");
                });
            }
        });

    tokio::select! {
        _ = serve => {}
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupted, shutting down"),
    }

    Ok(())
}
