//! revshare-daemon: the revenue ledger daemon.
//!
//! Single OS process running a Tokio async runtime. Clients talk to the
//! daemon via JSON-RPC over a Unix socket; a background worker settles
//! recorded payments.

mod commands;
mod config;
mod rpc;

use std::sync::Arc;

use revshare_db::SqliteStore;
use revshare_ledger::settlement::{self, DelayedConfirmation};
use revshare_ledger::{
    Clock, EventBus, Ledger, LedgerContext, LedgerStore, MemoryStore, SettlementWorker,
    SystemClock,
};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use crate::config::{DaemonConfig, StorageBackend};
use crate::rpc::RpcServer;

/// Daemon-wide shared state.
pub struct DaemonState {
    /// The assembled ledger.
    pub ledger: Ledger,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config = DaemonConfig::load()?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("revshare={}", config.advanced.log_level).parse()?),
        )
        .init();

    info!("Revshare daemon starting");

    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;

    // 2. Open store
    let store: Arc<dyn LedgerStore> = match config.storage.backend {
        StorageBackend::Sqlite => Arc::new(SqliteStore::open(&data_dir.join("revshare.db"))?),
        StorageBackend::Memory => {
            warn!("Using in-memory store; ledger state will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    // 3. Assemble ledger with a settlement queue
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let context = LedgerContext::new(store, clock.clone(), EventBus::new(1000));
    let (scheduler, queue) = settlement::channel();
    let ledger = Ledger::new(context, Some(Arc::new(scheduler)))?;

    // Payments left pending past the timeout by a previous run cannot settle.
    ledger
        .transactions
        .expire_pending(config.settlement.timeout_secs)?;

    // 4. Log ledger events
    let mut events = ledger.events().subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    debug!(kind = ?event.kind, payload = %event.payload, "Ledger event")
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event log fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    // 5. Start settlement worker
    let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);
    let source = Arc::new(DelayedConfirmation::new(
        clock.clone(),
        config.settlement.confirmation_delay_secs,
    ));
    let worker = SettlementWorker::new(
        ledger.transactions.clone(),
        source,
        clock,
        config.settlement.worker_config(),
    );
    let worker_task = tokio::spawn(worker.run(queue, shutdown_tx.subscribe()));

    // 6. Start IPC server
    let state = Arc::new(DaemonState { ledger });
    let socket_path = config.socket_path();
    let rpc_server = RpcServer::new(state, socket_path.clone());

    info!("Starting JSON-RPC server on {:?}", socket_path);

    // 7. Run the RPC server until shutdown
    tokio::select! {
        result = rpc_server.run() => {
            if let Err(e) = result {
                error!("RPC server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
        }
    }

    // Graceful shutdown
    info!("Daemon shutting down gracefully");
    let _ = shutdown_tx.send(());
    match worker_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Settlement worker error: {}", e),
        Err(e) => error!("Settlement worker panicked: {}", e),
    }

    // Clean up socket file
    let _ = std::fs::remove_file(&socket_path);

    info!("Daemon stopped");
    Ok(())
}
