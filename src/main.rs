//! Cross-chain event relayer
//!
//! Watches finalized bridge and governance events on two chains and relays
//! each one into exactly one authorized call on the opposite chain. Durable
//! state is a processed-event ledger, per-chain scan cursors and a pending
//! retry queue; the destination contracts' replay guards are the last line
//! of defense against duplication.

use std::collections::HashMap;
use std::sync::Arc;

use bridge_relayer::chain::{ChainClient, EvmChainClient};
use bridge_relayer::config::Config;
use bridge_relayer::relay::{BoundRoute, ChainWorker};
use bridge_relayer::types::ChainId;
use bridge_relayer::{api, ledger, metrics, routes};
use tracing::info;

fn main() -> eyre::Result<()> {
    // Install color-eyre for better error reporting
    color_eyre::install()?;

    // Run the async main
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> eyre::Result<()> {
    init_logging();

    info!("Starting bridge relayer");

    // A missing deployments file fails this load after a bounded wait, which
    // terminates the process with a non-zero exit.
    let config = Config::load().await?;
    info!(
        chain_a = %config.chain_a.chain_id,
        chain_b = %config.chain_b.chain_id,
        confirmation_depth = config.relayer.confirmation_depth,
        "Configuration loaded"
    );

    let db = ledger::create_pool(&config.database.url).await?;
    info!("Database connected");

    ledger::run_migrations(&db).await?;
    info!("Database migrations complete");

    // One client per chain, shared by every route touching it.
    let mut clients: HashMap<ChainId, Arc<dyn ChainClient>> = HashMap::new();
    for chain in [&config.chain_a, &config.chain_b] {
        let client = EvmChainClient::new(
            chain,
            config.relayer.confirmation_depth,
            config.relayer.confirm_timeout,
        )?;
        clients.insert(chain.chain_id, Arc::new(client));
    }

    // Group the route table by source chain; each group gets its own worker
    // so one chain's failure never stalls the other.
    let mut grouped: HashMap<ChainId, Vec<BoundRoute>> = HashMap::new();
    for route in routes::build_routes(&config) {
        let dest = clients
            .get(&route.dest_chain)
            .ok_or_else(|| eyre::eyre!("No client for destination chain {}", route.dest_chain))?
            .clone();
        grouped
            .entry(route.source_chain)
            .or_default()
            .push(BoundRoute { route, dest });
    }

    metrics::UP.set(1.0);

    // Start metrics/status API server
    let api_db = db.clone();
    let api_addr = config.api_listen;
    tokio::spawn(async move {
        if let Err(e) = api::start_api_server(api_addr, api_db).await {
            tracing::error!(error = %e, "API server error");
        }
    });

    // Spawn one worker per source chain with its own shutdown channel.
    let mut shutdown_senders = Vec::new();
    let mut workers = Vec::new();
    for (chain_id, bound_routes) in grouped {
        let source = clients
            .get(&chain_id)
            .ok_or_else(|| eyre::eyre!("No client for source chain {}", chain_id))?
            .clone();
        let worker = ChainWorker::new(source, bound_routes, db.clone(), config.relayer.clone());

        let (shutdown_tx, shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
        shutdown_senders.push(shutdown_tx);
        workers.push(tokio::spawn(worker.run(shutdown_rx)));
    }

    // Fan the shutdown signal out to every worker.
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        for sender in shutdown_senders {
            let _ = sender.send(()).await;
        }
    });

    for worker in workers {
        match worker.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Chain worker error"),
            Err(e) => tracing::error!(error = %e, "Chain worker panicked"),
        }
    }

    metrics::UP.set(0.0);
    info!("Bridge relayer stopped");
    Ok(())
}

/// Initialize tracing/logging with structured output
fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,bridge_relayer=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

/// Wait for shutdown signals (SIGINT/SIGTERM)
async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}
