//! Relay loop
//!
//! One scheduler task per source chain, driven by a fixed timer tick. A pass
//! pins the chain head once, drains the chain's pending retries, scans every
//! route originating on that chain over the same finalized range, dispatches
//! the decoded events in (block, log index) order, and only then advances
//! the chain cursor to the top of the range. Passes within a chain never
//! overlap: the loop is sequential and a long pass simply delays the next
//! tick.
//!
//! Failures are isolated per chain task: a pass that errors is logged and
//! the loop returns to idle for the next tick; the process never exits on a
//! routine failure.

use std::sync::Arc;

use eyre::Result;
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::chain::ChainClient;
use crate::config::RelayerConfig;
use crate::dispatcher::{self, DispatchOutcome};
use crate::ledger;
use crate::metrics;
use crate::retry::RetryConfig;
use crate::routes::RelayRoute;
use crate::scanner;
use crate::types::ChainId;

/// A route plus the client for its destination chain.
pub struct BoundRoute {
    pub route: RelayRoute,
    pub dest: Arc<dyn ChainClient>,
}

/// Scheduler task for all routes originating on one source chain, with
/// injected dependencies so tests can drive passes deterministically.
pub struct ChainWorker {
    chain_id: ChainId,
    source: Arc<dyn ChainClient>,
    routes: Vec<BoundRoute>,
    pool: SqlitePool,
    config: RelayerConfig,
    retry: RetryConfig,
}

impl ChainWorker {
    pub fn new(
        source: Arc<dyn ChainClient>,
        routes: Vec<BoundRoute>,
        pool: SqlitePool,
        config: RelayerConfig,
    ) -> Self {
        let retry = RetryConfig {
            max_retries: config.max_retry_attempts,
            ..RetryConfig::default()
        };
        Self {
            chain_id: source.chain_id(),
            source,
            routes,
            pool,
            config,
            retry,
        }
    }

    /// Run the tick loop until shutdown. A pass in flight when the signal
    /// arrives completes first, so confirmation waits finish before the
    /// ledger writes they guard.
    pub async fn run(self, mut shutdown: mpsc::Receiver<()>) -> Result<()> {
        info!(
            chain_id = %self.chain_id,
            routes = self.routes.len(),
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Chain worker started"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!(chain_id = %self.chain_id, "Shutdown signal received, stopping chain worker");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {
                    if let Err(err) = self.run_pass().await {
                        metrics::PASS_FAILURES
                            .with_label_values(&[&self.chain_id.to_string()])
                            .inc();
                        error!(chain_id = %self.chain_id, error = %err, "Relay pass failed");
                    }
                }
            }
        }
    }

    /// One scan+dispatch pass over every route on this chain. Pending
    /// retries drain first so a failed dispatch from an earlier pass cannot
    /// be starved by new events.
    pub async fn run_pass(&self) -> Result<()> {
        for bound in &self.routes {
            dispatcher::drain_pending(bound.dest.as_ref(), &self.pool, &bound.route, &self.retry)
                .await?;
        }

        let range = match scanner::finalized_range(
            self.source.as_ref(),
            &self.pool,
            self.chain_id,
            self.config.confirmation_depth,
            self.config.sync_lookback,
        )
        .await?
        {
            Some(range) => range,
            None => return Ok(()),
        };

        for bound in &self.routes {
            let events = scanner::scan_events(self.source.as_ref(), &bound.route, range).await?;

            if !events.is_empty() {
                info!(
                    route = bound.route.name,
                    count = events.len(),
                    to_block = range.to_block,
                    "Detected finalized events"
                );
            }

            for event in &events {
                metrics::EVENTS_DETECTED
                    .with_label_values(&[bound.route.name, event.kind.as_str()])
                    .inc();

                // A per-event failure is queued for retry and must not abort
                // the rest of the batch.
                match dispatcher::dispatch_event(
                    bound.dest.as_ref(),
                    &self.pool,
                    &bound.route,
                    event,
                )
                .await
                {
                    Ok(outcome) => {
                        let label = match outcome {
                            DispatchOutcome::Dispatched { .. } => "dispatched",
                            DispatchOutcome::AlreadyDone => "skipped",
                            DispatchOutcome::Deferred => "deferred",
                        };
                        metrics::DISPATCHES
                            .with_label_values(&[bound.route.name, label])
                            .inc();
                    }
                    Err(err) => {
                        metrics::DISPATCHES
                            .with_label_values(&[bound.route.name, "error"])
                            .inc();
                        error!(
                            route = bound.route.name,
                            correlation_id = %event.correlation_id,
                            error = %err,
                            "Dispatch errored"
                        );
                    }
                }
            }
        }

        // The cursor advances over the whole range even when individual
        // events were deferred; those live in the pending queue now.
        ledger::set_cursor(&self.pool, self.chain_id, range.to_block).await?;
        info!(
            chain_id = %self.chain_id,
            to_block = range.to_block,
            "Cursor advanced"
        );
        metrics::CURSOR
            .with_label_values(&[&self.chain_id.to_string()])
            .set(range.to_block as f64);

        if let Ok(pending) = ledger::count_pending(&self.pool).await {
            metrics::PENDING_ACTIONS.set(pending as f64);
        }

        Ok(())
    }
}
