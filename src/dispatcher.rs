//! Action dispatcher
//!
//! Maps a canonical relay event onto its destination-chain call, submits it,
//! waits for confirmation, and records the completed work in the ledger. The
//! ledger write happens strictly after confirmation; if the process dies in
//! the window between the two, the destination contract's replay guard
//! rejects the re-submission on the next attempt and the rejection is
//! recorded as success.
//!
//! A dispatch that fails outright lands in the durable pending queue: its
//! block range is already past the cursor, so the queue is the only path
//! back to the destination call.

use alloy::primitives::{Address, U256};
use eyre::{eyre, Result};
use sqlx::SqlitePool;
use tracing::{debug, error, info, warn};

use crate::chain::ChainClient;
use crate::ledger::{self, NewPendingAction, PendingAction};
use crate::retry::{classify_error, DispatchError, RetryConfig};
use crate::routes::RelayRoute;
use crate::types::{Action, ActionKind, CorrelationId, RelayEvent};

/// Outcome of one dispatch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Destination call confirmed and recorded.
    Dispatched { tx_hash: String },
    /// The work had already been done (ledger hit or replay-guard revert).
    AlreadyDone,
    /// Submission failed; the action is queued for retry on a later pass.
    Deferred,
}

/// Dispatch a freshly-scanned event.
pub async fn dispatch_event(
    dest: &dyn ChainClient,
    pool: &SqlitePool,
    route: &RelayRoute,
    event: &RelayEvent,
) -> Result<DispatchOutcome> {
    let correlation_id = event.correlation_id;

    if ledger::is_processed(pool, &correlation_id, route.dest_chain).await? {
        debug!(
            route = route.name,
            correlation_id = %correlation_id,
            "Event already processed, skipping"
        );
        return Ok(DispatchOutcome::AlreadyDone);
    }

    info!(
        route = route.name,
        correlation_id = %correlation_id,
        block_number = event.block_number,
        kind = %event.kind,
        "Dispatching event"
    );

    let action = route.action_for(event)?;
    match try_submit(dest, pool, route, &correlation_id, &action).await? {
        Ok(tx_hash) => {
            info!(
                route = route.name,
                correlation_id = %correlation_id,
                tx_hash = %tx_hash,
                "Dispatch confirmed"
            );
            Ok(DispatchOutcome::Dispatched { tx_hash })
        }
        Err(DispatchError::AlreadyProcessed(_)) => Ok(DispatchOutcome::AlreadyDone),
        Err(err) => {
            // The block range is already consumed by this pass; the pending
            // queue is the only path back to the destination call.
            warn!(
                route = route.name,
                correlation_id = %correlation_id,
                error = %err,
                "Dispatch failed, queueing for retry"
            );
            ledger::enqueue_pending(
                pool,
                &pending_from_action(&correlation_id, route, &action, &err.to_string()),
            )
            .await?;
            Ok(DispatchOutcome::Deferred)
        }
    }
}

/// Drain this route's due pending actions before new scanning.
pub async fn drain_pending(
    dest: &dyn ChainClient,
    pool: &SqlitePool,
    route: &RelayRoute,
    retry: &RetryConfig,
) -> Result<()> {
    let due = ledger::due_pending(
        pool,
        route.dest_chain,
        route.action.as_str(),
        retry.max_retries,
    )
    .await?;

    if !due.is_empty() {
        info!(route = route.name, count = due.len(), "Draining pending actions");
    }

    for row in due {
        let Some(correlation_id) = CorrelationId::from_key(&row.correlation_id) else {
            error!(
                route = route.name,
                correlation_id = %row.correlation_id,
                "Pending action has an unparseable correlation key"
            );
            continue;
        };

        if ledger::is_processed(pool, &correlation_id, route.dest_chain).await? {
            ledger::remove_pending(pool, row.id).await?;
            continue;
        }

        let action = match action_from_row(&row) {
            Ok(action) => action,
            Err(err) => {
                error!(
                    route = route.name,
                    pending_id = row.id,
                    error = %err,
                    "Pending action row is malformed"
                );
                continue;
            }
        };

        match try_submit(dest, pool, route, &correlation_id, &action).await? {
            Ok(tx_hash) => {
                info!(
                    route = route.name,
                    correlation_id = %correlation_id,
                    tx_hash = %tx_hash,
                    attempts = row.attempts,
                    "Pending action dispatched"
                );
                ledger::remove_pending(pool, row.id).await?;
            }
            Err(DispatchError::AlreadyProcessed(_)) => {
                ledger::remove_pending(pool, row.id).await?;
            }
            Err(err) => {
                let retry_after = retry.next_retry_after(row.attempts as u32);
                warn!(
                    route = route.name,
                    correlation_id = %correlation_id,
                    attempts = row.attempts + 1,
                    retry_after = %retry_after,
                    error = %err,
                    "Pending action failed again"
                );
                ledger::record_pending_failure(pool, row.id, &err.to_string(), retry_after)
                    .await?;
            }
        }
    }

    Ok(())
}

/// One submission attempt with ledger recording. The outer `Result` carries
/// ledger/database failures; the inner one the classified submission outcome.
async fn try_submit(
    dest: &dyn ChainClient,
    pool: &SqlitePool,
    route: &RelayRoute,
    correlation_id: &CorrelationId,
    action: &Action,
) -> Result<std::result::Result<String, DispatchError>> {
    match dest.submit_action(route.dest_contract, action).await {
        Ok(tx_hash) => {
            ledger::mark_processed(pool, correlation_id, route.dest_chain, Some(&tx_hash))
                .await?;
            Ok(Ok(tx_hash))
        }
        Err(err) => {
            let classified = classify_error(&format!("{:#}", err));
            if classified.is_success_equivalent() {
                // The destination already executed this correlation id; our
                // ledger write was lost somewhere. Record it now, without a
                // transaction hash (the original one is unknown).
                info!(
                    route = route.name,
                    correlation_id = %correlation_id,
                    "Destination replay guard reports already processed, recording"
                );
                ledger::mark_processed(pool, correlation_id, route.dest_chain, None).await?;
            }
            Ok(Err(classified))
        }
    }
}

fn pending_from_action(
    correlation_id: &CorrelationId,
    route: &RelayRoute,
    action: &Action,
    error: &str,
) -> NewPendingAction {
    let (user_address, amount, nonce) = match action {
        Action::MintWrapped { user, amount, nonce } | Action::Unlock { user, amount, nonce } => (
            Some(format!("{:?}", user)),
            Some(amount.to_string()),
            Some(*nonce as i64),
        ),
        Action::PauseBridge => (None, None, None),
    };

    NewPendingAction {
        correlation_id: correlation_id.as_key(),
        chain_id: route.dest_chain.as_i64(),
        action_kind: action.kind().as_str().to_string(),
        user_address,
        amount,
        nonce,
        last_error: error.to_string(),
    }
}

/// Rebuild the destination call from a pending-action row.
fn action_from_row(row: &PendingAction) -> Result<Action> {
    let kind = ActionKind::from_str(&row.action_kind)
        .ok_or_else(|| eyre!("Unknown action kind {}", row.action_kind))?;

    match kind {
        ActionKind::PauseBridge => Ok(Action::PauseBridge),
        ActionKind::MintWrapped | ActionKind::Unlock => {
            let user: Address = row
                .user_address
                .as_deref()
                .ok_or_else(|| eyre!("Missing user address"))?
                .parse()
                .map_err(|_| eyre!("Invalid user address"))?;
            let amount: U256 = row
                .amount
                .as_deref()
                .ok_or_else(|| eyre!("Missing amount"))?
                .parse()
                .map_err(|_| eyre!("Invalid amount"))?;
            let nonce = row.nonce.ok_or_else(|| eyre!("Missing nonce"))? as u64;

            Ok(match kind {
                ActionKind::MintWrapped => Action::MintWrapped { user, amount, nonce },
                _ => Action::Unlock { user, amount, nonce },
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::routes::RouteKind;
    use crate::types::ChainId;

    fn pending_row(kind: &str, user: Option<&str>, amount: Option<&str>, nonce: Option<i64>) -> PendingAction {
        PendingAction {
            id: 1,
            correlation_id: "5".to_string(),
            chain_id: 2222,
            action_kind: kind.to_string(),
            user_address: user.map(str::to_string),
            amount: amount.map(str::to_string),
            nonce,
            attempts: 1,
            last_error: None,
            retry_after: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_action_round_trips_through_pending_row() {
        let route = RelayRoute {
            name: "lock-mint",
            kind: RouteKind::ValueTransfer,
            source_chain: ChainId(1111),
            source_contract: Address::ZERO,
            event: crate::types::EventKind::Locked,
            dest_chain: ChainId(2222),
            dest_contract: Address::ZERO,
            action: ActionKind::MintWrapped,
        };
        let action = Action::MintWrapped {
            user: Address::repeat_byte(0x42),
            amount: U256::from(123456789u64),
            nonce: 5,
        };
        let new = pending_from_action(&CorrelationId::Nonce(5), &route, &action, "boom");
        let row = pending_row(
            &new.action_kind,
            new.user_address.as_deref(),
            new.amount.as_deref(),
            new.nonce,
        );
        assert_eq!(action_from_row(&row).unwrap(), action);
    }

    #[test]
    fn test_pause_bridge_row_needs_no_fields() {
        let row = pending_row("pause_bridge", None, None, None);
        assert_eq!(action_from_row(&row).unwrap(), Action::PauseBridge);
    }

    #[test]
    fn test_malformed_row_is_rejected() {
        let row = pending_row("mint_wrapped", None, Some("10"), Some(1));
        assert!(action_from_row(&row).is_err());

        let row = pending_row("no_such_kind", None, None, None);
        assert!(action_from_row(&row).is_err());
    }
}
