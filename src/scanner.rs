//! Event scanner
//!
//! Pulls finalized log ranges for one route and decodes them into canonical
//! relay events. The head is queried once per pass and both the finality
//! cut-off and the scan range derive from that single observation, so a reorg
//! between head query and log query cannot shift the apparent tip mid-pass.
//!
//! Decoding failures abort the pass: a log that does not match the expected
//! ABI means contract/version skew, not a transient condition.

use eyre::{eyre, Result};
use sqlx::SqlitePool;
use tracing::debug;

use crate::chain::{ChainClient, LogRecord};
use crate::ledger;
use crate::routes::{RelayRoute, RouteKind};
use crate::types::{ChainId, CorrelationId, EventPayload, RelayEvent};

/// The finalized block range of one pass, derived from a single head
/// observation and shared by every route on the source chain so the chain
/// cursor can advance once for all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRange {
    pub from_block: u64,
    /// Upper bound of the range; the cursor advances here once the whole
    /// pass has completed.
    pub to_block: u64,
}

/// Compute the newly-finalized range for a source chain.
///
/// Returns `None` when nothing new has finalized (`to_block <= cursor`).
pub async fn finalized_range(
    client: &dyn ChainClient,
    pool: &SqlitePool,
    chain_id: ChainId,
    confirmation_depth: u64,
    sync_lookback: u64,
) -> Result<Option<ScanRange>> {
    let head = client.head_block().await?;
    let to_block = head.saturating_sub(confirmation_depth);
    let cursor = ledger::cursor_or_default(pool, chain_id, head, sync_lookback).await?;

    if to_block <= cursor {
        return Ok(None);
    }

    Ok(Some(ScanRange {
        from_block: cursor + 1,
        to_block,
    }))
}

/// Fetch and decode one route's events over an already-computed range.
pub async fn scan_events(
    client: &dyn ChainClient,
    route: &RelayRoute,
    range: ScanRange,
) -> Result<Vec<RelayEvent>> {
    debug!(
        route = route.name,
        chain_id = %route.source_chain,
        from_block = range.from_block,
        to_block = range.to_block,
        "Scanning block range"
    );

    let logs = client
        .fetch_logs(
            route.source_contract,
            route.event_signature(),
            range.from_block,
            range.to_block,
        )
        .await?;

    let mut events = Vec::with_capacity(logs.len());
    for log in &logs {
        events.push(decode_log(route, log)?);
    }

    events.sort_by_key(|event| (event.block_number, event.log_index));

    Ok(events)
}

/// Decode a raw log into a canonical relay event according to the route's
/// decode strategy.
pub fn decode_log(route: &RelayRoute, log: &LogRecord) -> Result<RelayEvent> {
    let (correlation_id, payload) = match route.kind {
        RouteKind::ValueTransfer => decode_transfer(log)?,
        RouteKind::Governance => decode_proposal(log)?,
    };

    Ok(RelayEvent {
        chain_id: route.source_chain,
        block_number: log.block_number,
        log_index: log.log_index,
        kind: route.event,
        correlation_id,
        payload,
    })
}

/// Locked/Burned layout: topics[1] = user (indexed), data = amount || nonce.
fn decode_transfer(log: &LogRecord) -> Result<(CorrelationId, EventPayload)> {
    if log.topics.len() < 2 {
        return Err(eyre!(
            "Malformed transfer log: expected 2 topics, got {}",
            log.topics.len()
        ));
    }
    let data = log.data.as_ref();
    if data.len() < 64 {
        return Err(eyre!(
            "Malformed transfer log: expected 64 data bytes, got {}",
            data.len()
        ));
    }

    let user = alloy::primitives::Address::from_word(log.topics[1]);
    let amount = alloy::primitives::U256::from_be_slice(&data[0..32]);
    let nonce_word = alloy::primitives::U256::from_be_slice(&data[32..64]);
    let nonce = u64::try_from(nonce_word)
        .map_err(|_| eyre!("Transfer nonce {} exceeds u64 range", nonce_word))?;

    Ok((
        CorrelationId::Nonce(nonce),
        EventPayload::Transfer { user, amount, nonce },
    ))
}

/// ProposalPassed layout: no indexed params, data = proposalId || offset ||
/// length || payload bytes.
fn decode_proposal(log: &LogRecord) -> Result<(CorrelationId, EventPayload)> {
    let data = log.data.as_ref();
    if data.len() < 96 {
        return Err(eyre!(
            "Malformed proposal log: expected at least 96 data bytes, got {}",
            data.len()
        ));
    }

    let id_word = alloy::primitives::U256::from_be_slice(&data[0..32]);
    let proposal_id = u64::try_from(id_word)
        .map_err(|_| eyre!("Proposal id {} exceeds u64 range", id_word))?;

    let offset_word = alloy::primitives::U256::from_be_slice(&data[32..64]);
    let offset = usize::try_from(offset_word)
        .map_err(|_| eyre!("Malformed proposal log: bad bytes offset"))?;
    if data.len() < offset + 32 {
        return Err(eyre!("Malformed proposal log: bytes offset out of range"));
    }

    let len_word = alloy::primitives::U256::from_be_slice(&data[offset..offset + 32]);
    let len = usize::try_from(len_word)
        .map_err(|_| eyre!("Malformed proposal log: bad bytes length"))?;
    if data.len() < offset + 32 + len {
        return Err(eyre!("Malformed proposal log: bytes payload truncated"));
    }

    let payload = alloy::primitives::Bytes::copy_from_slice(&data[offset + 32..offset + 32 + len]);

    Ok((
        CorrelationId::Proposal(proposal_id),
        EventPayload::Governance {
            proposal_id,
            data: payload,
        },
    ))
}
