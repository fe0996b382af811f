use chrono::{DateTime, Utc};
use sqlx::FromRow;

// Amounts are stored as decimal strings to keep the full uint256 range; they
// are parsed back into U256 when a pending action is re-dispatched.

/// Append-only record of a completed dispatch. `chain_id` is the destination
/// chain; `tx_hash` is NULL when the entry was created from a destination
/// replay-guard rejection (the original transaction hash is unknown).
#[derive(Debug, Clone, FromRow)]
pub struct ProcessedEvent {
    pub id: i64,
    pub correlation_id: String,
    pub chain_id: i64,
    pub tx_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Per-source-chain scan watermark.
#[derive(Debug, Clone, FromRow)]
pub struct SyncCursor {
    pub chain_id: i64,
    pub last_scanned_block: i64,
    pub updated_at: DateTime<Utc>,
}

/// A dispatch that failed after its source range was scanned. The scanned
/// range is already past the cursor, so these rows are the only path back to
/// the destination call.
#[derive(Debug, Clone, FromRow)]
pub struct PendingAction {
    pub id: i64,
    pub correlation_id: String,
    pub chain_id: i64,
    pub action_kind: String,
    pub user_address: Option<String>,
    pub amount: Option<String>,
    pub nonce: Option<i64>,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub retry_after: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// For inserting new pending actions
#[derive(Debug, Clone)]
pub struct NewPendingAction {
    pub correlation_id: String,
    pub chain_id: i64,
    pub action_kind: String,
    pub user_address: Option<String>,
    pub amount: Option<String>,
    pub nonce: Option<i64>,
    pub last_error: String,
}
