//! Durable idempotency ledger and scan cursors
//!
//! Three tables back the relayer's recovery story: processed_events (which
//! correlation ids already produced a confirmed destination call),
//! sync_cursors (per-chain scan watermark) and pending_actions (dispatches
//! that failed after their block range was scanned). The
//! (correlation_id, chain_id) uniqueness constraint makes concurrent writes
//! from independent route tasks safe; inserts that lose the race are no-ops.

use std::path::Path;

use chrono::Utc;
use eyre::{Result, WrapErr};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

pub mod models;

pub use models::*;

use crate::types::{ChainId, CorrelationId};

/// Create a database connection pool, creating the database file (and its
/// parent directory) if missing.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    if let Some(path) = database_url.strip_prefix("sqlite://") {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .wrap_err_with(|| format!("Failed to create data directory {:?}", parent))?;
            }
        }
    }

    let options: SqliteConnectOptions = database_url
        .parse::<SqliteConnectOptions>()
        .wrap_err("Invalid DATABASE_URL")?
        .create_if_missing(true);

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .wrap_err("Failed to connect to database")
}

/// Run pending migrations (uses the migration files in migrations/)
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .wrap_err("Failed to run database migrations")?;
    Ok(())
}

/// Check whether a (correlation id, destination chain) pair has already
/// produced a confirmed destination call.
pub async fn is_processed(
    pool: &SqlitePool,
    correlation_id: &CorrelationId,
    chain_id: ChainId,
) -> Result<bool> {
    let row: (bool,) = sqlx::query_as(
        r#"SELECT EXISTS(SELECT 1 FROM processed_events WHERE correlation_id = ? AND chain_id = ?)"#,
    )
    .bind(correlation_id.as_key())
    .bind(chain_id.as_i64())
    .fetch_one(pool)
    .await
    .wrap_err("Failed to check processed event existence")?;

    Ok(row.0)
}

/// Record a completed dispatch. Inserting an already-present pair is a no-op,
/// never an error, so the call is safely retriable.
pub async fn mark_processed(
    pool: &SqlitePool,
    correlation_id: &CorrelationId,
    chain_id: ChainId,
    tx_hash: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO processed_events (correlation_id, chain_id, tx_hash, created_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT (correlation_id, chain_id) DO NOTHING
        "#,
    )
    .bind(correlation_id.as_key())
    .bind(chain_id.as_i64())
    .bind(tx_hash)
    .bind(Utc::now())
    .execute(pool)
    .await
    .wrap_err_with(|| {
        format!(
            "Failed to mark {} processed for chain {}",
            correlation_id, chain_id
        )
    })?;

    Ok(())
}

/// Fetch a ledger entry, if one exists.
pub async fn get_processed(
    pool: &SqlitePool,
    correlation_id: &CorrelationId,
    chain_id: ChainId,
) -> Result<Option<ProcessedEvent>> {
    sqlx::query_as::<_, ProcessedEvent>(
        r#"SELECT * FROM processed_events WHERE correlation_id = ? AND chain_id = ?"#,
    )
    .bind(correlation_id.as_key())
    .bind(chain_id.as_i64())
    .fetch_optional(pool)
    .await
    .wrap_err("Failed to get processed event")
}

/// Get the raw scan cursor for a source chain, if one exists.
pub async fn get_cursor(pool: &SqlitePool, chain_id: ChainId) -> Result<Option<u64>> {
    let row: Option<(i64,)> =
        sqlx::query_as(r#"SELECT last_scanned_block FROM sync_cursors WHERE chain_id = ?"#)
            .bind(chain_id.as_i64())
            .fetch_optional(pool)
            .await
            .wrap_err("Failed to get sync cursor")?;

    Ok(row.map(|r| r.0 as u64))
}

/// Scan cursor with the first-run default applied: when no cursor exists yet,
/// start a conservative lookback below the observed head instead of scanning
/// from genesis.
pub async fn cursor_or_default(
    pool: &SqlitePool,
    chain_id: ChainId,
    head: u64,
    lookback: u64,
) -> Result<u64> {
    match get_cursor(pool, chain_id).await? {
        Some(cursor) => Ok(cursor),
        None => Ok(head.saturating_sub(lookback)),
    }
}

/// Overwrite the scan cursor. Monotonicity is caller discipline: the relay
/// loop only ever advances it to the upper bound of a completed pass.
pub async fn set_cursor(pool: &SqlitePool, chain_id: ChainId, block_number: u64) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sync_cursors (chain_id, last_scanned_block, updated_at)
        VALUES (?, ?, ?)
        ON CONFLICT (chain_id) DO UPDATE SET last_scanned_block = excluded.last_scanned_block,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(chain_id.as_i64())
    .bind(block_number as i64)
    .bind(Utc::now())
    .execute(pool)
    .await
    .wrap_err_with(|| format!("Failed to set cursor for chain {}", chain_id))?;

    Ok(())
}

/// All cursors, for the status API.
pub async fn all_cursors(pool: &SqlitePool) -> Result<Vec<SyncCursor>> {
    sqlx::query_as::<_, SyncCursor>(r#"SELECT * FROM sync_cursors ORDER BY chain_id"#)
        .fetch_all(pool)
        .await
        .wrap_err("Failed to list sync cursors")
}

/// Queue a failed dispatch for retry. Inserting an already-queued pair is a
/// no-op so repeated failures of the same event do not multiply rows.
pub async fn enqueue_pending(pool: &SqlitePool, action: &NewPendingAction) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO pending_actions (correlation_id, chain_id, action_kind, user_address,
            amount, nonce, attempts, last_error, created_at)
        VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)
        ON CONFLICT (correlation_id, chain_id) DO NOTHING
        "#,
    )
    .bind(&action.correlation_id)
    .bind(action.chain_id)
    .bind(&action.action_kind)
    .bind(&action.user_address)
    .bind(&action.amount)
    .bind(action.nonce)
    .bind(&action.last_error)
    .bind(Utc::now())
    .execute(pool)
    .await
    .wrap_err("Failed to enqueue pending action")?;

    Ok(())
}

/// Pending actions of one kind on a destination chain that are due for
/// another attempt. Routes sharing a destination chain drain only their own
/// action kind.
pub async fn due_pending(
    pool: &SqlitePool,
    chain_id: ChainId,
    action_kind: &str,
    max_attempts: u32,
) -> Result<Vec<PendingAction>> {
    sqlx::query_as::<_, PendingAction>(
        r#"
        SELECT * FROM pending_actions
        WHERE chain_id = ?
          AND action_kind = ?
          AND attempts < ?
          AND (retry_after IS NULL OR retry_after <= ?)
        ORDER BY created_at ASC
        LIMIT 10
        "#,
    )
    .bind(chain_id.as_i64())
    .bind(action_kind)
    .bind(max_attempts as i64)
    .bind(Utc::now())
    .fetch_all(pool)
    .await
    .wrap_err("Failed to get due pending actions")
}

/// Record another failed attempt on a pending action.
pub async fn record_pending_failure(
    pool: &SqlitePool,
    id: i64,
    error: &str,
    retry_after: chrono::DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE pending_actions
        SET attempts = attempts + 1, last_error = ?, retry_after = ?
        WHERE id = ?
        "#,
    )
    .bind(error)
    .bind(retry_after)
    .bind(id)
    .execute(pool)
    .await
    .wrap_err_with(|| format!("Failed to record failure for pending action {}", id))?;

    Ok(())
}

/// Remove a pending action once its dispatch has completed (or turned out to
/// be already processed).
pub async fn remove_pending(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query(r#"DELETE FROM pending_actions WHERE id = ?"#)
        .bind(id)
        .execute(pool)
        .await
        .wrap_err_with(|| format!("Failed to remove pending action {}", id))?;

    Ok(())
}

/// Count processed events, for the status API.
pub async fn count_processed(pool: &SqlitePool) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(r#"SELECT COUNT(*) FROM processed_events"#)
        .fetch_one(pool)
        .await
        .wrap_err("Failed to count processed events")?;

    Ok(row.0)
}

/// Count queued pending actions, for the status API.
pub async fn count_pending(pool: &SqlitePool) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(r#"SELECT COUNT(*) FROM pending_actions"#)
        .fetch_one(pool)
        .await
        .wrap_err("Failed to count pending actions")?;

    Ok(row.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_mark_processed_is_idempotent() {
        let pool = test_pool().await;
        let nonce = CorrelationId::Nonce(5);
        let chain = ChainId(2222);

        assert!(!is_processed(&pool, &nonce, chain).await.unwrap());

        mark_processed(&pool, &nonce, chain, Some("0xabc")).await.unwrap();
        assert!(is_processed(&pool, &nonce, chain).await.unwrap());

        // Second insert is a no-op, not an error, and keeps the first hash.
        mark_processed(&pool, &nonce, chain, Some("0xdef")).await.unwrap();
        assert_eq!(count_processed(&pool).await.unwrap(), 1);
        let entry = get_processed(&pool, &nonce, chain).await.unwrap().unwrap();
        assert_eq!(entry.tx_hash.as_deref(), Some("0xabc"));
    }

    #[tokio::test]
    async fn test_same_key_different_chains_do_not_collide() {
        let pool = test_pool().await;
        let nonce = CorrelationId::Nonce(5);

        mark_processed(&pool, &nonce, ChainId(1111), None).await.unwrap();
        assert!(!is_processed(&pool, &nonce, ChainId(2222)).await.unwrap());
    }

    #[tokio::test]
    async fn test_nonce_and_proposal_keys_are_distinct() {
        let pool = test_pool().await;
        let chain = ChainId(1111);

        mark_processed(&pool, &CorrelationId::Nonce(1), chain, Some("0x1"))
            .await
            .unwrap();
        assert!(
            !is_processed(&pool, &CorrelationId::Proposal(1), chain)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_cursor_default_and_upsert() {
        let pool = test_pool().await;
        let chain = ChainId(1111);

        // No cursor yet: conservative lookback from head.
        assert_eq!(cursor_or_default(&pool, chain, 500, 100).await.unwrap(), 400);
        // Lookback clamps at genesis.
        assert_eq!(cursor_or_default(&pool, chain, 50, 100).await.unwrap(), 0);

        set_cursor(&pool, chain, 120).await.unwrap();
        assert_eq!(get_cursor(&pool, chain).await.unwrap(), Some(120));
        assert_eq!(cursor_or_default(&pool, chain, 500, 100).await.unwrap(), 120);

        set_cursor(&pool, chain, 130).await.unwrap();
        assert_eq!(get_cursor(&pool, chain).await.unwrap(), Some(130));
    }

    #[tokio::test]
    async fn test_pending_queue_lifecycle() {
        let pool = test_pool().await;
        let chain = ChainId(2222);

        let new = NewPendingAction {
            correlation_id: "5".to_string(),
            chain_id: chain.as_i64(),
            action_kind: "mint_wrapped".to_string(),
            user_address: Some("0x0000000000000000000000000000000000000001".to_string()),
            amount: Some("1000".to_string()),
            nonce: Some(5),
            last_error: "rpc timeout".to_string(),
        };
        enqueue_pending(&pool, &new).await.unwrap();
        // Duplicate enqueue is a no-op.
        enqueue_pending(&pool, &new).await.unwrap();
        assert_eq!(count_pending(&pool).await.unwrap(), 1);

        let due = due_pending(&pool, chain, "mint_wrapped", 5).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].attempts, 1);

        // Other action kinds on the same chain see nothing.
        assert!(due_pending(&pool, chain, "pause_bridge", 5).await.unwrap().is_empty());

        // A failure scheduled into the future keeps the row but hides it.
        let later = Utc::now() + chrono::Duration::seconds(3600);
        record_pending_failure(&pool, due[0].id, "reverted", later)
            .await
            .unwrap();
        assert!(due_pending(&pool, chain, "mint_wrapped", 5).await.unwrap().is_empty());
        assert_eq!(count_pending(&pool).await.unwrap(), 1);

        remove_pending(&pool, due[0].id).await.unwrap();
        assert_eq!(count_pending(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_pending_not_due() {
        let pool = test_pool().await;
        let chain = ChainId(1111);

        let new = NewPendingAction {
            correlation_id: "PROPOSAL-1".to_string(),
            chain_id: chain.as_i64(),
            action_kind: "pause_bridge".to_string(),
            user_address: None,
            amount: None,
            nonce: None,
            last_error: "reverted".to_string(),
        };
        enqueue_pending(&pool, &new).await.unwrap();

        let due = due_pending(&pool, chain, "pause_bridge", 5).await.unwrap();
        let past = Utc::now() - chrono::Duration::seconds(1);
        for _ in 0..4 {
            record_pending_failure(&pool, due[0].id, "reverted", past).await.unwrap();
        }
        // attempts == 5 == max: excluded from the due set, row retained.
        assert!(due_pending(&pool, chain, "pause_bridge", 5).await.unwrap().is_empty());
        assert_eq!(count_pending(&pool).await.unwrap(), 1);
    }
}
