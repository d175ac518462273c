//! Processed-notification queries.

use sqlx::SqlitePool;

use super::unix_now;
use crate::error::DbResult;

/// Whether a notification id has already been handled.
pub async fn is_processed(pool: &SqlitePool, cid: &str) -> DbResult<bool> {
    let found: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM processed_notifications WHERE cid = ?")
            .bind(cid)
            .fetch_optional(pool)
            .await?;
    Ok(found.is_some())
}

/// Record a notification id as handled. Marking twice is a no-op.
pub async fn mark_processed(pool: &SqlitePool, cid: &str) -> DbResult<()> {
    sqlx::query("INSERT OR IGNORE INTO processed_notifications (cid, processed_at) VALUES (?, ?)")
        .bind(cid)
        .bind(unix_now())
        .execute(pool)
        .await?;
    Ok(())
}
