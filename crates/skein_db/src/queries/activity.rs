//! Day-scoped mention activity: counters and seen texts.
//!
//! Days are UTC calendar dates stored as `YYYY-MM-DD`, so lexical order is
//! date order and pruning is a plain `<` comparison.

use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::error::DbResult;

/// Increment an actor's mention counter for `day` and return the new value.
pub async fn increment_mention_count(
    pool: &SqlitePool,
    did: &str,
    day: NaiveDate,
) -> DbResult<u32> {
    let count: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO mention_counts (day, did, count) VALUES (?, ?, 1)
        ON CONFLICT(day, did) DO UPDATE SET count = count + 1
        RETURNING count
        "#,
    )
    .bind(day)
    .bind(did)
    .fetch_one(pool)
    .await?;
    Ok(count as u32)
}

/// Take back one increment, never going below zero. Returns the new value.
pub async fn decrement_mention_count(
    pool: &SqlitePool,
    did: &str,
    day: NaiveDate,
) -> DbResult<u32> {
    let count: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE mention_counts SET count = MAX(count - 1, 0)
        WHERE day = ? AND did = ?
        RETURNING count
        "#,
    )
    .bind(day)
    .bind(did)
    .fetch_optional(pool)
    .await?;
    Ok(count.unwrap_or(0) as u32)
}

/// Check whether `text` was already seen from `did` on `day`, recording it if not.
///
/// The check and the insert are a single statement: a zero row count from
/// `INSERT OR IGNORE` means the text was already present.
pub async fn check_and_record_text(
    pool: &SqlitePool,
    did: &str,
    day: NaiveDate,
    text: &str,
) -> DbResult<bool> {
    let result = sqlx::query("INSERT OR IGNORE INTO seen_texts (day, did, text) VALUES (?, ?, ?)")
        .bind(day)
        .bind(did)
        .bind(text.trim())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 0)
}

/// Drop a recorded text so a retried mention is not mistaken for a duplicate.
pub async fn forget_text(pool: &SqlitePool, did: &str, day: NaiveDate, text: &str) -> DbResult<()> {
    sqlx::query("DELETE FROM seen_texts WHERE day = ? AND did = ? AND text = ?")
        .bind(day)
        .bind(did)
        .bind(text.trim())
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete counters and seen texts for days strictly before `day`.
///
/// Returns the number of rows removed across both tables.
pub async fn prune_activity_before(pool: &SqlitePool, day: NaiveDate) -> DbResult<u64> {
    let mut tx = pool.begin().await?;
    let counts = sqlx::query("DELETE FROM mention_counts WHERE day < ?")
        .bind(day)
        .execute(&mut *tx)
        .await?;
    let texts = sqlx::query("DELETE FROM seen_texts WHERE day < ?")
        .bind(day)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(counts.rows_affected() + texts.rows_affected())
}
