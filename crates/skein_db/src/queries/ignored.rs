//! Ignored-actor queries.

use sqlx::SqlitePool;

use super::unix_now;
use crate::error::DbResult;

/// Whether an actor is on the ignore list.
pub async fn is_ignored(pool: &SqlitePool, did: &str) -> DbResult<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM ignored_actors WHERE did = ?")
        .bind(did.trim())
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

/// Add actors to the ignore list in one transaction.
///
/// Returns how many were newly added.
pub async fn add_ignored<S: AsRef<str>>(pool: &SqlitePool, dids: &[S]) -> DbResult<u64> {
    let now = unix_now();
    let mut tx = pool.begin().await?;
    let mut added = 0;
    for did in dids {
        let did = did.as_ref().trim();
        if did.is_empty() {
            continue;
        }
        let result = sqlx::query("INSERT OR IGNORE INTO ignored_actors (did, added_at) VALUES (?, ?)")
            .bind(did)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        added += result.rows_affected();
    }
    tx.commit().await?;
    Ok(added)
}

/// Remove an actor from the ignore list. Returns whether it was present.
pub async fn remove_ignored(pool: &SqlitePool, did: &str) -> DbResult<bool> {
    let result = sqlx::query("DELETE FROM ignored_actors WHERE did = ?")
        .bind(did.trim())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// List every ignored actor, oldest first.
pub async fn list_ignored(pool: &SqlitePool) -> DbResult<Vec<String>> {
    let dids: Vec<String> = sqlx::query_scalar("SELECT did FROM ignored_actors ORDER BY added_at, did")
        .fetch_all(pool)
        .await?;
    Ok(dids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::StateDb;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_ignore_lifecycle() {
        let db = StateDb::open_in_memory().await.unwrap();
        let pool = db.pool();

        let added = add_ignored(pool, &["did:plc:aaa", "did:plc:bbb", "did:plc:aaa"])
            .await
            .unwrap();
        assert_eq!(added, 2);
        assert!(is_ignored(pool, "did:plc:aaa").await.unwrap());
        assert!(is_ignored(pool, " did:plc:bbb ").await.unwrap());

        assert!(remove_ignored(pool, "did:plc:aaa").await.unwrap());
        assert!(!remove_ignored(pool, "did:plc:aaa").await.unwrap());
        assert!(!is_ignored(pool, "did:plc:aaa").await.unwrap());

        assert_eq!(list_ignored(pool).await.unwrap(), vec!["did:plc:bbb".to_string()]);
    }

    #[tokio::test]
    async fn test_blank_entries_skipped() {
        let db = StateDb::open_in_memory().await.unwrap();
        let added = add_ignored(db.pool(), &["", "   "]).await.unwrap();
        assert_eq!(added, 0);
    }
}
