//! Opening the SQLite file that holds processed, ignored and per-day state.

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::error::DbResult;

/// Connection to the bot's state database.
///
/// One file per bot identity. The pool is small because every run handles
/// notifications strictly one at a time.
#[derive(Debug, Clone)]
pub struct StateDb {
    pool: SqlitePool,
}

impl StateDb {
    /// Open the state file at `path`, creating it and its directory on first
    /// use. Pending migrations are applied before the handle is returned.
    pub async fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        info!("Opening state database: {}", path.display());

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .pragma("synchronous", "NORMAL")
            .pragma("temp_store", "MEMORY");

        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await?;

        debug!("State database connection established");

        Self::run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    /// Fresh, empty state that disappears with the handle.
    pub async fn open_in_memory() -> DbResult<Self> {
        let options = SqliteConnectOptions::new().filename(":memory:");

        // every connection to :memory: is its own database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Self::run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
        debug!("Running state migrations");
        sqlx::migrate!("./migrations").run(pool).await?;
        debug!("State migrations complete");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Wait for in-flight statements and close every connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// How much the bot currently remembers.
    pub async fn stats(&self) -> DbResult<StateStats> {
        let processed: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM processed_notifications")
            .fetch_one(&self.pool)
            .await?;
        let ignored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ignored_actors")
            .fetch_one(&self.pool)
            .await?;
        let days: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM (SELECT day FROM mention_counts UNION SELECT day FROM seen_texts)",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(StateStats {
            processed_count: processed as u64,
            ignored_count: ignored as u64,
            tracked_days: days as u64,
        })
    }
}

/// Row counts reported by [`StateDb::stats`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateStats {
    pub processed_count: u64,
    pub ignored_count: u64,
    /// Distinct UTC days that still have counters or seen texts.
    pub tracked_days: u64,
}
