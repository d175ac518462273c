//! Durable bot state as seen by the dispatcher.
//!
//! [`StateStore`] is the read-modify-write contract; [`skein_db::StateDb`] is
//! the SQLite implementation. Day-scoped operations take the UTC date
//! explicitly so callers (and tests) decide what "today" is.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use skein_db::{StateDb, queries};

use crate::error::Result;

/// Current UTC calendar date.
pub fn utc_today() -> NaiveDate {
    Utc::now().date_naive()
}

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn is_processed(&self, cid: &str) -> Result<bool>;
    async fn mark_processed(&self, cid: &str) -> Result<()>;

    async fn is_ignored(&self, did: &str) -> Result<bool>;
    /// Returns how many actors were newly added.
    async fn add_ignored(&self, dids: &[String]) -> Result<u64>;
    /// Returns whether the actor was on the list.
    async fn remove_ignored(&self, did: &str) -> Result<bool>;
    async fn list_ignored(&self) -> Result<Vec<String>>;

    /// Whether `text` was already seen from `did` on `day`. Records it when not.
    async fn is_duplicate_text(&self, did: &str, day: NaiveDate, text: &str) -> Result<bool>;
    /// Undo the recording done by [`StateStore::is_duplicate_text`].
    async fn forget_text(&self, did: &str, day: NaiveDate, text: &str) -> Result<()>;

    /// Increment and return the actor's mention count for `day`.
    async fn increment_mention_count(&self, did: &str, day: NaiveDate) -> Result<u32>;
    /// Take back one increment, for mentions that will be retried.
    async fn decrement_mention_count(&self, did: &str, day: NaiveDate) -> Result<u32>;

    /// Drop day-scoped records older than `day`; returns rows removed.
    async fn prune_before(&self, day: NaiveDate) -> Result<u64>;
}

#[async_trait]
impl StateStore for StateDb {
    async fn is_processed(&self, cid: &str) -> Result<bool> {
        Ok(queries::is_processed(self.pool(), cid).await?)
    }

    async fn mark_processed(&self, cid: &str) -> Result<()> {
        Ok(queries::mark_processed(self.pool(), cid).await?)
    }

    async fn is_ignored(&self, did: &str) -> Result<bool> {
        Ok(queries::is_ignored(self.pool(), did).await?)
    }

    async fn add_ignored(&self, dids: &[String]) -> Result<u64> {
        Ok(queries::add_ignored(self.pool(), dids).await?)
    }

    async fn remove_ignored(&self, did: &str) -> Result<bool> {
        Ok(queries::remove_ignored(self.pool(), did).await?)
    }

    async fn list_ignored(&self) -> Result<Vec<String>> {
        Ok(queries::list_ignored(self.pool()).await?)
    }

    async fn is_duplicate_text(&self, did: &str, day: NaiveDate, text: &str) -> Result<bool> {
        Ok(queries::check_and_record_text(self.pool(), did, day, text).await?)
    }

    async fn forget_text(&self, did: &str, day: NaiveDate, text: &str) -> Result<()> {
        Ok(queries::forget_text(self.pool(), did, day, text).await?)
    }

    async fn increment_mention_count(&self, did: &str, day: NaiveDate) -> Result<u32> {
        Ok(queries::increment_mention_count(self.pool(), did, day).await?)
    }

    async fn decrement_mention_count(&self, did: &str, day: NaiveDate) -> Result<u32> {
        Ok(queries::decrement_mention_count(self.pool(), did, day).await?)
    }

    async fn prune_before(&self, day: NaiveDate) -> Result<u64> {
        Ok(queries::prune_activity_before(self.pool(), day).await?)
    }
}
