//! Skein state layer
//!
//! SQLite-backed storage for everything the bot must remember between runs.
//!
//! # Tables
//!
//! - **processed_notifications** - idempotency guard, one row per handled notification
//! - **ignored_actors** - actors excluded from automatic replies
//! - **mention_counts** - per-actor, per-UTC-day mention counters
//! - **seen_texts** - per-actor, per-UTC-day mention texts for de-duplication
//!
//! The store assumes a single writer. Invocations must be serialized outside
//! the process; nothing here takes cross-process locks.
//!
//! # Usage
//!
//! ```rust,ignore
//! use skein_db::StateDb;
//!
//! let db = StateDb::open("path/to/state.db").await?;
//! let fresh = !skein_db::queries::is_processed(db.pool(), "bafy...").await?;
//! ```

pub mod connection;
pub mod error;
pub mod queries;

pub use connection::{StateDb, StateStats};
pub use error::{DbError, DbResult};
