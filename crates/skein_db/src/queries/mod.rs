//! State query functions.
//!
//! Organized by concern:
//! - `processed`: notification idempotency guard
//! - `ignored`: actor blacklist
//! - `activity`: per-day mention counters and seen texts

mod activity;
mod ignored;
mod processed;

pub use activity::*;
pub use ignored::*;
pub use processed::*;

/// Current Unix timestamp in seconds.
fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
