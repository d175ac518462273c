//! The network surface the engine publishes through.
//!
//! Everything network-shaped goes through [`PostingApi`]: one bounded
//! request per call, no retries. The production implementation is
//! [`crate::bsky::BskyClient`]; tests substitute an in-memory fake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::post::{BlobRef, PostDraft, StrongRef};

/// An authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    /// DID of the logged-in account, used as the repo for new records
    pub did: String,
    pub handle: String,
}

/// Reason string marking an actionable notification.
pub const MENTION_REASON: &str = "mention";

/// An inbound notification, reduced to what the dispatcher needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// CID of the notifying post, the key processed state is tracked by
    pub cid: String,
    /// The notifying post itself
    pub post: StrongRef,
    pub author_did: String,
    pub author_handle: String,
    pub reason: String,
    pub text: String,
    /// Root of the thread the notifying post belongs to, if it is a reply
    pub thread_root: Option<StrongRef>,
}

impl Notification {
    pub fn is_mention(&self) -> bool {
        self.reason == MENTION_REASON
    }

    /// Strong reference to the notifying post itself.
    pub fn post_ref(&self) -> StrongRef {
        self.post.clone()
    }
}

/// Handle-to-DID lookup used while building mention facets.
#[async_trait]
pub trait HandleResolver: Send + Sync {
    /// Resolve a handle (without `@`). `Ok(None)` means the handle does not exist.
    async fn resolve_handle(&self, handle: &str) -> Result<Option<String>>;
}

/// Remote posting service.
#[async_trait]
pub trait PostingApi: HandleResolver {
    /// Establish a session. Failure is [`crate::CoreError::AuthFailure`].
    async fn login(&self, identifier: &str, secret: &str) -> Result<Session>;

    /// Create a post record in `repo`. Failure is [`crate::CoreError::PublishFailure`].
    async fn publish(&self, repo: &str, draft: &PostDraft) -> Result<StrongRef>;

    /// Upload binary data. Failure is [`crate::CoreError::MediaFailure`].
    async fn upload_blob(&self, bytes: Vec<u8>, mime_type: &str) -> Result<BlobRef>;

    /// Most recent notifications, newest first.
    async fn list_notifications(&self, limit: u32) -> Result<Vec<Notification>>;
}
