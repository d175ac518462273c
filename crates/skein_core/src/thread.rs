//! Reply-chain cursor.

use tracing::debug;

use crate::api::{Notification, PostingApi};
use crate::error::Result;
use crate::post::{PostDraft, ReplyRef, StrongRef, reply_ref};

/// Root/parent cursor that turns a sequence of publishes into one thread.
///
/// The first publish in an empty thread goes out as-is and becomes both root
/// and parent. Every later publish is attached as a reply and then becomes
/// the new parent. The cursor only moves after a successful publish.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Thread {
    root: Option<StrongRef>,
    parent: Option<StrongRef>,
}

impl Thread {
    /// An empty thread.
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue an existing thread below `parent`.
    pub fn continue_from(root: StrongRef, parent: StrongRef) -> Self {
        Self {
            root: Some(root),
            parent: Some(parent),
        }
    }

    /// Thread for replying to a notification.
    ///
    /// The parent is the notifying post; the root is that post's own thread
    /// root when it is itself a reply.
    pub fn reply_to(notification: &Notification) -> Self {
        let parent = notification.post_ref();
        let root = notification
            .thread_root
            .clone()
            .unwrap_or_else(|| parent.clone());
        Self::continue_from(root, parent)
    }

    pub fn root(&self) -> Option<&StrongRef> {
        self.root.as_ref()
    }

    pub fn parent(&self) -> Option<&StrongRef> {
        self.parent.as_ref()
    }

    /// Reply linkage the next post would carry.
    pub fn reply_ref(&self) -> Option<ReplyRef> {
        match (&self.root, &self.parent) {
            (Some(root), Some(parent)) => Some(reply_ref(root.clone(), parent.clone())),
            _ => None,
        }
    }

    /// Publish `draft` at the cursor and advance it.
    pub async fn publish(
        &mut self,
        api: &dyn PostingApi,
        repo: &str,
        draft: PostDraft,
    ) -> Result<StrongRef> {
        let draft = match self.reply_ref() {
            Some(reply) => draft.with_reply(reply),
            None => draft,
        };

        let created = api.publish(repo, &draft).await?;
        debug!("Thread advanced to {}", created.uri);

        if self.root.is_none() {
            self.root = Some(created.clone());
        }
        self.parent = Some(created.clone());
        Ok(created)
    }
}
