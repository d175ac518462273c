//! [`PostingApi`] over an atrium `AtpAgent`.
//!
//! Each method is one XRPC call through the agent, which holds the session
//! and attaches it to every request. Errors become the matching
//! [`CoreError`] variant.

use atrium_api::agent::atp_agent::AtpAgent;
use atrium_api::agent::atp_agent::store::MemorySessionStore;
use atrium_api::app::bsky::feed::{self, post};
use atrium_api::app::bsky::notification::list_notifications;
use atrium_api::com::atproto::identity::resolve_handle;
use atrium_api::com::atproto::repo::create_record;
use atrium_api::record::KnownRecord;
use atrium_api::types::string::{AtIdentifier, Did, Handle};
use atrium_api::types::{Collection, LimitedNonZeroU8, TryFromUnknown, TryIntoUnknown};
use atrium_xrpc_client::reqwest::ReqwestClient;
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::api::{HandleResolver, Notification, PostingApi, Session};
use crate::error::{CoreError, Result};
use crate::post::{BlobRef, PostDraft, StrongRef, strong_ref};

/// Bluesky client bound to one PDS.
pub struct BskyClient {
    agent: AtpAgent<MemorySessionStore, ReqwestClient>,
    session: RwLock<Option<Session>>,
}

impl BskyClient {
    pub fn new(service: impl AsRef<str>) -> Self {
        let service = service.as_ref().trim_end_matches('/');
        Self {
            agent: AtpAgent::new(ReqwestClient::new(service), MemorySessionStore::default()),
            session: RwLock::new(None),
        }
    }

    /// Session established by the last successful login.
    pub fn session(&self) -> Option<Session> {
        self.session.read().clone()
    }
}

impl std::fmt::Debug for BskyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BskyClient")
            .field("session", &self.session.read().as_ref().map(|s| &s.did))
            .finish_non_exhaustive()
    }
}

/// Reduce a notification view to the fields the dispatcher reads.
///
/// Records that are not posts (follows, likes) keep empty text.
fn to_notification(view: list_notifications::Notification) -> Result<Notification> {
    let view = view.data;
    let post_record = post::Record::try_from_unknown(view.record).ok();
    let text = post_record
        .as_ref()
        .map(|r| r.text.clone())
        .unwrap_or_default();
    let thread_root = post_record
        .and_then(|r| r.data.reply)
        .map(|reply| reply.data.root);
    let cid = view.cid.as_ref().to_string();

    Ok(Notification {
        post: strong_ref(&cid, view.uri)?,
        cid,
        author_did: view.author.did.as_str().to_string(),
        author_handle: view.author.handle.as_str().to_string(),
        reason: view.reason,
        text,
        thread_root,
    })
}

#[async_trait]
impl HandleResolver for BskyClient {
    async fn resolve_handle(&self, handle: &str) -> Result<Option<String>> {
        let failure = |cause: String| CoreError::ResolveFailure {
            handle: handle.to_string(),
            cause,
        };
        let Ok(parsed) = Handle::new(handle.to_string()) else {
            debug!("{} is not a valid handle", handle);
            return Ok(None);
        };

        let result = self
            .agent
            .api
            .com
            .atproto
            .identity
            .resolve_handle(resolve_handle::ParametersData { handle: parsed }.into())
            .await;

        match result {
            Ok(output) => Ok(Some(output.data.did.as_str().to_string())),
            // Unknown handles come back as 400 InvalidRequest
            Err(atrium_xrpc::Error::XrpcResponse(e)) if e.status.as_u16() == 400 => {
                debug!("Handle {} did not resolve", handle);
                Ok(None)
            }
            Err(e) => Err(failure(e.to_string())),
        }
    }
}

#[async_trait]
impl PostingApi for BskyClient {
    async fn login(&self, identifier: &str, secret: &str) -> Result<Session> {
        debug!("Creating session for {}", identifier);
        let output = self
            .agent
            .login(identifier, secret)
            .await
            .map_err(|e| CoreError::AuthFailure {
                identifier: identifier.to_string(),
                cause: e.to_string(),
            })?;

        let session = Session {
            access_token: output.data.access_jwt.clone(),
            did: output.data.did.as_str().to_string(),
            handle: output.data.handle.as_str().to_string(),
        };
        info!("Logged in as {} ({})", session.handle, session.did);
        *self.session.write() = Some(session.clone());
        Ok(session)
    }

    async fn publish(&self, repo: &str, draft: &PostDraft) -> Result<StrongRef> {
        let repo = Did::new(repo.to_string())
            .map_err(|e| CoreError::publish_failure(format!("repo '{}': {}", repo, e)))?;
        let record = KnownRecord::AppBskyFeedPost(Box::new(draft.to_record()?))
            .try_into_unknown()
            .map_err(CoreError::publish_failure)?;

        let output = self
            .agent
            .api
            .com
            .atproto
            .repo
            .create_record(
                create_record::InputData {
                    collection: feed::Post::nsid(),
                    record,
                    repo: AtIdentifier::Did(repo),
                    rkey: None,
                    swap_commit: None,
                    validate: None,
                }
                .into(),
            )
            .await
            .map_err(CoreError::publish_failure)?;

        debug!("Created record {}", output.uri);
        strong_ref(&output.cid.as_ref().to_string(), output.data.uri.clone())
    }

    async fn upload_blob(&self, bytes: Vec<u8>, mime_type: &str) -> Result<BlobRef> {
        let size = bytes.len();
        let output = self
            .agent
            .api
            .com
            .atproto
            .repo
            .upload_blob(bytes)
            .await
            .map_err(|e| CoreError::media_failure("blob", e))?;
        debug!("Uploaded {} blob of {} bytes", mime_type, size);
        Ok(output.data.blob)
    }

    async fn list_notifications(&self, limit: u32) -> Result<Vec<Notification>> {
        let unavailable = |cause: String| CoreError::NotificationsUnavailable { cause };
        let limit = u8::try_from(limit.clamp(1, 100))
            .map_err(|e| unavailable(e.to_string()))
            .and_then(|n| LimitedNonZeroU8::<100>::try_from(n).map_err(unavailable))?;

        let output = self
            .agent
            .api
            .app
            .bsky
            .notification
            .list_notifications(
                list_notifications::ParametersData {
                    cursor: None,
                    limit: Some(limit),
                    priority: None,
                    reasons: None,
                    seen_at: None,
                }
                .into(),
            )
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        debug!("Received {} notifications", output.notifications.len());
        let mut notifications = Vec::with_capacity(output.notifications.len());
        for view in output.data.notifications {
            match to_notification(view) {
                Ok(n) => notifications.push(n),
                Err(e) => warn!("Skipping unreadable notification: {}", e),
            }
        }
        Ok(notifications)
    }
}
