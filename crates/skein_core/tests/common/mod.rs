//! Shared fixtures: an in-memory posting service and a corpus on disk.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use skein_core::post::{BlobRef, PostDraft, StrongRef, strong_ref};
use skein_core::{CoreError, DirCorpus, HandleResolver, Notification, PostingApi, Result, Session};

pub const BOT_DID: &str = "did:plc:bot";
pub const OWNER_DID: &str = "did:plc:owner";

const BASE32: &[u8] = b"abcdefghijklmnopqrstuvwxyz234567";

/// A well-formed dag-cbor CIDv1 derived from `seed`.
pub fn cid_for(seed: &str) -> String {
    let bytes = seed.as_bytes();
    let mut cid = String::from("bafyreia");
    for i in 0..50 {
        cid.push(BASE32[(bytes[i % bytes.len()] as usize + i) % 32] as char);
    }
    // zero padding bits
    cid.push('a');
    cid
}

pub fn record_ref(seed: &str, uri: &str) -> StrongRef {
    strong_ref(&cid_for(seed), uri).unwrap()
}

/// Posting service that records every draft instead of sending it.
#[derive(Default)]
pub struct MockPostingApi {
    pub published: Mutex<Vec<(StrongRef, PostDraft)>>,
    pub uploads: Mutex<Vec<(usize, String)>>,
    pub notifications: Mutex<Vec<Notification>>,
    pub handles: HashMap<String, String>,
    /// Publishing fails for drafts whose text contains this
    pub fail_text: Mutex<Option<String>>,
    pub fail_uploads: bool,
}

impl MockPostingApi {
    pub fn new() -> Self {
        let mut handles = HashMap::new();
        handles.insert("fan.bsky.social".to_string(), "did:plc:fan".to_string());
        Self {
            handles,
            ..Default::default()
        }
    }

    pub fn with_notifications(self, notifications: Vec<Notification>) -> Self {
        *self.notifications.lock() = notifications;
        self
    }

    pub fn fail_publishing(&self, needle: &str) {
        *self.fail_text.lock() = Some(needle.to_string());
    }

    pub fn stop_failing(&self) {
        *self.fail_text.lock() = None;
    }

    pub fn drafts(&self) -> Vec<PostDraft> {
        self.published.lock().iter().map(|(_, d)| d.clone()).collect()
    }

    pub fn posted_texts(&self) -> Vec<String> {
        self.published
            .lock()
            .iter()
            .map(|(_, d)| d.text.clone())
            .collect()
    }

    pub fn session() -> Session {
        Session {
            access_token: "token".to_string(),
            did: BOT_DID.to_string(),
            handle: "bot.bsky.social".to_string(),
        }
    }
}

#[async_trait]
impl HandleResolver for MockPostingApi {
    async fn resolve_handle(&self, handle: &str) -> Result<Option<String>> {
        Ok(self.handles.get(handle).cloned())
    }
}

#[async_trait]
impl PostingApi for MockPostingApi {
    async fn login(&self, identifier: &str, _secret: &str) -> Result<Session> {
        if identifier.is_empty() {
            return Err(CoreError::AuthFailure {
                identifier: identifier.to_string(),
                cause: "empty identifier".to_string(),
            });
        }
        Ok(Self::session())
    }

    async fn publish(&self, repo: &str, draft: &PostDraft) -> Result<StrongRef> {
        if let Some(needle) = self.fail_text.lock().as_deref() {
            if draft.text.contains(needle) {
                return Err(CoreError::publish_failure("HTTP 502: upstream unavailable"));
            }
        }
        let mut published = self.published.lock();
        let n = published.len() + 1;
        let created = record_ref(
            &format!("post{}", n),
            &format!("at://{}/app.bsky.feed.post/{}", repo, n),
        );
        published.push((created.clone(), draft.clone()));
        Ok(created)
    }

    async fn upload_blob(&self, bytes: Vec<u8>, mime_type: &str) -> Result<BlobRef> {
        if self.fail_uploads {
            return Err(CoreError::media_failure("blob", "HTTP 413: too large"));
        }
        let mut uploads = self.uploads.lock();
        uploads.push((bytes.len(), mime_type.to_string()));
        Ok(serde_json::from_value::<BlobRef>(json!({
            "$type": "blob",
            "ref": {"$link": cid_for(&format!("blob{}", uploads.len()))},
            "mimeType": mime_type,
            "size": bytes.len(),
        }))
        .unwrap())
    }

    async fn list_notifications(&self, limit: u32) -> Result<Vec<Notification>> {
        Ok(self
            .notifications
            .lock()
            .iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

/// A mention post by `author`; `key` seeds its CID and record key.
pub fn mention(key: &str, author: &str, text: &str) -> Notification {
    let uri = format!("at://{}/app.bsky.feed.post/{}", author, key);
    Notification {
        cid: cid_for(key),
        post: record_ref(key, &uri),
        author_did: author.to_string(),
        author_handle: format!("{}.test", key),
        reason: "mention".to_string(),
        text: text.to_string(),
        thread_root: None,
    }
}

/// A small PNG, encoded on the fly.
pub fn png_bytes() -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(8, 8, image::Rgba([10, 200, 10, 255]));
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// Write `files` (relative path, contents) under a fresh temp corpus.
pub async fn corpus(files: &[(&str, Vec<u8>)]) -> (tempfile::TempDir, Arc<DirCorpus>) {
    let dir = tempfile::tempdir().unwrap();
    for (path, contents) in files {
        write(dir.path(), path, contents).await;
    }
    let corpus = Arc::new(DirCorpus::new(dir.path()));
    (dir, corpus)
}

async fn write(root: &Path, path: &str, contents: &[u8]) {
    let full = root.join(path);
    tokio::fs::create_dir_all(full.parent().unwrap()).await.unwrap();
    tokio::fs::write(full, contents).await.unwrap();
}
