//! Publishing text and images into threads.
//!
//! [`Publisher`] is bound to one logged-in repo. It owns the shaping rules
//! every outgoing post goes through: chunking, trailing links, facets and
//! image normalization.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::PostingApi;
use crate::config::PostingConfig;
use crate::corpus::{Corpus, Shelf};
use crate::error::{CoreError, Result};
use crate::image::ImageCompressor;
use crate::post::{PostDraft, StrongRef};
use crate::text::{Block, FacetExtractor, WorkDocument, post_chunks};
use crate::thread::Thread;

/// A content item left out of a thread, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedItem {
    pub item: String,
    pub reason: String,
}

/// Outcome of publishing one work document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkReport {
    pub title: String,
    pub posted: usize,
    pub skipped: Vec<SkippedItem>,
    /// Root of the published thread, if anything was posted
    pub root: Option<StrongRef>,
}

pub struct Publisher {
    api: Arc<dyn PostingApi>,
    corpus: Arc<dyn Corpus>,
    compressor: Arc<dyn ImageCompressor>,
    extractor: FacetExtractor,
    repo: String,
    langs: Vec<String>,
    max_chunk_len: usize,
    max_image_bytes: usize,
    image_caption: String,
}

impl Publisher {
    pub fn new(
        api: Arc<dyn PostingApi>,
        corpus: Arc<dyn Corpus>,
        compressor: Arc<dyn ImageCompressor>,
        repo: impl Into<String>,
        posting: &PostingConfig,
        image_caption: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            api,
            corpus,
            compressor,
            extractor: FacetExtractor::new(&posting.handle_suffixes)?,
            repo: repo.into(),
            langs: posting.languages.clone(),
            max_chunk_len: posting.max_chunk_len,
            max_image_bytes: posting.max_image_bytes,
            image_caption: image_caption.into(),
        })
    }

    pub fn api(&self) -> &dyn PostingApi {
        self.api.as_ref()
    }

    pub fn corpus(&self) -> &dyn Corpus {
        self.corpus.as_ref()
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn max_chunk_len(&self) -> usize {
        self.max_chunk_len
    }

    /// Build a text draft with facets computed on the exact published text.
    pub async fn text_draft(&self, text: &str) -> Result<PostDraft> {
        let rich = self.extractor.extract(text, self.api.as_ref()).await;
        PostDraft::builder(rich.text)
            .langs(self.langs.iter().cloned())
            .facets(rich.facets)
            .build()
    }

    /// Post `text` as one or more chunks continuing `thread`.
    ///
    /// Stops at the first chunk that fails; chunks already posted stay in
    /// the thread. Returns how many posts were created.
    pub async fn post_text(&self, thread: &mut Thread, text: &str) -> Result<usize> {
        let mut posted = 0;
        for piece in post_chunks(text, self.max_chunk_len) {
            let draft = self.text_draft(&piece).await?;
            let created = thread.publish(self.api.as_ref(), &self.repo, draft).await?;
            info!("Published {}", created.uri);
            posted += 1;
        }
        Ok(posted)
    }

    /// Post an image from `shelf` with `caption`, continuing `thread`.
    ///
    /// Reading, decoding and uploading failures are all
    /// [`CoreError::MediaFailure`]; the thread is left untouched by them.
    pub async fn post_image(
        &self,
        thread: &mut Thread,
        shelf: Shelf,
        name: &str,
        caption: &str,
    ) -> Result<StrongRef> {
        let source = self
            .corpus
            .read(shelf, name)
            .await
            .map_err(|e| CoreError::media_failure(name, e))?;

        let compressor = Arc::clone(&self.compressor);
        let label = name.to_string();
        let max_bytes = self.max_image_bytes;
        let prepared =
            tokio::task::spawn_blocking(move || compressor.prepare(&label, &source, max_bytes))
                .await
                .map_err(|e| CoreError::media_failure(name, e))??;
        debug!(
            "Prepared {}: {} bytes at quality {}",
            name,
            prepared.bytes.len(),
            prepared.quality
        );

        let blob = self
            .api
            .upload_blob(prepared.bytes, prepared.mime_type)
            .await
            .map_err(|e| match e {
                CoreError::MediaFailure { cause, .. } => CoreError::media_failure(name, cause),
                other => other,
            })?;

        let rich = self.extractor.extract(caption, self.api.as_ref()).await;
        let draft = PostDraft::builder(rich.text)
            .langs(self.langs.iter().cloned())
            .facets(rich.facets)
            .image(name, blob)
            .build()?;
        let created = thread.publish(self.api.as_ref(), &self.repo, draft).await?;
        info!("Published image {} as {}", name, created.uri);
        Ok(created)
    }

    /// Publish a work document as a single thread: head, body blocks, closing.
    ///
    /// Recoverable failures skip the affected item and the thread carries on
    /// from the last successful post. Fatal errors abort.
    pub async fn publish_work(&self, document: &WorkDocument) -> Result<WorkReport> {
        let mut thread = Thread::new();
        let mut report = WorkReport {
            title: document.title.clone(),
            posted: 0,
            skipped: Vec::new(),
            root: None,
        };
        info!(
            "Publishing '{}' ({} body blocks)",
            document.title,
            document.body.len()
        );

        let mut items: Vec<(String, Block)> = Vec::new();
        if let Some(head) = &document.head {
            items.push(("head".to_string(), Block::text(head.clone())));
        }
        for (i, block) in document.body.iter().enumerate() {
            items.push((format!("body[{}]", i), block.clone()));
        }
        if let Some(closing) = &document.closing {
            items.push(("closing".to_string(), Block::text(closing.clone())));
        }

        for (label, block) in items {
            let result = match &block {
                Block::Text { content } => self.post_text(&mut thread, content).await,
                Block::Image { reference } => {
                    let caption = self.image_caption.replace("{file}", reference);
                    self.post_image(&mut thread, Shelf::Posts, reference, &caption)
                        .await
                        .map(|_| 1)
                }
            };

            match result {
                Ok(count) => report.posted += count,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("Skipping {} of '{}': {}", label, document.title, e);
                    report.skipped.push(SkippedItem {
                        item: label,
                        reason: e.to_string(),
                    });
                }
            }
        }

        report.root = thread.root().cloned();
        info!(
            "Finished '{}': {} posted, {} skipped",
            report.title,
            report.posted,
            report.skipped.len()
        );
        Ok(report)
    }
}
