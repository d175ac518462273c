//! The content corpus: read-only shelves of work documents and reply material.
//!
//! On disk a corpus is a directory with one subdirectory per [`Shelf`]:
//!
//! ```text
//! quotes/
//! ├── posts/            work documents (*.txt) and the images they reference
//! ├── replies/          text reply sources (*.txt)
//! ├── reply_images/     images sent on request
//! └── reply_questions/  answer files named by the question rules
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use tracing::{debug, warn};

use crate::error::{CoreError, Result};
use crate::text::{SECTION_SEPARATOR, WorkDocument, chunk, is_image_reference, segment};

/// A named group of corpus files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shelf {
    Posts,
    Replies,
    ReplyImages,
    ReplyQuestions,
}

impl Shelf {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Shelf::Posts => "posts",
            Shelf::Replies => "replies",
            Shelf::ReplyImages => "reply_images",
            Shelf::ReplyQuestions => "reply_questions",
        }
    }
}

impl std::fmt::Display for Shelf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/", self.dir_name())
    }
}

/// Read access to corpus files.
#[async_trait]
pub trait Corpus: Send + Sync {
    /// File names on a shelf, sorted. A missing shelf is empty.
    async fn list(&self, shelf: Shelf) -> Result<Vec<String>>;

    /// Contents of one file. A missing file is [`CoreError::ContentMissing`].
    async fn read(&self, shelf: Shelf, name: &str) -> Result<Vec<u8>>;

    async fn exists(&self, shelf: Shelf, name: &str) -> bool;
}

/// Corpus backed by a directory tree.
#[derive(Debug, Clone)]
pub struct DirCorpus {
    root: PathBuf,
}

impl DirCorpus {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of `name` on `shelf`, refusing names that leave the shelf.
    fn file_path(&self, shelf: Shelf, name: &str) -> Option<PathBuf> {
        let plain = !name.is_empty()
            && !name.contains(['/', '\\'])
            && name != "."
            && name != "..";
        plain.then(|| self.root.join(shelf.dir_name()).join(name))
    }
}

#[async_trait]
impl Corpus for DirCorpus {
    async fn list(&self, shelf: Shelf) -> Result<Vec<String>> {
        let dir = self.root.join(shelf.dir_name());
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Shelf {} does not exist", dir.display());
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(CoreError::content_missing(format!("{}: {}", dir.display(), e)));
            }
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CoreError::content_missing(format!("{}: {}", dir.display(), e)))?
        {
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn read(&self, shelf: Shelf, name: &str) -> Result<Vec<u8>> {
        let location = format!("{}{}", shelf, name);
        let path = self
            .file_path(shelf, name)
            .ok_or_else(|| CoreError::content_missing(&location))?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| CoreError::content_missing(format!("{} ({})", location, e)))
    }

    async fn exists(&self, shelf: Shelf, name: &str) -> bool {
        match self.file_path(shelf, name) {
            Some(path) => tokio::fs::metadata(&path)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false),
            None => false,
        }
    }
}

fn has_extension(name: &str, ext: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn pick(names: &[String]) -> Option<String> {
    names.choose(&mut rand::rng()).cloned()
}

/// A uniformly random work document from `posts/`.
pub async fn random_work(corpus: &dyn Corpus) -> Result<WorkDocument> {
    let works: Vec<String> = corpus
        .list(Shelf::Posts)
        .await?
        .into_iter()
        .filter(|name| has_extension(name, "txt"))
        .collect();
    debug!("{} work documents available", works.len());

    let name = pick(&works).ok_or_else(|| CoreError::content_missing(Shelf::Posts.to_string()))?;
    let raw = corpus.read(Shelf::Posts, &name).await?;
    let title = Path::new(&name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(&name)
        .to_string();

    debug!("Selected work {}", name);
    Ok(WorkDocument::parse(title, &String::from_utf8_lossy(&raw)))
}

/// One random chunk from the body of a random `replies/` file.
///
/// Files without a section separator are used whole.
pub async fn random_reply_chunk(corpus: &dyn Corpus, max_len: usize) -> Result<Option<String>> {
    let sources: Vec<String> = corpus
        .list(Shelf::Replies)
        .await?
        .into_iter()
        .filter(|name| has_extension(name, "txt"))
        .collect();
    let Some(name) = pick(&sources) else {
        warn!("No text reply sources in {}", Shelf::Replies);
        return Ok(None);
    };

    let raw = String::from_utf8_lossy(&corpus.read(Shelf::Replies, &name).await?).into_owned();
    let body = if raw.contains(SECTION_SEPARATOR) {
        segment(&raw).body
    } else {
        raw
    };

    let chunks = chunk(&body, max_len);
    if chunks.is_empty() {
        warn!("Reply source {} has no usable text", name);
    }
    Ok(pick(&chunks))
}

/// Name of a random image on `reply_images/`.
pub async fn random_reply_image(corpus: &dyn Corpus) -> Result<Option<String>> {
    let images: Vec<String> = corpus
        .list(Shelf::ReplyImages)
        .await?
        .into_iter()
        .filter(|name| is_image_reference(name))
        .collect();
    Ok(pick(&images))
}
