//! Work documents: section splitting, block scanning and chunking.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

/// Section separator inside a work document.
pub const SECTION_SEPARATOR: &str = "---";

/// Default post length limit, in characters.
pub const DEFAULT_MAX_CHUNK_LEN: usize = 300;

static IMAGE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^.*\.(jpg|jpeg|png|gif|webp)$").expect("valid image line regex")
});

/// Whether a (trimmed) line names an image file.
pub fn is_image_reference(line: &str) -> bool {
    IMAGE_LINE.is_match(line)
}

/// One ordered piece of a document body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Text { content: String },
    Image { reference: String },
}

impl Block {
    pub fn text(content: impl Into<String>) -> Self {
        Block::Text {
            content: content.into(),
        }
    }

    pub fn image(reference: impl Into<String>) -> Self {
        Block::Image {
            reference: reference.into(),
        }
    }
}

/// Raw document text split at the section separator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sections {
    pub head: String,
    pub body: String,
    pub closing: String,
}

/// Split raw text into head, body and closing.
///
/// At most two separators are honoured; anything after the second stays in
/// the closing section. Missing sections are empty. All sections are trimmed.
pub fn segment(raw: &str) -> Sections {
    let mut parts = raw.splitn(3, SECTION_SEPARATOR).map(str::trim);
    Sections {
        head: parts.next().unwrap_or_default().to_string(),
        body: parts.next().unwrap_or_default().to_string(),
        closing: parts.next().unwrap_or_default().to_string(),
    }
}

/// Scan body text into text and image blocks.
///
/// Blank lines are dropped. Each image line flushes the pending text (if
/// any) and becomes its own block.
pub fn blockify(body: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut buffer = String::new();

    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if is_image_reference(line) {
            flush_text(&mut buffer, &mut blocks);
            blocks.push(Block::image(line));
        } else {
            buffer.push_str(line);
            buffer.push('\n');
        }
    }
    flush_text(&mut buffer, &mut blocks);

    debug!("Body scanned into {} blocks", blocks.len());
    blocks
}

fn flush_text(buffer: &mut String, blocks: &mut Vec<Block>) {
    let content = buffer.trim();
    if !content.is_empty() {
        blocks.push(Block::text(content));
    }
    buffer.clear();
}

/// Greedily pack whole lines into chunks of at most `max_len` characters.
///
/// Length counts each line plus its newline. A single line longer than
/// `max_len` becomes its own oversized chunk rather than being cut.
pub fn chunk(text: &str, max_len: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.lines() {
        let line_len = line.chars().count() + 1;
        if current_len + line_len > max_len && !current.trim().is_empty() {
            chunks.push(current.trim().to_string());
            current.clear();
            current_len = 0;
        }
        current.push_str(line);
        current.push('\n');
        current_len += line_len;
    }

    let last = current.trim();
    if !last.is_empty() {
        chunks.push(last.to_string());
    }
    chunks
}

/// A named source document: optional head and closing posts around a body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkDocument {
    pub title: String,
    pub head: Option<String>,
    pub body: Vec<Block>,
    pub closing: Option<String>,
}

impl WorkDocument {
    pub fn parse(title: impl Into<String>, raw: &str) -> Self {
        let sections = segment(raw);
        let non_empty = |s: String| if s.is_empty() { None } else { Some(s) };
        Self {
            title: title.into(),
            head: non_empty(sections.head),
            body: blockify(&sections.body),
            closing: non_empty(sections.closing),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none() && self.body.is_empty() && self.closing.is_none()
    }
}
