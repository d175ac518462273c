//! Link and mention detection with byte-offset facets.
//!
//! Facet offsets index the UTF-8 bytes of the exact text that gets
//! published, so normalization happens here and the normalized text is what
//! callers must post.

use std::sync::LazyLock;

use atrium_api::types::string::Did;
use regex::Regex;
use tracing::{debug, warn};

use crate::api::HandleResolver;
use crate::error::{ConfigError, CoreError, Result};
use crate::post::{Facet, link_facet, mention_facet};
use crate::text::segment::chunk;

static URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s)\]}<>"']+"#).expect("valid url regex")
});

static EXOTIC_SPACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("[\u{00A0}\u{2000}-\u{200B}\u{202F}\u{205F}\u{3000}]").expect("valid space regex")
});

/// Replace exotic space characters and the full-width colon with ASCII.
pub fn normalize_spaces(text: &str) -> String {
    EXOTIC_SPACE.replace_all(text, " ").replace('：', ":")
}

/// Every raw URL in `text`, in order of appearance.
pub fn find_urls(text: &str) -> Vec<&str> {
    URL.find_iter(text).map(|m| m.as_str()).collect()
}

/// Move raw URLs to the end of a chunk.
///
/// The URLs are cut out of the prose and re-appended one per line after a
/// blank line, so each is detected once and the link preview anchors on the
/// trailing position. Chunks without URLs come back unchanged.
pub fn trail_links(chunk: &str) -> String {
    let urls = find_urls(chunk);
    if urls.is_empty() {
        return chunk.to_string();
    }
    let prose = URL.replace_all(chunk, "");
    let prose = prose.trim();
    let links = urls.join("\n");
    if prose.is_empty() {
        links
    } else {
        format!("{}\n\n{}", prose, links)
    }
}

/// Chunk `text` for posting, with [`trail_links`] applied to every chunk.
///
/// Moving a link behind a blank line adds characters, so a chunk that no
/// longer fits after the move is chunked again. Only a single line longer
/// than `max_len` can still exceed it, as with [`chunk`].
pub fn post_chunks(text: &str, max_len: usize) -> Vec<String> {
    let mut out = Vec::new();
    for piece in chunk(text, max_len) {
        let shaped = trail_links(&piece);
        if shaped.chars().count() <= max_len {
            out.push(shaped);
        } else {
            out.extend(chunk(&shaped, max_len));
        }
    }
    out
}

/// Post text paired with the facets that annotate it.
#[derive(Debug, Clone, PartialEq)]
pub struct RichText {
    pub text: String,
    pub facets: Vec<Facet>,
}

/// Detects links and `@handle` mentions ending in a known domain suffix.
#[derive(Debug, Clone)]
pub struct FacetExtractor {
    mention: Regex,
}

impl FacetExtractor {
    pub fn new(handle_suffixes: &[String]) -> Result<Self> {
        let invalid = |reason: String| CoreError::ConfigurationError {
            config_path: "<config>".to_string(),
            field: "posting.handle_suffixes".to_string(),
            expected: "one or more domain suffixes such as bsky.social".to_string(),
            cause: ConfigError::InvalidValue {
                field: "posting.handle_suffixes".to_string(),
                reason,
            },
        };

        let suffixes: Vec<String> = handle_suffixes
            .iter()
            .map(|s| s.trim().trim_start_matches('.'))
            .filter(|s| !s.is_empty())
            .map(regex::escape)
            .collect();
        if suffixes.is_empty() {
            return Err(invalid("no suffixes configured".to_string()));
        }

        let pattern = format!(r"@([a-zA-Z0-9_.-]+\.(?:{}))", suffixes.join("|"));
        let mention = Regex::new(&pattern).map_err(|e| invalid(e.to_string()))?;
        Ok(Self { mention })
    }

    /// Normalize `text` and compute its facets.
    ///
    /// Handles that fail to resolve are left as plain text.
    pub async fn extract<R>(&self, text: &str, resolver: &R) -> RichText
    where
        R: HandleResolver + ?Sized,
    {
        let text = normalize_spaces(text);
        let mut facets = Vec::new();

        for m in URL.find_iter(&text) {
            debug!("Link facet {}..{}: {}", m.start(), m.end(), m.as_str());
            facets.push(link_facet(m.start(), m.end(), m.as_str()));
        }
        let link_spans: Vec<(usize, usize)> =
            facets.iter().map(|f| (f.index.byte_start, f.index.byte_end)).collect();

        // Collect first: resolution awaits and must not borrow the regex iterator
        let mentions: Vec<(usize, usize, String)> = self
            .mention
            .captures_iter(&text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let handle = caps.get(1)?;
                Some((whole.start(), whole.end(), handle.as_str().to_string()))
            })
            .filter(|(start, end, _)| {
                !link_spans
                    .iter()
                    .any(|(ls, le)| start < le && ls < end)
            })
            .collect();

        for (start, end, handle) in mentions {
            match resolver.resolve_handle(&handle).await {
                Ok(Some(did)) => match Did::new(did.clone()) {
                    Ok(did) => {
                        debug!("Mention facet {}..{}: @{} -> {}", start, end, handle, did.as_str());
                        facets.push(mention_facet(start, end, did));
                    }
                    Err(e) => warn!("@{} resolved to unusable DID {}: {}", handle, did, e),
                },
                Ok(None) => warn!("Handle @{} not found, leaving it unlinked", handle),
                Err(e) => warn!("Skipping mention facet: {}", e),
            }
        }

        facets.sort_by_key(|f| f.index.byte_start);
        RichText { text, facets }
    }
}
