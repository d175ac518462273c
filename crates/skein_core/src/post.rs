//! Post drafts built on the `app.bsky` lexicon types.
//!
//! Strong refs, reply refs, facets, blobs and image embeds are the
//! `atrium-api` types themselves. A [`PostDraft`] is only obtainable through
//! [`PostBuilder::build`], which checks the fields each kind of post needs
//! before [`PostDraft::to_record`] turns it into an `app.bsky.feed.post`
//! record.

use std::str::FromStr;

use atrium_api::app::bsky::embed::images;
use atrium_api::app::bsky::feed::post;
use atrium_api::app::bsky::richtext::facet;
use atrium_api::com::atproto::repo::strong_ref;
use atrium_api::types::Union;
use atrium_api::types::string::{Cid, Datetime, Did, Language};
use chrono::{SecondsFormat, Utc};

use crate::error::{CoreError, Result};

pub use atrium_api::types::BlobRef;

/// `{cid, uri}` of one published record.
pub type StrongRef = strong_ref::Main;
/// Root and parent of a reply.
pub type ReplyRef = post::ReplyRef;
/// Link or mention annotation over post text.
pub type Facet = facet::Main;
/// Image embed attached to a post.
pub type ImagesEmbed = images::Main;

/// Most images a single post may embed.
pub const MAX_EMBED_IMAGES: usize = 4;

/// Build a strong ref from its string parts.
pub fn strong_ref(cid: &str, uri: impl Into<String>) -> Result<StrongRef> {
    let cid = Cid::from_str(cid)
        .map_err(|e| CoreError::invalid_draft(format!("bad cid '{}': {}", cid, e)))?;
    Ok(strong_ref::MainData {
        cid,
        uri: uri.into(),
    }
    .into())
}

/// Canonical string form of a record's CID.
pub fn cid_string(record: &StrongRef) -> String {
    record.cid.as_ref().to_string()
}

pub fn reply_ref(root: StrongRef, parent: StrongRef) -> ReplyRef {
    post::ReplyRefData { parent, root }.into()
}

fn byte_slice(byte_start: usize, byte_end: usize) -> facet::ByteSlice {
    facet::ByteSliceData {
        byte_end,
        byte_start,
    }
    .into()
}

pub fn link_facet(byte_start: usize, byte_end: usize, uri: impl Into<String>) -> Facet {
    let link = facet::LinkData { uri: uri.into() };
    facet::MainData {
        features: vec![Union::Refs(facet::MainFeaturesItem::Link(Box::new(
            link.into(),
        )))],
        index: byte_slice(byte_start, byte_end),
    }
    .into()
}

pub fn mention_facet(byte_start: usize, byte_end: usize, did: Did) -> Facet {
    let mention = facet::MentionData { did };
    facet::MainData {
        features: vec![Union::Refs(facet::MainFeaturesItem::Mention(Box::new(
            mention.into(),
        )))],
        index: byte_slice(byte_start, byte_end),
    }
    .into()
}

/// A validated post ready to publish.
///
/// `reply` is left empty by builders; [`crate::thread::Thread`] fills it in.
#[derive(Debug, Clone, PartialEq)]
pub struct PostDraft {
    pub text: String,
    /// RFC 3339, second precision, `Z` suffix
    pub created_at: String,
    pub langs: Vec<String>,
    pub facets: Vec<Facet>,
    pub reply: Option<ReplyRef>,
    pub embed: Option<ImagesEmbed>,
}

impl PostDraft {
    /// Start a plain text post.
    pub fn builder(text: impl Into<String>) -> PostBuilder {
        PostBuilder::new(text)
    }

    pub fn with_reply(mut self, reply: ReplyRef) -> Self {
        self.reply = Some(reply);
        self
    }

    /// The `app.bsky.feed.post` record for `createRecord`.
    pub fn to_record(&self) -> Result<post::Record> {
        let created_at = Datetime::from_str(&self.created_at).map_err(|e| {
            CoreError::invalid_draft(format!("created_at '{}': {}", self.created_at, e))
        })?;
        let langs = self
            .langs
            .iter()
            .map(|l| {
                Language::new(l.clone())
                    .map_err(|e| CoreError::invalid_draft(format!("language '{}': {}", l, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(post::RecordData {
            created_at,
            embed: self.embed.clone().map(|images| {
                Union::Refs(post::RecordEmbedRefs::AppBskyEmbedImagesMain(Box::new(images)))
            }),
            entities: None,
            facets: (!self.facets.is_empty()).then(|| self.facets.clone()),
            labels: None,
            langs: (!langs.is_empty()).then_some(langs),
            reply: self.reply.clone(),
            tags: None,
            text: self.text.clone(),
        }
        .into())
    }
}

/// Kind of post a builder will produce, derived from what was set on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostKind {
    Plain,
    Reply,
    ImageEmbed,
}

/// Builder for [`PostDraft`].
#[derive(Debug, Clone)]
pub struct PostBuilder {
    text: String,
    langs: Vec<String>,
    facets: Vec<Facet>,
    reply: Option<ReplyRef>,
    images: Vec<images::Image>,
}

impl PostBuilder {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            langs: Vec::new(),
            facets: Vec::new(),
            reply: None,
            images: Vec::new(),
        }
    }

    pub fn langs(mut self, langs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.langs = langs.into_iter().map(Into::into).collect();
        self
    }

    pub fn facets(mut self, facets: Vec<Facet>) -> Self {
        self.facets = facets;
        self
    }

    pub fn reply_to(mut self, reply: ReplyRef) -> Self {
        self.reply = Some(reply);
        self
    }

    pub fn image(mut self, alt: impl Into<String>, blob: BlobRef) -> Self {
        self.images.push(
            images::ImageData {
                alt: alt.into(),
                aspect_ratio: None,
                image: blob,
            }
            .into(),
        );
        self
    }

    pub fn kind(&self) -> PostKind {
        if !self.images.is_empty() {
            PostKind::ImageEmbed
        } else if self.reply.is_some() {
            PostKind::Reply
        } else {
            PostKind::Plain
        }
    }

    pub fn build(self) -> Result<PostDraft> {
        if self.langs.iter().any(|l| l.trim().is_empty()) {
            return Err(CoreError::invalid_draft("language tags must not be blank"));
        }

        match self.kind() {
            PostKind::Plain | PostKind::Reply => {
                if self.text.trim().is_empty() {
                    return Err(CoreError::invalid_draft("text post without text"));
                }
            }
            PostKind::ImageEmbed => {
                if self.images.len() > MAX_EMBED_IMAGES {
                    return Err(CoreError::invalid_draft(format!(
                        "{} images, at most {} allowed",
                        self.images.len(),
                        MAX_EMBED_IMAGES
                    )));
                }
            }
        }

        let text_len = self.text.len();
        for facet in &self.facets {
            let (byte_start, byte_end) = (facet.index.byte_start, facet.index.byte_end);
            if byte_start >= byte_end
                || byte_end > text_len
                || !self.text.is_char_boundary(byte_start)
                || !self.text.is_char_boundary(byte_end)
            {
                return Err(CoreError::invalid_draft(format!(
                    "facet {}..{} does not fit text of {} bytes",
                    byte_start, byte_end, text_len
                )));
            }
        }

        let embed = if self.images.is_empty() {
            None
        } else {
            Some(
                images::MainData {
                    images: self.images,
                }
                .into(),
            )
        };

        Ok(PostDraft {
            text: self.text,
            created_at: now_timestamp(),
            langs: self.langs,
            facets: self.facets,
            reply: self.reply,
            embed,
        })
    }
}

/// Current UTC time, second precision, `Z` suffix.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
