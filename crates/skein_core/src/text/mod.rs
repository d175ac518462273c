//! Turning source text into postable pieces.
//!
//! - [`segment`] splits work documents into sections, blocks and chunks
//! - [`facets`] finds links and mentions and computes their byte ranges

pub mod facets;
pub mod segment;

pub use facets::{
    FacetExtractor, RichText, find_urls, normalize_spaces, post_chunks, trail_links,
};
pub use segment::{
    Block, DEFAULT_MAX_CHUNK_LEN, SECTION_SEPARATOR, Sections, WorkDocument, blockify, chunk,
    is_image_reference, segment,
};
