//! Skein core
//!
//! Threaded posting and mention handling for a Bluesky bot.
//!
//! The pieces, leaves first:
//!
//! - [`text`]: document sections, blocks, chunks, link/mention facets
//! - [`image`]: JPEG normalization for embeds
//! - [`moderation`] and [`classify`]: what to refuse and what was asked for
//! - [`state`]: durable processed/ignored/per-day records
//! - [`thread`]: root/parent cursor for reply chains
//! - [`publisher`] and [`dispatch`]: scheduled threads and mention replies
//! - [`runner`]: login plus a single run, reported as a [`runner::RunResult`]

pub mod api;
pub mod bsky;
pub mod classify;
pub mod config;
pub mod corpus;
pub mod dispatch;
pub mod error;
pub mod image;
pub mod moderation;
pub mod post;
pub mod publisher;
pub mod runner;
pub mod state;
pub mod text;
pub mod thread;

pub use error::{CoreError, Result};

pub use api::{HandleResolver, Notification, PostingApi, Session};
pub use config::SkeinConfig;
pub use corpus::{Corpus, DirCorpus, Shelf};
pub use dispatch::{DispatchReport, MentionDispatcher, Outcome};
pub use image::{ImageCompressor, JpegCompressor};
pub use publisher::{Publisher, WorkReport};
pub use runner::{RunResult, RunStatus, Runner};
pub use state::StateStore;
pub use thread::Thread;
pub use bsky::BskyClient;
