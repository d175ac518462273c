//! Mention ingestion.
//!
//! Each notification runs through the same ordered filters before anything
//! is published:
//!
//! 1. not a mention: skipped
//! 2. already processed: skipped
//! 3. same text from the same actor today: marked processed
//! 4. ignored actor: marked processed
//! 5. moderation hit: rejection posted, actor ignored, marked processed
//! 6. owner unblacklist directive: target released, confirmation posted,
//!    then processing continues
//! 7. over the daily mention limit: actor ignored, marked processed
//! 8. classified and answered, then marked processed
//!
//! A reply that cannot be published leaves the notification unprocessed so
//! the next run retries it.

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use chrono::{Days, NaiveDate};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::Notification;
use crate::classify::{Intent, IntentClassifier};
use crate::config::{MentionConfig, MessageConfig};
use crate::corpus::{Shelf, random_reply_chunk, random_reply_image};
use crate::error::{CoreError, Result};
use crate::moderation::ModerationEngine;
use crate::publisher::Publisher;
use crate::state::StateStore;
use crate::thread::Thread;

/// Audit target for moderation and accepted-mention events.
pub const AUDIT_TARGET: &str = "skein::audit";

static TARGET_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([a-zA-Z0-9_.:-]+)").expect("valid target regex"));

/// How one notification was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    NotMention,
    AlreadyProcessed,
    DuplicateText,
    Ignored,
    Moderated,
    OverQuota,
    Replied,
    /// Classified, but nothing to say
    NoReply,
    /// Reply failed; left for the next run
    Deferred,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::NotMention => "not_mention",
            Outcome::AlreadyProcessed => "already_processed",
            Outcome::DuplicateText => "duplicate_text",
            Outcome::Ignored => "ignored",
            Outcome::Moderated => "moderated",
            Outcome::OverQuota => "over_quota",
            Outcome::Replied => "replied",
            Outcome::NoReply => "no_reply",
            Outcome::Deferred => "deferred",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-notification outcomes of one run, in processing order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    pub outcomes: Vec<(String, Outcome)>,
    /// Day-scoped rows removed by retention before processing
    pub pruned: u64,
}

impl DispatchReport {
    pub fn count(&self, outcome: Outcome) -> usize {
        self.outcomes.iter().filter(|(_, o)| *o == outcome).count()
    }

    pub fn counts(&self) -> BTreeMap<Outcome, usize> {
        let mut counts = BTreeMap::new();
        for (_, outcome) in &self.outcomes {
            *counts.entry(*outcome).or_insert(0) += 1;
        }
        counts
    }

    /// `replied=2, ignored=1` style summary.
    pub fn summary(&self) -> String {
        let counts = self.counts();
        if counts.is_empty() {
            return "no notifications".to_string();
        }
        counts
            .iter()
            .map(|(outcome, n)| format!("{}={}", outcome, n))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// What a classified mention gets back.
enum Reply {
    Text(String),
    Image(String),
    Nothing,
}

pub struct MentionDispatcher {
    publisher: Publisher,
    state: Arc<dyn StateStore>,
    moderation: ModerationEngine,
    classifier: IntentClassifier,
    owner_did: Option<String>,
    limits: MentionConfig,
    messages: MessageConfig,
}

impl MentionDispatcher {
    pub fn new(
        publisher: Publisher,
        state: Arc<dyn StateStore>,
        moderation: ModerationEngine,
        classifier: IntentClassifier,
        owner_did: Option<String>,
        limits: MentionConfig,
        messages: MessageConfig,
    ) -> Self {
        Self {
            publisher,
            state,
            moderation,
            classifier,
            owner_did,
            limits,
            messages,
        }
    }

    /// Fetch notifications and process each one.
    ///
    /// Old day-scoped state is pruned first. Fatal errors abort the run;
    /// anything else is logged and the next notification is handled.
    pub async fn run(&self, today: NaiveDate) -> Result<DispatchReport> {
        let mut report = DispatchReport::default();

        if let Some(cutoff) = today.checked_sub_days(Days::new(self.limits.retention_days.into())) {
            report.pruned = self.state.prune_before(cutoff).await?;
            if report.pruned > 0 {
                info!("Pruned {} day-scoped records before {}", report.pruned, cutoff);
            }
        }

        let notifications = self
            .publisher
            .api()
            .list_notifications(self.limits.notification_limit)
            .await?;
        info!("Processing {} notifications", notifications.len());

        for notification in &notifications {
            match self.process(notification, today).await {
                Ok(outcome) => {
                    debug!("{}: {}", notification.cid, outcome);
                    report.outcomes.push((notification.cid.clone(), outcome));
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("Notification {} left for retry: {}", notification.cid, e);
                    report
                        .outcomes
                        .push((notification.cid.clone(), Outcome::Deferred));
                }
            }
        }

        Ok(report)
    }

    /// Handle a single notification.
    pub async fn process(&self, notification: &Notification, today: NaiveDate) -> Result<Outcome> {
        if !notification.is_mention() {
            return Ok(Outcome::NotMention);
        }

        let cid = notification.cid.as_str();
        let author = notification.author_did.as_str();
        let text = notification.text.as_str();

        if self.state.is_processed(cid).await? {
            debug!("Already processed {}", cid);
            return Ok(Outcome::AlreadyProcessed);
        }

        if self.state.is_duplicate_text(author, today, text).await? {
            info!("Repeated mention text from {}, ignoring", author);
            self.state.mark_processed(cid).await?;
            return Ok(Outcome::DuplicateText);
        }

        if self.state.is_ignored(author).await? {
            info!("Ignored actor {}", author);
            self.state.mark_processed(cid).await?;
            return Ok(Outcome::Ignored);
        }

        if let Some(hit) = self.moderation.check(text) {
            info!(
                target: AUDIT_TARGET,
                cid,
                author,
                category = %hit.category,
                keyword = %hit.keyword,
                reply = %hit.message,
                text,
                "moderation hit"
            );
            let mut thread = Thread::reply_to(notification);
            if let Err(e) = self.publisher.post_text(&mut thread, &hit.message).await {
                return self.defer(notification, today, false, e).await;
            }
            // listed only after the rejection went out, or the retry would be dropped as ignored
            self.state.add_ignored(&[author.to_string()]).await?;
            self.state.mark_processed(cid).await?;
            return Ok(Outcome::Moderated);
        }

        if self.is_owner(author) && text.contains(&self.limits.unblacklist_directive) {
            self.release_target(text).await?;
        }

        let count = self.state.increment_mention_count(author, today).await?;
        if count > self.limits.daily_limit {
            info!(
                "{} mentioned {} times today (limit {}), ignoring",
                author, count, self.limits.daily_limit
            );
            self.state.add_ignored(&[author.to_string()]).await?;
            self.state.mark_processed(cid).await?;
            return Ok(Outcome::OverQuota);
        }

        info!(target: AUDIT_TARGET, cid, author, text, "mention accepted");

        let intent = self.classifier.classify(text);
        debug!("Mention {} classified as {:?}", cid, intent);

        let reply = self.choose_reply(intent, text).await;
        let mut thread = Thread::reply_to(notification);
        let published = match reply {
            Reply::Nothing => {
                self.state.mark_processed(cid).await?;
                return Ok(Outcome::NoReply);
            }
            Reply::Text(body) => self.publisher.post_text(&mut thread, &body).await.map(|_| ()),
            Reply::Image(name) => self.post_image_reply(&mut thread, &name).await,
        };

        if let Err(e) = published {
            return self.defer(notification, today, true, e).await;
        }
        self.state.mark_processed(cid).await?;
        Ok(Outcome::Replied)
    }

    fn is_owner(&self, did: &str) -> bool {
        self.owner_did.as_deref() == Some(did)
    }

    /// Remove the target of an unblacklist directive and confirm it.
    async fn release_target(&self, text: &str) -> Result<()> {
        let Some(token) = unblacklist_target(text) else {
            warn!("Unblacklist directive without a target");
            return Ok(());
        };

        let target = if token.starts_with("did:") {
            token.to_string()
        } else {
            match self.publisher.api().resolve_handle(token).await {
                Ok(Some(did)) => did,
                Ok(None) => token.to_string(),
                Err(e) => {
                    warn!("Could not resolve {}: {}", token, e);
                    token.to_string()
                }
            }
        };

        let removed = self.state.remove_ignored(&target).await?;
        info!("Unblacklisted {} (was listed: {})", target, removed);

        // Confirmation is a standalone post, not a reply
        let confirmation = self.messages.unblacklisted.replace("{target}", token);
        let mut thread = Thread::new();
        if let Err(e) = self.publisher.post_text(&mut thread, &confirmation).await {
            if e.is_fatal() {
                return Err(e);
            }
            warn!("Unblacklist confirmation not posted: {}", e);
        }
        Ok(())
    }

    async fn choose_reply(&self, intent: Intent, text: &str) -> Reply {
        let corpus = self.publisher.corpus();
        match intent {
            Intent::None => Reply::Nothing,
            Intent::Ambiguous => Reply::Text(self.messages.ambiguous.clone()),
            Intent::ReplyText => {
                match random_reply_chunk(corpus, self.publisher.max_chunk_len()).await {
                    Ok(Some(chunk)) => Reply::Text(chunk),
                    Ok(None) => Reply::Text(self.messages.text_unavailable.clone()),
                    Err(e) => {
                        warn!("Text reply unavailable: {}", e);
                        Reply::Text(self.messages.text_unavailable.clone())
                    }
                }
            }
            Intent::ReplyImage => match random_reply_image(corpus).await {
                Ok(Some(name)) => Reply::Image(name),
                Ok(None) => Reply::Text(self.messages.image_unavailable.clone()),
                Err(e) => {
                    warn!("Image reply unavailable: {}", e);
                    Reply::Text(self.messages.image_unavailable.clone())
                }
            },
            Intent::ReplyQuestion => match self.classifier.find_answer(text, corpus).await {
                Some(answer) => Reply::Text(answer),
                None => Reply::Nothing,
            },
        }
    }

    /// Post a reply image, falling back to a text notice on media failure.
    async fn post_image_reply(&self, thread: &mut Thread, name: &str) -> Result<()> {
        let caption = self.messages.image_reply.as_str();
        match self
            .publisher
            .post_image(thread, Shelf::ReplyImages, name, caption)
            .await
        {
            Ok(_) => Ok(()),
            Err(e @ CoreError::MediaFailure { .. }) => {
                warn!("Image reply failed, sending notice instead: {}", e);
                self.publisher
                    .post_text(thread, &self.messages.image_unavailable)
                    .await
                    .map(|_| ())
            }
            Err(e) => Err(e),
        }
    }

    /// Leave a notification for the next run after a failed reply.
    ///
    /// Whatever this attempt recorded for the day is rolled back, so the
    /// retry is neither a repeated text nor another mention against the
    /// quota. `counted` says whether the mention counter was incremented.
    async fn defer(
        &self,
        notification: &Notification,
        today: NaiveDate,
        counted: bool,
        error: CoreError,
    ) -> Result<Outcome> {
        if error.is_fatal() {
            return Err(error);
        }
        warn!("Reply to {} not published: {}", notification.cid, error);
        let author = notification.author_did.as_str();
        self.state
            .forget_text(author, today, &notification.text)
            .await?;
        if counted {
            self.state.decrement_mention_count(author, today).await?;
        }
        Ok(Outcome::Deferred)
    }
}

/// Actor named by an unblacklist directive.
///
/// The directive is addressed to the bot, so the bot's own handle usually
/// comes first; an explicit DID wins, otherwise the last `@token` is used.
pub fn unblacklist_target(text: &str) -> Option<&str> {
    let tokens: Vec<&str> = TARGET_TOKEN
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim_end_matches('.'))
        .filter(|t| !t.is_empty())
        .collect();
    tokens
        .iter()
        .find(|t| t.starts_with("did:"))
        .or_else(|| tokens.last())
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unblacklist_target_prefers_did() {
        assert_eq!(
            unblacklist_target("@bot.bsky.social 블랙리스트 해제 @did:plc:abc123"),
            Some("did:plc:abc123")
        );
        assert_eq!(
            unblacklist_target("@did:plc:xyz 블랙리스트 해제 @bot.bsky.social"),
            Some("did:plc:xyz")
        );
    }

    #[test]
    fn test_unblacklist_target_falls_back_to_last_token() {
        assert_eq!(
            unblacklist_target("@bot.bsky.social 블랙리스트 해제 @fan.bsky.social."),
            Some("fan.bsky.social")
        );
        assert_eq!(unblacklist_target("블랙리스트 해제"), None);
    }

    #[test]
    fn test_report_summary() {
        let report = DispatchReport {
            outcomes: vec![
                ("a".to_string(), Outcome::Replied),
                ("b".to_string(), Outcome::Ignored),
                ("c".to_string(), Outcome::Replied),
            ],
            pruned: 0,
        };
        assert_eq!(report.count(Outcome::Replied), 2);
        assert_eq!(report.summary(), "ignored=1, replied=2");
        assert_eq!(DispatchReport::default().summary(), "no notifications");
    }
}
