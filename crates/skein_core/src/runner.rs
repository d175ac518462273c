//! One invocation of the bot: log in, do the work, report.
//!
//! Both entry points return a [`RunResult`] instead of an error. Fatal
//! failures end the run with `status: error`; recoverable ones have already
//! been logged and skipped further down.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::api::{PostingApi, Session};
use crate::classify::IntentClassifier;
use crate::config::SkeinConfig;
use crate::corpus::{Corpus, random_work};
use crate::dispatch::{DispatchReport, MentionDispatcher};
use crate::error::{ConfigError, CoreError, Result};
use crate::image::ImageCompressor;
use crate::moderation::ModerationEngine;
use crate::publisher::{Publisher, WorkReport};
use crate::state::{StateStore, utc_today};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Error,
}

/// Structured result of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub status: RunStatus,
    pub message: String,
}

impl RunResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Error,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}

impl From<Result<String>> for RunResult {
    fn from(result: Result<String>) -> Self {
        match result {
            Ok(message) => RunResult::success(message),
            Err(e) => {
                error!("Run failed: {}", e);
                RunResult::error(e.to_string())
            }
        }
    }
}

/// Everything a run needs, wired from config.
pub struct Runner {
    config: SkeinConfig,
    api: Arc<dyn PostingApi>,
    corpus: Arc<dyn Corpus>,
    compressor: Arc<dyn ImageCompressor>,
}

impl Runner {
    pub fn new(
        config: SkeinConfig,
        api: Arc<dyn PostingApi>,
        corpus: Arc<dyn Corpus>,
        compressor: Arc<dyn ImageCompressor>,
    ) -> Self {
        Self {
            config,
            api,
            corpus,
            compressor,
        }
    }

    pub fn config(&self) -> &SkeinConfig {
        &self.config
    }

    /// Log in with the configured identifier and app password.
    pub async fn login(&self) -> Result<Session> {
        let account = &self.config.account;
        let missing = |field: &str, hint: &str| CoreError::ConfigurationError {
            config_path: "<config>".to_string(),
            field: field.to_string(),
            expected: hint.to_string(),
            cause: ConfigError::MissingField(field.to_string()),
        };

        let identifier = account.resolve_identifier().ok_or_else(|| {
            missing(
                "account.identifier",
                "a handle or DID, in the config or BLUESKY_HANDLE",
            )
        })?;
        let password = account.resolve_password().ok_or_else(|| {
            missing(
                "account.password_env",
                "the named environment variable to hold the app password",
            )
        })?;

        self.api.login(&identifier, &password).await
    }

    /// Publisher posting into the logged-in account's repo.
    pub fn publisher(&self, session: &Session) -> Result<Publisher> {
        Publisher::new(
            Arc::clone(&self.api),
            Arc::clone(&self.corpus),
            Arc::clone(&self.compressor),
            session.did.clone(),
            &self.config.posting,
            self.config.messages.image_caption.clone(),
        )
    }

    pub fn dispatcher(
        &self,
        session: &Session,
        state: Arc<dyn StateStore>,
    ) -> Result<MentionDispatcher> {
        let config = &self.config;
        Ok(MentionDispatcher::new(
            self.publisher(session)?,
            state,
            ModerationEngine::new(config.moderation_rules()),
            IntentClassifier::new(
                config.intents.clone(),
                config.question_rules(),
                config.messages.cannot_answer.clone(),
            ),
            config.account.resolve_owner_did(),
            config.mentions.clone(),
            config.messages.clone(),
        ))
    }

    /// Publish one random work document as a thread.
    pub async fn post_random_work(&self) -> Result<WorkReport> {
        let session = self.login().await?;
        let document = random_work(self.corpus.as_ref()).await?;
        if document.is_empty() {
            return Err(CoreError::content_missing(format!(
                "posts/ ('{}' is empty)",
                document.title
            )));
        }
        self.publisher(&session)?.publish_work(&document).await
    }

    /// Scheduled thread run.
    pub async fn run_auto_post(&self) -> RunResult {
        let result = self.post_random_work().await.map(|report| {
            info!("Auto post finished: {}", report.title);
            format!(
                "Posted: {} ({} posts, {} skipped)",
                report.title,
                report.posted,
                report.skipped.len()
            )
        });
        RunResult::from(result)
    }

    /// Process the latest notifications once.
    pub async fn process_mentions(&self, state: Arc<dyn StateStore>) -> Result<DispatchReport> {
        let session = self.login().await?;
        self.dispatcher(&session, state)?.run(utc_today()).await
    }

    /// Mention run.
    pub async fn run_mentions(&self, state: Arc<dyn StateStore>) -> RunResult {
        let result = self
            .process_mentions(state)
            .await
            .map(|report| format!("Mentions processed: {}", report.summary()));
        RunResult::from(result)
    }
}
