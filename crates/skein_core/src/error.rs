use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use skein_db::DbError;
use thiserror::Error;

/// Configuration-specific errors
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for field {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Error, Diagnostic, Debug)]
pub enum CoreError {
    #[error("Login rejected for {identifier}: {cause}")]
    #[diagnostic(
        code(skein_core::auth_failure),
        help("Check the account identifier and that the app password environment variable is set")
    )]
    AuthFailure { identifier: String, cause: String },

    #[error("Post could not be published: {cause}")]
    #[diagnostic(
        code(skein_core::publish_failure),
        help("The post was skipped; the thread cursor is unchanged and can be retried")
    )]
    PublishFailure { cause: String },

    #[error("Media '{reference}' could not be prepared or uploaded: {cause}")]
    #[diagnostic(code(skein_core::media_failure))]
    MediaFailure { reference: String, cause: String },

    #[error("Handle '{handle}' could not be resolved: {cause}")]
    #[diagnostic(code(skein_core::resolve_failure))]
    ResolveFailure { handle: String, cause: String },

    #[error("No content available in {location}")]
    #[diagnostic(
        code(skein_core::content_missing),
        help("Add files to the corpus directory or check the corpus root in the config")
    )]
    ContentMissing { location: String },

    #[error("Notifications could not be listed: {cause}")]
    #[diagnostic(code(skein_core::notifications_unavailable))]
    NotificationsUnavailable { cause: String },

    #[error("Invalid post draft: {reason}")]
    #[diagnostic(code(skein_core::invalid_draft))]
    InvalidDraft { reason: String },

    #[error("State store error")]
    #[diagnostic(
        code(skein_core::state_store),
        help("Make sure only one skein run uses this state database at a time")
    )]
    StateStore(#[from] DbError),

    #[error("Configuration error for field '{field}'")]
    #[diagnostic(
        code(skein_core::configuration_error),
        help("Check configuration file at {config_path}\nExpected: {expected}")
    )]
    ConfigurationError {
        config_path: String,
        field: String,
        expected: String,
        #[source]
        cause: ConfigError,
    },

    #[error("Serialization error")]
    #[diagnostic(
        code(skein_core::serialization_error),
        help("Failed to serialize/deserialize {data_type}")
    )]
    SerializationError {
        data_type: String,
        #[source]
        cause: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Whether this error must abort the whole invocation.
    ///
    /// Failures scoped to one post, image or facet are recoverable; failures
    /// establishing the session, reading state or loading config are not.
    pub fn is_fatal(&self) -> bool {
        match self {
            CoreError::PublishFailure { .. }
            | CoreError::MediaFailure { .. }
            | CoreError::ResolveFailure { .. }
            | CoreError::InvalidDraft { .. } => false,
            CoreError::AuthFailure { .. }
            | CoreError::ContentMissing { .. }
            | CoreError::NotificationsUnavailable { .. }
            | CoreError::StateStore(_)
            | CoreError::ConfigurationError { .. }
            | CoreError::SerializationError { .. } => true,
        }
    }

    pub fn publish_failure(cause: impl std::fmt::Display) -> Self {
        Self::PublishFailure {
            cause: cause.to_string(),
        }
    }

    pub fn media_failure(reference: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::MediaFailure {
            reference: reference.into(),
            cause: cause.to_string(),
        }
    }

    pub fn content_missing(location: impl Into<String>) -> Self {
        Self::ContentMissing {
            location: location.into(),
        }
    }

    pub fn invalid_draft(reason: impl Into<String>) -> Self {
        Self::InvalidDraft {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_split() {
        assert!(
            CoreError::AuthFailure {
                identifier: "bot.bsky.social".into(),
                cause: "401".into(),
            }
            .is_fatal()
        );
        assert!(CoreError::content_missing("posts/").is_fatal());
        assert!(!CoreError::publish_failure("timeout").is_fatal());
        assert!(!CoreError::media_failure("a.png", "decode").is_fatal());
        assert!(
            !CoreError::ResolveFailure {
                handle: "x.bsky.social".into(),
                cause: "404".into(),
            }
            .is_fatal()
        );
    }

    #[test]
    fn test_error_display() {
        let err = CoreError::media_failure("cat.png", "upload rejected");
        assert_eq!(
            err.to_string(),
            "Media 'cat.png' could not be prepared or uploaded: upload rejected"
        );
    }
}
