//! Configuration for a skein bot.
//!
//! Everything has a default matching the bot's stock behaviour, so an empty
//! TOML file is a valid config. Secrets are never read from the file: the app
//! password comes from the environment variable named in `account.password_env`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, CoreError, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SkeinConfig {
    pub account: AccountConfig,
    pub corpus: CorpusConfig,
    pub posting: PostingConfig,
    pub mentions: MentionConfig,
    pub state: StateConfig,
    pub intents: IntentConfig,
    pub messages: MessageConfig,
    /// Moderation rules, checked in declaration order.
    pub moderation: Vec<ModerationRuleConfig>,
    /// Question-answer rules, checked in declaration order.
    pub questions: Vec<QuestionRuleConfig>,
}

/// Bot identity and session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// PDS base URL
    pub service: String,
    /// Handle or DID to log in with (falls back to `BLUESKY_HANDLE`)
    pub identifier: Option<String>,
    /// Environment variable holding the app password
    pub password_env: String,
    /// DID allowed to issue owner commands (falls back to `BLUESKY_DID`)
    pub owner_did: Option<String>,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            service: "https://bsky.social".to_string(),
            identifier: None,
            password_env: "BLUESKY_APP_PASSWORD".to_string(),
            owner_did: None,
        }
    }
}

impl AccountConfig {
    /// Identifier from config, else from `BLUESKY_HANDLE`.
    pub fn resolve_identifier(&self) -> Option<String> {
        self.identifier
            .clone()
            .or_else(|| std::env::var("BLUESKY_HANDLE").ok())
            .filter(|s| !s.trim().is_empty())
    }

    /// App password from the configured environment variable.
    pub fn resolve_password(&self) -> Option<String> {
        std::env::var(&self.password_env)
            .ok()
            .filter(|s| !s.is_empty())
    }

    /// Owner DID from config, else from `BLUESKY_DID`.
    pub fn resolve_owner_did(&self) -> Option<String> {
        self.owner_did
            .clone()
            .or_else(|| std::env::var("BLUESKY_DID").ok())
            .filter(|s| !s.trim().is_empty())
    }
}

/// Where the content corpus lives
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// Root directory holding `posts/`, `replies/`, `reply_images/`, `reply_questions/`
    pub root: PathBuf,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("quotes"),
        }
    }
}

/// Post shaping limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PostingConfig {
    /// Language tags attached to every post
    pub languages: Vec<String>,
    /// Maximum characters per chunk
    pub max_chunk_len: usize,
    /// Byte budget for an uploaded image
    pub max_image_bytes: usize,
    /// Domain suffixes recognised in `@handle` mentions
    pub handle_suffixes: Vec<String>,
}

impl Default for PostingConfig {
    fn default() -> Self {
        Self {
            languages: vec!["ko".to_string()],
            max_chunk_len: crate::text::DEFAULT_MAX_CHUNK_LEN,
            max_image_bytes: crate::image::DEFAULT_MAX_IMAGE_BYTES,
            handle_suffixes: vec!["bsky.social".to_string()],
        }
    }
}

/// Mention handling limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MentionConfig {
    /// Notifications fetched per run
    pub notification_limit: u32,
    /// Mentions allowed per actor per UTC day before auto-ignore
    pub daily_limit: u32,
    /// Days of counters and seen texts to keep
    pub retention_days: u32,
    /// Owner directive that removes an actor from the ignore list
    pub unblacklist_directive: String,
}

impl Default for MentionConfig {
    fn default() -> Self {
        Self {
            notification_limit: 50,
            daily_limit: 10,
            retention_days: 7,
            unblacklist_directive: "블랙리스트 해제".to_string(),
        }
    }
}

/// State database location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("skein")
                .join("state.db"),
        }
    }
}

/// Keyword sets used to classify mention intent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentConfig {
    pub image: Vec<String>,
    pub text: Vec<String>,
    pub question: Vec<String>,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            image: strings(&["이미지", "그림", "사진"]),
            text: strings(&["스크립트", "ss", "텍스트"]),
            question: strings(&[
                "질문",
                "궁금",
                "알려줘",
                "알려",
                "뭐야",
                "무엇",
                "뭐지",
                "말해줘",
                "말해봐",
                "말해",
                "소개해줘",
                "소개",
                "얘기해줘",
                "얘기해",
                "이야기해줘",
                "이야기해",
            ]),
        }
    }
}

/// Fixed reply texts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageConfig {
    pub image_caption: String,
    pub image_reply: String,
    pub text_unavailable: String,
    pub image_unavailable: String,
    pub ambiguous: String,
    /// `{target}` is replaced with the released actor
    pub unblacklisted: String,
    pub cannot_answer: String,
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            image_caption: "📷 이미지: {file}".to_string(),
            image_reply: "📷 요청하신 이미지를 첨부합니다.".to_string(),
            text_unavailable: "⚠️ 텍스트 응답이 현재 준비되어 있지 않습니다. 나중에 다시 시도해주세요."
                .to_string(),
            image_unavailable: "⚠️ 이미지 응답이 현재 준비되어 있지 않습니다. 나중에 다시 시도해주세요."
                .to_string(),
            ambiguous: "⚠️ 텍스트와 이미지 요청이 동시에 감지되었습니다. 한 번에 하나씩 요청해주세요."
                .to_string(),
            unblacklisted: "✅ @{target} 블랙리스트에서 해제되었습니다.".to_string(),
            cannot_answer: "질문 내용이 명확하지 않아 응답할 수 없습니다.".to_string(),
        }
    }
}

/// A moderation category as written in config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationRuleConfig {
    pub category: String,
    pub keywords: Vec<String>,
    pub messages: Vec<String>,
}

/// A question-answer rule as written in config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRuleConfig {
    pub keywords: Vec<String>,
    /// File name under `reply_questions/`
    pub file: String,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Stock moderation rules, used when the config declares none.
pub fn default_moderation_rules() -> Vec<ModerationRuleConfig> {
    vec![
        ModerationRuleConfig {
            category: "비공식 커플링 주제".to_string(),
            keywords: strings(&[
                "우가진×우오즈미",
                "우가진×웡",
                "우가우오",
                "우가웡",
                "JJ×우오즈미",
                "J우오즈미",
                "웡×JJ",
                "웡J",
                "류×우오즈미",
                "류우오",
                "류×웡",
                "류웡",
                "비공식 CP",
                "비공식 커플링",
                "비공컾",
            ]),
            messages: strings(&["봇주는 오메르타 시리즈의 비공식 커플링 관련 주제를 거부하고 있습니다."]),
        },
        ModerationRuleConfig {
            category: "비속어 및 취향 비하".to_string(),
            keywords: strings(&[
                "병신",
                "등신",
                "지랄",
                "좆",
                "이딴",
                "쓰레기",
                "씨발",
                "니미",
                "한남",
                "한녀",
                "한남충",
                "김치녀",
                "남미새",
                "여미새",
                "역겹",
                "토나와",
                "두창",
                "똥꼬충",
                "이딴 거",
                "왜 좋아해?",
                "왜 좋아하냐?",
            ]),
            messages: strings(&[
                "저속한 표현은 삼가바랍니다.",
                "타인의 취향을 존중할 줄 아는 오타쿠가 되시길 바랍니다.",
                "불편하시면 뮤트나 차단 기능을 활용해주세요.",
            ]),
        },
        ModerationRuleConfig {
            category: "다른 카린 게임 작품".to_string(),
            keywords: strings(&[
                "단죄의 마리아",
                "오메가 뱀파이어",
                "절대미궁그림",
                "절대미궁",
                "절대미궁 비밀의 엄지공주",
                "프린세스 나이트메어",
                "아니마 문디",
            ]),
            messages: strings(&[
                "본 봇은 오메르타 시리즈의 서브 커플링 웡우오 전용 팬봇입니다. 즉 카린 작품 통합 봇이 아닙니다.",
            ]),
        },
    ]
}

/// Stock question rules, used when the config declares none.
pub fn default_question_rules() -> Vec<QuestionRuleConfig> {
    vec![
        QuestionRuleConfig {
            keywords: strings(&["웡우오", "웡×우오즈미", "웡x우오즈미", "웡우오즈미"]),
            file: "04. wonguo.txt".to_string(),
        },
        QuestionRuleConfig {
            keywords: strings(&["우오즈미 테츠", "우오즈미"]),
            file: "03. uozumi tetsu.txt".to_string(),
        },
        QuestionRuleConfig {
            keywords: strings(&["웡 웨이", "웡"]),
            file: "02. wong wei.txt".to_string(),
        },
        QuestionRuleConfig {
            keywords: strings(&[
                "오메르타",
                "오메르타 ~침묵의 규율~",
                "오메르타 code:tycoon",
                "오메르타 침묵",
                "오메르타 ct",
            ]),
            file: "01. omerta series.txt".to_string(),
        },
    ]
}

impl SkeinConfig {
    /// Moderation rules in effect: configured ones, or the stock set.
    pub fn moderation_rules(&self) -> Vec<ModerationRuleConfig> {
        if self.moderation.is_empty() {
            default_moderation_rules()
        } else {
            self.moderation.clone()
        }
    }

    /// Question rules in effect: configured ones, or the stock set.
    pub fn question_rules(&self) -> Vec<QuestionRuleConfig> {
        if self.questions.is_empty() {
            default_question_rules()
        } else {
            self.questions.clone()
        }
    }

    fn validate(&self, config_path: &Path) -> Result<()> {
        let invalid = |field: &str, reason: &str| CoreError::ConfigurationError {
            config_path: config_path.display().to_string(),
            field: field.to_string(),
            expected: reason.to_string(),
            cause: ConfigError::InvalidValue {
                field: field.to_string(),
                reason: reason.to_string(),
            },
        };

        if self.posting.max_chunk_len == 0 {
            return Err(invalid("posting.max_chunk_len", "a positive length"));
        }
        if self.posting.languages.is_empty() {
            return Err(invalid("posting.languages", "at least one language tag"));
        }
        for rule in &self.moderation {
            if rule.messages.is_empty() {
                return Err(invalid(
                    "moderation.messages",
                    "at least one message per moderation category",
                ));
            }
        }
        Ok(())
    }
}

fn resolve_path(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Load configuration from a TOML file
pub async fn load_config(path: &Path) -> Result<SkeinConfig> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        CoreError::ConfigurationError {
            config_path: path.display().to_string(),
            field: "file".to_string(),
            expected: "readable TOML file".to_string(),
            cause: ConfigError::Io(e.to_string()),
        }
    })?;

    let mut config: SkeinConfig =
        toml::from_str(&content).map_err(|e| CoreError::ConfigurationError {
            config_path: path.display().to_string(),
            field: "content".to_string(),
            expected: "valid TOML configuration".to_string(),
            cause: ConfigError::TomlParse(e.to_string()),
        })?;

    // Resolve paths relative to the config file's directory
    let base_dir = path.parent().unwrap_or(Path::new("."));
    config.corpus.root = resolve_path(base_dir, &config.corpus.root);
    config.state.path = resolve_path(base_dir, &config.state.path);

    config.validate(path)?;
    Ok(config)
}

/// Standard config file locations
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    paths.push(PathBuf::from("skein.toml"));

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("skein").join("config.toml"));
    }

    if let Some(home_dir) = dirs::home_dir() {
        paths.push(home_dir.join(".skein").join("config.toml"));
    }

    paths
}

/// Load configuration from standard locations
pub async fn load_config_from_standard_locations() -> Result<SkeinConfig> {
    for path in config_paths() {
        if path.exists() {
            return load_config(&path).await;
        }
    }

    // No config found, return default
    Ok(SkeinConfig::default())
}
