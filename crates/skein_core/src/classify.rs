//! Keyword-based intent classification for inbound mentions.
//!
//! Text is normalized before matching: handles are removed, punctuation is
//! stripped, everything is lowercased and one trailing Korean particle is cut
//! from each token, so "웡에" and "웡" match the same keyword.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::config::{IntentConfig, QuestionRuleConfig};
use crate::corpus::{Corpus, Shelf};

static HANDLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@[\w.\-]+").expect("valid handle regex"));

static NOT_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s가-힣]").expect("valid punctuation regex"));

/// Particles stripped from token ends, longest first.
const PARTICLES: &[&str] = &[
    "에서", "에게", "한테", "보다", "까지", "부터", "으로", "이나", "은", "는", "이", "가", "을",
    "를", "에", "도", "만", "로", "와", "과", "랑", "나",
];

/// Remove at most one trailing particle from `token`.
pub fn strip_particle(token: &str) -> &str {
    PARTICLES
        .iter()
        .find_map(|p| token.strip_suffix(p))
        .unwrap_or(token)
}

/// Mention text reduced to comparable tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    pub tokens: Vec<String>,
}

impl NormalizedText {
    /// Tokens joined with single spaces.
    pub fn joined(&self) -> String {
        self.tokens.join(" ")
    }

    /// Whether a (folded) keyword occurs in the text.
    ///
    /// Single-word keywords match inside any token; keywords with spaces are
    /// matched against the joined text.
    pub fn contains(&self, keyword: &str) -> bool {
        let keyword = fold(keyword);
        if keyword.is_empty() {
            return false;
        }
        if keyword.contains(char::is_whitespace) {
            self.joined().contains(&keyword)
        } else {
            self.tokens.iter().any(|t| t.contains(&keyword))
        }
    }

    pub fn contains_any(&self, keywords: &[String]) -> bool {
        keywords.iter().any(|k| self.contains(k))
    }
}

/// Punctuation-stripped, lowercased text, without particle removal.
fn fold(text: &str) -> String {
    let text = text.replace('：', ":");
    NOT_WORD
        .replace_all(&text, "")
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn normalize(text: &str) -> NormalizedText {
    let without_handles = HANDLE.replace_all(text, "");
    let tokens = fold(&without_handles)
        .split_whitespace()
        .map(strip_particle)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    NormalizedText { tokens }
}

/// What a mention asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    /// No keyword matched; no reply
    None,
    /// More than one keyword set matched
    Ambiguous,
    ReplyText,
    ReplyImage,
    ReplyQuestion,
}

pub struct IntentClassifier {
    intents: IntentConfig,
    questions: Vec<QuestionRuleConfig>,
    cannot_answer: String,
}

impl IntentClassifier {
    pub fn new(
        intents: IntentConfig,
        questions: Vec<QuestionRuleConfig>,
        cannot_answer: impl Into<String>,
    ) -> Self {
        Self {
            intents,
            questions,
            cannot_answer: cannot_answer.into(),
        }
    }

    pub fn classify(&self, text: &str) -> Intent {
        let normalized = normalize(text);
        let image = normalized.contains_any(&self.intents.image);
        let text_kw = normalized.contains_any(&self.intents.text);
        let question = normalized.contains_any(&self.intents.question);
        debug!(
            "Classifying {:?}: image={} text={} question={}",
            normalized.joined(),
            image,
            text_kw,
            question
        );

        match (image, text_kw, question) {
            (false, false, false) => Intent::None,
            (true, false, false) => Intent::ReplyImage,
            (false, true, false) => Intent::ReplyText,
            (false, false, true) => Intent::ReplyQuestion,
            _ => Intent::Ambiguous,
        }
    }

    /// File of the first question rule matching `text`, in declared order.
    pub fn question_file(&self, text: &str) -> Option<&str> {
        let normalized = normalize(text);
        self.questions
            .iter()
            .find(|rule| normalized.contains_any(&rule.keywords))
            .map(|rule| rule.file.as_str())
    }

    /// Answer text for a question, or `None` when nothing usable exists.
    pub async fn find_answer(&self, text: &str, corpus: &dyn Corpus) -> Option<String> {
        let Some(file) = self.question_file(text) else {
            debug!("No question rule matched");
            return None;
        };

        let bytes = match corpus.read(Shelf::ReplyQuestions, file).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Answer file {} unavailable: {}", file, e);
                return None;
            }
        };
        let content = String::from_utf8_lossy(&bytes).trim().to_string();
        if content.is_empty() {
            warn!("Answer file {} is empty", file);
            return None;
        }
        Some(content)
    }

    /// Answer text for a question, or the "cannot answer" sentinel.
    pub async fn answer_question(&self, text: &str, corpus: &dyn Corpus) -> String {
        self.find_answer(text, corpus)
            .await
            .unwrap_or_else(|| self.cannot_answer.clone())
    }

    pub fn cannot_answer(&self) -> &str {
        &self.cannot_answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MessageConfig, default_question_rules};
    use crate::corpus::DirCorpus;
    use pretty_assertions::assert_eq;

    fn classifier() -> IntentClassifier {
        IntentClassifier::new(
            IntentConfig::default(),
            default_question_rules(),
            MessageConfig::default().cannot_answer,
        )
    }

    #[test]
    fn test_normalize_strips_handles_punctuation_and_particles() {
        let n = normalize("@bot.bsky.social 웡에게 사진을 보여줘!!");
        assert_eq!(n.tokens, vec!["웡", "사진", "보여줘"]);

        let n = normalize("What：IS   this?");
        assert_eq!(n.tokens, vec!["whatis", "this"]);
    }

    #[test]
    fn test_only_one_particle_is_removed() {
        assert_eq!(strip_particle("학교에서"), "학교");
        assert_eq!(strip_particle("사과는"), "사과");
        assert_eq!(strip_particle("집으로"), "집");
        assert_eq!(strip_particle("hello"), "hello");
        // a bare particle token disappears from the normalized text
        assert!(normalize("이").tokens.is_empty());
    }

    #[test]
    fn test_question_example() {
        let c = classifier();
        let n = normalize("웡에 대해 알려줘");
        assert_eq!(n.tokens, vec!["웡", "대해", "알려줘"]);
        // the question keyword 알려 matches inside 알려줘
        assert!(n.contains("알려"));
        assert_eq!(c.classify("웡에 대해 알려줘"), Intent::ReplyQuestion);
        assert_eq!(c.question_file("웡에 대해 알려줘"), Some("02. wong wei.txt"));
    }

    #[test]
    fn test_classify_kinds() {
        let c = classifier();
        assert_eq!(c.classify("@bot 사진 한 장"), Intent::ReplyImage);
        assert_eq!(c.classify("@bot SS 하나 부탁"), Intent::ReplyText);
        assert_eq!(c.classify("@bot 사진이랑 텍스트"), Intent::Ambiguous);
        assert_eq!(c.classify("@bot 그림 알려줘"), Intent::Ambiguous);
        assert_eq!(c.classify("@bot 안녕하세요"), Intent::None);
        assert_eq!(c.classify(""), Intent::None);
    }

    #[test]
    fn test_question_rules_keep_declared_order() {
        let c = classifier();
        // mentions both pairing and character; the pairing rule is declared first
        assert_eq!(c.question_file("웡우오즈미 소개해줘"), Some("04. wonguo.txt"));
        assert_eq!(c.question_file("우오즈미 테츠가 누구야"), Some("03. uozumi tetsu.txt"));
        assert_eq!(c.question_file("오메르타 CT 알려줘"), Some("01. omerta series.txt"));
        assert_eq!(c.question_file("날씨 알려줘"), None);
    }

    #[tokio::test]
    async fn test_answer_question_reads_file_or_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let questions = dir.path().join("reply_questions");
        tokio::fs::create_dir_all(&questions).await.unwrap();
        tokio::fs::write(questions.join("02. wong wei.txt"), "\n웡 웨이는...\n")
            .await
            .unwrap();
        tokio::fs::write(questions.join("03. uozumi tetsu.txt"), "  \n")
            .await
            .unwrap();
        let corpus = DirCorpus::new(dir.path());
        let c = classifier();

        assert_eq!(c.answer_question("웡 알려줘", &corpus).await, "웡 웨이는...");
        // empty file, missing file and no rule all give the sentinel
        assert_eq!(c.answer_question("우오즈미 알려줘", &corpus).await, c.cannot_answer());
        assert_eq!(c.answer_question("오메르타 알려줘", &corpus).await, c.cannot_answer());
        assert_eq!(c.answer_question("날씨 알려줘", &corpus).await, c.cannot_answer());
    }
}
