//! Banned-phrase moderation.
//!
//! Categories are checked in declaration order and keywords are matched as
//! raw, case-sensitive substrings. The first hit wins.

use rand::seq::IndexedRandom;

use crate::config::ModerationRuleConfig;

/// One moderation category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModerationRule {
    pub category: String,
    pub keywords: Vec<String>,
    pub messages: Vec<String>,
}

impl From<ModerationRuleConfig> for ModerationRule {
    fn from(config: ModerationRuleConfig) -> Self {
        Self {
            category: config.category,
            keywords: config.keywords,
            messages: config.messages,
        }
    }
}

/// A matched rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModerationHit {
    pub category: String,
    pub keyword: String,
    /// Rejection reply, drawn at random from the category's messages
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ModerationEngine {
    rules: Vec<ModerationRule>,
}

impl ModerationEngine {
    pub fn new(rules: impl IntoIterator<Item = impl Into<ModerationRule>>) -> Self {
        Self {
            rules: rules.into_iter().map(Into::into).collect(),
        }
    }

    pub fn rules(&self) -> &[ModerationRule] {
        &self.rules
    }

    /// First rule whose keyword occurs in `text`, if any.
    pub fn check(&self, text: &str) -> Option<ModerationHit> {
        let mut rng = rand::rng();
        for rule in &self.rules {
            let Some(keyword) = rule
                .keywords
                .iter()
                .find(|k| !k.is_empty() && text.contains(k.as_str()))
            else {
                continue;
            };
            // rules without messages are rejected at config load, but keep the hit
            let message = rule.messages.choose(&mut rng).cloned().unwrap_or_default();
            return Some(ModerationHit {
                category: rule.category.clone(),
                keyword: keyword.clone(),
                message,
            });
        }
        None
    }
}
