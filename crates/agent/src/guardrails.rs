//! Content and relevance screening around the agent call.
//!
//! Checks are deterministic keyword screens. A checker that cannot reach a
//! verdict reports `Error`, which the runtime treats the same as `Blocked`.

use std::collections::HashSet;

use agentdesk_core::config::GuardrailConfig;
use async_trait::async_trait;

/// Which check produced a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuardrailStage {
    Prompt,
    ReplyContent,
    ReplyRelevance,
}

impl GuardrailStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prompt => "prompt",
            Self::ReplyContent => "reply_content",
            Self::ReplyRelevance => "reply_relevance",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailVerdict {
    Pass,
    Blocked { stage: GuardrailStage, reason: String },
    Error { message: String },
}

impl GuardrailVerdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

#[async_trait]
pub trait GuardrailChecker: Send + Sync {
    async fn check_prompt(&self, prompt: &str) -> GuardrailVerdict;
    /// Content screen first, then relevance of the reply to the prompt.
    async fn check_reply(&self, prompt: &str, reply: &str) -> GuardrailVerdict;
}

pub struct DisabledGuard;

#[async_trait]
impl GuardrailChecker for DisabledGuard {
    async fn check_prompt(&self, _prompt: &str) -> GuardrailVerdict {
        GuardrailVerdict::Pass
    }

    async fn check_reply(&self, _prompt: &str, _reply: &str) -> GuardrailVerdict {
        GuardrailVerdict::Pass
    }
}

const STOPWORDS: &[&str] = &[
    "about", "after", "again", "also", "been", "before", "being", "could", "does", "doing",
    "from", "have", "here", "into", "just", "like", "make", "more", "most", "much", "only",
    "other", "over", "please", "should", "some", "such", "than", "that", "their", "them",
    "then", "there", "these", "they", "this", "those", "very", "want", "what", "when", "where",
    "which", "while", "with", "would", "your", "tell", "know", "give", "need",
];

/// Prompts with fewer significant words than this skip the relevance check.
const MIN_RELEVANCE_WORDS: usize = 3;
const STEM_CHARS: usize = 5;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeywordGuard {
    sensitive_topics: Vec<String>,
    blocked_terms: Vec<String>,
    relevance_check: bool,
}

impl KeywordGuard {
    pub fn new(
        sensitive_topics: Vec<String>,
        blocked_terms: Vec<String>,
        relevance_check: bool,
    ) -> Self {
        let normalize_all = |values: Vec<String>| {
            values
                .into_iter()
                .map(|value| normalize(&value))
                .filter(|value| !value.is_empty())
                .collect::<Vec<_>>()
        };
        Self {
            sensitive_topics: normalize_all(sensitive_topics),
            blocked_terms: normalize_all(blocked_terms),
            relevance_check,
        }
    }

    pub fn from_config(config: &GuardrailConfig) -> Self {
        Self::new(
            config.sensitive_topics.clone(),
            config.blocked_terms.clone(),
            config.relevance_check,
        )
    }

    fn screen(&self, text: &str, stage: GuardrailStage) -> GuardrailVerdict {
        let padded = format!(" {} ", normalize(text));
        let mentions = |phrase: &&String| padded.contains(&format!(" {phrase} "));
        if let Some(topic) = self.sensitive_topics.iter().find(mentions) {
            return GuardrailVerdict::Blocked { stage, reason: format!("sensitive topic: {topic}") };
        }
        if let Some(term) = self.blocked_terms.iter().find(mentions) {
            return GuardrailVerdict::Blocked { stage, reason: format!("blocked term: {term}") };
        }
        GuardrailVerdict::Pass
    }

    fn relevance(&self, prompt: &str, reply: &str) -> GuardrailVerdict {
        if !self.relevance_check {
            return GuardrailVerdict::Pass;
        }
        if reply.trim().is_empty() {
            return GuardrailVerdict::Blocked {
                stage: GuardrailStage::ReplyRelevance,
                reason: "reply is empty".to_string(),
            };
        }

        let prompt_stems = significant_stems(prompt);
        if prompt_stems.len() < MIN_RELEVANCE_WORDS {
            return GuardrailVerdict::Pass;
        }
        let reply_stems = significant_stems(reply);
        if prompt_stems.is_disjoint(&reply_stems) {
            return GuardrailVerdict::Blocked {
                stage: GuardrailStage::ReplyRelevance,
                reason: "reply does not address the question".to_string(),
            };
        }
        GuardrailVerdict::Pass
    }
}

#[async_trait]
impl GuardrailChecker for KeywordGuard {
    async fn check_prompt(&self, prompt: &str) -> GuardrailVerdict {
        self.screen(prompt, GuardrailStage::Prompt)
    }

    async fn check_reply(&self, prompt: &str, reply: &str) -> GuardrailVerdict {
        match self.screen(reply, GuardrailStage::ReplyContent) {
            GuardrailVerdict::Pass => self.relevance(prompt, reply),
            blocked => blocked,
        }
    }
}

/// Lower-cases and collapses every run of non-alphanumeric characters to one space.
fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn significant_stems(text: &str) -> HashSet<String> {
    normalize(text)
        .split(' ')
        .filter(|word| word.chars().count() >= 4 && !STOPWORDS.contains(word))
        .map(|word| word.chars().take(STEM_CHARS).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use agentdesk_core::config::GuardrailConfig;

    use super::{DisabledGuard, GuardrailChecker, GuardrailStage, GuardrailVerdict, KeywordGuard};

    fn guard() -> KeywordGuard {
        KeywordGuard::from_config(&GuardrailConfig::default())
    }

    #[tokio::test]
    async fn sensitive_topic_in_prompt_is_blocked() {
        let verdict = guard().check_prompt("What do you think about POLITICS today?").await;
        assert!(matches!(
            verdict,
            GuardrailVerdict::Blocked { stage: GuardrailStage::Prompt, ref reason }
                if reason.contains("politics")
        ));
    }

    #[tokio::test]
    async fn topics_match_whole_words_only() {
        assert!(guard().check_prompt("Any weaponsmith museums in Toledo?").await.is_pass());
        assert!(guard().check_prompt("hello").await.is_pass());
    }

    #[tokio::test]
    async fn blocked_terms_and_phrases_are_screened() {
        let guard = KeywordGuard::new(Vec::new(), vec!["Credit Card".to_string()], false);

        let verdict = guard.check_prompt("here is my credit-card number").await;
        assert!(matches!(verdict, GuardrailVerdict::Blocked { .. }));
        assert!(guard.check_prompt("cards on the table").await.is_pass());
    }

    #[tokio::test]
    async fn reply_content_is_checked_before_relevance() {
        let verdict = guard()
            .check_reply(
                "Where should I eat in Lisbon tonight?",
                "Let's talk about weapons instead.",
            )
            .await;
        assert!(matches!(
            verdict,
            GuardrailVerdict::Blocked { stage: GuardrailStage::ReplyContent, .. }
        ));
    }

    #[tokio::test]
    async fn unrelated_reply_fails_relevance() {
        let verdict = guard()
            .check_reply(
                "How do I deploy my Streamlit dashboard online?",
                "Bananas are a good source of potassium.",
            )
            .await;
        assert!(matches!(
            verdict,
            GuardrailVerdict::Blocked { stage: GuardrailStage::ReplyRelevance, .. }
        ));

        let related = guard()
            .check_reply(
                "How do I deploy my Streamlit dashboard online?",
                "Push to GitHub, then deploying on Streamlit Community Cloud takes a minute.",
            )
            .await;
        assert!(related.is_pass());
    }

    #[tokio::test]
    async fn short_prompts_skip_relevance() {
        let reply = "Hi! How can I help with your course today?";
        assert!(guard().check_reply("hello", reply).await.is_pass());
    }

    #[tokio::test]
    async fn disabled_guard_always_passes() {
        assert!(DisabledGuard.check_prompt("politics").await.is_pass());
        assert!(DisabledGuard.check_reply("politics", "weapons").await.is_pass());
    }
}
