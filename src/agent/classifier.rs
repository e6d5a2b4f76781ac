//! Intent classification
//!
//! Turns one utterance into a [`Command`]. The oracle does the reading; this
//! module owns the prompt, the vocabulary check and the confidence gate.
//! Nothing here returns an error: every failure becomes a clarification.

use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::agent::command::{ActionKind, Command};
use crate::core::config::AgentConfig;
use crate::core::{PageContext, PageType};
use crate::llm::Oracle;

const UNPARSABLE: &str = "I'm not sure what action you want to take. Could you rephrase your request?";
const UNSURE: &str = "I'm not sure about that action. Could you be more specific?";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ClassifierReply {
    action: Option<String>,
    confidence: f32,
    context: Option<String>,
    next_action: Option<String>,
    next_context: Option<String>,
}

/// Confidence gates applied to oracle classifications
#[derive(Debug, Clone, Copy)]
pub struct Gate {
    /// Applied while the page type is unknown
    pub strict: f32,
    /// Applied once the page has been classified
    pub relaxed: f32,
}

impl Gate {
    pub fn for_page(&self, page_type: PageType) -> f32 {
        if page_type.is_known() {
            self.relaxed
        } else {
            self.strict
        }
    }
}

impl From<&AgentConfig> for Gate {
    fn from(config: &AgentConfig) -> Self {
        Self {
            strict: config.confidence_threshold,
            relaxed: config.relaxed_confidence_threshold,
        }
    }
}

/// Oracle-backed intent classifier
pub struct IntentClassifier {
    oracle: Oracle,
    gate: Gate,
}

impl IntentClassifier {
    pub fn new(oracle: Oracle, gate: Gate) -> Self {
        Self { oracle, gate }
    }

    pub fn gate(&self) -> Gate {
        self.gate
    }

    /// Classify an utterance against the current page
    ///
    /// Returns a clarification command when the reply is unusable or falls
    /// below the gate for the page's type.
    #[instrument(skip(self, page, suggested), fields(page_type = %page.page_type))]
    pub async fn classify(
        &self,
        utterance: &str,
        page: &PageContext,
        suggested: &[ActionKind],
    ) -> Command {
        let prompt = build_prompt(utterance, page.page_type, suggested);

        let reply: ClassifierReply = match self.oracle.ask_json(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "classification failed");
                return Command::clarification(UNPARSABLE);
            }
        };
        debug!(?reply, "classifier reply");

        let Some(action) = reply.action.as_deref().and_then(ActionKind::parse) else {
            info!(action = ?reply.action, "action outside the vocabulary");
            return Command::clarification(UNPARSABLE);
        };

        let threshold = self.gate.for_page(page.page_type);
        if reply.confidence < threshold {
            info!(
                %action,
                confidence = reply.confidence,
                threshold,
                "classification below confidence gate"
            );
            return Command::clarification(low_confidence_question(suggested));
        }

        let context = reply
            .context
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| utterance.to_string());
        let mut command = Command::new(action, reply.confidence, context);

        if let Some(next) = reply.next_action.as_deref().and_then(ActionKind::parse) {
            command = command.then(next, reply.next_context.unwrap_or_default());
        }

        info!(%action, confidence = command.confidence, "classified");
        command
    }
}

/// Actions worth offering for a page, most useful first
pub fn suggested_actions(page: &PageContext) -> Vec<ActionKind> {
    let mut actions = match page.page_type {
        PageType::News => vec![ActionKind::ListHeadlines, ActionKind::GotoHeadline],
        PageType::Article => vec![ActionKind::ReadPage, ActionKind::ListHeadings],
        PageType::Search | PageType::Form => vec![ActionKind::FindText, ActionKind::NextElement],
        PageType::Social | PageType::Application => {
            vec![ActionKind::ListLandmarks, ActionKind::ReadSection]
        }
        PageType::Unknown if page.url.is_empty() => vec![ActionKind::Navigate],
        PageType::Unknown => vec![ActionKind::ReadPage, ActionKind::ListHeadings],
    };
    if page.has_headlines && !actions.contains(&ActionKind::ListHeadlines) {
        actions.push(ActionKind::ListHeadlines);
    }
    actions
}

fn low_confidence_question(suggested: &[ActionKind]) -> String {
    if suggested.is_empty() {
        UNSURE.to_string()
    } else {
        let names: Vec<_> = suggested.iter().map(|a| a.oracle_name()).collect();
        format!("I'm not sure what you want to do. You can try: {}", names.join(", "))
    }
}

/// Classification prompt listing the action vocabulary
pub fn build_prompt(utterance: &str, page_type: PageType, suggested: &[ActionKind]) -> String {
    let mut prompt = String::from(
        "Classify the user's command into one browser action.\n\nAvailable actions:\n",
    );
    for action in ActionKind::VOCABULARY {
        prompt.push_str(&format!("- {}: {}\n", action.oracle_name(), action.description()));
    }

    prompt.push_str(&format!("\nUser command: \"{}\"\n", utterance));
    if page_type.is_known() {
        prompt.push_str(&format!("Current page type: {}\n", page_type));
        if !suggested.is_empty() {
            let names: Vec<_> = suggested.iter().map(|a| a.oracle_name()).collect();
            prompt.push_str(&format!("Suggested actions: {}\n", names.join(", ")));
        }
    }

    prompt.push_str(
        "\nIf the command asks for two things in sequence, put the second in next_action.\n\
         Respond with JSON only:\n\
         {\"action\": \"<action>\", \"confidence\": <0.0-1.0>, \"context\": \"<target or text>\", \
         \"next_action\": \"<action or null>\", \"next_context\": \"<context or null>\"}",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Message, Result};
    use crate::llm::{GenerateOptions, LLMProvider, LLMResponse};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Canned(&'static str);

    #[async_trait]
    impl LLMProvider for Canned {
        async fn chat(
            &self,
            model: &str,
            _messages: &[Message],
            _options: Option<GenerateOptions>,
        ) -> Result<LLMResponse> {
            Ok(LLMResponse::text(model, self.0))
        }

        async fn is_model_available(&self, _model: &str) -> Result<bool> {
            Ok(true)
        }

        async fn list_models(&self) -> Result<Vec<String>> {
            Ok(vec![])
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    fn classifier(reply: &'static str) -> IntentClassifier {
        let oracle = Oracle::new(Arc::new(Canned(reply)), "test");
        IntentClassifier::new(
            oracle,
            Gate {
                strict: 0.7,
                relaxed: 0.6,
            },
        )
    }

    fn news_page() -> PageContext {
        PageContext {
            url: "https://news.example.com".into(),
            page_type: PageType::News,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_relaxed_gate_on_known_page() {
        let c = classifier(r#"{"action": "list_headlines", "confidence": 0.65, "context": ""}"#);
        let command = c.classify("read headlines", &news_page(), &[]).await;
        assert_eq!(command.action, ActionKind::ListHeadlines);
        assert_eq!(command.context, "read headlines");
    }

    #[tokio::test]
    async fn test_strict_gate_on_unknown_page() {
        let c = classifier(r#"{"action": "list_headlines", "confidence": 0.65, "context": ""}"#);
        let command = c
            .classify("read headlines", &PageContext::default(), &[])
            .await;
        assert!(command.is_clarification());
        assert_eq!(command.context, UNSURE);
    }

    #[tokio::test]
    async fn test_invalid_action_asks_to_rephrase() {
        let c = classifier(r#"Sure! {"action": "teleport", "confidence": 0.99}"#);
        let command = c.classify("beam me up", &PageContext::default(), &[]).await;
        assert!(command.is_clarification());
        assert_eq!(command.confidence, 0.0);
        assert_eq!(command.context, UNPARSABLE);
    }

    #[tokio::test]
    async fn test_single_quoted_reply_and_chained_action() {
        let c = classifier(
            "{'action': 'navigate', 'confidence': 0.9, 'context': 'bbc.com', \
             'next_action': 'list_headlines', 'next_context': ''}",
        );
        let command = c
            .classify("open bbc and read headlines", &PageContext::default(), &[])
            .await;
        assert_eq!(command.action, ActionKind::Navigate);
        assert_eq!(command.context, "bbc.com");
        assert_eq!(command.next_action, Some(ActionKind::ListHeadlines));
    }

    #[tokio::test]
    async fn test_invalid_next_action_is_dropped() {
        let c = classifier(
            r#"{"action": "read", "confidence": 0.9, "context": "", "next_action": "dance"}"#,
        );
        let command = c.classify("read it", &PageContext::default(), &[]).await;
        assert_eq!(command.action, ActionKind::ReadPage);
        assert_eq!(command.next_action, None);
    }

    #[test]
    fn test_low_confidence_lists_suggestions() {
        let question = low_confidence_question(&[ActionKind::ListHeadlines, ActionKind::ReadPage]);
        assert!(question.ends_with("list_headlines, read"));
    }

    #[test]
    fn test_prompt_lists_vocabulary() {
        let prompt = build_prompt("go to example.com", PageType::Unknown, &[]);
        for action in ActionKind::VOCABULARY {
            assert!(prompt.contains(&format!("- {}:", action.oracle_name())));
        }
        assert!(!prompt.contains("Current page type"));
    }
}
