//! Oracle wrapper around an LLM provider
//!
//! Every prompt the orchestrator sends expects a single JSON object back.
//! Models routinely wrap that object in prose or code fences, or emit
//! Python-style quoting, so replies go through [`parse_json_reply`] before
//! deserialization.

use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::{Config, Message, Result, SightlineError};
use crate::llm::traits::{GenerateOptions, LLMProvider};

/// System prompt shared by every oracle call
const SYSTEM_PROMPT: &str = "You are the reasoning component of a screen reader that helps users \
navigate and understand web content. Always answer with exactly one JSON object and nothing else.";

/// Language-model collaborator used for classification, page analysis and recovery
#[derive(Clone)]
pub struct Oracle {
    provider: Arc<dyn LLMProvider>,
    model: String,
    temperature: f32,
    timeout: Duration,
}

impl Oracle {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.0,
            timeout: Duration::from_secs(60),
        }
    }

    /// Build an oracle with the model, temperature and timeout from configuration
    pub fn from_config(provider: Arc<dyn LLMProvider>, config: &Config) -> Self {
        Self {
            provider,
            model: config.models.oracle.clone(),
            temperature: config.models.temperature,
            timeout: config.oracle_timeout(),
        }
    }

    /// Send a prompt and return the raw reply text
    pub async fn ask(&self, prompt: &str) -> Result<String> {
        let messages = [Message::system(SYSTEM_PROMPT), Message::user(prompt)];
        let options = GenerateOptions {
            temperature: Some(self.temperature),
            json: true,
            ..Default::default()
        };

        let reply = tokio::time::timeout(
            self.timeout,
            self.provider.chat(&self.model, &messages, Some(options)),
        )
        .await
        .map_err(|_| {
            SightlineError::oracle(format!(
                "no reply from {} within {}s",
                self.model,
                self.timeout.as_secs()
            ))
        })??;

        debug!(model = %reply.model, chars = reply.content.len(), "oracle reply");
        Ok(reply.content)
    }

    /// Send a prompt and deserialize the JSON object in the reply
    pub async fn ask_json<T: DeserializeOwned>(&self, prompt: &str) -> Result<T> {
        let reply = self.ask(prompt).await?;
        parse_json_reply(&reply).inspect_err(|e| {
            warn!(error = %e, "oracle reply was not usable JSON");
        })
    }
}

/// Slice from the first `{` to the last `}`, if both exist in that order
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parse the outermost JSON object in an oracle reply
///
/// Falls back to normalizing single-quoted strings and `True`/`False`/`None`
/// literals when the strict parse fails.
pub fn parse_json_reply<T: DeserializeOwned>(text: &str) -> Result<T> {
    let payload = extract_json_object(text)
        .ok_or_else(|| SightlineError::oracle("reply contains no JSON object"))?;

    match serde_json::from_str(payload) {
        Ok(value) => Ok(value),
        Err(strict) => serde_json::from_str(&normalize_quoting(payload)).map_err(|_| {
            SightlineError::oracle(format!("reply is not valid JSON: {}", strict))
        }),
    }
}

fn normalize_quoting(payload: &str) -> String {
    #[derive(PartialEq)]
    enum Quote {
        Outside,
        Double,
        Single,
    }

    let mut out = String::with_capacity(payload.len());
    let mut state = Quote::Outside;
    let mut chars = payload.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            Quote::Outside => match c {
                '"' => {
                    state = Quote::Double;
                    out.push('"');
                }
                '\'' => {
                    state = Quote::Single;
                    out.push('"');
                }
                c if c.is_ascii_alphabetic() => {
                    let mut word = String::from(c);
                    while let Some(&next) = chars.peek() {
                        if !next.is_ascii_alphanumeric() && next != '_' {
                            break;
                        }
                        word.push(next);
                        chars.next();
                    }
                    out.push_str(match word.as_str() {
                        "True" => "true",
                        "False" => "false",
                        "None" => "null",
                        other => other,
                    });
                }
                c => out.push(c),
            },
            Quote::Double => {
                out.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == '"' {
                    state = Quote::Outside;
                }
            }
            Quote::Single => match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        if escaped == '\'' {
                            out.push('\'');
                        } else {
                            out.push('\\');
                            out.push(escaped);
                        }
                    }
                }
                '\'' => {
                    state = Quote::Outside;
                    out.push('"');
                }
                '"' => out.push_str("\\\""),
                c => out.push(c),
            },
        }
    }

    out
}
