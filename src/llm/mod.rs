//! LLM module - Language Model integrations
//!
//! Provides the provider abstraction, the Ollama backend, and the oracle
//! wrapper the orchestrator talks to.

pub mod ollama;
pub mod oracle;
pub mod traits;

pub use ollama::OllamaClient;
pub use oracle::{extract_json_object, parse_json_reply, Oracle};
pub use traits::{GenerateOptions, LLMProvider, LLMResponse, TokenUsage};
