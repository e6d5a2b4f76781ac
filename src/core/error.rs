//! Error types for Sightline
//!
//! The first four variants are the turn-level taxonomy. Each one has a single
//! place where it is allowed to turn into a continuation:
//!
//! - `Classification` resolves inside the intent classifier as a clarification
//! - `Planning` ends the turn with a message
//! - `Execution` is routed to the recovery engine
//! - `Prediction` is logged and replaced with a default prediction
//!
//! The remaining variants describe collaborator and infrastructure failures.

use thiserror::Error;

/// Main error type for Sightline operations
#[derive(Error, Debug)]
pub enum SightlineError {
    /// Oracle output could not be turned into a usable command
    #[error("Classification error: {0}")]
    Classification(String),

    /// Task dependencies are cyclic or unsatisfiable
    #[error("Planning error: {0}")]
    Planning(String),

    /// An action handler raised or returned an error
    #[error("Execution error in '{action}': {message}")]
    Execution { action: String, message: String },

    /// Side-effect prediction could not be applied
    #[error("Prediction error: {0}")]
    Prediction(String),

    /// Oracle call failed or timed out
    #[error("Oracle error: {0}")]
    Oracle(String),

    /// Ollama connection or API errors
    #[error("Ollama error: {0}")]
    Ollama(String),

    /// Browser automation errors
    #[error("Browser error: {0}")]
    Browser(String),

    /// Duplicate or missing action registrations
    #[error("Action registry error: {0}")]
    Registry(String),

    /// A task status change outside pending -> running -> completed/failed
    #[error("Invalid status transition for task {task}: {from} -> {to}")]
    InvalidTransition {
        task: String,
        from: String,
        to: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Agent-browser not installed
    #[error("agent-browser not found. Install with: npm install -g agent-browser && agent-browser install")]
    AgentBrowserNotFound,

    /// Model not available
    #[error("Model '{0}' not available in Ollama. Run: ollama pull {0}")]
    ModelNotFound(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Generic error for other cases
    #[error("{0}")]
    Other(String),
}

/// Convenience Result type for Sightline operations
pub type Result<T> = std::result::Result<T, SightlineError>;

impl SightlineError {
    /// Create a classification error
    pub fn classification(msg: impl Into<String>) -> Self {
        Self::Classification(msg.into())
    }

    /// Create a planning error
    pub fn planning(msg: impl Into<String>) -> Self {
        Self::Planning(msg.into())
    }

    /// Create an execution error for the given action
    pub fn execution(action: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Execution {
            action: action.into(),
            message: msg.into(),
        }
    }

    /// Create a prediction error
    pub fn prediction(msg: impl Into<String>) -> Self {
        Self::Prediction(msg.into())
    }

    /// Create an oracle error
    pub fn oracle(msg: impl Into<String>) -> Self {
        Self::Oracle(msg.into())
    }

    /// Create an Ollama error
    pub fn ollama(msg: impl Into<String>) -> Self {
        Self::Ollama(msg.into())
    }

    /// Create a browser error
    pub fn browser(msg: impl Into<String>) -> Self {
        Self::Browser(msg.into())
    }

    /// Create a registry error
    pub fn registry(msg: impl Into<String>) -> Self {
        Self::Registry(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Wrap an error with additional context
    pub fn with_context<E>(context: impl Into<String>, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::WithContext {
            context: context.into(),
            source: Box::new(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_message() {
        let err = SightlineError::execution("click_element", "no element matched 'login'");
        assert_eq!(
            err.to_string(),
            "Execution error in 'click_element': no element matched 'login'"
        );
    }

    #[test]
    fn test_planning_error_message() {
        let err = SightlineError::planning("cycle between c1-t1 and c1-t2");
        assert_eq!(err.to_string(), "Planning error: cycle between c1-t1 and c1-t2");
    }
}
