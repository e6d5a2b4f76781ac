//! Configuration management for Sightline
//!
//! Supports environment variables, config files, and runtime overrides.
//!
//! Config file location: ~/.config/sightline/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::error::{Result, SightlineError};

/// Main configuration for Sightline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Ollama configuration
    pub ollama: OllamaConfig,
    /// Model configuration
    pub models: ModelConfig,
    /// Browser configuration
    pub browser: BrowserConfig,
    /// Agent configuration
    pub agent: AgentConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Ollama server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Host address (default: localhost)
    pub host: String,
    /// Port number (default: 11434)
    pub port: u16,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model answering classification, page analysis and recovery prompts
    /// Default: llama3.2
    pub oracle: String,
    /// Sampling temperature for oracle calls
    pub temperature: f32,
}

/// Browser automation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Session name for agent-browser
    pub session_name: String,
    /// Whether to run in headed mode (visible browser)
    pub headed: bool,
    /// Upper bound on waiting for a page load, in ms
    pub load_timeout_ms: u64,
    /// Upper bound on waiting for dynamic content to settle, in ms
    pub settle_timeout_ms: u64,
}

/// Orchestration behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Confidence a command needs when the page type is unknown
    pub confidence_threshold: f32,
    /// Confidence a command needs once the page type is known
    pub relaxed_confidence_threshold: f32,
    /// Minimum verdict confidence before an alternative action is tried
    pub alternative_confidence: f32,
    /// Recovery rounds allowed per action within one turn
    pub max_recovery_attempts: u32,
    /// Hard cap on state transitions within one turn
    pub max_transitions: usize,
    /// Maximum sub-tasks accepted from a decompose verdict
    pub max_subtasks: usize,
    /// Handler timeout in seconds
    pub action_timeout_secs: u64,
    /// Oracle call timeout in seconds
    pub oracle_timeout_secs: u64,
    /// Maximum conversation history length
    pub max_history: usize,
    /// Whether to show debug output
    pub debug: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    pub level: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: env::var("OLLAMA_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: env::var("OLLAMA_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(11434),
            timeout_secs: 120,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            oracle: env::var("SIGHTLINE_MODEL").unwrap_or_else(|_| "llama3.2".to_string()),
            temperature: 0.0,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            session_name: env::var("SIGHTLINE_SESSION")
                .unwrap_or_else(|_| "sightline".to_string()),
            headed: env::var("SIGHTLINE_HEADED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            load_timeout_ms: 10_000,
            settle_timeout_ms: 3_000,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            relaxed_confidence_threshold: 0.6,
            alternative_confidence: 0.7,
            max_recovery_attempts: 2,
            max_transitions: 32,
            max_subtasks: 5,
            action_timeout_secs: 30,
            oracle_timeout_secs: 60,
            max_history: 50,
            debug: env::var("SIGHTLINE_DEBUG")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: env::var("SIGHTLINE_LOG").unwrap_or_else(|_| "warn".to_string()),
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sightline")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > config file > env vars > defaults
    pub fn load() -> Self {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        if let Ok(config) = Self::load_from_file() {
            return config;
        }

        // Fall back to defaults (which respect env vars)
        Self::default()
    }

    /// Load configuration from file only
    pub fn load_from_file() -> Result<Self> {
        let config_path = Self::config_file();

        if !config_path.exists() {
            return Err(SightlineError::config("Config file not found"));
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|e| SightlineError::config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| SightlineError::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_dir = Self::config_dir();
        let config_path = Self::config_file();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).map_err(|e| {
                SightlineError::config(format!("Failed to create config dir: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| SightlineError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&config_path, content)
            .map_err(|e| SightlineError::config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Reject settings the orchestrator cannot run with
    pub fn validate(&self) -> Result<()> {
        let agent = &self.agent;
        for (name, value) in [
            ("confidence_threshold", agent.confidence_threshold),
            ("relaxed_confidence_threshold", agent.relaxed_confidence_threshold),
            ("alternative_confidence", agent.alternative_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SightlineError::config(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        if agent.max_transitions == 0 {
            return Err(SightlineError::config("max_transitions must be positive"));
        }
        Ok(())
    }

    /// Get the full Ollama API URL
    pub fn ollama_url(&self) -> String {
        format!("http://{}:{}", self.ollama.host, self.ollama.port)
    }

    /// Update the oracle model
    pub fn set_model(&mut self, model: impl Into<String>) {
        self.models.oracle = model.into();
    }

    /// Handler timeout as a duration
    pub fn action_timeout(&self) -> Duration {
        Duration::from_secs(self.agent.action_timeout_secs)
    }

    /// Oracle timeout as a duration
    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_secs(self.agent.oracle_timeout_secs)
    }

    /// Page load bound as a duration
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.browser.load_timeout_ms)
    }

    /// Dynamic-content settle bound as a duration
    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.browser.settle_timeout_ms)
    }
}
