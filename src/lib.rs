//! Sightline - conversational screen reader
//!
//! Drives a browser from free-text commands. Each command is classified by
//! a local LLM (through Ollama), planned into dependent tasks, executed
//! against the page through agent-browser, and recovered when it fails.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, and error handling
//! - **LLM**: LLM provider abstraction, Ollama backend and the oracle wrapper
//! - **Browser**: Driver trait, agent-browser driver and in-page probes
//! - **Actions**: Action handlers and the registry the executor dispatches to
//! - **Agent**: Per-turn stage machine and the session state it threads
//! - **CLI**: Command-line interface and REPL
//!
//! # Usage
//!
//! ```rust,no_run
//! use sightline::{Agent, Config};
//!
//! #[tokio::main]
//! async fn main() -> sightline::Result<()> {
//!     let mut agent = Agent::from_config(Config::load())?;
//!     agent.initialize().await?;
//!
//!     let reply = agent.process("Go to example.com").await?;
//!     println!("{}", reply);
//!     Ok(())
//! }
//! ```

pub mod actions;
pub mod agent;
pub mod browser;
pub mod cli;
pub mod core;
pub mod llm;

// Re-export commonly used items
pub use agent::Agent;
pub use cli::Repl;
pub use core::{Config, Result, SightlineError};
