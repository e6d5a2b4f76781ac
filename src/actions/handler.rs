//! Action handler boundary
//!
//! Handlers read a snapshot of the session and describe their effects as
//! [`StateDelta`] values. Only the executor applies those deltas.

use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

use crate::agent::session::{SessionState, StateDelta};
use crate::agent::task::Task;
use crate::browser::document::{run_probe, DocumentSummary, Probe};
use crate::browser::BrowserDriver;
use crate::core::{ActionPrediction, Config, PageContext, Result};

/// Waits handlers use around page interactions
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    /// Bound on waiting for a navigation to finish loading
    pub load: Duration,
    /// Bound on waiting for dynamic content to settle
    pub settle: Duration,
    /// Pause after scrolling so lazy content can render
    pub scroll_pause: Duration,
}

impl Timing {
    pub fn from_config(config: &Config) -> Self {
        Self {
            load: config.load_timeout(),
            settle: config.settle_timeout(),
            scroll_pause: Duration::from_millis(500),
        }
    }

    /// No waiting at all
    pub fn immediate() -> Self {
        Self {
            load: Duration::ZERO,
            settle: Duration::ZERO,
            scroll_pause: Duration::ZERO,
        }
    }
}

/// Read-only view handed to a handler for one task
pub struct ActionContext<'a> {
    pub session: &'a SessionState,
    pub task: &'a Task,
    pub prediction: &'a ActionPrediction,
    pub timing: Timing,
}

impl ActionContext<'_> {
    pub fn driver(&self) -> &dyn BrowserDriver {
        self.session.driver().driver()
    }

    pub fn page(&self) -> &PageContext {
        self.session.page_context()
    }

    /// Task context with surrounding whitespace removed
    pub fn target(&self) -> &str {
        self.task.context.trim()
    }
}

/// What a handler did
#[derive(Debug, Clone, Default)]
pub struct ActionOutcome {
    pub output: String,
    pub state_updates: Vec<StateDelta>,
    /// Assistant messages for the user
    pub messages: Vec<String>,
    /// Set when the handler ran but could not do what was asked
    pub error: Option<String>,
}

impl ActionOutcome {
    /// Successful outcome whose output is also shown to the user
    pub fn reply(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            output: text.clone(),
            messages: vec![text],
            ..Default::default()
        }
    }

    /// Successful outcome with output for the history only
    pub fn quiet(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Default::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            output: error.clone(),
            error: Some(error),
            ..Default::default()
        }
    }

    pub fn with_update(mut self, delta: StateDelta) -> Self {
        self.state_updates.push(delta);
        self
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// A named action the executor can run
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Registry name
    fn name(&self) -> &'static str;

    async fn invoke(&self, ctx: ActionContext<'_>) -> Result<ActionOutcome>;
}

/// Wait for the page to settle; a timeout only gets logged
pub async fn settle(driver: &dyn BrowserDriver, timeout: Duration) {
    if timeout.is_zero() {
        return;
    }
    if let Err(e) = driver.wait_for_load(timeout).await {
        warn!(error = %e, "page did not settle");
    }
}

/// Heuristic page context for whatever document is loaded now
pub async fn probe_page(driver: &dyn BrowserDriver) -> Result<PageContext> {
    let summary: DocumentSummary = run_probe(driver, Probe::Summary, &[]).await?;
    Ok(summary.page_context())
}

/// Leading number in a context such as "3", "headline 3" or "the third one"
pub fn ordinal(text: &str) -> Option<usize> {
    const WORDS: &[&str] = &[
        "first", "second", "third", "fourth", "fifth", "sixth", "seventh", "eighth", "ninth",
        "tenth",
    ];
    let lower = text.to_lowercase();
    for token in lower.split(|c: char| !c.is_alphanumeric()) {
        if token.is_empty() {
            continue;
        }
        let digits = token.trim_end_matches(|c: char| c.is_ascii_alphabetic());
        if let Ok(n) = digits.parse::<usize>() {
            return Some(n);
        }
        if let Some(pos) = WORDS.iter().position(|w| *w == token) {
            return Some(pos + 1);
        }
    }
    None
}
