//! Browser driver backed by the agent-browser CLI
//!
//! Each driver call spawns one `agent-browser` command against a named
//! session, so the browser outlives individual calls.

use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::browser::document::find_script;
use crate::browser::driver::BrowserDriver;
use crate::browser::element::ElementHandle;
use crate::core::{Config, Result, SightlineError};

/// Driver for browser automation via agent-browser CLI
pub struct AgentBrowserDriver {
    /// Session name for isolation
    session_name: String,
    /// Whether to run in headed mode
    headed: bool,
}

impl AgentBrowserDriver {
    pub fn new(session_name: impl Into<String>) -> Self {
        Self {
            session_name: session_name.into(),
            headed: false,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            session_name: config.browser.session_name.clone(),
            headed: config.browser.headed,
        }
    }

    /// Check if agent-browser is installed
    pub async fn is_available() -> bool {
        Command::new("agent-browser")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Run an agent-browser command
    async fn run_command(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new("agent-browser");
        cmd.args(["--session", &self.session_name]);

        if self.headed {
            cmd.arg("--headed");
        }

        cmd.args(args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        debug!(command = args.first().copied().unwrap_or_default(), "agent-browser");

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SightlineError::AgentBrowserNotFound
            } else {
                SightlineError::browser(format!("Failed to run agent-browser: {}", e))
            }
        })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(SightlineError::browser(format!(
                "agent-browser command failed: {}",
                stderr.trim()
            )))
        }
    }

    async fn eval(&self, expression: &str) -> Result<Value> {
        let output = self.run_command(&["eval", expression]).await?;
        Ok(decode_eval_output(&output))
    }
}

impl Default for AgentBrowserDriver {
    fn default() -> Self {
        Self::new("sightline")
    }
}

/// Wrap a function expression so that its result is printed as JSON
fn invocation(script: &str, args: &[Value]) -> Result<String> {
    let args = serde_json::to_string(args)?;
    Ok(format!(
        "(() => {{ const __result = ({})(...{}); return JSON.stringify(__result === undefined ? null : __result); }})()",
        script, args
    ))
}

/// agent-browser prints eval results either raw or as a JSON string literal
fn decode_eval_output(output: &str) -> Value {
    let trimmed = output.trim();
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::String(inner)) => {
            serde_json::from_str(&inner).unwrap_or(Value::String(inner))
        }
        Ok(value) => value,
        Err(_) => Value::String(trimmed.to_string()),
    }
}

#[async_trait]
impl BrowserDriver for AgentBrowserDriver {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.run_command(&["open", url]).await.map(|_| ())
    }

    async fn current_url(&self) -> Result<String> {
        self.run_command(&["get", "url"])
            .await
            .map(|s| s.trim().to_string())
    }

    async fn title(&self) -> Result<String> {
        self.run_command(&["get", "title"])
            .await
            .map(|s| s.trim().to_string())
    }

    async fn execute_script(&self, script: &str, args: &[Value]) -> Result<Value> {
        self.eval(&invocation(script, args)?).await
    }

    async fn find(&self, selector: &str) -> Result<Vec<ElementHandle>> {
        let value = self
            .execute_script(find_script(), &[Value::String(selector.to_string())])
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn scroll_into_view(&self, element: &ElementHandle) -> Result<()> {
        let script = "(selector) => { const el = document.querySelector(selector); \
                      if (!el) return false; el.scrollIntoView({block: 'center'}); return true; }";
        let found = self
            .execute_script(script, &[Value::String(element.selector.clone())])
            .await?;
        if found == Value::Bool(true) {
            Ok(())
        } else {
            Err(SightlineError::browser(format!(
                "element {} is no longer on the page",
                element.selector
            )))
        }
    }

    async fn click(&self, element: &ElementHandle) -> Result<()> {
        self.run_command(&["click", &element.selector])
            .await
            .map(|_| ())
    }

    async fn page_source(&self) -> Result<String> {
        match self
            .execute_script("() => document.documentElement.outerHTML", &[])
            .await?
        {
            Value::String(html) => Ok(html),
            other => Ok(other.to_string()),
        }
    }

    async fn wait_for_load(&self, timeout: Duration) -> Result<()> {
        match tokio::time::timeout(timeout, self.run_command(&["wait", "--load", "networkidle"]))
            .await
        {
            Ok(result) => result.map(|_| ()),
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "page load wait timed out");
                Err(SightlineError::browser("timed out waiting for the page to load"))
            }
        }
    }

    async fn close(&self) -> Result<()> {
        self.run_command(&["close"]).await.map(|_| ())
    }

    fn name(&self) -> &str {
        "agent-browser"
    }
}
