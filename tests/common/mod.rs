//! Scripted collaborators for turn-level tests
//!
//! `ScriptedOracle` answers by prompt kind from per-kind reply queues, and
//! `MemoryBrowser` serves canned probe results for a few in-memory pages.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use sightline::browser::{BrowserDriver, ElementHandle, Probe};
use sightline::core::{Config, Message, Result, SightlineError};
use sightline::llm::{GenerateOptions, LLMProvider, LLMResponse};
use sightline::Agent;

/// Reply that makes the oracle hang instead of answering
pub const STALL: &str = "<stall>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    Command,
    Page,
    Recovery,
}

impl PromptKind {
    fn of(prompt: &str) -> Self {
        if prompt.starts_with("Classify the user's command") {
            Self::Command
        } else if prompt.starts_with("Classify this web page") {
            Self::Page
        } else {
            Self::Recovery
        }
    }

    fn fallback(&self) -> &'static str {
        match self {
            Self::Command => r#"{"action": "none", "confidence": 0.0}"#,
            Self::Page => r#"{"type": "unknown", "reasoning": "scripted"}"#,
            Self::Recovery => r#"{"strategy": "abort"}"#,
        }
    }
}

#[derive(Default)]
struct Script {
    replies: HashMap<PromptKind, VecDeque<String>>,
    prompts: Vec<(PromptKind, String)>,
}

#[derive(Clone, Default)]
pub struct ScriptedOracle {
    inner: Arc<Mutex<Script>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, kind: PromptKind, reply: &str) -> Self {
        self.lock()
            .replies
            .entry(kind)
            .or_default()
            .push_back(reply.to_string());
        self
    }

    pub fn prompts(&self, kind: PromptKind) -> Vec<String> {
        self.lock()
            .prompts
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, p)| p.clone())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.inner.lock().unwrap()
    }
}

#[async_trait]
impl LLMProvider for ScriptedOracle {
    async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        _options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        let prompt = messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let kind = PromptKind::of(&prompt);

        let reply = {
            let mut script = self.lock();
            script.prompts.push((kind, prompt));
            script
                .replies
                .get_mut(&kind)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| kind.fallback().to_string())
        };

        if reply == STALL {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        Ok(LLMResponse::text(model, reply))
    }

    async fn is_model_available(&self, _model: &str) -> Result<bool> {
        Ok(true)
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        Ok(vec!["scripted".to_string()])
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// A page `MemoryBrowser` can show
#[derive(Clone, Default)]
pub struct Page {
    pub title: String,
    pub probes: Vec<(Probe, Value)>,
    /// Click candidates, matched against the click target by text
    pub clickable: Vec<ElementHandle>,
}

impl Page {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Default::default()
        }
    }

    pub fn probe(mut self, probe: Probe, value: Value) -> Self {
        self.probes.push((probe, value));
        self
    }

    pub fn clickable(mut self, selector: &str, tag: &str, text: &str) -> Self {
        self.clickable.push(ElementHandle {
            selector: selector.to_string(),
            tag: tag.to_string(),
            text: text.to_string(),
            visible: true,
            in_viewport: true,
            ..Default::default()
        });
        self
    }
}

#[derive(Default)]
struct Tab {
    url: String,
    pages: HashMap<String, Page>,
    navigations: Vec<String>,
    clicks: Vec<String>,
    click_attempts: usize,
    failing_clicks: usize,
}

#[derive(Clone, Default)]
pub struct MemoryBrowser {
    inner: Arc<Mutex<Tab>>,
}

impl MemoryBrowser {
    /// A browser on about:blank
    pub fn new() -> Self {
        let browser = Self::default();
        browser.lock().url = "about:blank".to_string();
        browser
    }

    pub fn page(self, url: &str, page: Page) -> Self {
        self.lock().pages.insert(url.to_string(), page);
        self
    }

    pub fn at(self, url: &str) -> Self {
        self.lock().url = url.to_string();
        self
    }

    /// Fail the next `n` clicks
    pub fn failing_clicks(self, n: usize) -> Self {
        self.lock().failing_clicks = n;
        self
    }

    pub fn url(&self) -> String {
        self.lock().url.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.lock().navigations.clone()
    }

    /// Selectors of successful clicks
    pub fn clicks(&self) -> Vec<String> {
        self.lock().clicks.clone()
    }

    pub fn click_attempts(&self) -> usize {
        self.lock().click_attempts
    }

    fn lock(&self) -> MutexGuard<'_, Tab> {
        self.inner.lock().unwrap()
    }
}

#[async_trait]
impl BrowserDriver for MemoryBrowser {
    async fn navigate(&self, url: &str) -> Result<()> {
        let mut tab = self.lock();
        if !tab.pages.contains_key(url) {
            return Err(SightlineError::browser(format!(
                "net::ERR_NAME_NOT_RESOLVED at {}",
                url
            )));
        }
        tab.url = url.to_string();
        tab.navigations.push(url.to_string());
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.lock().url.clone())
    }

    async fn title(&self) -> Result<String> {
        let tab = self.lock();
        Ok(tab
            .pages
            .get(&tab.url)
            .map(|p| p.title.clone())
            .unwrap_or_default())
    }

    async fn execute_script(&self, script: &str, args: &[Value]) -> Result<Value> {
        let tab = self.lock();
        let page = tab.pages.get(&tab.url).cloned().unwrap_or_default();

        if script == Probe::ClickCandidates.script() {
            let target = args
                .first()
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_lowercase();
            let matches: Vec<&ElementHandle> = page
                .clickable
                .iter()
                .filter(|e| e.text.to_lowercase().contains(&target))
                .collect();
            return Ok(serde_json::to_value(matches)?);
        }

        let canned = page
            .probes
            .iter()
            .find(|(probe, _)| probe.script() == script)
            .map(|(_, value)| value.clone());
        Ok(match canned {
            Some(value) => value,
            None if script == Probe::Summary.script() => {
                json!({ "url": tab.url, "title": page.title })
            }
            None if script == Probe::Sections.script() => json!({}),
            None => json!([]),
        })
    }

    async fn find(&self, selector: &str) -> Result<Vec<ElementHandle>> {
        let tab = self.lock();
        Ok(tab
            .pages
            .get(&tab.url)
            .map(|p| {
                p.clickable
                    .iter()
                    .filter(|e| e.selector == selector)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn scroll_into_view(&self, _element: &ElementHandle) -> Result<()> {
        Ok(())
    }

    async fn click(&self, element: &ElementHandle) -> Result<()> {
        let mut tab = self.lock();
        tab.click_attempts += 1;
        if tab.failing_clicks > 0 {
            tab.failing_clicks -= 1;
            return Err(SightlineError::browser(format!(
                "element {} is not interactable",
                element.selector
            )));
        }
        tab.clicks.push(element.selector.clone());
        Ok(())
    }

    async fn page_source(&self) -> Result<String> {
        Ok(String::new())
    }

    async fn wait_for_load(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Configuration without waits
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.browser.load_timeout_ms = 0;
    config.browser.settle_timeout_ms = 0;
    config
}

pub fn agent(oracle: &ScriptedOracle, browser: &MemoryBrowser) -> Agent {
    agent_with(test_config(), oracle, browser)
}

pub fn agent_with(config: Config, oracle: &ScriptedOracle, browser: &MemoryBrowser) -> Agent {
    Agent::new(config, Arc::new(oracle.clone()), Arc::new(browser.clone()))
        .expect("default registry")
}
