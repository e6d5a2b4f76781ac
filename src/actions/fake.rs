//! In-memory browser used by handler tests

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::actions::handler::{ActionContext, ActionOutcome, ActionHandler, Timing};
use crate::agent::session::{SessionState, StateDelta};
use crate::agent::task::{Task, TaskId};
use crate::browser::{BrowserDriver, DriverHandle, ElementHandle, Probe};
use crate::core::{ActionPrediction, Result, SightlineError};

/// One page the fake browser can show
#[derive(Clone, Default)]
pub struct FakePage {
    pub title: String,
    pub probes: Vec<(Probe, Value)>,
    pub focusable: Vec<ElementHandle>,
}

impl FakePage {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Default::default()
        }
    }

    pub fn with(mut self, probe: Probe, value: Value) -> Self {
        self.probes.push((probe, value));
        self
    }

    pub fn with_focusable(mut self, elements: Vec<ElementHandle>) -> Self {
        self.focusable = elements;
        self
    }
}

#[derive(Default)]
struct Browser {
    url: String,
    pages: HashMap<String, FakePage>,
    /// Where clicking a selector leads
    links: HashMap<String, String>,
    navigations: Vec<String>,
    clicks: Vec<String>,
    scrolls: Vec<String>,
    fail_clicks: bool,
}

#[derive(Clone, Default)]
pub struct FakeBrowser {
    inner: Arc<Mutex<Browser>>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: &str, page: FakePage) -> Self {
        self.lock().pages.insert(url.to_string(), page);
        self
    }

    pub fn link(self, selector: &str, url: &str) -> Self {
        self.lock().links.insert(selector.to_string(), url.to_string());
        self
    }

    pub fn at(self, url: &str) -> Self {
        self.lock().url = url.to_string();
        self
    }

    pub fn failing_clicks(self) -> Self {
        self.lock().fail_clicks = true;
        self
    }

    pub fn navigations(&self) -> Vec<String> {
        self.lock().navigations.clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.lock().clicks.clone()
    }

    pub fn scrolls(&self) -> Vec<String> {
        self.lock().scrolls.clone()
    }

    pub fn handle(&self) -> DriverHandle {
        DriverHandle::new(Arc::new(self.clone()))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Browser> {
        self.inner.lock().unwrap()
    }
}

#[async_trait]
impl BrowserDriver for FakeBrowser {
    async fn navigate(&self, url: &str) -> Result<()> {
        let mut browser = self.lock();
        if !browser.pages.contains_key(url) {
            return Err(SightlineError::browser(format!("net::ERR_NAME_NOT_RESOLVED {}", url)));
        }
        browser.url = url.to_string();
        browser.navigations.push(url.to_string());
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.lock().url.clone())
    }

    async fn title(&self) -> Result<String> {
        let browser = self.lock();
        Ok(browser
            .pages
            .get(&browser.url)
            .map(|p| p.title.clone())
            .unwrap_or_default())
    }

    async fn execute_script(&self, script: &str, _args: &[Value]) -> Result<Value> {
        let browser = self.lock();
        let page = browser.pages.get(&browser.url).cloned().unwrap_or_default();
        let found = page
            .probes
            .iter()
            .find(|(probe, _)| probe.script() == script)
            .map(|(_, value)| value.clone());
        Ok(match found {
            Some(value) => value,
            None if script == Probe::Summary.script() => {
                json!({ "url": browser.url, "title": page.title })
            }
            None if script == Probe::Sections.script() => json!({}),
            None => json!([]),
        })
    }

    async fn find(&self, selector: &str) -> Result<Vec<ElementHandle>> {
        let browser = self.lock();
        let focusable = browser
            .pages
            .get(&browser.url)
            .map(|p| p.focusable.clone())
            .unwrap_or_default();
        // a selector list means "everything focusable"
        if selector.contains(", ") {
            return Ok(focusable);
        }
        Ok(focusable
            .into_iter()
            .filter(|e| e.selector == selector)
            .collect())
    }

    async fn scroll_into_view(&self, element: &ElementHandle) -> Result<()> {
        self.lock().scrolls.push(element.selector.clone());
        Ok(())
    }

    async fn click(&self, element: &ElementHandle) -> Result<()> {
        let mut browser = self.lock();
        if browser.fail_clicks {
            return Err(SightlineError::browser("element is not interactable"));
        }
        browser.clicks.push(element.selector.clone());
        if let Some(target) = browser.links.get(&element.selector).cloned() {
            browser.url = target;
        }
        Ok(())
    }

    async fn page_source(&self) -> Result<String> {
        Ok(String::new())
    }

    async fn wait_for_load(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

pub fn session(browser: &FakeBrowser) -> SessionState {
    SessionState::new(browser.handle(), 20)
}

pub fn session_with(browser: &FakeBrowser, deltas: Vec<StateDelta>) -> SessionState {
    let mut state = session(browser);
    state.apply(deltas).unwrap();
    state
}

/// Run a handler for a one-off task against the session
pub async fn run(
    handler: &dyn ActionHandler,
    session: &SessionState,
    context: &str,
) -> Result<ActionOutcome> {
    let task = Task::new(TaskId::new(1, 1), handler.name(), context);
    let prediction = ActionPrediction::default();
    handler
        .invoke(ActionContext {
            session,
            task: &task,
            prediction: &prediction,
            timing: Timing::immediate(),
        })
        .await
}

pub fn element(selector: &str, tag: &str, text: &str) -> ElementHandle {
    ElementHandle {
        selector: selector.to_string(),
        tag: tag.to_string(),
        text: text.to_string(),
        visible: true,
        in_viewport: true,
        ..Default::default()
    }
}
