//! Browser driver boundary
//!
//! The orchestrator never talks to a browser directly. Everything it needs
//! from one goes through [`BrowserDriver`], so tests can substitute an
//! in-memory page.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::browser::element::ElementHandle;
use crate::core::Result;

/// Remote browser automation collaborator
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Load a URL in the current tab
    async fn navigate(&self, url: &str) -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    async fn title(&self) -> Result<String>;

    /// Evaluate a JavaScript function expression with JSON arguments
    ///
    /// `script` must be a function expression such as `(query) => ...`; its
    /// return value comes back as JSON.
    async fn execute_script(&self, script: &str, args: &[Value]) -> Result<Value>;

    /// Locate elements matching a CSS selector
    async fn find(&self, selector: &str) -> Result<Vec<ElementHandle>>;

    async fn scroll_into_view(&self, element: &ElementHandle) -> Result<()>;

    async fn click(&self, element: &ElementHandle) -> Result<()>;

    /// Serialized HTML of the current document
    async fn page_source(&self) -> Result<String>;

    /// Wait until the page is loaded and the network is idle, bounded by `timeout`
    async fn wait_for_load(&self, timeout: Duration) -> Result<()>;

    /// Release the browser session
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Short name for logs
    fn name(&self) -> &str;
}

/// Shared, opaque handle to the session's driver
#[derive(Clone)]
pub struct DriverHandle(Arc<dyn BrowserDriver>);

impl DriverHandle {
    pub fn new(driver: Arc<dyn BrowserDriver>) -> Self {
        Self(driver)
    }

    pub fn driver(&self) -> &dyn BrowserDriver {
        self.0.as_ref()
    }
}

impl fmt::Debug for DriverHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DriverHandle").field(&self.0.name()).finish()
    }
}
