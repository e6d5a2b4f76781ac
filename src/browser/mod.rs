//! Browser collaborators
//!
//! - [`driver`]: the driver trait and the shared handle stored in the session
//! - [`agent_browser`]: driver implementation over the agent-browser CLI
//! - [`document`]: in-page probes and the structural model built from them
//! - [`element`]: element handles returned by driver queries

pub mod agent_browser;
pub mod document;
pub mod driver;
pub mod element;

pub use agent_browser::AgentBrowserDriver;
pub use document::{DocumentSummary, Headline, Probe};
pub use driver::{BrowserDriver, DriverHandle};
pub use element::ElementHandle;
