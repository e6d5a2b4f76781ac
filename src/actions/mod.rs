//! Actions module - handlers the executor dispatches tasks to
//!
//! Contains the handler trait, the registry, and the built-in handlers for
//! navigation, reading, element interaction, landmarks and page analysis.

pub mod analysis;
pub mod handler;
pub mod interaction;
pub mod landmarks;
pub mod navigation;
pub mod reading;
pub mod registry;

#[cfg(test)]
pub(crate) mod fake;

pub use handler::{ActionContext, ActionHandler, ActionOutcome, Timing};
pub use registry::ActionRegistry;
