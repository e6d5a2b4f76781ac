//! Action registry - maps action names to handlers
//!
//! One canonical registry per agent. Registering a second handler under a
//! name that is already taken is an error.

use std::collections::HashMap;
use std::sync::Arc;

use crate::actions::analysis::{AnalyzeContent, AnalyzeStructure, HandleDynamicContent};
use crate::actions::handler::ActionHandler;
use crate::actions::interaction::{CheckElement, ClickElement, FindText, StepFocus};
use crate::actions::landmarks::{GotoLandmark, ListLandmarks};
use crate::actions::navigation::{GotoHeadline, Navigate};
use crate::actions::reading::{ListHeadings, ListHeadlines, ReadPage, ReadSection};
use crate::core::{Result, SightlineError};

/// Registry of action handlers
#[derive(Default)]
pub struct ActionRegistry {
    handlers: HashMap<&'static str, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in handler
    pub fn with_defaults() -> Result<Self> {
        let mut registry = Self::new();
        let handlers: Vec<Arc<dyn ActionHandler>> = vec![
            Arc::new(Navigate),
            Arc::new(GotoHeadline),
            Arc::new(ReadPage),
            Arc::new(ListHeadings),
            Arc::new(ListHeadlines),
            Arc::new(ReadSection),
            Arc::new(ClickElement),
            Arc::new(CheckElement),
            Arc::new(FindText),
            Arc::new(StepFocus::next()),
            Arc::new(StepFocus::previous()),
            Arc::new(ListLandmarks),
            Arc::new(GotoLandmark),
            Arc::new(AnalyzeContent),
            Arc::new(AnalyzeStructure),
            Arc::new(HandleDynamicContent),
        ];
        for handler in handlers {
            registry.register(handler)?;
        }
        Ok(registry)
    }

    /// Register a handler under its own name
    pub fn register(&mut self, handler: Arc<dyn ActionHandler>) -> Result<()> {
        let name = handler.name();
        if self.handlers.contains_key(name) {
            return Err(SightlineError::registry(format!(
                "action '{}' is already registered",
                name
            )));
        }
        self.handlers.insert(name, handler);
        Ok(())
    }

    /// Look up the handler for an action name
    pub fn get(&self, name: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
