//! Element handles returned by driver queries
//!
//! A handle is a plain description of a DOM element plus a selector that
//! addresses it again. Handles go stale on navigation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::ElementContext;

/// An element located by the browser driver
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ElementHandle {
    /// Selector addressing exactly this element
    pub selector: String,
    /// Lowercase tag name
    pub tag: String,
    /// Explicit ARIA role, empty when absent
    pub role: String,
    /// Visible text or accessible name
    pub text: String,
    pub visible: bool,
    pub in_viewport: bool,
    pub x: f64,
    pub y: f64,
    pub attributes: BTreeMap<String, String>,
    /// Match quality assigned by candidate searches
    pub score: u8,
}

impl ElementHandle {
    /// Role, falling back to the implicit role of common tags
    pub fn effective_role(&self) -> &str {
        if !self.role.is_empty() {
            return &self.role;
        }
        match self.tag.as_str() {
            "a" if self.attributes.contains_key("href") => "link",
            "button" | "summary" => "button",
            "select" => "combobox",
            "textarea" => "textbox",
            "input" => match self.attributes.get("type").map(String::as_str) {
                Some("checkbox") => "checkbox",
                Some("radio") => "radio",
                Some("submit") | Some("button") | Some("reset") => "button",
                Some("search") => "searchbox",
                _ => "textbox",
            },
            _ => "",
        }
    }

    /// Check if this is an interactive element
    pub fn is_interactive(&self) -> bool {
        matches!(
            self.effective_role(),
            "button"
                | "link"
                | "textbox"
                | "checkbox"
                | "radio"
                | "combobox"
                | "menuitem"
                | "tab"
                | "switch"
                | "searchbox"
        )
    }

    /// Check if this is an input element
    pub fn is_input(&self) -> bool {
        matches!(
            self.effective_role(),
            "textbox" | "searchbox" | "combobox" | "spinbutton"
        )
    }

    /// Check if this is clickable
    pub fn is_clickable(&self) -> bool {
        matches!(
            self.effective_role(),
            "button" | "link" | "menuitem" | "tab" | "checkbox" | "radio" | "switch"
        ) || self.attributes.contains_key("onclick")
    }

    /// Session-owned description of this element
    pub fn to_context(&self) -> ElementContext {
        ElementContext {
            tag: self.tag.clone(),
            role: self.effective_role().to_string(),
            text: self.text.clone(),
            is_clickable: self.is_clickable(),
            is_visible: self.visible,
            location: (self.x, self.y),
            attributes: self.attributes.clone(),
            selector: self.selector.clone(),
        }
    }
}

impl From<&ElementContext> for ElementHandle {
    fn from(context: &ElementContext) -> Self {
        Self {
            selector: context.selector.clone(),
            tag: context.tag.clone(),
            role: context.role.clone(),
            text: context.text.clone(),
            visible: context.is_visible,
            in_viewport: false,
            x: context.location.0,
            y: context.location.1,
            attributes: context.attributes.clone(),
            score: 0,
        }
    }
}
