//! Shared types used across Sightline modules
//!
//! Contains conversation messages and the page/element models that flow
//! between the analyzer, predictor, planner and action handlers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender (user, assistant, system)
    pub role: String,
    /// Content of the message
    pub content: String,
}

impl Message {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }
}

/// Semantic page type as classified by the oracle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageType {
    News,
    Article,
    Search,
    Form,
    Social,
    Application,
    #[default]
    Unknown,
}

impl PageType {
    /// Lenient parse of an oracle label; anything unrecognised is `Unknown`
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "news" => Self::News,
            "article" | "blog" => Self::Article,
            "search" => Self::Search,
            "form" => Self::Form,
            "social" => Self::Social,
            "application" | "app" => Self::Application,
            _ => Self::Unknown,
        }
    }

    pub fn is_known(&self) -> bool {
        *self != Self::Unknown
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::News => "news",
            Self::Article => "article",
            Self::Search => "search",
            Self::Form => "form",
            Self::Social => "social",
            Self::Application => "application",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", label)
    }
}

/// Content category the interaction predictor keys its rules on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentCategory {
    Ecommerce,
    Documentation,
    Social,
    Application,
    News,
    Article,
    Form,
    #[default]
    General,
}

impl ContentCategory {
    /// Lenient parse of an oracle label
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "ecommerce" | "e-commerce" | "shop" | "shopping" => Some(Self::Ecommerce),
            "documentation" | "docs" => Some(Self::Documentation),
            "social" => Some(Self::Social),
            "application" | "app" => Some(Self::Application),
            "news" => Some(Self::News),
            "article" | "blog" => Some(Self::Article),
            "form" => Some(Self::Form),
            "general" | "other" => Some(Self::General),
            _ => None,
        }
    }
}

impl From<PageType> for ContentCategory {
    fn from(page_type: PageType) -> Self {
        match page_type {
            PageType::News => Self::News,
            PageType::Article => Self::Article,
            PageType::Form => Self::Form,
            PageType::Social => Self::Social,
            PageType::Application => Self::Application,
            PageType::Search | PageType::Unknown => Self::General,
        }
    }
}

/// Category-specific structure spotted on the page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageSignals {
    pub products: bool,
    pub cart: bool,
    pub code_samples: bool,
    pub posts: bool,
    pub dashboard: bool,
}

/// Structured description of the current document
///
/// Values are superseded as a whole after navigation or content mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageContext {
    pub url: String,
    pub title: String,
    pub page_type: PageType,
    pub category: ContentCategory,
    pub has_main: bool,
    pub has_nav: bool,
    pub has_article: bool,
    pub has_headlines: bool,
    pub has_forms: bool,
    pub dynamic_content: bool,
    pub scroll_position: f64,
    pub viewport_height: i64,
    pub total_height: i64,
    /// Heuristic score from 0 to 100
    pub accessibility_score: u8,
    pub signals: PageSignals,
    pub reasoning: String,
}

impl Default for PageContext {
    fn default() -> Self {
        Self {
            url: String::new(),
            title: String::new(),
            page_type: PageType::Unknown,
            category: ContentCategory::General,
            has_main: false,
            has_nav: false,
            has_article: false,
            has_headlines: false,
            has_forms: false,
            dynamic_content: false,
            scroll_position: 0.0,
            viewport_height: 0,
            total_height: 0,
            accessibility_score: 100,
            signals: PageSignals::default(),
            reasoning: String::new(),
        }
    }
}

impl PageContext {
    /// Short one-line summary used in oracle prompts and status output
    pub fn summary(&self) -> String {
        format!(
            "type={} category={:?} main={} nav={} article={} headlines={} forms={} dynamic={} a11y={}",
            self.page_type,
            self.category,
            self.has_main,
            self.has_nav,
            self.has_article,
            self.has_headlines,
            self.has_forms,
            self.dynamic_content,
            self.accessibility_score
        )
    }
}

/// An element the session is focused on
///
/// Cleared on navigation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementContext {
    pub tag: String,
    pub role: String,
    pub text: String,
    pub is_clickable: bool,
    pub is_visible: bool,
    pub location: (f64, f64),
    pub attributes: BTreeMap<String, String>,
    /// Selector the driver can use to address the element again
    pub selector: String,
}

impl ElementContext {
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Human readable description, e.g. `link "Sign in"`
    pub fn describe(&self) -> String {
        let kind = if self.role.is_empty() {
            self.tag.as_str()
        } else {
            self.role.as_str()
        };
        let text: String = self.text.chars().take(80).collect();
        if text.is_empty() {
            kind.to_string()
        } else {
            format!("{} \"{}\"", kind, text)
        }
    }
}

/// Predicted side-effects of acting on the page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionPrediction {
    pub needs_scroll: bool,
    pub needs_click: bool,
    pub needs_wait: bool,
    pub potential_popups: bool,
    pub confidence: f32,
    pub reasoning: Vec<String>,
}
