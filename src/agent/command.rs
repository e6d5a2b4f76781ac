//! Commands and the action vocabulary
//!
//! The oracle picks actions by their short names (`read`, `click`, ...); the
//! registry knows them by handler names (`read_page`, `click_element`, ...).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed action vocabulary, plus `None` for clarifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Navigate,
    ReadPage,
    ClickElement,
    CheckElement,
    ListHeadings,
    ListHeadlines,
    GotoHeadline,
    FindText,
    NextElement,
    PrevElement,
    ListLandmarks,
    GotoLandmark,
    ReadSection,
    None,
}

impl ActionKind {
    /// Actions the classifier may choose
    pub const VOCABULARY: [ActionKind; 13] = [
        Self::Navigate,
        Self::ReadPage,
        Self::ClickElement,
        Self::CheckElement,
        Self::ListHeadings,
        Self::ListHeadlines,
        Self::GotoHeadline,
        Self::FindText,
        Self::NextElement,
        Self::PrevElement,
        Self::ListLandmarks,
        Self::GotoLandmark,
        Self::ReadSection,
    ];

    /// Name used in oracle prompts
    pub fn oracle_name(&self) -> &'static str {
        match self {
            Self::Navigate => "navigate",
            Self::ReadPage => "read",
            Self::ClickElement => "click",
            Self::CheckElement => "check",
            Self::ListHeadings => "list_headings",
            Self::ListHeadlines => "list_headlines",
            Self::GotoHeadline => "goto_headline",
            Self::FindText => "find",
            Self::NextElement => "next",
            Self::PrevElement => "prev",
            Self::ListLandmarks => "list_landmarks",
            Self::GotoLandmark => "goto",
            Self::ReadSection => "read_section",
            Self::None => "none",
        }
    }

    /// Name the handler is registered under
    pub fn handler_name(&self) -> &'static str {
        match self {
            Self::Navigate => "navigate",
            Self::ReadPage => "read_page",
            Self::ClickElement => "click_element",
            Self::CheckElement => "check_element",
            Self::ListHeadings => "list_headings",
            Self::ListHeadlines => "list_headlines",
            Self::GotoHeadline => "goto_headline",
            Self::FindText => "find_text",
            Self::NextElement => "next_element",
            Self::PrevElement => "prev_element",
            Self::ListLandmarks => "list_landmarks",
            Self::GotoLandmark => "goto_landmark",
            Self::ReadSection => "read_section",
            Self::None => "none",
        }
    }

    /// One-line description for the classification prompt
    pub fn description(&self) -> &'static str {
        match self {
            Self::Navigate => "open a URL; context is the address",
            Self::ReadPage => "read the main content of the current page",
            Self::ClickElement => "click a link or button; context describes it",
            Self::CheckElement => "describe the current element, e.g. whether it is clickable",
            Self::ListHeadings => "list the page's structural headings (h1-h6)",
            Self::ListHeadlines => "list news article headlines on a news site",
            Self::GotoHeadline => "open a listed headline; context is its number",
            Self::FindText => "find text on the page; context is the text",
            Self::NextElement => "move to the next focusable element",
            Self::PrevElement => "move to the previous focusable element",
            Self::ListLandmarks => "list landmark regions (navigation, main, footer, ...)",
            Self::GotoLandmark => "move to a landmark; context names it",
            Self::ReadSection => "read a section; context is its number or empty for the current one",
            Self::None => "no action",
        }
    }

    /// Parse an oracle or handler name; `None` and unknown names are rejected
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        Self::VOCABULARY
            .into_iter()
            .find(|a| a.oracle_name() == name || a.handler_name() == name)
    }

    /// Whether executing this action replaces the current document
    pub fn navigates_away(&self) -> bool {
        matches!(self, Self::Navigate | Self::GotoHeadline)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.handler_name())
    }
}

/// Structured intent produced from one utterance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub action: ActionKind,
    pub confidence: f32,
    pub context: String,
    pub next_action: Option<ActionKind>,
    pub next_context: Option<String>,
}

impl Command {
    pub fn new(action: ActionKind, confidence: f32, context: impl Into<String>) -> Self {
        Self {
            action,
            confidence: confidence.clamp(0.0, 1.0),
            context: context.into(),
            next_action: None,
            next_context: None,
        }
    }

    /// A command asking the user to clarify; `question` is shown verbatim
    pub fn clarification(question: impl Into<String>) -> Self {
        Self::new(ActionKind::None, 0.0, question)
    }

    pub fn is_clarification(&self) -> bool {
        self.action == ActionKind::None
    }

    /// Chain a follow-up action that runs after this one
    pub fn then(mut self, action: ActionKind, context: impl Into<String>) -> Self {
        self.next_action = Some(action);
        self.next_context = Some(context.into());
        self
    }
}
