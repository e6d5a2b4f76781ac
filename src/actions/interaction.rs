//! Element interaction: clicking, inspecting, finding text and stepping focus

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use crate::actions::handler::{probe_page, settle, ActionContext, ActionHandler, ActionOutcome};
use crate::agent::predictor;
use crate::agent::session::{FocusCursor, StateDelta};
use crate::browser::document::{run_probe, truncate_chars, FOCUSABLE_SELECTORS};
use crate::browser::{ElementHandle, Probe};
use crate::core::{ElementContext, Result};

/// Click the element best matching a description
pub struct ClickElement;

#[async_trait]
impl ActionHandler for ClickElement {
    fn name(&self) -> &'static str {
        "click_element"
    }

    async fn invoke(&self, ctx: ActionContext<'_>) -> Result<ActionOutcome> {
        let target = ctx.target();
        if target.is_empty() {
            return Ok(ActionOutcome::failure("Tell me what to click"));
        }

        let driver = ctx.driver();
        let candidates: Vec<ElementHandle> =
            run_probe(driver, Probe::ClickCandidates, &[json!(target)]).await?;
        let Some(element) = candidates
            .iter()
            .find(|c| c.visible && c.is_clickable())
            .or_else(|| candidates.first())
        else {
            return Ok(ActionOutcome::failure(format!(
                "Could not find a clickable element matching '{}'",
                target
            )));
        };

        let context = element.to_context();
        let prediction = predictor::predict(ctx.page(), Some(&context));
        debug!(element = %context.describe(), ?prediction, "click target");

        if prediction.needs_scroll || !element.in_viewport {
            driver.scroll_into_view(element).await?;
            tokio::time::sleep(ctx.timing.scroll_pause).await;
        }

        let before = driver.current_url().await?;
        driver.click(element).await?;
        if prediction.needs_wait {
            settle(driver, ctx.timing.settle).await;
        }

        let after = driver.current_url().await?;
        if after != before {
            info!(from = %before, to = %after, "click navigated");
            let page = probe_page(driver).await?;
            let reply = format!("Clicked {}. Now on {}", context.describe(), page.title);
            return Ok(ActionOutcome::reply(reply).with_update(StateDelta::PageContext(page)));
        }

        Ok(ActionOutcome::reply(format!("Clicked {}", context.describe()))
            .with_update(StateDelta::ElementContext(Some(context.clone())))
            .with_update(StateDelta::LastFound(Some(context))))
    }
}

/// Describe the element the session is focused on
pub struct CheckElement;

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

/// Spoken description of an element's state
pub fn describe_element(element: &ElementContext) -> String {
    let mut out = format!(
        "{}. Tag: {}. Clickable: {}. Visible: {}.",
        element.describe(),
        element.tag,
        yes_no(element.is_clickable),
        yes_no(element.is_visible)
    );
    if let Some(href) = element.attributes.get("href") {
        out.push_str(&format!(" Links to {}.", href));
    }
    out
}

#[async_trait]
impl ActionHandler for CheckElement {
    fn name(&self) -> &'static str {
        "check_element"
    }

    async fn invoke(&self, ctx: ActionContext<'_>) -> Result<ActionOutcome> {
        let focused = ctx
            .session
            .focus()
            .index
            .and_then(|i| ctx.session.focus().elements.get(i));
        let Some(current) = ctx
            .session
            .element_context()
            .or(ctx.session.last_found())
            .or(focused)
        else {
            return Ok(ActionOutcome::failure(
                "No element is selected. Use find, click or next first.",
            ));
        };

        // refresh from the live page when the element can still be addressed
        let fresh = if current.selector.is_empty() {
            None
        } else {
            ctx.driver()
                .find(&current.selector)
                .await?
                .first()
                .map(ElementHandle::to_context)
        };

        match fresh {
            Some(element) => Ok(ActionOutcome::reply(describe_element(&element))
                .with_update(StateDelta::ElementContext(Some(element)))),
            None => Ok(ActionOutcome::reply(describe_element(current))),
        }
    }
}

/// Find text on the page and bring the first match into view
pub struct FindText;

#[async_trait]
impl ActionHandler for FindText {
    fn name(&self) -> &'static str {
        "find_text"
    }

    async fn invoke(&self, ctx: ActionContext<'_>) -> Result<ActionOutcome> {
        let query = ctx.target();
        if query.is_empty() {
            return Ok(ActionOutcome::failure("Tell me what text to find"));
        }

        let driver = ctx.driver();
        let matches: Vec<ElementHandle> =
            run_probe(driver, Probe::TextSearch, &[json!(query)]).await?;
        let Some(first) = matches.first() else {
            return Ok(ActionOutcome::failure(format!(
                "Could not find '{}' on this page",
                query
            )));
        };

        driver.scroll_into_view(first).await?;
        let context = first.to_context();
        let reply = format!(
            "Found {} match{} for '{}'. First: {}",
            matches.len(),
            if matches.len() == 1 { "" } else { "es" },
            query,
            truncate_chars(&first.text, 200)
        );

        Ok(ActionOutcome::reply(reply)
            .with_update(StateDelta::LastFound(Some(context.clone())))
            .with_update(StateDelta::ElementContext(Some(context))))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Next,
    Previous,
}

/// Move focus to the next or previous focusable element
pub struct StepFocus {
    direction: Direction,
}

impl StepFocus {
    pub fn next() -> Self {
        Self {
            direction: Direction::Next,
        }
    }

    pub fn previous() -> Self {
        Self {
            direction: Direction::Previous,
        }
    }
}

fn step(index: Option<usize>, len: usize, direction: Direction) -> usize {
    match (index, direction) {
        (None, Direction::Next) => 0,
        (None, Direction::Previous) => len - 1,
        (Some(i), Direction::Next) => (i + 1) % len,
        (Some(i), Direction::Previous) => (i + len - 1) % len,
    }
}

#[async_trait]
impl ActionHandler for StepFocus {
    fn name(&self) -> &'static str {
        match self.direction {
            Direction::Next => "next_element",
            Direction::Previous => "prev_element",
        }
    }

    async fn invoke(&self, ctx: ActionContext<'_>) -> Result<ActionOutcome> {
        let driver = ctx.driver();
        let cursor = ctx.session.focus();

        let (elements, index) = if cursor.elements.is_empty() {
            let found = driver.find(&FOCUSABLE_SELECTORS.join(", ")).await?;
            let elements: Vec<ElementContext> = found
                .iter()
                .filter(|e| e.visible)
                .map(ElementHandle::to_context)
                .collect();
            (elements, None)
        } else {
            (cursor.elements.clone(), cursor.index)
        };

        if elements.is_empty() {
            return Ok(ActionOutcome::failure(
                "There are no focusable elements on this page",
            ));
        }

        let index = step(index.filter(|i| *i < elements.len()), elements.len(), self.direction);
        let element = elements[index].clone();
        driver.scroll_into_view(&ElementHandle::from(&element)).await?;

        let reply = format!("{} of {}: {}", index + 1, elements.len(), element.describe());
        Ok(ActionOutcome::reply(reply)
            .with_update(StateDelta::Focus(FocusCursor {
                elements,
                index: Some(index),
            }))
            .with_update(StateDelta::ElementContext(Some(element))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::fake::{element, run, session, session_with, FakeBrowser, FakePage};

    fn login_page() -> FakeBrowser {
        let mut login = element("#login", "button", "Log in");
        login.in_viewport = false;
        let mut help = element("#help", "a", "Help");
        help.attributes.insert("href".into(), "/help".into());
        FakeBrowser::new()
            .page(
                "https://app.test/",
                FakePage::new("App")
                    .with(
                        Probe::ClickCandidates,
                        serde_json::to_value(vec![login.clone()]).unwrap(),
                    )
                    .with(
                        Probe::TextSearch,
                        serde_json::to_value(vec![help.clone()]).unwrap(),
                    )
                    .with_focusable(vec![login, help]),
            )
            .page("https://app.test/help", FakePage::new("Help"))
            .link("#help", "https://app.test/help")
            .at("https://app.test/")
    }

    #[tokio::test]
    async fn test_click_scrolls_then_clicks() {
        let browser = login_page();
        let outcome = run(&ClickElement, &session(&browser), "log in").await.unwrap();

        assert!(outcome.is_success());
        assert_eq!(browser.scrolls(), vec!["#login"]);
        assert_eq!(browser.clicks(), vec!["#login"]);
        assert_eq!(outcome.output, "Clicked button \"Log in\"");
        let expected = element("#login", "button", "Log in").to_context();
        assert!(outcome
            .state_updates
            .contains(&StateDelta::LastFound(Some(expected))));
    }

    #[tokio::test]
    async fn test_click_failure_is_an_error() {
        let browser = login_page().failing_clicks();
        assert!(run(&ClickElement, &session(&browser), "log in").await.is_err());
    }

    #[tokio::test]
    async fn test_click_without_match() {
        let browser = FakeBrowser::new()
            .page("https://empty.test/", FakePage::new("Empty"))
            .at("https://empty.test/");
        let outcome = run(&ClickElement, &session(&browser), "log in").await.unwrap();
        assert!(!outcome.is_success());
        assert!(browser.clicks().is_empty());
    }

    #[tokio::test]
    async fn test_find_records_last_found() {
        let browser = login_page();
        let outcome = run(&FindText, &session(&browser), "help").await.unwrap();
        assert_eq!(outcome.output, "Found 1 match for 'help'. First: Help");
        assert_eq!(browser.scrolls(), vec!["#help"]);
        assert!(matches!(
            outcome.state_updates.first(),
            Some(StateDelta::LastFound(Some(_)))
        ));
    }

    #[tokio::test]
    async fn test_focus_cycles_both_ways() {
        let browser = login_page();
        let mut state = session(&browser);

        let first = run(&StepFocus::next(), &state, "").await.unwrap();
        assert!(first.output.starts_with("1 of 2"));
        state.apply(first.state_updates).unwrap();

        let second = run(&StepFocus::next(), &state, "").await.unwrap();
        assert!(second.output.starts_with("2 of 2"));
        state.apply(second.state_updates).unwrap();

        let wrapped = run(&StepFocus::next(), &state, "").await.unwrap();
        assert!(wrapped.output.starts_with("1 of 2"));

        let back = run(&StepFocus::previous(), &state, "").await.unwrap();
        assert!(back.output.starts_with("1 of 2"));
        state.apply(back.state_updates).unwrap();
        let back_again = run(&StepFocus::previous(), &state, "").await.unwrap();
        assert!(back_again.output.starts_with("2 of 2"));
    }

    #[tokio::test]
    async fn test_check_element_needs_a_selection() {
        let browser = login_page();
        let outcome = run(&CheckElement, &session(&browser), "").await.unwrap();
        assert!(!outcome.is_success());

        let selected = element("#missing", "a", "Gone");
        let state = session_with(
            &browser,
            vec![StateDelta::ElementContext(Some(selected.to_context()))],
        );
        let outcome = run(&CheckElement, &state, "").await.unwrap();
        assert!(outcome.output.starts_with("a \"Gone\". Tag: a. Clickable: no."));
    }

    #[test]
    fn test_step_wraps() {
        assert_eq!(step(None, 3, Direction::Next), 0);
        assert_eq!(step(None, 3, Direction::Previous), 2);
        assert_eq!(step(Some(2), 3, Direction::Next), 0);
        assert_eq!(step(Some(0), 3, Direction::Previous), 2);
    }
}
