//! Navigation handlers: opening addresses and listed headlines

use async_trait::async_trait;
use tracing::{debug, info};
use url::Url;

use crate::actions::handler::{ordinal, probe_page, settle, ActionContext, ActionHandler, ActionOutcome};
use crate::agent::session::{FocusCursor, StateDelta};
use crate::browser::document::truncate_chars;
use crate::core::{ContentCategory, PageType, Result};

/// Normalise a user-supplied address into an absolute http(s) URL
pub fn normalize_url(input: &str) -> Option<Url> {
    let input = input.trim().trim_end_matches(['.', ',']);
    if input.is_empty() || input.contains(char::is_whitespace) {
        return None;
    }
    let candidate = if input.contains("://") {
        input.to_string()
    } else {
        format!("https://{}", input)
    };
    let url = Url::parse(&candidate).ok()?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some_and(|h| !h.is_empty()) => Some(url),
        _ => None,
    }
}

/// Open a URL
pub struct Navigate;

#[async_trait]
impl ActionHandler for Navigate {
    fn name(&self) -> &'static str {
        "navigate"
    }

    async fn invoke(&self, ctx: ActionContext<'_>) -> Result<ActionOutcome> {
        let Some(url) = normalize_url(ctx.target()) else {
            return Ok(ActionOutcome::failure(format!(
                "'{}' is not a valid web address",
                ctx.target()
            )));
        };

        info!(%url, "navigating");
        let driver = ctx.driver();
        driver.navigate(url.as_str()).await?;
        settle(driver, ctx.timing.load).await;

        let page = probe_page(driver).await?;
        let title = if page.title.is_empty() {
            page.url.clone()
        } else {
            page.title.clone()
        };

        Ok(ActionOutcome::reply(format!("Navigated to {}", title))
            .with_update(StateDelta::ElementContext(None))
            .with_update(StateDelta::Focus(FocusCursor::default()))
            .with_update(StateDelta::Headlines(Vec::new()))
            .with_update(StateDelta::PageContext(page)))
    }
}

/// Open one of the listed headlines by number
pub struct GotoHeadline;

#[async_trait]
impl ActionHandler for GotoHeadline {
    fn name(&self) -> &'static str {
        "goto_headline"
    }

    async fn invoke(&self, ctx: ActionContext<'_>) -> Result<ActionOutcome> {
        let headlines = ctx.session.headlines();
        if headlines.is_empty() {
            return Ok(ActionOutcome::failure(
                "No headlines have been listed yet. Try 'list headlines' first.",
            ));
        }

        let Some(number) = ordinal(ctx.target()).filter(|n| (1..=headlines.len()).contains(n))
        else {
            return Ok(ActionOutcome::failure(format!(
                "Please give a headline number between 1 and {}",
                headlines.len()
            )));
        };

        let headline = &headlines[number - 1];
        let Some(link) = headline.url.as_deref() else {
            return Ok(ActionOutcome::failure(format!(
                "Headline {} has no link to follow",
                number
            )));
        };

        debug!(number, link, "opening headline");
        let driver = ctx.driver();
        driver.navigate(link).await?;
        settle(driver, ctx.timing.load).await;

        let mut page = probe_page(driver).await?;
        page.page_type = PageType::Article;
        page.category = ContentCategory::Article;

        let mut reply = format!("Opened headline {}: {}", number, headline.text);
        if let Some(summary) = &headline.summary {
            reply.push_str(&format!("\n{}", truncate_chars(summary, 200)));
        }

        Ok(ActionOutcome::reply(reply)
            .with_update(StateDelta::ElementContext(None))
            .with_update(StateDelta::PageContext(page)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::fake::{run, session, session_with, FakeBrowser, FakePage};
    use crate::browser::{Headline, Probe};
    use serde_json::json;

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url("example.com").unwrap().as_str(),
            "https://example.com/"
        );
        assert_eq!(
            normalize_url("http://example.com/a").unwrap().as_str(),
            "http://example.com/a"
        );
        assert!(normalize_url("").is_none());
        assert!(normalize_url("not a url").is_none());
        assert!(normalize_url("ftp://example.com").is_none());
    }

    #[tokio::test]
    async fn test_navigate_supersedes_page_context() {
        let browser = FakeBrowser::new().page(
            "https://example.com/",
            FakePage::new("Example Domain").with(
                Probe::Summary,
                json!({
                    "url": "https://example.com/",
                    "title": "Example Domain",
                    "landmarkTags": ["main", "nav"],
                }),
            ),
        );
        let state = session(&browser);

        let outcome = run(&Navigate, &state, "example.com").await.unwrap();

        assert!(outcome.is_success());
        assert_eq!(outcome.messages, vec!["Navigated to Example Domain"]);
        assert_eq!(browser.navigations(), vec!["https://example.com/"]);
        let page = outcome
            .state_updates
            .iter()
            .find_map(|d| match d {
                StateDelta::PageContext(p) => Some(p),
                _ => None,
            })
            .unwrap();
        assert!(page.has_main && page.has_nav);
        assert_eq!(page.page_type, PageType::Unknown);
    }

    #[tokio::test]
    async fn test_navigate_rejects_garbage() {
        let browser = FakeBrowser::new();
        let outcome = run(&Navigate, &session(&browser), "the moon please")
            .await
            .unwrap();
        assert!(!outcome.is_success());
        assert!(browser.navigations().is_empty());
    }

    #[tokio::test]
    async fn test_navigate_driver_error_propagates() {
        let browser = FakeBrowser::new();
        assert!(run(&Navigate, &session(&browser), "unreachable.test")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_goto_headline() {
        let browser = FakeBrowser::new()
            .page("https://news.test/story", FakePage::new("Story"))
            .at("https://news.test/");
        let headline = Headline {
            text: "Markets rally after rate decision".into(),
            url: Some("https://news.test/story".into()),
            timestamp: None,
            category: None,
            summary: None,
        };
        let state = session_with(&browser, vec![StateDelta::Headlines(vec![headline])]);

        let outcome = run(&GotoHeadline, &state, "headline 1").await.unwrap();
        assert!(outcome.is_success());
        assert_eq!(browser.navigations(), vec!["https://news.test/story"]);

        let out_of_range = run(&GotoHeadline, &state, "4").await.unwrap();
        assert!(!out_of_range.is_success());
    }

    #[tokio::test]
    async fn test_goto_headline_without_list() {
        let browser = FakeBrowser::new();
        let outcome = run(&GotoHeadline, &session(&browser), "1").await.unwrap();
        assert!(outcome.error.unwrap().contains("list headlines"));
    }
}
