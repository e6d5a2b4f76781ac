//! Auxiliary analysis tasks added by the planner

use async_trait::async_trait;
use tracing::debug;

use crate::actions::handler::{probe_page, settle, ActionContext, ActionHandler, ActionOutcome};
use crate::actions::reading::{collect_headlines, word_count};
use crate::agent::planner::{ANALYZE_CONTENT, ANALYZE_STRUCTURE, HANDLE_DYNAMIC_CONTENT};
use crate::agent::session::{PageInsights, StateDelta};
use crate::browser::document::{run_probe, HeadingNode, Landmark, PageSections};
use crate::browser::Probe;
use crate::core::Result;

/// Count headlines and article words
pub struct AnalyzeContent;

#[async_trait]
impl ActionHandler for AnalyzeContent {
    fn name(&self) -> &'static str {
        ANALYZE_CONTENT
    }

    async fn invoke(&self, ctx: ActionContext<'_>) -> Result<ActionOutcome> {
        let headlines = collect_headlines(&ctx).await?;
        let sections: PageSections = run_probe(ctx.driver(), Probe::Sections, &[]).await?;

        let insights = PageInsights {
            headline_count: headlines.len(),
            article_words: word_count(&sections),
            section_count: sections.sections.len(),
            ..ctx.session.insights().clone()
        };
        debug!(?insights, "content analysed");

        let mut outcome = ActionOutcome::quiet(format!(
            "{} headlines, {} words in {} sections",
            insights.headline_count, insights.article_words, insights.section_count
        ))
        .with_update(StateDelta::Insights(insights));
        if !headlines.is_empty() {
            outcome = outcome.with_update(StateDelta::Headlines(headlines));
        }
        Ok(outcome)
    }
}

/// Count landmarks and headings
pub struct AnalyzeStructure;

#[async_trait]
impl ActionHandler for AnalyzeStructure {
    fn name(&self) -> &'static str {
        ANALYZE_STRUCTURE
    }

    async fn invoke(&self, ctx: ActionContext<'_>) -> Result<ActionOutcome> {
        let landmarks: Vec<Landmark> = run_probe(ctx.driver(), Probe::Landmarks, &[]).await?;
        let headings: Vec<HeadingNode> = run_probe(ctx.driver(), Probe::Headings, &[]).await?;

        let insights = PageInsights {
            landmark_count: landmarks.len(),
            heading_count: headings.len(),
            ..ctx.session.insights().clone()
        };
        Ok(ActionOutcome::quiet(format!(
            "{} landmarks, {} headings",
            insights.landmark_count, insights.heading_count
        ))
        .with_update(StateDelta::Insights(insights)))
    }
}

/// Let script-rendered content settle, then refresh the page context
pub struct HandleDynamicContent;

#[async_trait]
impl ActionHandler for HandleDynamicContent {
    fn name(&self) -> &'static str {
        HANDLE_DYNAMIC_CONTENT
    }

    async fn invoke(&self, ctx: ActionContext<'_>) -> Result<ActionOutcome> {
        let driver = ctx.driver();
        settle(driver, ctx.timing.settle).await;

        let mut page = probe_page(driver).await?;
        let previous = ctx.page();
        if page.url == previous.url {
            // same document, keep what the analyzer said about it
            page.page_type = previous.page_type;
            page.category = previous.category;
            page.reasoning = previous.reasoning.clone();
        }

        Ok(ActionOutcome::quiet(format!(
            "page settled at {} px of {}",
            page.scroll_position, page.total_height
        ))
        .with_update(StateDelta::PageContext(page)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::fake::{run, session_with, FakeBrowser, FakePage};
    use crate::core::{PageContext, PageType};
    use serde_json::json;

    fn browser() -> FakeBrowser {
        FakeBrowser::new()
            .page(
                "https://news.test/",
                FakePage::new("News")
                    .with(
                        Probe::HeadlineCandidates,
                        json!([{"text": "Council approves new riverside park plan", "href": "/p"}]),
                    )
                    .with(
                        Probe::Sections,
                        json!({"mainText": "one two three four", "sections": [{"title": "Local"}]}),
                    )
                    .with(
                        Probe::Summary,
                        json!({"url": "https://news.test/", "title": "News", "totalHeight": 4000}),
                    )
                    .with(Probe::Landmarks, json!([{"tag": "main"}, {"tag": "nav"}])),
            )
            .at("https://news.test/")
    }

    fn news_context() -> PageContext {
        PageContext {
            url: "https://news.test/".into(),
            page_type: PageType::News,
            reasoning: "front page".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_content_and_structure_insights_accumulate() {
        let browser = browser();
        let mut state = session_with(&browser, vec![StateDelta::PageContext(news_context())]);

        let content = run(&AnalyzeContent, &state, "").await.unwrap();
        assert!(content.messages.is_empty());
        state.apply(content.state_updates).unwrap();
        assert_eq!(state.headlines().len(), 1);

        let structure = run(&AnalyzeStructure, &state, "").await.unwrap();
        state.apply(structure.state_updates).unwrap();

        let insights = state.insights();
        assert_eq!(insights.headline_count, 1);
        assert_eq!(insights.article_words, 4);
        assert_eq!(insights.section_count, 1);
        assert_eq!(insights.landmark_count, 2);
        assert_eq!(insights.heading_count, 0);
    }

    #[tokio::test]
    async fn test_dynamic_content_keeps_classification() {
        let browser = browser();
        let state = session_with(&browser, vec![StateDelta::PageContext(news_context())]);

        let outcome = run(&HandleDynamicContent, &state, "").await.unwrap();
        let Some(StateDelta::PageContext(page)) = outcome.state_updates.first() else {
            panic!("expected a page context update");
        };
        assert_eq!(page.page_type, PageType::News);
        assert_eq!(page.total_height, 4000);
        assert_eq!(page.reasoning, "front page");
    }
}
