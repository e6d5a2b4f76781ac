//! Page context analysis
//!
//! A structural probe gives the heuristic flags; one oracle call then names
//! the page type. Oracle failures degrade to the heuristic context with an
//! unknown type.

use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::browser::document::{run_probe, DocumentSummary, Probe};
use crate::browser::BrowserDriver;
use crate::core::{ContentCategory, PageContext, PageType, Result};
use crate::llm::Oracle;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PageVerdict {
    #[serde(rename = "type")]
    page_type: String,
    category: Option<String>,
    has_main: Option<bool>,
    has_nav: Option<bool>,
    has_article: Option<bool>,
    has_headlines: Option<bool>,
    has_forms: Option<bool>,
    reasoning: String,
}

/// Builds [`PageContext`] values for the current document
pub struct PageAnalyzer {
    oracle: Oracle,
}

impl PageAnalyzer {
    pub fn new(oracle: Oracle) -> Self {
        Self { oracle }
    }

    /// Probe the page and classify it
    ///
    /// Fails only when the structural probe itself cannot run.
    #[instrument(skip_all)]
    pub async fn analyze(&self, driver: &dyn BrowserDriver) -> Result<PageContext> {
        let summary: DocumentSummary = run_probe(driver, Probe::Summary, &[]).await?;
        Ok(self.classify(&summary).await)
    }

    /// Combine the heuristic context with the oracle's classification
    pub async fn classify(&self, summary: &DocumentSummary) -> PageContext {
        let heuristic = summary.page_context();
        if is_blank(&heuristic.url) {
            return heuristic;
        }

        let prompt = build_prompt(summary, &heuristic);
        match self.oracle.ask_json::<PageVerdict>(&prompt).await {
            Ok(verdict) => {
                debug!(?verdict, "page verdict");
                merge(heuristic, verdict)
            }
            Err(e) => {
                warn!(error = %e, url = %heuristic.url, "page classification failed, using heuristics");
                heuristic
            }
        }
    }
}

fn is_blank(url: &str) -> bool {
    let url = url.trim();
    url.is_empty() || url == "about:blank"
}

fn merge(heuristic: PageContext, verdict: PageVerdict) -> PageContext {
    let page_type = PageType::from_label(&verdict.page_type);
    let category = verdict
        .category
        .as_deref()
        .and_then(ContentCategory::from_label)
        .or_else(|| page_type.is_known().then(|| ContentCategory::from(page_type)))
        .unwrap_or(heuristic.category);

    PageContext {
        page_type,
        category,
        has_main: verdict.has_main.unwrap_or(heuristic.has_main),
        has_nav: verdict.has_nav.unwrap_or(heuristic.has_nav),
        has_article: verdict.has_article.unwrap_or(heuristic.has_article),
        has_headlines: verdict.has_headlines.unwrap_or(heuristic.has_headlines),
        has_forms: verdict.has_forms.unwrap_or(heuristic.has_forms),
        reasoning: if verdict.reasoning.is_empty() {
            heuristic.reasoning.clone()
        } else {
            verdict.reasoning
        },
        ..heuristic
    }
}

fn build_prompt(summary: &DocumentSummary, heuristic: &PageContext) -> String {
    format!(
        "Classify this web page.\n\n\
         URL: {}\nTitle: {}\n\
         Landmarks: {}\n\
         Articles: {}, headings: {}, headline links: {}, forms: {}\n\
         Products: {}, cart: {}, code blocks: {}, posts: {}, dashboard: {}\n\
         Heuristic guess: {}\n\n\
         Respond with JSON only:\n\
         {{\"type\": \"news|article|search|form|social|application|unknown\", \
         \"category\": \"ecommerce|documentation|social|application|news|article|form|general\", \
         \"has_main\": bool, \"has_nav\": bool, \"has_article\": bool, \
         \"has_headlines\": bool, \"has_forms\": bool, \"reasoning\": \"<one sentence>\"}}",
        summary.url,
        summary.title,
        summary
            .landmark_tags
            .iter()
            .chain(summary.landmark_roles.iter())
            .cloned()
            .collect::<Vec<_>>()
            .join(", "),
        summary.article_count,
        summary.heading_count,
        summary.headline_links,
        summary.form_count,
        summary.product_count,
        summary.cart_present,
        summary.code_block_count,
        summary.post_count,
        summary.dashboard_present,
        heuristic.summary(),
    )
}
