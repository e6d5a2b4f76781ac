//! Reading handlers: page content, headings, headlines and sections

use async_trait::async_trait;

use crate::actions::handler::{ordinal, ActionContext, ActionHandler, ActionOutcome};
use crate::agent::session::StateDelta;
use crate::browser::document::{
    filter_headlines, heading_outline, run_probe, truncate_chars, HeadingNode, HeadlineCandidate,
    PageSections, Section,
};
use crate::browser::{ElementHandle, Headline, Probe};
use crate::core::Result;

const READ_LIMIT: usize = 1000;
const MAX_LISTED_SECTIONS: usize = 10;

/// Read the main content of the page
pub struct ReadPage;

#[async_trait]
impl ActionHandler for ReadPage {
    fn name(&self) -> &'static str {
        "read_page"
    }

    async fn invoke(&self, ctx: ActionContext<'_>) -> Result<ActionOutcome> {
        let page: PageSections = run_probe(ctx.driver(), Probe::Sections, &[]).await?;
        if page.main_text.trim().is_empty() {
            return Ok(ActionOutcome::failure("The page has no readable content"));
        }

        let mut reply = String::new();
        if !page.title.is_empty() {
            reply.push_str(&format!("Title: {}\n\n", page.title));
        }
        reply.push_str(&truncate_chars(&page.main_text, READ_LIMIT));
        if !page.sections.is_empty() {
            reply.push_str("\n\nSections:\n");
            reply.push_str(&section_list(&page.sections));
        }
        Ok(ActionOutcome::reply(reply))
    }
}

/// Outline of the page's h1-h6 headings
pub struct ListHeadings;

#[async_trait]
impl ActionHandler for ListHeadings {
    fn name(&self) -> &'static str {
        "list_headings"
    }

    async fn invoke(&self, ctx: ActionContext<'_>) -> Result<ActionOutcome> {
        let headings: Vec<HeadingNode> = run_probe(ctx.driver(), Probe::Headings, &[]).await?;
        if headings.is_empty() {
            return Ok(ActionOutcome::reply("No headings found on this page."));
        }
        Ok(ActionOutcome::reply(format!(
            "Headings:\n{}",
            heading_outline(&headings)
        )))
    }
}

/// Collect the page's headlines, keeping them for `goto_headline`
pub struct ListHeadlines;

/// Probe and filter the headlines on the current page
pub async fn collect_headlines(ctx: &ActionContext<'_>) -> Result<Vec<Headline>> {
    let candidates: Vec<HeadlineCandidate> =
        run_probe(ctx.driver(), Probe::HeadlineCandidates, &[]).await?;
    let base = if ctx.page().url.is_empty() {
        ctx.driver().current_url().await?
    } else {
        ctx.page().url.clone()
    };
    Ok(filter_headlines(candidates, &base))
}

pub fn format_headlines(headlines: &[Headline]) -> String {
    let mut out = String::from("Headlines:");
    for (i, headline) in headlines.iter().enumerate() {
        out.push_str(&format!("\n{}. {}", i + 1, headline.text));
        if let Some(category) = &headline.category {
            out.push_str(&format!(" [{}]", category));
        }
        if let Some(timestamp) = &headline.timestamp {
            out.push_str(&format!(" ({})", timestamp));
        }
        if let Some(summary) = &headline.summary {
            out.push_str(&format!("\n   {}", truncate_chars(summary, 150)));
        }
    }
    out
}

#[async_trait]
impl ActionHandler for ListHeadlines {
    fn name(&self) -> &'static str {
        "list_headlines"
    }

    async fn invoke(&self, ctx: ActionContext<'_>) -> Result<ActionOutcome> {
        let headlines = collect_headlines(&ctx).await?;
        if headlines.is_empty() {
            return Ok(ActionOutcome::failure("No headlines found on this page"));
        }
        let reply = format_headlines(&headlines);
        Ok(ActionOutcome::reply(reply).with_update(StateDelta::Headlines(headlines)))
    }
}

/// Read one section by number or title, or the one around the cursor
pub struct ReadSection;

fn section_list(sections: &[Section]) -> String {
    let mut lines: Vec<String> = sections
        .iter()
        .take(MAX_LISTED_SECTIONS)
        .enumerate()
        .map(|(i, s)| format!("{}. {}", i + 1, s.title))
        .collect();
    if sections.len() > MAX_LISTED_SECTIONS {
        lines.push(format!("... and {} more", sections.len() - MAX_LISTED_SECTIONS));
    }
    lines.join("\n")
}

fn pick_section<'s>(ctx: &ActionContext<'_>, sections: &'s [Section]) -> Option<&'s Section> {
    let target = ctx.target();
    if let Some(n) = ordinal(target) {
        return n.checked_sub(1).and_then(|i| sections.get(i));
    }
    if !target.is_empty() {
        let target = target.to_lowercase();
        return sections
            .iter()
            .find(|s| s.title.to_lowercase().contains(&target));
    }

    // the section containing whatever the cursor last landed on
    let anchor = ctx
        .session
        .element_context()
        .or(ctx.session.last_found())
        .map(|e| e.text.trim().to_lowercase())
        .filter(|t| !t.is_empty())?;
    sections.iter().find(|s| {
        s.title.to_lowercase().contains(&anchor) || s.content.to_lowercase().contains(&anchor)
    })
}

#[async_trait]
impl ActionHandler for ReadSection {
    fn name(&self) -> &'static str {
        "read_section"
    }

    async fn invoke(&self, ctx: ActionContext<'_>) -> Result<ActionOutcome> {
        let page: PageSections = run_probe(ctx.driver(), Probe::Sections, &[]).await?;
        if page.sections.is_empty() {
            return Ok(ActionOutcome::failure("This page has no sections"));
        }

        match pick_section(&ctx, &page.sections) {
            Some(section) => {
                let handle = ElementHandle {
                    selector: section.selector.clone(),
                    ..Default::default()
                };
                if !section.selector.is_empty() {
                    ctx.driver().scroll_into_view(&handle).await?;
                }
                let body = if section.content.is_empty() {
                    "(no text)".to_string()
                } else {
                    truncate_chars(&section.content, READ_LIMIT)
                };
                Ok(ActionOutcome::reply(format!("{}\n\n{}", section.title, body)))
            }
            None if ctx.target().is_empty() => Ok(ActionOutcome::reply(format!(
                "Sections:\n{}\nSay 'read section' with a number to hear one.",
                section_list(&page.sections)
            ))),
            None => Ok(ActionOutcome::failure(format!(
                "No section matches '{}'",
                ctx.target()
            ))),
        }
    }
}

/// Words in the main text, used by content analysis
pub fn word_count(page: &PageSections) -> usize {
    page.main_text.split_whitespace().count()
}
