//! Document model
//!
//! Structural queries run inside the page as small JavaScript probes. Each
//! probe returns plain JSON, and everything that decides what the data means
//! (flags, scores, headline filtering) happens here in Rust.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use url::Url;

use crate::browser::driver::BrowserDriver;
use crate::core::{ContentCategory, PageContext, PageSignals, PageType, Result};

/// ARIA roles treated as landmarks
pub const LANDMARK_ROLES: &[&str] = &[
    "banner",
    "complementary",
    "contentinfo",
    "form",
    "main",
    "navigation",
    "region",
    "search",
];

/// Elements treated as landmarks
pub const LANDMARK_TAGS: &[&str] = &["header", "nav", "main", "aside", "footer", "form", "section"];

/// Elements reachable with next/previous element navigation
pub const FOCUSABLE_SELECTORS: &[&str] = &[
    "a[href]",
    "button",
    "input",
    "select",
    "textarea",
    "[tabindex]:not([tabindex='-1'])",
    "[contenteditable='true']",
    "[role='button']",
    "[role='link']",
    "[role='menuitem']",
];

/// Words that mark a headline candidate as site navigation
const NAV_WORDS: &[&str] = &[
    "menu",
    "navigation",
    "search",
    "subscribe",
    "sign in",
    "log in",
    "section",
];

pub const MIN_HEADLINE_LEN: usize = 20;
pub const MAX_HEADLINES: usize = 15;

// Shared helper that tags an element and describes it as an ElementHandle.
macro_rules! describe_js {
    () => {
        "const __seq = (window.__sightlineSeq = (window.__sightlineSeq || 0) + 1); \
         const describe = (el, i) => { \
           const marker = __seq + '-' + i; \
           el.setAttribute('data-sightline-ref', marker); \
           const rect = el.getBoundingClientRect(); \
           const style = window.getComputedStyle(el); \
           const attributes = {}; \
           for (const name of ['href', 'onclick', 'aria-label', 'title', 'alt', 'type', 'name', 'id', 'tabindex']) { \
             if (el.hasAttribute(name)) attributes[name] = el.getAttribute(name) || ''; \
           } \
           return { \
             selector: '[data-sightline-ref=\"' + marker + '\"]', \
             tag: el.tagName.toLowerCase(), \
             role: el.getAttribute('role') || '', \
             text: (el.innerText || el.value || el.getAttribute('aria-label') || el.getAttribute('alt') || el.getAttribute('title') || '').trim().replace(/\\s+/g, ' ').slice(0, 200), \
             visible: rect.width > 0 && rect.height > 0 && style.visibility !== 'hidden' && style.display !== 'none', \
             inViewport: rect.top >= 0 && rect.bottom <= window.innerHeight, \
             x: rect.left + window.scrollX, \
             y: rect.top + window.scrollY, \
             attributes, \
           }; \
         };"
    };
}

const SUMMARY_JS: &str = "() => { \
  const q = (s) => document.querySelectorAll(s).length; \
  const landmarkTags = ['header', 'nav', 'main', 'aside', 'footer', 'form', 'section'].filter((t) => q(t) > 0); \
  const landmarkRoles = ['banner', 'complementary', 'contentinfo', 'form', 'main', 'navigation', 'region', 'search'].filter((r) => q('[role=\"' + r + '\"]') > 0); \
  const inputs = Array.from(document.querySelectorAll('input:not([type=hidden]), select, textarea')); \
  const unlabeled = inputs.filter((el) => !(el.labels && el.labels.length) && !el.getAttribute('aria-label') && !el.getAttribute('aria-labelledby') && !el.getAttribute('title')).length; \
  const images = Array.from(document.querySelectorAll('img')); \
  const markers = []; \
  if (document.querySelector('[data-reactroot], #__next, #root')) markers.push('react'); \
  if (document.querySelector('[data-v-app], [v-cloak]')) markers.push('vue'); \
  if (document.querySelector('[ng-version], [ng-app]')) markers.push('angular'); \
  if (document.querySelector('[x-data]')) markers.push('alpine'); \
  const sources = Array.from(document.scripts).map((s) => (s.src || '').toLowerCase()); \
  for (const name of ['react', 'vue', 'angular', 'svelte']) { \
    if (!markers.includes(name) && sources.some((s) => s.includes(name))) markers.push(name); \
  } \
  return { \
    url: location.href, \
    title: document.title, \
    lang: document.documentElement.lang || '', \
    landmarkTags, \
    landmarkRoles, \
    articleCount: q('article'), \
    headingCount: q('h1, h2, h3'), \
    headlineLinks: q('h1 a[href], h2 a[href], h3 a[href], article a[href]'), \
    formCount: q('form'), \
    inputCount: inputs.length, \
    unlabeledInputs: unlabeled, \
    imageCount: images.length, \
    imagesMissingAlt: images.filter((img) => !img.hasAttribute('alt')).length, \
    scriptCount: document.scripts.length, \
    frameworkMarkers: markers, \
    lazyElements: q('[loading=\"lazy\"], [data-src], [aria-busy=\"true\"]'), \
    productCount: q('[itemtype*=\"Product\"], [class*=\"product\"]'), \
    cartPresent: q('[class*=\"cart\"], [id*=\"cart\"], a[href*=\"cart\"]') > 0, \
    codeBlockCount: q('pre'), \
    postCount: q('[class*=\"post\"], [data-testid*=\"post\"]'), \
    dashboardPresent: q('[class*=\"dashboard\"], [id*=\"dashboard\"]') > 0, \
    viewportHeight: window.innerHeight, \
    totalHeight: document.documentElement.scrollHeight, \
    scrollPosition: window.scrollY, \
  }; \
}";

const HEADINGS_JS: &str = "() => Array.from(document.querySelectorAll('h1, h2, h3, h4, h5, h6')) \
  .map((h) => ({ level: Number(h.tagName.substring(1)), text: (h.innerText || h.textContent || '').trim().replace(/\\s+/g, ' '), id: h.id || null })) \
  .filter((h) => h.text)";

const HEADLINES_JS: &str = "() => { \
  const out = []; \
  const clean = (t) => (t || '').trim().replace(/\\s+/g, ' '); \
  document.querySelectorAll('article h1, article h2, article h3, h2 a[href], h3 a[href], [class*=\"headline\"]').forEach((el) => { \
    const link = el.matches('a[href]') ? el : (el.querySelector('a[href]') || el.closest('a[href]')); \
    const container = el.closest('article, li, div'); \
    const time = container ? container.querySelector('time') : null; \
    const kicker = container ? container.querySelector('[class*=\"category\"], [class*=\"kicker\"], [class*=\"label\"]') : null; \
    const summary = container ? container.querySelector('p') : null; \
    out.push({ \
      text: clean(el.innerText || el.textContent), \
      href: link ? link.getAttribute('href') : null, \
      timestamp: time ? (time.getAttribute('datetime') || clean(time.innerText)) : null, \
      category: kicker ? clean(kicker.innerText) : null, \
      summary: summary ? clean(summary.innerText).slice(0, 300) : null, \
    }); \
  }); \
  return out.slice(0, 200); \
}";

const LANDMARKS_JS: &str = "() => { \
  const tags = ['header', 'nav', 'main', 'aside', 'footer', 'form', 'section']; \
  const roles = ['banner', 'complementary', 'contentinfo', 'form', 'main', 'navigation', 'region', 'search']; \
  const selector = tags.concat(roles.map((r) => '[role=\"' + r + '\"]')).join(', '); \
  return Array.from(document.querySelectorAll(selector)).map((el, i) => { \
    el.setAttribute('data-sightline-landmark', String(i)); \
    return { \
      tag: el.tagName.toLowerCase(), \
      role: el.getAttribute('role') || '', \
      label: el.getAttribute('aria-label') || '', \
      text: (el.innerText || '').trim().replace(/\\s+/g, ' ').slice(0, 300), \
      selector: '[data-sightline-landmark=\"' + i + '\"]', \
    }; \
  }); \
}";

const SECTIONS_JS: &str = "() => { \
  const root = document.querySelector('main, [role=\"main\"], article') || document.body; \
  const clean = (t) => (t || '').trim().replace(/\\s+/g, ' '); \
  const sections = Array.from(root.querySelectorAll('h1, h2, h3')).map((h, i) => { \
    h.setAttribute('data-sightline-section', String(i)); \
    let text = ''; \
    let node = h.nextElementSibling; \
    while (node && !/^H[1-3]$/.test(node.tagName) && text.length < 2000) { \
      text += ' ' + clean(node.innerText); \
      node = node.nextElementSibling; \
    } \
    return { title: clean(h.innerText), content: clean(text), selector: '[data-sightline-section=\"' + i + '\"]' }; \
  }); \
  return { title: document.title, mainText: clean(root.innerText).slice(0, 5000), fromMain: root !== document.body, sections }; \
}";

const FIND_JS: &str = concat!(
    "(selector) => { ",
    describe_js!(),
    " return Array.from(document.querySelectorAll(selector)).slice(0, 200).map((el, i) => describe(el, i)); }"
);

const TEXT_SEARCH_JS: &str = concat!(
    "(query) => { ",
    describe_js!(),
    " const needle = String(query).trim().toLowerCase(); \
      if (!needle) return []; \
      const pool = Array.from(document.querySelectorAll('p, li, h1, h2, h3, h4, h5, h6, td, dt, dd, blockquote, figcaption, label, a, button')); \
      return pool.filter((el) => (el.innerText || '').toLowerCase().includes(needle)) \
        .filter((el, _, all) => !all.some((other) => other !== el && el.contains(other))) \
        .slice(0, 10).map((el, i) => describe(el, i)); }"
);

const CLICK_CANDIDATES_JS: &str = concat!(
    "(query) => { ",
    describe_js!(),
    " const needle = String(query).trim().toLowerCase(); \
      if (!needle) return []; \
      const pool = Array.from(document.querySelectorAll('a[href], button, input[type=submit], input[type=button], [role=button], [role=link], [role=menuitem], [role=tab], [onclick], summary')); \
      const scored = []; \
      for (const el of pool) { \
        const text = (el.innerText || el.value || '').trim().toLowerCase(); \
        const aria = (el.getAttribute('aria-label') || '').toLowerCase(); \
        const title = (el.getAttribute('title') || '').toLowerCase(); \
        const img = el.querySelector('img[alt]'); \
        const alt = img ? img.getAttribute('alt').toLowerCase() : ''; \
        let score = 0; \
        if (text === needle) score = 5; \
        else if (aria === needle) score = 4; \
        else if (title === needle || alt === needle) score = 3; \
        else if (text.includes(needle)) score = 2; \
        else if (aria.includes(needle) || title.includes(needle) || alt.includes(needle)) score = 1; \
        if (score > 0) scored.push([score, el]); \
      } \
      scored.sort((a, b) => b[0] - a[0]); \
      return scored.slice(0, 10).map(([score, el], i) => Object.assign(describe(el, i), { score })); }"
);

/// In-page queries understood by the document model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// Structural overview feeding the page context
    Summary,
    Headings,
    HeadlineCandidates,
    Landmarks,
    Sections,
    /// Elements containing text; takes the query as argument
    TextSearch,
    /// Ranked clickable elements; takes the description as argument
    ClickCandidates,
}

impl Probe {
    pub fn script(&self) -> &'static str {
        match self {
            Self::Summary => SUMMARY_JS,
            Self::Headings => HEADINGS_JS,
            Self::HeadlineCandidates => HEADLINES_JS,
            Self::Landmarks => LANDMARKS_JS,
            Self::Sections => SECTIONS_JS,
            Self::TextSearch => TEXT_SEARCH_JS,
            Self::ClickCandidates => CLICK_CANDIDATES_JS,
        }
    }
}

/// Script used by drivers that implement `find` through script evaluation
pub fn find_script() -> &'static str {
    FIND_JS
}

/// Run a probe and deserialize its result
pub async fn run_probe<T: DeserializeOwned>(
    driver: &dyn BrowserDriver,
    probe: Probe,
    args: &[Value],
) -> Result<T> {
    let value = driver.execute_script(probe.script(), args).await?;
    Ok(serde_json::from_value(value)?)
}

/// Structural overview of a document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentSummary {
    pub url: String,
    pub title: String,
    pub lang: String,
    pub landmark_tags: Vec<String>,
    pub landmark_roles: Vec<String>,
    pub article_count: usize,
    /// h1 to h3 only
    pub heading_count: usize,
    pub headline_links: usize,
    pub form_count: usize,
    pub input_count: usize,
    pub unlabeled_inputs: usize,
    pub image_count: usize,
    pub images_missing_alt: usize,
    pub script_count: usize,
    pub framework_markers: Vec<String>,
    pub lazy_elements: usize,
    pub product_count: usize,
    pub cart_present: bool,
    pub code_block_count: usize,
    pub post_count: usize,
    pub dashboard_present: bool,
    pub viewport_height: i64,
    pub total_height: i64,
    pub scroll_position: f64,
}

impl DocumentSummary {
    fn has_landmark(&self, tag: &str, role: &str) -> bool {
        self.landmark_tags.iter().any(|t| t == tag) || self.landmark_roles.iter().any(|r| r == role)
    }

    pub fn has_main(&self) -> bool {
        self.has_landmark("main", "main")
    }

    pub fn has_nav(&self) -> bool {
        self.has_landmark("nav", "navigation")
    }

    pub fn has_article(&self) -> bool {
        self.article_count > 0
    }

    pub fn has_headlines(&self) -> bool {
        self.headline_links >= 3 || self.article_count > 1
    }

    pub fn has_forms(&self) -> bool {
        self.form_count > 0
    }

    /// Script-based indicators that content renders after load
    pub fn dynamic_content(&self) -> bool {
        !self.framework_markers.is_empty() || self.lazy_elements > 0 || self.script_count > 15
    }

    /// Accessibility score from 0 to 100, penalising missing structure and labels
    pub fn accessibility_score(&self) -> u8 {
        let mut score = 100.0_f64;
        if !self.has_main() {
            score -= 15.0;
        }
        if self.heading_count == 0 {
            score -= 15.0;
        }
        if self.lang.trim().is_empty() {
            score -= 10.0;
        }
        if self.image_count > 0 {
            score -= 30.0 * self.images_missing_alt as f64 / self.image_count as f64;
        }
        if self.input_count > 0 {
            score -= 30.0 * self.unlabeled_inputs as f64 / self.input_count as f64;
        }
        score.clamp(0.0, 100.0).round() as u8
    }

    pub fn signals(&self) -> PageSignals {
        PageSignals {
            products: self.product_count > 0,
            cart: self.cart_present,
            code_samples: self.code_block_count > 0,
            posts: self.post_count >= 3,
            dashboard: self.dashboard_present,
        }
    }

    /// Category suggested by structure alone
    pub fn heuristic_category(&self) -> ContentCategory {
        let signals = self.signals();
        if signals.products && signals.cart {
            ContentCategory::Ecommerce
        } else if self.code_block_count >= 2 {
            ContentCategory::Documentation
        } else if signals.dashboard {
            ContentCategory::Application
        } else if signals.posts {
            ContentCategory::Social
        } else if self.has_headlines() {
            ContentCategory::News
        } else if self.has_article() {
            ContentCategory::Article
        } else if self.has_forms() {
            ContentCategory::Form
        } else {
            ContentCategory::General
        }
    }

    /// Page context from the heuristic pass only; the type stays unknown
    pub fn page_context(&self) -> PageContext {
        PageContext {
            url: self.url.clone(),
            title: self.title.clone(),
            page_type: PageType::Unknown,
            category: self.heuristic_category(),
            has_main: self.has_main(),
            has_nav: self.has_nav(),
            has_article: self.has_article(),
            has_headlines: self.has_headlines(),
            has_forms: self.has_forms(),
            dynamic_content: self.dynamic_content(),
            scroll_position: self.scroll_position,
            viewport_height: self.viewport_height,
            total_height: self.total_height,
            accessibility_score: self.accessibility_score(),
            signals: self.signals(),
            reasoning: "structural heuristics".to_string(),
        }
    }
}

/// A heading in document order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadingNode {
    pub level: u8,
    pub text: String,
    #[serde(default)]
    pub id: Option<String>,
}

/// Render headings as an indented outline
pub fn heading_outline(headings: &[HeadingNode]) -> String {
    headings
        .iter()
        .map(|h| {
            let depth = h.level.clamp(1, 6) as usize;
            format!("{}{} {}", "  ".repeat(depth - 1), "#".repeat(depth), h.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Raw headline candidate as found in the page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadlineCandidate {
    pub text: String,
    pub href: Option<String>,
    pub timestamp: Option<String>,
    pub category: Option<String>,
    pub summary: Option<String>,
}

/// A headline kept after filtering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Headline {
    pub text: String,
    /// Absolute link, when the headline has one
    pub url: Option<String>,
    pub timestamp: Option<String>,
    pub category: Option<String>,
    pub summary: Option<String>,
}

/// Drop navigation noise, strip reading-time suffixes, de-duplicate and cap
pub fn filter_headlines(candidates: Vec<HeadlineCandidate>, page_url: &str) -> Vec<Headline> {
    let base = Url::parse(page_url).ok();
    let mut seen = HashSet::new();
    let mut headlines = Vec::new();

    for candidate in candidates {
        let text = strip_reading_time(&candidate.text);
        if text.chars().count() < MIN_HEADLINE_LEN {
            continue;
        }
        let lower = text.to_lowercase();
        if NAV_WORDS.iter().any(|w| lower.contains(w)) {
            continue;
        }
        if !seen.insert(lower) {
            continue;
        }

        let url = candidate.href.as_deref().and_then(|href| resolve_link(base.as_ref(), href));
        headlines.push(Headline {
            text,
            url,
            timestamp: candidate.timestamp.filter(|t| !t.is_empty()),
            category: candidate.category.filter(|c| !c.is_empty()),
            summary: candidate.summary.filter(|s| !s.is_empty()),
        });

        if headlines.len() == MAX_HEADLINES {
            break;
        }
    }

    headlines
}

fn strip_reading_time(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.to_ascii_lowercase().find("min read") {
        Some(idx) => {
            // drop the "5 min read" fragment together with its number
            let head = collapsed[..idx].trim_end();
            let head = head.trim_end_matches(|c: char| c.is_ascii_digit()).trim_end();
            let tail = collapsed[idx + "min read".len()..].trim_start();
            [head, tail]
                .iter()
                .filter(|s| !s.is_empty())
                .copied()
                .collect::<Vec<_>>()
                .join(" ")
        }
        None => collapsed,
    }
}

fn resolve_link(base: Option<&Url>, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    match Url::parse(href) {
        Ok(url) => Some(url.to_string()),
        Err(_) => base.and_then(|b| b.join(href).ok()).map(|u| u.to_string()),
    }
}

/// A landmark region
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Landmark {
    pub tag: String,
    pub role: String,
    pub label: String,
    pub text: String,
    pub selector: String,
}

impl Landmark {
    /// e.g. `navigation (nav) "Primary"`
    pub fn describe(&self) -> String {
        let kind = if self.role.is_empty() {
            self.implicit_role().to_string()
        } else {
            self.role.clone()
        };
        let mut out = format!("{} ({})", kind, self.tag);
        if !self.label.is_empty() {
            out.push_str(&format!(" \"{}\"", self.label));
        }
        out
    }

    fn implicit_role(&self) -> &str {
        match self.tag.as_str() {
            "header" => "banner",
            "nav" => "navigation",
            "main" => "main",
            "aside" => "complementary",
            "footer" => "contentinfo",
            "form" => "form",
            "section" => "region",
            other => other,
        }
    }

    pub fn preview(&self, max_chars: usize) -> String {
        truncate_chars(&self.text, max_chars)
    }

    /// Whether a user description such as "main content" names this landmark
    pub fn matches(&self, target: &str) -> bool {
        let haystack = format!("{} {}", self.describe(), self.label).to_lowercase();
        let target = target.to_lowercase();
        target
            .split_whitespace()
            .filter(|w| !matches!(*w, "the" | "to" | "go" | "content" | "section" | "area"))
            .any(|w| haystack.contains(w))
    }
}

/// Main content split at headings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageSections {
    pub title: String,
    pub main_text: String,
    pub from_main: bool,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Section {
    pub title: String,
    pub content: String,
    pub selector: String,
}

/// Truncate on a char boundary, marking the cut with an ellipsis
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(text: &str, href: Option<&str>) -> HeadlineCandidate {
        HeadlineCandidate {
            text: text.to_string(),
            href: href.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_summary_deserializes_camel_case() {
        let json = serde_json::json!({
            "url": "https://example.com/",
            "landmarkTags": ["main", "nav"],
            "headingCount": 2,
            "frameworkMarkers": ["react"],
            "viewportHeight": 800,
            "totalHeight": 4000
        });
        let summary: DocumentSummary = serde_json::from_value(json).unwrap();
        assert!(summary.has_main());
        assert!(summary.has_nav());
        assert!(summary.dynamic_content());
        assert_eq!(summary.total_height, 4000);
    }

    #[test]
    fn test_page_context_from_heuristics() {
        let summary = DocumentSummary {
            landmark_roles: vec!["main".to_string()],
            article_count: 4,
            heading_count: 5,
            lang: "en".to_string(),
            ..Default::default()
        };
        let context = summary.page_context();
        assert_eq!(context.page_type, PageType::Unknown);
        assert!(context.has_main);
        assert!(!context.has_nav);
        assert!(context.has_article);
        assert!(context.has_headlines);
        assert!(!context.dynamic_content);
        assert_eq!(context.accessibility_score, 100);
        assert_eq!(context.category, ContentCategory::News);
    }

    #[test]
    fn test_accessibility_score_penalties() {
        let summary = DocumentSummary {
            image_count: 4,
            images_missing_alt: 2,
            input_count: 2,
            unlabeled_inputs: 2,
            ..Default::default()
        };
        // no main (-15), no headings (-15), no lang (-10), half alt (-15), no labels (-30)
        assert_eq!(summary.accessibility_score(), 15);
    }

    #[test]
    fn test_filter_headlines() {
        let candidates = vec![
            candidate("Short one", Some("/a")),
            candidate("Subscribe to our newsletter for daily updates", Some("/sub")),
            candidate("Markets rally as inflation cools again 5 min read", Some("/markets")),
            candidate("Markets rally as inflation cools again", Some("/dupe")),
            candidate("Scientists map the deepest ocean trench", Some("https://other.org/x")),
            candidate("Local council approves new bike lanes plan", Some("#top")),
        ];
        let headlines = filter_headlines(candidates, "https://news.example.com/world/");
        assert_eq!(headlines.len(), 3);
        assert_eq!(headlines[0].text, "Markets rally as inflation cools again");
        assert_eq!(
            headlines[0].url.as_deref(),
            Some("https://news.example.com/markets")
        );
        assert_eq!(headlines[1].url.as_deref(), Some("https://other.org/x"));
        assert_eq!(headlines[2].url, None);
    }

    #[test]
    fn test_filter_headlines_caps_results() {
        let candidates = (0..40)
            .map(|i| candidate(&format!("Headline number {} about something long", i), None))
            .collect();
        assert_eq!(filter_headlines(candidates, "").len(), MAX_HEADLINES);
    }

    #[test]
    fn test_heading_outline() {
        let headings = vec![
            HeadingNode { level: 1, text: "Title".into(), id: None },
            HeadingNode { level: 2, text: "Part".into(), id: None },
        ];
        assert_eq!(heading_outline(&headings), "# Title\n  ## Part");
    }

    #[test]
    fn test_landmark_matching() {
        let nav = Landmark {
            tag: "nav".into(),
            label: "Primary".into(),
            ..Default::default()
        };
        assert_eq!(nav.describe(), "navigation (nav) \"Primary\"");
        assert!(nav.matches("go to the navigation"));
        assert!(nav.matches("primary menu"));
        assert!(!nav.matches("footer"));
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abcdef", 3), "abc...");
        assert_eq!(truncate_chars("abc", 3), "abc");
    }

    #[test]
    fn test_probe_scripts_are_function_expressions() {
        for probe in [
            Probe::Summary,
            Probe::Headings,
            Probe::HeadlineCandidates,
            Probe::Landmarks,
            Probe::Sections,
            Probe::TextSearch,
            Probe::ClickCandidates,
        ] {
            assert!(probe.script().starts_with('('), "{:?}", probe);
        }
        assert!(find_script().contains("data-sightline-ref"));
    }
}
