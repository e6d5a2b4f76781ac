//! Interaction prediction
//!
//! Rule table over the page and element context that guesses what acting on
//! the page will need. No I/O; the executor calls it before every task.

use crate::core::{ActionPrediction, ContentCategory, ElementContext, PageContext, PageType};

/// Pages scoring below this are assumed to need extra settling
pub const ACCESSIBILITY_THRESHOLD: u8 = 70;

#[derive(Default)]
struct Rules {
    prediction: ActionPrediction,
}

impl Rules {
    fn scroll(&mut self, reason: &str) {
        self.prediction.needs_scroll = true;
        self.prediction.reasoning.push(reason.to_string());
    }

    fn click(&mut self, reason: &str) {
        self.prediction.needs_click = true;
        self.prediction.reasoning.push(reason.to_string());
    }

    fn wait(&mut self, reason: &str) {
        self.prediction.needs_wait = true;
        self.prediction.reasoning.push(reason.to_string());
    }

    fn popups(&mut self, reason: &str) {
        self.prediction.potential_popups = true;
        self.prediction.reasoning.push(reason.to_string());
    }

    fn finish(mut self) -> ActionPrediction {
        let fired = self.prediction.reasoning.len();
        self.prediction.confidence = if fired > 3 {
            0.9
        } else if fired > 1 {
            0.8
        } else {
            0.7
        };
        self.prediction
    }
}

/// Predict the side-effects of acting on the page, optionally on one element
pub fn predict(page: &PageContext, element: Option<&ElementContext>) -> ActionPrediction {
    let mut rules = Rules::default();

    if page.viewport_height > 0 && page.total_height as f64 > 1.5 * page.viewport_height as f64 {
        rules.scroll("page is taller than the viewport");
    }

    match page.category {
        ContentCategory::Ecommerce => {
            if page.signals.products {
                rules.click("product listings usually need selection");
            }
            if page.signals.cart {
                rules.popups("shopping pages show cart overlays");
            }
        }
        ContentCategory::Documentation if page.signals.code_samples => {
            rules.click("code samples often sit behind tabs or expanders");
        }
        ContentCategory::Social if page.signals.posts => {
            rules.scroll("social feeds load as you scroll");
            rules.wait("new posts arrive after scrolling");
        }
        ContentCategory::Application if page.signals.dashboard => {
            rules.wait("dashboards render data asynchronously");
        }
        _ => {}
    }

    let news = page.page_type == PageType::News || page.category == ContentCategory::News;
    let article = page.page_type == PageType::Article || page.category == ContentCategory::Article;

    if news {
        rules.scroll("news pages list stories below the fold");
        rules.popups("news sites show subscription and cookie prompts");
    } else if article {
        rules.scroll("articles are read by scrolling");
    }

    if page.category == ContentCategory::Form || page.has_forms {
        rules.click("forms need field focus");
    }
    if page.dynamic_content {
        rules.wait("content is rendered by scripts");
    }
    if page.accessibility_score < ACCESSIBILITY_THRESHOLD {
        rules.wait("low accessibility score, structure may shift");
    }

    if let Some(element) = element {
        if !element.is_visible {
            rules.scroll("element is outside the visible area");
        }
        if element.is_clickable {
            rules.click("element is clickable");
        }
        let href = element.has_attribute("href");
        if href || element.has_attribute("onclick") {
            rules.wait("activating the element may load new content");
        }
        if href && (news || article) {
            rules.popups("story links often trigger interstitials");
        }
    }

    rules.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PageSignals;

    #[test]
    fn test_plain_page_has_baseline_confidence() {
        let page = PageContext {
            viewport_height: 800,
            total_height: 800,
            ..Default::default()
        };
        let prediction = predict(&page, None);
        assert!(!prediction.needs_scroll);
        assert!(!prediction.needs_wait);
        assert!(prediction.reasoning.is_empty());
        assert_eq!(prediction.confidence, 0.7);
    }

    #[test]
    fn test_confidence_tiers() {
        // one reason
        let tall = PageContext {
            viewport_height: 800,
            total_height: 2000,
            ..Default::default()
        };
        assert_eq!(predict(&tall, None).confidence, 0.7);

        // two reasons
        let social = PageContext {
            category: ContentCategory::Social,
            signals: PageSignals {
                posts: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let prediction = predict(&social, None);
        assert!(prediction.needs_scroll && prediction.needs_wait);
        assert_eq!(prediction.confidence, 0.8);

        // four reasons
        let news = PageContext {
            page_type: PageType::News,
            category: ContentCategory::News,
            viewport_height: 800,
            total_height: 4000,
            dynamic_content: true,
            ..Default::default()
        };
        let prediction = predict(&news, None);
        assert!(prediction.potential_popups);
        assert_eq!(prediction.reasoning.len(), 4);
        assert_eq!(prediction.confidence, 0.9);
    }

    #[test]
    fn test_low_accessibility_needs_wait() {
        let page = PageContext {
            accessibility_score: 55,
            ..Default::default()
        };
        assert!(predict(&page, None).needs_wait);
    }

    #[test]
    fn test_element_rules() {
        let page = PageContext {
            page_type: PageType::Article,
            ..Default::default()
        };
        let mut element = ElementContext {
            tag: "a".into(),
            is_clickable: true,
            is_visible: false,
            ..Default::default()
        };
        element.attributes.insert("href".into(), "/story".into());

        let prediction = predict(&page, Some(&element));
        assert!(prediction.needs_scroll);
        assert!(prediction.needs_click);
        assert!(prediction.needs_wait);
        assert!(prediction.potential_popups);
    }

    #[test]
    fn test_ecommerce_rules() {
        let page = PageContext {
            category: ContentCategory::Ecommerce,
            signals: PageSignals {
                products: true,
                cart: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let prediction = predict(&page, None);
        assert!(prediction.needs_click);
        assert!(prediction.potential_popups);
        assert!(!prediction.needs_scroll);
    }
}
