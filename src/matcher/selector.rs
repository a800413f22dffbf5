// src/matcher/selector.rs
// =============================================================================
// Structural matching: CSS selectors evaluated against the parsed page.
//
// Each selected element is one reported unit. What gets reported depends on
// the target: the element's text, its inner HTML, or one of its attributes.
//
// scraper's Html is not Send, so parsing and selecting happen entirely inside
// the synchronous find() call and nothing from the DOM outlives it.
// =============================================================================

use scraper::{ElementRef, Html, Selector};

use super::MatchUnit;
use crate::error::{Result, WeepError};

/// What a selector match reports
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SelectorTarget {
    /// Concatenated text of the element and its descendants
    #[default]
    Text,
    /// The element's inner HTML
    InnerHtml,
    /// The value of one attribute; elements without it are skipped
    Attribute(String),
}

#[derive(Debug)]
pub(super) struct SelectorMatcher {
    selectors: Vec<Selector>,
    target: SelectorTarget,
}

impl SelectorMatcher {
    pub(super) fn new(patterns: &[String], target: SelectorTarget) -> Result<Self> {
        let selectors = patterns
            .iter()
            .map(|p| {
                Selector::parse(p).map_err(|e| WeepError::Selector {
                    pattern: p.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { selectors, target })
    }

    // Selects units from a page
    //
    // Normal mode: every element matched by a selector, in selector order then
    // document order.
    // Inverted: every element matched by no selector that has text of its own.
    pub(super) fn find(&self, body: &str, invert: bool) -> Vec<MatchUnit> {
        let document = Html::parse_document(body);

        if invert {
            return document
                .root_element()
                .descendants()
                .filter_map(ElementRef::wrap)
                .filter(|el| !self.selectors.iter().any(|s| s.matches(el)))
                .filter_map(|el| {
                    let own_text: String = el
                        .children()
                        .filter_map(|child| child.value().as_text().map(|t| t.to_string()))
                        .collect();
                    unit(own_text.trim())
                })
                .collect();
        }

        let mut units = Vec::new();
        for selector in &self.selectors {
            for element in document.select(selector) {
                let value = match &self.target {
                    SelectorTarget::Text => element.text().collect::<String>(),
                    SelectorTarget::InnerHtml => element.inner_html(),
                    SelectorTarget::Attribute(name) => match element.value().attr(name) {
                        Some(value) => value.to_string(),
                        None => continue,
                    },
                };
                units.extend(unit(value.trim()));
            }
        }
        units
    }
}

// Builds a structural unit, skipping empty content
fn unit(text: &str) -> Option<MatchUnit> {
    if text.is_empty() {
        return None;
    }
    Some(MatchUnit {
        line: None,
        text: text.to_string(),
        spans: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
            <h1>Title</h1>
            <p class="intro">Hello <b>world</b></p>
            <a href="/docs" title="Docs">Read the docs</a>
            <a href="/blog">Blog</a>
            <span>plain</span>
        </body></html>
    "#;

    fn matcher(pattern: &str, target: SelectorTarget) -> SelectorMatcher {
        SelectorMatcher::new(&[pattern.to_string()], target).unwrap()
    }

    fn texts(units: Vec<MatchUnit>) -> Vec<String> {
        units.into_iter().map(|u| u.text).collect()
    }

    #[test]
    fn test_selects_element_text() {
        let units = matcher("p.intro", SelectorTarget::Text).find(PAGE, false);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].text, "Hello world");
        assert_eq!(units[0].line, None);
    }

    #[test]
    fn test_selects_inner_html() {
        let units = matcher("p.intro", SelectorTarget::InnerHtml).find(PAGE, false);
        assert_eq!(texts(units), vec!["Hello <b>world</b>"]);
    }

    #[test]
    fn test_attribute_target_skips_elements_without_it() {
        let units = matcher("a", SelectorTarget::Attribute("title".to_string())).find(PAGE, false);
        assert_eq!(texts(units), vec!["Docs"]);
    }

    #[test]
    fn test_attribute_values_in_document_order() {
        let units = matcher("a", SelectorTarget::Attribute("href".to_string())).find(PAGE, false);
        assert_eq!(texts(units), vec!["/docs", "/blog"]);
    }

    #[test]
    fn test_invert_reports_unselected_elements_with_text() {
        let units = matcher("a, b", SelectorTarget::Text).find(PAGE, true);
        assert_eq!(texts(units), vec!["Title", "Hello", "plain"]);
    }

    #[test]
    fn test_invalid_selector_is_config_error() {
        let err = SelectorMatcher::new(&["a[".to_string()], SelectorTarget::Text).unwrap_err();
        assert!(matches!(err, WeepError::Selector { .. }));
    }
}
