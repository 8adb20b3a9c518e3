//! Page document handle shared by the field extractor and the skill miner.
//!
//! `scraper::Html` is not `Send`, so executors keep the raw `PageSnapshot` and parse it into a
//! `PageDocument` synchronously for each request. A parsed document never crosses an `.await`.

use scraper::{ElementRef, Html, Selector};

/// Raw page content as seen by the page-context executor at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSnapshot {
    pub url: String,
    pub html: String,
}

impl PageSnapshot {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }
}

/// Parsed, queryable page.
pub struct PageDocument {
    url: String,
    html: Html,
}

impl PageDocument {
    pub fn parse(snapshot: &PageSnapshot) -> Self {
        Self {
            url: snapshot.url.clone(),
            html: Html::parse_document(&snapshot.html),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// First element matching `selector`, if any.
    pub fn first(&self, selector: &Selector) -> Option<ElementRef<'_>> {
        self.html.select(selector).next()
    }

    /// Text of the first element matching `selector` whose text is non-empty.
    pub fn first_text(&self, selector: &Selector) -> Option<String> {
        self.html
            .select(selector)
            .map(element_text)
            .find(|text| !text.is_empty())
    }
}

/// Rendered text of an element: descendant text nodes joined, whitespace runs collapsed, trimmed.
pub fn element_text(element: ElementRef<'_>) -> String {
    let raw: String = element.text().collect::<Vec<_>>().join(" ");
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parses a list of CSS selectors, skipping any that fail to parse.
pub fn compile_selectors(css: &[&str]) -> Vec<Selector> {
    css.iter()
        .filter_map(|s| match Selector::parse(s) {
            Ok(selector) => Some(selector),
            Err(e) => {
                tracing::warn!("Skipping invalid selector '{s}': {e:?}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_text_collapses_whitespace() {
        let snapshot = PageSnapshot::new(
            "https://example.com",
            "<div class='t'>\n   Senior\n   <span>Rust</span>   Engineer  </div>",
        );
        let doc = PageDocument::parse(&snapshot);
        let selectors = compile_selectors(&[".t"]);
        assert_eq!(
            doc.first_text(&selectors[0]).as_deref(),
            Some("Senior Rust Engineer")
        );
    }

    #[test]
    fn test_first_text_skips_empty_matches() {
        let snapshot = PageSnapshot::new("u", "<p class='x'>  </p><p class='x'>Acme</p>");
        let doc = PageDocument::parse(&snapshot);
        let selectors = compile_selectors(&["p.x"]);
        assert_eq!(doc.first_text(&selectors[0]).as_deref(), Some("Acme"));
    }

    #[test]
    fn test_compile_selectors_drops_invalid() {
        let selectors = compile_selectors(&["h1", "[[[", ".ok"]);
        assert_eq!(selectors.len(), 2);
    }
}
