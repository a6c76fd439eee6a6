//! Selector engine. Runs the configured CSS queries against a parsed page.

use crate::crawler::error::{CrawlError, PageField};
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

/// One compiled query: a CSS selector plus an optional attribute to read instead of text.
#[derive(Debug, Clone)]
pub struct Query {
    expr: String,
    selector: Selector,
    attr: Option<String>,
}

impl Query {
    /// Query that yields each matched element's flattened text.
    pub fn text(css: &str) -> Result<Self, String> {
        Ok(Self {
            expr: css.to_string(),
            selector: parse_selector(css)?,
            attr: None,
        })
    }

    /// Query that yields the given attribute of each matched element.
    pub fn attr(css: &str, attr: &str) -> Result<Self, String> {
        let attr = attr.trim();
        if attr.is_empty() {
            return Err(format!("empty attribute name for selector {:?}", css));
        }
        Ok(Self {
            expr: css.to_string(),
            selector: parse_selector(css)?,
            attr: Some(attr.to_string()),
        })
    }

    pub fn attribute(&self) -> Option<&str> {
        self.attr.as_deref()
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.attr {
            Some(a) => write!(f, "{} @{}", self.expr, a),
            None => f.write_str(&self.expr),
        }
    }
}

/// Parse a CSS selector or return a message (avoids panics from Selector::parse).
fn parse_selector(css: &str) -> Result<Selector, String> {
    Selector::parse(css).map_err(|e| format!("invalid selector {:?}: {}", css, e))
}

/// The three per-site queries.
#[derive(Debug, Clone)]
pub struct SourceSelectors {
    pub title: Query,
    pub content: Query,
    pub next_link: Query,
}

/// Raw matches for one page, before any normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    pub title: String,
    pub content_nodes: Vec<String>,
    pub next_link: Option<String>,
}

fn flatten_text(el: ElementRef<'_>) -> String {
    el.text().collect()
}

/// Run a query and return every match in document order. Attribute queries skip
/// elements that lack the attribute.
pub fn select_text(document: &Html, query: &Query) -> Vec<String> {
    document
        .select(&query.selector)
        .filter_map(|el| match &query.attr {
            Some(name) => el.value().attr(name).map(String::from),
            None => Some(flatten_text(el)),
        })
        .collect()
}

/// Apply title, content and next-link queries. Missing title or content is fatal;
/// a missing next link is reported as `None`. The title is kept exactly as matched,
/// surrounding whitespace included; the heading line and filename are built from it.
pub fn select_page(
    document: &Html,
    selectors: &SourceSelectors,
    url: &Url,
) -> Result<RawPage, CrawlError> {
    let title = select_text(document, &selectors.title)
        .into_iter()
        .next()
        .ok_or_else(|| CrawlError::Extraction {
            url: url.to_string(),
            field: PageField::Title,
        })?;

    let content_nodes = select_text(document, &selectors.content);
    if content_nodes.is_empty() {
        return Err(CrawlError::Extraction {
            url: url.to_string(),
            field: PageField::Content,
        });
    }

    let next_link = select_text(document, &selectors.next_link).into_iter().next();

    Ok(RawPage {
        title,
        content_nodes,
        next_link,
    })
}
