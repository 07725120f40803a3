//! Rendered page model
//!
//! A `PageModel` is what the renderer hands back after a navigation: the
//! final URL, the document markup and the page-injected product data object.
//! The markup is parsed on demand so the model itself stays `Send`.

use scraper::{Html, Selector};
use serde_json::Value;
use url::Url;

/// Name of the global object the catalog injects into product pages
pub const PAGE_DATA_GLOBAL: &str = "digitalData";

/// A fully rendered page
#[derive(Debug, Clone)]
pub struct PageModel {
    url: Url,
    html: String,
    page_data: Option<Value>,
}

impl PageModel {
    /// Builds a page model, reading the embedded data object from the markup
    pub fn new(url: Url, html: impl Into<String>) -> Self {
        let html = html.into();
        let page_data = find_page_data(&html);
        Self {
            url,
            html,
            page_data,
        }
    }

    /// Replaces the embedded data object
    pub fn with_page_data(mut self, page_data: Value) -> Self {
        self.page_data = Some(page_data);
        self
    }

    /// Final URL of the page after redirects
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    /// Parses the markup into a queryable document
    pub fn document(&self) -> Html {
        Html::parse_document(&self.html)
    }

    /// The whole embedded data object, if the page carries one
    pub fn page_data(&self) -> Option<&Value> {
        self.page_data.as_ref()
    }

    /// The first product entry of the embedded data object (`product[0]`)
    pub fn product_data(&self) -> Option<&Value> {
        self.page_data
            .as_ref()?
            .get("product")?
            .get(0)
            .filter(|product| product.is_object())
    }

    /// Returns true if at least one element matches the selector
    pub fn has_match(&self, selector: &Selector) -> bool {
        self.document().select(selector).next().is_some()
    }
}

/// Finds the embedded data object in the page's inline scripts
///
/// Looks for an assignment of the form `digitalData = {...}` and parses the
/// object literal as JSON. Trailing script text after the object is ignored.
pub fn find_page_data(html: &str) -> Option<Value> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("script").ok()?;

    document.select(&selector).find_map(|script| {
        let text: String = script.text().collect();
        parse_assignment(&text)
    })
}

fn parse_assignment(script: &str) -> Option<Value> {
    script
        .match_indices(PAGE_DATA_GLOBAL)
        .find_map(|(start, global)| {
            let rest = script[start + global.len()..].trim_start();
            let rest = rest.strip_prefix('=')?.trim_start();
            serde_json::Deserializer::from_str(rest)
                .into_iter::<Value>()
                .next()?
                .ok()
                .filter(Value::is_object)
        })
}
