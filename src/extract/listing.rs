//! Listing page lookups: brand links, product links, pagination

use super::locator::{text_content, Field, PageLocators};
use crate::render::PageModel;
use crate::state::BrandLink;
use crate::url::resolve_link;
use scraper::ElementRef;
use std::collections::HashSet;

/// Brand links of the catalog root, in document order
///
/// Links without a followable href are left out.
pub fn brand_links(page: &PageModel, locators: &PageLocators) -> Vec<BrandLink> {
    let document = page.document();
    locators
        .find_all(&document, Field::BrandLink)
        .into_iter()
        .filter_map(|link| {
            let href = resolve_link(link.value().attr("href")?, page.url())?;
            Some(BrandLink::new(href, text_content(link)))
        })
        .collect()
}

/// Absolute product URLs of a brand page, in document order and without
/// duplicates
pub fn product_links(page: &PageModel, locators: &PageLocators) -> Vec<String> {
    let document = page.document();
    let mut seen = HashSet::new();
    locators
        .find_all(&document, Field::ProductLink)
        .into_iter()
        .filter_map(|link| resolve_link(link.value().attr("href")?, page.url()))
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// URL behind a visible next-page control, if the page has one
pub fn next_page(page: &PageModel, locators: &PageLocators) -> Option<String> {
    let document = page.document();
    locators
        .find_all(&document, Field::NextPage)
        .into_iter()
        .filter(|control| is_visible(*control))
        .find_map(|control| resolve_link(control.value().attr("href")?, page.url()))
}

/// Static visibility check: the control and its ancestors are neither
/// hidden nor disabled
fn is_visible(element: ElementRef<'_>) -> bool {
    let hidden = |e: &scraper::node::Element| {
        e.attr("hidden").is_some()
            || e.attr("aria-hidden") == Some("true")
            || e.attr("aria-disabled") == Some("true")
            || e.attr("style").is_some_and(|style| {
                let style = style.replace(' ', "").to_ascii_lowercase();
                style.contains("display:none") || style.contains("visibility:hidden")
            })
    };

    !std::iter::successors(Some(element), |e| e.parent().and_then(ElementRef::wrap))
        .any(|e| hidden(e.value()))
}
