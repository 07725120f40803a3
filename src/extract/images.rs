use super::locator::{Field, PageLocators};
use super::product::ProductImage;
use scraper::Html;

/// Accessible-label marker for video posters, which are never product images
const VIDEO_MARKER: &str = "Video";

/// Accessible-label marker of the main product image
const MAIN_IMAGE_MARKER: &str = "main-zoom";

/// Collects product images in document order
///
/// Only elements exposing a source-set are considered. Each contributes its
/// highest-resolution candidate; video posters are left out.
pub fn extract_images(document: &Html, locators: &PageLocators) -> Vec<ProductImage> {
    locators
        .find_all(document, Field::Image)
        .into_iter()
        .filter_map(|img| {
            let element = img.value();
            let srcset = element.attr("srcset")?;
            let alt = element.attr("alt").unwrap_or_default();

            if alt.contains(VIDEO_MARKER) {
                return None;
            }

            highest_resolution(srcset).map(|url| ProductImage {
                url: url.to_string(),
                is_main: alt.contains(MAIN_IMAGE_MARKER),
                is_thumbnail: false,
            })
        })
        .collect()
}

/// Picks the highest-resolution candidate of a source-set
///
/// Candidates are listed in ascending order, so this is the URL of the last
/// non-empty entry.
///
/// # Examples
///
/// ```
/// use catalog_sweep::extract::highest_resolution;
///
/// let srcset = "https://cdn.example.com/a-250.jpg 1x, https://cdn.example.com/a-500.jpg 2x";
/// assert_eq!(highest_resolution(srcset), Some("https://cdn.example.com/a-500.jpg"));
/// assert_eq!(highest_resolution("  "), None);
/// ```
pub fn highest_resolution(srcset: &str) -> Option<&str> {
    srcset
        .split(',')
        .map(str::trim)
        .rev()
        .find(|candidate| !candidate.is_empty())?
        .split_whitespace()
        .next()
}
