use crate::UrlError;
use url::Url;

/// Path segment that introduces a product identifier
const PRODUCT_SEGMENT: &str = "product";

/// Extracts the product identifier from a product page URL
///
/// The identifier is everything after `/product/` in the path, without the
/// query string or fragment and without a trailing slash.
///
/// # Examples
///
/// ```
/// use catalog_sweep::url::product_id;
///
/// let id = product_id("https://shop.example.com/product/acme-serum-P1?skuId=2").unwrap();
/// assert_eq!(id, "acme-serum-P1");
/// assert!(product_id("https://shop.example.com/brand/acme").is_err());
/// ```
pub fn product_id(url_str: &str) -> Result<String, UrlError> {
    let url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    let mut segments = url
        .path_segments()
        .ok_or_else(|| UrlError::NotAProduct(url_str.to_string()))?;

    if !segments.any(|segment| segment == PRODUCT_SEGMENT) {
        return Err(UrlError::NotAProduct(url_str.to_string()));
    }

    let id = segments
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    if id.is_empty() {
        return Err(UrlError::NotAProduct(url_str.to_string()));
    }

    Ok(id)
}
