//! Extraction pipeline
//!
//! Pure functions from a rendered [`PageModel`](crate::render::PageModel) to
//! a validated [`ProductRecord`] or a structured [`Incomplete`] reason, plus
//! the listing-page link lookups the router needs.

mod images;
mod listing;
mod locator;
mod product;

pub use images::{extract_images, highest_resolution};
pub use listing::{brand_links, next_page, product_links};
pub use locator::{text_content, Field, PageLocators};
pub use product::{
    extract_product, FieldValue, Incomplete, Price, ProductImage, ProductRecord, Reviews,
    Section, CURRENCY,
};
