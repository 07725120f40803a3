//! URL handling module for Catalog-Sweep
//!
//! This module resolves links found on catalog pages and extracts product
//! identifiers from product page URLs.

mod product;
mod resolve;

// Re-export main functions
pub use product::product_id;
pub use resolve::resolve_link;
