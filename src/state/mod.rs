//! State module for requests and their continuations
//!
//! # Components
//!
//! - `CrawlRequest`: a URL plus the continuation that tells the router what to do with it
//! - `Continuation`: closed set of per-label continuation states
//! - `BrandCursor`: position inside a brand-traversal chain
//! - `BrandFilter`: brand exclusion list applied when a chain is built

mod brand;
mod request;

// Re-export main types
pub use brand::{normalize_brand_name, BrandCursor, BrandFilter, BrandLink};
pub use request::{Continuation, CrawlRequest, Label};
