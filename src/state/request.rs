//! Crawl request definitions
//!
//! Every request carries a continuation whose variant decides which handler
//! runs it, so a request can never hold state that belongs to another label.

use crate::state::brand::BrandCursor;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Routing label of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    /// Catalog root listing every brand
    List,

    /// One page of a brand's product listing
    Brand,

    /// A single product page
    Product,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::List => "LIST",
            Self::Brand => "BRAND",
            Self::Product => "PRODUCT",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Continuation state, one variant per label
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "label", rename_all = "UPPERCASE")]
pub enum Continuation {
    List,
    Brand(BrandCursor),
    Product { brand_name: String },
}

impl Continuation {
    pub fn label(&self) -> Label {
        match self {
            Self::List => Label::List,
            Self::Brand(_) => Label::Brand,
            Self::Product { .. } => Label::Product,
        }
    }
}

/// A unit of work on the frontier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlRequest {
    pub url: String,
    pub continuation: Continuation,
}

impl CrawlRequest {
    /// The seed request for the catalog root
    pub fn seed(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            continuation: Continuation::List,
        }
    }

    pub fn brand(url: impl Into<String>, cursor: BrandCursor) -> Self {
        Self {
            url: url.into(),
            continuation: Continuation::Brand(cursor),
        }
    }

    pub fn product(url: impl Into<String>, brand_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            continuation: Continuation::Product {
                brand_name: brand_name.into(),
            },
        }
    }

    pub fn label(&self) -> Label {
        self.continuation.label()
    }

    /// The brand cursor, for BRAND requests
    pub fn brand_cursor(&self) -> Option<&BrandCursor> {
        match &self.continuation {
            Continuation::Brand(cursor) => Some(cursor),
            _ => None,
        }
    }
}
