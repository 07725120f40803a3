//! Brand traversal state
//!
//! A brand-traversal chain is the sequence of BRAND requests sharing one
//! list of remaining brands. The list is frozen when the chain starts;
//! only the cursor index moves, and only forward.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// A brand discovered on the catalog root
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BrandLink {
    /// Absolute URL of the brand's product listing
    pub href: String,

    /// Brand display name as shown on the catalog root
    pub name: String,
}

impl BrandLink {
    pub fn new(href: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            name: name.into(),
        }
    }
}

/// Continuation carried by every BRAND request
///
/// Cloning a cursor shares the remaining-brands list, which is never
/// mutated after [`BrandCursor::start`] creates it. A deserialized cursor
/// starts a chain of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandCursor {
    brand_name: String,
    remaining: Arc<[BrandLink]>,
    brand_index: usize,
}

impl BrandCursor {
    /// Starts a chain: the first brand is visited now, the rest are kept
    /// in discovery order for later.
    ///
    /// Returns the first brand's listing URL with its cursor, or `None` if
    /// there are no brands at all.
    pub fn start(mut brands: Vec<BrandLink>) -> Option<(String, BrandCursor)> {
        if brands.is_empty() {
            return None;
        }
        let first = brands.remove(0);
        let cursor = BrandCursor {
            brand_name: first.name,
            remaining: brands.into(),
            brand_index: 0,
        };
        Some((first.href, cursor))
    }

    /// Name of the brand currently being paginated
    pub fn brand_name(&self) -> &str {
        &self.brand_name
    }

    /// Brands not yet visited when the chain started
    pub fn remaining(&self) -> &[BrandLink] {
        &self.remaining
    }

    /// Index of the next brand to visit in [`remaining`](Self::remaining)
    pub fn brand_index(&self) -> usize {
        self.brand_index
    }

    /// Returns true if both cursors belong to the same traversal chain
    pub fn same_chain(&self, other: &BrandCursor) -> bool {
        Arc::ptr_eq(&self.remaining, &other.remaining)
    }

    /// Moves the chain on to the next brand
    ///
    /// Returns the next brand's listing URL and its cursor, or `None` once
    /// every remaining brand has been visited.
    pub fn advance(&self) -> Option<(String, BrandCursor)> {
        let next = self.remaining.get(self.brand_index)?;
        let cursor = BrandCursor {
            brand_name: next.name.clone(),
            remaining: Arc::clone(&self.remaining),
            brand_index: self.brand_index + 1,
        };
        Some((next.href.clone(), cursor))
    }
}

/// Normalizes a brand display name for exclusion matching
pub fn normalize_brand_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Case-insensitive exact-match brand exclusion list
#[derive(Debug, Clone, Default)]
pub struct BrandFilter {
    excluded: HashSet<String>,
}

impl BrandFilter {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            excluded: names
                .into_iter()
                .map(|name| normalize_brand_name(name.as_ref()))
                .collect(),
        }
    }

    /// Returns true if the brand must be left out of the traversal
    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded.contains(&normalize_brand_name(name))
    }

    /// Drops excluded brands, keeping the rest in their original order
    pub fn retain(&self, brands: Vec<BrandLink>) -> Vec<BrandLink> {
        brands
            .into_iter()
            .filter(|brand| {
                let excluded = self.is_excluded(&brand.name);
                if excluded {
                    tracing::info!("Skipping brand: {}", brand.name.trim());
                }
                !excluded
            })
            .collect()
    }
}
