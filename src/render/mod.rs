//! Page rendering collaborator
//!
//! The crawl core never talks to a browser or HTTP client directly. It asks a
//! [`PageRenderer`] for a fully rendered [`PageModel`], optionally waiting for
//! conditions to hold first. Anti-bot evasion, fingerprints and proxies are
//! the renderer's business.

mod http;
mod page;

pub use http::HttpRenderer;
pub use page::{find_page_data, PageModel, PAGE_DATA_GLOBAL};

use async_trait::async_trait;
use scraper::Selector;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while rendering a page
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Navigation to {url} timed out")]
    NavigationTimeout { url: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Timed out after {timeout:?} waiting for {condition} on {url}")]
    WaitTimeout {
        url: String,
        condition: String,
        timeout: Duration,
    },

    #[error("Page renderer unavailable: {0}")]
    Unavailable(String),
}

impl RenderError {
    /// Returns true if the renderer can no longer serve any request
    pub fn is_exhaustion(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// A condition the rendered page must satisfy before it is returned
#[derive(Debug, Clone)]
pub enum WaitCondition {
    /// At least one element matches the selector
    Selector { selector: Selector, timeout: Duration },

    /// The embedded product data object is available
    ProductData { timeout: Duration },
}

impl WaitCondition {
    pub fn selector(selector: &Selector, timeout: Duration) -> Self {
        Self::Selector {
            selector: selector.clone(),
            timeout,
        }
    }

    pub fn product_data(timeout: Duration) -> Self {
        Self::ProductData { timeout }
    }

    pub fn timeout(&self) -> Duration {
        match self {
            Self::Selector { timeout, .. } | Self::ProductData { timeout } => *timeout,
        }
    }

    /// Returns true if the page satisfies the condition
    pub fn is_met(&self, page: &PageModel) -> bool {
        match self {
            Self::Selector { selector, .. } => page.has_match(selector),
            Self::ProductData { .. } => page.product_data().is_some(),
        }
    }

    /// Builds the error reported when the condition expires
    pub fn expired(&self, url: &str) -> RenderError {
        RenderError::WaitTimeout {
            url: url.to_string(),
            condition: self.to_string(),
            timeout: self.timeout(),
        }
    }
}

impl fmt::Display for WaitCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Selector { selector, .. } => write!(f, "selector {:?}", selector),
            Self::ProductData { .. } => write!(f, "embedded product data"),
        }
    }
}

/// Renders pages on behalf of the crawl
///
/// Implementations must be safe to share across workers; each call is one
/// independent navigation.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Navigates to `url` and returns the rendered page once every wait
    /// condition holds
    ///
    /// # Errors
    ///
    /// * `RenderError::WaitTimeout` if a condition is still unmet after its timeout
    /// * `RenderError::Unavailable` if the renderer cannot serve requests any more
    /// * any other variant for navigation failures
    async fn render(&self, url: &str, waits: &[WaitCondition]) -> Result<PageModel, RenderError>;
}
