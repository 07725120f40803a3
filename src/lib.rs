//! Catalog-Sweep: a brand-by-brand catalog crawler
//!
//! This crate crawls a catalog site one brand at a time, paginates through each
//! brand's product listing, extracts a structured record from every product page
//! and appends it to a brand-partitioned sink.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod output;
pub mod render;
pub mod state;
pub mod storage;
pub mod url;

use std::time::Duration;
use thiserror::Error;

/// Main error type for Catalog-Sweep operations
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Render error: {0}")]
    Render(#[from] render::RenderError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Crawl aborted, page renderer exhausted: {0}")]
    RendererExhausted(String),

    #[error("Worker task failed: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector for `{field}`: {selector}")]
    InvalidSelector { field: String, selector: String },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("URL does not name a product: {0}")]
    NotAProduct(String),
}

/// Failure of a single handler invocation
///
/// The variant decides what happens next: transient failures are retried,
/// incomplete pages consume an attempt, fatal ones are dropped immediately.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Render(#[from] render::RenderError),

    #[error("Handler timed out after {0:?}")]
    Timeout(Duration),

    #[error("Incomplete product page: {0}")]
    Incomplete(#[from] extract::Incomplete),

    #[error("No product identifier: {0}")]
    NoProductId(#[from] UrlError),

    #[error("Sink error: {0}")]
    Sink(#[from] storage::StorageError),
}

impl HandlerError {
    /// Returns true if a fresh attempt may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Render(e) => !e.is_exhaustion(),
            Self::Timeout(_) | Self::Incomplete(_) => true,
            Self::NoProductId(_) | Self::Sink(_) => false,
        }
    }

    /// Returns true if the page renderer itself can no longer serve requests
    pub fn is_exhaustion(&self) -> bool {
        matches!(self, Self::Render(e) if e.is_exhaustion())
    }
}

/// Result type alias for Catalog-Sweep operations
pub type Result<T> = std::result::Result<T, SweepError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, CrawlReport};
pub use extract::ProductRecord;
pub use state::{Continuation, CrawlRequest, Label};
