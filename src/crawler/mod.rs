//! Crawler module for request dispatch and processing
//!
//! This module contains the core crawling logic, including:
//! - The shared request frontier with its global budget
//! - Label routing to the LIST, BRAND and PRODUCT handlers
//! - Bounded retries for product pages
//! - The worker pool and crawl lifecycle

mod coordinator;
mod frontier;
mod retry;
mod router;

pub use coordinator::{Coordinator, CrawlReport};
pub use frontier::{Frontier, Lease, QueuedRequest};
pub use retry::RetryPolicy;
pub use router::{HandlerOutcome, Router};
