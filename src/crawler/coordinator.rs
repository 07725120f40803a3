//! Crawler coordinator - worker pool and crawl lifecycle
//!
//! The coordinator seeds the frontier with the catalog root, or resumes the
//! requests a frontier store still holds, and runs a fixed number of workers
//! against it. Each worker takes one request at a time,
//! runs its handler under the handler timeout and applies the outcome:
//! follow-ups are enqueued, transient failures are put back, and requests
//! that keep failing are dropped. A renderer that can no longer serve pages
//! aborts the whole crawl.

use crate::config::Config;
use crate::crawler::frontier::{Frontier, Lease};
use crate::crawler::retry::RetryPolicy;
use crate::crawler::router::{HandlerOutcome, Router};
use crate::render::PageRenderer;
use crate::state::CrawlRequest;
use crate::storage::{FrontierStore, RecordSink};
use crate::{HandlerError, SweepError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Counters of a finished crawl
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlReport {
    /// Handler invocations, retries included
    pub handled: u64,

    /// Requests put on the frontier, the seed included
    pub enqueued: u64,

    /// Product records appended to the sink
    pub saved: u64,

    /// Product pages that stayed incomplete
    pub skipped: u64,

    /// Requests put back after a transient failure
    pub retried: u64,

    /// Requests abandoned for good
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct CrawlStats {
    handled: AtomicU64,
    enqueued: AtomicU64,
    saved: AtomicU64,
    skipped: AtomicU64,
    retried: AtomicU64,
    dropped: AtomicU64,
}

impl CrawlStats {
    fn bump(counter: &AtomicU64, by: u64) -> u64 {
        counter.fetch_add(by, Ordering::Relaxed) + by
    }

    fn snapshot(&self) -> CrawlReport {
        CrawlReport {
            handled: self.handled.load(Ordering::Relaxed),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            saved: self.saved.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// State shared by every worker
struct Shared {
    frontier: Frontier,
    router: Router,
    stats: CrawlStats,
    handler_timeout: Duration,
    max_request_retries: u32,
    started: Instant,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    seed_url: String,
    router: Router,
    max_requests: u64,
    max_concurrent_pages: usize,
    handler_timeout: Duration,
    max_request_retries: u32,
    store: Option<Arc<dyn FrontierStore>>,
}

impl Coordinator {
    /// Creates a coordinator that renders through `renderer` and appends
    /// product records to `sink`
    ///
    /// # Errors
    ///
    /// Fails if a configured selector does not compile.
    pub fn new(
        config: &Config,
        renderer: Arc<dyn PageRenderer>,
        sink: Arc<dyn RecordSink>,
    ) -> Result<Self, SweepError> {
        Ok(Self {
            seed_url: config.catalog.seed_url.clone(),
            router: Router::new(config, renderer, sink)?,
            max_requests: config.crawler.max_requests,
            max_concurrent_pages: config.crawler.max_concurrent_pages.max(1) as usize,
            handler_timeout: config.crawler.handler_timeout(),
            max_request_retries: config.crawler.max_request_retries,
            store: None,
        })
    }

    /// Keeps the frontier in `store` as well
    ///
    /// If the store still holds requests of the current run, the crawl
    /// resumes from them instead of starting at the catalog root.
    pub fn with_frontier_store(mut self, store: Arc<dyn FrontierStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replaces the product page retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.router = self.router.with_retry_policy(retry);
        self
    }

    /// Runs the crawl until the frontier drains or the budget is spent
    ///
    /// # Errors
    ///
    /// Returns `SweepError::RendererExhausted` if the renderer stopped
    /// serving pages; in-flight handlers finish first, pending requests
    /// are abandoned. Fails with `SweepError::Storage` if the frontier
    /// store cannot be read or written.
    pub async fn run(self) -> Result<CrawlReport, SweepError> {
        info!(
            "Starting crawl of {} with {} workers, budget {} requests",
            self.seed_url, self.max_concurrent_pages, self.max_requests
        );

        let frontier = match self.store {
            Some(store) => Frontier::with_store(self.max_requests, store),
            None => Frontier::new(self.max_requests),
        };

        let shared = Arc::new(Shared {
            frontier,
            router: self.router,
            stats: CrawlStats::default(),
            handler_timeout: self.handler_timeout,
            max_request_retries: self.max_request_retries,
            started: Instant::now(),
        });

        let restored = shared.frontier.restore()?;
        if restored > 0 {
            info!("Resuming with {} stored requests", restored);
            CrawlStats::bump(&shared.stats.enqueued, restored as u64);
        } else {
            shared
                .frontier
                .enqueue([CrawlRequest::seed(self.seed_url)])?;
            CrawlStats::bump(&shared.stats.enqueued, 1);
        }

        let mut workers = JoinSet::new();
        for worker in 0..self.max_concurrent_pages {
            let shared = Arc::clone(&shared);
            workers.spawn(async move { work(worker, &shared).await });
        }

        let mut failure = None;
        while let Some(joined) = workers.join_next().await {
            let result = joined.map_err(|e| SweepError::Worker(e.to_string()));
            if let Err(e) = result.and_then(|r| r) {
                // Make sure the remaining workers wind down
                shared.frontier.close();
                failure.get_or_insert(e);
            }
        }

        let abandoned = shared.frontier.drain();
        if !abandoned.is_empty() {
            warn!("{} requests left unhandled", abandoned.len());
        }

        let report = shared.stats.snapshot();
        info!(
            "Crawl finished in {:?}: {} handled, {} saved, {} skipped, {} retried, {} dropped",
            shared.started.elapsed(),
            report.handled,
            report.saved,
            report.skipped,
            report.retried,
            report.dropped
        );

        match failure {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }
}

/// One worker: takes requests until the frontier has nothing left to give
async fn work(worker: usize, shared: &Shared) -> Result<(), SweepError> {
    debug!("Worker {} started", worker);

    while let Some(lease) = shared.frontier.dequeue().await {
        let limit = shared
            .router
            .timeout_for(lease.request(), shared.handler_timeout);
        let result = match tokio::time::timeout(limit, shared.router.handle(lease.request())).await
        {
            Ok(result) => result,
            Err(_) => Err(HandlerError::Timeout(limit)),
        };

        let handled = CrawlStats::bump(&shared.stats.handled, 1);
        apply(shared, lease, result)?;

        // Progress reporting every 10 handled requests
        if handled % 10 == 0 {
            let elapsed = shared.started.elapsed();
            info!(
                "Progress: {} requests handled, {} in frontier, {:.2} requests/sec",
                handled,
                shared.frontier.len(),
                handled as f64 / elapsed.as_secs_f64()
            );
        }
    }

    debug!("Worker {} finished", worker);
    Ok(())
}

/// Applies a handler result while the request is still leased
fn apply(
    shared: &Shared,
    lease: Lease<'_>,
    result: Result<HandlerOutcome, HandlerError>,
) -> Result<(), SweepError> {
    let stats = &shared.stats;

    match result {
        Ok(HandlerOutcome::FollowUps(follow_ups)) => {
            debug!("Enqueueing {} requests from {}", follow_ups.len(), lease.request().url);
            CrawlStats::bump(&stats.enqueued, follow_ups.len() as u64);
            shared.frontier.enqueue(follow_ups)?;
        }
        Ok(HandlerOutcome::Saved(_)) => {
            CrawlStats::bump(&stats.saved, 1);
        }
        Ok(HandlerOutcome::Skipped(_)) => {
            CrawlStats::bump(&stats.skipped, 1);
        }
        Err(e) if e.is_exhaustion() => {
            error!("Renderer exhausted on {}: {}", lease.request().url, e);
            shared.frontier.close();
            lease.abandon();
            return Err(SweepError::RendererExhausted(e.to_string()));
        }
        Err(e) if e.is_retryable() && lease.retries() < shared.max_request_retries => {
            warn!(
                "Request {} {} failed ({}/{}): {}",
                lease.request().label(),
                lease.request().url,
                lease.retries() + 1,
                shared.max_request_retries,
                e
            );
            CrawlStats::bump(&stats.retried, 1);
            lease.retry()?;
        }
        Err(e) => {
            error!(
                "Dropping {} {} after {} retries: {}",
                lease.request().label(),
                lease.request().url,
                lease.retries(),
                e
            );
            CrawlStats::bump(&stats.dropped, 1);

            if let Some(next) = shared.router.recover_chain(lease.request()) {
                CrawlStats::bump(&stats.enqueued, 1);
                shared.frontier.enqueue([next])?;
            }
        }
    }

    Ok(())
}
