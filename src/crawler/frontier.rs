//! Request frontier
//!
//! A FIFO of pending requests shared by every worker. Each dequeue hands a
//! request to exactly one worker as a [`Lease`]; while any lease is
//! outstanding the crawl is not over, because the handler holding it may
//! still enqueue follow-ups.
//!
//! With a [`FrontierStore`] attached, every request is also written to the
//! store when it is enqueued and removed once its lease is released, so a
//! crawl that stops early can be resumed with [`Frontier::restore`].

use crate::state::CrawlRequest;
use crate::storage::{FrontierStore, StorageResult};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tracing::warn;

/// A request waiting in the frontier
#[derive(Debug, Clone)]
pub struct QueuedRequest {
    pub request: CrawlRequest,

    /// How many times the crawl has already put this request back
    pub retries: u32,

    /// Row of the request in the frontier store
    key: Option<i64>,
}

impl From<CrawlRequest> for QueuedRequest {
    fn from(request: CrawlRequest) -> Self {
        Self {
            request,
            retries: 0,
            key: None,
        }
    }
}

#[derive(Debug, Default)]
struct FrontierState {
    queue: VecDeque<QueuedRequest>,
    in_flight: usize,
    dispatched: u64,
    closed: bool,
}

/// Shared request queue with a global request budget
pub struct Frontier {
    state: Mutex<FrontierState>,
    changed: Notify,
    max_requests: u64,
    store: Option<Arc<dyn FrontierStore>>,
}

impl fmt::Debug for Frontier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frontier")
            .field("state", &self.state)
            .field("max_requests", &self.max_requests)
            .field("durable", &self.store.is_some())
            .finish()
    }
}

impl Frontier {
    /// Creates an empty frontier that dispatches at most `max_requests`
    pub fn new(max_requests: u64) -> Self {
        Self {
            state: Mutex::new(FrontierState::default()),
            changed: Notify::new(),
            max_requests,
            store: None,
        }
    }

    /// Creates an empty frontier mirrored into `store`
    pub fn with_store(max_requests: u64, store: Arc<dyn FrontierStore>) -> Self {
        Self {
            store: Some(store),
            ..Self::new(max_requests)
        }
    }

    fn lock(&self) -> MutexGuard<'_, FrontierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, request: CrawlRequest, retries: u32) -> StorageResult<QueuedRequest> {
        let key = match &self.store {
            Some(store) => Some(store.add_to_frontier(&request, retries)?),
            None => None,
        };
        Ok(QueuedRequest {
            request,
            retries,
            key,
        })
    }

    /// Queues the requests the store still holds from an earlier crawl
    ///
    /// Call before anything else is enqueued. Returns how many requests
    /// were restored; without a store there is nothing to restore.
    pub fn restore(&self) -> StorageResult<usize> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let pending = store.load_frontier()?;
        let restored = pending.len();

        self.lock()
            .queue
            .extend(pending.into_iter().map(|pending| QueuedRequest {
                request: pending.request,
                retries: pending.retries,
                key: Some(pending.key),
            }));
        self.changed.notify_waiters();
        Ok(restored)
    }

    /// Appends requests in argument order
    ///
    /// # Errors
    ///
    /// Fails if the store cannot take a request; requests stored before
    /// the failure are still queued.
    pub fn enqueue<I>(&self, requests: I) -> StorageResult<()>
    where
        I: IntoIterator<Item = CrawlRequest>,
    {
        let mut queued = Vec::new();
        let mut result = Ok(());
        for request in requests {
            match self.persist(request, 0) {
                Ok(request) => queued.push(request),
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }

        self.lock().queue.extend(queued);
        self.changed.notify_waiters();
        result
    }

    /// Puts a request back at the tail, keeping its retry counter
    fn requeue(&self, queued: QueuedRequest) {
        self.lock().queue.push_back(queued);
        self.changed.notify_waiters();
    }

    /// Takes the next request
    ///
    /// Waits while the queue is empty but other requests are in flight.
    /// Returns `None` once the frontier is closed, the budget is spent, or
    /// the queue is empty with nothing in flight.
    pub async fn dequeue(&self) -> Option<Lease<'_>> {
        loop {
            let changed = self.changed.notified();
            tokio::pin!(changed);
            changed.as_mut().enable();

            {
                let mut state = self.lock();
                if state.closed || state.dispatched >= self.max_requests {
                    return None;
                }
                if let Some(queued) = state.queue.pop_front() {
                    state.in_flight += 1;
                    state.dispatched += 1;
                    return Some(Lease {
                        frontier: self,
                        queued,
                    });
                }
                if state.in_flight == 0 {
                    return None;
                }
            }

            changed.await;
        }
    }

    /// Stops all further dispatching; pending requests are abandoned
    pub fn close(&self) {
        self.lock().closed = true;
        self.changed.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of requests waiting to be dispatched
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of requests handed out so far
    pub fn dispatched(&self) -> u64 {
        self.lock().dispatched
    }

    /// Removes and returns everything still waiting, in queue order
    ///
    /// Stored copies stay in the store for a later [`restore`](Self::restore).
    pub fn drain(&self) -> Vec<QueuedRequest> {
        self.lock().queue.drain(..).collect()
    }
}

/// Exclusive hold on one dispatched request
///
/// Dropping the lease marks the request as finished and removes it from the
/// store. Follow-ups must be enqueued before that so the frontier never
/// looks drained too early.
#[derive(Debug)]
pub struct Lease<'a> {
    frontier: &'a Frontier,
    queued: QueuedRequest,
}

impl Lease<'_> {
    pub fn request(&self) -> &CrawlRequest {
        &self.queued.request
    }

    pub fn retries(&self) -> u32 {
        self.queued.retries
    }

    /// Puts the leased request back with its retry counter incremented
    pub fn retry(self) -> StorageResult<()> {
        let queued = self
            .frontier
            .persist(self.queued.request.clone(), self.queued.retries + 1)?;
        self.frontier.requeue(queued);
        Ok(())
    }

    /// Releases the request without finishing it
    ///
    /// Its stored copy stays, so a resumed crawl handles it again.
    pub fn abandon(mut self) {
        self.queued.key = None;
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        if let (Some(store), Some(key)) = (&self.frontier.store, self.queued.key) {
            if let Err(e) = store.remove_from_frontier(key) {
                warn!(
                    "Failed to remove {} from the stored frontier: {}",
                    self.queued.request.url, e
                );
            }
        }

        {
            let mut state = self.frontier.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
        }
        self.frontier.changed.notify_waiters();
    }
}
