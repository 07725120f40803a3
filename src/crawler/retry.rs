//! Retry controller for product handlers
//!
//! Every attempt starts from scratch: a fresh navigation and a fresh
//! extraction. Between attempts the controller sleeps with linear backoff.

use crate::config::ProductConfig;
use crate::HandlerError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Bounded retry policy with an optional randomized settle delay
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    retry_delay: Duration,
    settle_ms: Option<(u64, u64)>,
}

impl RetryPolicy {
    /// A policy without settle delay
    pub fn new(max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            retry_delay,
            settle_ms: None,
        }
    }

    /// Waits a random time in `min..=max` before every attempt
    ///
    /// A zero upper bound disables the settle delay.
    pub fn with_settle(mut self, min: Duration, max: Duration) -> Self {
        let (min, max) = (min.as_millis() as u64, max.as_millis() as u64);
        self.settle_ms = (max > 0).then_some((min.min(max), max));
        self
    }

    pub fn from_config(config: &ProductConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.retry_delay_ms),
        )
        .with_settle(
            Duration::from_millis(config.settle_min_ms),
            Duration::from_millis(config.settle_max_ms),
        )
    }

    /// Total attempts, the first one included
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Pause after failed attempt number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.retry_delay * attempt
    }

    /// Longest time `run` can take when each attempt needs `per_attempt`
    ///
    /// Counts the longest settle delay before every attempt and the backoff
    /// after every attempt but the last.
    pub fn worst_case(&self, per_attempt: Duration) -> Duration {
        let settle = Duration::from_millis(self.settle_ms.map_or(0, |(_, max)| max));
        let backoff: Duration = (1..self.max_attempts).map(|n| self.backoff(n)).sum();
        (settle + per_attempt) * self.max_attempts + backoff
    }

    /// Draws the settle delay for one attempt
    pub fn settle_delay(&self) -> Duration {
        match self.settle_ms {
            None => Duration::ZERO,
            Some((min, max)) => Duration::from_millis(rand::rng().random_range(min..=max)),
        }
    }

    /// Runs `attempt` until it succeeds, fails for good, or the attempts
    /// are used up
    ///
    /// The closure receives the 1-based attempt number. Non-retryable errors
    /// are returned at once; after the last attempt its error is returned.
    pub async fn run<T, F, Fut>(&self, url: &str, mut attempt: F) -> Result<T, HandlerError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, HandlerError>>,
    {
        let mut number = 1;
        loop {
            let settle = self.settle_delay();
            if !settle.is_zero() {
                debug!("Settling {:?} before attempt {} on {}", settle, number, url);
                tokio::time::sleep(settle).await;
            }

            match attempt(number).await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() || number >= self.max_attempts => return Err(e),
                Err(e) => {
                    warn!("Retry {}/{} for {}: {}", number, self.max_attempts, url, e);
                    tokio::time::sleep(self.backoff(number)).await;
                    number += 1;
                }
            }
        }
    }
}
