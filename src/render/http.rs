//! HTTP-backed page renderer
//!
//! Fetches pages with reqwest and treats the server-delivered markup as the
//! rendered document. Wait conditions are honored by re-fetching at a fixed
//! poll interval until every condition holds or one of them expires.

use super::{PageModel, PageRenderer, RenderError, WaitCondition};
use crate::config::RendererConfig;
use async_trait::async_trait;
use reqwest::{Client, Proxy};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Renders pages over plain HTTP, rotating through the configured proxies
#[derive(Debug)]
pub struct HttpRenderer {
    clients: Vec<Client>,
    next_client: AtomicUsize,
    poll_interval: Duration,
}

impl HttpRenderer {
    /// Builds one client per proxy, or a single direct client when no
    /// proxies are configured
    ///
    /// # Errors
    ///
    /// Returns `RenderError::Unavailable` if a proxy URL is rejected or a
    /// client cannot be built.
    pub fn new(config: &RendererConfig, navigation_timeout: Duration) -> Result<Self, RenderError> {
        let clients = if config.proxies.is_empty() {
            vec![build_client(config, navigation_timeout, None)?]
        } else {
            config
                .proxies
                .iter()
                .map(|proxy| build_client(config, navigation_timeout, Some(proxy.as_str())))
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(Self {
            clients,
            next_client: AtomicUsize::new(0),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        })
    }

    /// Number of clients in the rotation
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    fn client(&self) -> &Client {
        let index = self.next_client.fetch_add(1, Ordering::Relaxed) % self.clients.len();
        &self.clients[index]
    }

    async fn fetch(&self, url: &str) -> Result<PageModel, RenderError> {
        let response = self
            .client()
            .get(url)
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RenderError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let body = response.text().await.map_err(|e| classify_error(url, e))?;

        Ok(PageModel::new(final_url, body))
    }
}

#[async_trait]
impl PageRenderer for HttpRenderer {
    async fn render(&self, url: &str, waits: &[WaitCondition]) -> Result<PageModel, RenderError> {
        let started = Instant::now();

        loop {
            let page = self.fetch(url).await?;

            match waits.iter().find(|wait| !wait.is_met(&page)) {
                None => return Ok(page),
                Some(wait) if started.elapsed() >= wait.timeout() => {
                    return Err(wait.expired(url));
                }
                Some(wait) => trace!("Waiting for {} on {}", wait, url),
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

fn build_client(
    config: &RendererConfig,
    navigation_timeout: Duration,
    proxy: Option<&str>,
) -> Result<Client, RenderError> {
    let mut builder = Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(navigation_timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = proxy {
        debug!("Adding proxy {} to rotation", proxy);
        let proxy = Proxy::all(proxy)
            .map_err(|e| RenderError::Unavailable(format!("invalid proxy {}: {}", proxy, e)))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| RenderError::Unavailable(e.to_string()))
}

fn classify_error(url: &str, error: reqwest::Error) -> RenderError {
    if error.is_timeout() {
        RenderError::NavigationTimeout {
            url: url.to_string(),
        }
    } else {
        RenderError::Navigation {
            url: url.to_string(),
            message: describe(&error),
        }
    }
}

/// The error text followed by every cause not already part of it
fn describe(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
