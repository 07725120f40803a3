use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Catalog-Sweep
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub product: ProductConfig,
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub renderer: RendererConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub selectors: SelectorConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Global crawl budget: total number of requests handed to workers
    pub max_requests: u64,

    /// Number of workers, each owning one render session at a time
    pub max_concurrent_pages: u32,

    /// Timeout for a single page navigation (seconds)
    #[serde(default = "default_navigation_timeout")]
    pub navigation_timeout_secs: u64,

    /// Timeout for a selector to appear on a listing page (seconds)
    #[serde(default = "default_selector_timeout")]
    pub selector_timeout_secs: u64,

    /// Timeout for one complete handler invocation (seconds)
    ///
    /// Product handlers get at least the worst-case length of their retry
    /// loop, so every configured attempt can run.
    #[serde(default = "default_handler_timeout")]
    pub handler_timeout_secs: u64,

    /// How many times a failed request is put back on the frontier
    #[serde(default = "default_max_request_retries")]
    pub max_request_retries: u32,
}

impl CrawlerConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn selector_timeout(&self) -> Duration {
        Duration::from_secs(self.selector_timeout_secs)
    }

    pub fn handler_timeout(&self) -> Duration {
        Duration::from_secs(self.handler_timeout_secs)
    }
}

/// Product page retry behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProductConfig {
    /// Attempts per handler invocation, first one included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Linear backoff unit between attempts (milliseconds)
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    /// Lower bound of the randomized settle delay (milliseconds)
    #[serde(default = "default_settle_min")]
    pub settle_min_ms: u64,

    /// Upper bound of the randomized settle delay (milliseconds)
    #[serde(default = "default_settle_max")]
    pub settle_max_ms: u64,

    /// Bounded wait for the embedded product data (seconds)
    #[serde(default = "default_metadata_timeout")]
    pub metadata_timeout_secs: u64,
}

impl ProductConfig {
    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }
}

impl Default for ProductConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay(),
            settle_min_ms: default_settle_min(),
            settle_max_ms: default_settle_max(),
            metadata_timeout_secs: default_metadata_timeout(),
        }
    }
}

/// Catalog entry point and brand filtering
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CatalogConfig {
    /// The catalog root listing every brand
    pub seed_url: String,

    /// Brand display names to leave out (case-insensitive exact match)
    #[serde(default)]
    pub skip_brands: Vec<String>,
}

/// HTTP renderer configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RendererConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Proxy endpoints, used round-robin. Empty means direct connections.
    #[serde(default)]
    pub proxies: Vec<String>,

    /// Delay between re-fetches while a wait condition is unmet (milliseconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            proxies: Vec::new(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database holding the brand partitions
    pub database_path: String,
}

/// CSS selectors locating each logical page field
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SelectorConfig {
    pub brand_link: String,
    pub product_link: String,
    pub next_page: String,
    pub brand: String,
    pub review_count: String,
    pub review_average: String,
    pub likes: String,
    pub price: String,
    pub highlights: String,
    pub highlight_item: String,
    pub description: String,
    pub ingredients: String,
    pub how_to_use: String,
    pub size: String,
    pub image: String,
}

const PRODUCT_HEADER: &str =
    "body > div:nth-child(3) > main > section > div.css-1v7u6og.eanm77i0 > div:nth-child(1)";
const PRODUCT_RATING: &str = "div.css-42r6cu.eanm77i0 > div";

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            brand_link: r#"a[data-at="brand_link"]"#.to_string(),
            product_link: "a.css-klx76".to_string(),
            next_page: r#"a[data-at="pagination_next"]"#.to_string(),
            brand: format!("{PRODUCT_HEADER} > h1 > a"),
            review_count: format!(
                "{PRODUCT_HEADER} > {PRODUCT_RATING} > a.css-whkkt7.eanm77i0 > span.css-1j53ife"
            ),
            review_average: format!(
                "{PRODUCT_HEADER} > {PRODUCT_RATING} > a.css-whkkt7.eanm77i0 > span.css-1tbjoxk > span.css-j7llew"
            ),
            likes: format!("{PRODUCT_HEADER} > {PRODUCT_RATING} > div"),
            price: format!(
                "{PRODUCT_HEADER} > div.css-1tzthcm.eanm77i0 > p > span > span.css-18jtttk > b"
            ),
            highlights: "#details > div.css-h2sczi.eanm77i0".to_string(),
            highlight_item: "span".to_string(),
            description: "#details > div.css-32uy52.eanm77i0 > div:nth-child(2) > div".to_string(),
            ingredients: "#ingredients".to_string(),
            how_to_use: "#howtouse > div > div".to_string(),
            size: "body > div:nth-child(3) > main > section > div.css-1v7u6og.eanm77i0 > div:nth-child(3) > div.css-1jp3h9y.eanm77i0 > div.css-k1zwuw.eanm77i0 > div.css-1ag3xrp.eanm77i0 > div".to_string(),
            image: "img[srcset]".to_string(),
        }
    }
}

fn default_navigation_timeout() -> u64 {
    30
}

fn default_selector_timeout() -> u64 {
    30
}

fn default_handler_timeout() -> u64 {
    60
}

fn default_max_request_retries() -> u32 {
    5
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    5000
}

fn default_settle_min() -> u64 {
    2000
}

fn default_settle_max() -> u64 {
    5000
}

fn default_metadata_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:123.0) Gecko/20100101 Firefox/123.0".to_string()
}

fn default_poll_interval() -> u64 {
    500
}
