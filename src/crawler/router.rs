//! Request router
//!
//! Maps each request's label to its handler. Handlers return the follow-up
//! requests they want enqueued instead of touching the frontier themselves,
//! which keeps them testable against a scripted renderer.
//!
//! | Label   | Follow-ups |
//! |---------|------------|
//! | LIST    | one BRAND for the first kept brand, carrying the rest |
//! | BRAND   | every PRODUCT on the page, then the next page of the same brand, or else the next brand |
//! | PRODUCT | none; the record goes to the sink |

use crate::config::Config;
use crate::crawler::retry::RetryPolicy;
use crate::extract::{
    brand_links, extract_product, next_page, product_links, Field, Incomplete, PageLocators,
};
use crate::render::{PageRenderer, WaitCondition};
use crate::state::{BrandCursor, BrandFilter, Continuation, CrawlRequest};
use crate::storage::{RecordSink, SavedRecord};
use crate::url::product_id;
use crate::{ConfigError, HandlerError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What a successful handler invocation produced
#[derive(Debug)]
pub enum HandlerOutcome {
    /// Requests to enqueue, in order
    FollowUps(Vec<CrawlRequest>),

    /// A product record was appended to the sink
    Saved(SavedRecord),

    /// The product page never became complete; nothing was written
    Skipped(Incomplete),
}

/// Dispatches requests to the LIST, BRAND and PRODUCT handlers
pub struct Router {
    renderer: Arc<dyn PageRenderer>,
    sink: Arc<dyn RecordSink>,
    locators: PageLocators,
    brand_filter: BrandFilter,
    retry: RetryPolicy,
    selector_timeout: Duration,
    metadata_timeout: Duration,
    navigation_timeout: Duration,
}

impl Router {
    /// Builds a router from the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidSelector` if a configured selector does
    /// not compile.
    pub fn new(
        config: &Config,
        renderer: Arc<dyn PageRenderer>,
        sink: Arc<dyn RecordSink>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            renderer,
            sink,
            locators: PageLocators::from_config(&config.selectors)?,
            brand_filter: BrandFilter::new(&config.catalog.skip_brands),
            retry: RetryPolicy::from_config(&config.product),
            selector_timeout: config.crawler.selector_timeout(),
            metadata_timeout: config.product.metadata_timeout(),
            navigation_timeout: config.crawler.navigation_timeout(),
        })
    }

    /// Replaces the product retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Time limit for one invocation of the handler for `request`
    ///
    /// Product handlers get at least the worst case of their retry loop,
    /// where one attempt is a navigation plus the metadata wait.
    pub fn timeout_for(&self, request: &CrawlRequest, base: Duration) -> Duration {
        match request.continuation {
            Continuation::Product { .. } => base.max(
                self.retry
                    .worst_case(self.navigation_timeout + self.metadata_timeout),
            ),
            _ => base,
        }
    }

    /// Runs the handler for the request's label
    pub async fn handle(&self, request: &CrawlRequest) -> Result<HandlerOutcome, HandlerError> {
        info!("Processing {} {}", request.label(), request.url);

        match &request.continuation {
            Continuation::List => self.handle_list(request).await,
            Continuation::Brand(cursor) => self.handle_brand(request, cursor).await,
            Continuation::Product { brand_name } => self.handle_product(request, brand_name).await,
        }
    }

    /// Request that keeps a brand chain going after `request` was dropped
    ///
    /// Only BRAND requests have a chain to recover; the next brand is
    /// visited as if the dropped brand had no further pages.
    pub fn recover_chain(&self, request: &CrawlRequest) -> Option<CrawlRequest> {
        let cursor = request.brand_cursor()?;
        let (href, next) = cursor.advance()?;
        info!(
            "Brand {} abandoned, continuing with {}",
            cursor.brand_name(),
            next.brand_name()
        );
        Some(CrawlRequest::brand(href, next))
    }

    async fn handle_list(&self, request: &CrawlRequest) -> Result<HandlerOutcome, HandlerError> {
        let waits = [WaitCondition::selector(
            self.locators.selector(Field::BrandLink),
            self.selector_timeout,
        )];
        let page = self.renderer.render(&request.url, &waits).await?;

        let brands = brand_links(&page, &self.locators);
        let found = brands.len();
        let kept = self.brand_filter.retain(brands);
        info!("Found {} brands, {} to crawl", found, kept.len());

        match BrandCursor::start(kept) {
            Some((href, cursor)) => Ok(HandlerOutcome::FollowUps(vec![CrawlRequest::brand(
                href, cursor,
            )])),
            None => {
                warn!("No brands to crawl on {}", request.url);
                Ok(HandlerOutcome::FollowUps(Vec::new()))
            }
        }
    }

    async fn handle_brand(
        &self,
        request: &CrawlRequest,
        cursor: &BrandCursor,
    ) -> Result<HandlerOutcome, HandlerError> {
        info!("Processing brand: {}", cursor.brand_name());

        let waits = [WaitCondition::selector(
            self.locators.selector(Field::ProductLink),
            self.selector_timeout,
        )];
        let page = self.renderer.render(&request.url, &waits).await?;

        let mut follow_ups: Vec<CrawlRequest> = product_links(&page, &self.locators)
            .into_iter()
            .map(|url| CrawlRequest::product(url, cursor.brand_name()))
            .collect();
        debug!(
            "Found {} products for {} on {}",
            follow_ups.len(),
            cursor.brand_name(),
            request.url
        );

        // Pagination of the current brand comes before the next brand
        if let Some(next) = next_page(&page, &self.locators) {
            debug!("Next page for {}: {}", cursor.brand_name(), next);
            follow_ups.push(CrawlRequest::brand(next, cursor.clone()));
        } else if let Some((href, next_cursor)) = cursor.advance() {
            info!(
                "Brand {} done, moving on to {}",
                cursor.brand_name(),
                next_cursor.brand_name()
            );
            follow_ups.push(CrawlRequest::brand(href, next_cursor));
        } else {
            info!("Brand {} done, no brands left", cursor.brand_name());
        }

        Ok(HandlerOutcome::FollowUps(follow_ups))
    }

    async fn handle_product(
        &self,
        request: &CrawlRequest,
        brand_name: &str,
    ) -> Result<HandlerOutcome, HandlerError> {
        let id = product_id(&request.url)?;
        let waits = [WaitCondition::product_data(self.metadata_timeout)];

        let (id, waits) = (&id, &waits);
        let extracted = self
            .retry
            .run(&request.url, |attempt| async move {
                info!("Scraping product at {} (attempt {})", request.url, attempt);
                let page = self.renderer.render(&request.url, waits).await?;
                Ok::<_, HandlerError>(extract_product(&page, id, &self.locators)?)
            })
            .await;

        match extracted {
            Ok(mut record) => {
                if record.brand.is_empty() {
                    record.brand = brand_name.trim().to_string();
                }
                let saved = self.sink.append(record)?;
                info!(
                    "Saved {} to partition {}",
                    saved.record.id,
                    saved.partition()
                );
                Ok(HandlerOutcome::Saved(saved))
            }
            Err(HandlerError::Incomplete(reason)) => {
                info!("Skipping {}: {}", request.url, reason);
                Ok(HandlerOutcome::Skipped(reason))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        CatalogConfig, CrawlerConfig, OutputConfig, ProductConfig, RendererConfig, SelectorConfig,
    };
    use crate::render::{PageModel, RenderError};
    use crate::state::{BrandLink, Label};
    use crate::storage::MemorySink;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use url::Url;

    /// Serves fixed markup per URL; unknown URLs fail navigation
    #[derive(Default)]
    struct StaticRenderer {
        pages: HashMap<String, String>,
        calls: Mutex<Vec<String>>,
    }

    impl StaticRenderer {
        fn page(mut self, url: &str, html: &str) -> Self {
            self.pages.insert(url.to_string(), html.to_string());
            self
        }
    }

    #[async_trait]
    impl PageRenderer for StaticRenderer {
        async fn render(
            &self,
            url: &str,
            waits: &[WaitCondition],
        ) -> Result<PageModel, RenderError> {
            self.calls.lock().unwrap().push(url.to_string());
            let html = self.pages.get(url).ok_or_else(|| RenderError::Navigation {
                url: url.to_string(),
                message: "not found".to_string(),
            })?;
            let page = PageModel::new(Url::parse(url).unwrap(), html.clone());
            match waits.iter().find(|wait| !wait.is_met(&page)) {
                Some(wait) => Err(wait.expired(url)),
                None => Ok(page),
            }
        }
    }

    fn test_config() -> Config {
        Config {
            crawler: CrawlerConfig {
                max_requests: 100,
                max_concurrent_pages: 1,
                navigation_timeout_secs: 30,
                selector_timeout_secs: 30,
                handler_timeout_secs: 60,
                max_request_retries: 0,
            },
            product: ProductConfig {
                retry_delay_ms: 1,
                settle_min_ms: 0,
                settle_max_ms: 0,
                ..ProductConfig::default()
            },
            catalog: CatalogConfig {
                seed_url: "https://shop.example.com/brands-list".to_string(),
                skip_brands: vec!["AAVRANI".to_string()],
            },
            renderer: RendererConfig::default(),
            output: OutputConfig {
                database_path: ":memory:".to_string(),
            },
            selectors: SelectorConfig {
                brand: "h1 > a".to_string(),
                review_count: "span.reviews".to_string(),
                review_average: "span.stars".to_string(),
                likes: "div.likes".to_string(),
                price: "b.price".to_string(),
                highlights: "div.highlights".to_string(),
                description: "div.description".to_string(),
                ingredients: "#ingredients".to_string(),
                how_to_use: "#howtouse".to_string(),
                size: "div.size".to_string(),
                ..SelectorConfig::default()
            },
        }
    }

    fn router(renderer: StaticRenderer) -> (Router, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let router = Router::new(&test_config(), Arc::new(renderer), sink.clone()).unwrap();
        (router, sink)
    }

    fn product_page(brand: &str) -> String {
        let data = json!({"product": [{
            "attributes": {"skuId": "77", "nthLevelCategory": "Serums", "isOutOfStock": false},
            "productInfo": {"productName": "Serum"}
        }]});
        format!(
            r#"<html><head><script>window.digitalData = {data};</script></head><body>
            <h1><a>{brand}</a></h1>
            <span class="reviews">12</span><span class="stars" style="width: 80%"></span>
            <div class="likes">3K</div><b class="price">$20.00</b>
            <div class="highlights"><span>Vegan</span></div>
            <div class="description">Nice.</div><div id="ingredients">Water</div>
            <div id="howtouse">Apply.</div><div class="size">1 oz</div>
            </body></html>"#
        )
    }

    fn cursor(names: &[&str]) -> (String, BrandCursor) {
        BrandCursor::start(
            names
                .iter()
                .map(|n| BrandLink::new(format!("https://shop.example.com/brand/{}", n), *n))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_bad_selector_rejected() {
        let mut config = test_config();
        config.selectors.price = "b[".to_string();

        let result = Router::new(
            &config,
            Arc::new(StaticRenderer::default()),
            Arc::new(MemorySink::new()),
        );
        assert!(matches!(result, Err(ConfigError::InvalidSelector { .. })));
    }

    #[test]
    fn test_product_timeout_covers_retry_loop() {
        let config = Config {
            product: ProductConfig::default(),
            ..test_config()
        };
        let router = Router::new(
            &config,
            Arc::new(StaticRenderer::default()),
            Arc::new(MemorySink::new()),
        )
        .unwrap();
        let base = Duration::from_secs(60);

        let product = CrawlRequest::product("https://shop.example.com/product/a-P1", "acme");
        let seed = CrawlRequest::seed("https://shop.example.com/brands-list");

        // 3 x (5 s settle + 30 s navigation + 30 s metadata) + 15 s backoff
        assert_eq!(router.timeout_for(&product, base), Duration::from_secs(210));
        assert_eq!(router.timeout_for(&seed, base), base);

        let generous = Duration::from_secs(600);
        assert_eq!(router.timeout_for(&product, generous), generous);
    }

    #[tokio::test]
    async fn test_list_enqueues_first_kept_brand() {
        let renderer = StaticRenderer::default().page(
            "https://shop.example.com/brands-list",
            r#"<a data-at="brand_link" href="/brand/aavrani">AAVRANI</a>
               <a data-at="brand_link" href="/brand/acme">Acme</a>
               <a data-at="brand_link" href="/brand/bolt">Bolt</a>
               <a data-at="brand_link" href="/brand/zen">Zen</a>"#,
        );
        let (router, _) = router(renderer);

        let outcome = router
            .handle(&CrawlRequest::seed("https://shop.example.com/brands-list"))
            .await
            .unwrap();

        let HandlerOutcome::FollowUps(follow_ups) = outcome else {
            panic!("expected follow-ups");
        };
        assert_eq!(follow_ups.len(), 1);
        assert_eq!(follow_ups[0].url, "https://shop.example.com/brand/acme");
        let cursor = follow_ups[0].brand_cursor().unwrap();
        assert_eq!(cursor.brand_name(), "Acme");
        assert_eq!(cursor.brand_index(), 0);
        let rest: Vec<_> = cursor.remaining().iter().map(|b| b.name.as_str()).collect();
        assert_eq!(rest, vec!["Bolt", "Zen"]);
    }

    #[tokio::test]
    async fn test_list_without_brands() {
        let renderer = StaticRenderer::default().page(
            "https://shop.example.com/brands-list",
            r#"<a data-at="brand_link" href="/brand/aavrani">aavrani</a>"#,
        );
        let (router, _) = router(renderer);

        let outcome = router
            .handle(&CrawlRequest::seed("https://shop.example.com/brands-list"))
            .await
            .unwrap();
        assert!(matches!(outcome, HandlerOutcome::FollowUps(f) if f.is_empty()));
    }

    #[tokio::test]
    async fn test_brand_with_next_page_keeps_cursor() {
        let renderer = StaticRenderer::default().page(
            "https://shop.example.com/brand/acme",
            r#"<a class="css-klx76" href="/product/a-P1">A</a>
               <a data-at="pagination_next" href="/brand/acme?currentPage=2">Next</a>"#,
        );
        let (router, _) = router(renderer);
        let (href, cursor) = cursor(&["acme", "bolt", "zen"]);

        let HandlerOutcome::FollowUps(follow_ups) = router
            .handle(&CrawlRequest::brand(href, cursor.clone()))
            .await
            .unwrap()
        else {
            panic!("expected follow-ups");
        };

        let labels: Vec<_> = follow_ups.iter().map(CrawlRequest::label).collect();
        assert_eq!(labels, vec![Label::Product, Label::Brand]);

        let next = follow_ups[1].brand_cursor().unwrap();
        assert_eq!(follow_ups[1].url, "https://shop.example.com/brand/acme?currentPage=2");
        assert_eq!(next.brand_name(), "acme");
        assert_eq!(next.brand_index(), cursor.brand_index());
        assert!(next.same_chain(&cursor));
    }

    #[tokio::test]
    async fn test_brand_without_next_page_advances() {
        let renderer = StaticRenderer::default().page(
            "https://shop.example.com/brand/acme",
            r#"<a class="css-klx76" href="/product/a-P1">A</a>
               <a class="css-klx76" href="/product/a-P2">B</a>"#,
        );
        let (router, _) = router(renderer);
        let (href, cursor) = cursor(&["acme", "bolt", "zen"]);

        let HandlerOutcome::FollowUps(follow_ups) = router
            .handle(&CrawlRequest::brand(href, cursor.clone()))
            .await
            .unwrap()
        else {
            panic!("expected follow-ups");
        };

        assert_eq!(follow_ups.len(), 3);
        assert!(follow_ups[..2].iter().all(|r| matches!(
            &r.continuation,
            Continuation::Product { brand_name } if brand_name == "acme"
        )));
        let next = follow_ups[2].brand_cursor().unwrap();
        assert_eq!(follow_ups[2].url, "https://shop.example.com/brand/bolt");
        assert_eq!(next.brand_index(), 1);
        assert!(next.same_chain(&cursor));
    }

    #[tokio::test]
    async fn test_last_brand_ends_chain() {
        let renderer = StaticRenderer::default().page(
            "https://shop.example.com/brand/acme",
            r#"<a class="css-klx76" href="/product/a-P1">A</a>"#,
        );
        let (router, _) = router(renderer);
        let (href, cursor) = cursor(&["acme"]);

        let HandlerOutcome::FollowUps(follow_ups) = router
            .handle(&CrawlRequest::brand(href, cursor))
            .await
            .unwrap()
        else {
            panic!("expected follow-ups");
        };
        assert_eq!(follow_ups.len(), 1);
        assert_eq!(follow_ups[0].label(), Label::Product);
    }

    #[tokio::test]
    async fn test_product_saved_under_brand_partition() {
        let url = "https://shop.example.com/product/acme-serum-P1";
        let renderer = StaticRenderer::default().page(url, &product_page("Acme Labs"));
        let (router, sink) = router(renderer);

        let outcome = router
            .handle(&CrawlRequest::product(url, "Acme Labs"))
            .await
            .unwrap();

        let HandlerOutcome::Saved(saved) = outcome else {
            panic!("expected a saved record");
        };
        assert_eq!(saved.record.id, "acme-serum-P1");
        assert_eq!(saved.record.sku_id, "77");
        assert_eq!(sink.records("acmelabs").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_product_without_dom_brand_uses_request_brand() {
        let url = "https://shop.example.com/product/acme-serum-P1";
        let html = product_page("Acme").replace("<h1><a>Acme</a></h1>", "");
        let renderer = StaticRenderer::default().page(url, &html);
        let (router, sink) = router(renderer);

        router
            .handle(&CrawlRequest::product(url, "Acme Labs"))
            .await
            .unwrap();
        assert_eq!(sink.records("acmelabs").unwrap()[0].record.brand, "Acme Labs");
    }

    #[tokio::test]
    async fn test_incomplete_product_is_skipped_after_all_attempts() {
        let url = "https://shop.example.com/product/acme-serum-P1";
        let html = product_page("Acme").replace(r#"<div class="size">1 oz</div>"#, "");
        let renderer = Arc::new(StaticRenderer::default().page(url, &html));
        let sink = Arc::new(MemorySink::new());
        let router = Router::new(&test_config(), renderer.clone(), sink.clone()).unwrap();

        let outcome = router
            .handle(&CrawlRequest::product(url, "Acme"))
            .await
            .unwrap();

        assert!(matches!(outcome, HandlerOutcome::Skipped(Incomplete::Section(_))));
        assert_eq!(renderer.calls.lock().unwrap().len(), 3);
        assert_eq!(sink.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_product_without_id_fails_without_navigation() {
        let renderer = Arc::new(StaticRenderer::default());
        let sink = Arc::new(MemorySink::new());
        let router = Router::new(&test_config(), renderer.clone(), sink).unwrap();

        let err = router
            .handle(&CrawlRequest::product("https://shop.example.com/brand/acme", "Acme"))
            .await
            .unwrap_err();

        assert!(matches!(err, HandlerError::NoProductId(_)));
        assert!(!err.is_retryable());
        assert!(renderer.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recover_chain() {
        let (router, _) = router(StaticRenderer::default());
        let (href, cursor) = cursor(&["acme", "bolt"]);

        let recovered = router
            .recover_chain(&CrawlRequest::brand(href, cursor))
            .unwrap();
        assert_eq!(recovered.url, "https://shop.example.com/brand/bolt");
        assert_eq!(recovered.brand_cursor().unwrap().brand_index(), 1);

        let product = CrawlRequest::product("https://shop.example.com/product/x", "acme");
        assert!(router.recover_chain(&product).is_none());
    }
}
