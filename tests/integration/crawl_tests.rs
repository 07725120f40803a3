//! Integration tests for the crawler
//!
//! These tests use wiremock to serve a small mock catalog and drive the
//! full crawl cycle end-to-end through the HTTP renderer.

use catalog_sweep::config::{
    CatalogConfig, Config, CrawlerConfig, OutputConfig, ProductConfig, RendererConfig,
    SelectorConfig,
};
use catalog_sweep::crawler::{Coordinator, CrawlReport, RetryPolicy};
use catalog_sweep::output::{export_partitions, load_statistics};
use catalog_sweep::render::HttpRenderer;
use catalog_sweep::storage::{FrontierStore, MemorySink, RecordSink, RunStatus, SqliteSink};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock catalog
fn create_test_config(base_url: &str, max_request_retries: u32) -> Config {
    Config {
        crawler: CrawlerConfig {
            max_requests: 100,
            max_concurrent_pages: 2,
            navigation_timeout_secs: 5,
            selector_timeout_secs: 1,
            handler_timeout_secs: 30,
            max_request_retries,
        },
        product: ProductConfig {
            // Unmet metadata waits fail on the first fetch
            metadata_timeout_secs: 0,
            ..ProductConfig::default()
        },
        catalog: CatalogConfig {
            seed_url: format!("{}/brands-list", base_url),
            skip_brands: vec!["AAVRANI".to_string()],
        },
        renderer: RendererConfig {
            poll_interval_ms: 10,
            ..RendererConfig::default()
        },
        output: OutputConfig {
            database_path: ":memory:".to_string(),
        },
        selectors: SelectorConfig {
            brand: "h1 > a".to_string(),
            review_count: "span.review-count".to_string(),
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

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(format!("<html><body>{}</body></html>", body))
        .insert_header("content-type", "text/html")
}

fn brand_list() -> ResponseTemplate {
    html(
        r#"<a data-at="brand_link" href="/brand/acme">Acme Labs</a>
           <a data-at="brand_link" href="/brand/aavrani">AAVRANI</a>
           <a data-at="brand_link" href="/brand/bolt">Bolt</a>"#
            .to_string(),
    )
}

fn listing(products: &[&str], next: Option<&str>) -> ResponseTemplate {
    let mut body: String = products
        .iter()
        .map(|p| format!(r#"<a class="css-klx76" href="/product/{}">{}</a>"#, p, p))
        .collect();
    match next {
        Some(href) => body.push_str(&format!(
            r#"<a data-at="pagination_next" href="{}">Next</a>"#,
            href
        )),
        None => body.push_str(
            r#"<a data-at="pagination_next" href="?currentPage=9" aria-disabled="true">Next</a>"#,
        ),
    }
    html(body)
}

struct ProductPage {
    brand: &'static str,
    page_data: bool,
    size: bool,
}

impl ProductPage {
    fn complete(brand: &'static str) -> Self {
        Self {
            brand,
            page_data: true,
            size: true,
        }
    }

    fn respond(&self) -> ResponseTemplate {
        let data = json!({"product": [{
            "attributes": {"skuId": "2345", "nthLevelCategory": "Face Serums", "isOutOfStock": false},
            "productInfo": {"productName": "Daily Serum"}
        }]});
        let script = if self.page_data {
            format!("<script>window.digitalData = {};</script>", data)
        } else {
            String::new()
        };
        let brand = if self.brand.is_empty() {
            String::new()
        } else {
            format!("<h1><a>{}</a></h1>", self.brand)
        };
        let size = if self.size {
            r#"<div class="size">1 oz/ 30 mL</div>"#
        } else {
            ""
        };

        html(format!(
            r#"{script}{brand}
            <span class="review-count">1.2K</span>
            <span class="stars" style="width: 86.5%"></span>
            <div class="likes">24.3K</div>
            <b class="price">$38.00</b>
            <img srcset="/img/serum-250.jpg 1x, /img/serum-500.jpg 2x" alt="Serum main-zoom">
            <div class="highlights"><span>Vegan</span></div>
            <div class="description">A daily serum.</div>
            <div id="ingredients">Water</div>
            <div id="howtouse">Apply.</div>
            {size}"#
        ))
    }
}

/// Mounts the mock catalog:
///
/// - acme: two listing pages, the first product only gets its embedded
///   data on the third load, the third product never shows a size
/// - aavrani: excluded, must never be requested
/// - bolt: one page, product without a brand heading
async fn mount_catalog(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/brands-list"))
        .respond_with(brand_list())
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/brand/acme"))
        .and(query_param("currentPage", "2"))
        .respond_with(listing(&["acme-toner-P3"], None))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/brand/acme"))
        .respond_with(listing(
            &["acme-serum-P1", "acme-balm-P2"],
            Some("/brand/acme?currentPage=2"),
        ))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/brand/bolt"))
        .respond_with(listing(&["bolt-mist-P4"], None))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/brand/aavrani"))
        .respond_with(listing(&["aavrani-oil-P9"], None))
        .mount(server)
        .await;

    // Mounted first, so it answers until it is used up
    Mock::given(method("GET"))
        .and(path("/product/acme-serum-P1"))
        .respond_with(
            ProductPage {
                page_data: false,
                ..ProductPage::complete("Acme Labs")
            }
            .respond(),
        )
        .up_to_n_times(2)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/product/acme-serum-P1"))
        .respond_with(ProductPage::complete("Acme Labs").respond())
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/product/acme-balm-P2"))
        .respond_with(ProductPage::complete("Acme Labs").respond())
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/product/acme-toner-P3"))
        .respond_with(
            ProductPage {
                size: false,
                ..ProductPage::complete("Acme Labs")
            }
            .respond(),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/product/bolt-mist-P4"))
        .respond_with(ProductPage::complete("").respond())
        .mount(server)
        .await;
}

async fn run_crawl(config: &Config, sink: Arc<dyn RecordSink>) -> CrawlReport {
    let renderer = Arc::new(
        HttpRenderer::new(&config.renderer, config.crawler.navigation_timeout())
            .expect("Failed to build renderer"),
    );

    Coordinator::new(config, renderer, sink)
        .expect("Failed to create coordinator")
        .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(5)))
        .run()
        .await
        .expect("Crawl failed")
}

/// Crawls into `sink`, keeping the frontier in the same database
async fn run_stored_crawl(config: &Config, sink: Arc<SqliteSink>) -> CrawlReport {
    let renderer = Arc::new(
        HttpRenderer::new(&config.renderer, config.crawler.navigation_timeout())
            .expect("Failed to build renderer"),
    );
    let frontier: Arc<dyn FrontierStore> = sink.clone();

    Coordinator::new(config, renderer, sink)
        .expect("Failed to create coordinator")
        .with_frontier_store(frontier)
        .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(5)))
        .run()
        .await
        .expect("Crawl failed")
}

/// Paths requested from the mock server, in arrival order
async fn requested_paths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .expect("Request recording is enabled")
        .iter()
        .map(|request| match request.url.query() {
            Some(query) => format!("{}?{}", request.url.path(), query),
            None => request.url.path().to_string(),
        })
        .collect()
}

#[tokio::test]
async fn test_full_catalog_crawl() {
    let mock_server = MockServer::start().await;
    mount_catalog(&mock_server).await;

    let config = create_test_config(&mock_server.uri(), 0);
    let sink = Arc::new(MemorySink::new());
    let started = chrono::Utc::now();
    let report = run_crawl(&config, sink.clone()).await;
    let finished = chrono::Utc::now();

    assert_eq!(report.saved, 3);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.dropped, 0);

    // Brand partitions: DOM brand for acme, request brand for bolt
    let acme = sink.records("acmelabs").unwrap();
    let mut ids: Vec<_> = acme.iter().map(|r| r.record.id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["acme-balm-P2", "acme-serum-P1"]);

    let bolt = sink.records("bolt").unwrap();
    assert_eq!(bolt.len(), 1);
    assert_eq!(bolt[0].record.brand, "Bolt");
    assert_eq!(bolt[0].record.id, "bolt-mist-P4");

    let serum = acme
        .iter()
        .find(|r| r.record.id == "acme-serum-P1")
        .unwrap();
    assert_eq!(serum.record.sku_id, "2345");
    assert_eq!(serum.record.name, "Daily Serum");
    assert_eq!(serum.record.reviews.average, 86.5);
    assert_eq!(serum.record.images.len(), 1);
    assert!(serum.record.images[0].url.ends_with("/img/serum-500.jpg"));
    assert!(serum.record.url.ends_with("/product/acme-serum-P1"));

    // Stamped at append time, after the two incomplete loads
    assert!(serum.saved_at >= started);
    assert!(serum.saved_at <= finished);
    assert!(acme.iter().chain(&bolt).all(|r| r.saved_at >= started));

    let paths = requested_paths(&mock_server).await;

    // The serum page is loaded once per attempt
    assert_eq!(
        paths.iter().filter(|p| *p == "/product/acme-serum-P1").count(),
        3
    );

    // Excluded brand is never visited
    assert!(!paths.iter().any(|p| p.starts_with("/brand/aavrani")));

    // Brand pages in chain order: pagination before the next brand
    let brand_pages: Vec<_> = paths
        .iter()
        .filter(|p| p.starts_with("/brand/"))
        .map(String::as_str)
        .collect();
    assert_eq!(
        brand_pages,
        vec!["/brand/acme", "/brand/acme?currentPage=2", "/brand/bolt"]
    );
}

#[tokio::test]
async fn test_crawl_into_sqlite_and_export() {
    let mock_server = MockServer::start().await;
    mount_catalog(&mock_server).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("catalog.db");

    let config = create_test_config(&mock_server.uri(), 0);
    let sink = Arc::new(SqliteSink::open(&db_path).expect("Failed to open database"));
    let run_id = sink.begin_run("test_hash").unwrap();

    run_crawl(&config, sink.clone()).await;
    sink.finish_run(RunStatus::Completed).unwrap();
    drop(sink);

    // Reopen to check what was persisted
    let sink = SqliteSink::open(&db_path).unwrap();
    let run = sink.get_run(run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "test_hash");

    let stats = load_statistics(&sink).unwrap();
    assert_eq!(stats.total_records, 3);
    assert_eq!(stats.partitions.len(), 2);

    let written = export_partitions(&sink, &dir.path().join("export")).unwrap();
    assert_eq!(written.len(), 2);
    assert!(written[0].ends_with("acmelabs.json"));
    assert!(written[1].ends_with("bolt.json"));

    let exported: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&written[1]).unwrap()).unwrap();
    assert_eq!(exported[0]["id"], "bolt-mist-P4");
    assert_eq!(exported[0]["price"]["currency"], "USD");
}

#[tokio::test]
async fn test_broken_brand_page_does_not_end_traversal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/brands-list"))
        .respond_with(brand_list())
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/brand/acme"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/brand/bolt"))
        .respond_with(listing(&["bolt-mist-P4"], None))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/product/bolt-mist-P4"))
        .respond_with(ProductPage::complete("Bolt").respond())
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), 1);
    let sink = Arc::new(MemorySink::new());
    let report = run_crawl(&config, sink.clone()).await;

    assert_eq!(report.retried, 1);
    assert_eq!(report.dropped, 1);
    assert_eq!(report.saved, 1);
    assert_eq!(sink.records("bolt").unwrap().len(), 1);

    let paths = requested_paths(&mock_server).await;
    assert_eq!(paths.iter().filter(|p| *p == "/brand/acme").count(), 2);
}

#[tokio::test]
async fn test_request_budget_stops_crawl() {
    let mock_server = MockServer::start().await;
    mount_catalog(&mock_server).await;

    let mut config = create_test_config(&mock_server.uri(), 0);
    config.crawler.max_requests = 2;
    let sink = Arc::new(MemorySink::new());
    let report = run_crawl(&config, sink.clone()).await;

    // Catalog root and the first acme page only
    assert_eq!(report.handled, 2);
    assert_eq!(sink.count().unwrap(), 0);

    let paths = requested_paths(&mock_server).await;
    assert_eq!(paths, vec!["/brands-list", "/brand/acme"]);
}

#[tokio::test]
async fn test_interrupted_crawl_resumes_after_reopen() {
    let mock_server = MockServer::start().await;
    mount_catalog(&mock_server).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("catalog.db");

    // First process: stops after the catalog root and the first acme page,
    // then goes away without closing the run
    let mut config = create_test_config(&mock_server.uri(), 0);
    config.crawler.max_requests = 2;
    let run_id = {
        let sink = Arc::new(SqliteSink::open(&db_path).expect("Failed to open database"));
        let run_id = sink.begin_run("test_hash").unwrap();
        let report = run_stored_crawl(&config, sink.clone()).await;
        assert_eq!(report.handled, 2);
        assert_eq!(sink.load_frontier().unwrap().len(), 3);
        run_id
    };

    // Second process: picks the run up from the database
    let sink = Arc::new(SqliteSink::open(&db_path).unwrap());
    let latest = sink.get_latest_run().unwrap().unwrap();
    assert_eq!(latest.id, run_id);
    assert!(latest.status.is_resumable());
    sink.resume_run(run_id).unwrap();

    config.crawler.max_requests = 100;
    let report = run_stored_crawl(&config, sink.clone()).await;
    sink.finish_run(RunStatus::Completed).unwrap();

    assert_eq!(report.saved, 3);
    assert_eq!(report.skipped, 1);
    assert_eq!(sink.count().unwrap(), 3);
    assert_eq!(sink.records("bolt").unwrap().len(), 1);
    assert!(sink.load_frontier().unwrap().is_empty());

    // Nothing handled before the interruption is fetched again
    let paths = requested_paths(&mock_server).await;
    assert_eq!(paths.iter().filter(|p| *p == "/brands-list").count(), 1);
    assert_eq!(paths.iter().filter(|p| *p == "/brand/acme").count(), 1);
    assert_eq!(
        paths
            .iter()
            .filter(|p| *p == "/brand/acme?currentPage=2")
            .count(),
        1
    );
}
