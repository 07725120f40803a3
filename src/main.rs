//! Catalog-Sweep main entry point
//!
//! This is the command-line interface for the Catalog-Sweep brand crawler.

use anyhow::Context;
use catalog_sweep::config::{load_config_with_hash, Config};
use catalog_sweep::extract::PageLocators;
use catalog_sweep::output::{export_partitions, load_statistics, print_report, print_statistics};
use catalog_sweep::render::HttpRenderer;
use catalog_sweep::storage::{open_sink, FrontierStore, RecordSink, RunStatus, SqliteSink};
use catalog_sweep::{Coordinator, SweepError};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Catalog-Sweep: a brand-by-brand catalog crawler
///
/// Catalog-Sweep walks a catalog's brand list one brand at a time, follows
/// each brand's pagination, and stores a structured record for every
/// product page in a brand-partitioned database.
#[derive(Parser, Debug)]
#[command(name = "catalog-sweep")]
#[command(version = "1.0.0")]
#[command(about = "A brand-by-brand catalog crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Start a fresh crawl instead of resuming an interrupted one
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "export"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export"])]
    stats: bool,

    /// Write every brand partition as JSON into DIR and exit
    #[arg(long, value_name = "DIR", conflicts_with_all = ["dry_run", "stats"])]
    export: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.stats {
        handle_stats(&config)
    } else if let Some(dir) = &cli.export {
        handle_export(&config, dir)
    } else {
        handle_crawl(config, &config_hash, cli.fresh).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_sweep=info,warn"),
            1 => EnvFilter::new("catalog_sweep=debug,info"),
            2 => EnvFilter::new("catalog_sweep=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Catalog-Sweep Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max requests: {}", config.crawler.max_requests);
    println!(
        "  Max concurrent pages: {}",
        config.crawler.max_concurrent_pages
    );
    println!(
        "  Navigation timeout: {}s",
        config.crawler.navigation_timeout_secs
    );
    println!("  Handler timeout: {}s", config.crawler.handler_timeout_secs);
    println!(
        "  Max request retries: {}",
        config.crawler.max_request_retries
    );

    println!("\nProduct Pages:");
    println!("  Attempts: {}", config.product.max_attempts);
    println!("  Retry delay: {}ms", config.product.retry_delay_ms);
    println!(
        "  Settle delay: {}-{}ms",
        config.product.settle_min_ms, config.product.settle_max_ms
    );

    println!("\nRenderer:");
    println!("  User agent: {}", config.renderer.user_agent);
    if config.renderer.proxies.is_empty() {
        println!("  Proxies: none (direct connections)");
    } else {
        println!("  Proxies ({}):", config.renderer.proxies.len());
        for proxy in &config.renderer.proxies {
            println!("    * {}", proxy);
        }
    }

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\nSkipped Brands ({}):", config.catalog.skip_brands.len());
    for brand in &config.catalog.skip_brands {
        println!("  - {}", brand);
    }

    PageLocators::from_config(&config.selectors)?;

    println!("\n✓ Configuration is valid");
    println!("✓ Would start crawling from {}", config.catalog.seed_url);

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let sink = open_sink(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&sink)?;
    let latest_run = sink.get_latest_run()?;

    print_statistics(&stats, latest_run.as_ref());

    Ok(())
}

/// Handles the --export mode: writes one JSON file per brand partition
fn handle_export(config: &Config, dir: &Path) -> anyhow::Result<()> {
    println!("=== Exporting Partitions ===\n");
    println!("Database: {}", config.output.database_path);
    println!("Output: {}", dir.display());
    println!();

    let sink = open_sink(Path::new(&config.output.database_path))?;
    let written = export_partitions(&sink, dir)
        .with_context(|| format!("exporting partitions to {}", dir.display()))?;

    println!("✓ Exported {} partitions to: {}", written.len(), dir.display());

    Ok(())
}

/// Resumes the latest interrupted run, or starts a new one
fn open_run(sink: &SqliteSink, config_hash: &str, fresh: bool) -> anyhow::Result<i64> {
    if fresh {
        tracing::info!("Starting fresh crawl (ignoring previous state)");
        sink.clear_frontier()?;
        return Ok(sink.begin_run(config_hash)?);
    }

    match sink.get_latest_run()? {
        Some(run) if run.status.is_resumable() => {
            if run.config_hash != config_hash {
                tracing::warn!(
                    "Configuration changed since run {} started (hash {})",
                    run.id,
                    run.config_hash
                );
            }
            sink.resume_run(run.id)?;
            tracing::info!("Resuming {} run {}", run.status.to_db_string(), run.id);
            Ok(run.id)
        }
        _ => {
            tracing::info!("No interrupted run found, starting new run");
            Ok(sink.begin_run(config_hash)?)
        }
    }
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: &str, fresh: bool) -> anyhow::Result<()> {
    tracing::info!(
        "Seed: {}, skipped brands: {}",
        config.catalog.seed_url,
        config.catalog.skip_brands.len()
    );

    let sink = Arc::new(
        open_sink(Path::new(&config.output.database_path))
            .with_context(|| format!("opening {}", config.output.database_path))?,
    );
    let run_id = open_run(&sink, config_hash, fresh)?;
    tracing::info!("Crawl run {}", run_id);

    let renderer = Arc::new(HttpRenderer::new(
        &config.renderer,
        config.crawler.navigation_timeout(),
    )?);
    let records: Arc<dyn RecordSink> = sink.clone();
    let frontier: Arc<dyn FrontierStore> = sink.clone();
    let result = match Coordinator::new(&config, renderer, records) {
        Ok(coordinator) => coordinator.with_frontier_store(frontier).run().await,
        Err(e) => Err(e),
    };

    let status = match &result {
        Ok(_) => RunStatus::Completed,
        Err(SweepError::RendererExhausted(_)) => RunStatus::Aborted,
        Err(_) => RunStatus::Failed,
    };
    sink.finish_run(status)?;

    match result {
        Ok(report) => {
            tracing::info!("Crawl run {} completed", run_id);
            print_report(&report);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl run {} {}: {}", run_id, status.to_db_string(), e);
            Err(e.into())
        }
    }
}
