use crate::config::types::{
    CatalogConfig, Config, CrawlerConfig, OutputConfig, ProductConfig, RendererConfig,
};
use crate::extract::PageLocators;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_product_config(&config.product)?;
    validate_catalog_config(&config.catalog)?;
    validate_renderer_config(&config.renderer)?;
    validate_output_config(&config.output)?;
    PageLocators::from_config(&config.selectors)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_requests < 1 {
        return Err(ConfigError::Validation(format!(
            "max_requests must be >= 1, got {}",
            config.max_requests
        )));
    }

    if config.max_concurrent_pages < 1 || config.max_concurrent_pages > 64 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_pages must be between 1 and 64, got {}",
            config.max_concurrent_pages
        )));
    }

    for (name, value) in [
        ("navigation_timeout_secs", config.navigation_timeout_secs),
        ("selector_timeout_secs", config.selector_timeout_secs),
        ("handler_timeout_secs", config.handler_timeout_secs),
    ] {
        if value < 1 {
            return Err(ConfigError::Validation(format!(
                "{} must be >= 1, got {}",
                name, value
            )));
        }
    }

    Ok(())
}

/// Validates product retry configuration
fn validate_product_config(config: &ProductConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 || config.max_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be between 1 and 10, got {}",
            config.max_attempts
        )));
    }

    if config.settle_min_ms > config.settle_max_ms {
        return Err(ConfigError::Validation(format!(
            "settle_min_ms ({}) cannot exceed settle_max_ms ({})",
            config.settle_min_ms, config.settle_max_ms
        )));
    }

    if config.metadata_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "metadata_timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates the catalog entry point and brand skip list
fn validate_catalog_config(config: &CatalogConfig) -> Result<(), ConfigError> {
    validate_http_url("seed_url", &config.seed_url)?;

    if config.skip_brands.iter().any(|name| name.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "skip_brands cannot contain empty names".to_string(),
        ));
    }

    Ok(())
}

/// Validates renderer configuration
fn validate_renderer_config(config: &RendererConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    for proxy in &config.proxies {
        Url::parse(proxy)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy '{}': {}", proxy, e)))?;
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates that a URL parses and uses an HTTP(S) scheme
fn validate_http_url(name: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", name, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must use HTTP or HTTPS",
            name, value
        )));
    }

    Ok(())
}
