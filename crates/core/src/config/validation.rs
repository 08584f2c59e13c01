//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Upper bound on any single byte limit.
const MAX_BYTES_LIMIT: usize = 50 * 1024 * 1024;

/// Upper bound on the preview TTL (30 days).
const MAX_CACHE_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_html_bytes` or `max_image_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `probe_timeout_ms` is 0 or not strictly less than `timeout_ms`
    /// - `max_redirects` exceeds 20
    /// - `cache_ttl_secs`, `local_cache_capacity` or `dns_concurrency` is 0
    /// - `cache_ttl_secs` exceeds 30 days
    /// - `user_agent` is empty
    /// - `proxy_path` does not start with `/`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_html_bytes == 0 {
            return Err(invalid("max_html_bytes", "must be greater than 0"));
        }
        if self.max_html_bytes > MAX_BYTES_LIMIT {
            return Err(invalid("max_html_bytes", "must not exceed 50MB"));
        }
        if self.max_image_bytes == 0 {
            return Err(invalid("max_image_bytes", "must be greater than 0"));
        }
        if self.max_image_bytes > MAX_BYTES_LIMIT {
            return Err(invalid("max_image_bytes", "must not exceed 50MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }
        if self.probe_timeout_ms == 0 {
            return Err(invalid("probe_timeout_ms", "must be greater than 0"));
        }
        if self.probe_timeout_ms >= self.timeout_ms {
            return Err(invalid("probe_timeout_ms", "must be strictly less than timeout_ms"));
        }

        if self.max_redirects > 20 {
            return Err(invalid("max_redirects", "must not exceed 20"));
        }

        if self.cache_ttl_secs == 0 {
            return Err(invalid("cache_ttl_secs", "must be greater than 0"));
        }
        if self.cache_ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(invalid("cache_ttl_secs", "must not exceed 30 days (2592000s)"));
        }
        if self.local_cache_capacity == 0 {
            return Err(invalid("local_cache_capacity", "must be greater than 0"));
        }
        if self.dns_concurrency == 0 {
            return Err(invalid("dns_concurrency", "must be greater than 0"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if !self.proxy_path.starts_with('/') {
            return Err(invalid("proxy_path", "must start with '/'"));
        }

        Ok(())
    }
}
