//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (UNFURL_*, plus the conventional REDIS_URL)
//! 2. TOML config file (if UNFURL_CONFIG_FILE set)
//! 3. Built-in defaults

use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Desktop browser User-Agent; many storefronts serve bots a stripped page.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (UNFURL_*, REDIS_URL)
/// 2. TOML file from `UNFURL_CONFIG_FILE` (if set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Socket address the HTTP server binds to.
    ///
    /// Set via UNFURL_BIND_ADDR environment variable.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Redis connection URL for the distributed cache tier.
    ///
    /// Set via REDIS_URL or UNFURL_REDIS_URL. When unset, only the
    /// in-process cache is used.
    #[serde(default)]
    pub redis_url: Option<String>,

    /// User-Agent string for outbound requests.
    ///
    /// Set via UNFURL_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Page fetch timeout in milliseconds.
    ///
    /// Set via UNFURL_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Image HEAD probe timeout in milliseconds; must stay below `timeout_ms`.
    ///
    /// Set via UNFURL_PROBE_TIMEOUT_MS environment variable.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Maximum number of redirects to follow.
    ///
    /// Set via UNFURL_MAX_REDIRECTS environment variable.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Maximum HTML bytes read per page; larger pages are truncated.
    ///
    /// Set via UNFURL_MAX_HTML_BYTES environment variable.
    #[serde(default = "default_max_html_bytes")]
    pub max_html_bytes: usize,

    /// Maximum bytes streamed through the image proxy.
    ///
    /// Set via UNFURL_MAX_IMAGE_BYTES environment variable.
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,

    /// Preview cache TTL in seconds.
    ///
    /// Set via UNFURL_CACHE_TTL_SECS environment variable.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Maximum entries held by the in-process cache tier.
    #[serde(default = "default_local_cache_capacity")]
    pub local_cache_capacity: usize,

    /// Per-operation timeout for the redis tier in milliseconds.
    #[serde(default = "default_cache_op_timeout_ms")]
    pub cache_op_timeout_ms: u64,

    /// Timeout for the startup redis health check in milliseconds.
    #[serde(default = "default_cache_connect_timeout_ms")]
    pub cache_connect_timeout_ms: u64,

    /// Interval between redis health checks; 0 disables re-evaluation.
    #[serde(default = "default_cache_health_interval_secs")]
    pub cache_health_interval_secs: u64,

    /// DNS resolution timeout in milliseconds.
    #[serde(default = "default_dns_timeout_ms")]
    pub dns_timeout_ms: u64,

    /// Maximum concurrent DNS lookups on the blocking pool.
    #[serde(default = "default_dns_concurrency")]
    pub dns_concurrency: usize,

    /// Path of the image proxy endpoint, used to build `image_proxy_url`.
    #[serde(default = "default_proxy_path")]
    pub proxy_path: String,

    /// `max-age` advertised on proxied images.
    #[serde(default = "default_image_max_age_secs")]
    pub image_max_age_secs: u64,

    /// Emit JSON log lines (default) instead of human-readable output.
    ///
    /// Set via UNFURL_LOG_JSON environment variable.
    #[serde(default = "default_true")]
    pub log_json: bool,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".into()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.into()
}

fn default_timeout_ms() -> u64 {
    8_000
}

fn default_probe_timeout_ms() -> u64 {
    3_000
}

fn default_max_redirects() -> usize {
    5
}

fn default_max_html_bytes() -> usize {
    2_097_152 // 2MB
}

fn default_max_image_bytes() -> usize {
    10_485_760 // 10MB
}

fn default_cache_ttl_secs() -> u64 {
    21_600 // 6 hours
}

fn default_local_cache_capacity() -> usize {
    10_000
}

fn default_cache_op_timeout_ms() -> u64 {
    500
}

fn default_cache_connect_timeout_ms() -> u64 {
    1_000
}

fn default_cache_health_interval_secs() -> u64 {
    30
}

fn default_dns_timeout_ms() -> u64 {
    2_000
}

fn default_dns_concurrency() -> usize {
    32
}

fn default_proxy_path() -> String {
    "/img-proxy".into()
}

fn default_image_max_age_secs() -> u64 {
    86_400
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            redis_url: None,
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            max_redirects: default_max_redirects(),
            max_html_bytes: default_max_html_bytes(),
            max_image_bytes: default_max_image_bytes(),
            cache_ttl_secs: default_cache_ttl_secs(),
            local_cache_capacity: default_local_cache_capacity(),
            cache_op_timeout_ms: default_cache_op_timeout_ms(),
            cache_connect_timeout_ms: default_cache_connect_timeout_ms(),
            cache_health_interval_secs: default_cache_health_interval_secs(),
            dns_timeout_ms: default_dns_timeout_ms(),
            dns_concurrency: default_dns_concurrency(),
            proxy_path: default_proxy_path(),
            image_max_age_secs: default_image_max_age_secs(),
            log_json: true,
        }
    }
}

impl AppConfig {
    /// Fetch timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn cache_op_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_op_timeout_ms)
    }

    pub fn cache_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_connect_timeout_ms)
    }

    /// `None` when periodic health checks are disabled.
    pub fn cache_health_interval(&self) -> Option<Duration> {
        (self.cache_health_interval_secs > 0).then(|| Duration::from_secs(self.cache_health_interval_secs))
    }

    pub fn dns_timeout(&self) -> Duration {
        Duration::from_millis(self.dns_timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `UNFURL_`
    /// 2. `REDIS_URL`
    /// 3. TOML file from `UNFURL_CONFIG_FILE` (if set)
    /// 4. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Self::figment().extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("UNFURL_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment
            .merge(Env::raw().only(&["REDIS_URL"]).map(|key| key.as_str().to_lowercase().into()))
            .merge(
                Env::prefixed("UNFURL_")
                    .ignore(&["CONFIG_FILE"])
                    .map(|key| key.as_str().to_lowercase().into())
                    .split("__"),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.timeout_ms, 8_000);
        assert_eq!(config.probe_timeout_ms, 3_000);
        assert_eq!(config.max_redirects, 5);
        assert_eq!(config.max_html_bytes, 2 * 1024 * 1024);
        assert_eq!(config.cache_ttl_secs, 6 * 60 * 60);
        assert_eq!(config.proxy_path, "/img-proxy");
        assert_eq!(config.image_max_age_secs, 86_400);
        assert!(config.redis_url.is_none());
        assert!(config.log_json);
    }

    #[test]
    fn test_durations() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(8));
        assert_eq!(config.probe_timeout(), Duration::from_secs(3));
        assert_eq!(config.cache_ttl(), Duration::from_secs(21_600));
        assert_eq!(config.cache_health_interval(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_health_interval_zero_disables() {
        let config = AppConfig { cache_health_interval_secs: 0, ..Default::default() };
        assert!(config.cache_health_interval().is_none());
    }

    #[test]
    fn test_load_from_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("UNFURL_TIMEOUT_MS", "5000");
            jail.set_env("UNFURL_MAX_HTML_BYTES", "1024");
            jail.set_env("REDIS_URL", "redis://cache:6379/0");

            let config = AppConfig::load().expect("config loads");
            assert_eq!(config.timeout_ms, 5_000);
            assert_eq!(config.max_html_bytes, 1024);
            assert_eq!(config.redis_url.as_deref(), Some("redis://cache:6379/0"));
            Ok(())
        });
    }

    #[test]
    fn test_prefixed_redis_url_wins() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("REDIS_URL", "redis://plain:6379/0");
            jail.set_env("UNFURL_REDIS_URL", "redis://prefixed:6379/0");

            let config = AppConfig::load().expect("config loads");
            assert_eq!(config.redis_url.as_deref(), Some("redis://prefixed:6379/0"));
            Ok(())
        });
    }

    #[test]
    fn test_load_from_toml_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("unfurl.toml", "bind_addr = \"127.0.0.1:9000\"\ncache_ttl_secs = 60\n")?;
            jail.set_env("UNFURL_CONFIG_FILE", "unfurl.toml");

            let config = AppConfig::load().expect("config loads");
            assert_eq!(config.bind_addr, "127.0.0.1:9000");
            assert_eq!(config.cache_ttl_secs, 60);
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("UNFURL_PROBE_TIMEOUT_MS", "9000");

            let result = AppConfig::load();
            assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "probe_timeout_ms"));
            Ok(())
        });
    }
}
