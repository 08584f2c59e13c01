//! The unfurl pipeline: guard, cache, fetch, extract, probe, store.

use crate::extract::extract;
use crate::fetch::{PageFetcher, UrlGuard, parse_target};
use crate::probe::{ImageProber, ProbeOutcome, proxy_url};
use std::sync::Arc;
use std::time::Duration;
use unfurl_core::cache::compute_cache_key;
use unfurl_core::{AppConfig, Error, PreviewCache, PreviewResult};

/// Tunables for [`Unfurler`].
#[derive(Debug, Clone)]
pub struct UnfurlSettings {
    /// How long a preview stays cached (default: 6h)
    pub cache_ttl: Duration,
    /// Path the image proxy is mounted at (default: `/img-proxy`)
    pub proxy_path: String,
}

impl Default for UnfurlSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for UnfurlSettings {
    fn from(config: &AppConfig) -> Self {
        Self { cache_ttl: config.cache_ttl(), proxy_path: config.proxy_path.clone() }
    }
}

/// Turns a requested URL into a cached [`PreviewResult`].
pub struct Unfurler {
    guard: Arc<dyn UrlGuard>,
    fetcher: Arc<dyn PageFetcher>,
    prober: Arc<dyn ImageProber>,
    cache: Arc<dyn PreviewCache>,
    settings: UnfurlSettings,
}

impl Unfurler {
    pub fn new(
        guard: Arc<dyn UrlGuard>, fetcher: Arc<dyn PageFetcher>, prober: Arc<dyn ImageProber>,
        cache: Arc<dyn PreviewCache>, settings: UnfurlSettings,
    ) -> Self {
        Self { guard, fetcher, prober, cache, settings }
    }

    /// Preview `requested`.
    ///
    /// The URL is validated before the cache is consulted, so a blocked URL
    /// never produces a hit. Cache failures are logged and otherwise ignored.
    pub async fn unfurl(&self, requested: &str) -> Result<PreviewResult, Error> {
        let url = parse_target(requested)?;
        self.guard.validate(&url).await?;

        let key = compute_cache_key(requested);
        match self.cache.get(&key).await {
            Ok(Some(hit)) => {
                tracing::debug!("cache hit for {} ({})", url, self.cache.backend());
                return Ok(hit);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("cache read failed for {}: {}", url, e),
        }

        let page = self.fetcher.fetch_html(&url).await?;
        let final_url = page.final_url.clone();
        let mut preview = tokio::task::spawn_blocking(move || extract(&page.text(), &final_url))
            .await
            .map_err(|e| Error::Internal(format!("extraction task failed: {e}")))?;

        if let Some(image) = preview.image.as_deref()
            && self.prober.probe(image).await == ProbeOutcome::NeedsProxy
        {
            preview.image_proxy_url = Some(proxy_url(&self.settings.proxy_path, image));
        }

        if let Err(e) = self.cache.set(&key, &preview, self.settings.cache_ttl).await {
            tracing::warn!("cache write failed for {}: {}", url, e);
        }

        tracing::debug!("unfurled {} -> {} via {}", url, preview.url, preview.source.as_str());
        Ok(preview)
    }
}
