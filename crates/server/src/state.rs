//! Process-wide services, built once at startup.

use std::sync::Arc;
use tokio::task::JoinHandle;
use unfurl_client::{
    FetchClient, FetchConfig, HeadProber, ImageProxy, SsrfGuard, SystemResolver, UnfurlSettings, Unfurler, UrlGuard,
    build_http_client,
};
use unfurl_core::{AppConfig, Error, FallbackCache, MemoryCache, PreviewCache};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub unfurler: Arc<Unfurler>,
    pub proxy: Arc<ImageProxy>,
    pub cache: Arc<dyn PreviewCache>,
    pub proxy_path: String,
    pub image_max_age_secs: u64,
}

/// Owns the handler state plus the background cache health loop.
pub struct Services {
    pub state: AppState,
    health_check: Option<JoinHandle<()>>,
}

impl Services {
    /// Build HTTP clients, the guard, the cache and the unfurl pipeline.
    ///
    /// Redis being unreachable is not an error; the in-process tier serves
    /// until the health loop sees redis come back.
    pub async fn init(config: &AppConfig) -> Result<Self, Error> {
        let resolver = Arc::new(SystemResolver::new(config.dns_concurrency, config.dns_timeout()));
        let guard: Arc<dyn UrlGuard> = Arc::new(SsrfGuard::new(resolver));

        let cache = Arc::new(
            FallbackCache::connect(
                config.redis_url.as_deref(),
                MemoryCache::new(config.local_cache_capacity),
                config.cache_connect_timeout(),
                config.cache_op_timeout(),
            )
            .await,
        );
        let health_check = config
            .cache_health_interval()
            .and_then(|every| cache.spawn_health_check(every));

        let state = build_state(config, guard, cache)?;
        tracing::info!(cache = state.cache.backend(), "services initialized");

        Ok(Self { state, health_check })
    }

    /// Stop background tasks.
    pub fn shutdown(self) {
        if let Some(task) = self.health_check {
            task.abort();
        }
        tracing::info!("services stopped");
    }
}

/// Wire the pipeline around an existing guard and cache.
pub fn build_state(config: &AppConfig, guard: Arc<dyn UrlGuard>, cache: Arc<dyn PreviewCache>) -> Result<AppState, Error> {
    let http = build_http_client(&config.user_agent, config.timeout())?;
    let fetcher = Arc::new(FetchClient::with_client(http.clone(), FetchConfig::from(config), guard.clone()));
    let prober = Arc::new(HeadProber::new(http, guard.clone(), config.probe_timeout()));

    let unfurler = Arc::new(Unfurler::new(guard, fetcher.clone(), prober, cache.clone(), UnfurlSettings::from(config)));
    let proxy = Arc::new(ImageProxy::new(fetcher));

    Ok(AppState {
        unfurler,
        proxy,
        cache,
        proxy_path: config.proxy_path.clone(),
        image_max_age_secs: config.image_max_age_secs,
    })
}
