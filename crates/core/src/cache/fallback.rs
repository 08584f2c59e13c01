//! Tier selection between redis and the in-process cache.
//!
//! The primary tier is chosen by one health check at startup. An operation
//! failure on the primary trips the tier over to the local cache; only the
//! periodic health check (owned by the caller via [`FallbackCache::spawn_health_check`])
//! moves it back. Requests never reconnect inline.

use super::{MemoryCache, PreviewCache, RedisCache};
use crate::{Error, PreviewResult};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Preview cache that prefers redis and falls back to process memory.
pub struct FallbackCache {
    redis_url: Option<String>,
    primary: RwLock<Option<RedisCache>>,
    primary_healthy: AtomicBool,
    local: MemoryCache,
    connect_timeout: Duration,
    op_timeout: Duration,
}

impl FallbackCache {
    /// Cache with no distributed tier.
    pub fn local_only(local: MemoryCache) -> Self {
        Self {
            redis_url: None,
            primary: RwLock::new(None),
            primary_healthy: AtomicBool::new(false),
            local,
            connect_timeout: Duration::ZERO,
            op_timeout: Duration::ZERO,
        }
    }

    /// Run the startup health check and select the serving tier.
    ///
    /// Never fails: an unreachable redis leaves the local tier in charge.
    pub async fn connect(
        redis_url: Option<&str>, local: MemoryCache, connect_timeout: Duration, op_timeout: Duration,
    ) -> Self {
        let Some(url) = redis_url else {
            tracing::warn!("redis_url not set; previews are cached in-process only");
            return Self::local_only(local);
        };

        let cache = Self {
            redis_url: Some(url.to_string()),
            primary: RwLock::new(None),
            primary_healthy: AtomicBool::new(false),
            local,
            connect_timeout,
            op_timeout,
        };

        if cache.check_health().await {
            tracing::info!("preview cache: redis tier selected");
        } else {
            tracing::warn!("preview cache: redis unavailable at startup, using in-process tier");
        }

        cache
    }

    pub fn is_primary_healthy(&self) -> bool {
        self.primary_healthy.load(Ordering::Acquire)
    }

    /// Ping (or first connect to) redis and record the outcome.
    pub async fn check_health(&self) -> bool {
        let Some(url) = self.redis_url.as_deref() else {
            return false;
        };

        let existing = self.primary.read().await.clone();
        let healthy = match existing {
            Some(primary) => match primary.ping().await {
                Ok(()) => true,
                Err(e) => {
                    tracing::debug!("redis health check failed: {e}");
                    false
                }
            },
            None => match RedisCache::connect(url, self.connect_timeout, self.op_timeout).await {
                Ok(primary) => {
                    *self.primary.write().await = Some(primary);
                    true
                }
                Err(e) => {
                    tracing::debug!("redis connect failed: {e}");
                    false
                }
            },
        };

        let was_healthy = self.primary_healthy.swap(healthy, Ordering::AcqRel);
        if was_healthy != healthy {
            tracing::info!(healthy, "preview cache redis tier health changed");
        }
        healthy
    }

    /// Periodically re-evaluate redis health until the handle is aborted.
    ///
    /// Returns `None` when no redis URL is configured.
    pub fn spawn_health_check(self: &Arc<Self>, every: Duration) -> Option<JoinHandle<()>> {
        self.redis_url.as_ref()?;

        let cache = Arc::clone(self);
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                cache.check_health().await;
            }
        }))
    }

    async fn active_primary(&self) -> Option<RedisCache> {
        if !self.is_primary_healthy() {
            return None;
        }
        self.primary.read().await.clone()
    }

    fn trip(&self, op: &str, err: &Error) {
        if self.primary_healthy.swap(false, Ordering::AcqRel) {
            tracing::warn!("redis {op} failed, switching to in-process cache: {err}");
        }
    }
}

#[async_trait]
impl PreviewCache for FallbackCache {
    async fn get(&self, key: &str) -> Result<Option<PreviewResult>, Error> {
        if let Some(primary) = self.active_primary().await {
            match primary.get(key).await {
                Ok(value) => return Ok(value),
                Err(e) => self.trip("get", &e),
            }
        }
        self.local.get(key).await
    }

    async fn set(&self, key: &str, value: &PreviewResult, ttl: Duration) -> Result<(), Error> {
        if let Some(primary) = self.active_primary().await {
            match primary.set(key, value, ttl).await {
                Ok(()) => return Ok(()),
                Err(e) => self.trip("set", &e),
            }
        }
        self.local.set(key, value, ttl).await
    }

    fn backend(&self) -> &'static str {
        if self.is_primary_healthy() { "redis" } else { "memory" }
    }
}
