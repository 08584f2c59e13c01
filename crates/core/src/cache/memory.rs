//! In-process cache tier.
//!
//! Bounded map of serialized previews with per-entry expiry. Expired entries
//! read as absent and are swept on the next insert; when the map is still at
//! capacity after the sweep, the entry closest to expiry is evicted.

use super::PreviewCache;
use crate::{Error, PreviewResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Longest lifetime a local entry can have; longer TTLs are clamped.
const MAX_ENTRY_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

struct CachedPreview {
    json: String,
    expires_at: Instant,
}

impl CachedPreview {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Process-local preview cache.
#[derive(Clone)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, CachedPreview>>>,
    capacity: usize,
}

impl MemoryCache {
    /// Create a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self { entries: Arc::new(RwLock::new(HashMap::new())), capacity: capacity.max(1) }
    }

    /// Number of stored entries, expired ones included until the next sweep.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl PreviewCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<PreviewResult>, Error> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(cached) if !cached.is_expired(Instant::now()) => Ok(Some(serde_json::from_str(&cached.json)?)),
            _ => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &PreviewResult, ttl: Duration) -> Result<(), Error> {
        let json = serde_json::to_string(value)?;
        let now = Instant::now();
        let expires_at = now + ttl.min(MAX_ENTRY_TTL);

        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), CachedPreview { json, expires_at });

        let before = entries.len();
        entries.retain(|_, cached| !cached.is_expired(now));
        if before != entries.len() {
            tracing::debug!("swept {} expired preview(s) from local cache", before - entries.len());
        }

        while entries.len() > self.capacity {
            let Some(oldest) = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .min_by_key(|(_, cached)| cached.expires_at)
                .map(|(k, _)| k.clone())
            else {
                break;
            };
            entries.remove(&oldest);
        }

        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
