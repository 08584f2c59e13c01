//! Two-tier preview cache.
//!
//! Previews are stored as serialized JSON under a key derived from the
//! requested URL. Tiers:
//!
//! - [`RedisCache`]: distributed TTL store reached over the network
//! - [`MemoryCache`]: bounded in-process map with lazy expiry sweeps
//! - [`FallbackCache`]: routes to redis while it is healthy, otherwise to
//!   the in-process tier
//!
//! Callers treat every cache operation as best-effort.

pub mod fallback;
pub mod hash;
pub mod memory;
pub mod remote;

pub use crate::Error;

pub use fallback::FallbackCache;
pub use hash::compute_cache_key;
pub use memory::MemoryCache;
pub use remote::RedisCache;

use crate::PreviewResult;
use async_trait::async_trait;
use std::time::Duration;

/// Common interface over cache tiers.
#[async_trait]
pub trait PreviewCache: Send + Sync {
    /// Look up a preview; expired and missing entries are both `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<PreviewResult>, Error>;

    /// Store a preview, replacing any existing entry.
    async fn set(&self, key: &str, value: &PreviewResult, ttl: Duration) -> Result<(), Error>;

    /// Short name of the tier currently serving requests.
    fn backend(&self) -> &'static str;
}
