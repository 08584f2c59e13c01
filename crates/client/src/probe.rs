//! Image accessibility probing.
//!
//! Hotlink-protected CDNs answer 401/403 to clients that are not the page
//! itself. A short `HEAD` tells whether the discovered image can be used
//! directly or has to go through the image proxy.

use crate::fetch::{UrlGuard, parse_target};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;

/// Whether an image can be loaded directly by the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Accessible,
    NeedsProxy,
}

/// Decides whether an image URL needs the proxy.
#[async_trait]
pub trait ImageProber: Send + Sync {
    async fn probe(&self, image_url: &str) -> ProbeOutcome;
}

/// Prober issuing a single guarded `HEAD` without following redirects.
pub struct HeadProber {
    http: Client,
    guard: Arc<dyn UrlGuard>,
    timeout: Duration,
}

impl HeadProber {
    /// `http` must have automatic redirects disabled.
    pub fn new(http: Client, guard: Arc<dyn UrlGuard>, timeout: Duration) -> Self {
        Self { http, guard, timeout }
    }
}

#[async_trait]
impl ImageProber for HeadProber {
    async fn probe(&self, image_url: &str) -> ProbeOutcome {
        let url = match parse_target(image_url) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("image {} unparseable, proxying: {}", image_url, e);
                return ProbeOutcome::NeedsProxy;
            }
        };

        if let Err(e) = self.guard.validate(&url).await {
            tracing::debug!("image {} rejected by guard, proxying: {}", url, e);
            return ProbeOutcome::NeedsProxy;
        }

        match self.http.head(url.as_str()).timeout(self.timeout).send().await {
            Ok(response) => classify(response.status()),
            Err(e) => {
                tracing::debug!("image HEAD {} failed, proxying: {}", url, e);
                ProbeOutcome::NeedsProxy
            }
        }
    }
}

fn classify(status: StatusCode) -> ProbeOutcome {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProbeOutcome::NeedsProxy,
        _ => ProbeOutcome::Accessible,
    }
}

/// Same-origin proxy path for `image`.
pub fn proxy_url(proxy_path: &str, image: &str) -> String {
    format!("{proxy_path}?src={}", urlencoding::encode(image))
}
