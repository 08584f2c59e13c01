//! Image relay for hotlink-protected images.

use crate::fetch::{FetchClient, ImageStream, parse_target};
use std::sync::Arc;
use unfurl_core::Error;

/// Streams remote images to callers through the guarded fetcher.
pub struct ImageProxy {
    fetcher: Arc<FetchClient>,
}

impl ImageProxy {
    pub fn new(fetcher: Arc<FetchClient>) -> Self {
        Self { fetcher }
    }

    /// Open `src` for relaying.
    ///
    /// Fails before any byte is relayed when the URL is invalid or blocked,
    /// the upstream status is not a success, or the content is not an image.
    pub async fn open(&self, src: &str) -> Result<ImageStream, Error> {
        let url = parse_target(src)?;
        let stream = self.fetcher.fetch_image(&url).await.inspect_err(|e| {
            tracing::debug!("image proxy for {} failed: {}", url, e);
        })?;
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchConfig, SsrfError, UrlGuard};
    use async_trait::async_trait;
    use url::Url;

    struct DenyAll;

    #[async_trait]
    impl UrlGuard for DenyAll {
        async fn validate(&self, _url: &Url) -> Result<(), SsrfError> {
            Err(SsrfError::BlockedIp("127.0.0.1".parse().unwrap()))
        }
    }

    fn proxy() -> ImageProxy {
        let fetcher = FetchClient::new(FetchConfig::default(), Arc::new(DenyAll)).unwrap();
        ImageProxy::new(Arc::new(fetcher))
    }

    #[tokio::test]
    async fn test_invalid_src() {
        let err = proxy().open("javascript:alert(1)").await.unwrap_err();
        assert_eq!(err.code(), "INVALID_URL");

        let err = proxy().open("").await.unwrap_err();
        assert_eq!(err.code(), "INVALID_URL");
    }

    #[tokio::test]
    async fn test_blocked_src() {
        let err = proxy().open("http://127.0.0.1/secret.png").await.unwrap_err();
        assert_eq!(err.code(), "SSRF_BLOCKED");
    }
}
