//! HTTP fetch pipeline with SSRF protection on every hop.
//!
//! ### Redirects
//! - The HTTP client never follows redirects itself.
//! - 301/302/303/307/308 with a `Location` header are followed manually; the
//!   guard validates every hop before it is contacted.
//! - Max redirects: 5 (configurable)
//!
//! ### Limits
//! - HTML responses must be `text/html`; the decoded body is capped at
//!   `max_html_bytes` and returned truncated rather than rejected.
//! - Image responses must be `image/*` and are streamed with a running byte
//!   count that aborts past `max_image_bytes`.
//! - Whole-request timeout for HTML, idle timeout between image chunks.

pub mod resolver;
pub mod ssrf;
pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::{Client, Response, StatusCode, Url, header};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub use self::url::{UrlError, parse_target};
pub use resolver::{Resolver, SystemResolver};
pub use ssrf::{SsrfError, SsrfGuard, UrlGuard, is_private_or_reserved, validate_ip};

use unfurl_core::{AppConfig, Error};

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_IMAGE: &str = "image/avif,image/webp,image/apng,image/*,*/*;q=0.8";

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: desktop Chrome)
    pub user_agent: String,

    /// Request timeout (default: 8s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,

    /// Maximum decoded HTML body size in bytes (default: 2MB)
    pub max_html_bytes: usize,

    /// Maximum proxied image size in bytes (default: 10MB)
    pub max_image_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout: config.timeout(),
            max_redirects: config.max_redirects,
            max_html_bytes: config.max_html_bytes,
            max_image_bytes: config.max_image_bytes,
        }
    }
}

/// Response from an HTML fetch.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The URL originally requested
    pub url: Url,
    /// The final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status: StatusCode,
    /// Content-Type header
    pub content_type: Option<String>,
    /// Response body bytes, at most `max_html_bytes`
    pub bytes: Bytes,
    /// Whether the body was cut off at the byte cap
    pub truncated: bool,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

impl FetchResponse {
    /// Body decoded as UTF-8, invalid sequences replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// A live upstream image being relayed to a caller.
///
/// Dropping the stream drops the upstream response and closes its connection.
pub struct ImageStream {
    pub content_type: String,
    pub content_length: Option<u64>,
    pub body: BoxStream<'static, Result<Bytes, Error>>,
}

impl std::fmt::Debug for ImageStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageStream")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Fetches HTML documents for extraction.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_html(&self, url: &Url) -> Result<FetchResponse, Error>;
}

/// Build the shared HTTP client: no automatic redirects, compressed
/// transfer encodings accepted.
pub fn build_http_client(user_agent: &str, connect_timeout: Duration) -> Result<Client, Error> {
    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(connect_timeout)
        .redirect(reqwest::redirect::Policy::none())
        .use_rustls_tls()
        .gzip(true)
        .brotli(true)
        .deflate(true)
        .build()
        .map_err(|e| Error::Internal(format!("failed to build HTTP client: {e}")))
}

/// HTTP fetch client with safety checks.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
    guard: Arc<dyn UrlGuard>,
}

impl FetchClient {
    /// Create a new fetch client with its own HTTP client.
    pub fn new(config: FetchConfig, guard: Arc<dyn UrlGuard>) -> Result<Self, Error> {
        let http = build_http_client(&config.user_agent, config.timeout)?;
        Ok(Self::with_client(http, config, guard))
    }

    /// Create a fetch client around an existing HTTP client.
    ///
    /// The client must have automatic redirects disabled.
    pub fn with_client(http: Client, config: FetchConfig, guard: Arc<dyn UrlGuard>) -> Self {
        Self { http, config, guard }
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch an image for relaying.
    ///
    /// Status, content type and declared length are checked before any body
    /// byte is read. The returned stream enforces the byte cap as it goes.
    pub async fn fetch_image(&self, url: &Url) -> Result<ImageStream, Error> {
        let timeout = self.config.timeout;
        let (response, final_url) = tokio::time::timeout(timeout, self.send_guarded(url, ACCEPT_IMAGE))
            .await
            .map_err(|_| timeout_error(timeout))??;

        let content_type = content_type_of(&response);
        let content_type = match content_type {
            Some(ct) if ct.to_ascii_lowercase().starts_with("image/") => ct,
            other => {
                return Err(Error::UnsupportedContentType(format!(
                    "expected image/*, got {}",
                    other.as_deref().unwrap_or("no content type")
                )));
            }
        };

        let max = self.config.max_image_bytes;
        let content_length = response.content_length();
        if let Some(len) = content_length
            && len > max as u64
        {
            return Err(Error::ImageTooLarge(max));
        }

        tracing::debug!("relaying image {} ({}, {:?} bytes)", final_url, content_type, content_length);

        let body = futures_util::stream::try_unfold((response, 0usize), move |(mut response, seen)| async move {
            let chunk = tokio::time::timeout(timeout, response.chunk())
                .await
                .map_err(|_| timeout_error(timeout))?
                .map_err(map_reqwest_error)?;

            match chunk {
                None => Ok(None),
                Some(chunk) => {
                    let seen = seen + chunk.len();
                    if seen > max {
                        tracing::warn!("image exceeded {} bytes mid-stream, aborting", max);
                        return Err(Error::ImageTooLarge(max));
                    }
                    Ok(Some((chunk, (response, seen))))
                }
            }
        })
        .boxed();

        Ok(ImageStream { content_type, content_length, body })
    }

    /// Send a GET, following redirects by hand with the guard on every hop.
    ///
    /// Returns the first non-redirect response, which must be a success.
    async fn send_guarded(&self, url: &Url, accept: &'static str) -> Result<(Response, Url), Error> {
        let mut current = url.clone();
        let mut redirects = 0;

        loop {
            self.guard.validate(&current).await?;

            let response = self
                .http
                .get(current.as_str())
                .header(header::ACCEPT, accept)
                .send()
                .await
                .map_err(map_reqwest_error)?;

            let status = response.status();
            if is_redirect(status)
                && let Some(location) = response.headers().get(header::LOCATION)
            {
                if redirects >= self.config.max_redirects {
                    return Err(Error::TooManyRedirects(self.config.max_redirects));
                }

                let location = location
                    .to_str()
                    .map_err(|_| Error::InvalidUrl("redirect Location is not valid ASCII".to_string()))?;
                let next = current
                    .join(location)
                    .map_err(|e| Error::InvalidUrl(format!("bad redirect Location {location:?}: {e}")))?;

                tracing::debug!("redirect {} -> {} ({})", current, next, status.as_u16());
                current = next;
                redirects += 1;
                continue;
            }

            if !status.is_success() {
                tracing::debug!("upstream {} answered {}", current, status.as_u16());
                return Err(Error::UpstreamStatus(status.as_u16()));
            }

            return Ok((response, current));
        }
    }

    async fn fetch_html_bounded(&self, url: &Url, start: Instant) -> Result<FetchResponse, Error> {
        let (mut response, final_url) = self.send_guarded(url, ACCEPT_HTML).await?;
        let status = response.status();

        let content_type = content_type_of(&response);
        if !content_type.as_deref().is_some_and(|ct| ct.to_ascii_lowercase().starts_with("text/html")) {
            return Err(Error::UnsupportedContentType(format!(
                "expected text/html, got {}",
                content_type.as_deref().unwrap_or("no content type")
            )));
        }

        let max = self.config.max_html_bytes;
        let capacity = response.content_length().map_or(8192, |len| (len as usize).min(max));
        let mut body = Vec::with_capacity(capacity);
        let mut truncated = false;

        while let Some(chunk) = response.chunk().await.map_err(map_reqwest_error)? {
            let remaining = max - body.len();
            if chunk.len() > remaining {
                body.extend_from_slice(&chunk[..remaining]);
                truncated = true;
                break;
            }
            body.extend_from_slice(&chunk);
        }
        drop(response);

        let fetch_ms = start.elapsed().as_millis() as u64;

        if truncated {
            tracing::debug!("body of {} truncated at {} bytes", final_url, max);
        }
        tracing::debug!("fetched {} -> {} in {}ms ({} bytes)", url, final_url, fetch_ms, body.len());

        Ok(FetchResponse {
            url: url.clone(),
            final_url,
            status,
            content_type,
            bytes: Bytes::from(body),
            truncated,
            fetch_ms,
        })
    }
}

#[async_trait]
impl PageFetcher for FetchClient {
    /// Fetch an HTML page, following redirects and capping the body.
    ///
    /// The configured timeout covers every hop and the body read.
    async fn fetch_html(&self, url: &Url) -> Result<FetchResponse, Error> {
        let start = Instant::now();
        let timeout = self.config.timeout;
        tokio::time::timeout(timeout, self.fetch_html_bounded(url, start))
            .await
            .map_err(|_| timeout_error(timeout))?
    }
}

/// Statuses followed as redirects when a `Location` is present.
fn is_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

fn content_type_of(response: &Response) -> Option<String> {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
}

fn timeout_error(timeout: Duration) -> Error {
    Error::FetchTimeout(format!("no response within {}ms", timeout.as_millis()))
}

fn map_reqwest_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::FetchTimeout(err.to_string())
    } else {
        Error::Network(err.to_string())
    }
}
