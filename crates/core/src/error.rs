//! Unified error types for the unfurl service.
//!
//! Every variant renders with a stable code prefix; the HTTP layer maps
//! variants to status codes via [`Error::code`] and [`Error::is_upstream_failure`].

/// Unified error types for the unfurl service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unparseable URL or a redirect `Location` that cannot be resolved.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// SSRF blocked - private/internal address or disallowed scheme/host.
    #[error("SSRF_BLOCKED: {0}")]
    SsrfBlocked(String),

    /// Upstream returned a content type this endpoint does not serve.
    #[error("UNSUPPORTED_CONTENT_TYPE: {0}")]
    UnsupportedContentType(String),

    /// Fetch or probe exceeded its timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Redirect chain longer than the configured limit.
    #[error("TOO_MANY_REDIRECTS: more than {0} redirects")]
    TooManyRedirects(usize),

    /// Upstream answered with a non-success status.
    #[error("UPSTREAM_STATUS: upstream returned {0}")]
    UpstreamStatus(u16),

    /// Connection, TLS or body read failure.
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Proxied image exceeded the byte limit mid-stream.
    #[error("IMAGE_TOO_LARGE: exceeds {0} bytes")]
    ImageTooLarge(usize),

    /// Cache tier operation failed.
    #[error("CACHE_ERROR: {0}")]
    Cache(String),

    /// Cached value could not be (de)serialized.
    #[error("CACHE_ERROR: serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable code, identical to the display prefix.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidUrl(_) => "INVALID_URL",
            Error::SsrfBlocked(_) => "SSRF_BLOCKED",
            Error::UnsupportedContentType(_) => "UNSUPPORTED_CONTENT_TYPE",
            Error::FetchTimeout(_) => "FETCH_TIMEOUT",
            Error::TooManyRedirects(_) => "TOO_MANY_REDIRECTS",
            Error::UpstreamStatus(_) => "UPSTREAM_STATUS",
            Error::Network(_) => "NETWORK_ERROR",
            Error::ImageTooLarge(_) => "IMAGE_TOO_LARGE",
            Error::Cache(_) | Error::Serialization(_) => "CACHE_ERROR",
            Error::Internal(_) => "INTERNAL",
        }
    }

    /// True when the upstream origin itself failed (5xx), as opposed to the
    /// request being rejected or the origin refusing it.
    pub fn is_upstream_failure(&self) -> bool {
        matches!(self, Error::UpstreamStatus(code) if *code >= 500)
    }

    /// True for failures caused by the caller's input or the origin's answer.
    pub fn is_client_error(&self) -> bool {
        !self.is_upstream_failure() && !matches!(self, Error::Cache(_) | Error::Serialization(_) | Error::Internal(_))
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Error::Cache(err.to_string())
    }
}
