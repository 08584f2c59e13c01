//! Parsing of caller-supplied target URLs.

/// Error type for target URL parsing failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("only http:// and https:// URLs are allowed, got {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<UrlError> for unfurl_core::Error {
    fn from(err: UrlError) -> Self {
        unfurl_core::Error::InvalidUrl(err.to_string())
    }
}

/// Parse an untrusted target URL.
///
/// Surrounding whitespace is trimmed. The scheme must be given explicitly
/// and be `http` or `https`, and the URL must carry a host. Nothing else is
/// normalized beyond what URL parsing itself does.
pub fn parse_target(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let parsed = url::Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(format!("{trimmed}: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(format!("{scheme}:"))),
    }

    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(parsed),
        _ => Err(UrlError::InvalidUrl(format!("{trimmed}: missing host"))),
    }
}
