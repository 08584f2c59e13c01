//! Link preview model.

use serde::{Deserialize, Serialize};

/// Which extraction stage produced a preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewSource {
    Og,
    Twitter,
    Amazon,
    Fallback,
}

impl PreviewSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreviewSource::Og => "og",
            PreviewSource::Twitter => "twitter",
            PreviewSource::Amazon => "amazon",
            PreviewSource::Fallback => "fallback",
        }
    }
}

/// Preview metadata returned by `GET /unfurl`.
///
/// All fields except `url` and `source` are optional: a page with no usable
/// metadata is still a valid preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewResult {
    /// Final URL after redirects.
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Absolute image URL.
    pub image: Option<String>,
    /// Same-origin proxy path, set when the image is not directly fetchable.
    pub image_proxy_url: Option<String>,
    pub site_name: Option<String>,
    pub favicon: Option<String>,
    pub source: PreviewSource,
}

impl PreviewResult {
    /// Empty preview for `url`; the starting point of every extraction.
    pub fn empty(url: impl Into<String>, source: PreviewSource) -> Self {
        Self {
            url: url.into(),
            title: None,
            description: None,
            image: None,
            image_proxy_url: None,
            site_name: None,
            favicon: None,
            source,
        }
    }
}
