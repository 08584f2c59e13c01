//! Client code for the unfurl service.
//!
//! This crate provides the SSRF-guarded fetch pipeline, preview metadata
//! extraction, image probing and proxying, and the [`Unfurler`] that ties
//! them to the cache.

pub mod extract;
pub mod fetch;
pub mod probe;
pub mod proxy;
pub mod unfurl;

pub use extract::extract;
pub use fetch::{
    FetchClient, FetchConfig, FetchResponse, ImageStream, PageFetcher, Resolver, SsrfError, SsrfGuard,
    SystemResolver, UrlGuard, build_http_client,
};
pub use probe::{HeadProber, ImageProber, ProbeOutcome};
pub use proxy::ImageProxy;
pub use unfurl::{UnfurlSettings, Unfurler};
