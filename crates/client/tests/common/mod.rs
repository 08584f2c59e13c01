//! Shared helpers for client integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use unfurl_client::fetch::validate_ip;
use unfurl_client::{FetchClient, FetchConfig, SsrfError, UrlGuard};
use url::{Host, Url};

/// Guard that lets loopback through so tests can reach local servers, but
/// otherwise classifies IP literals like the real guard. Hostnames are refused.
pub struct LoopbackAllowed;

#[async_trait]
impl UrlGuard for LoopbackAllowed {
    async fn validate(&self, url: &Url) -> Result<(), SsrfError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SsrfError::BlockedScheme(url.scheme().to_string()));
        }
        match url.host() {
            Some(Host::Ipv4(ip)) if ip.is_loopback() => Ok(()),
            Some(Host::Ipv4(ip)) => validate_ip(IpAddr::V4(ip)),
            Some(Host::Ipv6(ip)) => validate_ip(IpAddr::V6(ip)),
            Some(Host::Domain(domain)) => Err(SsrfError::BlockedHost(domain.to_string())),
            None => Err(SsrfError::MissingHost),
        }
    }
}

/// Serve `router` on an ephemeral loopback port.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

pub fn url(addr: SocketAddr, path: &str) -> Url {
    Url::parse(&format!("http://{addr}{path}")).unwrap()
}

pub fn test_config() -> FetchConfig {
    FetchConfig { timeout: Duration::from_secs(5), ..FetchConfig::default() }
}

pub fn fetcher(config: FetchConfig) -> FetchClient {
    FetchClient::new(config, Arc::new(LoopbackAllowed)).unwrap()
}
