//! Hostname resolution kept off the async workers.

use super::ssrf::SsrfError;
use async_trait::async_trait;
use std::net::{IpAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Resolves a hostname to every address it answers with.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, host: &str, port: u16) -> Result<Vec<IpAddr>, SsrfError>;
}

/// Platform resolver (`getaddrinfo`) on tokio's blocking pool.
///
/// At most `concurrency` lookups run at once. A lookup that exceeds the
/// timeout is reported as a DNS failure, but its permit is only released
/// when the OS call actually returns.
pub struct SystemResolver {
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl SystemResolver {
    pub fn new(concurrency: usize, timeout: Duration) -> Self {
        Self { permits: Arc::new(Semaphore::new(concurrency.max(1))), timeout }
    }
}

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve(&self, host: &str, port: u16) -> Result<Vec<IpAddr>, SsrfError> {
        let deadline = tokio::time::Instant::now() + self.timeout;

        let permit = tokio::time::timeout_at(deadline, Arc::clone(&self.permits).acquire_owned())
            .await
            .map_err(|_| SsrfError::DnsError(format!("{host}: resolver busy")))?
            .map_err(|_| SsrfError::DnsError("resolver closed".to_string()))?;

        let target = (host.to_string(), port);
        let lookup = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            target.to_socket_addrs().map(|addrs| addrs.map(|addr| addr.ip()).collect::<Vec<_>>())
        });

        let mut ips = match tokio::time::timeout_at(deadline, lookup).await {
            Err(_) => return Err(SsrfError::DnsError(format!("{host}: lookup timed out"))),
            Ok(Err(e)) => return Err(SsrfError::DnsError(format!("{host}: {e}"))),
            Ok(Ok(Err(e))) => return Err(SsrfError::DnsError(format!("{host}: {e}"))),
            Ok(Ok(Ok(ips))) => ips,
        };

        ips.sort();
        ips.dedup();
        tracing::debug!("resolved {} to {} address(es)", host, ips.len());
        Ok(ips)
    }
}
