//! SSRF (Server-Side Request Forgery) protection.
//!
//! Validates that URLs and resolved IP addresses are not pointing to
//! private, internal, or reserved addresses. The guard is consulted for the
//! initial URL and again for every redirect hop.
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use ipnet::{Ipv4Net, Ipv6Net};
use url::{Host, Url};

use super::resolver::Resolver;

/// URL schemes that may be fetched.
pub const ALLOWED_SCHEMES: &[&str] = &["http", "https"];

/// Non-global IPv4 ranges (IANA special-purpose registry).
static BLOCKED_V4: LazyLock<Vec<Ipv4Net>> = LazyLock::new(|| {
    parse_nets(&[
        "0.0.0.0/8",       // "this network", unspecified
        "10.0.0.0/8",      // RFC 1918
        "100.64.0.0/10",   // shared address space (CGNAT)
        "127.0.0.0/8",     // loopback
        "169.254.0.0/16",  // link-local, cloud metadata
        "172.16.0.0/12",   // RFC 1918
        "192.0.0.0/24",    // IETF protocol assignments
        "192.0.2.0/24",    // TEST-NET-1
        "192.88.99.0/24",  // 6to4 relay anycast
        "192.168.0.0/16",  // RFC 1918
        "198.18.0.0/15",   // benchmarking
        "198.51.100.0/24", // TEST-NET-2
        "203.0.113.0/24",  // TEST-NET-3
        "224.0.0.0/4",     // multicast
        "240.0.0.0/4",     // reserved, broadcast
    ])
});

/// Only global unicast is reachable; everything else in the IPv6 space is
/// unassigned, reserved, local or multicast.
static GLOBAL_UNICAST_V6: LazyLock<Ipv6Net> = LazyLock::new(|| parse_nets(&["2000::/3"])[0]);

/// Non-global ranges inside `2000::/3`.
static BLOCKED_V6: LazyLock<Vec<Ipv6Net>> = LazyLock::new(|| {
    parse_nets(&[
        "2001::/23",     // IETF protocol assignments
        "2001:db8::/32", // documentation
    ])
});

/// Well-known NAT64 prefix; the low 32 bits carry an IPv4 address.
static NAT64_WELL_KNOWN: LazyLock<Ipv6Net> = LazyLock::new(|| parse_nets(&["64:ff9b::/96"])[0]);

/// 6to4 prefix; bits 16..48 carry an IPv4 address.
static SIX_TO_FOUR: LazyLock<Ipv6Net> = LazyLock::new(|| parse_nets(&["2002::/16"])[0]);

fn parse_nets<N>(cidrs: &[&str]) -> Vec<N>
where
    N: std::str::FromStr,
    N::Err: std::fmt::Debug,
{
    cidrs.iter().map(|cidr| cidr.parse().expect("invalid CIDR literal")).collect()
}

/// Error type for SSRF validation failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SsrfError {
    #[error("blocked scheme: {0}")]
    BlockedScheme(String),

    #[error("URL has no host")]
    MissingHost,

    #[error("blocked host: {0}")]
    BlockedHost(String),

    #[error("blocked IP: {0} (private/reserved)")]
    BlockedIp(IpAddr),

    #[error("DNS resolution failed: {0}")]
    DnsError(String),
}

impl From<SsrfError> for unfurl_core::Error {
    fn from(err: SsrfError) -> Self {
        unfurl_core::Error::SsrfBlocked(err.to_string())
    }
}

/// Check if an IP address is private, reserved, or otherwise blocked.
///
/// This covers:
/// - Loopback addresses (127.0.0.0/8, ::1)
/// - RFC 1918 private ranges (10/8, 172.16/12, 192.168/16) and CGNAT (100.64/10)
/// - Link-local addresses (169.254/16, fe80::/10)
/// - Multicast addresses (224/4, ff00::/8)
/// - Unspecified and reserved addresses (0.0.0.0/8, 240/4)
/// - Documentation and benchmarking ranges
/// - Any IPv6 address outside global unicast (2000::/3)
/// - IPv4-mapped, NAT64 and 6to4 IPv6 addresses whose embedded IPv4 is blocked
pub fn is_private_or_reserved(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_blocked_v4(v4),
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_blocked_v4(v4);
            }
            if NAT64_WELL_KNOWN.contains(&v6) {
                return is_blocked_v4(embedded_v4(v6));
            }
            if SIX_TO_FOUR.contains(&v6) {
                return is_blocked_v4(six_to_four_v4(v6));
            }
            !GLOBAL_UNICAST_V6.contains(&v6) || BLOCKED_V6.iter().any(|net| net.contains(&v6))
        }
    }
}

fn is_blocked_v4(ip: Ipv4Addr) -> bool {
    BLOCKED_V4.iter().any(|net| net.contains(&ip))
}

fn embedded_v4(ip: Ipv6Addr) -> Ipv4Addr {
    let [.., a, b, c, d] = ip.octets();
    Ipv4Addr::new(a, b, c, d)
}

fn six_to_four_v4(ip: Ipv6Addr) -> Ipv4Addr {
    let [_, _, a, b, c, d, ..] = ip.octets();
    Ipv4Addr::new(a, b, c, d)
}

/// Validate that an IP address is not private or reserved.
///
/// Returns an error if the IP is blocked.
pub fn validate_ip(ip: IpAddr) -> Result<(), SsrfError> {
    if is_private_or_reserved(ip) { Err(SsrfError::BlockedIp(ip)) } else { Ok(()) }
}

/// Decides whether a URL may be contacted.
#[async_trait]
pub trait UrlGuard: Send + Sync {
    async fn validate(&self, url: &Url) -> Result<(), SsrfError>;
}

/// Production guard: scheme allowlist, `.onion` denial, and classification
/// of every address the host resolves to.
pub struct SsrfGuard {
    resolver: Arc<dyn Resolver>,
}

impl SsrfGuard {
    pub fn new(resolver: Arc<dyn Resolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl UrlGuard for SsrfGuard {
    async fn validate(&self, url: &Url) -> Result<(), SsrfError> {
        if !ALLOWED_SCHEMES.contains(&url.scheme()) {
            return Err(SsrfError::BlockedScheme(url.scheme().to_string()));
        }

        let domain = match url.host() {
            None => return Err(SsrfError::MissingHost),
            Some(Host::Ipv4(ip)) => return validate_ip(IpAddr::V4(ip)),
            Some(Host::Ipv6(ip)) => return validate_ip(IpAddr::V6(ip)),
            Some(Host::Domain(domain)) => domain.trim_end_matches('.').to_ascii_lowercase(),
        };

        if domain.is_empty() {
            return Err(SsrfError::MissingHost);
        }
        if domain == "onion" || domain.ends_with(".onion") {
            return Err(SsrfError::BlockedHost(domain));
        }

        let port = url.port_or_known_default().unwrap_or(80);
        let ips = self.resolver.resolve(&domain, port).await?;
        if ips.is_empty() {
            return Err(SsrfError::DnsError(format!("{domain}: no addresses")));
        }

        for ip in ips {
            if let Err(e) = validate_ip(ip) {
                tracing::debug!("{} resolves to blocked address {}", domain, ip);
                return Err(e);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
    use std::sync::Mutex;

    /// Resolver answering from a fixed table and recording lookups.
    #[derive(Default)]
    struct TableResolver {
        table: HashMap<String, Vec<IpAddr>>,
        lookups: Mutex<Vec<String>>,
    }

    impl TableResolver {
        fn with(entries: &[(&str, &[&str])]) -> Self {
            let table = entries
                .iter()
                .map(|(host, ips)| (host.to_string(), ips.iter().map(|ip| ip.parse().unwrap()).collect()))
                .collect();
            Self { table, lookups: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl Resolver for TableResolver {
        async fn resolve(&self, host: &str, _port: u16) -> Result<Vec<IpAddr>, SsrfError> {
            self.lookups.lock().unwrap().push(host.to_string());
            self.table
                .get(host)
                .cloned()
                .ok_or_else(|| SsrfError::DnsError(format!("{host}: not found")))
        }
    }

    fn guard(entries: &[(&str, &[&str])]) -> (SsrfGuard, Arc<TableResolver>) {
        let resolver = Arc::new(TableResolver::with(entries));
        (SsrfGuard::new(resolver.clone()), resolver)
    }

    async fn check(guard: &SsrfGuard, url: &str) -> Result<(), SsrfError> {
        guard.validate(&Url::parse(url).unwrap()).await
    }

    #[test]
    fn test_is_private_or_reserved_loopback_v4() {
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))));
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(127, 255, 255, 255))));
    }

    #[test]
    fn test_is_private_or_reserved_private_v4() {
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))));
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(172, 16, 0, 1))));
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(172, 31, 255, 255))));
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(192, 168, 0, 1))));
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(100, 64, 0, 1))));
    }

    #[test]
    fn test_is_private_or_reserved_link_local_v4() {
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(169, 254, 169, 254))));
    }

    #[test]
    fn test_is_private_or_reserved_multicast_v4() {
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(224, 0, 0, 1))));
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(239, 255, 255, 255))));
    }

    #[test]
    fn test_is_private_or_reserved_reserved_v4() {
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(240, 0, 0, 1))));
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::BROADCAST)));
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 10))));
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(198, 18, 0, 1))));
    }

    #[test]
    fn test_is_private_or_reserved_unspecified_v4() {
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::UNSPECIFIED)));
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 1))));
    }

    #[test]
    fn test_is_private_or_reserved_loopback_v6() {
        assert!(is_private_or_reserved(IpAddr::V6(Ipv6Addr::LOCALHOST)));
    }

    #[test]
    fn test_is_private_or_reserved_unique_local_v6() {
        assert!(is_private_or_reserved(IpAddr::V6(Ipv6Addr::new(0xfc00, 0, 0, 0, 0, 0, 0, 1))));
        assert!(is_private_or_reserved(IpAddr::V6(Ipv6Addr::new(0xfdff, 0, 0, 0, 0, 0, 0, 1))));
    }

    #[test]
    fn test_is_private_or_reserved_link_local_v6() {
        assert!(is_private_or_reserved(IpAddr::V6(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1))));
    }

    #[test]
    fn test_is_private_or_reserved_multicast_v6() {
        assert!(is_private_or_reserved(IpAddr::V6(Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 1))));
    }

    #[test]
    fn test_is_private_or_reserved_unspecified_v6() {
        assert!(is_private_or_reserved(IpAddr::V6(Ipv6Addr::UNSPECIFIED)));
    }

    #[test]
    fn test_is_private_or_reserved_documentation_v6() {
        assert!(is_private_or_reserved(IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1))));
    }

    #[test]
    fn test_is_private_or_reserved_mapped_v4() {
        let mapped: IpAddr = "::ffff:127.0.0.1".parse().unwrap();
        assert!(is_private_or_reserved(mapped));
        let mapped_metadata: IpAddr = "::ffff:169.254.169.254".parse().unwrap();
        assert!(is_private_or_reserved(mapped_metadata));
        let mapped_public: IpAddr = "::ffff:8.8.8.8".parse().unwrap();
        assert!(!is_private_or_reserved(mapped_public));
    }

    #[test]
    fn test_is_private_or_reserved_nat64() {
        let internal: IpAddr = "64:ff9b::10.0.0.1".parse().unwrap();
        assert!(is_private_or_reserved(internal));
        let public: IpAddr = "64:ff9b::93.184.216.34".parse().unwrap();
        assert!(!is_private_or_reserved(public));
    }

    #[test]
    fn test_is_private_or_reserved_six_to_four() {
        let loopback: IpAddr = "2002:7f00:1::1".parse().unwrap();
        assert!(is_private_or_reserved(loopback));
        let private: IpAddr = "2002:c0a8:101::1".parse().unwrap();
        assert!(is_private_or_reserved(private));
        let public: IpAddr = "2002:5db8:d822::1".parse().unwrap();
        assert!(!is_private_or_reserved(public));
    }

    #[test]
    fn test_is_private_or_reserved_outside_global_unicast() {
        let reserved = ["4000::1", "100:0:0:1::1", "::1:0:0:1", "::ffff:0:7f00:1", "e000::1", "fe00::1", "1000::1"];
        for ip in reserved {
            let addr: IpAddr = ip.parse().unwrap();
            assert!(is_private_or_reserved(addr), "{ip}");
        }
    }

    #[test]
    fn test_is_private_or_reserved_public_v4() {
        assert!(!is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))));
        assert!(!is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1))));
        assert!(!is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34))));
        assert!(!is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(172, 32, 0, 1))));
    }

    #[test]
    fn test_is_private_or_reserved_public_v6() {
        assert!(!is_private_or_reserved(IpAddr::V6(Ipv6Addr::new(0x2001, 0x4860, 0x4860, 0, 0, 0, 0, 0x8888))));
        assert!(!is_private_or_reserved(IpAddr::V6(Ipv6Addr::new(0x2606, 0x4700, 0x4700, 0, 0, 0, 0, 0x1111))));
    }

    #[test]
    fn test_validate_ip_public() {
        assert!(validate_ip(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))).is_ok());
    }

    #[test]
    fn test_validate_ip_blocked() {
        assert!(validate_ip(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))).is_err());
        assert!(validate_ip(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1))).is_err());
    }

    #[tokio::test]
    async fn test_guard_rejects_non_http_schemes() {
        let (guard, resolver) = guard(&[]);
        for url in ["ftp://example.com/", "file:///etc/passwd", "gopher://example.com/", "data:text/html,hi"] {
            let result = check(&guard, url).await;
            assert!(matches!(result, Err(SsrfError::BlockedScheme(_))), "{url}: {result:?}");
        }
        assert!(resolver.lookups.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_guard_rejects_onion() {
        let (guard, resolver) = guard(&[]);
        for url in ["http://example.onion/", "https://abc.def.ONION/x", "http://hidden.onion./"] {
            let result = check(&guard, url).await;
            assert!(matches!(result, Err(SsrfError::BlockedHost(_))), "{url}: {result:?}");
        }
        assert!(resolver.lookups.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_guard_ip_literals_skip_dns() {
        let (guard, resolver) = guard(&[]);
        assert!(matches!(check(&guard, "http://127.0.0.1/admin").await, Err(SsrfError::BlockedIp(_))));
        assert!(matches!(check(&guard, "http://[::1]:8080/").await, Err(SsrfError::BlockedIp(_))));
        assert!(matches!(check(&guard, "http://169.254.169.254/latest/meta-data").await, Err(SsrfError::BlockedIp(_))));
        assert!(check(&guard, "http://93.184.216.34/").await.is_ok());
        assert!(resolver.lookups.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_guard_numeric_host_forms() {
        let (guard, _) = guard(&[]);
        // WHATWG parsing normalizes these to 127.0.0.1
        assert!(matches!(check(&guard, "http://2130706433/").await, Err(SsrfError::BlockedIp(_))));
        assert!(matches!(check(&guard, "http://0x7f.1/").await, Err(SsrfError::BlockedIp(_))));
    }

    #[tokio::test]
    async fn test_guard_allows_public_domain() {
        let (guard, resolver) = guard(&[("example.com", &["93.184.216.34", "2606:2800:220:1:248:1893:25c8:1946"])]);
        assert!(check(&guard, "https://Example.COM/page").await.is_ok());
        assert_eq!(resolver.lookups.lock().unwrap().as_slice(), ["example.com"]);
    }

    #[tokio::test]
    async fn test_guard_rejects_if_any_address_private() {
        let (guard, _) = guard(&[("mixed.example", &["93.184.216.34", "10.0.0.5"])]);
        let result = check(&guard, "https://mixed.example/").await;
        assert!(matches!(result, Err(SsrfError::BlockedIp(ip)) if ip == IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))));
    }

    #[tokio::test]
    async fn test_guard_rejects_every_blocked_class() {
        let blocked = [
            "10.1.2.3",
            "127.0.0.2",
            "169.254.1.1",
            "224.0.0.251",
            "240.0.0.1",
            "0.0.0.0",
            "::1",
            "fe80::1",
            "ff02::1",
            "::",
            "fd00::1",
            "4000::1",
            "100:0:0:1::1",
            "::1:0:0:1",
            "::ffff:0:7f00:1",
            "2002:7f00:1::1",
            "e000::1",
            "fe00::1",
        ];
        for ip in blocked {
            let (guard, _) = guard(&[("target.example", &[ip])]);
            let result = check(&guard, "http://target.example/").await;
            assert!(matches!(result, Err(SsrfError::BlockedIp(_))), "{ip}: {result:?}");
        }
    }

    #[tokio::test]
    async fn test_guard_dns_failure_is_rejection() {
        let (guard, _) = guard(&[]);
        let result = check(&guard, "https://does-not-resolve.example/").await;
        assert!(matches!(result, Err(SsrfError::DnsError(_))));
    }

    #[tokio::test]
    async fn test_guard_empty_answer_is_rejection() {
        let (guard, _) = guard(&[("empty.example", &[])]);
        let result = check(&guard, "https://empty.example/").await;
        assert!(matches!(result, Err(SsrfError::DnsError(_))));
    }

    #[test]
    fn test_ssrf_error_into_core_error() {
        let err: unfurl_core::Error = SsrfError::BlockedIp("127.0.0.1".parse().unwrap()).into();
        assert_eq!(err.code(), "SSRF_BLOCKED");
        assert!(err.to_string().contains("127.0.0.1"));
    }
}
