//! Client-IP resolution behind trusted proxies.
//!
//! Forwarding headers are attacker-controlled unless the transport peer is a
//! proxy we configured, so `X-Forwarded-For` / `X-Real-IP` are consulted only
//! when the remote address lies inside the trusted set. The XFF chain is
//! walked right to left and the first hop that is *not* itself a trusted
//! proxy wins; an attacker who prepends spoofed hops ahead of a trusted proxy
//! only pushes their fabrication further left, where it is never reached.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use axum::http::HeaderMap;

use crate::{Error, Result};

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// One CIDR range. Bare addresses parse as /32 (v4) or /128 (v6).
#[derive(Debug, Clone, Copy)]
struct Cidr {
    network: IpAddr,
    prefix: u8,
}

impl Cidr {
    fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let (addr, prefix) = match s.split_once('/') {
            Some((addr, prefix)) => {
                let prefix: u8 = prefix
                    .parse()
                    .map_err(|_| Error::Config(format!("invalid CIDR prefix in '{s}'")))?;
                (addr, Some(prefix))
            }
            None => (s, None),
        };

        let network: IpAddr = addr
            .parse()
            .map_err(|_| Error::Config(format!("invalid IP address in '{s}'")))?;

        let max = match network {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        let prefix = prefix.unwrap_or(max);
        if prefix > max {
            return Err(Error::Config(format!("CIDR prefix too large in '{s}'")));
        }

        Ok(Self { network, prefix })
    }

    fn contains(&self, ip: IpAddr) -> bool {
        match (self.network, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = if self.prefix == 0 {
                    0
                } else {
                    u32::MAX << (32 - u32::from(self.prefix))
                };
                (u32::from(net) & mask) == (u32::from(ip) & mask)
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = if self.prefix == 0 {
                    0
                } else {
                    u128::MAX << (128 - u32::from(self.prefix))
                };
                (u128::from(net) & mask) == (u128::from(ip) & mask)
            }
            _ => false,
        }
    }
}

/// The configured trusted-proxy set. Built once at startup, read-only after.
#[derive(Debug, Clone, Default)]
pub struct TrustedProxies {
    nets: Vec<Cidr>,
}

impl TrustedProxies {
    /// Parse a list of CIDR ranges or bare addresses.
    pub fn parse(entries: &[String]) -> Result<Self> {
        let nets = entries
            .iter()
            .map(|e| Cidr::parse(e))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { nets })
    }

    /// Whether `ip` lies inside the trusted set.
    #[must_use]
    pub fn is_trusted(&self, ip: IpAddr) -> bool {
        let ip = canonical(ip);
        self.nets.iter().any(|n| n.contains(ip))
    }

    /// Resolve the effective client address for a request.
    ///
    /// Headers are consulted only when the transport peer is trusted. With a
    /// trusted XFF chain the result is the right-most untrusted hop, or the
    /// left-most hop when every entry is trusted. `X-Real-IP` applies only
    /// when no XFF header is present.
    #[must_use]
    pub fn client_ip(&self, remote: SocketAddr, headers: &HeaderMap) -> IpAddr {
        let remote_ip = canonical(remote.ip());

        if !self.is_trusted(remote_ip) {
            return remote_ip;
        }

        if let Some(chain) = headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            let hops: Vec<IpAddr> = chain
                .split(',')
                .filter_map(|h| h.trim().parse().ok())
                .map(canonical)
                .collect();

            for hop in hops.iter().rev() {
                if !self.is_trusted(*hop) {
                    return *hop;
                }
            }
            if let Some(first) = hops.first() {
                return *first;
            }
            return remote_ip;
        }

        if let Some(real_ip) = headers
            .get(X_REAL_IP)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
        {
            return canonical(real_ip);
        }

        remote_ip
    }
}

/// Collapse IPv4-mapped IPv6 (`::ffff:x.x.x.x`) to plain IPv4 so trusted-net
/// checks and rate-bucket keys see one canonical form per peer.
#[must_use]
pub fn canonical(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => ip,
        },
        IpAddr::V4(_) => ip,
    }
}

/// Whether the *transport* peer is loopback (`127.0.0.0/8` or `::1`).
///
/// Used by the registry's internal-credentials bypass; deliberately never
/// consults a header.
#[must_use]
pub fn is_loopback(remote: SocketAddr) -> bool {
    canonical(remote.ip()).is_loopback()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(
                axum::http::HeaderName::from_bytes(k.as_bytes()).unwrap(),
                v.parse().unwrap(),
            );
        }
        map
    }

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn bare_ip_widens_to_host_prefix() {
        let proxies = TrustedProxies::parse(&["10.0.0.1".to_string()]).unwrap();
        assert!(proxies.is_trusted(ip("10.0.0.1")));
        assert!(!proxies.is_trusted(ip("10.0.0.2")));

        let proxies = TrustedProxies::parse(&["::1".to_string()]).unwrap();
        assert!(proxies.is_trusted(ip("::1")));
        assert!(!proxies.is_trusted(ip("::2")));
    }

    #[test]
    fn cidr_range_membership() {
        let proxies = TrustedProxies::parse(&["10.0.0.0/8".to_string()]).unwrap();
        assert!(proxies.is_trusted(ip("10.255.1.2")));
        assert!(!proxies.is_trusted(ip("11.0.0.1")));
    }

    #[test]
    fn invalid_cidr_is_rejected() {
        assert!(TrustedProxies::parse(&["10.0.0.0/33".to_string()]).is_err());
        assert!(TrustedProxies::parse(&["not-an-ip".to_string()]).is_err());
    }

    #[test]
    fn empty_trusted_set_ignores_headers() {
        let proxies = TrustedProxies::default();
        let got = proxies.client_ip(
            addr("203.0.113.7:4444"),
            &headers(&[("x-forwarded-for", "198.51.100.1"), ("x-real-ip", "198.51.100.2")]),
        );
        assert_eq!(got, ip("203.0.113.7"));
    }

    #[test]
    fn untrusted_remote_ignores_headers() {
        let proxies = TrustedProxies::parse(&["10.0.0.1".to_string()]).unwrap();
        let got = proxies.client_ip(
            addr("203.0.113.7:4444"),
            &headers(&[("x-forwarded-for", "198.51.100.1")]),
        );
        assert_eq!(got, ip("203.0.113.7"));
    }

    #[test]
    fn xff_returns_rightmost_untrusted() {
        let proxies =
            TrustedProxies::parse(&["10.0.0.1".to_string(), "10.0.0.2".to_string()]).unwrap();
        // c is trusted, b is not: b wins even though a sits further left.
        let got = proxies.client_ip(
            addr("10.0.0.1:5555"),
            &headers(&[("x-forwarded-for", "198.51.100.1, 203.0.113.9, 10.0.0.2")]),
        );
        assert_eq!(got, ip("203.0.113.9"));
    }

    #[test]
    fn xff_all_trusted_returns_leftmost() {
        let proxies =
            TrustedProxies::parse(&["10.0.0.0/8".to_string()]).unwrap();
        let got = proxies.client_ip(
            addr("10.0.0.1:5555"),
            &headers(&[("x-forwarded-for", "10.1.1.1, 10.2.2.2")]),
        );
        assert_eq!(got, ip("10.1.1.1"));
    }

    #[test]
    fn real_ip_only_without_xff() {
        let proxies = TrustedProxies::parse(&["10.0.0.1".to_string()]).unwrap();

        let got = proxies.client_ip(
            addr("10.0.0.1:5555"),
            &headers(&[("x-real-ip", "198.51.100.4")]),
        );
        assert_eq!(got, ip("198.51.100.4"));

        // XFF present: X-Real-IP must be ignored.
        let got = proxies.client_ip(
            addr("10.0.0.1:5555"),
            &headers(&[
                ("x-forwarded-for", "203.0.113.9"),
                ("x-real-ip", "198.51.100.4"),
            ]),
        );
        assert_eq!(got, ip("203.0.113.9"));
    }

    #[test]
    fn garbage_xff_falls_back_to_remote() {
        let proxies = TrustedProxies::parse(&["10.0.0.1".to_string()]).unwrap();
        let got = proxies.client_ip(
            addr("10.0.0.1:5555"),
            &headers(&[("x-forwarded-for", "not-an-ip, also-bad")]),
        );
        assert_eq!(got, ip("10.0.0.1"));
    }

    #[test]
    fn ipv4_mapped_ipv6_is_canonicalized() {
        assert_eq!(canonical(ip("::ffff:127.0.0.1")), ip("127.0.0.1"));
        assert!(is_loopback(addr("[::ffff:127.0.0.1]:80")));
    }

    #[test]
    fn loopback_is_transport_only() {
        assert!(is_loopback(addr("127.0.0.1:9000")));
        assert!(is_loopback(addr("127.8.8.8:9000")));
        assert!(is_loopback(addr("[::1]:9000")));
        assert!(!is_loopback(addr("10.0.0.1:9000")));
    }
}
