//! Address family classification used when binding a client to an interface.

use std::net::{IpAddr, Ipv6Addr};

/// One address assigned to a local network interface, with its prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceNetwork {
    pub addr: IpAddr,
    pub prefix_len: u8,
}

impl InterfaceNetwork {
    pub fn new(addr: IpAddr, prefix_len: u8) -> Self {
        Self { addr, prefix_len }
    }
}

impl From<&if_addrs::IfAddr> for InterfaceNetwork {
    fn from(addr: &if_addrs::IfAddr) -> Self {
        match addr {
            if_addrs::IfAddr::V4(v4) => Self::new(
                IpAddr::V4(v4.ip),
                u32::from(v4.netmask).count_ones() as u8,
            ),
            if_addrs::IfAddr::V6(v6) => Self::new(
                IpAddr::V6(v6.ip),
                u128::from(v6.netmask).count_ones() as u8,
            ),
        }
    }
}

/// Returns true when the host of `raw_url` is an IPv6 literal.
///
/// Accepts the bracketed form (`http://[2001:db8::1]:80/`), zone-qualified
/// literals (`[fe80::1%25eth0]`, `%` escaped as `%25`) and the unbracketed
/// form (`https://2001:db8:1:0:0:ab9:c0a8:102`). IPv4-mapped addresses
/// (`::ffff:a.b.c.d`) are IPv4 destinations and classify as false, as do
/// hostnames and anything that is not a valid literal.
pub fn is_url_ipv6(raw_url: &str) -> bool {
    let Some(host) = authority(raw_url) else {
        return false;
    };

    if let Some(bracketed) = host.strip_prefix('[') {
        return match bracketed.split_once(']') {
            Some((inner, _)) => parse_v6_literal(inner).is_some_and(is_native_v6),
            None => false,
        };
    }

    if let Some(ip) = parse_v6_literal(host) {
        return is_native_v6(ip);
    }

    // Unbracketed literal followed by a port.
    match host.rsplit_once(':') {
        Some((candidate, port)) if port.chars().all(|c| c.is_ascii_digit()) => {
            parse_v6_literal(candidate).is_some_and(is_native_v6)
        }
        _ => false,
    }
}

/// Splits the zone off a bracketed IPv6 literal in `raw_url`.
///
/// Returns the URL with the zone removed, which the `url` crate can parse,
/// and the zone itself (an interface name) when there was one:
/// `http://[fe80::1%25eth0]:80/` gives `http://[fe80::1]:80/` and `eth0`.
pub fn split_url_zone(raw_url: &str) -> (String, Option<String>) {
    let zoned = authority(raw_url)
        .and_then(|host| host.strip_prefix('['))
        .and_then(|bracketed| bracketed.split_once(']'))
        .and_then(|(inner, _)| {
            let (addr, zone) = inner
                .split_once("%25")
                .or_else(|| inner.split_once('%'))?;
            Some((inner, addr, zone))
        });

    match zoned {
        Some((inner, addr, zone)) => (
            raw_url.replacen(inner, addr, 1),
            (!zone.is_empty()).then(|| zone.to_string()),
        ),
        None => (raw_url.to_string(), None),
    }
}

/// Returns true when an interface address belongs to an IPv6 prefix.
///
/// An IPv4-mapped address with an IPv4-sized prefix is an IPv4 network
/// stored in IPv6 form and classifies as false.
pub fn is_network_ipv6(network: &InterfaceNetwork) -> bool {
    match network.addr {
        IpAddr::V4(_) => false,
        IpAddr::V6(ip) => ip.to_ipv4_mapped().is_none() || network.prefix_len > 32,
    }
}

fn authority(raw_url: &str) -> Option<&str> {
    let (_, rest) = raw_url.split_once("://")?;
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..end];
    let host = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    (!host.is_empty()).then_some(host)
}

fn parse_v6_literal(literal: &str) -> Option<Ipv6Addr> {
    strip_zone(literal).parse().ok()
}

fn strip_zone(literal: &str) -> &str {
    match literal.split_once("%25").or_else(|| literal.split_once('%')) {
        Some((addr, _zone)) => addr,
        None => literal,
    }
}

fn is_native_v6(ip: Ipv6Addr) -> bool {
    ip.to_ipv4_mapped().is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_url_ipv6_classification() {
        let cases = [
            ("http://[2001:db8:a0b:12f0::1]/index.html", true),
            ("http://[2001:db8:a0b:12f0::1]:80/index.html", true),
            ("https://[2001:db8:a0b:12f0::1%25eth0]:15000/", true),
            ("https://2001:0db8:0001:0000:0000:0ab9:C0A8:0102", true),
            ("http://[2607:f8b0:4005:802::1007]/", true),
            ("http://[fe80::1%eth0]/", true),
            ("https://127.0.0.1", false),
            ("https://127.0.0.1:8443/health", false),
            ("https://google.com", false),
            ("https://thispagemayexist.ornot/index.html", false),
            ("http://[::ffff:192.0.2.1]/", false),
            ("http://user:secret@[::1]:8080/", true),
            ("http://not:an:address/", false),
            ("not a url", false),
        ];
        for (url, want) in cases {
            assert_eq!(is_url_ipv6(url), want, "is_url_ipv6({url})");
        }
    }

    #[test]
    fn test_split_url_zone() {
        let cases = [
            (
                "http://[fe80::1%25eth0]:8080/health",
                "http://[fe80::1]:8080/health",
                Some("eth0"),
            ),
            ("http://[fe80::1%eth0]/", "http://[fe80::1]/", Some("eth0")),
            ("http://user@[fe80::1%25lo]/", "http://user@[fe80::1]/", Some("lo")),
            ("http://[fe80::1%25]/", "http://[fe80::1]/", None),
            ("http://[2001:db8::1]:80/", "http://[2001:db8::1]:80/", None),
            ("https://127.0.0.1/a%25b", "https://127.0.0.1/a%25b", None),
        ];
        for (url, want_url, want_zone) in cases {
            let (stripped, zone) = split_url_zone(url);
            assert_eq!(stripped, want_url, "split_url_zone({url})");
            assert_eq!(zone.as_deref(), want_zone, "split_url_zone({url})");
        }
    }

    #[test]
    fn test_network_ipv6_classification() {
        let cases = [
            (InterfaceNetwork::new(Ipv4Addr::new(127, 0, 0, 1).into(), 8), false),
            (InterfaceNetwork::new(Ipv6Addr::LOCALHOST.into(), 128), true),
            (InterfaceNetwork::new(Ipv4Addr::new(192, 168, 0, 1).into(), 24), false),
            (
                InterfaceNetwork::new("fe80::43ac:7835:471a:faba".parse().unwrap(), 64),
                true,
            ),
            (
                InterfaceNetwork::new(Ipv4Addr::new(10, 0, 0, 1).to_ipv6_mapped().into(), 8),
                false,
            ),
        ];
        for (network, want) in cases {
            assert_eq!(is_network_ipv6(&network), want, "{network:?}");
        }
    }
}
