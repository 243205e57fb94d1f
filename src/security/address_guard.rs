//! Address allow/deny predicate for outbound relay traffic.
//!
//! # Responsibilities
//! - Decide whether a hostname or textual IP may be contacted
//! - Hold the deny-set of exact tokens and the deny-list of CIDR prefixes
//!
//! # Design Decisions
//! - Pure function of its inputs; no DNS, no I/O
//! - Exact tokens are compared case-sensitively, as configured
//! - Bracketed IPv6 (`[::1]`) and IPv4-mapped IPv6 are normalised before prefix checks

use std::collections::HashSet;
use std::net::IpAddr;

use ipnet::IpNet;

/// Deny entries applied when the configuration does not override them.
///
/// Private networks, loopback, the unspecified address and the cloud
/// instance-metadata endpoints.
pub const DEFAULT_DISALLOWED: &[&str] = &[
    "10.0.0.0/8",
    "172.16.0.0/12",
    "192.168.0.0/16",
    "fd00::/8",
    "localhost",
    "0.0.0.0/32",
    "127.0.0.0/8",
    "::1/128",
    "::/128",
    "[::]",
    "169.254.169.254/32",
    "fd00:ec2::254/128",
];

/// Predicate deciding which addresses the relay may contact.
#[derive(Debug, Clone, Default)]
pub struct AddressGuard {
    denied_hosts: HashSet<String>,
    denied_networks: Vec<IpNet>,
}

impl AddressGuard {
    /// Build a guard from configuration tokens.
    ///
    /// Entries that parse as CIDR prefixes become network denials, everything
    /// else is treated as an exact host token. Blank entries are skipped.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut guard = Self::default();
        for entry in entries {
            let entry = entry.as_ref().trim();
            if entry.is_empty() {
                continue;
            }
            match entry.parse::<IpNet>() {
                Ok(net) => guard.denied_networks.push(net),
                Err(_) => {
                    guard.denied_hosts.insert(entry.to_string());
                }
            }
        }
        guard
    }

    /// Guard built from [`DEFAULT_DISALLOWED`].
    pub fn with_defaults() -> Self {
        Self::from_entries(DEFAULT_DISALLOWED)
    }

    /// Returns `true` when `address` may be contacted.
    pub fn is_allowed(&self, address: &str) -> bool {
        if address.is_empty() {
            return false;
        }

        if self.denied_hosts.contains(address) {
            return false;
        }

        match parse_ip(address) {
            // Not an IP address, so it's a hostname: allowed unless listed above.
            None => true,
            Some(ip) => !self.denied_networks.iter().any(|net| net.contains(&ip)),
        }
    }

    /// Number of exact host tokens.
    pub fn denied_host_count(&self) -> usize {
        self.denied_hosts.len()
    }

    /// Number of denied CIDR prefixes.
    pub fn denied_network_count(&self) -> usize {
        self.denied_networks.len()
    }
}

/// Render an IP the way the dialer reports peers: IPv6 in brackets.
pub fn bracketed(ip: IpAddr) -> String {
    match ip.to_canonical() {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => format!("[{}]", v6),
    }
}

fn parse_ip(address: &str) -> Option<IpAddr> {
    let bare = address
        .strip_prefix('[')
        .and_then(|a| a.strip_suffix(']'))
        .unwrap_or(address);
    bare.parse::<IpAddr>().ok().map(|ip| ip.to_canonical())
}
