//! `ICEHostPortOverride` parsing (§3, §4.4).
//!
//! Either a bare port (`"8443"`) applied to every local address, or a
//! comma-separated list of `ip/port` pairs, one per local address.

use std::collections::HashSet;
use std::net::IpAddr;

const MIN_PORT: u16 = 80;
const MAX_PORT: u16 = 49151;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostPortOverride {
    /// No override configured.
    None,
    /// A single port shared by every local address.
    SinglePort(u16),
    /// Explicit `local-ip -> port` pairs.
    Map(Vec<(IpAddr, u16)>),
}

impl HostPortOverride {
    /// Parses the raw config string, rejecting ports outside `[80, 49151]`
    /// and duplicate local addresses in the map form.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(HostPortOverride::None);
        }

        if !raw.contains('/') {
            let port: u16 = raw
                .parse()
                .map_err(|_| format!("not a valid port: {raw}"))?;
            Self::check_port(port)?;
            return Ok(HostPortOverride::SinglePort(port));
        }

        let mut seen_ips = HashSet::new();
        let mut seen_ports = HashSet::new();
        let mut pairs = Vec::new();
        for entry in raw.split(',') {
            let entry = entry.trim();
            let (ip_str, port_str) = entry
                .split_once('/')
                .ok_or_else(|| format!("malformed ip/port pair: {entry}"))?;
            let ip: IpAddr = ip_str
                .parse()
                .map_err(|_| format!("not a valid IP: {ip_str}"))?;
            let port: u16 = port_str
                .parse()
                .map_err(|_| format!("not a valid port: {port_str}"))?;
            Self::check_port(port)?;
            if !seen_ips.insert(ip) {
                return Err(format!("duplicate local address in override: {ip}"));
            }
            if !seen_ports.insert(port) {
                return Err(format!("duplicate public port in override: {port}"));
            }
            pairs.push((ip, port));
        }
        Ok(HostPortOverride::Map(pairs))
    }

    fn check_port(port: u16) -> Result<(), String> {
        if port < MIN_PORT || port > MAX_PORT {
            return Err(format!(
                "port {port} out of range [{MIN_PORT}, {MAX_PORT}]"
            ));
        }
        Ok(())
    }

    /// Resolves the port to use for a given local address, falling back to
    /// `default_port` when the address isn't covered by a `Map` override.
    pub fn port_for(&self, addr: IpAddr, default_port: u16) -> u16 {
        match self {
            HostPortOverride::None => default_port,
            HostPortOverride::SinglePort(p) => *p,
            HostPortOverride::Map(pairs) => pairs
                .iter()
                .find(|(ip, _)| *ip == addr)
                .map(|(_, p)| *p)
                .unwrap_or(default_port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_none() {
        assert_eq!(HostPortOverride::parse("").unwrap(), HostPortOverride::None);
    }

    #[test]
    fn single_port_in_range() {
        assert_eq!(
            HostPortOverride::parse("8443").unwrap(),
            HostPortOverride::SinglePort(8443)
        );
    }

    #[test]
    fn rejects_port_outside_range() {
        assert!(HostPortOverride::parse("79").is_err());
        assert!(HostPortOverride::parse("49152").is_err());
    }

    #[test]
    fn parses_map_form() {
        let parsed = HostPortOverride::parse("10.0.0.1/8001,10.0.0.2/8002").unwrap();
        match parsed {
            HostPortOverride::Map(pairs) => assert_eq!(pairs.len(), 2),
            _ => panic!("expected map form"),
        }
    }

    #[test]
    fn rejects_duplicate_local_in_map() {
        assert!(HostPortOverride::parse("10.0.0.1/8001,10.0.0.1/8002").is_err());
    }

    #[test]
    fn rejects_duplicate_public_port_across_different_locals() {
        assert!(HostPortOverride::parse("10.0.0.1/8001,10.0.0.2/8001").is_err());
    }

    #[test]
    fn port_for_falls_back_to_default() {
        let o = HostPortOverride::parse("10.0.0.1/8001").unwrap();
        let other: IpAddr = "10.0.0.9".parse().unwrap();
        assert_eq!(o.port_for(other, 9000), 9000);
    }
}
