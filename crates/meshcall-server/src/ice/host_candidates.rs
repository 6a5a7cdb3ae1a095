//! Host candidate construction (§4.4 `generateAddrsPairs`).
//!
//! Produces the `local -> public` NAT 1:1 mapping pairs fed to
//! `SetNAT1To1IPs`, resolving the host override against the discovered
//! reflexive addresses.

use std::collections::HashMap;
use std::net::IpAddr;

/// Either a literal address or a hostname preserved verbatim (FQDNs must
/// not be resolved away per §4.2's "On ICE candidate" note).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOverride {
    None,
    Ip(IpAddr),
    Fqdn(String),
}

impl HostOverride {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return HostOverride::None;
        }
        match raw.parse::<IpAddr>() {
            Ok(ip) => HostOverride::Ip(ip),
            Err(_) => HostOverride::Fqdn(raw.to_string()),
        }
    }

    /// Resolves an `Fqdn` override to one concrete IP (§4.4: "Override may
    /// be an IP or a FQDN; if FQDN, resolve to one IP"). Other variants
    /// pass through unchanged. A hostname that fails to resolve falls back
    /// to `None` rather than handing an unresolved name to
    /// `SetNAT1To1IPs`, which only understands literal IPs.
    pub async fn resolve(self) -> Self {
        let HostOverride::Fqdn(name) = &self else {
            return self;
        };
        match tokio::net::lookup_host((name.as_str(), 0)).await {
            Ok(mut addrs) => match addrs.next() {
                Some(addr) => HostOverride::Ip(addr.ip()),
                None => {
                    tracing::warn!(host = %name, "ice host override resolved to no addresses, ignoring");
                    HostOverride::None
                }
            },
            Err(e) => {
                tracing::warn!(host = %name, error = %e, "failed to resolve ice host override, ignoring");
                HostOverride::None
            }
        }
    }
}

/// A `public/local` NAT mapping pair, in the shape `SetNAT1To1IPs` wants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddrPair {
    pub public: String,
    pub local: IpAddr,
}

/// Builds the ordered `public/local` pairs for `SetNAT1To1IPs`.
///
/// `local_addrs` is the ordered list of discovered unicast addresses,
/// `public_addrs` the per-local reflexive address from STUN discovery
/// (may be empty / partial), `override_` an optional host override.
///
/// A public value is only emitted once: the first local address that
/// would map to an already-used public address instead uses itself as
/// the public side, per the open-question resolution in the design
/// notes ("first wins, rest use local IP for both sides").
pub fn generate_addr_pairs(
    local_addrs: &[IpAddr],
    public_addrs: &HashMap<IpAddr, String>,
    override_: &HostOverride,
) -> Vec<AddrPair> {
    let mut used_publics = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(local_addrs.len());

    for &local in local_addrs {
        let candidate_public = match override_ {
            HostOverride::Ip(ip) => ip.to_string(),
            // `resolve()` turns an `Fqdn` into `Ip` before this is ever
            // called in production; an unresolved one reaching here falls
            // back to the local address rather than handing a hostname to
            // `SetNAT1To1IPs`.
            HostOverride::Fqdn(_) => local.to_string(),
            HostOverride::None => public_addrs
                .get(&local)
                .cloned()
                .unwrap_or_else(|| local.to_string()),
        };

        let public = if used_publics.contains(&candidate_public) {
            local.to_string()
        } else {
            candidate_public
        };
        used_publics.insert(public.clone());

        out.push(AddrPair { public, local });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_local_when_no_public_known() {
        let locals = vec!["10.0.0.1".parse().unwrap()];
        let pairs = generate_addr_pairs(&locals, &HashMap::new(), &HostOverride::None);
        assert_eq!(pairs[0].public, "10.0.0.1");
    }

    #[test]
    fn uses_discovered_public_per_local() {
        let locals: Vec<IpAddr> = vec!["10.0.0.1".parse().unwrap(), "10.0.0.2".parse().unwrap()];
        let mut public = HashMap::new();
        public.insert(locals[0], "203.0.113.1".to_string());
        public.insert(locals[1], "203.0.113.2".to_string());
        let pairs = generate_addr_pairs(&locals, &public, &HostOverride::None);
        assert_eq!(pairs[0].public, "203.0.113.1");
        assert_eq!(pairs[1].public, "203.0.113.2");
    }

    #[test]
    fn duplicate_public_falls_back_to_local_for_later_entries() {
        let locals: Vec<IpAddr> = vec!["10.0.0.1".parse().unwrap(), "10.0.0.2".parse().unwrap()];
        let mut public = HashMap::new();
        public.insert(locals[0], "203.0.113.1".to_string());
        public.insert(locals[1], "203.0.113.1".to_string());
        let pairs = generate_addr_pairs(&locals, &public, &HostOverride::None);
        assert_eq!(pairs[0].public, "203.0.113.1");
        assert_eq!(pairs[1].public, "10.0.0.2", "second entry falls back to local");
    }

    #[test]
    fn unresolved_fqdn_falls_back_to_local() {
        let locals = vec!["10.0.0.1".parse().unwrap()];
        let over = HostOverride::parse("turn.example.com");
        let pairs = generate_addr_pairs(&locals, &HashMap::new(), &over);
        assert_eq!(pairs[0].public, "10.0.0.1");
    }

    #[tokio::test]
    async fn resolve_falls_back_to_none_when_lookup_fails() {
        // RFC 2606 reserved TLD, guaranteed to never resolve.
        let over = HostOverride::parse("host.invalid").resolve().await;
        assert_eq!(over, HostOverride::None);
    }

    #[tokio::test]
    async fn resolve_passes_through_non_fqdn_variants() {
        let ip = HostOverride::parse("203.0.113.5").resolve().await;
        assert_eq!(ip, HostOverride::Ip("203.0.113.5".parse().unwrap()));

        let none = HostOverride::parse("").resolve().await;
        assert_eq!(none, HostOverride::None);
    }
}
