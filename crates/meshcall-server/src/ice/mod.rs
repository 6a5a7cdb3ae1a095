//! ICE transport muxing (C4) and public-address discovery (C5), §4.1 steps 1-4.

pub mod host_candidates;
pub mod host_port_override;
pub mod stun_discovery;
pub mod tcp_mux;
pub mod turn_creds;
pub mod udp_mux;

use std::net::IpAddr;

use crate::config::RtcConfig;
use crate::error::SfuError;
use host_candidates::{generate_addr_pairs, AddrPair, HostOverride};
use tcp_mux::MultiTcpMux;
use udp_mux::MultiUdpMux;

/// Everything the SFU server needs to hand a fresh peer connection its
/// ICE transport: the UDP/TCP muxes and the resolved NAT 1:1 pairs.
pub struct IceTransport {
    pub udp: MultiUdpMux,
    pub tcp: MultiTcpMux,
    pub nat_pairs: Vec<AddrPair>,
}

impl IceTransport {
    /// §4.1 Start, steps 1-4.
    pub async fn start(cfg: &RtcConfig) -> Result<Self, SfuError> {
        let local_addrs = enumerate_local_addrs(cfg.enable_ipv6)?;
        if local_addrs.is_empty() {
            return Err(SfuError::Config(
                "no usable local unicast address found".to_string(),
            ));
        }

        let host_override = HostOverride::parse(&cfg.ice_host_override).resolve().await;

        let public_addrs = if matches!(host_override, HostOverride::None) && !cfg.ice_servers.is_empty() {
            let stun_urls: Vec<String> = cfg
                .ice_servers
                .iter()
                .filter_map(|e| match e {
                    crate::config::IceServerEntry::Url(u) if u.starts_with("stun:") => {
                        Some(u.clone())
                    }
                    crate::config::IceServerEntry::Full { urls, .. } => {
                        urls.iter().find(|u| u.starts_with("stun:")).cloned()
                    }
                    _ => None,
                })
                .collect();
            stun_discovery::discover_public_addrs(&local_addrs, &stun_urls).await
        } else {
            Default::default()
        };

        let nat_pairs = generate_addr_pairs(&local_addrs, &public_addrs, &host_override);

        let udp_port = cfg.ice_port_udp;
        let tcp_port = cfg.ice_port_tcp;
        let udp = MultiUdpMux::new(&local_addrs, udp_port, cfg.udp_sockets_count).await?;
        let tcp = MultiTcpMux::new(&local_addrs, tcp_port).await?;

        Ok(Self {
            udp,
            tcp,
            nat_pairs,
        })
    }

    /// `NAT1to1IPs` in `"public/local"` string pairs, the shape
    /// `SettingEngine::set_nat_1to1_ips` expects. A bare IP is only valid
    /// when there's a single address per IP family; multi-homed
    /// deployments (§4.4) need the explicit pairing.
    pub fn nat_1to1_ips(&self) -> Vec<String> {
        self.nat_pairs
            .iter()
            .map(|p| format!("{}/{}", p.public, p.local))
            .collect()
    }
}

fn enumerate_local_addrs(enable_ipv6: bool) -> Result<Vec<IpAddr>, SfuError> {
    let interfaces = if_addrs::get_if_addrs()
        .map_err(|e| SfuError::Transport(format!("enumerate interfaces: {e}")))?;

    let addrs: Vec<IpAddr> = interfaces
        .into_iter()
        .map(|iface| iface.ip())
        .filter(|ip| !ip.is_loopback())
        .filter(|ip| match ip {
            IpAddr::V4(v4) => !v4.is_link_local(),
            IpAddr::V6(_) => enable_ipv6,
        })
        .collect();

    Ok(addrs)
}
