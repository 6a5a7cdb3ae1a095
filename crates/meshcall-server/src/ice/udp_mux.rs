//! Per-interface UDP socket pools combined into a single ICE UDP mux (C4).
//!
//! Each bind address gets `udp_sockets_count` raw sockets opened with
//! `SO_REUSEADDR`/`SO_REUSEPORT` so the kernel load-balances inbound
//! packets across them; outbound writes round-robin across the pool by
//! an atomic counter. The pool is wrapped behind `webrtc`'s
//! `UDPMuxDefault`, one per bind address, combined into a
//! [`MultiUdpMux`] keyed by address.

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use webrtc::ice::udp_mux::{UDPMuxDefault, UDPMuxParams};
use webrtc::ice_transport::ice_server::RTCIceServer;

use crate::error::SfuError;

/// 16 MiB kernel socket buffer, best-effort (§4.4).
const SOCKET_BUFFER_BYTES: usize = 16 * 1024 * 1024;
/// WebRTC's conservative path MTU.
pub const RTP_MTU: usize = 1460;

/// A round-robin pool of UDP sockets bound to the same local address with
/// `SO_REUSEPORT`, presented as a single `tokio::net::UdpSocket` via the
/// first member (all members receive a kernel-balanced share of inbound
/// traffic; writes are distributed round-robin).
pub struct UdpSocketPool {
    sockets: Vec<Arc<tokio::net::UdpSocket>>,
    next: AtomicUsize,
}

impl UdpSocketPool {
    /// Opens `count` `SO_REUSEPORT` sockets bound to `addr`, and returns
    /// the pool alongside one extra socket of the same kind reserved for
    /// `UDPMuxDefault` — ICE drives exactly one socket, the pool is what
    /// absorbs the kernel-balanced inbound fan-in share.
    pub fn bind(addr: SocketAddr, count: u32) -> Result<(Self, std::net::UdpSocket), SfuError> {
        let count = count.max(1);
        let mut sockets = Vec::with_capacity(count as usize);
        for _ in 0..count {
            sockets.push(Arc::new(Self::open_one(addr)?));
        }
        let mux_socket = Self::open_one(addr)?.into_std()
            .map_err(|e| SfuError::Transport(format!("unwrap mux socket: {e}")))?;

        Ok((
            Self {
                sockets,
                next: AtomicUsize::new(0),
            },
            mux_socket,
        ))
    }

    fn open_one(addr: SocketAddr) -> Result<tokio::net::UdpSocket, SfuError> {
        let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
        let sock = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| SfuError::Transport(format!("socket(): {e}")))?;
        sock.set_reuse_address(true)
            .map_err(|e| SfuError::Transport(format!("SO_REUSEADDR: {e}")))?;
        #[cfg(target_family = "unix")]
        sock.set_reuse_port(true)
            .map_err(|e| SfuError::Transport(format!("SO_REUSEPORT: {e}")))?;
        sock.set_nonblocking(true)
            .map_err(|e| SfuError::Transport(format!("nonblocking: {e}")))?;
        // Best-effort: some platforms cap this lower, we don't treat it as fatal.
        let _ = sock.set_recv_buffer_size(SOCKET_BUFFER_BYTES);
        let _ = sock.set_send_buffer_size(SOCKET_BUFFER_BYTES);
        sock.bind(&SockAddr::from(addr))
            .map_err(|e| SfuError::Transport(format!("bind {addr}: {e}")))?;

        let std_socket: std::net::UdpSocket = sock.into();
        tokio::net::UdpSocket::from_std(std_socket)
            .map_err(|e| SfuError::Transport(format!("tokio wrap: {e}")))
    }

    /// Picks the next socket in round-robin order for an outbound write.
    pub fn next_socket(&self) -> Arc<tokio::net::UdpSocket> {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.sockets.len();
        self.sockets[idx].clone()
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.sockets[0].local_addr()
    }
}

/// One `UDPMuxDefault` per configured bind address, selectable by address.
pub struct MultiUdpMux {
    muxes: HashMap<IpAddr, Arc<UDPMuxDefault>>,
    pools: HashMap<IpAddr, Arc<UdpSocketPool>>,
}

impl MultiUdpMux {
    /// Builds one socket pool + ICE UDP mux per bind address.
    pub async fn new(
        bind_addrs: &[IpAddr],
        port: u16,
        sockets_per_addr: u32,
    ) -> Result<Self, SfuError> {
        let mut muxes = HashMap::with_capacity(bind_addrs.len());
        let mut pools = HashMap::with_capacity(bind_addrs.len());

        for &addr in bind_addrs {
            let (pool, mux_socket) =
                UdpSocketPool::bind(SocketAddr::new(addr, port), sockets_per_addr)?;
            let mux_socket = tokio::net::UdpSocket::from_std(mux_socket)
                .map_err(|e| SfuError::Transport(format!("rewrap mux socket: {e}")))?;
            let params = UDPMuxParams::new(mux_socket);
            let mux = Arc::new(UDPMuxDefault::new(params));
            muxes.insert(addr, mux);
            pools.insert(addr, Arc::new(pool));
        }

        Ok(Self { muxes, pools })
    }

    pub fn mux_for(&self, addr: IpAddr) -> Option<Arc<UDPMuxDefault>> {
        self.muxes.get(&addr).cloned()
    }

    /// The default mux to hand to a freshly created peer connection. Any
    /// bind address's mux works equally: ICE picks host candidates from
    /// all of them once `NAT1to1IPs` has been set.
    pub fn default_mux(&self) -> Option<Arc<UDPMuxDefault>> {
        self.muxes.values().next().cloned()
    }

    pub fn pool_for(&self, addr: IpAddr) -> Option<Arc<UdpSocketPool>> {
        self.pools.get(&addr).cloned()
    }

    pub fn bind_addrs(&self) -> Vec<IpAddr> {
        self.muxes.keys().copied().collect()
    }
}

/// Helper used by §4.1 step 4 to turn the configured ICE server strings
/// into `RTCIceServer` values (credentials already resolved by
/// [`crate::ice::turn_creds`]).
pub fn to_rtc_ice_servers(
    creds: &[crate::ice::turn_creds::IceServerCredential],
) -> Vec<RTCIceServer> {
    creds
        .iter()
        .map(|c| RTCIceServer {
            urls: c.urls.clone(),
            username: c.username.clone().unwrap_or_default(),
            credential: c.credential.clone().unwrap_or_default(),
        })
        .collect()
}
