//! ICE TCP mux: one listener per bind address (C4).
//!
//! Framed with a 64-byte read buffer and 4 MiB write buffer, matching the
//! STUN-over-TCP framing `webrtc`'s `TCPMuxDefault` expects.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use webrtc::ice::tcp_mux::{TcpMuxDefault, TcpMuxParams};

use crate::error::SfuError;

const TCP_READ_BUFFER: usize = 64;
const TCP_WRITE_BUFFER: usize = 4 * 1024 * 1024;

pub struct MultiTcpMux {
    muxes: HashMap<IpAddr, Arc<TcpMuxDefault>>,
}

impl MultiTcpMux {
    pub async fn new(bind_addrs: &[IpAddr], port: u16) -> Result<Self, SfuError> {
        let mut muxes = HashMap::with_capacity(bind_addrs.len());
        for &addr in bind_addrs {
            let listen_addr = SocketAddr::new(addr, port);
            let listener = tokio::net::TcpListener::bind(listen_addr)
                .await
                .map_err(|e| SfuError::Transport(format!("tcp bind {listen_addr}: {e}")))?;
            let params = TcpMuxParams::new(listener)
                .with_conn_buffer_size(TCP_READ_BUFFER)
                .with_buffer_pool_size(TCP_WRITE_BUFFER);
            muxes.insert(addr, Arc::new(TcpMuxDefault::new(params)));
        }
        Ok(Self { muxes })
    }

    pub fn mux_for(&self, addr: IpAddr) -> Option<Arc<TcpMuxDefault>> {
        self.muxes.get(&addr).cloned()
    }

    pub fn default_mux(&self) -> Option<Arc<TcpMuxDefault>> {
        self.muxes.values().next().cloned()
    }

    pub fn bind_addrs(&self) -> Vec<IpAddr> {
        self.muxes.keys().copied().collect()
    }
}
