//! Public-address discovery (C5, §2, §4.1 step 3).
//!
//! Sends one STUN binding request per local address and records the
//! reflexive address it gets back. Used to populate `NAT1to1IPs` when no
//! explicit host override is configured.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;

use crate::error::SfuError;

const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Performs STUN binding requests against `stun_servers`, one per local
/// address, returning the subset that answered within the timeout.
///
/// Each local address gets its own ephemeral UDP socket bound to that
/// address so the reflexive mapping observed is specific to it.
pub async fn discover_public_addrs(
    local_addrs: &[IpAddr],
    stun_servers: &[String],
) -> HashMap<IpAddr, String> {
    let mut out = HashMap::new();
    let Some(server) = stun_servers.first() else {
        return out;
    };

    for &local in local_addrs {
        match tokio::time::timeout(DISCOVERY_TIMEOUT, discover_one(local, server)).await {
            Ok(Ok(public)) => {
                tracing::info!(%local, %public, "stun discovery resolved public address");
                out.insert(local, public.to_string());
            }
            Ok(Err(e)) => {
                tracing::warn!(%local, server, error = %e, "stun discovery failed");
            }
            Err(_) => {
                tracing::warn!(%local, server, "stun discovery timed out after {DISCOVERY_TIMEOUT:?}");
            }
        }
    }

    out
}

async fn discover_one(local: IpAddr, stun_server: &str) -> Result<IpAddr, SfuError> {
    let server_addr = resolve_stun_server(stun_server)
        .await
        .map_err(|e| SfuError::Transport(e.to_string()))?;

    let bind_addr = SocketAddr::new(local, 0);
    let socket = UdpSocket::bind(bind_addr)
        .await
        .map_err(|e| SfuError::Transport(format!("bind {bind_addr}: {e}")))?;
    socket
        .connect(server_addr)
        .await
        .map_err(|e| SfuError::Transport(e.to_string()))?;

    let request = stun_binding_request();
    socket
        .send(&request)
        .await
        .map_err(|e| SfuError::Transport(e.to_string()))?;

    let mut buf = [0u8; 512];
    let n = socket
        .recv(&mut buf)
        .await
        .map_err(|e| SfuError::Transport(e.to_string()))?;

    parse_xor_mapped_address(&buf[..n], &request[4..20])
        .ok_or_else(|| SfuError::Transport("no XOR-MAPPED-ADDRESS in STUN response".to_string()))
}

async fn resolve_stun_server(raw: &str) -> std::io::Result<SocketAddr> {
    let host_port = raw
        .trim_start_matches("stun:")
        .trim_start_matches("stuns:");
    tokio::net::lookup_host(host_port)
        .await?
        .next()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no address for STUN server"))
}

const STUN_MAGIC_COOKIE: u32 = 0x2112_A442;
const STUN_BINDING_REQUEST: u16 = 0x0001;
const STUN_ATTR_XOR_MAPPED_ADDRESS: u16 = 0x0020;

fn stun_binding_request() -> Vec<u8> {
    let mut msg = Vec::with_capacity(20);
    msg.extend_from_slice(&STUN_BINDING_REQUEST.to_be_bytes());
    msg.extend_from_slice(&0u16.to_be_bytes()); // message length, no attributes
    msg.extend_from_slice(&STUN_MAGIC_COOKIE.to_be_bytes());
    for _ in 0..12 {
        msg.push(rand::random());
    }
    msg
}

fn parse_xor_mapped_address(resp: &[u8], transaction_id: &[u8]) -> Option<IpAddr> {
    if resp.len() < 20 || &resp[8..20] != transaction_id {
        return None;
    }
    let mut offset = 20usize;
    while offset + 4 <= resp.len() {
        let attr_type = u16::from_be_bytes([resp[offset], resp[offset + 1]]);
        let attr_len = u16::from_be_bytes([resp[offset + 2], resp[offset + 3]]) as usize;
        let value_start = offset + 4;
        let value_end = value_start + attr_len;
        if value_end > resp.len() {
            return None;
        }
        if attr_type == STUN_ATTR_XOR_MAPPED_ADDRESS && attr_len >= 8 {
            let value = &resp[value_start..value_end];
            let family = value[1];
            let xport = u16::from_be_bytes([value[2], value[3]]);
            let _port = xport ^ ((STUN_MAGIC_COOKIE >> 16) as u16);
            if family == 0x01 {
                let xaddr = u32::from_be_bytes([value[4], value[5], value[6], value[7]]);
                let addr = xaddr ^ STUN_MAGIC_COOKIE;
                return Some(IpAddr::from(addr.to_be_bytes()));
            }
        }
        offset = value_end + ((4 - (attr_len % 4)) % 4);
    }
    None
}
