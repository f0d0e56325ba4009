//! Shared networking utilities for syncmesh.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use anyhow::{Context, Result};
use tokio::net::{lookup_host, UdpSocket};

// ============================================================================
// Host/Port Pairs
// ============================================================================

/// A (host, port) pair as exchanged through the signalling server.
///
/// An empty host or a zero port marks the pair as "not usable".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct HostPort {
    pub host: String,
    pub port: u16,
}

impl HostPort {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Build from a transport-observed socket address.
    ///
    /// IPv4-mapped IPv6 addresses (seen when listening on `[::]`) are reported
    /// in their IPv4 form.
    pub fn from_socket_addr(addr: SocketAddr) -> Self {
        Self {
            host: addr.ip().to_canonical().to_string(),
            port: addr.port(),
        }
    }

    /// True when both host and port are populated.
    pub fn is_usable(&self) -> bool {
        !self.host.is_empty() && self.port != 0
    }

    /// True when neither host nor port carries information.
    pub fn is_blank(&self) -> bool {
        self.host.is_empty() && self.port == 0
    }
}

impl fmt::Display for HostPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&join_host_port(&self.host, self.port))
    }
}

/// Join host and port into a dialable `host:port` string.
/// IPv6 literals are bracketed.
pub fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

// ============================================================================
// Local Address Detection
// ============================================================================

/// Detect the local IP address used to reach the signalling server.
///
/// Connects a UDP socket toward the server host (no packets are sent) and reads
/// back the local address the kernel picked for the route. Falls back to port 443
/// for `https` URLs and 80 otherwise when the URL carries no explicit port.
pub async fn detect_local_ip(server_url: &str) -> Result<IpAddr> {
    let url = url::Url::parse(server_url)
        .with_context(|| format!("Invalid server URL '{}'", server_url))?;
    let host = url
        .host_str()
        .with_context(|| format!("Server URL '{}' missing host", server_url))?;
    let port = url
        .port_or_known_default()
        .unwrap_or(if url.scheme() == "https" { 443 } else { 80 });

    let target = lookup_host(join_host_port(host.trim_matches(|c| c == '[' || c == ']'), port))
        .await
        .with_context(|| format!("Failed to resolve '{}'", host))?
        .next()
        .with_context(|| format!("No addresses found for host '{}'", host))?;

    let bind_addr: SocketAddr = if target.is_ipv4() {
        "0.0.0.0:0".parse()?
    } else {
        "[::]:0".parse()?
    };
    let socket = UdpSocket::bind(bind_addr)
        .await
        .context("Failed to bind UDP probe socket")?;
    socket
        .connect(target)
        .await
        .with_context(|| format!("Failed to route toward {}", target))?;
    let local = socket.local_addr()?.ip();

    log::debug!("Detected local IP {} (route toward {})", local, target);
    Ok(local)
}
