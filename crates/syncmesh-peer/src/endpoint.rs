//! Endpoint lifecycle.
//!
//! Startup order:
//! 1. resolve the local IP (override, else route detection, else loopback)
//! 2. bind the peer listener and start accepting
//! 3. register with the signalling server
//! 4. start heartbeats
//! 5. after a short settle delay, discover peers and dial the first reachable one
//!
//! Steps 2 and 3 are fatal on failure. Step 5 is not: the endpoint keeps
//! listening whether or not it reached anybody.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};
use syncmesh_common::config::ResolvedPeerConfig;
use syncmesh_common::net::detect_local_ip;
use syncmesh_common::HostPort;
use tokio::task::JoinHandle;

use crate::client::SignalClient;
use crate::connector::{PeerConnector, ProbeOutcome};
use crate::error::ConnectError;
use crate::heartbeat::heartbeat_loop;
use crate::listener::PeerListener;

/// Pause between registering and the first discovery.
pub const STARTUP_DELAY: Duration = Duration::from_millis(500);

/// A registered endpoint with its listener and heartbeat running.
pub struct Endpoint {
    client: SignalClient,
    client_id: String,
    local_address: HostPort,
    accept_task: JoinHandle<()>,
    heartbeat_task: JoinHandle<()>,
}

impl Endpoint {
    /// Bind `0.0.0.0:<listen_port>`, register and start heartbeats.
    pub async fn start(config: &ResolvedPeerConfig) -> Result<Self> {
        let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.listen_port));
        let listener = PeerListener::bind(bind_addr).await?;
        Self::start_with_listener(config, listener).await
    }

    /// Like [`start`](Self::start) with an already bound listener.
    ///
    /// The advertised local port is the listener's actual port.
    pub async fn start_with_listener(
        config: &ResolvedPeerConfig,
        listener: PeerListener,
    ) -> Result<Self> {
        let client = SignalClient::new(&config.server_url)
            .context("Failed to create signalling client")?;

        let local_ip = resolve_local_ip(config).await;
        let listen_addr = listener.local_addr()?;
        let local_address = HostPort::new(local_ip.to_string(), listen_addr.port());
        info!("Listening on {} (local IP: {})", listen_addr, local_ip);
        let accept_task = tokio::spawn(listener.run());

        let client_id = match client.register(Some(&local_address)).await {
            Ok(id) => id,
            Err(e) => {
                accept_task.abort();
                return Err(e).context("Registration with signalling server failed");
            }
        };
        info!("Registered with clientId={}", client_id);

        let heartbeat_task = tokio::spawn(heartbeat_loop(
            client.clone(),
            client_id.clone(),
            config.heartbeat_interval,
        ));

        Ok(Self {
            client,
            client_id,
            local_address,
            accept_task,
            heartbeat_task,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// The address advertised to other peers.
    pub fn local_address(&self) -> &HostPort {
        &self.local_address
    }

    pub fn client(&self) -> &SignalClient {
        &self.client
    }

    /// Discover peers and probe the first reachable one.
    pub async fn connect_to_peer(&self) -> Result<ProbeOutcome, ConnectError> {
        PeerConnector::new()
            .discover_and_connect(&self.client, &self.client_id)
            .await
    }

    /// Keep serving inbound peers until the accept loop ends.
    pub async fn wait(self) -> Result<()> {
        let result = self.accept_task.await;
        self.heartbeat_task.abort();
        result.context("Peer listener task failed")
    }

    /// Stop listening and heartbeating, then unregister.
    pub async fn shutdown(self) -> Result<()> {
        self.accept_task.abort();
        self.heartbeat_task.abort();
        self.client
            .unregister(&self.client_id)
            .await
            .context("Failed to unregister")
    }
}

/// Run an endpoint for the lifetime of the process.
pub async fn run_endpoint(config: ResolvedPeerConfig) -> Result<()> {
    let endpoint = Endpoint::start(&config).await?;

    tokio::time::sleep(STARTUP_DELAY).await;

    match endpoint.connect_to_peer().await {
        Ok(outcome) => info!("Connected to peer {} at {}", outcome.peer_id, outcome.address),
        Err(e) => warn!("No peer connection made: {}", e),
    }

    endpoint.wait().await
}

async fn resolve_local_ip(config: &ResolvedPeerConfig) -> IpAddr {
    if let Some(ip) = config.local_ip {
        return ip;
    }
    match detect_local_ip(&config.server_url).await {
        Ok(ip) => ip,
        Err(e) => {
            warn!("Local IP detection failed, using loopback: {:#}", e);
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}
