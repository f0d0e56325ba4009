//! Inbound side of the direct connection.
//!
//! One accept loop for the lifetime of the process; every accepted
//! connection is handled on its own task, so a slow peer never holds up the
//! next accept.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::time::timeout;

use crate::greeting::{read_greeting, write_greeting, PEER_GREETING};

/// Bound on waiting for the dialing side's greeting.
pub const READ_DEADLINE: Duration = Duration::from_secs(30);

/// TCP listener accepting direct peer connections.
pub struct PeerListener {
    listener: TcpListener,
    read_deadline: Duration,
}

impl PeerListener {
    /// Bind the listening socket. Failing here is fatal for the endpoint.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to listen on {}", addr))?;
        Ok(Self {
            listener,
            read_deadline: READ_DEADLINE,
        })
    }

    pub fn with_read_deadline(mut self, read_deadline: Duration) -> Self {
        self.read_deadline = read_deadline;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever.
    pub async fn run(self) {
        let read_deadline = self.read_deadline;
        loop {
            match self.listener.accept().await {
                Ok((stream, peer_addr)) => {
                    debug!("Peer connected from {}", peer_addr);
                    tokio::spawn(async move {
                        handle_conn(stream, peer_addr, read_deadline).await;
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

/// Read one greeting (bounded by `read_deadline`), answer, close.
async fn handle_conn<S>(mut stream: S, peer_addr: SocketAddr, read_deadline: Duration)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match timeout(read_deadline, read_greeting(&mut stream)).await {
        Ok(Ok(Some(msg))) => info!("Received: {:?} from {}", msg, peer_addr),
        Ok(Ok(None)) => debug!("{} sent nothing", peer_addr),
        Ok(Err(e)) => {
            warn!("Read error from {}: {}", peer_addr, e);
            return;
        }
        Err(_) => {
            warn!("{} sent nothing within {:?}", peer_addr, read_deadline);
            return;
        }
    }

    if let Err(e) = write_greeting(&mut stream, PEER_GREETING).await {
        debug!("Failed to answer {}: {}", peer_addr, e);
    }
}
