//! Outbound side of the direct connection.
//!
//! Walks the discovered peers in the order the server returned them and
//! probes the first one that accepts a TCP connection. A failed connect moves
//! on to the next candidate; the same candidate is never retried. Once a
//! connection is up the sweep stops, whatever happens during the greeting.

use std::future::Future;
use std::io;
use std::time::Duration;

use log::{info, warn};
use syncmesh_common::api::ClientSnapshot;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::client::SignalClient;
use crate::error::ConnectError;
use crate::greeting::{read_greeting, write_greeting, CLIENT_GREETING};
use crate::selector::candidates;

/// Bound on establishing the TCP connection to one candidate.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Bound on the whole greeting exchange once connected.
pub const IO_DEADLINE: Duration = Duration::from_secs(10);

/// What came back over a successful connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exchange {
    /// The peer answered with this (trimmed) line.
    Reply(String),
    /// The peer closed the connection without answering.
    Closed,
    /// Writing or reading failed, or the deadline passed.
    Failed(String),
}

/// Result of probing the first reachable peer.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub peer_id: String,
    pub address: String,
    pub exchange: Exchange,
}

/// Opens the transport to a candidate address.
pub trait Dialer {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    fn dial(&self, address: &str) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Plain TCP dialing.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpDialer;

impl Dialer for TcpDialer {
    type Stream = TcpStream;

    fn dial(&self, address: &str) -> impl Future<Output = io::Result<TcpStream>> + Send {
        TcpStream::connect(address)
    }
}

/// Dials discovered peers and performs the greeting.
#[derive(Debug, Clone)]
pub struct PeerConnector<D = TcpDialer> {
    dialer: D,
    connect_timeout: Duration,
    io_deadline: Duration,
}

impl PeerConnector {
    pub fn new() -> Self {
        Self::with_timeouts(CONNECT_TIMEOUT, IO_DEADLINE)
    }

    pub fn with_timeouts(connect_timeout: Duration, io_deadline: Duration) -> Self {
        Self::with_dialer(TcpDialer, connect_timeout, io_deadline)
    }
}

impl<D: Dialer> PeerConnector<D> {
    pub fn with_dialer(dialer: D, connect_timeout: Duration, io_deadline: Duration) -> Self {
        Self {
            dialer,
            connect_timeout,
            io_deadline,
        }
    }

    /// Probe the first peer in `peers` (other than `self_id`) that accepts a connection.
    pub async fn connect(
        &self,
        peers: &[ClientSnapshot],
        self_id: &str,
    ) -> Result<ProbeOutcome, ConnectError> {
        let mut attempted = 0;

        for (peer_id, address) in candidates(peers, self_id) {
            attempted += 1;
            info!("Attempting connection to {} ({})", peer_id, address);

            let stream = match timeout(self.connect_timeout, self.dialer.dial(&address)).await {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => {
                    warn!("Connect failed to {}: {}", address, e);
                    continue;
                }
                Err(_) => {
                    warn!(
                        "Connect to {} timed out after {:?}",
                        address, self.connect_timeout
                    );
                    continue;
                }
            };

            let exchange = self.greet(stream).await;
            match &exchange {
                Exchange::Reply(msg) => info!("Received: {:?} from {}", msg, address),
                Exchange::Closed => info!("{} closed the connection without replying", address),
                Exchange::Failed(e) => warn!("Greeting with {} failed: {}", address, e),
            }

            return Ok(ProbeOutcome {
                peer_id: peer_id.to_string(),
                address,
                exchange,
            });
        }

        Err(ConnectError::NoPeerReachable { attempted })
    }

    /// Discover peers through the signalling server, then [`connect`](Self::connect).
    pub async fn discover_and_connect(
        &self,
        client: &SignalClient,
        self_id: &str,
    ) -> Result<ProbeOutcome, ConnectError> {
        let peers = client.discover(Some(self_id)).await?;
        info!("Discovered {} peer(s)", peers.len());
        self.connect(&peers, self_id).await
    }

    async fn greet(&self, mut stream: D::Stream) -> Exchange {
        let exchange = async {
            write_greeting(&mut stream, CLIENT_GREETING).await?;
            read_greeting(&mut stream).await
        };
        match timeout(self.io_deadline, exchange).await {
            Ok(Ok(Some(reply))) => Exchange::Reply(reply),
            Ok(Ok(None)) => Exchange::Closed,
            Ok(Err(e)) => Exchange::Failed(e.to_string()),
            Err(_) => Exchange::Failed(format!("no reply within {:?}", self.io_deadline)),
        }
    }
}

impl Default for PeerConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::greeting::PEER_GREETING;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    fn snapshot(id: &str, addr: SocketAddr) -> ClientSnapshot {
        ClientSnapshot {
            client_id: id.to_string(),
            public_ip: "203.0.113.1".to_string(),
            public_port: 9,
            local_ip: addr.ip().to_string(),
            local_port: addr.port(),
        }
    }

    /// Address with nothing listening on it.
    async fn closed_addr() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr
    }

    /// Accepts connections, counts them, answers with the peer greeting.
    async fn greeting_peer() -> (SocketAddr, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = read_greeting(&mut stream).await;
                let _ = stream.write_all(PEER_GREETING.as_bytes()).await;
            }
        });
        (addr, accepted)
    }

    #[tokio::test]
    async fn test_skips_failed_candidate_and_stops_at_first_success() {
        let dead = closed_addr().await;
        let (first, first_count) = greeting_peer().await;
        let (second, second_count) = greeting_peer().await;

        let peers = vec![
            snapshot("dead", dead),
            snapshot("first", first),
            snapshot("second", second),
        ];
        let outcome = PeerConnector::new().connect(&peers, "me").await.unwrap();

        assert_eq!(outcome.peer_id, "first");
        assert_eq!(outcome.address, first.to_string());
        assert_eq!(outcome.exchange, Exchange::Reply("hello from peer".to_string()));
        assert_eq!(first_count.load(Ordering::SeqCst), 1);
        assert_eq!(second_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_excludes_self() {
        let (addr, count) = greeting_peer().await;
        let peers = vec![snapshot("me", addr)];

        let err = PeerConnector::new().connect(&peers, "me").await.unwrap_err();
        assert!(matches!(err, ConnectError::NoPeerReachable { attempted: 0 }));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_peer_reachable() {
        let peers = vec![
            snapshot("a", closed_addr().await),
            ClientSnapshot {
                client_id: "no-address".to_string(),
                ..Default::default()
            },
        ];
        let err = PeerConnector::new().connect(&peers, "me").await.unwrap_err();
        assert!(matches!(err, ConnectError::NoPeerReachable { attempted: 1 }));

        let err = PeerConnector::new().connect(&[], "me").await.unwrap_err();
        assert!(matches!(err, ConnectError::NoPeerReachable { attempted: 0 }));
    }

    #[tokio::test]
    async fn test_silent_peer_hits_deadline_but_counts_as_connected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });
        let (other, other_count) = greeting_peer().await;

        let peers = vec![snapshot("silent", addr), snapshot("other", other)];
        let connector = PeerConnector::with_timeouts(CONNECT_TIMEOUT, Duration::from_millis(200));
        let outcome = connector.connect(&peers, "me").await.unwrap();

        assert_eq!(outcome.peer_id, "silent");
        assert!(matches!(outcome.exchange, Exchange::Failed(_)));
        assert_eq!(other_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_peer_closing_without_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let _ = read_greeting(&mut stream).await;
                drop(stream);
            }
        });

        let outcome = PeerConnector::new()
            .connect(&[snapshot("quiet", addr)], "me")
            .await
            .unwrap();
        assert_eq!(outcome.exchange, Exchange::Closed);
    }

    /// Never completes dials to `stalled`; anything else gets an in-memory
    /// peer that answers the greeting.
    struct StallingDialer {
        stalled: String,
    }

    impl Dialer for StallingDialer {
        type Stream = tokio::io::DuplexStream;

        fn dial(
            &self,
            address: &str,
        ) -> impl Future<Output = io::Result<tokio::io::DuplexStream>> + Send {
            let stall = address == self.stalled;
            async move {
                if stall {
                    std::future::pending::<()>().await;
                }
                let (near, mut far) = tokio::io::duplex(256);
                tokio::spawn(async move {
                    let _ = read_greeting(&mut far).await;
                    let _ = write_greeting(&mut far, PEER_GREETING).await;
                });
                Ok(near)
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout_moves_to_next_candidate() {
        let stalled: SocketAddr = "10.0.0.1:4000".parse().unwrap();
        let reachable: SocketAddr = "10.0.0.2:4000".parse().unwrap();
        let dialer = StallingDialer {
            stalled: stalled.to_string(),
        };
        let connect_timeout = Duration::from_millis(300);
        let connector = PeerConnector::with_dialer(dialer, connect_timeout, IO_DEADLINE);

        let peers = vec![snapshot("stalled", stalled), snapshot("reachable", reachable)];
        let started = tokio::time::Instant::now();
        let outcome = connector.connect(&peers, "me").await.unwrap();

        assert!(started.elapsed() >= connect_timeout);
        assert_eq!(outcome.peer_id, "reachable");
        assert_eq!(outcome.address, "10.0.0.2:4000");
        assert_eq!(outcome.exchange, Exchange::Reply("hello from peer".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_dial_timing_out_is_unreachable() {
        let stalled: SocketAddr = "10.0.0.1:4000".parse().unwrap();
        let dialer = StallingDialer {
            stalled: stalled.to_string(),
        };
        let connector =
            PeerConnector::with_dialer(dialer, Duration::from_millis(300), IO_DEADLINE);

        let err = connector
            .connect(&[snapshot("stalled", stalled)], "me")
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectError::NoPeerReachable { attempted: 1 }));
    }
}
