//! Endpoint side of syncmesh.
//!
//! An endpoint registers with the signalling server, keeps its entry alive,
//! listens for direct peer connections and dials the first reachable peer
//! it discovers.

pub mod client;
pub mod connector;
pub mod endpoint;
pub mod error;
pub mod greeting;
pub mod heartbeat;
pub mod listener;
pub mod selector;

pub use client::SignalClient;
pub use connector::{Dialer, Exchange, PeerConnector, ProbeOutcome, TcpDialer};
pub use endpoint::{run_endpoint, Endpoint};
pub use error::{ClientError, ClientResult, ConnectError};
pub use heartbeat::{heartbeat_loop, HeartbeatSink};
pub use listener::PeerListener;
pub use selector::pick_peer_address;
