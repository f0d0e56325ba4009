//! Shared pieces of syncmesh used by both the signalling server and endpoints.
//!
//! - `api`: JSON payloads of the signalling HTTP API
//! - `net`: host/port pairs and local address detection
//! - `config`: TOML configuration and layered builders

pub mod api;
pub mod config;
pub mod net;

pub use net::HostPort;
