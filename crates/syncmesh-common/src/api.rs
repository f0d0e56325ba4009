//! JSON payloads exchanged with the signalling server.
//!
//! Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

use crate::net::HostPort;

/// `status` value of every successful call except ping.
pub const STATUS_SUCCESS: &str = "success";

/// `status` value returned by ping.
pub const STATUS_AVAILABLE: &str = "available";

/// Body of `POST /register`.
///
/// Both fields are optional; unknown fields are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterRequest {
    #[serde(default)]
    pub local_ip: String,
    #[serde(default)]
    pub local_port: u16,
}

impl RegisterRequest {
    pub fn new(local: Option<&HostPort>) -> Self {
        match local {
            Some(hp) => Self {
                local_ip: hp.host.clone(),
                local_port: hp.port,
            },
            None => Self::default(),
        }
    }

    /// The self-reported local address, or `None` when nothing was supplied.
    pub fn local_address(&self) -> Option<HostPort> {
        let hp = HostPort::new(self.local_ip.clone(), self.local_port);
        if hp.is_blank() {
            None
        } else {
            Some(hp)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub status: String,
    #[serde(default)]
    pub client_id: String,
}

/// A peer's contact information as returned by discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSnapshot {
    pub client_id: String,
    #[serde(default)]
    pub public_ip: String,
    #[serde(default)]
    pub public_port: u16,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub local_ip: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub local_port: u16,
}

impl ClientSnapshot {
    pub fn public_address(&self) -> HostPort {
        HostPort::new(self.public_ip.clone(), self.public_port)
    }

    pub fn local_address(&self) -> HostPort {
        HostPort::new(self.local_ip.clone(), self.local_port)
    }
}

fn is_zero(port: &u16) -> bool {
    *port == 0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverResponse {
    pub status: String,
    #[serde(default)]
    pub clients: Vec<ClientSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    /// RFC 3339 timestamp taken when the ping was served.
    pub server_timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingResponse {
    pub status: String,
    pub system_info: SystemInfo,
}

/// Body of heartbeat and unregister responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn success() -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
        }
    }
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
