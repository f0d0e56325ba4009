//! Registry of live clients.
//!
//! Every operation prunes expired records first, under the same lock as the
//! operation itself, so no expired record is ever observable from outside.
//! Pruning walks the whole map on each call; this is meant for small to
//! moderate numbers of clients.

use std::collections::HashMap;
use std::time::Duration;

use log::{debug, info};
use rand::Rng;
use syncmesh_common::config::DEFAULT_CLIENT_TTL_SECS;
use syncmesh_common::HostPort;
use tokio::sync::Mutex;

use crate::clock::Instant;

/// Default time a record stays live without a heartbeat.
pub const DEFAULT_CLIENT_TTL: Duration = Duration::from_secs(DEFAULT_CLIENT_TTL_SECS);

/// Stored state for one registered endpoint.
#[derive(Debug, Clone)]
pub struct ClientRecord {
    /// Address the registration request came from
    pub public_address: HostPort,
    /// Self-reported address on the endpoint's own network
    pub local_address: Option<HostPort>,
    pub last_seen: Instant,
}

/// Client registry with lazy TTL expiry.
pub struct Registry {
    ttl: Duration,
    clients: Mutex<HashMap<String, ClientRecord>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_CLIENT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Register a new client and return its freshly generated id.
    pub async fn register(&self, public: HostPort, local: Option<HostPort>) -> String {
        let mut clients = self.clients.lock().await;
        let now = Instant::now();
        prune_expired(&mut clients, self.ttl, now);

        let id = generate_client_id();
        info!(
            "Client registered: {} (public {}, local {})",
            id,
            public,
            local
                .as_ref()
                .map(|hp| hp.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
        clients.insert(
            id.clone(),
            ClientRecord {
                public_address: public,
                local_address: local,
                last_seen: now,
            },
        );
        id
    }

    /// Remove a client. Unknown ids are ignored.
    pub async fn unregister(&self, id: &str) {
        let mut clients = self.clients.lock().await;
        prune_expired(&mut clients, self.ttl, Instant::now());
        if clients.remove(id).is_some() {
            info!("Client unregistered: {}", id);
        }
    }

    /// Refresh a client's liveness. Returns false if the id is unknown or expired.
    pub async fn touch(&self, id: &str) -> bool {
        let mut clients = self.clients.lock().await;
        let now = Instant::now();
        prune_expired(&mut clients, self.ttl, now);
        match clients.get_mut(id) {
            Some(record) => {
                record.last_seen = now;
                true
            }
            None => false,
        }
    }

    /// Snapshot of all live clients, in no particular order.
    pub async fn list(&self) -> Vec<(String, ClientRecord)> {
        let mut clients = self.clients.lock().await;
        prune_expired(&mut clients, self.ttl, Instant::now());
        clients
            .iter()
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

fn prune_expired(clients: &mut HashMap<String, ClientRecord>, ttl: Duration, now: Instant) {
    if clients.is_empty() {
        return;
    }
    clients.retain(|id, record| {
        let live = now.duration_since(record.last_seen) < ttl;
        if !live {
            debug!("Client {} expired", id);
        }
        live
    });
}

/// 128 random bits, hex-encoded.
fn generate_client_id() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    hex::encode(bytes)
}
