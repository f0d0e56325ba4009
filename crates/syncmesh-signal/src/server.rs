//! Signalling server run loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::info;
use tokio::net::TcpListener;

use crate::api::build_router;
use crate::registry::Registry;

/// Signalling server: one registry behind the HTTP API.
pub struct SignalServer {
    registry: Arc<Registry>,
}

impl SignalServer {
    pub fn new(client_ttl: Duration) -> Self {
        Self {
            registry: Arc::new(Registry::with_ttl(client_ttl)),
        }
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Bind `bind_addr` and serve until the process exits.
    pub async fn run(&self, bind_addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(bind_addr)
            .await
            .with_context(|| format!("Failed to bind signalling server to {}", bind_addr))?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        info!(
            "Signalling server listening on {} (client TTL {}s)",
            local_addr,
            self.registry.ttl().as_secs()
        );

        let app = build_router(self.registry.clone());
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .context("Signalling server stopped")
    }
}

impl Default for SignalServer {
    fn default() -> Self {
        Self {
            registry: Arc::new(Registry::new()),
        }
    }
}

/// Run the signalling server (convenience function).
pub async fn run_signal_server(bind_addr: SocketAddr, client_ttl: Duration) -> Result<()> {
    SignalServer::new(client_ttl).run(bind_addr).await
}
