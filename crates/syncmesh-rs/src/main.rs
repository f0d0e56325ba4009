//! syncmesh
//!
//! Rendezvous server and peer endpoint: endpoints register with the server,
//! discover each other and exchange a greeting over a direct TCP connection.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use syncmesh_common::config::{
    load_peer_config, load_server_config, PeerConfig, PeerConfigBuilder, ServerConfig,
    ServerConfigBuilder, DEFAULT_SERVER_URL,
};
use syncmesh_peer::{run_endpoint, SignalClient};
use syncmesh_signal::run_signal_server;

#[derive(Parser)]
#[command(name = "syncmesh")]
#[command(version)]
#[command(about = "Rendezvous server and peer endpoint for direct TCP connections")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the signalling server
    Server {
        /// Path to config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Load config from default location (~/.config/syncmesh/server.toml)
        #[arg(long)]
        default_config: bool,

        /// Address to listen on (default: 0.0.0.0:8089)
        #[arg(long)]
        bind: Option<String>,

        /// Seconds without a heartbeat before a client is dropped (default: 300)
        #[arg(long)]
        ttl_secs: Option<u64>,
    },
    /// Run a peer endpoint (register, listen, dial the first reachable peer)
    Peer {
        /// Path to config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Load config from default location (~/.config/syncmesh/peer.toml)
        #[arg(long)]
        default_config: bool,

        /// Signalling server base URL (default: http://localhost:8089)
        #[arg(long)]
        server: Option<String>,

        /// Local TCP listen port (default: 4000)
        #[arg(long)]
        listen: Option<u16>,

        /// Local IP to advertise instead of the auto-detected one
        #[arg(long)]
        local_ip: Option<String>,

        /// Heartbeat interval in seconds (default: 30)
        #[arg(long)]
        heartbeat_secs: Option<u64>,
    },
    /// Check that a signalling server is up
    Ping {
        /// Signalling server base URL
        #[arg(long, default_value = DEFAULT_SERVER_URL)]
        server: String,
    },
}

/// Load server config based on flags.
fn resolve_server_config(
    config: Option<PathBuf>,
    default_config: bool,
) -> Result<Option<ServerConfig>> {
    if config.is_some() && default_config {
        anyhow::bail!("Cannot use both -c/--config and --default-config");
    }

    if let Some(path) = config {
        Ok(Some(load_server_config(Some(&path))?))
    } else if default_config {
        Ok(Some(load_server_config(None)?))
    } else {
        Ok(None)
    }
}

/// Load peer config based on flags.
fn resolve_peer_config(
    config: Option<PathBuf>,
    default_config: bool,
) -> Result<Option<PeerConfig>> {
    if config.is_some() && default_config {
        anyhow::bail!("Cannot use both -c/--config and --default-config");
    }

    if let Some(path) = config {
        Ok(Some(load_peer_config(Some(&path))?))
    } else if default_config {
        Ok(Some(load_peer_config(None)?))
    } else {
        Ok(None)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    match args.command {
        Command::Server {
            config,
            default_config,
            bind,
            ttl_secs,
        } => {
            let file_cfg = resolve_server_config(config, default_config)?;
            let resolved = ServerConfigBuilder::new()
                .apply_defaults()
                .apply_config(file_cfg.as_ref())
                .apply_cli(bind, ttl_secs)
                .build()?;

            log::info!("Client TTL: {:?}", resolved.client_ttl);
            run_signal_server(resolved.bind, resolved.client_ttl).await
        }
        Command::Peer {
            config,
            default_config,
            server,
            listen,
            local_ip,
            heartbeat_secs,
        } => {
            let file_cfg = resolve_peer_config(config, default_config)?;
            let resolved = PeerConfigBuilder::new()
                .apply_defaults()
                .apply_config(file_cfg.as_ref())
                .apply_cli(server, listen, local_ip, heartbeat_secs)
                .build()?;

            log::info!("Signalling server: {}", resolved.server_url);
            run_endpoint(resolved).await
        }
        Command::Ping { server } => {
            let client = SignalClient::new(&server)?;
            let pong = client
                .ping()
                .await
                .with_context(|| {
                    format!("Signalling server at {} is not reachable", client.base_url())
                })?;
            println!("{} ({})", pong.status, pong.system_info.server_timestamp);
            Ok(())
        }
    }
}
