//! Configuration file support for syncmesh.
//!
//! Two TOML files, one per role:
//! - `server.toml`: signalling server (`bind`, `client_ttl_secs`)
//! - `peer.toml`: endpoint (`server_url`, `listen_port`, `local_ip`, `heartbeat_secs`)
//!
//! Values are layered with builders: defaults < config file < CLI flags.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default signalling server bind address.
pub const DEFAULT_BIND: &str = "0.0.0.0:8089";

/// Default time a registration stays live without a heartbeat (5 minutes).
pub const DEFAULT_CLIENT_TTL_SECS: u64 = 300;

/// Default signalling server URL used by endpoints.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8089";

/// Default TCP port endpoints accept peer connections on.
pub const DEFAULT_LISTEN_PORT: u16 = 4000;

/// Default interval between heartbeats.
pub const DEFAULT_HEARTBEAT_SECS: u64 = 30;

// ============================================================================
// Configuration Structures
// ============================================================================

/// Signalling server configuration (`server.toml`).
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind the HTTP API on (host:port)
    pub bind: Option<String>,
    /// Seconds a client stays registered without a heartbeat
    pub client_ttl_secs: Option<u64>,
}

/// Endpoint configuration (`peer.toml`).
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct PeerConfig {
    /// Signalling server base URL (http:// or https://)
    pub server_url: Option<String>,
    /// TCP port to accept peer connections on
    pub listen_port: Option<u16>,
    /// Local IP to advertise. Auto-detected when absent.
    pub local_ip: Option<String>,
    /// Seconds between heartbeats
    pub heartbeat_secs: Option<u64>,
}

// ============================================================================
// Validation Helpers
// ============================================================================

fn validate_server_url(value: &str) -> Result<()> {
    let url = url::Url::parse(value).with_context(|| {
        format!(
            "Invalid server URL '{}'. Expected format: http://host:port",
            value
        )
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        anyhow::bail!(
            "Invalid server URL scheme '{}'. Must be 'http' or 'https'",
            url.scheme()
        );
    }
    if url.host_str().is_none() {
        anyhow::bail!("Server URL '{}' missing host", value);
    }
    Ok(())
}

fn parse_bind(value: &str) -> Result<SocketAddr> {
    value.parse::<SocketAddr>().with_context(|| {
        format!(
            "Invalid bind address '{}'. Expected format: 0.0.0.0:8089",
            value
        )
    })
}

// ============================================================================
// Path Expansion
// ============================================================================

/// Expand tilde (~) in paths to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    if let Some(stripped) = path_str.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    } else if path_str == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    path.to_path_buf()
}

// ============================================================================
// Config Loading
// ============================================================================

fn load_config<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

fn default_config_path(file_name: &str) -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("syncmesh").join(file_name))
}

fn resolve_config_path(path: Option<&Path>, file_name: &str) -> Result<PathBuf> {
    match path {
        Some(p) => Ok(expand_tilde(p)),
        None => default_config_path(file_name).ok_or_else(|| {
            anyhow::anyhow!("Could not find default config path. Use -c to specify a config file.")
        }),
    }
}

/// Load server configuration from an explicit path, or from
/// `~/.config/syncmesh/server.toml` when `path` is None.
pub fn load_server_config(path: Option<&Path>) -> Result<ServerConfig> {
    load_config(&resolve_config_path(path, "server.toml")?)
}

/// Load peer configuration from an explicit path, or from
/// `~/.config/syncmesh/peer.toml` when `path` is None.
pub fn load_peer_config(path: Option<&Path>) -> Result<PeerConfig> {
    load_config(&resolve_config_path(path, "peer.toml")?)
}

// ============================================================================
// Resolved Configuration Builders
// ============================================================================

/// Resolved server configuration (all values finalized).
#[derive(Debug, Clone)]
pub struct ResolvedServerConfig {
    pub bind: SocketAddr,
    pub client_ttl: Duration,
}

/// Builder for server configuration with layered overrides.
///
/// ```ignore
/// let config = ServerConfigBuilder::new()
///     .apply_defaults()
///     .apply_config(toml_config.as_ref())
///     .apply_cli(bind, ttl_secs)
///     .build()?;
/// ```
#[derive(Default)]
pub struct ServerConfigBuilder {
    bind: Option<String>,
    client_ttl_secs: Option<u64>,
}

impl ServerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply default values (lowest priority).
    pub fn apply_defaults(mut self) -> Self {
        self.bind = Some(DEFAULT_BIND.to_string());
        self.client_ttl_secs = Some(DEFAULT_CLIENT_TTL_SECS);
        self
    }

    /// Apply values from TOML config (middle priority).
    pub fn apply_config(mut self, config: Option<&ServerConfig>) -> Self {
        if let Some(cfg) = config {
            if cfg.bind.is_some() {
                self.bind = cfg.bind.clone();
            }
            if cfg.client_ttl_secs.is_some() {
                self.client_ttl_secs = cfg.client_ttl_secs;
            }
        }
        self
    }

    /// Apply CLI arguments (highest priority). Only `Some` values override.
    pub fn apply_cli(mut self, bind: Option<String>, client_ttl_secs: Option<u64>) -> Self {
        if bind.is_some() {
            self.bind = bind;
        }
        if client_ttl_secs.is_some() {
            self.client_ttl_secs = client_ttl_secs;
        }
        self
    }

    pub fn build(self) -> Result<ResolvedServerConfig> {
        let bind = parse_bind(self.bind.as_deref().unwrap_or(DEFAULT_BIND))?;
        let ttl_secs = self.client_ttl_secs.unwrap_or(DEFAULT_CLIENT_TTL_SECS);
        if ttl_secs == 0 {
            anyhow::bail!("client_ttl_secs must be greater than zero");
        }
        Ok(ResolvedServerConfig {
            bind,
            client_ttl: Duration::from_secs(ttl_secs),
        })
    }
}

/// Resolved peer configuration (all values finalized).
#[derive(Debug, Clone)]
pub struct ResolvedPeerConfig {
    pub server_url: String,
    pub listen_port: u16,
    pub local_ip: Option<IpAddr>,
    pub heartbeat_interval: Duration,
}

/// Builder for peer configuration with layered overrides.
#[derive(Default)]
pub struct PeerConfigBuilder {
    server_url: Option<String>,
    listen_port: Option<u16>,
    local_ip: Option<String>,
    heartbeat_secs: Option<u64>,
}

impl PeerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply default values (lowest priority).
    pub fn apply_defaults(mut self) -> Self {
        self.server_url = Some(DEFAULT_SERVER_URL.to_string());
        self.listen_port = Some(DEFAULT_LISTEN_PORT);
        self.heartbeat_secs = Some(DEFAULT_HEARTBEAT_SECS);
        self
    }

    /// Apply values from TOML config (middle priority).
    pub fn apply_config(mut self, config: Option<&PeerConfig>) -> Self {
        if let Some(cfg) = config {
            if cfg.server_url.is_some() {
                self.server_url = cfg.server_url.clone();
            }
            if cfg.listen_port.is_some() {
                self.listen_port = cfg.listen_port;
            }
            if cfg.local_ip.is_some() {
                self.local_ip = cfg.local_ip.clone();
            }
            if cfg.heartbeat_secs.is_some() {
                self.heartbeat_secs = cfg.heartbeat_secs;
            }
        }
        self
    }

    /// Apply CLI arguments (highest priority). Only `Some` values override.
    pub fn apply_cli(
        mut self,
        server_url: Option<String>,
        listen_port: Option<u16>,
        local_ip: Option<String>,
        heartbeat_secs: Option<u64>,
    ) -> Self {
        if server_url.is_some() {
            self.server_url = server_url;
        }
        if listen_port.is_some() {
            self.listen_port = listen_port;
        }
        if local_ip.is_some() {
            self.local_ip = local_ip;
        }
        if heartbeat_secs.is_some() {
            self.heartbeat_secs = heartbeat_secs;
        }
        self
    }

    pub fn build(self) -> Result<ResolvedPeerConfig> {
        let server_url = self
            .server_url
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
        validate_server_url(&server_url)?;

        let listen_port = self.listen_port.unwrap_or(DEFAULT_LISTEN_PORT);
        if listen_port == 0 {
            anyhow::bail!(
                "listen_port must be non-zero: peers cannot dial an advertised port 0"
            );
        }

        let local_ip = self
            .local_ip
            .map(|ip| {
                ip.parse::<IpAddr>()
                    .with_context(|| format!("Invalid local_ip '{}'", ip))
            })
            .transpose()?;

        let heartbeat_secs = self.heartbeat_secs.unwrap_or(DEFAULT_HEARTBEAT_SECS);
        if heartbeat_secs == 0 {
            anyhow::bail!("heartbeat_secs must be greater than zero");
        }

        Ok(ResolvedPeerConfig {
            server_url: server_url.trim_end_matches('/').to_string(),
            listen_port,
            local_ip,
            heartbeat_interval: Duration::from_secs(heartbeat_secs),
        })
    }
}
