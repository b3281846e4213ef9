//! Configuration structures and loading for the mesh gateway

use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Public origin of this gateway (scheme + host + optional port), used
    /// when rewriting OAuth metadata URLs so clients only ever see us
    pub public_origin: String,
    /// Connection directory configuration
    pub directory: DirectoryConfig,
    /// MCP client configuration
    #[serde(default)]
    pub mcp_client: McpClientConfig,
    /// Logging configuration
    pub logging: Option<LoggingConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: crate::DEFAULT_HOST.to_string(),
            port: crate::DEFAULT_PORT,
        }
    }
}

/// Connection directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Path to the YAML file describing connections and gateways
    pub file: String,
}

/// MCP client configuration for downstream connections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpClientConfig {
    /// Per-connection timeout for proxy build and tool listing fan-outs, in
    /// seconds; a timed-out connection is dropped from the request, never
    /// failing the whole aggregation
    pub upstream_timeout_secs: u64,
    /// Timeout for OAuth discovery fetches against origin well-known
    /// endpoints, in seconds
    pub discovery_timeout_secs: u64,
    /// MCP protocol version advertised to downstream servers
    pub protocol_version: String,
    /// Client name sent in the initialize handshake
    pub client_name: String,
}

impl Default for McpClientConfig {
    fn default() -> Self {
        Self {
            upstream_timeout_secs: 30,
            discovery_timeout_secs: 10,
            protocol_version: "2025-06-18".to_string(),
            client_name: env!("CARGO_PKG_NAME").to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "meshgate=debug")
    pub level: String,
    /// Emit JSON-formatted logs
    #[serde(default)]
    pub json: bool,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            GatewayError::config(format!("Failed to parse config file {}: {}", path.display(), e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            return Err(GatewayError::config("Server host cannot be empty"));
        }
        if self.server.port == 0 {
            return Err(GatewayError::config("Server port cannot be 0"));
        }

        let origin = Url::parse(&self.public_origin).map_err(|e| {
            GatewayError::config(format!("Invalid public_origin '{}': {}", self.public_origin, e))
        })?;
        if origin.path() != "/" && !origin.path().is_empty() {
            return Err(GatewayError::config(
                "public_origin must not contain a path component",
            ));
        }

        if self.directory.file.is_empty() {
            return Err(GatewayError::config("Directory file path cannot be empty"));
        }

        self.mcp_client.validate()
    }

    /// Public origin with any trailing slash removed
    pub fn public_origin_trimmed(&self) -> String {
        self.public_origin.trim_end_matches('/').to_string()
    }
}

impl McpClientConfig {
    /// Validate MCP client settings
    pub fn validate(&self) -> Result<()> {
        if self.upstream_timeout_secs == 0 {
            return Err(GatewayError::config("upstream_timeout_secs cannot be 0"));
        }
        if self.discovery_timeout_secs == 0 {
            return Err(GatewayError::config("discovery_timeout_secs cannot be 0"));
        }
        if self.protocol_version.is_empty() {
            return Err(GatewayError::config("protocol_version cannot be empty"));
        }
        Ok(())
    }
}
