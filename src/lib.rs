//! MeshGate - one MCP endpoint multiplexing a mesh of downstream MCP servers
//!
//! This crate implements a Model Context Protocol (MCP) mesh gateway: clients
//! see a single MCP server while the gateway fans out to N downstream MCP
//! servers ("connections"), aggregates and deduplicates their tool catalogs,
//! and routes each tool call back to its origin. An OAuth discovery proxy in
//! front of the gateway rewrites RFC 9728 / RFC 8414 metadata so clients only
//! ever talk to the gateway during the OAuth dance.

pub mod config;
pub mod directory;
pub mod error;
pub mod gateway;
pub mod mcp;
pub mod oauth;
pub mod web;

pub use config::{Config, McpClientConfig, ServerConfig};
pub use error::{GatewayError, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "meshgate.yaml";

/// Default server host
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port
pub const DEFAULT_PORT: u16 = 3001;
