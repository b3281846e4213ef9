//! MCP protocol layer
//!
//! Protocol types shared across the gateway and the downstream HTTP client
//! used to talk to connection origins.

pub mod client;
pub mod types;

pub use client::McpProxyClient;
pub use types::{
    McpError, McpRequest, McpResponse, Tool, ToolContent, ToolResult, ToolWithConnection,
};
