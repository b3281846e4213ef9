//! Connection directory
//!
//! Records describing downstream MCP servers ("connections") and their
//! aggregations ("gateways"), plus the `ConnectionDirectory` seam the
//! aggregator resolves them through. Production deployments back this trait
//! with their own storage; the crate ships a YAML-file-backed implementation
//! so the binary and tests run without a database.

mod static_directory;

pub use static_directory::StaticDirectory;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Status of a connection or gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    /// Eligible for aggregation
    Active,
    /// Exists but disabled; never aggregated
    Inactive,
}

impl Default for EntityStatus {
    fn default() -> Self {
        Self::Active
    }
}

/// Authentication material for a downstream connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConnectionAuth {
    /// No authentication
    None,
    /// Bearer token authentication
    Bearer { token: String },
    /// API Key authentication (header-based)
    ApiKey { header: String, key: String },
    /// Basic authentication
    Basic { username: String, password: String },
}

impl Default for ConnectionAuth {
    fn default() -> Self {
        Self::None
    }
}

/// One downstream MCP server the mesh can talk to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    /// Unique connection id
    pub id: String,
    /// Owning organization
    pub organization_id: String,
    /// Base URL of the downstream MCP endpoint
    pub url: String,
    /// Optional display title; falls back to the id where a label is needed
    #[serde(default)]
    pub title: Option<String>,
    /// Authentication material forwarded on downstream calls
    #[serde(default)]
    pub auth: ConnectionAuth,
    /// Active/inactive status
    #[serde(default)]
    pub status: EntityStatus,
}

impl Connection {
    /// Display title, falling back to the connection id
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }
}

/// Tool selection semantics applied per connection within a gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolSelectionMode {
    /// Allow-list: only the gateway's listed connections are visible, and
    /// `selected_tools` restricts each one's visible tool names
    Inclusion,
    /// Deny-list: all active org connections are visible unless listed;
    /// listed entries either drop the whole connection or name the excluded
    /// tools
    Exclusion,
}

impl Default for ToolSelectionMode {
    fn default() -> Self {
        Self::Inclusion
    }
}

/// A gateway's reference to one member connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConnection {
    /// Referenced connection id
    pub connection_id: String,
    /// Tool-name set interpreted per the gateway's selection mode:
    /// inclusion - keep only these (`None`/empty keeps all);
    /// exclusion - `None`/empty drops the whole connection, otherwise these
    /// names are excluded
    #[serde(default)]
    pub selected_tools: Option<Vec<String>>,
}

/// A named aggregation of connections exposed as one MCP server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gateway {
    /// Unique gateway id
    pub id: String,
    /// Owning organization
    pub organization_id: String,
    /// Active/inactive status
    #[serde(default)]
    pub status: EntityStatus,
    /// Selection semantics for member connections
    #[serde(default)]
    pub tool_selection_mode: ToolSelectionMode,
    /// Strategy id; unknown or absent ids resolve to passthrough
    #[serde(default)]
    pub tool_selection_strategy: Option<String>,
    /// Member connection entries
    #[serde(default)]
    pub connections: Vec<GatewayConnection>,
    /// Whether this gateway is the org default (resolved from org headers
    /// when no gateway id is present in the request path)
    #[serde(default)]
    pub default: bool,
}

/// Directory seam the aggregator and OAuth proxy resolve records through
#[async_trait]
pub trait ConnectionDirectory: Send + Sync {
    /// Look up a gateway by id
    async fn find_gateway_by_id(&self, id: &str) -> Result<Gateway>;

    /// Resolve an organization's default gateway from request header values
    ///
    /// Takes the `x-org-id` / `x-org-slug` header values explicitly; there is
    /// no ambient request context.
    async fn find_default_gateway(
        &self,
        org_id: Option<&str>,
        org_slug: Option<&str>,
    ) -> Result<Gateway>;

    /// List all active connections belonging to an organization
    async fn list_active_org_connections(&self, organization_id: &str) -> Result<Vec<Connection>>;

    /// Look up a connection by id
    async fn find_connection_by_id(&self, id: &str) -> Result<Connection>;
}
