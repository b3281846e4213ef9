//! Gateway aggregator
//!
//! Resolves a gateway's connection set, builds downstream proxies and lists
//! tools concurrently with independent failure domains, merges the catalogs
//! with first-occurrence-wins dedup, and routes calls back to the owning
//! connection. One aggregator is derived from scratch per gateway invocation;
//! no proxies or tool lists are cached across requests.

use crate::directory::{
    Connection, ConnectionDirectory, EntityStatus, Gateway, ToolSelectionMode,
};
use crate::error::{GatewayError, Result};
use crate::gateway::proxy::{DownstreamProxy, ProxyFactory};
use crate::gateway::strategy::{strategy_for_id, ToolRouter, ToolSelectionStrategy};
use crate::mcp::types::{Tool, ToolResult, ToolWithConnection};
use async_trait::async_trait;
use futures_util::future::join_all;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// One connection after inclusion/exclusion semantics have been applied
///
/// `selected_tools` is interpreted against the gateway's mode: a keep-list in
/// inclusion mode, a drop-list in exclusion mode. `None` means no per-tool
/// restriction.
#[derive(Debug, Clone)]
pub struct ResolvedConnection {
    /// The connection record
    pub connection: Connection,
    /// Mode-dependent tool-name set
    pub selected_tools: Option<Vec<String>>,
}

/// Routing entry from a flattened tool name back to its origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRoute {
    /// Owning connection id
    pub connection_id: String,
    /// Tool name as the origin knows it
    pub original_name: String,
}

/// Outcome of a streamable tool call
pub enum StreamableCallOutcome {
    /// Direct passthrough: the downstream HTTP response, relayed raw
    Stream(reqwest::Response),
    /// Strategy-executed (or failed) call: a JSON tool result to wrap
    Result(ToolResult),
}

/// Resolve the connection set for one gateway invocation
///
/// Pure function of the gateway record and the organization's active
/// connections. Inactive connections never appear in `org_connections` and
/// are therefore never eligible in either mode.
pub fn resolve_connection_set(
    gateway: &Gateway,
    org_connections: &[Connection],
) -> Vec<ResolvedConnection> {
    match gateway.tool_selection_mode {
        ToolSelectionMode::Inclusion => gateway
            .connections
            .iter()
            .filter_map(|member| {
                let connection = org_connections
                    .iter()
                    .find(|c| c.id == member.connection_id)?;
                Some(ResolvedConnection {
                    connection: connection.clone(),
                    selected_tools: member.selected_tools.clone(),
                })
            })
            .collect(),
        ToolSelectionMode::Exclusion => org_connections
            .iter()
            .filter_map(|connection| {
                let entry = gateway
                    .connections
                    .iter()
                    .find(|m| m.connection_id == connection.id);
                match entry {
                    // Not listed: include with all tools
                    None => Some(ResolvedConnection {
                        connection: connection.clone(),
                        selected_tools: None,
                    }),
                    Some(member) => match &member.selected_tools {
                        // Listed with no tool set: the whole connection is excluded
                        None => None,
                        Some(names) if names.is_empty() => None,
                        // Listed with names: those names are the excluded set
                        Some(names) => Some(ResolvedConnection {
                            connection: connection.clone(),
                            selected_tools: Some(names.clone()),
                        }),
                    },
                }
            })
            .collect(),
    }
}

/// Apply the mode-specific tool filter for one connection's catalog
fn filter_tools(
    mode: ToolSelectionMode,
    selected_tools: &Option<Vec<String>>,
    tools: Vec<Tool>,
) -> Vec<Tool> {
    match (mode, selected_tools) {
        (_, None) => tools,
        (_, Some(names)) if names.is_empty() => tools,
        (ToolSelectionMode::Inclusion, Some(names)) => tools
            .into_iter()
            .filter(|t| names.iter().any(|n| n == &t.name))
            .collect(),
        (ToolSelectionMode::Exclusion, Some(names)) => tools
            .into_iter()
            .filter(|t| !names.iter().any(|n| n == &t.name))
            .collect(),
    }
}

/// Request-scoped virtual MCP server for one gateway
pub struct GatewayAggregator {
    /// Surviving proxies indexed by connection id
    proxies: HashMap<String, Arc<dyn DownstreamProxy>>,
    /// Deduplicated, annotated tool list (pre-strategy)
    tools: Vec<ToolWithConnection>,
    /// Flattened tool name -> owning connection + original name
    mapping: HashMap<String, ToolRoute>,
    /// Sorted, deduplicated connection titles
    categories: Vec<String>,
    /// Strategy shaping the exposed surface
    strategy: Arc<dyn ToolSelectionStrategy>,
}

impl GatewayAggregator {
    /// Build the aggregator for one gateway invocation
    pub async fn build(
        gateway: &Gateway,
        directory: &dyn ConnectionDirectory,
        factory: &dyn ProxyFactory,
        upstream_timeout: Duration,
    ) -> Result<Self> {
        if gateway.status != EntityStatus::Active {
            return Err(GatewayError::inactive(format!(
                "Gateway '{}' is inactive",
                gateway.id
            )));
        }

        let org_connections = directory
            .list_active_org_connections(&gateway.organization_id)
            .await?;
        let resolved = resolve_connection_set(gateway, &org_connections);
        debug!(
            "Gateway {} resolved {} of {} org connections",
            gateway.id,
            resolved.len(),
            org_connections.len()
        );

        // Build proxies concurrently; each failure domain is one connection.
        let proxy_results = join_all(resolved.iter().map(|rc| async {
            match timeout(upstream_timeout, factory.create_proxy(&rc.connection)).await {
                Ok(Ok(proxy)) => Ok(proxy),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(GatewayError::timeout(format!(
                    "proxy build for connection {}",
                    rc.connection.id
                ))),
            }
        }))
        .await;

        let mut proxies: HashMap<String, Arc<dyn DownstreamProxy>> = HashMap::new();
        let mut surviving: Vec<&ResolvedConnection> = Vec::new();
        for (rc, result) in resolved.iter().zip(proxy_results) {
            match result {
                Ok(proxy) => {
                    proxies.insert(rc.connection.id.clone(), proxy);
                    surviving.push(rc);
                }
                Err(e) => {
                    warn!(
                        "Skipping connection {}: proxy build failed ({}): {}",
                        rc.connection.id,
                        e.category(),
                        e
                    );
                }
            }
        }

        // List tools concurrently across surviving proxies, same fail-soft rule.
        let listing_results = join_all(surviving.iter().map(|rc| {
            let proxy = proxies.get(&rc.connection.id).cloned();
            async move {
                let proxy = proxy.ok_or_else(|| GatewayError::routing("proxy evicted"))?;
                match timeout(upstream_timeout, proxy.list_tools()).await {
                    Ok(result) => result,
                    Err(_) => Err(GatewayError::timeout("tool listing")),
                }
            }
        }))
        .await;

        // Merge in resolution order with first-occurrence-wins dedup. The
        // mapping entry is inserted in the same iteration that pushes the
        // tool, so no consumer can observe a tool without a route.
        let mut tools: Vec<ToolWithConnection> = Vec::new();
        let mut mapping: HashMap<String, ToolRoute> = HashMap::new();
        for (rc, result) in surviving.iter().zip(listing_results) {
            let listed = match result {
                Ok(listed) => listed,
                Err(e) => {
                    warn!(
                        "Skipping connection {}: tool listing failed ({}): {}",
                        rc.connection.id,
                        e.category(),
                        e
                    );
                    continue;
                }
            };

            let filtered = filter_tools(gateway.tool_selection_mode, &rc.selected_tools, listed);
            for tool in filtered {
                // A malformed downstream tool is this connection's problem,
                // not the gateway's; skip it and keep the rest.
                if let Err(e) = tool.validate() {
                    warn!(
                        "Skipping tool '{}' from connection {}: {}",
                        tool.name, rc.connection.id, e
                    );
                    continue;
                }
                if mapping.contains_key(&tool.name) {
                    debug!(
                        "Dropping duplicate tool '{}' from connection {}",
                        tool.name, rc.connection.id
                    );
                    continue;
                }
                mapping.insert(
                    tool.name.clone(),
                    ToolRoute {
                        connection_id: rc.connection.id.clone(),
                        original_name: tool.name.clone(),
                    },
                );
                tools.push(ToolWithConnection::from_tool(
                    tool,
                    &rc.connection.id,
                    rc.connection.display_title(),
                ));
            }
        }

        let mut categories: Vec<String> = surviving
            .iter()
            .map(|rc| rc.connection.display_title().to_string())
            .collect();
        categories.sort();
        categories.dedup();

        Ok(Self {
            proxies,
            tools,
            mapping,
            categories,
            strategy: strategy_for_id(gateway.tool_selection_strategy.as_deref()),
        })
    }

    /// Final tool surface exposed to clients (post-strategy)
    pub fn list_tools(&self) -> Vec<Tool> {
        self.strategy
            .transform_tools(self.tools.clone(), &self.categories)
    }

    /// Deduplicated, annotated tool list before strategy application
    pub fn raw_tools(&self) -> &[ToolWithConnection] {
        &self.tools
    }

    /// Routing table from flattened names back to owning connections
    pub fn mapping(&self) -> &HashMap<String, ToolRoute> {
        &self.mapping
    }

    /// Sorted, deduplicated connection titles
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Call a tool through the strategy surface
    pub async fn call_tool(&self, name: &str, arguments: Value) -> ToolResult {
        self.strategy.call_tool(name, arguments, self).await
    }

    /// Call a tool with a streaming-capable response
    ///
    /// Names present in the raw mapping bypass the strategy and stream the
    /// downstream HTTP response directly; anything else (e.g. a meta-tool
    /// synthesized by the strategy) has no connection to stream from, so it
    /// executes through the strategy and the JSON result is wrapped by the
    /// caller.
    pub async fn call_streamable_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> StreamableCallOutcome {
        if let Some(route) = self.mapping.get(name) {
            let Some(proxy) = self.proxies.get(&route.connection_id) else {
                return StreamableCallOutcome::Result(ToolResult::error(format!(
                    "Connection '{}' for tool '{}' is no longer available",
                    route.connection_id, name
                )));
            };
            match proxy
                .call_tool_streaming(&route.original_name, arguments)
                .await
            {
                Ok(response) => StreamableCallOutcome::Stream(response),
                Err(e) => {
                    warn!("Streaming call for tool '{}' failed: {}", name, e);
                    StreamableCallOutcome::Result(ToolResult::error(format!(
                        "Tool '{}' failed: {}",
                        name, e
                    )))
                }
            }
        } else {
            StreamableCallOutcome::Result(self.call_tool(name, arguments).await)
        }
    }

    /// Route a call directly by the raw mapping, bypassing the strategy
    async fn dispatch(&self, name: &str, arguments: Value) -> ToolResult {
        let Some(route) = self.mapping.get(name) else {
            return ToolResult::error(format!("Tool '{}' is not available on this gateway", name));
        };
        // The proxy may have been evicted after listing; same error shape.
        let Some(proxy) = self.proxies.get(&route.connection_id) else {
            return ToolResult::error(format!(
                "Connection '{}' for tool '{}' is no longer available",
                route.connection_id, name
            ));
        };
        match proxy.call_tool(&route.original_name, arguments).await {
            Ok(result) => ToolResult::from_downstream(result),
            Err(e) => {
                warn!(
                    "Tool call '{}' on connection {} failed: {}",
                    name, route.connection_id, e
                );
                ToolResult::error(format!("Tool '{}' failed: {}", name, e))
            }
        }
    }
}

#[async_trait]
impl ToolRouter for GatewayAggregator {
    async fn route(&self, name: &str, arguments: Value) -> ToolResult {
        self.dispatch(name, arguments).await
    }
}
