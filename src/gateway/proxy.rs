//! Downstream proxy seam
//!
//! The aggregator only sees `DownstreamProxy` handles built by a
//! `ProxyFactory`; the HTTP implementation wraps `McpProxyClient`. One proxy
//! is built per connection per gateway invocation and released by drop on
//! every exit path. Implementations must keep that release quiet: failures
//! during teardown are logged, never surfaced.

use crate::config::McpClientConfig;
use crate::directory::Connection;
use crate::error::{GatewayError, Result};
use crate::mcp::client::McpProxyClient;
use crate::mcp::types::Tool;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Request-scoped handle for one downstream connection
#[async_trait]
pub trait DownstreamProxy: Send + Sync {
    /// Id of the connection this proxy serves
    fn connection_id(&self) -> &str;

    /// List the tools the downstream server exposes
    async fn list_tools(&self) -> Result<Vec<Tool>>;

    /// Call a tool, returning the raw downstream result document
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value>;

    /// Call a tool and return the raw HTTP response for streaming relay
    async fn call_tool_streaming(&self, name: &str, arguments: Value)
        -> Result<reqwest::Response>;
}

/// Builds an authenticated proxy for a connection
#[async_trait]
pub trait ProxyFactory: Send + Sync {
    /// Create a proxy for the given connection
    ///
    /// A failure here removes only this connection from the working set; the
    /// aggregation carries on with the others.
    async fn create_proxy(&self, connection: &Connection) -> Result<Arc<dyn DownstreamProxy>>;
}

#[async_trait]
impl DownstreamProxy for McpProxyClient {
    fn connection_id(&self) -> &str {
        McpProxyClient::connection_id(self)
    }

    async fn list_tools(&self) -> Result<Vec<Tool>> {
        McpProxyClient::list_tools(self).await
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value> {
        McpProxyClient::call_tool(self, name, arguments).await
    }

    async fn call_tool_streaming(&self, name: &str, arguments: Value) -> Result<reqwest::Response> {
        McpProxyClient::call_tool_streaming(self, name, arguments).await
    }
}

/// Factory producing `McpProxyClient` handles over a shared reqwest client
#[derive(Debug, Clone)]
pub struct HttpProxyFactory {
    http_client: Client,
    config: McpClientConfig,
}

impl HttpProxyFactory {
    /// Create a factory from MCP client configuration
    pub fn new(config: McpClientConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.upstream_timeout_secs))
            .user_agent(format!("{}/{}", env!("CARGO_PKG_NAME"), crate::VERSION))
            .build()
            .map_err(|e| GatewayError::connection(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http_client, config })
    }
}

#[async_trait]
impl ProxyFactory for HttpProxyFactory {
    async fn create_proxy(&self, connection: &Connection) -> Result<Arc<dyn DownstreamProxy>> {
        let client = McpProxyClient::new(
            connection,
            self.http_client.clone(),
            self.config.protocol_version.clone(),
            self.config.client_name.clone(),
        )?;

        // The handshake is part of proxy construction: a connection that
        // rejects initialize is dropped from the working set here.
        client.initialize().await?;

        Ok(Arc::new(client))
    }
}
