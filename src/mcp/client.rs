//! Downstream MCP-over-HTTP client
//!
//! One `McpProxyClient` is built per connection per gateway invocation and
//! discarded at request end; nothing is pooled or cached across requests.
//! The underlying reqwest client is shared, so dropping a proxy is a quiet,
//! infallible release.

use crate::directory::{Connection, ConnectionAuth};
use crate::error::{GatewayError, Result};
use crate::mcp::types::{McpRequest, McpResponse, Tool};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

/// HTTP client handle bound to one downstream connection
#[derive(Debug, Clone)]
pub struct McpProxyClient {
    /// Id of the connection this proxy serves
    connection_id: String,
    /// Parsed downstream endpoint
    endpoint: Url,
    /// Authentication material applied to every request
    auth: ConnectionAuth,
    /// Shared HTTP client
    http_client: Client,
    /// Protocol version advertised in the initialize handshake
    protocol_version: String,
    /// Client name advertised in the initialize handshake
    client_name: String,
}

impl McpProxyClient {
    /// Create a proxy for one connection
    pub fn new(
        connection: &Connection,
        http_client: Client,
        protocol_version: String,
        client_name: String,
    ) -> Result<Self> {
        let endpoint = Url::parse(&connection.url).map_err(|e| {
            GatewayError::validation(format!(
                "Invalid connection URL '{}': {}",
                connection.url, e
            ))
        })?;

        Ok(Self {
            connection_id: connection.id.clone(),
            endpoint,
            auth: connection.auth.clone(),
            http_client,
            protocol_version,
            client_name,
        })
    }

    /// Id of the connection this proxy serves
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Perform the MCP initialize handshake
    pub async fn initialize(&self) -> Result<Value> {
        let request = McpRequest::new(
            "initialize",
            Some(json!({
                "protocolVersion": self.protocol_version,
                "capabilities": {},
                "clientInfo": {
                    "name": self.client_name,
                    "version": crate::VERSION,
                }
            })),
        );

        let response = self.send_request(&request).await?;
        response
            .result
            .ok_or_else(|| match response.error {
                Some(error) => GatewayError::mcp(format!(
                    "initialize failed for connection {}: {}",
                    self.connection_id, error.message
                )),
                None => GatewayError::mcp("Empty response from initialize"),
            })
    }

    /// List tools exposed by the downstream server
    pub async fn list_tools(&self) -> Result<Vec<Tool>> {
        let request = McpRequest::new("tools/list", None);
        let response = self.send_request(&request).await?;

        if let Some(result) = response.result {
            let tools_value = result
                .get("tools")
                .ok_or_else(|| GatewayError::mcp("Missing 'tools' field in tools/list response"))?;

            let tools: Vec<Tool> = serde_json::from_value(tools_value.clone())
                .map_err(|e| GatewayError::mcp(format!("Invalid tools format: {}", e)))?;

            debug!(
                "Retrieved {} tools from connection {}",
                tools.len(),
                self.connection_id
            );
            Ok(tools)
        } else if let Some(error) = response.error {
            Err(GatewayError::mcp(format!(
                "MCP error from connection {}: {}",
                self.connection_id, error.message
            )))
        } else {
            Err(GatewayError::mcp("Empty response from tools/list"))
        }
    }

    /// Call a tool on the downstream server, returning its raw result value
    pub async fn call_tool(&self, tool_name: &str, arguments: Value) -> Result<Value> {
        let request = McpRequest::new(
            "tools/call",
            Some(json!({
                "name": tool_name,
                "arguments": arguments
            })),
        );

        let response = self.send_request(&request).await?;

        if let Some(result) = response.result {
            Ok(result)
        } else if let Some(error) = response.error {
            Err(GatewayError::mcp(format!(
                "MCP error from connection {}: {}",
                self.connection_id, error.message
            )))
        } else {
            Err(GatewayError::mcp("Empty response from tools/call"))
        }
    }

    /// Call a tool and hand back the raw HTTP response for streaming
    ///
    /// Used by the gateway's streamable path: the downstream body (JSON or
    /// event-stream) is relayed to the caller without buffering.
    pub async fn call_tool_streaming(&self, tool_name: &str, arguments: Value) -> Result<Response> {
        let request = McpRequest::new(
            "tools/call",
            Some(json!({
                "name": tool_name,
                "arguments": arguments
            })),
        );

        let req_builder = self
            .http_client
            .post(self.endpoint.clone())
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream")
            .json(&request);

        let response = self
            .add_authentication(req_builder)
            .send()
            .await
            .map_err(|e| GatewayError::connection(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GatewayError::connection(format!(
                "HTTP {} error from connection {}: {}",
                status, self.connection_id, error_text
            )));
        }

        Ok(response)
    }

    /// Send an MCP request and parse the JSON-RPC response
    async fn send_request(&self, request: &McpRequest) -> Result<McpResponse> {
        debug!(
            "Sending MCP request to connection {}: method={}, id={:?}",
            self.connection_id, request.method, request.id
        );

        let req_builder = self
            .http_client
            .post(self.endpoint.clone())
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(request);

        let response = self
            .add_authentication(req_builder)
            .send()
            .await
            .map_err(|e| GatewayError::connection(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status.as_u16() == 401 {
            let challenge = response
                .headers()
                .get("www-authenticate")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            return Err(GatewayError::auth(format!(
                "401 unauthorized from connection {}: {}",
                self.connection_id, challenge
            )));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GatewayError::connection(format!(
                "HTTP {} error from connection {}: {}",
                status, self.connection_id, error_text
            )));
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| GatewayError::connection(format!("Failed to read response body: {}", e)))?;

        let mcp_response: McpResponse = serde_json::from_str(&response_text)
            .map_err(|e| GatewayError::mcp(format!("Invalid MCP response JSON: {}", e)))?;

        Ok(mcp_response)
    }

    /// Add authentication headers to the request
    fn add_authentication(&self, mut req_builder: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            ConnectionAuth::None => {}
            ConnectionAuth::Bearer { token } => {
                req_builder = req_builder.header("Authorization", format!("Bearer {}", token));
            }
            ConnectionAuth::ApiKey { header, key } => {
                req_builder = req_builder.header(header, key);
            }
            ConnectionAuth::Basic { username, password } => {
                req_builder = req_builder.basic_auth(username, Some(password));
            }
        }
        req_builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::EntityStatus;

    fn connection(url: &str) -> Connection {
        Connection {
            id: "c1".to_string(),
            organization_id: "org".to_string(),
            url: url.to_string(),
            title: None,
            auth: ConnectionAuth::None,
            status: EntityStatus::Active,
        }
    }

    #[test]
    fn test_client_creation_invalid_url() {
        let result = McpProxyClient::new(
            &connection("not a url"),
            Client::new(),
            "2025-06-18".to_string(),
            "meshgate".to_string(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_client_creation_valid_url() {
        let result = McpProxyClient::new(
            &connection("https://api.example.com/mcp"),
            Client::new(),
            "2025-06-18".to_string(),
            "meshgate".to_string(),
        );
        assert!(result.is_ok());
    }
}
