//! MCP types and structures
//!
//! Type definitions for the slice of the MCP protocol the gateway speaks:
//! tools, tool results, and the JSON-RPC envelopes.

use crate::error::Result;
use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// MCP Tool definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    /// Tool name (unique identifier)
    pub name: String,
    /// Human-readable description (optional for compatibility)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
    /// Optional human-readable title
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub title: Option<String>,
    /// JSON Schema for input parameters
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
    /// Optional JSON Schema for output validation
    #[serde(rename = "outputSchema", skip_serializing_if = "Option::is_none", default)]
    pub output_schema: Option<Value>,
}

impl Tool {
    /// Create a new Tool with validation
    pub fn new(name: String, description: String, input_schema: Value) -> Result<Self> {
        let tool = Tool {
            name,
            description: Some(description),
            title: None,
            input_schema,
            output_schema: None,
        };

        tool.validate()?;
        Ok(tool)
    }

    /// Validate the tool definition
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(crate::error::GatewayError::validation(
                "Tool name cannot be empty",
            ));
        }

        self.validate_input_schema()
    }

    /// Validate that the input schema is a valid JSON Schema
    pub fn validate_input_schema(&self) -> Result<()> {
        match JSONSchema::compile(&self.input_schema) {
            Ok(_) => Ok(()),
            Err(e) => Err(crate::error::GatewayError::validation(format!(
                "Invalid JSON Schema for tool '{}': {}",
                self.name, e
            ))),
        }
    }
}

/// A tool annotated with the connection it came from
///
/// This is the flattened record the aggregator builds from each downstream
/// catalog before handing the merged list to the tool-selection strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolWithConnection {
    /// Tool name (unique across the whole gateway after dedup)
    pub name: String,
    /// Optional human-readable title
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub title: Option<String>,
    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
    /// JSON Schema for input parameters
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
    /// Optional JSON Schema for output validation
    #[serde(rename = "outputSchema", skip_serializing_if = "Option::is_none", default)]
    pub output_schema: Option<Value>,
    /// Id of the connection that owns this tool
    #[serde(rename = "connectionId")]
    pub connection_id: String,
    /// Title of the owning connection (used as a strategy category)
    #[serde(rename = "connectionTitle")]
    pub connection_title: String,
}

impl ToolWithConnection {
    /// Annotate a downstream tool with its owning connection
    pub fn from_tool(tool: Tool, connection_id: &str, connection_title: &str) -> Self {
        Self {
            name: tool.name,
            title: tool.title,
            description: tool.description,
            input_schema: tool.input_schema,
            output_schema: tool.output_schema,
            connection_id: connection_id.to_string(),
            connection_title: connection_title.to_string(),
        }
    }

    /// Strip the connection annotation back down to a plain MCP tool
    pub fn into_tool(self) -> Tool {
        Tool {
            name: self.name,
            description: self.description,
            title: self.title,
            input_schema: self.input_schema,
            output_schema: self.output_schema,
        }
    }
}

/// MCP-compliant content types for tool results
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolContent {
    /// Text content
    #[serde(rename = "text")]
    Text {
        /// Text content
        text: String,
    },
    /// Image content (base64 encoded)
    #[serde(rename = "image")]
    Image {
        /// Base64 encoded image data
        data: String,
        /// MIME type (e.g., "image/png")
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// Resource link content
    #[serde(rename = "resource")]
    Resource {
        /// Resource URI
        uri: String,
        /// Optional resource text content
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        /// Optional MIME type
        #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
}

impl ToolContent {
    /// Create text content
    pub fn text(text: String) -> Self {
        Self::Text { text }
    }
}

/// MCP tool call result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// MCP error flag (`isError` on the wire); absent means success
    #[serde(rename = "isError", default)]
    pub is_error: bool,
    /// Content array for MCP-compliant responses
    #[serde(default)]
    pub content: Vec<ToolContent>,
    /// Error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    /// Create a successful result from a JSON value
    pub fn success(data: Value) -> Self {
        let content = vec![ToolContent::text(
            serde_json::to_string_pretty(&data).unwrap_or_else(|_| data.to_string()),
        )];
        Self {
            is_error: false,
            content,
            error: None,
        }
    }

    /// Create a successful result with explicit content
    pub fn success_with_content(content: Vec<ToolContent>) -> Self {
        Self {
            is_error: false,
            content,
            error: None,
        }
    }

    /// Create an error result
    ///
    /// Tool errors are normal MCP results with `isError: true`, not protocol
    /// exceptions; the caller gets something it can render.
    pub fn error(error: String) -> Self {
        let content = vec![ToolContent::text(format!("Error: {}", error))];
        Self {
            is_error: true,
            content,
            error: Some(error),
        }
    }

    /// Build a result from a raw downstream `tools/call` result document
    ///
    /// Downstream results are passed through unmodified when they already
    /// carry an MCP content array (`isError` is optional and absent means
    /// success); anything else is wrapped as text.
    pub fn from_downstream(result: Value) -> Self {
        if result.get("content").map_or(false, Value::is_array) {
            if let Ok(parsed) = serde_json::from_value::<ToolResult>(result.clone()) {
                return parsed;
            }
        }
        let is_error = result
            .get("isError")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let mut parsed = ToolResult::success(result);
        parsed.is_error = is_error;
        parsed
    }
}

/// MCP Request message (JSON-RPC 2.0)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpRequest {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,
    /// Request ID (can be string, number, or null for notifications)
    pub id: Option<Value>,
    /// Method name
    pub method: String,
    /// Parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl McpRequest {
    /// Create a request with a fresh uuid id
    pub fn new(method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(Value::String(uuid::Uuid::new_v4().to_string())),
            method: method.to_string(),
            params,
        }
    }
}

/// MCP Response message (JSON-RPC 2.0)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpResponse {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,
    /// Request ID this responds to
    #[serde(default)]
    pub id: Option<Value>,
    /// Result (if successful)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
}

impl McpResponse {
    /// Create a success response mirroring the request id
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response mirroring the request id
    pub fn error(id: Option<Value>, code: i64, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(McpError { code, message, data: None }),
        }
    }
}

/// MCP JSON-RPC error object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpError {
    /// JSON-RPC error code
    pub code: i64,
    /// Human-readable error message
    pub message: String,
    /// Optional structured error data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_validation_rejects_empty_name() {
        let tool = Tool {
            name: "  ".to_string(),
            description: None,
            title: None,
            input_schema: json!({"type": "object"}),
            output_schema: None,
        };
        assert!(tool.validate().is_err());
    }

    #[test]
    fn test_tool_with_connection_round_trip() {
        let tool = Tool::new(
            "lookup".to_string(),
            "Look something up".to_string(),
            json!({"type": "object"}),
        )
        .unwrap();

        let annotated = ToolWithConnection::from_tool(tool, "conn-1", "Weather");
        assert_eq!(annotated.connection_id, "conn-1");
        assert_eq!(annotated.connection_title, "Weather");

        let plain = annotated.into_tool();
        assert_eq!(plain.name, "lookup");
    }

    #[test]
    fn test_tool_with_connection_serializes_camel_case() {
        let annotated = ToolWithConnection {
            name: "t".to_string(),
            title: None,
            description: None,
            input_schema: json!({"type": "object"}),
            output_schema: None,
            connection_id: "c1".to_string(),
            connection_title: "C One".to_string(),
        };
        let value = serde_json::to_value(&annotated).unwrap();
        assert_eq!(value["connectionId"], "c1");
        assert_eq!(value["connectionTitle"], "C One");
        assert!(value.get("inputSchema").is_some());
    }

    #[test]
    fn test_tool_result_error_shape() {
        let result = ToolResult::error("tool not found".to_string());
        assert!(result.is_error);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["isError"], true);
    }

    #[test]
    fn test_from_downstream_passthrough() {
        let downstream = json!({
            "isError": false,
            "content": [{"type": "text", "text": "ok"}]
        });
        let result = ToolResult::from_downstream(downstream);
        assert!(!result.is_error);
        assert_eq!(result.content.len(), 1);
    }

    #[test]
    fn test_from_downstream_without_is_error_passes_through() {
        // isError is optional on the wire; its absence must not demote the
        // result to a re-wrapped text blob.
        let downstream = json!({
            "content": [{"type": "text", "text": "hello from origin"}]
        });
        let result = ToolResult::from_downstream(downstream);
        assert!(!result.is_error);
        match &result.content[0] {
            ToolContent::Text { text } => assert_eq!(text, "hello from origin"),
            other => panic!("unexpected content: {:?}", other),
        }
    }

    #[test]
    fn test_from_downstream_wraps_non_mcp_documents() {
        let downstream = json!({"rows": [1, 2, 3]});
        let result = ToolResult::from_downstream(downstream);
        assert!(!result.is_error);
        match &result.content[0] {
            ToolContent::Text { text } => assert!(text.contains("rows")),
            other => panic!("unexpected content: {:?}", other),
        }
    }
}
