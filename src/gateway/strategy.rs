//! Tool selection strategies
//!
//! A strategy is the pluggable last stage of aggregation: it receives the
//! deduplicated tool list plus the connection categories and may reshape the
//! surface the client sees (e.g. collapsing many tools behind meta-tools).
//! The aggregator never inspects what a strategy did; the strategy output is
//! the final `tools/list` / `tools/call` surface. Strategies are selected by
//! the id stored on the gateway record; unknown ids degrade to passthrough.

use crate::mcp::types::{Tool, ToolResult, ToolWithConnection};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Raw dispatcher a strategy routes through
///
/// Routes a flattened tool name to the owning connection. Implemented by the
/// aggregator; a strategy must not have side effects beyond invoking this.
#[async_trait]
pub trait ToolRouter: Send + Sync {
    /// Route a call to the connection owning `name`
    async fn route(&self, name: &str, arguments: Value) -> ToolResult;
}

/// Pluggable transformation of the aggregated tool surface
#[async_trait]
pub trait ToolSelectionStrategy: Send + Sync {
    /// Strategy identifier as stored on gateway records
    fn id(&self) -> &'static str;

    /// Transform the deduplicated tool list into the exposed surface
    fn transform_tools(&self, tools: Vec<ToolWithConnection>, categories: &[String]) -> Vec<Tool>;

    /// Execute a call against the exposed surface
    async fn call_tool(&self, name: &str, arguments: Value, router: &dyn ToolRouter) -> ToolResult;
}

/// Identity strategy: expose every aggregated tool as-is
#[derive(Debug, Default)]
pub struct PassthroughStrategy;

#[async_trait]
impl ToolSelectionStrategy for PassthroughStrategy {
    fn id(&self) -> &'static str {
        "passthrough"
    }

    fn transform_tools(&self, tools: Vec<ToolWithConnection>, _categories: &[String]) -> Vec<Tool> {
        tools.into_iter().map(ToolWithConnection::into_tool).collect()
    }

    async fn call_tool(&self, name: &str, arguments: Value, router: &dyn ToolRouter) -> ToolResult {
        router.route(name, arguments).await
    }
}

/// Resolve a strategy id to an implementation
///
/// The registry is closed; a stale or unknown id on a gateway record degrades
/// to passthrough rather than failing the request.
pub fn strategy_for_id(id: Option<&str>) -> Arc<dyn ToolSelectionStrategy> {
    match id {
        Some("passthrough") | None => Arc::new(PassthroughStrategy),
        Some(other) => {
            tracing::warn!("Unknown tool selection strategy '{}', using passthrough", other);
            Arc::new(PassthroughStrategy)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct RecordingRouter;

    #[async_trait]
    impl ToolRouter for RecordingRouter {
        async fn route(&self, name: &str, _arguments: Value) -> ToolResult {
            ToolResult::success(json!({ "routed": name }))
        }
    }

    fn annotated(name: &str) -> ToolWithConnection {
        ToolWithConnection {
            name: name.to_string(),
            title: None,
            description: None,
            input_schema: json!({"type": "object"}),
            output_schema: None,
            connection_id: "c1".to_string(),
            connection_title: "C One".to_string(),
        }
    }

    #[test]
    fn test_passthrough_is_identity_on_names() {
        let strategy = PassthroughStrategy;
        let tools = strategy.transform_tools(vec![annotated("a"), annotated("b")], &[]);
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_passthrough_routes_verbatim() {
        let strategy = PassthroughStrategy;
        let result = strategy.call_tool("a", json!({}), &RecordingRouter).await;
        assert!(!result.is_error);
    }

    #[test]
    fn test_unknown_strategy_falls_back_to_passthrough() {
        assert_eq!(strategy_for_id(Some("galaxy-brain")).id(), "passthrough");
        assert_eq!(strategy_for_id(None).id(), "passthrough");
    }
}
