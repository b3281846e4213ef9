//! Gateway aggregation engine
//!
//! Builds one virtual MCP server out of a gateway's resolved connection set:
//! concurrent proxy construction, concurrent tool listing, first-occurrence
//! dedup, routing-table construction, and tool-selection strategy
//! application. Everything here is request-scoped; nothing survives one
//! gateway invocation.

mod aggregator;
mod proxy;
mod strategy;

pub use aggregator::{
    resolve_connection_set, GatewayAggregator, ResolvedConnection, StreamableCallOutcome,
    ToolRoute,
};
pub use proxy::{DownstreamProxy, HttpProxyFactory, ProxyFactory};
pub use strategy::{strategy_for_id, PassthroughStrategy, ToolRouter, ToolSelectionStrategy};
