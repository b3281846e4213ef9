//! HTTP surface of the mesh gateway
//!
//! Binds the aggregator and the OAuth discovery proxy to actix-web routes:
//! the well-known discovery endpoints (two Protected Resource Metadata
//! layouts plus Authorization Server Metadata), the OAuth proxy endpoints,
//! and the gateway/connection MCP JSON-RPC endpoints.

mod handlers;

use crate::config::Config;
use crate::directory::ConnectionDirectory;
use crate::error::{GatewayError, Result};
use crate::gateway::{HttpProxyFactory, ProxyFactory};
use crate::oauth::OAuthDiscoveryProxy;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::sync::Arc;
use tracing::info;

/// Shared state handed to every handler
pub struct AppState {
    /// Gateway configuration
    pub config: Config,
    /// Connection/gateway directory
    pub directory: Arc<dyn ConnectionDirectory>,
    /// Downstream proxy factory
    pub factory: Arc<dyn ProxyFactory>,
    /// OAuth discovery proxy
    pub discovery: OAuthDiscoveryProxy,
}

impl AppState {
    /// Build application state from configuration and a directory
    pub fn new(config: Config, directory: Arc<dyn ConnectionDirectory>) -> Result<Self> {
        let factory = HttpProxyFactory::new(config.mcp_client.clone())?;
        let discovery = OAuthDiscoveryProxy::new(
            config.public_origin_trimmed(),
            config.mcp_client.discovery_timeout_secs,
        )?;
        Ok(Self {
            config,
            directory,
            factory: Arc::new(factory),
            discovery,
        })
    }
}

/// Register every gateway route on an actix app
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Health check
        .route("/health", web::get().to(handlers::health_check))
        // Protected Resource Metadata (format A: well-known prefix)
        .route(
            "/.well-known/oauth-protected-resource/mcp/{connection_id}",
            web::get().to(handlers::protected_resource_metadata),
        )
        // Protected Resource Metadata (format B: resource-relative)
        .route(
            "/mcp/{connection_id}/.well-known/oauth-protected-resource",
            web::get().to(handlers::protected_resource_metadata),
        )
        // Authorization Server Metadata
        .route(
            "/.well-known/oauth-authorization-server/oauth-proxy/{connection_id}",
            web::get().to(handlers::authorization_server_metadata),
        )
        // OAuth proxy endpoints
        .route(
            "/oauth-proxy/{connection_id}/authorize",
            web::get().to(handlers::oauth_authorize),
        )
        .route(
            "/oauth-proxy/{connection_id}/authorize",
            web::post().to(handlers::oauth_authorize),
        )
        .route(
            "/oauth-proxy/{connection_id}/token",
            web::post().to(handlers::oauth_token),
        )
        .route(
            "/oauth-proxy/{connection_id}/register",
            web::post().to(handlers::oauth_register),
        )
        // Gateway MCP endpoint (with and without explicit id): JSON-RPC over
        // POST; other methods a streamable client may try get a 405
        .route(
            "/mcp/gateway/{gateway_id}",
            web::post().to(handlers::gateway_jsonrpc),
        )
        .route(
            "/mcp/gateway/{gateway_id}",
            web::route().to(handlers::gateway_method_not_allowed),
        )
        .route("/mcp/gateway", web::post().to(handlers::gateway_jsonrpc_default))
        .route(
            "/mcp/gateway",
            web::route().to(handlers::gateway_method_not_allowed),
        )
        // Single-connection MCP endpoint (the protected resource clients
        // authenticate against during the OAuth flow)
        .route(
            "/mcp/{connection_id}",
            web::post().to(handlers::connection_jsonrpc),
        );
}

/// Run the gateway HTTP server until shutdown
pub async fn run_server(state: AppState) -> Result<()> {
    let host = state.config.server.host.clone();
    let port = state.config.server.port;
    let state_data = web::Data::new(state);

    info!("Starting mesh gateway on {}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .app_data(state_data.clone())
            .wrap(Logger::default())
            .configure(configure_routes)
    })
    .bind((host.as_str(), port))
    .map_err(|e| GatewayError::config(format!("Failed to bind {}:{}: {}", host, port, e)))?
    .run()
    .await
    .map_err(GatewayError::Io)
}
