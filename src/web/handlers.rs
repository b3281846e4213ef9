//! Request handlers for the gateway HTTP surface

use crate::directory::{Connection, EntityStatus};
use crate::error::GatewayError;
use crate::gateway::{GatewayAggregator, StreamableCallOutcome};
use crate::mcp::types::{McpRequest, McpResponse, ToolResult};
use crate::web::AppState;
use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Health check endpoint
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": crate::VERSION,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Protected Resource Metadata (both well-known layouts)
pub async fn protected_resource_metadata(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> HttpResponse {
    let connection_id = path.into_inner();
    let connection = match state.directory.find_connection_by_id(&connection_id).await {
        Ok(connection) => connection,
        Err(e) => return error_response(&e),
    };

    match state.discovery.protected_resource_metadata(&connection).await {
        Ok(doc) => HttpResponse::Ok().json(doc),
        Err(e) => discovery_error_response(&e),
    }
}

/// Authorization Server Metadata, rewritten to gateway oauth-proxy URLs
pub async fn authorization_server_metadata(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> HttpResponse {
    let connection_id = path.into_inner();
    let connection = match state.directory.find_connection_by_id(&connection_id).await {
        Ok(connection) => connection,
        Err(e) => return error_response(&e),
    };

    match state.discovery.authorization_server_metadata(&connection).await {
        Ok(doc) => HttpResponse::Ok().json(doc),
        Err(e) => discovery_error_response(&e),
    }
}

/// Redirect to the origin's real authorize endpoint
///
/// Never proxies origin HTML; the client follows the redirect and completes
/// the flow against the origin directly.
pub async fn oauth_authorize(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: HttpRequest,
) -> HttpResponse {
    let connection_id = path.into_inner();
    let connection = match state.directory.find_connection_by_id(&connection_id).await {
        Ok(connection) => connection,
        Err(e) => return error_response(&e),
    };

    let query_pairs: Vec<(String, String)> =
        url::form_urlencoded::parse(req.query_string().as_bytes())
            .into_owned()
            .collect();

    match state
        .discovery
        .authorize_redirect_url(&connection, &query_pairs)
        .await
    {
        Ok(location) => HttpResponse::Found()
            .insert_header(("Location", location))
            .finish(),
        Err(e) => discovery_error_response(&e),
    }
}

/// Proxy a token request to the origin's token endpoint
pub async fn oauth_token(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: HttpRequest,
    body: web::Bytes,
) -> HttpResponse {
    forward_oauth_request(&state, &path.into_inner(), "token_endpoint", &req, body).await
}

/// Proxy a dynamic client registration request to the origin
pub async fn oauth_register(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: HttpRequest,
    body: web::Bytes,
) -> HttpResponse {
    forward_oauth_request(
        &state,
        &path.into_inner(),
        "registration_endpoint",
        &req,
        body,
    )
    .await
}

/// Forward a POST body to one of the origin's OAuth endpoints verbatim
async fn forward_oauth_request(
    state: &AppState,
    connection_id: &str,
    endpoint_field: &str,
    req: &HttpRequest,
    body: web::Bytes,
) -> HttpResponse {
    let connection = match state.directory.find_connection_by_id(connection_id).await {
        Ok(connection) => connection,
        Err(e) => return error_response(&e),
    };

    let endpoint = match state
        .discovery
        .origin_oauth_endpoint(&connection, endpoint_field)
        .await
    {
        Ok(endpoint) => endpoint,
        Err(e) => return discovery_error_response(&e),
    };

    let content_type = req
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/x-www-form-urlencoded")
        .to_string();

    let response = state
        .discovery
        .http_client()
        .post(&endpoint)
        .header("Content-Type", content_type)
        .body(body.to_vec())
        .send()
        .await;

    match response {
        Ok(response) => {
            let status = response.status().as_u16();
            let content_type = response
                .headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("application/json")
                .to_string();
            let bytes = response.bytes().await.unwrap_or_default();
            HttpResponse::build(
                actix_web::http::StatusCode::from_u16(status)
                    .unwrap_or(actix_web::http::StatusCode::BAD_GATEWAY),
            )
            .content_type(content_type)
            .body(bytes.to_vec())
        }
        Err(e) => {
            warn!("OAuth passthrough to {} failed: {}", endpoint, e);
            error_response(&GatewayError::discovery(
                502,
                format!("OAuth passthrough failed: {}", e),
            ))
        }
    }
}

/// Gateway MCP JSON-RPC endpoint with an explicit gateway id
pub async fn gateway_jsonrpc(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: HttpRequest,
    body: web::Json<McpRequest>,
) -> HttpResponse {
    let gateway = match state.directory.find_gateway_by_id(&path.into_inner()).await {
        Ok(gateway) => gateway,
        Err(e) => return error_response(&e),
    };
    handle_gateway_request(&state, gateway, &req, body.into_inner()).await
}

/// Gateway MCP JSON-RPC endpoint resolving the org default gateway
///
/// The default gateway comes from the `x-org-id` / `x-org-slug` headers,
/// passed explicitly to the directory resolver.
pub async fn gateway_jsonrpc_default(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<McpRequest>,
) -> HttpResponse {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let org_id = header("x-org-id");
    let org_slug = header("x-org-slug");

    let gateway = match state
        .directory
        .find_default_gateway(org_id.as_deref(), org_slug.as_deref())
        .await
    {
        Ok(gateway) => gateway,
        Err(e) => return error_response(&e),
    };
    handle_gateway_request(&state, gateway, &req, body.into_inner()).await
}

/// Gateway MCP endpoint for HTTP methods the transport does not serve
///
/// Streamable-HTTP clients may open GET (server-push stream) or send DELETE
/// (session teardown) against the MCP endpoint. This gateway serves the
/// JSON-RPC-over-POST binding only, so the remaining methods get a
/// well-formed 405 instead of a bare routing miss.
pub async fn gateway_method_not_allowed() -> HttpResponse {
    HttpResponse::MethodNotAllowed()
        .insert_header(("Allow", "POST"))
        .json(json!({
            "error": "method_not_allowed",
            "message": "This MCP endpoint serves JSON-RPC over POST only",
        }))
}

/// Dispatch one JSON-RPC request, building the aggregator only for the
/// methods that fan out
///
/// `initialize` and `notifications/initialized` are answered from gateway
/// metadata alone; spinning up every downstream proxy for a handshake would
/// be an N-connection fan-out per client connect.
async fn handle_gateway_request(
    state: &AppState,
    gateway: crate::directory::Gateway,
    req: &HttpRequest,
    request: McpRequest,
) -> HttpResponse {
    if gateway.status != EntityStatus::Active {
        return error_response(&GatewayError::inactive(format!(
            "Gateway '{}' is inactive",
            gateway.id
        )));
    }

    match request.method.as_str() {
        "initialize" => {
            let result = json!({
                "protocolVersion": state.config.mcp_client.protocol_version,
                "capabilities": { "tools": { "listChanged": false } },
                "serverInfo": {
                    "name": env!("CARGO_PKG_NAME"),
                    "version": crate::VERSION,
                },
            });
            HttpResponse::Ok().json(McpResponse::success(request.id, result))
        }
        "notifications/initialized" => HttpResponse::Ok().json(json!({"jsonrpc": "2.0"})),
        "tools/list" => {
            let aggregator = match build_aggregator(state, &gateway).await {
                Ok(aggregator) => aggregator,
                Err(e) => return error_response(&e),
            };
            let tools = aggregator.list_tools();
            HttpResponse::Ok().json(McpResponse::success(request.id, json!({ "tools": tools })))
        }
        "tools/call" => {
            let params = request.params.unwrap_or(Value::Null);
            let Some(name) = params.get("name").and_then(Value::as_str).map(str::to_string)
            else {
                return HttpResponse::Ok().json(McpResponse::error(
                    request.id,
                    -32602,
                    "tools/call requires a 'name' parameter".to_string(),
                ));
            };
            let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

            let aggregator = match build_aggregator(state, &gateway).await {
                Ok(aggregator) => aggregator,
                Err(e) => return error_response(&e),
            };
            if wants_event_stream(req) {
                match aggregator.call_streamable_tool(&name, arguments).await {
                    StreamableCallOutcome::Stream(response) => relay_stream(response),
                    StreamableCallOutcome::Result(result) => {
                        tool_result_response(request.id, result)
                    }
                }
            } else {
                let result = aggregator.call_tool(&name, arguments).await;
                tool_result_response(request.id, result)
            }
        }
        other => {
            debug!("Unknown gateway method '{}'", other);
            HttpResponse::Ok().json(McpResponse::error(
                request.id,
                -32601,
                format!("Method '{}' not found", other),
            ))
        }
    }
}

/// Build the request-scoped aggregator for one gateway
async fn build_aggregator(
    state: &AppState,
    gateway: &crate::directory::Gateway,
) -> crate::error::Result<GatewayAggregator> {
    GatewayAggregator::build(
        gateway,
        state.directory.as_ref(),
        state.factory.as_ref(),
        Duration::from_secs(state.config.mcp_client.upstream_timeout_secs),
    )
    .await
}

/// Single-connection MCP endpoint
///
/// This is the protected resource the OAuth documents point at. A failed
/// downstream connection attempt runs through the auth-error translator: an
/// OAuth-capable origin yields a 401 challenge scoped to the gateway, a
/// static-credential origin yields a plain 401 with no `WWW-Authenticate`.
pub async fn connection_jsonrpc(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<McpRequest>,
) -> HttpResponse {
    let connection = match state.directory.find_connection_by_id(&path.into_inner()).await {
        Ok(connection) => connection,
        Err(e) => return error_response(&e),
    };
    if connection.status == EntityStatus::Inactive {
        return error_response(&GatewayError::inactive(format!(
            "Connection '{}' is inactive",
            connection.id
        )));
    }

    let proxy = match state.factory.create_proxy(&connection).await {
        Ok(proxy) => proxy,
        Err(e) => return auth_translated_response(&state, &connection, e).await,
    };

    let request = body.into_inner();
    match request.method.as_str() {
        "initialize" => {
            let result = json!({
                "protocolVersion": state.config.mcp_client.protocol_version,
                "capabilities": { "tools": { "listChanged": false } },
                "serverInfo": {
                    "name": env!("CARGO_PKG_NAME"),
                    "version": crate::VERSION,
                },
            });
            HttpResponse::Ok().json(McpResponse::success(request.id, result))
        }
        "notifications/initialized" => HttpResponse::Ok().json(json!({"jsonrpc": "2.0"})),
        "tools/list" => match proxy.list_tools().await {
            Ok(tools) => HttpResponse::Ok()
                .json(McpResponse::success(request.id, json!({ "tools": tools }))),
            Err(e) => auth_translated_response(&state, &connection, e).await,
        },
        "tools/call" => {
            let params = request.params.unwrap_or(Value::Null);
            let Some(name) = params.get("name").and_then(Value::as_str).map(str::to_string)
            else {
                return HttpResponse::Ok().json(McpResponse::error(
                    request.id,
                    -32602,
                    "tools/call requires a 'name' parameter".to_string(),
                ));
            };
            let arguments = params.get("arguments").cloned().unwrap_or(json!({}));
            match proxy.call_tool(&name, arguments).await {
                Ok(result) => HttpResponse::Ok().json(McpResponse::success(request.id, result)),
                Err(e) => auth_translated_response(&state, &connection, e).await,
            }
        }
        other => HttpResponse::Ok().json(McpResponse::error(
            request.id,
            -32601,
            format!("Method '{}' not found", other),
        )),
    }
}

/// Translate a downstream failure into the appropriate gateway response
async fn auth_translated_response(
    state: &AppState,
    connection: &Connection,
    error: GatewayError,
) -> HttpResponse {
    match state.discovery.translate_auth_error(connection, &error).await {
        Some(challenge) => {
            let mut builder = HttpResponse::Unauthorized();
            if let Some(header) = &challenge.www_authenticate {
                builder.insert_header(("WWW-Authenticate", header.as_str()));
            }
            builder.json(json!({
                "error": "unauthorized",
                "message": challenge.message,
            }))
        }
        None => error_response(&error),
    }
}

/// Does the request accept an event-stream response?
fn wants_event_stream(req: &HttpRequest) -> bool {
    req.headers()
        .get("accept")
        .and_then(|v| v.to_str().ok())
        .map(|accept| accept.contains("text/event-stream"))
        .unwrap_or(false)
}

/// Relay a downstream streaming response verbatim
fn relay_stream(response: reqwest::Response) -> HttpResponse {
    let status = actix_web::http::StatusCode::from_u16(response.status().as_u16())
        .unwrap_or(actix_web::http::StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/json")
        .to_string();

    HttpResponse::build(status)
        .content_type(content_type)
        .streaming(response.bytes_stream())
}

/// Wrap a tool result as a JSON-RPC response
fn tool_result_response(id: Option<Value>, result: ToolResult) -> HttpResponse {
    let value = serde_json::to_value(&result).unwrap_or_else(|_| json!({"isError": true}));
    HttpResponse::Ok().json(McpResponse::success(id, value))
}

/// Machine-readable error body with the taxonomy's status mapping
fn error_response(error: &GatewayError) -> HttpResponse {
    let status = actix_web::http::StatusCode::from_u16(error.http_status())
        .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR);
    HttpResponse::build(status).json(json!({
        "error": error.category(),
        "message": error.to_string(),
    }))
}

/// Discovery errors pass the origin's no-metadata status through; anything
/// else is a 502 upstream failure
fn discovery_error_response(error: &GatewayError) -> HttpResponse {
    if let GatewayError::Discovery { status, message } = error {
        let code = match *status {
            404 | 401 | 406 => *status,
            _ => 502,
        };
        let status_code = actix_web::http::StatusCode::from_u16(code)
            .unwrap_or(actix_web::http::StatusCode::BAD_GATEWAY);
        return HttpResponse::build(status_code).json(json!({
            "error": "discovery",
            "message": message,
        }));
    }
    error_response(error)
}
