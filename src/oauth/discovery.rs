//! Origin metadata discovery and rewriting
//!
//! Real-world MCP servers publish their OAuth discovery documents in three
//! different layouts (RFC 9728 resource-relative, a well-known-prefix vendor
//! variant, and a bare root fallback), and some publish none at all while
//! still demanding OAuth via a 401 challenge. This module probes all of them
//! in order and rewrites every URL in the winning document to point at the
//! gateway.

use crate::directory::Connection;
use crate::error::{GatewayError, Result};
use crate::oauth::challenge::{is_auth_error, AuthChallenge};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// HTTP statuses meaning "this origin has no metadata at this URL".
///
/// 406 shows up on MCP-only endpoints that reject `.well-known` paths.
const NO_METADATA_STATUSES: [u16; 3] = [404, 401, 406];

/// Discovery proxy for origin OAuth metadata
#[derive(Debug, Clone)]
pub struct OAuthDiscoveryProxy {
    /// HTTP client for discovery fetches and origin probes
    http_client: Client,
    /// Gateway public origin, no trailing slash
    gateway_origin: String,
}

impl OAuthDiscoveryProxy {
    /// Create a discovery proxy
    pub fn new(gateway_origin: String, discovery_timeout_secs: u64) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(discovery_timeout_secs))
            .user_agent(format!("{}/{}", env!("CARGO_PKG_NAME"), crate::VERSION))
            .build()
            .map_err(|e| GatewayError::connection(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            gateway_origin: gateway_origin.trim_end_matches('/').to_string(),
        })
    }

    /// Gateway-scoped resource URL for a connection
    pub fn gateway_resource_url(&self, connection_id: &str) -> String {
        format!("{}/mcp/{}", self.gateway_origin, connection_id)
    }

    /// Gateway-scoped authorization server URL for a connection
    pub fn gateway_auth_server_url(&self, connection_id: &str) -> String {
        format!("{}/oauth-proxy/{}", self.gateway_origin, connection_id)
    }

    /// Protected Resource Metadata for a connection, rewritten to the gateway
    ///
    /// Tries the three well-known layouts in order; if none exists but the
    /// origin answers an uncredentialed initialize with an OAuth-shaped 401,
    /// a minimal document is synthesized. Otherwise the original no-metadata
    /// failure is propagated.
    pub async fn protected_resource_metadata(&self, connection: &Connection) -> Result<Value> {
        match self.fetch_origin_prm(connection).await {
            Ok(mut doc) => {
                self.rewrite_prm(&mut doc, &connection.id);
                Ok(doc)
            }
            Err(original) => {
                if matches!(&original, GatewayError::Discovery { status, .. }
                    if NO_METADATA_STATUSES.contains(status))
                {
                    if let Some(challenge) = self.probe_origin_challenge(&connection.url).await {
                        if is_oauth_shaped(&challenge) {
                            debug!(
                                "Synthesizing protected resource metadata for connection {} from 401 challenge",
                                connection.id
                            );
                            return Ok(self.synthesize_prm(&connection.id));
                        }
                    }
                }
                Err(original)
            }
        }
    }

    /// Fetch the origin's Protected Resource Metadata document, unrewritten
    pub async fn fetch_origin_prm(&self, connection: &Connection) -> Result<Value> {
        let candidates = prm_candidates(&connection.url)?;
        let mut last_no_metadata = 404u16;

        for candidate in &candidates {
            debug!("Fetching protected resource metadata from {}", candidate);
            let response = self
                .http_client
                .get(candidate)
                .header("Accept", "application/json")
                .send()
                .await
                .map_err(|e| {
                    GatewayError::discovery(
                        502,
                        format!("Failed to fetch {}: {}", candidate, e),
                    )
                })?;

            let status = response.status().as_u16();
            if NO_METADATA_STATUSES.contains(&status) {
                last_no_metadata = status;
                continue;
            }
            if !response.status().is_success() {
                // A hard upstream error ends the chain immediately.
                return Err(GatewayError::discovery(
                    status,
                    format!("Origin returned {} for {}", status, candidate),
                ));
            }

            return response
                .json::<Value>()
                .await
                .map_err(|e| {
                    GatewayError::discovery(
                        502,
                        format!("Invalid metadata JSON from {}: {}", candidate, e),
                    )
                });
        }

        Err(GatewayError::discovery(
            last_no_metadata,
            format!(
                "No protected resource metadata found for {}",
                connection.url
            ),
        ))
    }

    /// Rewrite a Protected Resource Metadata document to gateway URLs
    ///
    /// Only `resource` and `authorization_servers` are touched; every other
    /// field passes through unchanged.
    pub fn rewrite_prm(&self, doc: &mut Value, connection_id: &str) {
        if let Some(obj) = doc.as_object_mut() {
            obj.insert(
                "resource".to_string(),
                Value::String(self.gateway_resource_url(connection_id)),
            );
            obj.insert(
                "authorization_servers".to_string(),
                json!([self.gateway_auth_server_url(connection_id)]),
            );
        }
    }

    /// Minimal synthesized Protected Resource Metadata document
    fn synthesize_prm(&self, connection_id: &str) -> Value {
        json!({
            "resource": self.gateway_resource_url(connection_id),
            "authorization_servers": [self.gateway_auth_server_url(connection_id)],
            "bearer_methods_supported": ["header"],
            "scopes_supported": ["*"],
        })
    }

    /// Authorization Server Metadata for a connection, rewritten to the gateway
    pub async fn authorization_server_metadata(&self, connection: &Connection) -> Result<Value> {
        let mut doc = self.origin_authorization_server_metadata(connection).await?;

        let proxy_base = self.gateway_auth_server_url(&connection.id);
        if let Some(obj) = doc.as_object_mut() {
            for (field, suffix) in [
                ("authorization_endpoint", "authorize"),
                ("token_endpoint", "token"),
                ("registration_endpoint", "register"),
            ] {
                // Only rewrite fields the source actually carries.
                if obj.contains_key(field) {
                    obj.insert(
                        field.to_string(),
                        Value::String(format!("{}/{}", proxy_base, suffix)),
                    );
                }
            }
        }

        Ok(doc)
    }

    /// Fetch the origin's Authorization Server Metadata, unrewritten
    ///
    /// The authorization server URL comes from the origin PRM's first
    /// `authorization_servers` entry; if the PRM is missing or lists none,
    /// the connection's own origin is used, since many servers expose AS
    /// metadata at their root without publishing PRM at all.
    pub async fn origin_authorization_server_metadata(
        &self,
        connection: &Connection,
    ) -> Result<Value> {
        let auth_server_url = match self.fetch_origin_prm(connection).await {
            Ok(doc) => doc
                .get("authorization_servers")
                .and_then(Value::as_array)
                .and_then(|servers| servers.first())
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or(origin_of(&connection.url)?),
            Err(e) => {
                debug!(
                    "No protected resource metadata for connection {} ({}); falling back to origin",
                    connection.id, e
                );
                origin_of(&connection.url)?
            }
        };

        let candidates = auth_server_candidates(&auth_server_url)?;
        for candidate in &candidates {
            debug!("Fetching authorization server metadata from {}", candidate);
            let response = self
                .http_client
                .get(candidate)
                .header("Accept", "application/json")
                .send()
                .await
                .map_err(|e| {
                    GatewayError::discovery(
                        502,
                        format!("Failed to fetch {}: {}", candidate, e),
                    )
                })?;

            let status = response.status().as_u16();
            if status == 200 {
                return response.json::<Value>().await.map_err(|e| {
                    GatewayError::discovery(
                        502,
                        format!("Invalid metadata JSON from {}: {}", candidate, e),
                    )
                });
            }
            if status == 404 || status == 401 {
                continue;
            }
            return Err(GatewayError::discovery(
                status,
                format!("Origin returned {} for {}", status, candidate),
            ));
        }

        Err(GatewayError::discovery(
            404,
            format!(
                "No authorization server metadata found for {}",
                auth_server_url
            ),
        ))
    }

    /// Build the origin authorize redirect for `/oauth-proxy/:id/authorize`
    ///
    /// Always an HTTP redirect, never proxied origin HTML. The `resource`
    /// query parameter is rewritten from the gateway's `/mcp/:id` URL back to
    /// the origin connection URL: some authorization servers validate
    /// `resource` against the real protected resource and reject anything
    /// else.
    pub async fn authorize_redirect_url(
        &self,
        connection: &Connection,
        query_pairs: &[(String, String)],
    ) -> Result<String> {
        let metadata = self.origin_authorization_server_metadata(connection).await?;
        let authorize_endpoint = metadata
            .get("authorization_endpoint")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                GatewayError::discovery(
                    502,
                    "Origin authorization server metadata has no authorization_endpoint",
                )
            })?;

        let mut target = Url::parse(authorize_endpoint).map_err(|e| {
            GatewayError::discovery(
                502,
                format!("Invalid authorization_endpoint '{}': {}", authorize_endpoint, e),
            )
        })?;

        {
            let mut serializer = target.query_pairs_mut();
            for (key, value) in query_pairs {
                if key == "resource" {
                    serializer.append_pair(key, &connection.url);
                } else {
                    serializer.append_pair(key, value);
                }
            }
        }

        Ok(target.to_string())
    }

    /// Resolve one of the origin's real OAuth endpoints by metadata field
    ///
    /// Used by the token/register passthrough routes, which must talk to the
    /// origin endpoints rather than the rewritten gateway ones.
    pub async fn origin_oauth_endpoint(
        &self,
        connection: &Connection,
        field: &str,
    ) -> Result<String> {
        let metadata = self.origin_authorization_server_metadata(connection).await?;
        metadata
            .get(field)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                GatewayError::discovery(
                    502,
                    format!("Origin authorization server metadata has no {}", field),
                )
            })
    }

    /// Shared HTTP client, used by the OAuth passthrough routes
    pub fn http_client(&self) -> &Client {
        &self.http_client
    }

    /// Probe an origin with a minimal uncredentialed MCP initialize POST
    ///
    /// Returns the `WWW-Authenticate` header value when the origin answers
    /// 401; anything else (including probe failures) is `None`.
    pub async fn probe_origin_challenge(&self, url: &str) -> Option<String> {
        let probe = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": "2025-06-18",
                "capabilities": {},
                "clientInfo": {"name": env!("CARGO_PKG_NAME"), "version": crate::VERSION}
            }
        });

        let response = match self
            .http_client
            .post(url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream")
            .json(&probe)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                debug!("Origin probe of {} failed: {}", url, e);
                return None;
            }
        };

        if response.status().as_u16() != 401 {
            return None;
        }

        response
            .headers()
            .get("www-authenticate")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    /// Translate a downstream connection failure into a gateway 401, if it
    /// is an auth failure at all
    ///
    /// Returns `None` when the error is not auth-shaped (caller decides what
    /// to do). For auth failures, the origin probe decides the branch: an
    /// OAuth-shaped challenge yields a 401 with a `WWW-Authenticate` header
    /// pointing at the gateway's metadata endpoint; anything else yields a
    /// plain 401 with no challenge header, which tells OAuth-capable clients
    /// NOT to start an OAuth flow and go find a static credential instead.
    pub async fn translate_auth_error(
        &self,
        connection: &Connection,
        error: &GatewayError,
    ) -> Option<AuthChallenge> {
        if !is_auth_error(error) {
            return None;
        }

        let oauth_capable = match self.probe_origin_challenge(&connection.url).await {
            Some(challenge) => is_oauth_shaped(&challenge),
            // Ambiguity defaults to the non-OAuth branch: a false negative
            // keeps a static-credential server out of an OAuth flow it does
            // not support.
            None => false,
        };

        if oauth_capable {
            Some(AuthChallenge {
                www_authenticate: Some(crate::oauth::challenge_header(
                    &self.gateway_origin,
                    &connection.id,
                )),
                message: error.to_string(),
            })
        } else {
            warn!(
                "Connection {} rejected credentials without OAuth support; plain 401",
                connection.id
            );
            Some(AuthChallenge {
                www_authenticate: None,
                message: error.to_string(),
            })
        }
    }
}

/// Does a `WWW-Authenticate` value look like OAuth support?
///
/// Substring heuristic preserved for compatibility with deployed origins;
/// approximate by design (a realm string merely mentioning "OAuth" will
/// match).
pub fn is_oauth_shaped(challenge: &str) -> bool {
    let lowered = challenge.to_lowercase();
    lowered.contains("resource_metadata=")
        || lowered.contains("invalid_token")
        || lowered.contains("oauth")
}

/// Scheme + host (+ port) of a URL, no path
fn origin_of(url: &str) -> Result<String> {
    let parsed = Url::parse(url)
        .map_err(|e| GatewayError::validation(format!("Invalid URL '{}': {}", url, e)))?;
    let origin = parsed.origin();
    Ok(origin.ascii_serialization())
}

/// Candidate Protected Resource Metadata URLs for a connection URL, in
/// probe order
fn prm_candidates(connection_url: &str) -> Result<Vec<String>> {
    let parsed = Url::parse(connection_url)
        .map_err(|e| GatewayError::validation(format!("Invalid URL '{}': {}", connection_url, e)))?;
    let origin = parsed.origin().ascii_serialization();
    let path = parsed.path().trim_end_matches('/');

    let mut candidates = Vec::new();
    if !path.is_empty() {
        // RFC 9728, resource-relative
        candidates.push(format!(
            "{}{}/.well-known/oauth-protected-resource",
            origin, path
        ));
        // Well-known-prefix variant used by some vendors
        candidates.push(format!(
            "{}/.well-known/oauth-protected-resource{}",
            origin, path
        ));
    }
    // Bare root fallback
    candidates.push(format!("{}/.well-known/oauth-protected-resource", origin));
    candidates.dedup();
    Ok(candidates)
}

/// Candidate Authorization Server Metadata URLs, in probe order
fn auth_server_candidates(auth_server_url: &str) -> Result<Vec<String>> {
    let parsed = Url::parse(auth_server_url).map_err(|e| {
        GatewayError::validation(format!("Invalid URL '{}': {}", auth_server_url, e))
    })?;
    let origin = parsed.origin().ascii_serialization();
    let path = parsed.path().trim_end_matches('/');

    let candidates = if path.is_empty() {
        vec![
            format!("{}/.well-known/oauth-authorization-server", origin),
            format!("{}/.well-known/openid-configuration", origin),
        ]
    } else {
        vec![
            format!("{}/.well-known/oauth-authorization-server{}", origin, path),
            format!("{}/.well-known/openid-configuration{}", origin, path),
            format!("{}{}/.well-known/openid-configuration", origin, path),
        ]
    };
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prm_candidates_with_path() {
        let candidates = prm_candidates("https://o.example.com/mcp").unwrap();
        assert_eq!(
            candidates,
            vec![
                "https://o.example.com/mcp/.well-known/oauth-protected-resource",
                "https://o.example.com/.well-known/oauth-protected-resource/mcp",
                "https://o.example.com/.well-known/oauth-protected-resource",
            ]
        );
    }

    #[test]
    fn test_prm_candidates_trailing_slash_stripped() {
        let candidates = prm_candidates("https://o.example.com/mcp/").unwrap();
        assert_eq!(
            candidates[0],
            "https://o.example.com/mcp/.well-known/oauth-protected-resource"
        );
    }

    #[test]
    fn test_prm_candidates_root_only() {
        let candidates = prm_candidates("https://o.example.com/").unwrap();
        assert_eq!(
            candidates,
            vec!["https://o.example.com/.well-known/oauth-protected-resource"]
        );
    }

    #[test]
    fn test_auth_server_candidates_root() {
        let candidates = auth_server_candidates("https://as.example.com").unwrap();
        assert_eq!(
            candidates,
            vec![
                "https://as.example.com/.well-known/oauth-authorization-server",
                "https://as.example.com/.well-known/openid-configuration",
            ]
        );
    }

    #[test]
    fn test_auth_server_candidates_with_path() {
        let candidates = auth_server_candidates("https://as.example.com/tenant1").unwrap();
        assert_eq!(
            candidates,
            vec![
                "https://as.example.com/.well-known/oauth-authorization-server/tenant1",
                "https://as.example.com/.well-known/openid-configuration/tenant1",
                "https://as.example.com/tenant1/.well-known/openid-configuration",
            ]
        );
    }

    #[test]
    fn test_oauth_shaped_challenge_heuristic() {
        assert!(is_oauth_shaped(
            "Bearer resource_metadata=\"https://o/.well-known/oauth-protected-resource\""
        ));
        assert!(is_oauth_shaped("Bearer error=\"invalid_token\""));
        assert!(is_oauth_shaped("Bearer realm=\"OAuth\""));
        assert!(!is_oauth_shaped("Bearer realm=\"api\""));
        assert!(!is_oauth_shaped(""));
    }

    #[test]
    fn test_rewrite_prm_preserves_other_fields() {
        let proxy = OAuthDiscoveryProxy::new("https://g".to_string(), 10).unwrap();
        let mut doc = serde_json::json!({
            "resource": "https://o/mcp",
            "authorization_servers": ["https://o"],
            "scopes_supported": ["read", "write"],
        });
        proxy.rewrite_prm(&mut doc, "c1");
        assert_eq!(doc["resource"], "https://g/mcp/c1");
        assert_eq!(
            doc["authorization_servers"],
            serde_json::json!(["https://g/oauth-proxy/c1"])
        );
        assert_eq!(doc["scopes_supported"], serde_json::json!(["read", "write"]));
    }

    #[test]
    fn test_gateway_urls() {
        let proxy = OAuthDiscoveryProxy::new("https://g/".to_string(), 10).unwrap();
        assert_eq!(proxy.gateway_resource_url("c1"), "https://g/mcp/c1");
        assert_eq!(proxy.gateway_auth_server_url("c1"), "https://g/oauth-proxy/c1");
    }
}
