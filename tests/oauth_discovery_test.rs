//! Tests for the OAuth discovery proxy against mock origins
//!
//! Covers the Protected Resource Metadata candidate chain (including the 406
//! no-metadata status and the hard-error short-circuit), metadata synthesis
//! from an OAuth-shaped 401 challenge, Authorization Server Metadata
//! discovery, and the authorize redirect rewrite.

use meshgate::directory::{Connection, ConnectionAuth, EntityStatus};
use meshgate::error::GatewayError;
use meshgate::oauth::OAuthDiscoveryProxy;
use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GATEWAY_ORIGIN: &str = "https://gateway.example.com";

fn proxy() -> OAuthDiscoveryProxy {
    OAuthDiscoveryProxy::new(GATEWAY_ORIGIN.to_string(), 5).unwrap()
}

fn connection(id: &str, origin: &str) -> Connection {
    Connection {
        id: id.to_string(),
        organization_id: "org".to_string(),
        url: format!("{}/mcp", origin),
        title: None,
        auth: ConnectionAuth::None,
        status: EntityStatus::Active,
    }
}

#[tokio::test]
async fn test_prm_found_resource_relative_and_rewritten() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/mcp/.well-known/oauth-protected-resource"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resource": format!("{}/mcp", server.uri()),
            "authorization_servers": [server.uri()],
            "scopes_supported": ["read", "write"],
        })))
        .mount(&server)
        .await;

    let doc = proxy()
        .protected_resource_metadata(&connection("c1", &server.uri()))
        .await
        .unwrap();

    assert_eq!(doc["resource"], format!("{}/mcp/c1", GATEWAY_ORIGIN));
    assert_eq!(
        doc["authorization_servers"],
        json!([format!("{}/oauth-proxy/c1", GATEWAY_ORIGIN)])
    );
    // Fields the gateway does not own pass through untouched
    assert_eq!(doc["scopes_supported"], json!(["read", "write"]));
}

#[tokio::test]
async fn test_prm_falls_back_to_well_known_prefix_layout() {
    let server = MockServer::start().await;
    // First candidate (resource-relative) 404s by default; the prefix
    // variant answers.
    Mock::given(method("GET"))
        .and(path("/.well-known/oauth-protected-resource/mcp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resource": format!("{}/mcp", server.uri()),
            "authorization_servers": [server.uri()],
        })))
        .mount(&server)
        .await;

    let doc = proxy()
        .protected_resource_metadata(&connection("c1", &server.uri()))
        .await
        .unwrap();
    assert_eq!(doc["resource"], format!("{}/mcp/c1", GATEWAY_ORIGIN));
}

#[tokio::test]
async fn test_prm_treats_406_as_no_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/mcp/.well-known/oauth-protected-resource"))
        .respond_with(ResponseTemplate::new(406))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/.well-known/oauth-protected-resource/mcp"))
        .respond_with(ResponseTemplate::new(406))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/.well-known/oauth-protected-resource"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resource": server.uri(),
            "authorization_servers": [server.uri()],
        })))
        .mount(&server)
        .await;

    let doc = proxy()
        .protected_resource_metadata(&connection("c1", &server.uri()))
        .await
        .unwrap();
    assert_eq!(doc["resource"], format!("{}/mcp/c1", GATEWAY_ORIGIN));
}

#[tokio::test]
async fn test_prm_hard_error_short_circuits_chain() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/mcp/.well-known/oauth-protected-resource"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    // Later candidates must never be tried after a hard error.
    Mock::given(method("GET"))
        .and(path("/.well-known/oauth-protected-resource/mcp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let err = proxy()
        .fetch_origin_prm(&connection("c1", &server.uri()))
        .await
        .unwrap_err();
    match err {
        GatewayError::Discovery { status, .. } => assert_eq!(status, 500),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_prm_synthesized_from_oauth_shaped_challenge() {
    let server = MockServer::start().await;
    // No metadata anywhere, but the MCP endpoint demands OAuth.
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .respond_with(ResponseTemplate::new(401).insert_header(
            "www-authenticate",
            "Bearer error=\"invalid_token\", resource_metadata=\"https://o/.well-known/oauth-protected-resource\"",
        ))
        .mount(&server)
        .await;

    let doc = proxy()
        .protected_resource_metadata(&connection("c1", &server.uri()))
        .await
        .unwrap();

    assert_eq!(doc["resource"], format!("{}/mcp/c1", GATEWAY_ORIGIN));
    assert_eq!(
        doc["authorization_servers"],
        json!([format!("{}/oauth-proxy/c1", GATEWAY_ORIGIN)])
    );
    assert_eq!(doc["bearer_methods_supported"], json!(["header"]));
    assert_eq!(doc["scopes_supported"], json!(["*"]));
}

#[tokio::test]
async fn test_prm_missing_without_oauth_challenge_propagates() {
    let server = MockServer::start().await;
    // The endpoint wants credentials but not OAuth ones.
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .respond_with(ResponseTemplate::new(401).insert_header("www-authenticate", "Bearer realm=\"api\""))
        .mount(&server)
        .await;

    let err = proxy()
        .protected_resource_metadata(&connection("c1", &server.uri()))
        .await
        .unwrap_err();
    match err {
        GatewayError::Discovery { status, .. } => assert_eq!(status, 404),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_as_metadata_follows_prm_authorization_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/mcp/.well-known/oauth-protected-resource"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resource": format!("{}/mcp", server.uri()),
            "authorization_servers": [format!("{}/tenant1", server.uri())],
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/.well-known/oauth-authorization-server/tenant1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issuer": format!("{}/tenant1", server.uri()),
            "authorization_endpoint": format!("{}/tenant1/authorize", server.uri()),
            "token_endpoint": format!("{}/tenant1/token", server.uri()),
            "response_types_supported": ["code"],
        })))
        .mount(&server)
        .await;

    let doc = proxy()
        .authorization_server_metadata(&connection("c1", &server.uri()))
        .await
        .unwrap();

    assert_eq!(
        doc["authorization_endpoint"],
        format!("{}/oauth-proxy/c1/authorize", GATEWAY_ORIGIN)
    );
    assert_eq!(
        doc["token_endpoint"],
        format!("{}/oauth-proxy/c1/token", GATEWAY_ORIGIN)
    );
    // The origin published no registration endpoint, so none is invented
    assert!(doc.get("registration_endpoint").is_none());
    assert_eq!(doc["issuer"], format!("{}/tenant1", server.uri()));
    assert_eq!(doc["response_types_supported"], json!(["code"]));
}

#[tokio::test]
async fn test_as_metadata_falls_back_to_origin_openid_configuration() {
    let server = MockServer::start().await;
    // No PRM at all; the AS metadata chain falls back to the connection
    // origin, where only the OIDC layout answers.
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issuer": server.uri(),
            "authorization_endpoint": format!("{}/authorize", server.uri()),
            "token_endpoint": format!("{}/token", server.uri()),
            "registration_endpoint": format!("{}/register", server.uri()),
        })))
        .mount(&server)
        .await;

    let doc = proxy()
        .authorization_server_metadata(&connection("c1", &server.uri()))
        .await
        .unwrap();

    assert_eq!(
        doc["authorization_endpoint"],
        format!("{}/oauth-proxy/c1/authorize", GATEWAY_ORIGIN)
    );
    assert_eq!(
        doc["registration_endpoint"],
        format!("{}/oauth-proxy/c1/register", GATEWAY_ORIGIN)
    );
}

#[tokio::test]
async fn test_authorize_redirect_rewrites_resource_to_origin() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issuer": server.uri(),
            "authorization_endpoint": format!("{}/authorize", server.uri()),
            "token_endpoint": format!("{}/token", server.uri()),
        })))
        .mount(&server)
        .await;

    let conn = connection("c1", &server.uri());
    let query = vec![
        ("client_id".to_string(), "abc".to_string()),
        ("state".to_string(), "xyz".to_string()),
        (
            "resource".to_string(),
            format!("{}/mcp/c1", GATEWAY_ORIGIN),
        ),
    ];

    let redirect = proxy().authorize_redirect_url(&conn, &query).await.unwrap();

    let parsed = Url::parse(&redirect).unwrap();
    assert_eq!(parsed.path(), "/authorize");
    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    assert!(pairs.contains(&("client_id".to_string(), "abc".to_string())));
    assert!(pairs.contains(&("state".to_string(), "xyz".to_string())));
    // resource points back at the real protected resource, not the gateway
    assert!(pairs.contains(&("resource".to_string(), conn.url.clone())));
}

#[tokio::test]
async fn test_probe_origin_challenge_only_on_401() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jsonrpc": "2.0"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/denied"))
        .respond_with(ResponseTemplate::new(401).insert_header("www-authenticate", "Bearer realm=\"OAuth\""))
        .mount(&server)
        .await;

    let p = proxy();
    assert!(p
        .probe_origin_challenge(&format!("{}/ok", server.uri()))
        .await
        .is_none());
    assert_eq!(
        p.probe_origin_challenge(&format!("{}/denied", server.uri()))
            .await
            .as_deref(),
        Some("Bearer realm=\"OAuth\"")
    );
}

#[tokio::test]
async fn test_translate_auth_error_oauth_branch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .respond_with(ResponseTemplate::new(401).insert_header(
            "www-authenticate",
            "Bearer error=\"invalid_token\"",
        ))
        .mount(&server)
        .await;

    let conn = connection("c1", &server.uri());
    let err = GatewayError::auth("Origin returned 401 Unauthorized");
    let challenge = proxy()
        .translate_auth_error(&conn, &err)
        .await
        .expect("auth error must translate");

    let header = challenge.www_authenticate.expect("OAuth branch carries a challenge");
    assert!(header.contains(&format!(
        "{}/mcp/c1/.well-known/oauth-protected-resource",
        GATEWAY_ORIGIN
    )));
}

#[tokio::test]
async fn test_translate_auth_error_non_oauth_branch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .respond_with(ResponseTemplate::new(401).insert_header("www-authenticate", "Bearer realm=\"api\""))
        .mount(&server)
        .await;

    let conn = connection("c1", &server.uri());
    let err = GatewayError::auth("Origin returned 401 Unauthorized");
    let challenge = proxy()
        .translate_auth_error(&conn, &err)
        .await
        .expect("auth error must translate");

    // Non-OAuth origin: plain 401, no challenge header
    assert!(challenge.www_authenticate.is_none());
}

#[tokio::test]
async fn test_translate_auth_error_ignores_non_auth_errors() {
    let server = MockServer::start().await;
    let conn = connection("c1", &server.uri());
    let err = GatewayError::connection("connection reset by peer");
    assert!(proxy().translate_auth_error(&conn, &err).await.is_none());
}
