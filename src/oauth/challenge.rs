//! Auth-error classification and challenge construction
//!
//! Many origins do not implement RFC 9728 at all, so the only signal for
//! "this needs OAuth" vs "this needs a static bearer token" is the shape of
//! a 401. The classification here is a substring heuristic carried over from
//! observed origin behavior; ambiguous cases fall to the non-OAuth branch.

use crate::error::GatewayError;

/// Result of translating a downstream auth failure into a gateway response
///
/// `www_authenticate: Some(..)` means the origin speaks OAuth and the client
/// should start the flow through the gateway's metadata endpoint; `None`
/// means a plain 401 with no challenge header, which deliberately tells
/// OAuth-capable clients not to attempt the flow.
#[derive(Debug, Clone)]
pub struct AuthChallenge {
    /// Challenge header value, when the origin is OAuth-capable
    pub www_authenticate: Option<String>,
    /// Human-readable failure message
    pub message: String,
}

/// Is this downstream failure an authentication failure?
///
/// Matches a 401-coded error or messages carrying the usual markers.
pub fn is_auth_error(error: &GatewayError) -> bool {
    if matches!(error, GatewayError::Auth { .. }) {
        return true;
    }
    let message = error.to_string().to_lowercase();
    message.contains("401")
        || message.contains("unauthorized")
        || message.contains("invalid_token")
        || message.contains("api key")
        || message.contains("api-key")
}

/// Build the gateway-scoped OAuth challenge header for a connection
pub fn challenge_header(gateway_origin: &str, connection_id: &str) -> String {
    format!(
        "Bearer realm=\"mcp\",resource_metadata=\"{}/mcp/{}/.well-known/oauth-protected-resource\"",
        gateway_origin.trim_end_matches('/'),
        connection_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_variant_is_auth_error() {
        assert!(is_auth_error(&GatewayError::auth("credentials rejected")));
    }

    #[test]
    fn test_message_markers_classify_as_auth() {
        assert!(is_auth_error(&GatewayError::connection(
            "HTTP 401 error from connection c1"
        )));
        assert!(is_auth_error(&GatewayError::mcp("Unauthorized")));
        assert!(is_auth_error(&GatewayError::mcp(
            "error=\"invalid_token\" from origin"
        )));
        assert!(is_auth_error(&GatewayError::mcp("An API key is required")));
    }

    #[test]
    fn test_non_auth_errors_not_handled() {
        assert!(!is_auth_error(&GatewayError::connection("connection reset")));
        assert!(!is_auth_error(&GatewayError::mcp("tools/list malformed")));
    }

    #[test]
    fn test_challenge_header_shape() {
        let header = challenge_header("https://g/", "c1");
        assert_eq!(
            header,
            "Bearer realm=\"mcp\",resource_metadata=\"https://g/mcp/c1/.well-known/oauth-protected-resource\""
        );
    }
}
