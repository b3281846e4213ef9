//! OAuth discovery proxy
//!
//! Fetches, normalizes, and rewrites RFC 9728 Protected Resource Metadata and
//! RFC 8414 / OIDC Discovery Authorization Server Metadata from origin MCP
//! servers so that clients only ever talk to the gateway, plus the 401
//! translation that distinguishes "this origin speaks OAuth" from "this
//! origin wants a static credential".

mod challenge;
mod discovery;

pub use challenge::{challenge_header, is_auth_error, AuthChallenge};
pub use discovery::OAuthDiscoveryProxy;
