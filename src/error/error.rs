//! Error types and handling for the mesh gateway

use thiserror::Error;

/// Result type alias for mesh gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Main error type for the mesh gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Unknown gateway/connection id, or no default gateway for an org
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// Gateway or connection exists but is disabled
    #[error("Inactive: {message}")]
    Inactive { message: String },

    /// MCP protocol errors
    #[error("MCP protocol error: {message}")]
    Mcp { message: String },

    /// Routing errors
    #[error("Routing error: {message}")]
    Routing { message: String },

    /// Authentication errors
    #[error("Authentication error: {message}")]
    Auth { message: String },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Connection errors (downstream MCP client connections)
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// Upstream discovery errors (origin well-known endpoint failed hard)
    #[error("Upstream discovery error ({status}): {message}")]
    Discovery { status: u16, message: String },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP client errors
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic errors
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl GatewayError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create an inactive error
    pub fn inactive<S: Into<String>>(message: S) -> Self {
        Self::Inactive {
            message: message.into(),
        }
    }

    /// Create an MCP protocol error
    pub fn mcp<S: Into<String>>(message: S) -> Self {
        Self::Mcp {
            message: message.into(),
        }
    }

    /// Create a routing error
    pub fn routing<S: Into<String>>(message: S) -> Self {
        Self::Routing {
            message: message.into(),
        }
    }

    /// Create an authentication error
    pub fn auth<S: Into<String>>(message: S) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a connection error
    pub fn connection<S: Into<String>>(message: S) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a timeout error (using connection error type)
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Connection {
            message: format!("Timeout: {}", message.into()),
        }
    }

    /// Create an upstream discovery error
    pub fn discovery<S: Into<String>>(status: u16, message: S) -> Self {
        Self::Discovery {
            status,
            message: message.into(),
        }
    }

    /// HTTP status code this error maps to at the gateway boundary
    pub fn http_status(&self) -> u16 {
        match self {
            GatewayError::NotFound { .. } => 404,
            GatewayError::Inactive { .. } => 503,
            GatewayError::Auth { .. } => 401,
            GatewayError::Validation { .. } => 400,
            GatewayError::Discovery { .. } => 502,
            GatewayError::Connection { .. } | GatewayError::Http(_) => 502,
            _ => 500,
        }
    }

    /// Get the error category for logging/metrics
    pub fn category(&self) -> &'static str {
        match self {
            GatewayError::Config { .. } => "config",
            GatewayError::NotFound { .. } => "not_found",
            GatewayError::Inactive { .. } => "inactive",
            GatewayError::Mcp { .. } => "mcp",
            GatewayError::Routing { .. } => "routing",
            GatewayError::Auth { .. } => "auth",
            GatewayError::Validation { .. } => "validation",
            GatewayError::Connection { .. } => "connection",
            GatewayError::Discovery { .. } => "discovery",
            GatewayError::Io(_) => "io",
            GatewayError::Serde(_) => "serialization",
            GatewayError::Yaml(_) => "yaml",
            GatewayError::Http(_) => "http",
            GatewayError::Internal(_) => "internal",
        }
    }
}

impl Clone for GatewayError {
    fn clone(&self) -> Self {
        match self {
            GatewayError::Config { message } => GatewayError::Config { message: message.clone() },
            GatewayError::NotFound { message } => GatewayError::NotFound { message: message.clone() },
            GatewayError::Inactive { message } => GatewayError::Inactive { message: message.clone() },
            GatewayError::Mcp { message } => GatewayError::Mcp { message: message.clone() },
            GatewayError::Routing { message } => GatewayError::Routing { message: message.clone() },
            GatewayError::Auth { message } => GatewayError::Auth { message: message.clone() },
            GatewayError::Validation { message } => GatewayError::Validation { message: message.clone() },
            GatewayError::Connection { message } => GatewayError::Connection { message: message.clone() },
            GatewayError::Discovery { status, message } => GatewayError::Discovery {
                status: *status,
                message: message.clone(),
            },

            // For non-cloneable types, convert to string representation
            GatewayError::Io(e) => GatewayError::connection(format!("IO error: {}", e)),
            GatewayError::Serde(e) => GatewayError::mcp(format!("Serialization error: {}", e)),
            GatewayError::Yaml(e) => GatewayError::config(format!("YAML error: {}", e)),
            GatewayError::Http(e) => GatewayError::connection(format!("HTTP error: {}", e)),
            GatewayError::Internal(e) => GatewayError::routing(format!("Internal error: {}", e)),
        }
    }
}
