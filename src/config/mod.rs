//! Configuration module for the mesh gateway
//!
//! This module provides configuration management and loading utilities.

mod config;

// Re-export the main configuration types
pub use config::{Config, DirectoryConfig, LoggingConfig, McpClientConfig, ServerConfig};
