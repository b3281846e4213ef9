//! Error types and handling for the mesh gateway

mod error;

pub use error::{GatewayError, Result};
