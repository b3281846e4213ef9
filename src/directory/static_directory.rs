//! YAML-file-backed connection directory
//!
//! Loads connections and gateways from a single YAML document at startup.
//! Auth material supports `${VAR}` environment expansion so tokens stay out
//! of the file.

use crate::directory::{
    Connection, ConnectionAuth, ConnectionDirectory, EntityStatus, Gateway,
};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// On-disk directory document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DirectoryFile {
    #[serde(default)]
    connections: Vec<Connection>,
    #[serde(default)]
    gateways: Vec<Gateway>,
}

/// In-memory directory loaded from a YAML file
#[derive(Debug, Clone)]
pub struct StaticDirectory {
    connections: HashMap<String, Connection>,
    gateways: HashMap<String, Gateway>,
}

impl StaticDirectory {
    /// Load a directory from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::config(format!(
                "Failed to read directory file {}: {}",
                path.display(),
                e
            ))
        })?;
        let file: DirectoryFile = serde_yaml::from_str(&content).map_err(|e| {
            GatewayError::config(format!(
                "Failed to parse directory file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_records(file.connections, file.gateways)
    }

    /// Build a directory from already-parsed records
    pub fn from_records(connections: Vec<Connection>, gateways: Vec<Gateway>) -> Result<Self> {
        let mut connection_map = HashMap::new();
        for mut connection in connections {
            if connection.url.is_empty() {
                return Err(GatewayError::config(format!(
                    "Connection '{}' has an empty url",
                    connection.id
                )));
            }
            connection.auth = expand_auth(connection.auth);
            if connection_map
                .insert(connection.id.clone(), connection)
                .is_some()
            {
                return Err(GatewayError::config("Duplicate connection id in directory"));
            }
        }

        let mut gateway_map = HashMap::new();
        for gateway in gateways {
            for member in &gateway.connections {
                if !connection_map.contains_key(&member.connection_id) {
                    return Err(GatewayError::config(format!(
                        "Gateway '{}' references unknown connection '{}'",
                        gateway.id, member.connection_id
                    )));
                }
            }
            if gateway_map.insert(gateway.id.clone(), gateway).is_some() {
                return Err(GatewayError::config("Duplicate gateway id in directory"));
            }
        }

        info!(
            "Loaded directory: {} connections, {} gateways",
            connection_map.len(),
            gateway_map.len()
        );

        Ok(Self {
            connections: connection_map,
            gateways: gateway_map,
        })
    }
}

/// Expand `${VAR}` references in auth material from the environment
fn expand_auth(auth: ConnectionAuth) -> ConnectionAuth {
    let expand = |value: String| shellexpand::env(&value).map(|v| v.into_owned()).unwrap_or(value);
    match auth {
        ConnectionAuth::None => ConnectionAuth::None,
        ConnectionAuth::Bearer { token } => ConnectionAuth::Bearer {
            token: expand(token),
        },
        ConnectionAuth::ApiKey { header, key } => ConnectionAuth::ApiKey {
            header,
            key: expand(key),
        },
        ConnectionAuth::Basic { username, password } => ConnectionAuth::Basic {
            username: expand(username),
            password: expand(password),
        },
    }
}

#[async_trait]
impl ConnectionDirectory for StaticDirectory {
    async fn find_gateway_by_id(&self, id: &str) -> Result<Gateway> {
        self.gateways
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::not_found(format!("Gateway '{}' not found", id)))
    }

    async fn find_default_gateway(
        &self,
        org_id: Option<&str>,
        org_slug: Option<&str>,
    ) -> Result<Gateway> {
        let org = org_id
            .or(org_slug)
            .ok_or_else(|| GatewayError::not_found("No organization header provided"))?;

        self.gateways
            .values()
            .find(|g| g.organization_id == org && g.default)
            .cloned()
            .ok_or_else(|| {
                GatewayError::not_found(format!("No default gateway for organization '{}'", org))
            })
    }

    async fn list_active_org_connections(&self, organization_id: &str) -> Result<Vec<Connection>> {
        let mut connections: Vec<Connection> = self
            .connections
            .values()
            .filter(|c| c.organization_id == organization_id && c.status == EntityStatus::Active)
            .cloned()
            .collect();
        // Deterministic resolution order for first-occurrence-wins dedup
        connections.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(connections)
    }

    async fn find_connection_by_id(&self, id: &str) -> Result<Connection> {
        self.connections
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::not_found(format!("Connection '{}' not found", id)))
    }
}
