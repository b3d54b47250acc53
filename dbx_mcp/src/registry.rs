use crate::config::{ConfigSource, CredentialsFile};
use crate::error::ToolError;
use dbx_integrations::ToolResultDisplay;
use serde::Serialize;
use std::path::Path;

/// Name of the connection used when a tool call does not name one.
pub const DEFAULT_CONNECTION: &str = "default";

/// One workspace credential.
#[derive(Clone, PartialEq, Eq)]
pub struct Connection {
    pub name: String,
    pub host: String,
    pub token: String,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Agent-visible view of a connection. Has no token field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionSummary {
    pub name: String,
    pub host: String,
    pub is_default: bool,
}

/// Named credentials in insertion order.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    connections: Vec<Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, ToolError> {
        let file = CredentialsFile::read(path)?;
        let connections = file
            .connections
            .into_iter()
            .map(|(name, entry)| Connection {
                name,
                host: entry.host,
                token: entry.token,
            })
            .collect();
        Ok(Self { connections })
    }

    pub fn from_source(source: &ConfigSource) -> Result<Self, ToolError> {
        match source {
            ConfigSource::File(path) => Self::load(path),
            ConfigSource::Environment { host, token } => {
                let mut registry = Self::new();
                registry.add(DEFAULT_CONNECTION, host, token)?;
                Ok(registry)
            }
        }
    }

    /// Insert or overwrite. Returns true when an existing entry was replaced;
    /// a replaced entry keeps its position.
    pub fn add(&mut self, name: &str, host: &str, token: &str) -> Result<bool, ToolError> {
        if name.is_empty() {
            return Err(ToolError::Validation("name must not be empty".to_string()));
        }
        if host.is_empty() {
            return Err(ToolError::Validation("host must not be empty".to_string()));
        }
        if token.is_empty() {
            return Err(ToolError::Validation("token must not be empty".to_string()));
        }

        let connection = Connection {
            name: name.to_string(),
            host: host.to_string(),
            token: token.to_string(),
        };
        match self.connections.iter_mut().find(|c| c.name == name) {
            Some(existing) => {
                *existing = connection;
                Ok(true)
            }
            None => {
                self.connections.push(connection);
                Ok(false)
            }
        }
    }

    /// A non-empty name must be registered; an empty or absent name means the
    /// connection literally named `default`.
    pub fn resolve(&self, name: Option<&str>) -> Result<&Connection, ToolError> {
        match name.filter(|n| !n.is_empty()) {
            Some(name) => self
                .get(name)
                .ok_or_else(|| ToolError::UnknownConnection(name.to_string())),
            None => self.default_connection().ok_or(ToolError::NoDefaultConnection),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Connection> {
        self.connections.iter().find(|c| c.name == name)
    }

    pub fn default_connection(&self) -> Option<&Connection> {
        self.get(DEFAULT_CONNECTION)
    }

    pub fn list(&self) -> Vec<ConnectionSummary> {
        self.connections
            .iter()
            .map(|c| ConnectionSummary {
                name: c.name.clone(),
                host: c.host.clone(),
                is_default: c.name == DEFAULT_CONNECTION,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ListConnectionsResult {
    pub connections: Vec<ConnectionSummary>,
}

impl ToolResultDisplay for ListConnectionsResult {
    fn display(&self) -> String {
        if self.connections.is_empty() {
            return "No Databricks connections configured.".to_string();
        }

        let mut lines = vec![
            format!("Found {} connections:", self.connections.len()),
            String::new(),
        ];
        for connection in &self.connections {
            let marker = if connection.is_default { " (default)" } else { "" };
            lines.push(format!("• {}{}: {}", connection.name, marker, connection.host));
        }
        lines.join("\n")
    }
}
