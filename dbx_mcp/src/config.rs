use crate::error::ToolError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming the credential file, read by the `--config` flag.
pub const CONFIG_ENV_VAR: &str = "DBX_MCP_CONFIG";
/// Credential file picked up from the working directory.
pub const LOCAL_CONNECTIONS_FILE: &str = "databricks_connections.json";
pub const HOST_ENV_VAR: &str = "DATABRICKS_HOST";
pub const TOKEN_ENV_VAR: &str = "DATABRICKS_TOKEN";

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionEntry {
    pub host: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
struct RawCredentialsFile {
    connections: serde_json::Map<String, serde_json::Value>,
}

/// Parsed `{"connections": {"<name>": {"host": ..., "token": ...}}}` document,
/// entries kept in file order.
#[derive(Debug, Clone, Default)]
pub struct CredentialsFile {
    pub connections: Vec<(String, ConnectionEntry)>,
}

impl CredentialsFile {
    pub fn read(path: &Path) -> Result<Self, ToolError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ToolError::Config(format!(
                "failed to read credential file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&contents).map_err(|e| match e {
            ToolError::Config(msg) => ToolError::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    pub fn parse(contents: &str) -> Result<Self, ToolError> {
        let raw: RawCredentialsFile = serde_json::from_str(contents)
            .map_err(|e| ToolError::Config(format!("malformed credential file: {}", e)))?;

        let mut connections = Vec::with_capacity(raw.connections.len());
        for (name, value) in raw.connections {
            let entry: ConnectionEntry = serde_json::from_value(value)
                .map_err(|e| ToolError::Config(format!("connection '{}': {}", name, e)))?;
            if entry.host.is_empty() {
                return Err(ToolError::Config(format!(
                    "connection '{}': host is empty",
                    name
                )));
            }
            if entry.token.is_empty() {
                return Err(ToolError::Config(format!(
                    "connection '{}': token is empty",
                    name
                )));
            }
            connections.push((name, entry));
        }

        Ok(Self { connections })
    }
}

/// Where the registry gets hydrated from at startup.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    File(PathBuf),
    Environment { host: String, token: String },
}

impl ConfigSource {
    /// An explicit path always wins and must exist. Otherwise the first existing
    /// default location is used, then `DATABRICKS_HOST`/`DATABRICKS_TOKEN`.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ToolError> {
        Self::discover_from(explicit, &default_locations(), |key| {
            std::env::var(key).ok()
        })
    }

    pub fn discover_from(
        explicit: Option<&Path>,
        candidates: &[PathBuf],
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ToolError> {
        if let Some(path) = explicit {
            if !path.is_file() {
                return Err(ToolError::Config(format!(
                    "credential file {} does not exist",
                    path.display()
                )));
            }
            return Ok(Self::File(path.to_path_buf()));
        }

        if let Some(path) = candidates.iter().find(|p| p.is_file()) {
            return Ok(Self::File(path.clone()));
        }

        let host = env(HOST_ENV_VAR).filter(|v| !v.trim().is_empty());
        let token = env(TOKEN_ENV_VAR).filter(|v| !v.trim().is_empty());
        if let (Some(host), Some(token)) = (host, token) {
            return Ok(Self::Environment { host, token });
        }

        let searched = candidates
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Err(ToolError::Config(format!(
            "no credential file found (searched: {}) and {}/{} are not set",
            searched, HOST_ENV_VAR, TOKEN_ENV_VAR
        )))
    }

    pub fn describe(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Environment { .. } => format!("{}/{}", HOST_ENV_VAR, TOKEN_ENV_VAR),
        }
    }
}

pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".dbx_mcp"))
}

fn default_locations() -> Vec<PathBuf> {
    let mut locations = vec![PathBuf::from(LOCAL_CONNECTIONS_FILE)];
    if let Some(dir) = config_dir() {
        locations.push(dir.join("connections.json"));
    }
    locations
}
