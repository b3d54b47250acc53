use rmcp::ErrorData;
use serde_json::json;

/// Failures a tool call can end with. None of the messages carry credentials.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid arguments: {0}")]
    Validation(String),

    #[error("connection '{0}' not found")]
    UnknownConnection(String),

    #[error("no connection name given and no connection named 'default' is configured")]
    NoDefaultConnection,

    #[error("no SQL warehouse available; pass warehouse_id or create a warehouse")]
    NoWarehouseAvailable,

    #[error("Databricks request failed: {0}")]
    Remote(String),
}

impl ToolError {
    pub fn remote(error: impl std::fmt::Display) -> Self {
        Self::Remote(format!("{:#}", error))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "ConfigError",
            Self::Validation(_) => "ValidationError",
            Self::UnknownConnection(_) => "UnknownConnection",
            Self::NoDefaultConnection => "NoDefaultConnection",
            Self::NoWarehouseAvailable => "NoWarehouseAvailable",
            Self::Remote(_) => "RemoteOperationError",
        }
    }
}

impl From<ToolError> for ErrorData {
    fn from(error: ToolError) -> Self {
        let data = Some(json!({ "kind": error.kind() }));
        match error {
            ToolError::Validation(_)
            | ToolError::UnknownConnection(_)
            | ToolError::NoDefaultConnection => ErrorData::invalid_params(error.to_string(), data),
            ToolError::Config(_) | ToolError::NoWarehouseAvailable | ToolError::Remote(_) => {
                ErrorData::internal_error(error.to_string(), data)
            }
        }
    }
}
