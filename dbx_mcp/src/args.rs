//! Argument structs for every tool. Each field documents itself in the JSON
//! schema the MCP client sees.

use dbx_integrations::NotebookLanguage;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

fn default_root_path() -> String {
    "/".to_string()
}

fn default_catalog() -> String {
    "main".to_string()
}

fn default_schema() -> String {
    "default".to_string()
}

fn default_overwrite() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct AddConnectionArgs {
    /// Name for the connection (case-sensitive). Use "default" to make it the default connection.
    pub name: String,
    /// Databricks workspace URL, e.g. https://adb-123.azuredatabricks.net
    pub host: String,
    /// Databricks personal access token
    pub token: String,
}

/// Notebook source language accepted by the workspace import API. Parsed
/// case-insensitively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Language {
    #[default]
    Python,
    Sql,
    Scala,
    R,
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PYTHON" => Ok(Self::Python),
            "SQL" => Ok(Self::Sql),
            "SCALA" => Ok(Self::Scala),
            "R" => Ok(Self::R),
            _ => Err(format!(
                "unknown language '{}', expected one of PYTHON, SQL, SCALA, R",
                s
            )),
        }
    }
}

impl<'de> Deserialize<'de> for Language {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl From<Language> for NotebookLanguage {
    fn from(language: Language) -> Self {
        match language {
            Language::Python => NotebookLanguage::Python,
            Language::Sql => NotebookLanguage::Sql,
            Language::Scala => NotebookLanguage::Scala,
            Language::R => NotebookLanguage::R,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct CreateNotebookArgs {
    /// Absolute workspace path of the notebook, e.g. /Users/me@example.com/analysis
    pub path: String,
    /// Notebook language: PYTHON, SQL, SCALA or R (default PYTHON)
    #[serde(default)]
    pub language: Language,
    /// Initial notebook source (default empty)
    #[serde(default)]
    pub content: String,
    /// Replace an existing notebook at the same path (default true)
    #[serde(default = "default_overwrite")]
    pub overwrite: bool,
    /// Name of the Databricks connection to use (defaults to "default")
    #[serde(default)]
    pub connection_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct ListNotebooksArgs {
    /// Workspace directory to list (default "/")
    #[serde(default = "default_root_path")]
    pub path: String,
    /// Name of the Databricks connection to use (defaults to "default")
    #[serde(default)]
    pub connection_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct GetNotebookArgs {
    /// Workspace path of the notebook
    pub path: String,
    /// Name of the Databricks connection to use (defaults to "default")
    #[serde(default)]
    pub connection_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct ConnectionArgs {
    /// Name of the Databricks connection to use (defaults to "default")
    #[serde(default)]
    pub connection_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct ListSchemasArgs {
    /// Catalog to list schemas from (default "main")
    #[serde(default = "default_catalog")]
    pub catalog_name: String,
    /// Name of the Databricks connection to use (defaults to "default")
    #[serde(default)]
    pub connection_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct ListTablesArgs {
    /// Catalog name (default "main")
    #[serde(default = "default_catalog")]
    pub catalog_name: String,
    /// Schema name (default "default")
    #[serde(default = "default_schema")]
    pub schema_name: String,
    /// Name of the Databricks connection to use (defaults to "default")
    #[serde(default)]
    pub connection_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct GetTableInfoArgs {
    /// Table name, or a fully qualified catalog.schema.table name
    pub table_name: String,
    /// Catalog name (default "main"), ignored for fully qualified names
    #[serde(default = "default_catalog")]
    pub catalog_name: String,
    /// Schema name (default "default"), ignored for fully qualified names
    #[serde(default = "default_schema")]
    pub schema_name: String,
    /// Name of the Databricks connection to use (defaults to "default")
    #[serde(default)]
    pub connection_name: Option<String>,
}

impl GetTableInfoArgs {
    pub fn full_name(&self) -> String {
        if self.table_name.split('.').count() == 3 {
            self.table_name.clone()
        } else {
            format!("{}.{}.{}", self.catalog_name, self.schema_name, self.table_name)
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct ExecuteSqlArgs {
    /// A single SQL statement
    pub query: String,
    /// SQL warehouse ID; when omitted the first running warehouse is used
    #[serde(default)]
    pub warehouse_id: Option<String>,
    /// Default catalog for unqualified names in the statement
    #[serde(default)]
    pub catalog: Option<String>,
    /// Default schema for unqualified names in the statement
    #[serde(default)]
    pub schema: Option<String>,
    /// Name of the Databricks connection to use (defaults to "default")
    #[serde(default)]
    pub connection_name: Option<String>,
}
