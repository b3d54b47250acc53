use crate::args::{
    AddConnectionArgs, ConnectionArgs, CreateNotebookArgs, ExecuteSqlArgs, GetNotebookArgs,
    GetTableInfoArgs, ListNotebooksArgs, ListSchemasArgs, ListTablesArgs,
};
use crate::dispatcher::{RestClientFactory, ToolDispatcher};
use crate::error::ToolError;
use crate::registry::ConnectionRegistry;
use dbx_integrations::ToolResultDisplay;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{ErrorData, ServerHandler, tool, tool_handler, tool_router};
use std::sync::Arc;

pub const SERVER_NAME: &str = "dbx-mcp";

fn text_result<T: ToolResultDisplay>(result: Result<T, ToolError>) -> Result<CallToolResult, ErrorData> {
    match result {
        Ok(result) => Ok(CallToolResult::success(vec![Content::text(result.display())])),
        Err(e) => {
            tracing::warn!(kind = e.kind(), "tool call failed: {}", e);
            Err(e.into())
        }
    }
}

fn message_result(result: Result<String, ToolError>) -> Result<CallToolResult, ErrorData> {
    match result {
        Ok(message) => Ok(CallToolResult::success(vec![Content::text(message)])),
        Err(e) => {
            tracing::warn!(kind = e.kind(), "tool call failed: {}", e);
            Err(e.into())
        }
    }
}

/// MCP surface for the connection registry and workspace operations.
#[derive(Clone)]
pub struct DatabricksProvider {
    dispatcher: Arc<ToolDispatcher<RestClientFactory>>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl DatabricksProvider {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self {
            dispatcher: Arc::new(ToolDispatcher::new(registry, RestClientFactory)),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        name = "list_databricks_connections",
        description = "List configured Databricks connections (name, host and which one is the default). Tokens are never shown."
    )]
    pub async fn list_databricks_connections(&self) -> Result<CallToolResult, ErrorData> {
        let result = self.dispatcher.list_connections().await;
        let structured = serde_json::to_value(&result.connections)
            .map_err(|e| ErrorData::internal_error(e.to_string(), None))?;
        let mut response = CallToolResult::success(vec![Content::text(result.display())]);
        response.structured_content = Some(structured);
        Ok(response)
    }

    #[tool(
        name = "add_databricks_connection",
        description = "Add or replace a named Databricks connection for this session. \
                       The connection named 'default' is used when a tool call omits connection_name. \
                       Connections added here are not persisted."
    )]
    pub async fn add_databricks_connection(
        &self,
        Parameters(args): Parameters<AddConnectionArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        message_result(self.dispatcher.add_connection(args).await)
    }

    #[tool(
        name = "create_notebook",
        description = "Create a notebook in the Databricks workspace from source text. \
                       Language is one of PYTHON, SQL, SCALA or R; existing notebooks are overwritten by default."
    )]
    pub async fn create_notebook(
        &self,
        Parameters(args): Parameters<CreateNotebookArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        message_result(self.dispatcher.create_notebook(args).await)
    }

    #[tool(
        name = "list_notebooks",
        description = "List notebooks, directories and files under a workspace path (default '/')."
    )]
    pub async fn list_notebooks(
        &self,
        Parameters(args): Parameters<ListNotebooksArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        text_result(self.dispatcher.list_notebooks(args).await)
    }

    #[tool(
        name = "get_notebook_content",
        description = "Export a workspace notebook and return its source text."
    )]
    pub async fn get_notebook_content(
        &self,
        Parameters(args): Parameters<GetNotebookArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        message_result(self.dispatcher.get_notebook_content(args).await)
    }

    #[tool(
        name = "list_clusters",
        description = "List clusters in the workspace with their state, node type and worker configuration."
    )]
    pub async fn list_clusters(
        &self,
        Parameters(args): Parameters<ConnectionArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        text_result(self.dispatcher.list_clusters(args).await)
    }

    #[tool(name = "list_catalogs", description = "List Unity Catalog catalogs.")]
    pub async fn list_catalogs(
        &self,
        Parameters(args): Parameters<ConnectionArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        text_result(self.dispatcher.list_catalogs(args).await)
    }

    #[tool(
        name = "list_schemas",
        description = "List schemas in a Unity Catalog catalog (default 'main')."
    )]
    pub async fn list_schemas(
        &self,
        Parameters(args): Parameters<ListSchemasArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        text_result(self.dispatcher.list_schemas(args).await)
    }

    #[tool(
        name = "list_tables",
        description = "List tables in a schema (defaults: catalog 'main', schema 'default')."
    )]
    pub async fn list_tables(
        &self,
        Parameters(args): Parameters<ListTablesArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        text_result(self.dispatcher.list_tables(args).await)
    }

    #[tool(
        name = "get_table_info",
        description = "Describe a table: type, owner, storage and column list. \
                       table_name may be fully qualified as catalog.schema.table."
    )]
    pub async fn get_table_info(
        &self,
        Parameters(args): Parameters<GetTableInfoArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        text_result(self.dispatcher.get_table_info(args).await)
    }

    #[tool(
        name = "execute_sql_query",
        description = "Execute a single SQL statement on a SQL warehouse and return a text table. \
                       When warehouse_id is omitted the first running warehouse is used. \
                       At most 100 rows are returned; larger results are marked as truncated."
    )]
    pub async fn execute_sql_query(
        &self,
        Parameters(args): Parameters<ExecuteSqlArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        text_result(self.dispatcher.execute_sql_query(args).await)
    }

    #[tool(
        name = "list_sql_warehouses",
        description = "List SQL warehouses with their state and size."
    )]
    pub async fn list_sql_warehouses(
        &self,
        Parameters(args): Parameters<ConnectionArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        text_result(self.dispatcher.list_sql_warehouses(args).await)
    }
}

#[tool_handler]
impl ServerHandler for DatabricksProvider {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: Some("Databricks MCP Server".to_string()),
                website_url: None,
                icons: None,
            },
            instructions: Some(
                "Tools for a Databricks workspace: notebooks, clusters, Unity Catalog and SQL warehouses. \
                 Every workspace tool accepts an optional connection_name; without it the connection named \
                 'default' is used. Call list_databricks_connections to see what is configured."
                    .to_string(),
            ),
        }
    }
}
