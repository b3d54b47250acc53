use crate::results::{MAX_RESULT_ROWS, ResultTable};
use anyhow::{Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

const CLUSTERS_LIST_ENDPOINT: &str = "/api/2.0/clusters/list";
const WORKSPACE_LIST_ENDPOINT: &str = "/api/2.0/workspace/list";
const WORKSPACE_EXPORT_ENDPOINT: &str = "/api/2.0/workspace/export";
const WORKSPACE_IMPORT_ENDPOINT: &str = "/api/2.0/workspace/import";
const SQL_WAREHOUSES_ENDPOINT: &str = "/api/2.0/sql/warehouses";
const SQL_STATEMENTS_ENDPOINT: &str = "/api/2.0/sql/statements";
const UNITY_CATALOG_TABLES_ENDPOINT: &str = "/api/2.1/unity-catalog/tables";
const UNITY_CATALOG_CATALOGS_ENDPOINT: &str = "/api/2.1/unity-catalog/catalogs";
const UNITY_CATALOG_SCHEMAS_ENDPOINT: &str = "/api/2.1/unity-catalog/schemas";
const DEFAULT_WAIT_TIMEOUT: &str = "30s";
const MAX_POLL_ATTEMPTS: usize = 30;
const POLL_INTERVAL: Duration = Duration::from_secs(2);

// ============================================================================
// Domain types returned to callers
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Autoscale {
    pub min_workers: i64,
    pub max_workers: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClusterSummary {
    pub cluster_id: String,
    pub cluster_name: Option<String>,
    pub state: Option<String>,
    pub node_type_id: Option<String>,
    pub driver_node_type_id: Option<String>,
    pub num_workers: Option<i64>,
    pub autoscale: Option<Autoscale>,
    pub spark_version: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogSummary {
    pub name: String,
    pub full_name: Option<String>,
    pub catalog_type: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchemaSummary {
    pub name: String,
    pub catalog_name: Option<String>,
    pub full_name: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TableSummary {
    pub name: String,
    pub catalog_name: String,
    pub schema_name: String,
    pub table_type: Option<String>,
    pub comment: Option<String>,
}

impl TableSummary {
    pub fn full_name(&self) -> String {
        format!("{}.{}.{}", self.catalog_name, self.schema_name, self.name)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ColumnMetadata {
    pub name: String,
    pub type_name: Option<String>,
    pub type_text: Option<String>,
    pub comment: Option<String>,
    pub nullable: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TableDetails {
    pub name: String,
    pub catalog_name: Option<String>,
    pub schema_name: Option<String>,
    pub full_name: Option<String>,
    pub table_type: Option<String>,
    pub owner: Option<String>,
    pub comment: Option<String>,
    pub storage_location: Option<String>,
    pub data_source_format: Option<String>,
    #[serde(default)]
    pub columns: Vec<ColumnMetadata>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WarehouseSummary {
    pub id: String,
    pub name: Option<String>,
    pub state: Option<String>,
    pub cluster_size: Option<String>,
    pub num_clusters: Option<i64>,
}

impl WarehouseSummary {
    pub fn is_running(&self) -> bool {
        self.state.as_deref() == Some("RUNNING")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkspaceObject {
    pub path: String,
    pub object_type: Option<String>,
    pub language: Option<String>,
    pub size: Option<i64>,
}

/// Source language of a workspace notebook, as the import API names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotebookLanguage {
    #[default]
    Python,
    Sql,
    Scala,
    R,
}

impl NotebookLanguage {
    pub fn as_api_str(&self) -> &'static str {
        match self {
            Self::Python => "PYTHON",
            Self::Sql => "SQL",
            Self::Scala => "SCALA",
            Self::R => "R",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportNotebookRequest {
    pub path: String,
    pub language: NotebookLanguage,
    pub content: String,
    pub overwrite: bool,
}

#[derive(Debug, Clone)]
pub struct ExecuteSqlRequest {
    pub statement: String,
    pub warehouse_id: String,
    pub catalog: Option<String>,
    pub schema: Option<String>,
}

/// Outcome of a statement that reached the SUCCEEDED state.
#[derive(Debug, Clone)]
pub struct StatementResult {
    pub statement_id: String,
    pub state: String,
    pub table: ResultTable,
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ClustersListResponse {
    #[serde(default)]
    clusters: Vec<ClusterSummary>,
}

#[derive(Debug, Deserialize)]
struct WorkspaceListResponse {
    #[serde(default)]
    objects: Vec<WorkspaceObject>,
}

#[derive(Debug, Deserialize)]
struct WorkspaceExportResponse {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct WorkspaceImportBody<'a> {
    path: &'a str,
    format: &'static str,
    language: &'static str,
    content: String,
    overwrite: bool,
}

#[derive(Debug, Deserialize)]
struct CatalogsListResponse {
    #[serde(default)]
    catalogs: Vec<CatalogSummary>,
}

#[derive(Debug, Deserialize)]
struct SchemasListResponse {
    #[serde(default)]
    schemas: Vec<SchemaSummary>,
}

#[derive(Debug, Deserialize)]
struct TablesListResponse {
    #[serde(default)]
    tables: Vec<TableSummary>,
}

#[derive(Debug, Deserialize)]
struct WarehouseListResponse {
    #[serde(default)]
    warehouses: Vec<WarehouseSummary>,
}

#[derive(Debug, Serialize)]
struct SqlStatementBody {
    statement: String,
    warehouse_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    catalog: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema: Option<String>,
    row_limit: i64,
    disposition: &'static str,
    format: &'static str,
    wait_timeout: &'static str,
    on_wait_timeout: &'static str,
}

#[derive(Debug, Deserialize)]
struct SqlStatementResponse {
    statement_id: String,
    status: Option<StatementStatus>,
    manifest: Option<ResultManifest>,
    result: Option<StatementData>,
}

#[derive(Debug, Deserialize)]
struct StatementStatus {
    state: String,
    error: Option<StatementError>,
}

#[derive(Debug, Deserialize)]
struct StatementError {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResultManifest {
    schema: Option<ManifestSchema>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct ManifestSchema {
    #[serde(default)]
    columns: Vec<ManifestColumn>,
}

#[derive(Debug, Deserialize)]
struct ManifestColumn {
    name: String,
}

#[derive(Debug, Deserialize)]
struct StatementData {
    data_array: Option<Vec<Vec<Option<String>>>>,
}

// ============================================================================
// Remote operations
// ============================================================================

/// One call per workspace resource type. Every method issues the requests of a
/// single logical operation and reports remote failures as errors, never as
/// partial results.
pub trait WorkspaceApi: Send + Sync {
    fn list_clusters(&self) -> impl Future<Output = Result<Vec<ClusterSummary>>> + Send;

    fn list_workspace(&self, path: &str)
    -> impl Future<Output = Result<Vec<WorkspaceObject>>> + Send;

    fn export_notebook(&self, path: &str) -> impl Future<Output = Result<String>> + Send;

    fn import_notebook(
        &self,
        request: &ImportNotebookRequest,
    ) -> impl Future<Output = Result<()>> + Send;

    fn list_catalogs(&self) -> impl Future<Output = Result<Vec<CatalogSummary>>> + Send;

    fn list_schemas(
        &self,
        catalog_name: &str,
    ) -> impl Future<Output = Result<Vec<SchemaSummary>>> + Send;

    fn list_tables(
        &self,
        catalog_name: &str,
        schema_name: &str,
    ) -> impl Future<Output = Result<Vec<TableSummary>>> + Send;

    fn get_table(&self, full_name: &str) -> impl Future<Output = Result<TableDetails>> + Send;

    fn list_warehouses(&self) -> impl Future<Output = Result<Vec<WarehouseSummary>>> + Send;

    fn execute_statement(
        &self,
        request: &ExecuteSqlRequest,
    ) -> impl Future<Output = Result<StatementResult>> + Send;
}

pub struct DatabricksRestClient {
    host: String,
    token: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for DatabricksRestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabricksRestClient")
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl DatabricksRestClient {
    pub fn new(host: &str, token: &str) -> Result<Self> {
        let host = host.trim();
        if host.is_empty() {
            return Err(anyhow!("Databricks host is empty"));
        }
        if token.is_empty() {
            return Err(anyhow!("Databricks token is empty"));
        }

        let host = if host.starts_with("http") {
            host.to_string()
        } else {
            format!("https://{}", host)
        };

        let client = reqwest::Client::builder()
            .user_agent(concat!("dbx-mcp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            host: host.trim_end_matches('/').to_string(),
            token: token.to_string(),
            client,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.host, endpoint)
    }

    async fn api_request<T>(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Option<&impl Serialize>,
    ) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        debug!("Making {} request to {}", method, url);

        let mut request = self.client.request(method, url).bearer_auth(&self.token);

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            info!("HTTP request failed: {}", e);
            anyhow!("HTTP request failed: {}", e)
        })?;

        let status = response.status();
        debug!("Received HTTP response with status: {}", status);

        let response_text = response.text().await.map_err(|e| {
            info!("Failed to read response text: {}", e);
            anyhow!("Failed to read response text: {}", e)
        })?;

        debug!("Response body length: {} characters", response_text.len());

        if !status.is_success() {
            info!("API request failed with status {}: {}", status, response_text);
            return Err(anyhow!(
                "API request failed with status {}: {}",
                status,
                response_text
            ));
        }

        // some endpoints (workspace import) answer with an empty body
        let response_text = if response_text.trim().is_empty() {
            "{}".to_string()
        } else {
            response_text
        };

        serde_json::from_str(&response_text).map_err(|e| {
            info!("Failed to parse JSON response: {}", e);
            anyhow!(
                "Failed to parse JSON response: {}. Response: {}",
                e,
                response_text
            )
        })
    }

    async fn get<T>(&self, url: &str) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        self.api_request(reqwest::Method::GET, url, None::<&()>)
            .await
    }

    async fn poll_for_results(&self, statement_id: &str) -> Result<StatementResult> {
        let url = format!(
            "{}/{}",
            self.url(SQL_STATEMENTS_ENDPOINT),
            urlencoding::encode(statement_id)
        );

        for attempt in 0..MAX_POLL_ATTEMPTS {
            debug!(
                "Polling attempt {} for statement {}",
                attempt + 1,
                statement_id
            );
            sleep(POLL_INTERVAL).await;

            let response: SqlStatementResponse = self.get(&url).await?;
            match response.status.as_ref().map(|s| s.state.as_str()) {
                Some("PENDING") | Some("RUNNING") => continue,
                _ => return process_statement_response(response),
            }
        }

        Err(anyhow!(
            "Polling timeout exceeded for statement {}",
            statement_id
        ))
    }
}

impl WorkspaceApi for DatabricksRestClient {
    async fn list_clusters(&self) -> Result<Vec<ClusterSummary>> {
        let response: ClustersListResponse = self.get(&self.url(CLUSTERS_LIST_ENDPOINT)).await?;
        Ok(response.clusters)
    }

    async fn list_workspace(&self, path: &str) -> Result<Vec<WorkspaceObject>> {
        let url = format!(
            "{}?path={}",
            self.url(WORKSPACE_LIST_ENDPOINT),
            urlencoding::encode(path)
        );
        let response: WorkspaceListResponse = self.get(&url).await?;
        Ok(response.objects)
    }

    async fn export_notebook(&self, path: &str) -> Result<String> {
        let url = format!(
            "{}?path={}&format=SOURCE",
            self.url(WORKSPACE_EXPORT_ENDPOINT),
            urlencoding::encode(path)
        );
        let response: WorkspaceExportResponse = self.get(&url).await?;
        let Some(encoded) = response.content else {
            return Ok(String::new());
        };

        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| anyhow!("Failed to decode notebook content: {}", e))?;
        String::from_utf8(bytes).map_err(|e| anyhow!("Notebook content is not UTF-8: {}", e))
    }

    async fn import_notebook(&self, request: &ImportNotebookRequest) -> Result<()> {
        let body = WorkspaceImportBody {
            path: &request.path,
            format: "SOURCE",
            language: request.language.as_api_str(),
            content: BASE64.encode(request.content.as_bytes()),
            overwrite: request.overwrite,
        };
        let _: serde_json::Value = self
            .api_request(
                reqwest::Method::POST,
                &self.url(WORKSPACE_IMPORT_ENDPOINT),
                Some(&body),
            )
            .await?;
        info!("Imported notebook {}", request.path);
        Ok(())
    }

    async fn list_catalogs(&self) -> Result<Vec<CatalogSummary>> {
        let response: CatalogsListResponse =
            self.get(&self.url(UNITY_CATALOG_CATALOGS_ENDPOINT)).await?;
        Ok(response.catalogs)
    }

    async fn list_schemas(&self, catalog_name: &str) -> Result<Vec<SchemaSummary>> {
        let url = format!(
            "{}?catalog_name={}",
            self.url(UNITY_CATALOG_SCHEMAS_ENDPOINT),
            urlencoding::encode(catalog_name)
        );
        let response: SchemasListResponse = self.get(&url).await?;
        Ok(response.schemas)
    }

    async fn list_tables(&self, catalog_name: &str, schema_name: &str) -> Result<Vec<TableSummary>> {
        let url = format!(
            "{}?catalog_name={}&schema_name={}",
            self.url(UNITY_CATALOG_TABLES_ENDPOINT),
            urlencoding::encode(catalog_name),
            urlencoding::encode(schema_name)
        );
        let response: TablesListResponse = self.get(&url).await?;
        Ok(response.tables)
    }

    async fn get_table(&self, full_name: &str) -> Result<TableDetails> {
        let url = format!(
            "{}/{}",
            self.url(UNITY_CATALOG_TABLES_ENDPOINT),
            urlencoding::encode(full_name)
        );
        self.get(&url).await
    }

    async fn list_warehouses(&self) -> Result<Vec<WarehouseSummary>> {
        let response: WarehouseListResponse = self.get(&self.url(SQL_WAREHOUSES_ENDPOINT)).await?;
        Ok(response.warehouses)
    }

    async fn execute_statement(&self, request: &ExecuteSqlRequest) -> Result<StatementResult> {
        // one row past the cap so an overflowing result is detectable
        let body = SqlStatementBody {
            statement: request.statement.clone(),
            warehouse_id: request.warehouse_id.clone(),
            catalog: request.catalog.clone(),
            schema: request.schema.clone(),
            row_limit: (MAX_RESULT_ROWS + 1) as i64,
            disposition: "INLINE",
            format: "JSON_ARRAY",
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            on_wait_timeout: "CONTINUE",
        };

        info!("Submitting statement to warehouse {}", request.warehouse_id);
        let response: SqlStatementResponse = self
            .api_request(
                reqwest::Method::POST,
                &self.url(SQL_STATEMENTS_ENDPOINT),
                Some(&body),
            )
            .await?;

        match response.status.as_ref().map(|s| s.state.as_str()) {
            Some("PENDING") | Some("RUNNING") => {
                let statement_id = response.statement_id.clone();
                self.poll_for_results(&statement_id).await
            }
            _ => process_statement_response(response),
        }
    }
}

fn process_statement_response(response: SqlStatementResponse) -> Result<StatementResult> {
    let state = response
        .status
        .as_ref()
        .map(|s| s.state.clone())
        .unwrap_or_else(|| "UNKNOWN".to_string());

    match state.as_str() {
        "SUCCEEDED" => {}
        "FAILED" | "CANCELED" | "CLOSED" => {
            let error_msg = response
                .status
                .as_ref()
                .and_then(|s| s.error.as_ref())
                .and_then(|e| e.message.as_deref())
                .unwrap_or("Unknown error");
            return Err(anyhow!("SQL execution {}: {}", state, error_msg));
        }
        other => return Err(anyhow!("Unexpected statement state: {}", other)),
    }

    let (columns, server_truncated) = match response.manifest {
        Some(manifest) => (
            manifest
                .schema
                .map(|s| s.columns.into_iter().map(|c| c.name).collect())
                .unwrap_or_default(),
            manifest.truncated,
        ),
        None => (Vec::new(), false),
    };

    let rows = response
        .result
        .and_then(|r| r.data_array)
        .unwrap_or_default();
    debug!("Statement {} returned {} rows", response.statement_id, rows.len());

    let mut table = ResultTable::bounded(columns, rows, MAX_RESULT_ROWS);
    table.truncated |= server_truncated;

    Ok(StatementResult {
        statement_id: response.statement_id,
        state,
        table,
    })
}
