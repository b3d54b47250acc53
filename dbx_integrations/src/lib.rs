pub mod databricks;
pub mod results;

// ============================================================================
// Shared Display Trait
// ============================================================================

pub trait ToolResultDisplay {
    fn display(&self) -> String;
}

pub use databricks::{
    Autoscale, CatalogSummary, ClusterSummary, ColumnMetadata, DatabricksRestClient,
    ExecuteSqlRequest, ImportNotebookRequest, NotebookLanguage, SchemaSummary, StatementResult,
    TableDetails, TableSummary, WarehouseSummary, WorkspaceApi, WorkspaceObject,
};
pub use results::{
    ExecuteSqlResult, ListCatalogsResult, ListClustersResult, ListSchemasResult,
    ListTablesResult, ListWarehousesResult, ListWorkspaceResult, MAX_RESULT_ROWS, ResultTable,
    truncation_marker,
};
