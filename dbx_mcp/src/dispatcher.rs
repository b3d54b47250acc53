use crate::args::{
    AddConnectionArgs, ConnectionArgs, CreateNotebookArgs, ExecuteSqlArgs, GetNotebookArgs,
    GetTableInfoArgs, ListNotebooksArgs, ListSchemasArgs, ListTablesArgs,
};
use crate::error::ToolError;
use crate::registry::{Connection, ConnectionRegistry, ListConnectionsResult};
use dbx_integrations::{
    DatabricksRestClient, ExecuteSqlRequest, ExecuteSqlResult, ImportNotebookRequest,
    ListCatalogsResult, ListClustersResult, ListSchemasResult, ListTablesResult,
    ListWarehousesResult, ListWorkspaceResult, TableDetails, WarehouseSummary, WorkspaceApi,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Builds the remote client for a resolved connection.
pub trait ClientFactory: Send + Sync + 'static {
    type Client: WorkspaceApi + 'static;

    fn connect(&self, connection: &Connection) -> Result<Self::Client, ToolError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RestClientFactory;

impl ClientFactory for RestClientFactory {
    type Client = DatabricksRestClient;

    fn connect(&self, connection: &Connection) -> Result<Self::Client, ToolError> {
        DatabricksRestClient::new(&connection.host, &connection.token).map_err(|e| {
            ToolError::Remote(format!(
                "failed to create client for connection '{}': {}",
                connection.name, e
            ))
        })
    }
}

/// Pick the warehouse for a statement that did not name one: the first running
/// warehouse in listing order, else the first listed (it starts on demand).
pub fn select_warehouse(warehouses: &[WarehouseSummary]) -> Option<&WarehouseSummary> {
    warehouses
        .iter()
        .find(|w| w.is_running())
        .or_else(|| warehouses.first())
}

struct CachedClient<C> {
    connection: Connection,
    client: Arc<C>,
}

/// Resolves connections and forwards each tool call to exactly one remote
/// operation. Clients are built lazily and cached per connection name; a
/// cached client is only reused while its credentials match the registry.
pub struct ToolDispatcher<F: ClientFactory = RestClientFactory> {
    registry: RwLock<ConnectionRegistry>,
    clients: RwLock<HashMap<String, CachedClient<F::Client>>>,
    factory: F,
}

impl<F: ClientFactory> ToolDispatcher<F> {
    pub fn new(registry: ConnectionRegistry, factory: F) -> Self {
        Self {
            registry: RwLock::new(registry),
            clients: RwLock::new(HashMap::new()),
            factory,
        }
    }

    async fn client(
        &self,
        tool: &str,
        connection_name: Option<&str>,
    ) -> Result<Arc<F::Client>, ToolError> {
        let connection = self.registry.read().await.resolve(connection_name)?.clone();
        tracing::info!(tool, connection = %connection.name, "dispatching tool call");

        if let Some(cached) = self.clients.read().await.get(&connection.name) {
            if cached.connection == connection {
                return Ok(Arc::clone(&cached.client));
            }
        }

        let client = Arc::new(self.factory.connect(&connection)?);
        self.clients.write().await.insert(
            connection.name.clone(),
            CachedClient {
                connection,
                client: Arc::clone(&client),
            },
        );
        Ok(client)
    }

    pub async fn list_connections(&self) -> ListConnectionsResult {
        ListConnectionsResult {
            connections: self.registry.read().await.list(),
        }
    }

    pub async fn add_connection(&self, args: AddConnectionArgs) -> Result<String, ToolError> {
        let replaced = self
            .registry
            .write()
            .await
            .add(&args.name, &args.host, &args.token)?;

        if replaced {
            // credentials changed under this name
            self.clients.write().await.remove(&args.name);
            tracing::info!(connection = %args.name, "replaced connection");
            Ok(format!("Connection '{}' updated successfully", args.name))
        } else {
            tracing::info!(connection = %args.name, "added connection");
            Ok(format!("Connection '{}' added successfully", args.name))
        }
    }

    pub async fn create_notebook(&self, args: CreateNotebookArgs) -> Result<String, ToolError> {
        let client = self
            .client("create_notebook", args.connection_name.as_deref())
            .await?;
        if args.path.trim().is_empty() {
            return Err(ToolError::Validation("path must not be empty".to_string()));
        }

        let request = ImportNotebookRequest {
            path: args.path,
            language: args.language.into(),
            content: args.content,
            overwrite: args.overwrite,
        };
        client
            .import_notebook(&request)
            .await
            .map_err(ToolError::remote)?;
        Ok(format!("Notebook created at {}", request.path))
    }

    pub async fn list_notebooks(
        &self,
        args: ListNotebooksArgs,
    ) -> Result<ListWorkspaceResult, ToolError> {
        let client = self
            .client("list_notebooks", args.connection_name.as_deref())
            .await?;
        let objects = client
            .list_workspace(&args.path)
            .await
            .map_err(ToolError::remote)?;
        Ok(ListWorkspaceResult {
            path: args.path,
            objects,
        })
    }

    pub async fn get_notebook_content(&self, args: GetNotebookArgs) -> Result<String, ToolError> {
        let client = self
            .client("get_notebook_content", args.connection_name.as_deref())
            .await?;
        if args.path.trim().is_empty() {
            return Err(ToolError::Validation("path must not be empty".to_string()));
        }
        client
            .export_notebook(&args.path)
            .await
            .map_err(ToolError::remote)
    }

    pub async fn list_clusters(&self, args: ConnectionArgs) -> Result<ListClustersResult, ToolError> {
        let client = self
            .client("list_clusters", args.connection_name.as_deref())
            .await?;
        let clusters = client.list_clusters().await.map_err(ToolError::remote)?;
        Ok(ListClustersResult { clusters })
    }

    pub async fn list_catalogs(&self, args: ConnectionArgs) -> Result<ListCatalogsResult, ToolError> {
        let client = self
            .client("list_catalogs", args.connection_name.as_deref())
            .await?;
        let catalogs = client.list_catalogs().await.map_err(ToolError::remote)?;
        Ok(ListCatalogsResult { catalogs })
    }

    pub async fn list_schemas(&self, args: ListSchemasArgs) -> Result<ListSchemasResult, ToolError> {
        let client = self
            .client("list_schemas", args.connection_name.as_deref())
            .await?;
        let schemas = client
            .list_schemas(&args.catalog_name)
            .await
            .map_err(ToolError::remote)?;
        Ok(ListSchemasResult {
            catalog_name: args.catalog_name,
            schemas,
        })
    }

    pub async fn list_tables(&self, args: ListTablesArgs) -> Result<ListTablesResult, ToolError> {
        let client = self
            .client("list_tables", args.connection_name.as_deref())
            .await?;
        let tables = client
            .list_tables(&args.catalog_name, &args.schema_name)
            .await
            .map_err(ToolError::remote)?;
        Ok(ListTablesResult {
            catalog_name: args.catalog_name,
            schema_name: args.schema_name,
            tables,
        })
    }

    pub async fn get_table_info(&self, args: GetTableInfoArgs) -> Result<TableDetails, ToolError> {
        let client = self
            .client("get_table_info", args.connection_name.as_deref())
            .await?;
        if args.table_name.trim().is_empty() {
            return Err(ToolError::Validation(
                "table_name must not be empty".to_string(),
            ));
        }
        client
            .get_table(&args.full_name())
            .await
            .map_err(ToolError::remote)
    }

    pub async fn list_sql_warehouses(
        &self,
        args: ConnectionArgs,
    ) -> Result<ListWarehousesResult, ToolError> {
        let client = self
            .client("list_sql_warehouses", args.connection_name.as_deref())
            .await?;
        let warehouses = client.list_warehouses().await.map_err(ToolError::remote)?;
        Ok(ListWarehousesResult { warehouses })
    }

    pub async fn execute_sql_query(&self, args: ExecuteSqlArgs) -> Result<ExecuteSqlResult, ToolError> {
        let client = self
            .client("execute_sql_query", args.connection_name.as_deref())
            .await?;
        if args.query.trim().is_empty() {
            return Err(ToolError::Validation("query must not be empty".to_string()));
        }

        let warehouse_id = match args.warehouse_id.filter(|id| !id.trim().is_empty()) {
            Some(id) => id,
            None => {
                let warehouses = client.list_warehouses().await.map_err(ToolError::remote)?;
                let selected = select_warehouse(&warehouses).ok_or(ToolError::NoWarehouseAvailable)?;
                tracing::info!(
                    warehouse_id = %selected.id,
                    state = selected.state.as_deref().unwrap_or("UNKNOWN"),
                    "selected SQL warehouse"
                );
                selected.id.clone()
            }
        };

        let request = ExecuteSqlRequest {
            statement: args.query,
            warehouse_id: warehouse_id.clone(),
            catalog: args.catalog,
            schema: args.schema,
        };
        let statement = client
            .execute_statement(&request)
            .await
            .map_err(ToolError::remote)?;
        Ok(ExecuteSqlResult {
            warehouse_id,
            statement,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::Language;
    use anyhow::{Result, anyhow};
    use dbx_integrations::{
        CatalogSummary, ClusterSummary, MAX_RESULT_ROWS, NotebookLanguage, ResultTable,
        SchemaSummary, StatementResult, TableSummary, WorkspaceObject,
    };
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Calls {
        connects: Mutex<Vec<(String, String)>>,
        warehouse_listings: AtomicUsize,
        statements: Mutex<Vec<ExecuteSqlRequest>>,
        imports: Mutex<Vec<ImportNotebookRequest>>,
        remote_calls: AtomicUsize,
    }

    struct FakeWorkspace {
        warehouses: Vec<WarehouseSummary>,
        remote_error: Option<String>,
        calls: Arc<Calls>,
    }

    impl FakeWorkspace {
        fn remote(&self) -> Result<()> {
            self.calls.remote_calls.fetch_add(1, Ordering::SeqCst);
            match &self.remote_error {
                Some(msg) => Err(anyhow!("{}", msg)),
                None => Ok(()),
            }
        }
    }

    impl WorkspaceApi for FakeWorkspace {
        async fn list_clusters(&self) -> Result<Vec<ClusterSummary>> {
            self.remote()?;
            Ok(vec![])
        }

        async fn list_workspace(&self, _path: &str) -> Result<Vec<WorkspaceObject>> {
            self.remote()?;
            Ok(vec![])
        }

        async fn export_notebook(&self, path: &str) -> Result<String> {
            self.remote()?;
            Ok(format!("-- source of {}", path))
        }

        async fn import_notebook(&self, request: &ImportNotebookRequest) -> Result<()> {
            self.remote()?;
            self.calls.imports.lock().unwrap().push(request.clone());
            Ok(())
        }

        async fn list_catalogs(&self) -> Result<Vec<CatalogSummary>> {
            self.remote()?;
            Ok(vec![])
        }

        async fn list_schemas(&self, _catalog_name: &str) -> Result<Vec<SchemaSummary>> {
            self.remote()?;
            Ok(vec![])
        }

        async fn list_tables(&self, _catalog_name: &str, _schema_name: &str) -> Result<Vec<TableSummary>> {
            self.remote()?;
            Ok(vec![])
        }

        async fn get_table(&self, full_name: &str) -> Result<TableDetails> {
            self.remote()?;
            Ok(TableDetails {
                name: full_name.rsplit('.').next().unwrap_or(full_name).to_string(),
                catalog_name: None,
                schema_name: None,
                full_name: Some(full_name.to_string()),
                table_type: None,
                owner: None,
                comment: None,
                storage_location: None,
                data_source_format: None,
                columns: vec![],
            })
        }

        async fn list_warehouses(&self) -> Result<Vec<WarehouseSummary>> {
            self.remote()?;
            self.calls.warehouse_listings.fetch_add(1, Ordering::SeqCst);
            Ok(self.warehouses.clone())
        }

        async fn execute_statement(&self, request: &ExecuteSqlRequest) -> Result<StatementResult> {
            self.remote()?;
            self.calls.statements.lock().unwrap().push(request.clone());
            Ok(StatementResult {
                statement_id: "stmt-1".to_string(),
                state: "SUCCEEDED".to_string(),
                table: ResultTable::bounded(
                    vec!["1".to_string()],
                    vec![vec![Some("1".to_string())]],
                    MAX_RESULT_ROWS,
                ),
            })
        }
    }

    #[derive(Default)]
    struct FakeFactory {
        warehouses: Vec<WarehouseSummary>,
        remote_error: Option<String>,
        calls: Arc<Calls>,
    }

    impl ClientFactory for FakeFactory {
        type Client = FakeWorkspace;

        fn connect(&self, connection: &Connection) -> Result<Self::Client, ToolError> {
            self.calls
                .connects
                .lock()
                .unwrap()
                .push((connection.name.clone(), connection.token.clone()));
            Ok(FakeWorkspace {
                warehouses: self.warehouses.clone(),
                remote_error: self.remote_error.clone(),
                calls: Arc::clone(&self.calls),
            })
        }
    }

    fn warehouse(id: &str, state: &str) -> WarehouseSummary {
        WarehouseSummary {
            id: id.to_string(),
            name: Some(format!("wh-{}", id)),
            state: Some(state.to_string()),
            cluster_size: Some("Small".to_string()),
            num_clusters: Some(1),
        }
    }

    fn default_registry() -> ConnectionRegistry {
        let mut registry = ConnectionRegistry::new();
        registry.add("default", "https://a/", "t").unwrap();
        registry
    }

    fn dispatcher(factory: FakeFactory) -> (ToolDispatcher<FakeFactory>, Arc<Calls>) {
        let calls = Arc::clone(&factory.calls);
        (ToolDispatcher::new(default_registry(), factory), calls)
    }

    fn sql(query: &str, warehouse_id: Option<&str>) -> ExecuteSqlArgs {
        ExecuteSqlArgs {
            query: query.to_string(),
            warehouse_id: warehouse_id.map(str::to_string),
            catalog: None,
            schema: None,
            connection_name: Some("default".to_string()),
        }
    }

    #[test]
    fn select_warehouse_prefers_first_running() {
        let warehouses = vec![
            warehouse("w1", "STOPPED"),
            warehouse("w2", "RUNNING"),
            warehouse("w3", "RUNNING"),
        ];
        assert_eq!(select_warehouse(&warehouses).unwrap().id, "w2");
    }

    #[test]
    fn select_warehouse_falls_back_to_first_listed() {
        let warehouses = vec![warehouse("w1", "STOPPED"), warehouse("w2", "STARTING")];
        assert_eq!(select_warehouse(&warehouses).unwrap().id, "w1");
        assert!(select_warehouse(&[]).is_none());
    }

    #[tokio::test]
    async fn sql_without_warehouses_fails_before_submitting() {
        let (dispatcher, calls) = dispatcher(FakeFactory::default());

        let err = dispatcher
            .execute_sql_query(sql("SELECT 1", None))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NoWarehouseAvailable));
        assert_eq!(calls.warehouse_listings.load(Ordering::SeqCst), 1);
        assert!(calls.statements.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sql_uses_running_warehouse() {
        let (dispatcher, calls) = dispatcher(FakeFactory {
            warehouses: vec![warehouse("w1", "STOPPED"), warehouse("w2", "RUNNING")],
            ..Default::default()
        });

        let result = dispatcher
            .execute_sql_query(sql("SELECT 1", None))
            .await
            .unwrap();
        assert_eq!(result.warehouse_id, "w2");
        let statements = calls.statements.lock().unwrap();
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].warehouse_id, "w2");
        assert_eq!(statements[0].statement, "SELECT 1");
    }

    #[tokio::test]
    async fn sql_with_explicit_warehouse_skips_listing() {
        let (dispatcher, calls) = dispatcher(FakeFactory::default());

        let result = dispatcher
            .execute_sql_query(sql("SELECT 1", Some("explicit")))
            .await
            .unwrap();
        assert_eq!(result.warehouse_id, "explicit");
        assert_eq!(calls.warehouse_listings.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn resolution_failures_issue_no_remote_call() {
        let (dispatcher, calls) = dispatcher(FakeFactory::default());

        let err = dispatcher
            .list_clusters(ConnectionArgs {
                connection_name: Some("missing".to_string()),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::UnknownConnection(ref name) if name == "missing"));

        let empty = ToolDispatcher::new(ConnectionRegistry::new(), FakeFactory::default());
        let err = empty
            .list_catalogs(ConnectionArgs::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NoDefaultConnection));

        assert_eq!(calls.remote_calls.load(Ordering::SeqCst), 0);
        assert!(calls.connects.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn remote_failures_are_typed() {
        let (dispatcher, _calls) = dispatcher(FakeFactory {
            remote_error: Some("API request failed with status 403 Forbidden: denied".to_string()),
            ..Default::default()
        });

        let err = dispatcher
            .list_sql_warehouses(ConnectionArgs::default())
            .await
            .unwrap_err();
        match err {
            ToolError::Remote(msg) => assert!(msg.contains("403 Forbidden: denied")),
            other => panic!("expected remote error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn clients_are_cached_until_connection_is_replaced() {
        let (dispatcher, calls) = dispatcher(FakeFactory::default());

        dispatcher.list_catalogs(ConnectionArgs::default()).await.unwrap();
        dispatcher.list_catalogs(ConnectionArgs::default()).await.unwrap();
        assert_eq!(calls.connects.lock().unwrap().len(), 1);

        let message = dispatcher
            .add_connection(AddConnectionArgs {
                name: "default".to_string(),
                host: "https://a/".to_string(),
                token: "rotated".to_string(),
            })
            .await
            .unwrap();
        assert!(message.contains("updated"));

        dispatcher.list_catalogs(ConnectionArgs::default()).await.unwrap();
        let connects = calls.connects.lock().unwrap();
        assert_eq!(connects.len(), 2);
        assert_eq!(connects[1], ("default".to_string(), "rotated".to_string()));
    }

    #[tokio::test]
    async fn stale_cached_client_is_not_reused() {
        let (dispatcher, calls) = dispatcher(FakeFactory::default());

        dispatcher.list_catalogs(ConnectionArgs::default()).await.unwrap();
        dispatcher
            .add_connection(AddConnectionArgs {
                name: "default".to_string(),
                host: "https://a/".to_string(),
                token: "rotated".to_string(),
            })
            .await
            .unwrap();

        // a call that resolved the old credentials finishes after the eviction
        let stale = Connection {
            name: "default".to_string(),
            host: "https://a/".to_string(),
            token: "t".to_string(),
        };
        let stale_client = Arc::new(dispatcher.factory.connect(&stale).unwrap());
        dispatcher.clients.write().await.insert(
            "default".to_string(),
            CachedClient {
                connection: stale,
                client: stale_client,
            },
        );

        dispatcher.list_catalogs(ConnectionArgs::default()).await.unwrap();
        let connects = calls.connects.lock().unwrap();
        assert_eq!(connects.len(), 3);
        assert_eq!(connects[2], ("default".to_string(), "rotated".to_string()));
    }

    #[tokio::test]
    async fn add_then_list_shows_both_connections() {
        let (dispatcher, _calls) = dispatcher(FakeFactory::default());

        let message = dispatcher
            .add_connection(AddConnectionArgs {
                name: "staging".to_string(),
                host: "https://b/".to_string(),
                token: "t2".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(message, "Connection 'staging' added successfully");

        let listed = dispatcher.list_connections().await.connections;
        let names: Vec<&str> = listed.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["default", "staging"]);
        assert_eq!(listed[1].host, "https://b/");
    }

    #[tokio::test]
    async fn add_connection_validates_arguments() {
        let (dispatcher, _calls) = dispatcher(FakeFactory::default());
        let err = dispatcher
            .add_connection(AddConnectionArgs {
                name: "staging".to_string(),
                host: String::new(),
                token: "t2".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));
        assert_eq!(dispatcher.list_connections().await.connections.len(), 1);
    }

    #[tokio::test]
    async fn create_notebook_forwards_language_and_content() {
        let (dispatcher, calls) = dispatcher(FakeFactory::default());

        let message = dispatcher
            .create_notebook(CreateNotebookArgs {
                path: "/Users/me/etl".to_string(),
                language: Language::Scala,
                content: "println(1)".to_string(),
                overwrite: true,
                connection_name: None,
            })
            .await
            .unwrap();
        assert_eq!(message, "Notebook created at /Users/me/etl");

        let imports = calls.imports.lock().unwrap();
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].language, NotebookLanguage::Scala);
        assert_eq!(imports[0].content, "println(1)");
    }

    #[tokio::test]
    async fn get_table_info_qualifies_name() {
        let (dispatcher, _calls) = dispatcher(FakeFactory::default());

        let table = dispatcher
            .get_table_info(GetTableInfoArgs {
                table_name: "orders".to_string(),
                catalog_name: "main".to_string(),
                schema_name: "sales".to_string(),
                connection_name: None,
            })
            .await
            .unwrap();
        assert_eq!(table.full_name.as_deref(), Some("main.sales.orders"));
    }
}
