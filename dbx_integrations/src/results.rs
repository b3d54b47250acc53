use crate::ToolResultDisplay;
use crate::databricks::{
    CatalogSummary, ClusterSummary, SchemaSummary, StatementResult, TableDetails, TableSummary,
    WarehouseSummary, WorkspaceObject,
};

/// Maximum number of rows a SQL result carries back to the agent.
pub const MAX_RESULT_ROWS: usize = 100;

const NULL_CELL: &str = "NULL";

pub fn truncation_marker(cap: usize) -> String {
    format!("[truncated: showing the first {} rows]", cap)
}

/// Tabular SQL output bounded to a fixed number of rows.
#[derive(Debug, Clone, Default)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
    pub cap: usize,
    pub truncated: bool,
}

impl ResultTable {
    pub fn bounded(columns: Vec<String>, mut rows: Vec<Vec<Option<String>>>, cap: usize) -> Self {
        let truncated = rows.len() > cap;
        rows.truncate(cap);
        Self {
            columns,
            rows,
            cap,
            truncated,
        }
    }

    pub fn render(&self) -> String {
        if self.columns.is_empty() {
            return "Statement returned no result set.".to_string();
        }

        let cells: Vec<Vec<&str>> = self
            .rows
            .iter()
            .map(|row| {
                (0..self.columns.len())
                    .map(|i| row.get(i).and_then(|v| v.as_deref()).unwrap_or(NULL_CELL))
                    .collect()
            })
            .collect();

        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        for row in &cells {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }

        let render_line = |values: Vec<&str>| {
            values
                .iter()
                .zip(&widths)
                .map(|(value, width)| format!("{:<width$}", value, width = *width))
                .collect::<Vec<_>>()
                .join(" | ")
                .trim_end()
                .to_string()
        };

        let mut lines = Vec::with_capacity(cells.len() + 4);
        lines.push(render_line(self.columns.iter().map(String::as_str).collect()));
        lines.push(
            widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("-+-"),
        );
        for row in cells {
            lines.push(render_line(row));
        }

        lines.push(format!("({} rows)", self.rows.len()));
        if self.truncated {
            // a server-side byte limit can cut the result below the row cap
            lines.push(truncation_marker(self.rows.len().min(self.cap)));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Clone)]
pub struct ListClustersResult {
    pub clusters: Vec<ClusterSummary>,
}

impl ToolResultDisplay for ListClustersResult {
    fn display(&self) -> String {
        if self.clusters.is_empty() {
            return "No clusters found.".to_string();
        }

        let mut lines = vec![format!("Found {} clusters:", self.clusters.len()), String::new()];
        for cluster in &self.clusters {
            lines.push(format!(
                "• {} (ID: {})",
                cluster.cluster_name.as_deref().unwrap_or("unnamed"),
                cluster.cluster_id
            ));
            lines.push(format!(
                "  State: {}",
                cluster.state.as_deref().unwrap_or("UNKNOWN")
            ));
            let workers = match (&cluster.autoscale, cluster.num_workers) {
                (Some(autoscale), _) => format!(
                    "autoscale {}-{}",
                    autoscale.min_workers, autoscale.max_workers
                ),
                (None, Some(n)) => n.to_string(),
                (None, None) => "unknown".to_string(),
            };
            lines.push(format!("  Workers: {}", workers));
            if let Some(node_type) = &cluster.node_type_id {
                lines.push(format!("  Node type: {}", node_type));
            }
            if let Some(driver) = &cluster.driver_node_type_id {
                lines.push(format!("  Driver node type: {}", driver));
            }
            if let Some(version) = &cluster.spark_version {
                lines.push(format!("  Spark version: {}", version));
            }
        }
        lines.join("\n")
    }
}

#[derive(Debug, Clone)]
pub struct ListWorkspaceResult {
    pub path: String,
    pub objects: Vec<WorkspaceObject>,
}

impl ToolResultDisplay for ListWorkspaceResult {
    fn display(&self) -> String {
        if self.objects.is_empty() {
            return format!("No objects found in {}.", self.path);
        }

        let mut lines = vec![
            format!("Found {} objects in {}:", self.objects.len(), self.path),
            String::new(),
        ];
        for object in &self.objects {
            let mut line = format!(
                "• {} [{}]",
                object.path,
                object.object_type.as_deref().unwrap_or("UNKNOWN")
            );
            if let Some(language) = &object.language {
                line.push_str(&format!(" language={}", language));
            }
            if let Some(size) = object.size {
                line.push_str(&format!(" size={}", size));
            }
            lines.push(line);
        }
        lines.join("\n")
    }
}

#[derive(Debug, Clone)]
pub struct ListCatalogsResult {
    pub catalogs: Vec<CatalogSummary>,
}

impl ToolResultDisplay for ListCatalogsResult {
    fn display(&self) -> String {
        if self.catalogs.is_empty() {
            return "No catalogs found.".to_string();
        }

        let mut lines = vec![format!("Found {} catalogs:", self.catalogs.len()), String::new()];
        for catalog in &self.catalogs {
            let mut line = format!("• {}", catalog.name);
            if let Some(catalog_type) = &catalog.catalog_type {
                line.push_str(&format!(" ({})", catalog_type));
            }
            if let Some(comment) = catalog.comment.as_deref().filter(|c| !c.is_empty()) {
                line.push_str(&format!(": {}", comment));
            }
            lines.push(line);
        }
        lines.join("\n")
    }
}

#[derive(Debug, Clone)]
pub struct ListSchemasResult {
    pub catalog_name: String,
    pub schemas: Vec<SchemaSummary>,
}

impl ToolResultDisplay for ListSchemasResult {
    fn display(&self) -> String {
        if self.schemas.is_empty() {
            return format!("No schemas found in catalog '{}'.", self.catalog_name);
        }

        let mut lines = vec![
            format!(
                "Found {} schemas in catalog '{}':",
                self.schemas.len(),
                self.catalog_name
            ),
            String::new(),
        ];
        for schema in &self.schemas {
            let mut line = format!("• {}", schema.name);
            if let Some(comment) = schema.comment.as_deref().filter(|c| !c.is_empty()) {
                line.push_str(&format!(": {}", comment));
            }
            lines.push(line);
        }
        lines.join("\n")
    }
}

#[derive(Debug, Clone)]
pub struct ListTablesResult {
    pub catalog_name: String,
    pub schema_name: String,
    pub tables: Vec<TableSummary>,
}

impl ToolResultDisplay for ListTablesResult {
    fn display(&self) -> String {
        if self.tables.is_empty() {
            return format!(
                "No tables found in {}.{}.",
                self.catalog_name, self.schema_name
            );
        }

        let mut lines = vec![
            format!(
                "Found {} tables in {}.{}:",
                self.tables.len(),
                self.catalog_name,
                self.schema_name
            ),
            String::new(),
        ];
        for table in &self.tables {
            let mut line = format!(
                "• {} ({})",
                table.full_name(),
                table.table_type.as_deref().unwrap_or("UNKNOWN")
            );
            if let Some(comment) = table.comment.as_deref().filter(|c| !c.is_empty()) {
                line.push_str(&format!(": {}", comment));
            }
            lines.push(line);
        }
        lines.join("\n")
    }
}

impl ToolResultDisplay for TableDetails {
    fn display(&self) -> String {
        let mut lines = vec![format!(
            "Table: {}",
            self.full_name.as_deref().unwrap_or(&self.name)
        )];
        lines.push(format!(
            "Type: {}",
            self.table_type.as_deref().unwrap_or("UNKNOWN")
        ));
        if let Some(owner) = &self.owner {
            lines.push(format!("Owner: {}", owner));
        }
        if let Some(comment) = self.comment.as_deref().filter(|c| !c.is_empty()) {
            lines.push(format!("Comment: {}", comment));
        }
        if let Some(location) = &self.storage_location {
            lines.push(format!("Storage location: {}", location));
        }
        if let Some(format) = &self.data_source_format {
            lines.push(format!("Format: {}", format));
        }

        lines.push(String::new());
        lines.push(format!("Columns ({}):", self.columns.len()));
        for column in &self.columns {
            let data_type = column
                .type_text
                .as_deref()
                .or(column.type_name.as_deref())
                .unwrap_or("unknown");
            let mut line = format!("• {}: {}", column.name, data_type);
            if column.nullable == Some(false) {
                line.push_str(" NOT NULL");
            }
            if let Some(comment) = column.comment.as_deref().filter(|c| !c.is_empty()) {
                line.push_str(&format!(" ({})", comment));
            }
            lines.push(line);
        }
        lines.join("\n")
    }
}

#[derive(Debug, Clone)]
pub struct ListWarehousesResult {
    pub warehouses: Vec<WarehouseSummary>,
}

impl ToolResultDisplay for ListWarehousesResult {
    fn display(&self) -> String {
        if self.warehouses.is_empty() {
            return "No SQL warehouses found.".to_string();
        }

        let mut lines = vec![
            format!("Found {} SQL warehouses:", self.warehouses.len()),
            String::new(),
        ];
        for warehouse in &self.warehouses {
            lines.push(format!(
                "• {} (ID: {}) state={} size={} clusters={}",
                warehouse.name.as_deref().unwrap_or("unnamed"),
                warehouse.id,
                warehouse.state.as_deref().unwrap_or("UNKNOWN"),
                warehouse.cluster_size.as_deref().unwrap_or("unknown"),
                warehouse
                    .num_clusters
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "unknown".to_string())
            ));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Clone)]
pub struct ExecuteSqlResult {
    pub warehouse_id: String,
    pub statement: StatementResult,
}

impl ToolResultDisplay for ExecuteSqlResult {
    fn display(&self) -> String {
        format!(
            "Statement {} {} on warehouse {}\n\n{}",
            self.statement.statement_id,
            self.statement.state,
            self.warehouse_id,
            self.statement.table.render()
        )
    }
}
