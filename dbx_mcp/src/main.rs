use clap::{Parser, Subcommand};
use dbx_integrations::{DatabricksRestClient, WorkspaceApi};
use dbx_mcp::config::{CONFIG_ENV_VAR, ConfigSource};
use dbx_mcp::providers::DatabricksProvider;
use dbx_mcp::registry::ConnectionRegistry;
use eyre::Result;
use rmcp::ServiceExt;
use rmcp::transport::stdio;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "dbx_mcp")]
#[command(about = "Databricks MCP Server", long_about = None)]
struct Cli {
    /// Path to a credential file with named connections
    #[arg(long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check configured connections by listing SQL warehouses on each
    Check,
}

fn load_registry(cli: &Cli) -> Result<(ConfigSource, ConnectionRegistry)> {
    let source = ConfigSource::discover(cli.config.as_deref())?;
    let registry = ConnectionRegistry::from_source(&source)?;
    Ok((source, registry))
}

async fn check_connections(cli: &Cli) -> Result<()> {
    println!("🔍 Checking Databricks connections...\n");

    let (source, registry) = load_registry(cli)?;
    println!("  Credentials: {}", source.describe());
    if registry.default_connection().is_none() {
        println!("  ⚠ no connection named 'default'; tool calls must pass connection_name");
    }
    println!();

    let mut all_passed = true;
    for summary in registry.list() {
        let marker = if summary.is_default { " [default]" } else { "" };
        print!("  {}{} ({})... ", summary.name, marker, summary.host);
        let Some(connection) = registry.get(&summary.name) else {
            continue;
        };
        let listing = async {
            let client = DatabricksRestClient::new(&connection.host, &connection.token)?;
            client.list_warehouses().await
        };
        match listing.await {
            Ok(warehouses) => println!("✓ ({} SQL warehouses)", warehouses.len()),
            Err(e) => {
                println!("✗\n    Error: {:#}", e);
                all_passed = false;
            }
        }
    }

    println!();
    if all_passed {
        println!("✅ All checks passed!");
        Ok(())
    } else {
        println!("❌ Some checks failed. Please review the errors above.");
        Err(eyre::eyre!("Connection check failed"))
    }
}

async fn run_server(cli: &Cli) -> Result<()> {
    let session_id = Uuid::new_v4().to_string();

    // stdout carries the MCP transport, so logs only ever go to stderr
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .init();
    }

    let (source, registry) = load_registry(cli)?;
    tracing::info!(
        session_id = %session_id,
        source = %source.describe(),
        connections = registry.len(),
        "starting server"
    );

    let names = registry
        .list()
        .into_iter()
        .map(|c| c.name)
        .collect::<Vec<_>>();
    let default_info = match registry.default_connection() {
        Some(connection) => format!("'{}' ({})", connection.name, connection.host),
        None => "none, tool calls must pass connection_name".to_string(),
    };
    eprintln!(
        "🚀 Databricks MCP Server v{}\n\
         Credentials: {}\n\
         Connections ({}): {}\n\
         Default connection: {}\n\
         Server running on stdio transport...",
        env!("CARGO_PKG_VERSION"),
        source.describe(),
        names.len(),
        names.join(", "),
        default_info
    );

    let provider = DatabricksProvider::new(registry);
    let service = provider.serve(stdio()).await?;
    service.waiting().await?;

    tracing::info!(session_id = %session_id, "server stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // a missing .env is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Check) => check_connections(&cli).await,
        None => run_server(&cli).await,
    }
}
