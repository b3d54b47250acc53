//! Smoke test for dbx-mcp server
//!
//! Verifies that:
//! - Server can be instantiated in-process
//! - All workspace tools are exposed
//! - Connection registry tools work without touching the network

use dbx_mcp::providers::DatabricksProvider;
use dbx_mcp::registry::ConnectionRegistry;
use eyre::Result;
use rmcp::model::{CallToolRequestParam, CallToolResult, ErrorCode, RawContent};
use rmcp::{ErrorData, ServiceError, ServiceExt};
use rmcp_in_process_transport::in_process::TokioInProcess;
use serde_json::json;

const TOOLS: [&str; 12] = [
    "list_databricks_connections",
    "add_databricks_connection",
    "create_notebook",
    "list_notebooks",
    "get_notebook_content",
    "list_clusters",
    "list_catalogs",
    "list_schemas",
    "list_tables",
    "get_table_info",
    "execute_sql_query",
    "list_sql_warehouses",
];

fn registry() -> ConnectionRegistry {
    let mut registry = ConnectionRegistry::new();
    registry
        .add("default", "https://a.cloud.databricks.com/", "secret-token")
        .unwrap();
    registry
}

fn request(name: &str, arguments: serde_json::Value) -> CallToolRequestParam {
    CallToolRequestParam {
        name: name.to_string().into(),
        arguments: arguments.as_object().cloned(),
    }
}

fn text(result: &CallToolResult) -> String {
    match &result.content[0].raw {
        RawContent::Text(t) => t.text.clone(),
        other => panic!("expected text content, got {:?}", other),
    }
}

fn tool_error(result: Result<CallToolResult, ServiceError>) -> ErrorData {
    match result {
        Err(ServiceError::McpError(error)) => error,
        other => panic!("expected a tool error, got {:?}", other),
    }
}

#[tokio::test]
async fn smoke_test_mcp_server() -> Result<()> {
    let provider = DatabricksProvider::new(registry());

    let tokio_in_process = TokioInProcess::new(provider).await?;
    let service = ().serve(tokio_in_process).await?;

    let info = service.peer_info().expect("server info should be available");
    assert_eq!(info.server_info.name, "dbx-mcp");
    assert!(!info.server_info.version.is_empty());

    let tools_response = service.list_tools(Default::default()).await?;
    assert_eq!(tools_response.tools.len(), TOOLS.len());
    for name in TOOLS {
        assert!(
            tools_response.tools.iter().any(|t| t.name == name),
            "{} tool should be exposed",
            name
        );
    }

    service.cancel().await?;
    Ok(())
}

#[tokio::test]
async fn connections_are_listed_without_tokens() -> Result<()> {
    let provider = DatabricksProvider::new(registry());
    let service = ().serve(TokioInProcess::new(provider).await?).await?;

    let result = service
        .call_tool(request("list_databricks_connections", json!({})))
        .await?;
    let listed = text(&result);
    assert!(listed.contains("default (default): https://a.cloud.databricks.com/"));
    assert!(!listed.contains("secret-token"));
    assert_eq!(
        result.structured_content,
        Some(json!([
            {"name": "default", "host": "https://a.cloud.databricks.com/", "is_default": true}
        ]))
    );

    let result = service
        .call_tool(request(
            "add_databricks_connection",
            json!({"name": "staging", "host": "https://b/", "token": "t2"}),
        ))
        .await?;
    assert_eq!(text(&result), "Connection 'staging' added successfully");

    let result = service
        .call_tool(request("list_databricks_connections", json!({})))
        .await?;
    let listed = text(&result);
    let default_at = listed.find("default (default)").unwrap();
    let staging_at = listed.find("staging: https://b/").unwrap();
    assert!(default_at < staging_at);
    assert!(!listed.contains("t2"));

    service.cancel().await?;
    Ok(())
}

#[tokio::test]
async fn unknown_connection_is_an_error() -> Result<()> {
    let provider = DatabricksProvider::new(registry());
    let service = ().serve(TokioInProcess::new(provider).await?).await?;

    let result = service
        .call_tool(request("list_catalogs", json!({"connection_name": "missing"})))
        .await;
    let error = tool_error(result);
    assert_eq!(error.code, ErrorCode::INVALID_PARAMS);
    assert_eq!(error.data, Some(json!({"kind": "UnknownConnection"})));
    assert!(error.message.contains("missing"));

    let result = service
        .call_tool(request(
            "add_databricks_connection",
            json!({"name": "broken", "host": "", "token": "t"}),
        ))
        .await;
    let error = tool_error(result);
    assert_eq!(error.code, ErrorCode::INVALID_PARAMS);
    assert_eq!(error.data, Some(json!({"kind": "ValidationError"})));

    service.cancel().await?;
    Ok(())
}
