//! Semantic search MCP server implementation

use anyhow::Result;
use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use wisetask_search::{
    BulkIndexRequest, PluginBulkIndexRequest, SearchError, SearchRequest, SemanticIndex,
};

/// Semantic search MCP service
#[derive(Clone)]
pub struct WisetaskService {
    index: Arc<SemanticIndex>,
    tool_router: ToolRouter<Self>,
}

impl WisetaskService {
    pub fn new(index: Arc<SemanticIndex>) -> Self {
        Self {
            index,
            tool_router: Self::tool_router(),
        }
    }
}

fn to_mcp_error(context: &str, err: SearchError) -> McpError {
    if err.is_validation() {
        McpError::invalid_params(err.to_string(), None)
    } else {
        McpError::internal_error(format!("{}: {}", context, err), None)
    }
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let output = serde_json::to_string_pretty(value).map_err(|e| {
        McpError::internal_error(format!("JSON serialization failed: {}", e), None)
    })?;
    Ok(CallToolResult::success(vec![Content::text(output)]))
}

#[tool_router]
impl WisetaskService {
    /// Bulk index tasks
    #[tool(description = "Index tasks for semantic search. Re-indexing an existing id replaces its content. Returns the number of tasks indexed.")]
    async fn index_tasks(
        &self,
        params: Parameters<BulkIndexRequest>,
    ) -> Result<CallToolResult, McpError> {
        let count = self
            .index
            .bulk_index_tasks(params.0.tasks)
            .map_err(|e| to_mcp_error("Task indexing failed", e))?;
        json_result(&count)
    }

    /// Search tasks by meaning
    #[tool(description = "Search indexed tasks by semantic similarity to a natural language query. Returns up to top_k tasks (default 3) with a similarity score.")]
    async fn search_tasks(
        &self,
        params: Parameters<SearchRequest>,
    ) -> Result<CallToolResult, McpError> {
        let results = self
            .index
            .search_tasks(&params.0.query, params.0.top_k)
            .map_err(|e| to_mcp_error("Task search failed", e))?;
        json_result(&results)
    }

    /// Bulk index plugins
    #[tool(description = "Index plugins for semantic search. Re-indexing an existing id replaces its content. Returns the number of plugins indexed.")]
    async fn index_plugins(
        &self,
        params: Parameters<PluginBulkIndexRequest>,
    ) -> Result<CallToolResult, McpError> {
        let count = self
            .index
            .bulk_index_plugins(params.0.plugins)
            .map_err(|e| to_mcp_error("Plugin indexing failed", e))?;
        json_result(&count)
    }

    /// Search plugins by meaning
    #[tool(description = "Search indexed plugins by semantic similarity to a natural language query. Returns up to top_k plugins (default 3) with a similarity score.")]
    async fn search_plugins(
        &self,
        params: Parameters<SearchRequest>,
    ) -> Result<CallToolResult, McpError> {
        let results = self
            .index
            .search_plugins(&params.0.query, params.0.top_k)
            .map_err(|e| to_mcp_error("Plugin search failed", e))?;
        json_result(&results)
    }

    /// Liveness check
    #[tool(description = "Liveness check. Returns {\"status\": \"ok\"}.")]
    async fn health(&self) -> Result<CallToolResult, McpError> {
        json_result(&self.index.health())
    }

    /// Index statistics
    #[tool(description = "Get index statistics: record counts per namespace and the embedding model the index was built with.")]
    async fn status(&self) -> Result<CallToolResult, McpError> {
        let stats = self
            .index
            .status()
            .map_err(|e| to_mcp_error("Status failed", e))?;

        let namespaces: serde_json::Map<String, serde_json::Value> = stats
            .namespaces
            .iter()
            .map(|ns| {
                (
                    ns.namespace.to_string(),
                    serde_json::json!({ "count": ns.count, "last_indexed": ns.last_indexed }),
                )
            })
            .collect();

        json_result(&serde_json::json!({
            "namespaces": namespaces,
            "model_id": stats.model_id,
            "dimension": stats.dimension,
        }))
    }
}

#[tool_handler]
impl ServerHandler for WisetaskService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Semantic search over tasks and plugins. Index records with index_tasks / index_plugins, then query with search_tasks / search_plugins.".to_string()
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

/// Run the MCP server on stdio. The index must already be warmed up.
pub async fn run_mcp_server(index: SemanticIndex) -> Result<()> {
    use tokio::io::{stdin, stdout};

    info!("Starting MCP server on stdio");
    let service = WisetaskService::new(Arc::new(index));
    let transport = (stdin(), stdout());
    let server = service.serve(transport).await?;
    server.waiting().await?;

    Ok(())
}
