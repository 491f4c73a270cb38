//! MCP service exposing the SQL toolkit.
//!
//! Tool listings come from [`SqlToolkit::specs`], so descriptions follow the
//! configured locale. Every call result is a single text block; tool failures
//! are ordinary text as well, so the agent can read them and retry.

use crate::tools::{SqlToolkit, ToolSpec};
use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    model::{
        CallToolRequestParam, CallToolResult, Content, Implementation, JsonObject,
        ListToolsResult, PaginatedRequestParam, ProtocolVersion, ServerCapabilities, ServerInfo,
        Tool,
    },
    service::RequestContext,
};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct SqlAgentService {
    toolkit: Arc<SqlToolkit>,
}

impl SqlAgentService {
    pub fn new(toolkit: Arc<SqlToolkit>) -> Self {
        Self { toolkit }
    }

    /// MCP tool descriptors for the four tools.
    pub fn tools(&self) -> Vec<Tool> {
        self.toolkit.specs().into_iter().map(to_mcp_tool).collect()
    }

    /// Run a tool by name. Unknown names and bad arguments come back as text.
    pub async fn call(&self, name: &str, arguments: Option<JsonObject>) -> CallToolResult {
        let arguments = arguments.map(JsonValue::Object).unwrap_or(JsonValue::Null);
        info!(tool = %name, "Tool call");
        let text = self.toolkit.call(name, arguments).await;
        CallToolResult::success(vec![Content::text(text)])
    }
}

fn to_mcp_tool(spec: ToolSpec) -> Tool {
    let schema = match spec.input_schema {
        JsonValue::Object(map) => map,
        _ => JsonObject::new(),
    };
    Tool::new(spec.name, spec.description, Arc::new(schema))
}

impl ServerHandler for SqlAgentService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "sql-agent-tools".to_owned(),
                title: Some("SQL Agent Tools".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Tools for answering questions from a SQL database.\n\
                \n\
                ## Workflow\n\
                1. `sql_db_list_tables` to see which tables exist and what they hold\n\
                2. `sql_db_schema` with the relevant table names (comma-separated)\n\
                3. `sql_db_query_checker` to check the query you wrote\n\
                4. `sql_db_query` to run it\n\
                \n\
                Errors come back as text. Rewrite the query and try again.\n\
                Connections are read-only unless the server was started with `?writable=true`."
                    .to_string(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult::with_all_items(self.tools()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.call(&request.name, request.arguments).await)
    }
}
