//! The toolkit: one pool, four tools.

use crate::config::{DEFAULT_QUERY_TIMEOUT_SECS, DEFAULT_ROW_LIMIT, DEFAULT_SAMPLE_ROWS, Locale};
use crate::db::{DbPool, QueryExecutor, QueryValidator, SchemaIntrospector};
use crate::error::{DbError, DbResult};
use crate::tools::adapter::{parse_args, run_blocking};
use crate::tools::{
    ListTablesArgs, ListTablesTool, Messages, QueryArgs, QueryCheckerTool, QueryTool, SqlTool,
    TableSchemaArgs, TableSchemaTool, ToolKind, ToolSpec,
};
use serde_json::Value as JsonValue;
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ToolkitOptions {
    /// Lift the read-only statement allowlist.
    pub writable: bool,
    pub query_timeout: Duration,
    pub row_limit: u32,
    pub sample_rows: u32,
    pub locale: Locale,
}

impl Default for ToolkitOptions {
    fn default() -> Self {
        Self {
            writable: false,
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
            row_limit: DEFAULT_ROW_LIMIT,
            sample_rows: DEFAULT_SAMPLE_ROWS,
            locale: Locale::default(),
        }
    }
}

/// A tool invocation with validated arguments.
#[derive(Debug, Clone)]
pub enum ToolCall {
    ListTables(ListTablesArgs),
    Schema(TableSchemaArgs),
    Query(QueryArgs),
    QueryChecker(QueryArgs),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ToolCallError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: {detail}")]
    InvalidArguments { tool: ToolKind, detail: String },
}

impl ToolCall {
    /// Resolve a tool by name and decode its arguments.
    pub fn parse(name: &str, arguments: JsonValue) -> Result<Self, ToolCallError> {
        let kind =
            ToolKind::from_name(name).ok_or_else(|| ToolCallError::UnknownTool(name.to_string()))?;
        let invalid = |detail| ToolCallError::InvalidArguments { tool: kind, detail };
        Ok(match kind {
            ToolKind::ListTables => Self::ListTables(parse_args(arguments).map_err(invalid)?),
            ToolKind::Schema => Self::Schema(parse_args(arguments).map_err(invalid)?),
            ToolKind::Query => Self::Query(parse_args(arguments).map_err(invalid)?),
            ToolKind::QueryChecker => Self::QueryChecker(parse_args(arguments).map_err(invalid)?),
        })
    }

    pub fn kind(&self) -> ToolKind {
        match self {
            Self::ListTables(_) => ToolKind::ListTables,
            Self::Schema(_) => ToolKind::Schema,
            Self::Query(_) => ToolKind::Query,
            Self::QueryChecker(_) => ToolKind::QueryChecker,
        }
    }
}

pub struct SqlToolkit {
    pool: DbPool,
    messages: Messages,
    handle: Handle,
    list_tables: ListTablesTool,
    table_schema: TableSchemaTool,
    query: QueryTool,
    query_checker: QueryCheckerTool,
}

impl SqlToolkit {
    /// Build the toolkit on the current Tokio runtime.
    pub fn new(pool: DbPool, options: ToolkitOptions) -> DbResult<Self> {
        let handle = Handle::try_current()
            .map_err(|e| DbError::internal(format!("no Tokio runtime: {e}")))?;
        Ok(Self::with_handle(pool, options, handle))
    }

    pub fn with_handle(pool: DbPool, options: ToolkitOptions, handle: Handle) -> Self {
        let messages = Messages::new(options.locale);
        let introspector = SchemaIntrospector::new(pool.clone())
            .with_timeout(options.query_timeout)
            .with_sample_rows(options.sample_rows);
        let executor = QueryExecutor::new(pool.clone(), options.writable)
            .with_timeout(options.query_timeout)
            .with_row_limit(options.row_limit);
        let validator =
            QueryValidator::new(pool.clone(), options.writable).with_timeout(options.query_timeout);

        Self {
            list_tables: ListTablesTool::new(introspector.clone(), messages, handle.clone()),
            table_schema: TableSchemaTool::new(introspector, messages, handle.clone()),
            query: QueryTool::new(executor, messages, handle.clone()),
            query_checker: QueryCheckerTool::new(validator, messages, handle.clone()),
            pool,
            messages,
            handle,
        }
    }

    pub fn messages(&self) -> Messages {
        self.messages
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn list_tables(&self) -> &ListTablesTool {
        &self.list_tables
    }

    pub fn table_schema(&self) -> &TableSchemaTool {
        &self.table_schema
    }

    pub fn query(&self) -> &QueryTool {
        &self.query
    }

    pub fn query_checker(&self) -> &QueryCheckerTool {
        &self.query_checker
    }

    /// Specs of all four tools, in a fixed order.
    pub fn specs(&self) -> Vec<ToolSpec> {
        vec![
            self.list_tables.spec(),
            self.table_schema.spec(),
            self.query.spec(),
            self.query_checker.spec(),
        ]
    }

    pub async fn dispatch(&self, call: ToolCall) -> String {
        debug!(tool = %call.kind(), "Dispatching tool call");
        match call {
            ToolCall::ListTables(args) => self.list_tables.call(args).await,
            ToolCall::Schema(args) => self.table_schema.call(args).await,
            ToolCall::Query(args) => self.query.call(args).await,
            ToolCall::QueryChecker(args) => self.query_checker.call(args).await,
        }
    }

    /// Blocking counterpart of [`SqlToolkit::dispatch`].
    pub fn dispatch_blocking(&self, call: ToolCall) -> String {
        let kind = call.kind();
        run_blocking(&self.handle, self.dispatch(call))
            .unwrap_or_else(|e| self.messages.error(kind, &e))
    }

    /// Resolve `name`, decode `arguments`, and run the tool.
    pub async fn call(&self, name: &str, arguments: JsonValue) -> String {
        match ToolCall::parse(name, arguments) {
            Ok(call) => self.dispatch(call).await,
            Err(e) => self.render_call_error(&e),
        }
    }

    fn render_call_error(&self, err: &ToolCallError) -> String {
        match err {
            ToolCallError::UnknownTool(name) => self.messages.unknown_tool(name),
            ToolCallError::InvalidArguments { tool, detail } => {
                self.messages.invalid_arguments(*tool, detail)
            }
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_tool_call() {
        let call = ToolCall::parse("sql_db_query", json!({"query": "SELECT 1"})).unwrap();
        assert_eq!(call.kind(), ToolKind::Query);

        let call = ToolCall::parse("sql_db_list_tables", JsonValue::Null).unwrap();
        assert_eq!(call.kind(), ToolKind::ListTables);

        assert_eq!(
            ToolCall::parse("drop_everything", json!({})).unwrap_err(),
            ToolCallError::UnknownTool("drop_everything".to_string())
        );

        let err = ToolCall::parse("sql_db_schema", json!({"table_names": {"a": 1}})).unwrap_err();
        assert!(matches!(
            err,
            ToolCallError::InvalidArguments {
                tool: ToolKind::Schema,
                ..
            }
        ));
    }
}
