//! `sql_db_query`.

use crate::db::QueryExecutor;
use crate::tools::format::format_result;
use crate::tools::messages::Messages;
use crate::tools::{SqlTool, ToolKind};
use schemars::JsonSchema;
use serde::Deserialize;
use tokio::runtime::Handle;
use tracing::{info, warn};

/// Arguments of `sql_db_query` and `sql_db_query_checker`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct QueryArgs {
    /// A detailed and correct SQL query.
    #[serde(default)]
    pub query: Option<String>,
}

impl QueryArgs {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
        }
    }

    pub(crate) fn sql(&self) -> &str {
        self.query.as_deref().unwrap_or_default()
    }
}

pub struct QueryTool {
    executor: QueryExecutor,
    messages: Messages,
    handle: Handle,
}

impl QueryTool {
    pub fn new(executor: QueryExecutor, messages: Messages, handle: Handle) -> Self {
        Self {
            executor,
            messages,
            handle,
        }
    }
}

impl SqlTool for QueryTool {
    type Args = QueryArgs;

    const KIND: ToolKind = ToolKind::Query;

    fn messages(&self) -> Messages {
        self.messages
    }

    fn runtime(&self) -> &Handle {
        &self.handle
    }

    async fn call(&self, args: QueryArgs) -> String {
        match self.executor.execute(args.sql()).await {
            Ok(result) => {
                info!(
                    rows = result.row_count(),
                    rows_affected = result.rows_affected,
                    truncated = result.truncated,
                    elapsed_ms = result.execution_time_ms,
                    "Query executed"
                );
                let mut text = format_result(&result);
                if result.truncated {
                    text.push('\n');
                    text.push_str(&self.messages.truncated(self.executor.row_limit()));
                }
                text
            }
            Err(e) => {
                warn!(error = %e, "Query failed");
                self.messages.error(Self::KIND, &e)
            }
        }
    }
}
