//! `sql_db_list_tables`.

use crate::db::SchemaIntrospector;
use crate::tools::messages::Messages;
use crate::tools::{SqlTool, ToolKind};
use schemars::JsonSchema;
use serde::Deserialize;
use tokio::runtime::Handle;
use tracing::{info, warn};

/// The tool takes no arguments.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ListTablesArgs {}

pub struct ListTablesTool {
    introspector: SchemaIntrospector,
    messages: Messages,
    handle: Handle,
}

impl ListTablesTool {
    pub fn new(introspector: SchemaIntrospector, messages: Messages, handle: Handle) -> Self {
        Self {
            introspector,
            messages,
            handle,
        }
    }
}

impl SqlTool for ListTablesTool {
    type Args = ListTablesArgs;

    const KIND: ToolKind = ToolKind::ListTables;

    fn messages(&self) -> Messages {
        self.messages
    }

    fn runtime(&self) -> &Handle {
        &self.handle
    }

    async fn call(&self, _args: ListTablesArgs) -> String {
        match self.introspector.list_tables().await {
            Ok(tables) => {
                info!(count = tables.len(), "Listed tables");
                self.messages.table_list(&tables)
            }
            Err(e) => {
                warn!(error = %e, "Listing tables failed");
                self.messages.error(Self::KIND, &e)
            }
        }
    }
}
