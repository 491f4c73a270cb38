//! `sql_db_schema`.

use crate::db::SchemaIntrospector;
use crate::tools::messages::Messages;
use crate::tools::{SqlTool, ToolKind};
use schemars::JsonSchema;
use serde::Deserialize;
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Table names as a comma-separated string or as a list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum TableNames {
    /// e.g. "t_student, t_rolemodel"
    Csv(String),
    List(Vec<String>),
}

impl TableNames {
    /// Split, trim and drop empty entries. Duplicates keep their first position.
    pub fn into_names(self) -> Vec<String> {
        let raw: Vec<String> = match self {
            Self::Csv(text) => text.split(',').map(str::to_string).collect(),
            Self::List(list) => list,
        };
        let mut names: Vec<String> = Vec::with_capacity(raw.len());
        for name in raw {
            let name = name.trim();
            if !name.is_empty() && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        names
    }
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct TableSchemaArgs {
    /// Tables to describe. Omit to describe every table.
    #[serde(default)]
    pub table_names: Option<TableNames>,
}

pub struct TableSchemaTool {
    introspector: SchemaIntrospector,
    messages: Messages,
    handle: Handle,
}

impl TableSchemaTool {
    pub fn new(introspector: SchemaIntrospector, messages: Messages, handle: Handle) -> Self {
        Self {
            introspector,
            messages,
            handle,
        }
    }
}

impl SqlTool for TableSchemaTool {
    type Args = TableSchemaArgs;

    const KIND: ToolKind = ToolKind::Schema;

    fn messages(&self) -> Messages {
        self.messages
    }

    fn runtime(&self) -> &Handle {
        &self.handle
    }

    async fn call(&self, args: TableSchemaArgs) -> String {
        let names = args
            .table_names
            .map(TableNames::into_names)
            .unwrap_or_default();
        debug!(tables = ?names, "Describing tables");

        let requested = (!names.is_empty()).then_some(names.as_slice());
        match self.introspector.get_table_schema(requested).await {
            Ok(text) if text.is_empty() && !names.is_empty() => {
                self.messages.no_matching_tables(&names)
            }
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Describing tables failed");
                self.messages.error(Self::KIND, &e)
            }
        }
    }
}
