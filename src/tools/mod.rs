//! Agent-facing SQL tools.
//!
//! - `sql_db_list_tables`: list tables with their descriptions
//! - `sql_db_schema`: schema text and sample rows for some or all tables
//! - `sql_db_query`: execute a query
//! - `sql_db_query_checker`: dry-run a query
//!
//! [`SqlToolkit`] owns all four and dispatches [`ToolCall`]s to them.

pub mod adapter;
pub mod format;
pub mod list_tables;
pub mod messages;
pub mod query;
pub mod query_checker;
pub mod table_schema;
pub mod toolkit;

pub use adapter::{SqlTool, ToolSpec};
pub use list_tables::{ListTablesArgs, ListTablesTool};
pub use messages::Messages;
pub use query::{QueryArgs, QueryTool};
pub use query_checker::QueryCheckerTool;
pub use table_schema::{TableNames, TableSchemaArgs, TableSchemaTool};
pub use toolkit::{SqlToolkit, ToolCall, ToolkitOptions};

/// The four tools, by stable name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    ListTables,
    Schema,
    Query,
    QueryChecker,
}

impl ToolKind {
    pub const ALL: [ToolKind; 4] = [
        ToolKind::ListTables,
        ToolKind::Schema,
        ToolKind::Query,
        ToolKind::QueryChecker,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::ListTables => "sql_db_list_tables",
            Self::Schema => "sql_db_schema",
            Self::Query => "sql_db_query",
            Self::QueryChecker => "sql_db_query_checker",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
