//! Query and validation result models.

use crate::error::SqlPosition;
use serde::Serialize;
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMetadata {
    pub name: String,
    /// Database-specific type (e.g., "int8", "varchar", "TEXT")
    pub type_name: String,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Outcome of one executed statement. Rows keep column order.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<Vec<JsonValue>>,
    pub rows_affected: u64,
    pub truncated: bool,
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Create a result for statements that produced no result set.
    pub fn affected(rows_affected: u64, execution_time_ms: u64) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            rows_affected,
            truncated: false,
            execution_time_ms,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// True when the statement returned a result set (possibly empty).
    pub fn has_result_set(&self) -> bool {
        !self.columns.is_empty()
    }
}

/// Why a statement failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidKind {
    /// The SQL parser rejected the text.
    Syntax,
    /// The database refused to prepare the statement.
    Rejected,
    /// The statement is not allowed on a read-only connection.
    Blocked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationOutcome {
    Valid {
        /// Canonical rendering of the parsed statements.
        #[serde(skip_serializing_if = "Option::is_none")]
        normalized: Option<String>,
    },
    Invalid {
        kind: InvalidKind,
        message: String,
        #[serde(skip)]
        position: Option<SqlPosition>,
    },
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }
}
