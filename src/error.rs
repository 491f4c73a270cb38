//! Error types for the SQL agent tools.
//!
//! Components return [`DbResult`] to the tool adapters. Only the adapters turn
//! a [`DbError`] into the string the agent sees, so every variant carries a
//! message an agent can act on.

use std::time::Duration;
use thiserror::Error;

/// Position of a syntax problem inside the submitted SQL text (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlPosition {
    pub line: u64,
    pub column: u64,
}

impl std::fmt::Display for SqlPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

fn at_position(position: &Option<SqlPosition>) -> String {
    position.map(|p| format!(" at {p}")).unwrap_or_default()
}

fn exceeded(limit: &Option<Duration>) -> String {
    match limit {
        Some(d) if d.subsec_millis() == 0 => format!(" exceeded {}s", d.as_secs()),
        Some(d) => format!(" exceeded {}ms", d.as_millis()),
        None => " timed out".to_string(),
    }
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Catalog query failed: {message}")]
    Introspection { message: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Syntax error: {message}{}", at_position(.position))]
    QuerySyntax {
        message: String,
        position: Option<SqlPosition>,
    },

    #[error("Execution failed: {message}")]
    Execution {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Permission denied: {operation} - {reason}")]
    Permission { operation: String, reason: String },

    #[error("Timeout: {operation}{}", exceeded(.limit))]
    Timeout {
        operation: String,
        /// None when the bound is not known here (pool acquire)
        limit: Option<Duration>,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn introspection(message: impl Into<String>) -> Self {
        Self::Introspection {
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn syntax(message: impl Into<String>, position: Option<SqlPosition>) -> Self {
        Self::QuerySyntax {
            message: message.into(),
            position,
        }
    }

    /// Create an execution error with optional SQL state.
    pub fn execution(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Execution {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    pub fn permission(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Permission {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, limit: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            limit: Some(limit),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Wrap any failure that happened while reading catalog metadata.
    ///
    /// Connection problems keep their own variant so the suggestion survives.
    pub fn into_introspection(self) -> Self {
        match self {
            Self::Connection { .. } | Self::Timeout { .. } | Self::Introspection { .. } => self,
            Self::Execution {
                message, sql_state, ..
            } => Self::introspection(match sql_state {
                Some(code) => format!("{message} (SQLSTATE: {code})"),
                None => message,
            }),
            other => Self::introspection(other.to_string()),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Execution { suggestion, .. } if !suggestion.is_empty() => Some(suggestion),
            Self::Timeout { .. } => {
                Some("Consider increasing the timeout or narrowing the query")
            }
            _ => None,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                let message = db_err.message().to_string();
                if is_syntax_error(code.as_deref(), &message) {
                    DbError::syntax(message, None)
                } else {
                    DbError::execution(
                        message,
                        code,
                        "Check the referenced tables and columns with sql_db_schema",
                    )
                }
            }
            sqlx::Error::RowNotFound => DbError::execution(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            sqlx::Error::PoolTimedOut => DbError::Timeout {
                operation: "connection pool acquire".to_string(),
                limit: None,
            },
            sqlx::Error::PoolClosed => {
                DbError::connection("Connection pool is closed", "Restart the tool server")
            }
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::TypeNotFound { type_name } => {
                DbError::execution(format!("Type not found: {}", type_name), None, "")
            }
            sqlx::Error::ColumnNotFound(col) => {
                DbError::execution(format!("Column not found: {}", col), None, "")
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => DbError::internal(format!(
                "Column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// SQLSTATE 42601 is the standard syntax error class; MySQL uses 42000 with a
/// "syntax" message, SQLite has no codes at all.
fn is_syntax_error(code: Option<&str>, message: &str) -> bool {
    code == Some("42601") || message.to_ascii_lowercase().contains("syntax")
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DbError::connection("Failed to connect", "Check credentials");
        assert!(err.to_string().contains("Connection failed"));
    }

    #[test]
    fn test_syntax_error_display_with_position() {
        let err = DbError::syntax(
            "Expected: an expression, found: FROM",
            Some(SqlPosition { line: 1, column: 8 }),
        );
        assert_eq!(
            err.to_string(),
            "Syntax error: Expected: an expression, found: FROM at line 1, column 8"
        );

        let err = DbError::syntax("near \"SELEC\"", None);
        assert_eq!(err.to_string(), "Syntax error: near \"SELEC\"");
    }

    #[test]
    fn test_error_suggestion() {
        let err = DbError::execution(
            "Table 'x' doesn't exist",
            Some("42S02".to_string()),
            "Check table names",
        );
        assert_eq!(err.suggestion(), Some("Check table names"));
        assert!(DbError::invalid_argument("empty").suggestion().is_none());
    }

    #[test]
    fn test_error_retryable() {
        assert!(DbError::timeout("query", Duration::from_secs(30)).is_retryable());
        assert!(DbError::connection("err", "sugg").is_retryable());
        assert!(!DbError::permission("write", "read-only").is_retryable());
    }

    #[test]
    fn test_syntax_detection() {
        assert!(is_syntax_error(Some("42601"), "whatever"));
        assert!(is_syntax_error(
            Some("42000"),
            "You have an error in your SQL syntax"
        ));
        assert!(is_syntax_error(None, "near \"SELEC\": syntax error"));
        assert!(!is_syntax_error(Some("42P01"), "relation \"x\" does not exist"));
    }

    #[test]
    fn test_into_introspection() {
        let err = DbError::execution("access denied", Some("42000".into()), "").into_introspection();
        assert!(matches!(err, DbError::Introspection { ref message } if message.contains("42000")));

        let err = DbError::connection("refused", "start server").into_introspection();
        assert!(matches!(err, DbError::Connection { .. }));

        let err = DbError::internal("decode").into_introspection();
        assert!(matches!(err, DbError::Introspection { .. }));
    }

    #[test]
    fn test_timeout_display() {
        let err = DbError::timeout("query execution", Duration::from_secs(30));
        assert_eq!(err.to_string(), "Timeout: query execution exceeded 30s");

        let err = DbError::timeout("query execution", Duration::from_millis(250));
        assert_eq!(err.to_string(), "Timeout: query execution exceeded 250ms");

        let err = DbError::from(sqlx::Error::PoolTimedOut);
        assert_eq!(err.to_string(), "Timeout: connection pool acquire timed out");
        assert!(err.is_retryable());
    }
}
