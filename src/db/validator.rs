//! Dry-run validation of SQL text.
//!
//! Statements are parsed locally, then server-prepared. Preparing a statement
//! parses and describes it on the server without running it, so validation
//! never changes data or schema.

use crate::config::DEFAULT_QUERY_TIMEOUT_SECS;
use crate::db::pool::DbPool;
use crate::db::statement;
use crate::error::{DbError, DbResult};
use crate::models::{InvalidKind, ValidationOutcome};
use sqlx::Executor;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// MySQL: "This command is not supported in the prepared statement protocol yet".
const MYSQL_ER_UNSUPPORTED_PS: u16 = 1295;

#[derive(Debug, Clone)]
pub struct QueryValidator {
    pool: DbPool,
    writable: bool,
    timeout: Duration,
}

impl QueryValidator {
    pub fn new(pool: DbPool, writable: bool) -> Self {
        Self {
            pool,
            writable,
            timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check `sql` without executing it.
    ///
    /// Statement defects come back as [`ValidationOutcome::Invalid`]; `Err` is
    /// reserved for empty input and for failures to reach the database.
    pub async fn validate(&self, sql: &str) -> DbResult<ValidationOutcome> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Err(DbError::invalid_argument("no query provided"));
        }

        let db_type = self.pool.db_type();
        let statements = match statement::parse(sql, db_type) {
            Ok(statements) if statements.is_empty() => {
                return Err(DbError::invalid_argument("no query provided"));
            }
            Ok(statements) => statements,
            Err(DbError::QuerySyntax { message, position }) => {
                return Ok(ValidationOutcome::Invalid {
                    kind: InvalidKind::Syntax,
                    message,
                    position,
                });
            }
            Err(e) => return Err(e),
        };

        if !self.writable {
            if let Err(e) = statement::check_read_only(&statements) {
                return Ok(ValidationOutcome::Invalid {
                    kind: InvalidKind::Blocked,
                    message: e.to_string(),
                    position: None,
                });
            }
        }

        // A single statement is prepared verbatim; several are prepared one by
        // one from their parsed rendering.
        let texts: Vec<String> = if statements.len() == 1 {
            vec![sql.trim_end_matches(';').trim_end().to_string()]
        } else {
            statements.iter().map(|s| s.to_string()).collect()
        };

        for text in &texts {
            debug!(sql = %text, "Preparing statement");
            let prepared = timeout(self.timeout, self.prepare(text)).await;
            match prepared {
                Ok(Ok(())) => {}
                Ok(Err(sqlx::Error::Database(db_err))) => {
                    if is_unsupported_prepare(db_err.as_ref()) {
                        debug!("Statement cannot be prepared; keeping the parser verdict");
                        continue;
                    }
                    return Ok(ValidationOutcome::Invalid {
                        kind: InvalidKind::Rejected,
                        message: db_err.message().to_string(),
                        position: None,
                    });
                }
                Ok(Err(e)) => return Err(DbError::from(e)),
                Err(_) => {
                    return Err(DbError::timeout("query validation", self.timeout));
                }
            }
        }

        let normalized = statements
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(";\n");
        Ok(ValidationOutcome::Valid {
            normalized: Some(normalized),
        })
    }

    async fn prepare(&self, sql: &str) -> Result<(), sqlx::Error> {
        impl_db_dispatch!(&self.pool, {
            MySql(p) => p.prepare(sql).await.map(drop),
            Postgres(p) => p.prepare(sql).await.map(drop),
            SQLite(p) => p.prepare(sql).await.map(drop),
        })
    }
}

fn is_unsupported_prepare(err: &dyn sqlx::error::DatabaseError) -> bool {
    err.try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>()
        .is_some_and(|e| e.number() == MYSQL_ER_UNSUPPORTED_PS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> DbPool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("CREATE TABLE t_student (id INTEGER PRIMARY KEY, name TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        DbPool::SQLite(pool)
    }

    #[tokio::test]
    async fn test_valid_select() {
        let validator = QueryValidator::new(memory_pool().await, false);
        let outcome = validator
            .validate("select name from t_student where id = 1;")
            .await
            .unwrap();
        match outcome {
            ValidationOutcome::Valid { normalized } => {
                assert_eq!(
                    normalized.as_deref(),
                    Some("SELECT name FROM t_student WHERE id = 1")
                );
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_syntax_error_has_position() {
        let validator = QueryValidator::new(memory_pool().await, false);
        let outcome = validator.validate("SELECT * FROM\nWHERE").await.unwrap();
        match outcome {
            ValidationOutcome::Invalid {
                kind: InvalidKind::Syntax,
                position,
                ..
            } => assert_eq!(position.map(|p| p.line), Some(2)),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_table_rejected_by_database() {
        let validator = QueryValidator::new(memory_pool().await, false);
        let outcome = validator.validate("SELECT * FROM nope").await.unwrap();
        match outcome {
            ValidationOutcome::Invalid {
                kind: InvalidKind::Rejected,
                message,
                ..
            } => assert!(message.contains("nope"), "{message}"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_drop_blocked_on_read_only() {
        let validator = QueryValidator::new(memory_pool().await, false);
        let outcome = validator.validate("DROP TABLE t_student").await.unwrap();
        assert!(matches!(
            outcome,
            ValidationOutcome::Invalid {
                kind: InvalidKind::Blocked,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_drop_prepared_not_executed_when_writable() {
        let pool = memory_pool().await;
        let validator = QueryValidator::new(pool.clone(), true);
        let outcome = validator.validate("DROP TABLE t_student").await.unwrap();
        assert!(outcome.is_valid());

        let DbPool::SQLite(p) = &pool else {
            unreachable!()
        };
        let count: i64 =
            sqlx::query_scalar("SELECT count(*) FROM sqlite_master WHERE name = 't_student'")
                .fetch_one(p)
                .await
                .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let validator = QueryValidator::new(memory_pool().await, false);
        let err = validator.validate("  ").await.unwrap_err();
        assert!(matches!(err, DbError::InvalidArgument { .. }));
    }
}
