//! Query execution engine.
//!
//! Runs one SQL text against the pool with:
//! - Row limits (enforced via streaming - only fetches needed rows)
//! - Query timeouts
//! - A statement allowlist on read-only connections
//!
//! # Architecture
//!
//! Raw SQL goes through `Executor::fetch_many`, so statements that yield no
//! result set still report their affected-row count. Each backend submodule
//! drains the stream with the same [`drain`] helper.

use crate::config::{DEFAULT_QUERY_TIMEOUT_SECS, DEFAULT_ROW_LIMIT, MAX_ROW_LIMIT};
use crate::db::pool::DbPool;
use crate::db::statement;
use crate::db::types::RowToJson;
use crate::error::{DbError, DbResult};
use crate::models::QueryResult;
use futures_util::{Stream, StreamExt};
use sqlx::Either;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Executes caller-supplied SQL.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    pool: DbPool,
    writable: bool,
    timeout: Duration,
    row_limit: u32,
}

impl QueryExecutor {
    /// Create an executor. On a read-only connection (`writable == false`)
    /// only read statements are run.
    pub fn new(pool: DbPool, writable: bool) -> Self {
        Self {
            pool,
            writable,
            timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
            row_limit: DEFAULT_ROW_LIMIT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Maximum rows kept per result; clamped to `1..=MAX_ROW_LIMIT`.
    pub fn with_row_limit(mut self, row_limit: u32) -> Self {
        self.row_limit = row_limit.clamp(1, MAX_ROW_LIMIT);
        self
    }

    pub fn row_limit(&self) -> u32 {
        self.row_limit
    }

    /// Execute `sql` and collect its result.
    ///
    /// When the text holds several statements, the rows of the last statement
    /// are kept (an empty last set wins over earlier rows) and affected-row
    /// counts are summed.
    pub async fn execute(&self, sql: &str) -> DbResult<QueryResult> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Err(DbError::invalid_argument("no query provided"));
        }

        if !self.writable {
            statement::ensure_read_only(sql, self.pool.db_type())?;
        }

        debug!(
            sql = %sql,
            limit = self.row_limit,
            timeout_secs = self.timeout.as_secs(),
            "Executing query"
        );

        let start = Instant::now();
        let limit = self.row_limit;
        let result = timeout(self.timeout, async {
            impl_db_dispatch!(&self.pool, {
                MySql(p) => mysql::run(p, sql, limit).await.map(|(rows, affected)| build_result(rows, affected, limit, start)),
                Postgres(p) => postgres::run(p, sql, limit).await.map(|(rows, affected)| build_result(rows, affected, limit, start)),
                SQLite(p) => sqlite::run(p, sql, limit).await.map(|(rows, affected)| build_result(rows, affected, limit, start)),
            })
        })
        .await;

        match result {
            Ok(result) => result,
            Err(_) => Err(DbError::timeout("query execution", self.timeout)),
        }
    }
}

/// Collect rows from a `fetch_many` stream, stopping once `row_limit + 1`
/// rows of one result set have arrived.
///
/// Each statement ends with an `Either::Left`; the rows buffered since the
/// previous one become the candidate result.
async fn drain<S, Q, R>(
    mut stream: S,
    row_limit: u32,
    rows_affected: fn(&Q) -> u64,
) -> DbResult<(Vec<R>, u64)>
where
    S: Stream<Item = Result<Either<Q, R>, sqlx::Error>> + Unpin,
{
    let fetch_limit = row_limit as usize + 1;
    let mut current = Vec::new();
    let mut last = Vec::new();
    let mut affected = 0u64;

    while let Some(item) = stream.next().await {
        match item? {
            Either::Left(done) => {
                affected += rows_affected(&done);
                last = std::mem::take(&mut current);
            }
            Either::Right(row) => {
                current.push(row);
                if current.len() >= fetch_limit {
                    return Ok((current, affected));
                }
            }
        }
    }

    // Rows with no completion after them still belong to the last statement
    if !current.is_empty() {
        last = current;
    }
    Ok((last, affected))
}

fn build_result<R: RowToJson>(
    rows: Vec<R>,
    rows_affected: u64,
    row_limit: u32,
    start: Instant,
) -> QueryResult {
    let execution_time_ms = start.elapsed().as_millis() as u64;
    let Some(first) = rows.first() else {
        return QueryResult::affected(rows_affected, execution_time_ms);
    };

    let columns = first.column_metadata();
    let truncated = rows.len() > row_limit as usize;
    if truncated {
        warn!(limit = row_limit, "Query result truncated");
    }

    QueryResult {
        columns,
        rows: rows
            .iter()
            .take(row_limit as usize)
            .map(|r| r.to_json_values())
            .collect(),
        rows_affected,
        truncated,
        execution_time_ms,
    }
}

// Each module below provides the same interface adapted to its database type.

mod mysql {
    use super::*;
    use sqlx::mysql::{MySqlQueryResult, MySqlRow};
    use sqlx::{Executor, MySqlPool};

    pub async fn run(pool: &MySqlPool, sql: &str, row_limit: u32) -> DbResult<(Vec<MySqlRow>, u64)> {
        drain(pool.fetch_many(sql), row_limit, MySqlQueryResult::rows_affected).await
    }
}

mod postgres {
    use super::*;
    use sqlx::postgres::{PgQueryResult, PgRow};
    use sqlx::{Executor, PgPool};

    pub async fn run(pool: &PgPool, sql: &str, row_limit: u32) -> DbResult<(Vec<PgRow>, u64)> {
        drain(pool.fetch_many(sql), row_limit, PgQueryResult::rows_affected).await
    }
}

mod sqlite {
    use super::*;
    use sqlx::sqlite::{SqliteQueryResult, SqliteRow};
    use sqlx::{Executor, SqlitePool};

    pub async fn run(
        pool: &SqlitePool,
        sql: &str,
        row_limit: u32,
    ) -> DbResult<(Vec<SqliteRow>, u64)> {
        drain(pool.fetch_many(sql), row_limit, SqliteQueryResult::rows_affected).await
    }
}
