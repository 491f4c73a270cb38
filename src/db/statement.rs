//! Statement parsing and read-only classification.
//!
//! Uses [sqlparser](https://docs.rs/sqlparser/) with the dialect of the
//! connected engine, so formatting tricks cannot hide a write behind a
//! read-looking prefix.

use crate::error::{DbError, DbResult, SqlPosition};
use crate::models::DatabaseType;
use sqlparser::ast::{Query, SetExpr, Statement};
use sqlparser::dialect::{Dialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::{Parser, ParserError};

/// Category of a parsed statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// SELECT, SHOW, DESCRIBE, EXPLAIN of a read
    Read,
    /// INSERT, UPDATE, DELETE, MERGE, COPY
    Write,
    /// CREATE, ALTER, DROP, TRUNCATE, COMMENT
    Ddl,
    /// BEGIN, COMMIT, ROLLBACK, SAVEPOINT
    Transaction,
    /// CALL, EXECUTE, PREPARE
    Procedure,
    /// GRANT, SET, PRAGMA, VACUUM, ATTACH and the like
    Administrative,
    Unknown,
}

impl StatementKind {
    fn reason(self) -> &'static str {
        match self {
            Self::Read => "",
            Self::Write => "Write operations are not allowed on a read-only connection.",
            Self::Ddl => "Schema changes are not allowed on a read-only connection.",
            Self::Transaction => "Transaction control is not allowed on a read-only connection.",
            Self::Procedure => {
                "Procedure calls are not allowed on a read-only connection; their effects cannot be verified."
            }
            Self::Administrative => {
                "Administrative statements are not allowed on a read-only connection."
            }
            Self::Unknown => "Unrecognized statement. Only read queries are allowed.",
        }
    }
}

fn dialect(db_type: DatabaseType) -> Box<dyn Dialect> {
    match db_type {
        DatabaseType::PostgreSQL => Box::new(PostgreSqlDialect {}),
        DatabaseType::MySQL => Box::new(MySqlDialect {}),
        DatabaseType::SQLite => Box::new(SQLiteDialect {}),
    }
}

/// Parse `sql` with the engine's dialect.
///
/// Parser failures become [`DbError::QuerySyntax`] with the line/column the
/// parser reported, when it reported one.
pub fn parse(sql: &str, db_type: DatabaseType) -> DbResult<Vec<Statement>> {
    let dialect = dialect(db_type);
    Parser::parse_sql(dialect.as_ref(), sql).map_err(|e| {
        let message = match &e {
            ParserError::TokenizerError(m) | ParserError::ParserError(m) => m.clone(),
            ParserError::RecursionLimitExceeded => "statement is nested too deeply".to_string(),
        };
        let position = parse_position(&message);
        DbError::syntax(strip_position(&message), position)
    })
}

/// Extract `Line: X, Column: Y` from a sqlparser message.
pub fn parse_position(message: &str) -> Option<SqlPosition> {
    let rest = &message[message.rfind("Line: ")? + "Line: ".len()..];
    let (line, rest) = rest.split_once(", Column: ")?;
    let column: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    Some(SqlPosition {
        line: line.trim().parse().ok()?,
        column: column.parse().ok()?,
    })
}

fn strip_position(message: &str) -> String {
    match message.rfind(" at Line: ") {
        Some(idx) => message[..idx].to_string(),
        None => message.to_string(),
    }
}

/// Classify a parsed statement.
pub fn classify(stmt: &Statement) -> StatementKind {
    use StatementKind::*;

    match stmt {
        Statement::Query(query) if !query_is_read(query) => Write,

        Statement::Query(_)
        | Statement::ShowTables { .. }
        | Statement::ShowColumns { .. }
        | Statement::ShowDatabases { .. }
        | Statement::ShowSchemas { .. }
        | Statement::ShowCreate { .. }
        | Statement::ShowFunctions { .. }
        | Statement::ShowVariable { .. }
        | Statement::ShowVariables { .. }
        | Statement::ShowStatus { .. }
        | Statement::ShowCollation { .. }
        | Statement::ExplainTable { .. } => Read,

        // EXPLAIN ANALYZE runs the inner statement, so it takes the inner kind
        Statement::Explain { statement, .. } => classify(statement),

        Statement::Insert(_)
        | Statement::Update { .. }
        | Statement::Delete(_)
        | Statement::Merge { .. }
        | Statement::Copy { .. }
        | Statement::CopyIntoSnowflake { .. } => Write,

        Statement::CreateTable { .. }
        | Statement::CreateView { .. }
        | Statement::CreateIndex(_)
        | Statement::CreateSchema { .. }
        | Statement::CreateDatabase { .. }
        | Statement::CreateSequence { .. }
        | Statement::CreateType { .. }
        | Statement::CreateFunction { .. }
        | Statement::CreateProcedure { .. }
        | Statement::CreateTrigger { .. }
        | Statement::CreateRole { .. }
        | Statement::CreateVirtualTable { .. }
        | Statement::CreateExtension { .. }
        | Statement::CreatePolicy { .. }
        | Statement::AlterTable { .. }
        | Statement::AlterView { .. }
        | Statement::AlterIndex { .. }
        | Statement::AlterSchema { .. }
        | Statement::AlterRole { .. }
        | Statement::AlterPolicy { .. }
        | Statement::AlterType { .. }
        | Statement::Drop { .. }
        | Statement::DropFunction { .. }
        | Statement::DropProcedure { .. }
        | Statement::DropTrigger { .. }
        | Statement::DropPolicy { .. }
        | Statement::Truncate { .. }
        | Statement::Comment { .. } => Ddl,

        Statement::StartTransaction { .. }
        | Statement::Commit { .. }
        | Statement::Rollback { .. }
        | Statement::Savepoint { .. }
        | Statement::ReleaseSavepoint { .. } => Transaction,

        Statement::Call { .. }
        | Statement::Execute { .. }
        | Statement::Prepare { .. }
        | Statement::Deallocate { .. } => Procedure,

        Statement::Grant { .. }
        | Statement::Revoke { .. }
        | Statement::Set(_)
        | Statement::Use(_)
        | Statement::Kill { .. }
        | Statement::Vacuum { .. }
        | Statement::Analyze { .. }
        | Statement::Discard { .. }
        | Statement::LockTables { .. }
        | Statement::UnlockTables
        | Statement::Flush { .. }
        | Statement::Pragma { .. }
        | Statement::Load { .. }
        | Statement::Install { .. }
        | Statement::OptimizeTable { .. }
        | Statement::AttachDatabase { .. }
        | Statement::LISTEN { .. }
        | Statement::UNLISTEN { .. }
        | Statement::NOTIFY { .. } => Administrative,

        _ => Unknown,
    }
}

/// A query is a read when no part of it writes or takes row locks.
///
/// PostgreSQL accepts `INSERT`/`UPDATE`/`DELETE` inside `WITH`, and
/// `SELECT … INTO` creates a table.
fn query_is_read(query: &Query) -> bool {
    let ctes_read = query
        .with
        .as_ref()
        .is_none_or(|with| with.cte_tables.iter().all(|cte| query_is_read(&cte.query)));
    ctes_read && query.locks.is_empty() && set_expr_is_read(&query.body)
}

fn set_expr_is_read(body: &SetExpr) -> bool {
    match body {
        SetExpr::Select(select) => select.into.is_none(),
        SetExpr::Query(query) => query_is_read(query),
        SetExpr::SetOperation { left, right, .. } => {
            set_expr_is_read(left) && set_expr_is_read(right)
        }
        SetExpr::Values(_) | SetExpr::Table(_) => true,
        _ => false,
    }
}

/// Leading keyword of the rendered statement, used to name the operation.
fn operation_name(stmt: &Statement) -> String {
    stmt.to_string()
        .split_whitespace()
        .next()
        .unwrap_or("statement")
        .to_uppercase()
}

/// Check already-parsed statements against the read-only allowlist.
pub fn check_read_only(statements: &[Statement]) -> DbResult<()> {
    for stmt in statements {
        let kind = classify(stmt);
        if kind != StatementKind::Read {
            return Err(DbError::permission(operation_name(stmt), kind.reason()));
        }
    }
    Ok(())
}

/// Parse `sql` and reject anything that is not a read.
pub fn ensure_read_only(sql: &str, db_type: DatabaseType) -> DbResult<Vec<Statement>> {
    let statements = parse(sql, db_type)?;
    if statements.is_empty() {
        return Err(DbError::invalid_argument("no query provided"));
    }
    check_read_only(&statements)?;
    Ok(statements)
}
