//! Schema introspection.
//!
//! SQL queries are organized in the `queries` submodule with constants for each
//! database type. Database-specific implementations are in their respective
//! submodules (postgres, mysql, sqlite), each providing the same interface:
//! `list_tables`, `describe_table` and `sample_rows`.
//!
//! Table names only ever reach an identifier position after they have been
//! matched against the catalog listing.

use crate::db::pool::DbPool;
use crate::db::types::{RowToJson, display_value};
use crate::error::{DbError, DbResult};
use crate::models::{ColumnDefinition, ForeignKey, SampleRows, TableDescriptor, TableSchema};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::tokenizer::{Token, Tokenizer, Whitespace};
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Sample cells longer than this are cut.
const SAMPLE_CELL_MAX_CHARS: usize = 100;

/// Reads catalog metadata for the connected database.
#[derive(Debug, Clone)]
pub struct SchemaIntrospector {
    pool: DbPool,
    timeout: Duration,
    sample_rows: u32,
}

impl SchemaIntrospector {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            timeout: Duration::from_secs(crate::config::DEFAULT_QUERY_TIMEOUT_SECS),
            sample_rows: crate::config::DEFAULT_SAMPLE_ROWS,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Rows appended to each rendered table; 0 disables sampling.
    pub fn with_sample_rows(mut self, sample_rows: u32) -> Self {
        self.sample_rows = sample_rows;
        self
    }

    /// List base tables with their comments, in catalog order.
    pub async fn list_tables(&self) -> DbResult<Vec<TableDescriptor>> {
        let tables = self
            .bounded("list tables", async {
                impl_db_dispatch!(&self.pool, {
                    MySql(p) => mysql::list_tables(p).await,
                    Postgres(p) => postgres::list_tables(p).await,
                    SQLite(p) => sqlite::list_tables(p).await,
                })
            })
            .await
            .map_err(DbError::into_introspection)?;

        let mut seen = HashSet::new();
        let tables: Vec<TableDescriptor> = tables
            .into_iter()
            .filter(|t| !t.table_name.is_empty() && seen.insert(t.table_name.clone()))
            .collect();

        debug!(count = tables.len(), db_type = %self.pool.db_type(), "Listed tables");
        Ok(tables)
    }

    /// Describe the requested tables, or every table when `table_names` is
    /// `None` or holds no usable names. Unknown names are skipped.
    pub async fn describe_tables(
        &self,
        table_names: Option<&[String]>,
    ) -> DbResult<Vec<TableSchema>> {
        let requested: Vec<&str> = table_names
            .unwrap_or_default()
            .iter()
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
            .collect();

        let tables = self.list_tables().await?;
        let selected: Vec<TableDescriptor> = if requested.is_empty() {
            tables
        } else {
            tables
                .into_iter()
                .filter(|t| requested.contains(&t.table_name.as_str()))
                .collect()
        };

        if selected.len() < requested.len() {
            debug!(
                requested = requested.len(),
                found = selected.len(),
                "Some requested tables do not exist"
            );
        }

        let mut schemas = Vec::with_capacity(selected.len());
        for table in &selected {
            let mut schema = self
                .bounded("describe table", async {
                    impl_db_dispatch!(&self.pool, {
                        MySql(p) => mysql::describe_table(p, table).await,
                        Postgres(p) => postgres::describe_table(p, table).await,
                        SQLite(p) => sqlite::describe_table(p, table).await,
                    })
                })
                .await
                .map_err(DbError::into_introspection)?;

            if self.sample_rows > 0 {
                match self.sample(&schema).await {
                    Ok(sample) => schema = schema.with_sample(sample),
                    Err(e) => warn!(
                        table = %table.table_name,
                        error = %e,
                        "Skipping sample rows"
                    ),
                }
            }
            schemas.push(schema);
        }
        Ok(schemas)
    }

    /// Render schema text for the requested tables (see [`Self::describe_tables`]).
    ///
    /// Sections are separated by a blank line; the result is empty when none
    /// of the requested tables exist.
    pub async fn get_table_schema(&self, table_names: Option<&[String]>) -> DbResult<String> {
        let schemas = self.describe_tables(table_names).await?;
        Ok(schemas
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join("\n\n"))
    }

    async fn sample(&self, schema: &TableSchema) -> DbResult<SampleRows> {
        let limit = self.sample_rows;
        let table = schema.table_name.as_str();
        let mut sample = self
            .bounded("sample rows", async {
                impl_db_dispatch!(&self.pool, {
                    MySql(p) => mysql::sample_rows(p, table, limit).await,
                    Postgres(p) => postgres::sample_rows(p, table, limit).await,
                    SQLite(p) => sqlite::sample_rows(p, table, limit).await,
                })
            })
            .await?;
        if sample.columns.is_empty() {
            sample.columns = schema.columns.iter().map(|c| c.name.clone()).collect();
        }
        Ok(sample)
    }

    async fn bounded<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = DbResult<T>>,
    ) -> DbResult<T> {
        match timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(DbError::timeout(operation, self.timeout)),
        }
    }
}

/// Build sample rows from decoded database rows.
fn to_sample<R: RowToJson>(rows: &[R]) -> SampleRows {
    let columns = rows
        .first()
        .map(|r| r.column_metadata().into_iter().map(|c| c.name).collect())
        .unwrap_or_default();
    let rows = rows
        .iter()
        .map(|r| {
            r.to_json_values()
                .iter()
                .map(|v| truncate_cell(display_value(v)))
                .collect()
        })
        .collect();
    SampleRows { columns, rows }
}

fn truncate_cell(text: String) -> String {
    // One row per line in the sample block
    let text = text.replace(['\n', '\r', '\t'], " ");
    match text.char_indices().nth(SAMPLE_CELL_MAX_CHARS) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text,
    }
}

/// Quote an identifier with the given quote character, doubling embedded quotes.
fn quote_ident(name: &str, quote: char) -> String {
    let doubled = format!("{quote}{quote}");
    format!("{quote}{}{quote}", name.replace(quote, &doubled))
}

/// Extract the comment SQLite keeps verbatim after the opening parenthesis:
/// `CREATE TABLE t ( -- comment` or `CREATE TABLE t ( /* comment */`.
///
/// The text is tokenized, so a quoted table name containing `(` is skipped.
pub fn sqlite_table_comment(create_sql: &str) -> String {
    let Ok(tokens) = Tokenizer::new(&SQLiteDialect {}, create_sql).tokenize() else {
        return String::new();
    };
    let after_paren = tokens
        .iter()
        .skip_while(|t| !matches!(t, Token::LParen))
        .skip(1)
        .find(|t| {
            !matches!(
                t,
                Token::Whitespace(Whitespace::Space | Whitespace::Newline | Whitespace::Tab)
            )
        });
    match after_paren {
        Some(Token::Whitespace(
            Whitespace::SingleLineComment { comment, .. } | Whitespace::MultiLineComment(comment),
        )) => comment.trim().to_string(),
        _ => String::new(),
    }
}

mod queries {
    pub mod postgres {
        pub const LIST_TABLES: &str = r#"
            SELECT
                t.table_name::text AS table_name,
                COALESCE(
                    obj_description(format('%I.%I', t.table_schema, t.table_name)::regclass, 'pg_class'),
                    ''
                ) AS table_comment
            FROM information_schema.tables t
            WHERE t.table_schema = current_schema()
            AND t.table_type = 'BASE TABLE'
            "#;

        pub const DESCRIBE_COLUMNS: &str = r#"
        SELECT
            c.column_name::text AS column_name,
            format_type(a.atttypid, a.atttypmod) AS column_type,
            c.is_nullable::text AS is_nullable,
            c.column_default::text AS column_default,
            CASE WHEN pk.column_name IS NOT NULL THEN true ELSE false END AS is_primary_key,
            col_description(t.oid, a.attnum) AS column_comment
        FROM information_schema.columns c
        JOIN pg_class t ON t.relname = c.table_name
        JOIN pg_namespace n ON n.oid = t.relnamespace AND n.nspname = c.table_schema
        JOIN pg_attribute a ON a.attrelid = t.oid AND a.attname = c.column_name
        LEFT JOIN (
            SELECT kcu.column_name, kcu.ordinal_position
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            WHERE tc.table_name = $1
            AND tc.table_schema = current_schema()
            AND tc.constraint_type = 'PRIMARY KEY'
        ) pk ON c.column_name = pk.column_name
        WHERE c.table_name = $1 AND c.table_schema = current_schema()
        ORDER BY c.ordinal_position
        "#;

        pub const DESCRIBE_FOREIGN_KEYS: &str = r#"
        SELECT
            kcu.column_name::text AS column_name,
            ccu.table_name::text AS foreign_table_name,
            ccu.column_name::text AS foreign_column_name
        FROM information_schema.table_constraints tc
        JOIN information_schema.key_column_usage kcu
            ON tc.constraint_name = kcu.constraint_name
            AND tc.table_schema = kcu.table_schema
        JOIN information_schema.constraint_column_usage ccu
            ON ccu.constraint_name = tc.constraint_name
            AND ccu.table_schema = tc.table_schema
        WHERE tc.table_name = $1
        AND tc.table_schema = current_schema()
        AND tc.constraint_type = 'FOREIGN KEY'
        "#;
    }

    pub mod mysql {
        pub const LIST_TABLES: &str = r#"
            SELECT
                CONVERT(TABLE_NAME USING utf8mb4) AS TABLE_NAME,
                CONVERT(TABLE_COMMENT USING utf8mb4) AS TABLE_COMMENT
            FROM information_schema.TABLES
            WHERE TABLE_SCHEMA = DATABASE()
            AND TABLE_TYPE = 'BASE TABLE'
            "#;

        pub const DESCRIBE_COLUMNS: &str = r#"
        SELECT
            CONVERT(COLUMN_NAME USING utf8mb4) AS COLUMN_NAME,
            CONVERT(COLUMN_TYPE USING utf8mb4) AS COLUMN_TYPE,
            CONVERT(IS_NULLABLE USING utf8mb4) AS IS_NULLABLE,
            CONVERT(COLUMN_DEFAULT USING utf8mb4) AS COLUMN_DEFAULT,
            CONVERT(COLUMN_KEY USING utf8mb4) AS COLUMN_KEY,
            CONVERT(COLUMN_COMMENT USING utf8mb4) AS COLUMN_COMMENT
        FROM information_schema.COLUMNS
        WHERE TABLE_NAME = ? AND TABLE_SCHEMA = DATABASE()
        ORDER BY ORDINAL_POSITION
        "#;

        pub const DESCRIBE_FOREIGN_KEYS: &str = r#"
        SELECT
            CONVERT(COLUMN_NAME USING utf8mb4) AS COLUMN_NAME,
            CONVERT(REFERENCED_TABLE_NAME USING utf8mb4) AS REFERENCED_TABLE_NAME,
            CONVERT(REFERENCED_COLUMN_NAME USING utf8mb4) AS REFERENCED_COLUMN_NAME
        FROM information_schema.KEY_COLUMN_USAGE
        WHERE TABLE_NAME = ?
        AND TABLE_SCHEMA = DATABASE()
        AND REFERENCED_TABLE_NAME IS NOT NULL
        ORDER BY ORDINAL_POSITION
        "#;
    }

    pub mod sqlite {
        /// sqlite_master rowid order is creation order.
        pub const LIST_TABLES: &str = r#"
            SELECT name, sql FROM sqlite_master
            WHERE type = 'table'
            AND name NOT LIKE 'sqlite_%'
            "#;

        pub const DESCRIBE_COLUMNS: &str =
            r#"SELECT name, type, "notnull", dflt_value, pk FROM pragma_table_info(?)"#;

        pub const DESCRIBE_FOREIGN_KEYS: &str =
            r#"SELECT "from", "table", "to" FROM pragma_foreign_key_list(?)"#;
    }
}

mod postgres {
    use super::*;
    use sqlx::{PgPool, Row};

    pub async fn list_tables(pool: &PgPool) -> DbResult<Vec<TableDescriptor>> {
        let rows = sqlx::query(queries::postgres::LIST_TABLES)
            .fetch_all(pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let name: String = row.try_get("table_name").unwrap_or_default();
                let comment: String = row.try_get("table_comment").unwrap_or_default();
                TableDescriptor::new(name, comment)
            })
            .collect())
    }

    pub async fn describe_table(pool: &PgPool, table: &TableDescriptor) -> DbResult<TableSchema> {
        let columns = fetch_columns(pool, &table.table_name).await?;
        let foreign_keys = fetch_foreign_keys(pool, &table.table_name).await?;

        let primary_key = columns
            .iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name.clone())
            .collect();

        let mut schema = TableSchema::new(&table.table_name)
            .with_comment(&table.table_comment)
            .with_primary_key(primary_key);
        schema.columns = columns;
        schema.foreign_keys = foreign_keys;
        Ok(schema)
    }

    async fn fetch_columns(pool: &PgPool, table_name: &str) -> DbResult<Vec<ColumnDefinition>> {
        let rows = sqlx::query(queries::postgres::DESCRIBE_COLUMNS)
            .bind(table_name)
            .fetch_all(pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let name: String = row.get("column_name");
                let column_type: String = row.get("column_type");
                let nullable: String = row.get("is_nullable");
                let default_value: Option<String> = row.try_get("column_default").ok().flatten();
                let is_pk: bool = row.get("is_primary_key");
                let comment: Option<String> = row.try_get("column_comment").ok().flatten();

                let mut col = ColumnDefinition::new(&name, &column_type, nullable == "YES")
                    .with_primary_key(is_pk);
                if let Some(def) = default_value {
                    col = col.with_default(def);
                }
                if let Some(c) = comment {
                    col = col.with_comment(c);
                }
                col
            })
            .collect())
    }

    async fn fetch_foreign_keys(pool: &PgPool, table_name: &str) -> DbResult<Vec<ForeignKey>> {
        let rows = sqlx::query(queries::postgres::DESCRIBE_FOREIGN_KEYS)
            .bind(table_name)
            .fetch_all(pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let column: String = row.get("column_name");
                let ref_table: String = row.get("foreign_table_name");
                let ref_column: String = row.get("foreign_column_name");
                ForeignKey::new(column, ref_table, ref_column)
            })
            .collect())
    }

    pub async fn sample_rows(pool: &PgPool, table_name: &str, limit: u32) -> DbResult<SampleRows> {
        let sql = format!(
            "SELECT * FROM {} LIMIT {}",
            quote_ident(table_name, '"'),
            limit
        );
        let rows = sqlx::query(&sql).fetch_all(pool).await?;
        Ok(to_sample(&rows))
    }
}

mod mysql {
    use super::*;
    use sqlx::{MySqlPool, Row};

    /// Safely get a string from a MySQL row.
    /// MySQL may return VARBINARY instead of VARCHAR depending on charset configuration.
    fn get_string(row: &sqlx::mysql::MySqlRow, column: &str) -> String {
        get_optional_string(row, column).unwrap_or_default()
    }

    fn get_optional_string(row: &sqlx::mysql::MySqlRow, column: &str) -> Option<String> {
        row.try_get::<Option<String>, _>(column)
            .ok()
            .flatten()
            .or_else(|| {
                row.try_get::<Option<Vec<u8>>, _>(column)
                    .ok()
                    .flatten()
                    .and_then(|bytes| String::from_utf8(bytes).ok())
            })
    }

    pub async fn list_tables(pool: &MySqlPool) -> DbResult<Vec<TableDescriptor>> {
        let rows = sqlx::query(queries::mysql::LIST_TABLES)
            .fetch_all(pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                TableDescriptor::new(
                    get_string(row, "TABLE_NAME"),
                    get_string(row, "TABLE_COMMENT"),
                )
            })
            .collect())
    }

    pub async fn describe_table(
        pool: &MySqlPool,
        table: &TableDescriptor,
    ) -> DbResult<TableSchema> {
        let columns = fetch_columns(pool, &table.table_name).await?;
        let foreign_keys = fetch_foreign_keys(pool, &table.table_name).await?;

        let primary_key = columns
            .iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name.clone())
            .collect();

        let mut schema = TableSchema::new(&table.table_name)
            .with_comment(&table.table_comment)
            .with_primary_key(primary_key);
        schema.columns = columns;
        schema.foreign_keys = foreign_keys;
        Ok(schema)
    }

    async fn fetch_columns(pool: &MySqlPool, table_name: &str) -> DbResult<Vec<ColumnDefinition>> {
        let rows = sqlx::query(queries::mysql::DESCRIBE_COLUMNS)
            .bind(table_name)
            .fetch_all(pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let name = get_string(row, "COLUMN_NAME");
                let column_type = get_string(row, "COLUMN_TYPE");
                let nullable = get_string(row, "IS_NULLABLE");
                let column_key = get_string(row, "COLUMN_KEY");

                let mut col = ColumnDefinition::new(&name, &column_type, nullable == "YES")
                    .with_primary_key(column_key == "PRI");
                if let Some(def) = get_optional_string(row, "COLUMN_DEFAULT") {
                    col = col.with_default(def);
                }
                if let Some(c) = get_optional_string(row, "COLUMN_COMMENT") {
                    col = col.with_comment(c);
                }
                col
            })
            .collect())
    }

    async fn fetch_foreign_keys(pool: &MySqlPool, table_name: &str) -> DbResult<Vec<ForeignKey>> {
        let rows = sqlx::query(queries::mysql::DESCRIBE_FOREIGN_KEYS)
            .bind(table_name)
            .fetch_all(pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                ForeignKey::new(
                    get_string(row, "COLUMN_NAME"),
                    get_string(row, "REFERENCED_TABLE_NAME"),
                    get_string(row, "REFERENCED_COLUMN_NAME"),
                )
            })
            .collect())
    }

    pub async fn sample_rows(
        pool: &MySqlPool,
        table_name: &str,
        limit: u32,
    ) -> DbResult<SampleRows> {
        let sql = format!(
            "SELECT * FROM {} LIMIT {}",
            quote_ident(table_name, '`'),
            limit
        );
        let rows = sqlx::query(&sql).fetch_all(pool).await?;
        Ok(to_sample(&rows))
    }
}

mod sqlite {
    use super::*;
    use sqlx::{Row, SqlitePool};

    pub async fn list_tables(pool: &SqlitePool) -> DbResult<Vec<TableDescriptor>> {
        let rows = sqlx::query(queries::sqlite::LIST_TABLES)
            .fetch_all(pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let name: String = row.try_get("name").unwrap_or_default();
                let create_sql: Option<String> = row.try_get("sql").ok().flatten();
                let comment = create_sql
                    .as_deref()
                    .map(sqlite_table_comment)
                    .unwrap_or_default();
                TableDescriptor::new(name, comment)
            })
            .collect())
    }

    pub async fn describe_table(
        pool: &SqlitePool,
        table: &TableDescriptor,
    ) -> DbResult<TableSchema> {
        let rows = sqlx::query(queries::sqlite::DESCRIBE_COLUMNS)
            .bind(&table.table_name)
            .fetch_all(pool)
            .await?;

        let mut pk_columns: Vec<(i64, String)> = Vec::new();
        let columns: Vec<ColumnDefinition> = rows
            .iter()
            .map(|row| {
                let name: String = row.try_get("name").unwrap_or_default();
                let data_type: String = row.try_get("type").unwrap_or_default();
                let notnull: i64 = row.try_get("notnull").unwrap_or(0);
                let default_value: Option<String> = row.try_get("dflt_value").ok().flatten();
                let pk: i64 = row.try_get("pk").unwrap_or(0);

                if pk > 0 {
                    pk_columns.push((pk, name.clone()));
                }
                let mut col = ColumnDefinition::new(&name, &data_type, notnull == 0)
                    .with_primary_key(pk > 0);
                if let Some(def) = default_value {
                    col = col.with_default(def);
                }
                col
            })
            .collect();

        // pk holds the 1-based position inside a composite key
        pk_columns.sort_by_key(|(pos, _)| *pos);

        let fk_rows = sqlx::query(queries::sqlite::DESCRIBE_FOREIGN_KEYS)
            .bind(&table.table_name)
            .fetch_all(pool)
            .await?;
        let foreign_keys = fk_rows
            .iter()
            .map(|row| {
                let column: String = row.try_get("from").unwrap_or_default();
                let ref_table: String = row.try_get("table").unwrap_or_default();
                let ref_column: Option<String> = row.try_get("to").ok().flatten();
                ForeignKey::new(column, ref_table, ref_column.unwrap_or_default())
            })
            .collect();

        let mut schema = TableSchema::new(&table.table_name)
            .with_comment(&table.table_comment)
            .with_primary_key(pk_columns.into_iter().map(|(_, name)| name).collect());
        schema.columns = columns;
        schema.foreign_keys = foreign_keys;
        Ok(schema)
    }

    pub async fn sample_rows(
        pool: &SqlitePool,
        table_name: &str,
        limit: u32,
    ) -> DbResult<SampleRows> {
        let sql = format!(
            "SELECT * FROM {} LIMIT {}",
            quote_ident(table_name, '"'),
            limit
        );
        let rows = sqlx::query(&sql).fetch_all(pool).await?;
        Ok(to_sample(&rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_table_comment() {
        assert_eq!(
            sqlite_table_comment("CREATE TABLE t_student ( -- 学生表\n id INTEGER PRIMARY KEY)"),
            "学生表"
        );
        assert_eq!(
            sqlite_table_comment("CREATE TABLE t (/* 角色 */ id INTEGER)"),
            "角色"
        );
        assert_eq!(sqlite_table_comment("CREATE TABLE t_rolemodel (id INTEGER)"), "");
        assert_eq!(sqlite_table_comment("CREATE TABLE t (/* unterminated"), "");
        assert_eq!(sqlite_table_comment("garbage"), "");
        assert_eq!(
            sqlite_table_comment("CREATE TABLE \"t(x\" (-- 括号表\n id INTEGER)"),
            "括号表"
        );
        assert_eq!(
            sqlite_table_comment("CREATE TABLE [a(b] ( /* 方括号 */ id INTEGER)"),
            "方括号"
        );
        assert_eq!(
            sqlite_table_comment("CREATE TABLE \"t( -- 假注释\" (id INTEGER)"),
            ""
        );
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("users", '"'), "\"users\"");
        assert_eq!(quote_ident("we\"ird", '"'), "\"we\"\"ird\"");
        assert_eq!(quote_ident("ord`ers", '`'), "`ord``ers`");
    }

    #[test]
    fn test_truncate_cell() {
        assert_eq!(truncate_cell("a\tb\nc".to_string()), "a b c");
        let long = "丘".repeat(150);
        let cut = truncate_cell(long);
        assert_eq!(cut.chars().count(), SAMPLE_CELL_MAX_CHARS + 3);
        assert!(cut.ends_with("..."));
    }
}
