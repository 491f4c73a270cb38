//! End-to-end tests of the four tools against a SQLite file.
//!
//! The fixture database has two tables: `t_student` (comment "学生表") and
//! `t_rolemodel` (no comment).

use serde_json::json;
use sql_agent_tools::config::{DatabaseConfig, Locale};
use sql_agent_tools::db::DbPool;
use sql_agent_tools::models::ConnectionConfig;
use sql_agent_tools::tools::{
    ListTablesArgs, QueryArgs, SqlTool, SqlToolkit, TableNames, TableSchemaArgs, ToolCall,
    ToolkitOptions,
};
use sqlx::sqlite::SqliteConnectOptions;
use std::str::FromStr;
use std::time::Duration;
use tempfile::TempDir;
use tokio_test::assert_ok;

const FIXTURE: &[&str] = &[
    "CREATE TABLE t_rolemodel (id INTEGER PRIMARY KEY, name TEXT)",
    "CREATE TABLE t_student ( -- 学生表
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        role_id INTEGER REFERENCES t_rolemodel(id)
    )",
    "INSERT INTO t_rolemodel VALUES (1, '丘丘')",
    "INSERT INTO t_student VALUES (1, 'Ann', 1)",
];

/// Create the fixture file and return its directory (kept alive by the caller).
async fn create_fixture() -> (TempDir, String) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("school.db");
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))
        .unwrap()
        .create_if_missing(true);
    let pool = sqlx::SqlitePool::connect_with(options).await.unwrap();
    for sql in FIXTURE {
        sqlx::query(sql).execute(&pool).await.unwrap();
    }
    pool.close().await;
    (dir, format!("sqlite://{}", path.display()))
}

async fn toolkit_for(url: &str, locale: Locale) -> SqlToolkit {
    let db_config = assert_ok!(DatabaseConfig::parse(url));
    let conn_config = assert_ok!(ConnectionConfig::from_database_config(&db_config));
    let pool = assert_ok!(DbPool::connect(&conn_config, Duration::from_secs(5)).await);
    let options = ToolkitOptions {
        writable: conn_config.writable,
        locale,
        ..ToolkitOptions::default()
    };
    assert_ok!(SqlToolkit::new(pool, options))
}

async fn setup() -> (TempDir, SqlToolkit) {
    let (dir, url) = create_fixture().await;
    let toolkit = toolkit_for(&url, Locale::Zh).await;
    (dir, toolkit)
}

fn schema_args(names: &str) -> TableSchemaArgs {
    TableSchemaArgs {
        table_names: Some(TableNames::Csv(names.to_string())),
    }
}

#[tokio::test]
async fn test_list_tables_with_comments() {
    let (_dir, toolkit) = setup().await;
    let text = toolkit.list_tables().call(ListTablesArgs::default()).await;

    assert!(text.starts_with("数据库中共有2 个表：\n\n"), "{text}");
    assert!(text.contains("表名：t_student\n  描述：学生表\n"), "{text}");
    assert!(text.contains("表名：t_rolemodel\n  描述：暂无描述\n"), "{text}");
}

#[tokio::test]
async fn test_list_tables_english() {
    let (_dir, url) = create_fixture().await;
    let toolkit = toolkit_for(&url, Locale::En).await;
    let text = toolkit.list_tables().call(ListTablesArgs::default()).await;

    assert!(text.starts_with("The database contains 2 tables:"), "{text}");
    assert!(text.contains("Table: t_rolemodel\n  Description: No description"));
}

#[tokio::test]
async fn test_schema_of_one_table() {
    let (_dir, toolkit) = setup().await;
    let text = toolkit.table_schema().call(schema_args("t_student")).await;

    assert!(text.starts_with("-- 学生表\nCREATE TABLE t_student (\n"), "{text}");
    assert!(text.contains("\tname TEXT NOT NULL,\n"), "{text}");
    assert!(text.contains("\tPRIMARY KEY (id),\n"), "{text}");
    assert!(
        text.contains("FOREIGN KEY(role_id) REFERENCES t_rolemodel (id)"),
        "{text}"
    );
    assert!(
        text.ends_with("/*\n1 rows from t_student table:\nid\tname\trole_id\n1\tAnn\t1\n*/"),
        "{text}"
    );
    assert!(!text.contains("CREATE TABLE t_rolemodel"));
}

#[tokio::test]
async fn test_schema_all_is_superset() {
    let (_dir, toolkit) = setup().await;
    let all = toolkit
        .table_schema()
        .call(TableSchemaArgs::default())
        .await;
    let student = toolkit.table_schema().call(schema_args("t_student")).await;
    let rolemodel = toolkit.table_schema().call(schema_args("t_rolemodel")).await;

    assert!(all.contains(&student));
    assert!(all.contains(&rolemodel));
    assert!(all.contains("丘丘"));
}

#[tokio::test]
async fn test_schema_ignores_unknown_names() {
    let (_dir, toolkit) = setup().await;
    let student = toolkit.table_schema().call(schema_args("t_student")).await;
    let mixed = toolkit
        .table_schema()
        .call(schema_args(" nope , t_student,, "))
        .await;
    assert_eq!(mixed, student);

    let none = toolkit.table_schema().call(schema_args("nope")).await;
    assert!(none.starts_with("未找到匹配的表：nope"), "{none}");
}

#[tokio::test]
async fn test_query_select_one() {
    let (_dir, toolkit) = setup().await;
    let text = toolkit.query().call(QueryArgs::new("SELECT 1")).await;
    assert!(text.contains("| 1 |"), "{text}");
    assert!(text.contains("1 row in set"), "{text}");
}

#[tokio::test]
async fn test_query_missing_or_empty() {
    let (_dir, toolkit) = setup().await;
    for args in [QueryArgs::default(), QueryArgs::new(""), QueryArgs::new("  ")] {
        let text = toolkit.query().call(args).await;
        assert!(text.starts_with("执行查询时出错："), "{text}");
        assert!(text.contains("no query provided"), "{text}");
    }
}

#[tokio::test]
async fn test_query_error_is_text() {
    let (_dir, toolkit) = setup().await;
    let text = toolkit
        .query()
        .call(QueryArgs::new("SELECT missing FROM t_student"))
        .await;
    assert!(text.starts_with("执行查询时出错："), "{text}");
    assert!(text.contains("missing"), "{text}");
}

#[tokio::test]
async fn test_read_only_delete_leaves_data() {
    let (_dir, toolkit) = setup().await;
    let text = toolkit
        .query()
        .call(QueryArgs::new("DELETE FROM t_student"))
        .await;
    assert!(text.contains("Permission denied"), "{text}");

    let count = toolkit
        .query()
        .call(QueryArgs::new("SELECT count(*) AS n FROM t_student"))
        .await;
    assert!(count.contains("| 1 |"), "{count}");
}

#[tokio::test]
async fn test_checker_never_mutates() {
    let (_dir, url) = create_fixture().await;
    let read_only = toolkit_for(&url, Locale::Zh).await;
    let writable = toolkit_for(&format!("{url}?writable=true"), Locale::En).await;

    let blocked = read_only
        .query_checker()
        .call(QueryArgs::new("DROP TABLE t_student"))
        .await;
    assert!(blocked.contains("只读连接不允许"), "{blocked}");

    let valid = writable
        .query_checker()
        .call(QueryArgs::new("DROP TABLE t_student"))
        .await;
    assert!(valid.starts_with("The query is valid."), "{valid}");

    let still_there = read_only
        .query()
        .call(QueryArgs::new("SELECT name FROM t_student"))
        .await;
    assert!(still_there.contains("Ann"), "{still_there}");
}

#[tokio::test]
async fn test_checker_reports_syntax_position() {
    let (_dir, toolkit) = setup().await;
    let text = toolkit
        .query_checker()
        .call(QueryArgs::new("SELECT * FROM\nWHERE id = 1"))
        .await;
    assert!(text.contains("语法错误"), "{text}");
    assert!(text.contains("第 2 行"), "{text}");
}

#[tokio::test]
async fn test_checker_rejects_unknown_column() {
    let (_dir, toolkit) = setup().await;
    let text = toolkit
        .query_checker()
        .call(QueryArgs::new("SELECT nickname FROM t_student"))
        .await;
    assert!(text.contains("数据库拒绝"), "{text}");
}

#[tokio::test]
async fn test_query_timeout_is_text() {
    let (_dir, url) = create_fixture().await;
    let db_config = assert_ok!(DatabaseConfig::parse(&url));
    let conn_config = assert_ok!(ConnectionConfig::from_database_config(&db_config));
    let pool = assert_ok!(DbPool::connect(&conn_config, Duration::from_secs(5)).await);
    let options = ToolkitOptions {
        query_timeout: Duration::from_millis(1),
        ..ToolkitOptions::default()
    };
    let toolkit = assert_ok!(SqlToolkit::new(pool, options));

    let text = toolkit
        .query()
        .call(QueryArgs::new(
            "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < 10000000) \
             SELECT count(*) FROM c",
        ))
        .await;
    assert!(text.starts_with("执行查询时出错：Timeout"), "{text}");
}

#[tokio::test]
async fn test_writes_inside_queries_refused() {
    let (_dir, toolkit) = setup().await;
    let text = toolkit
        .query()
        .call(QueryArgs::new(
            "WITH d AS (DELETE FROM t_student RETURNING *) SELECT * FROM d",
        ))
        .await;
    assert!(text.contains("Permission denied"), "{text}");

    let text = toolkit
        .query()
        .call(QueryArgs::new("WITH x AS (SELECT 1) DELETE FROM t_student"))
        .await;
    assert!(text.contains("Permission denied"), "{text}");

    let checked = toolkit
        .query_checker()
        .call(QueryArgs::new("SELECT * FROM t_student FOR UPDATE"))
        .await;
    assert!(checked.contains("只读连接不允许"), "{checked}");

    let still_there = toolkit
        .query()
        .call(QueryArgs::new("SELECT name FROM t_student"))
        .await;
    assert!(still_there.contains("Ann"), "{still_there}");
}

#[tokio::test]
async fn test_writable_update() {
    let (_dir, url) = create_fixture().await;
    let toolkit = toolkit_for(&format!("{url}?writable=true"), Locale::En).await;
    let text = toolkit
        .query()
        .call(QueryArgs::new("UPDATE t_student SET name = 'Bo' WHERE id = 1"))
        .await;
    assert!(text.starts_with("Query OK, 1 row affected"), "{text}");
}

#[tokio::test]
async fn test_specs_and_dispatch() {
    let (_dir, toolkit) = setup().await;
    let specs = toolkit.specs();
    let names: Vec<&str> = specs.iter().map(|s| s.name).collect();
    assert_eq!(
        names,
        [
            "sql_db_list_tables",
            "sql_db_schema",
            "sql_db_query",
            "sql_db_query_checker"
        ]
    );
    let schema = &specs[1].input_schema;
    assert!(schema["properties"].get("table_names").is_some(), "{schema}");

    let call = assert_ok!(ToolCall::parse(
        "sql_db_schema",
        json!({"table_names": ["t_rolemodel"]})
    ));
    let text = toolkit.dispatch(call).await;
    assert!(text.contains("CREATE TABLE t_rolemodel"), "{text}");

    let bad = toolkit.call("sql_db_query", json!({"query": 5})).await;
    assert!(bad.starts_with("执行查询时出错：参数无效："), "{bad}");

    let unknown = toolkit.call("sql_db_drop", json!({})).await;
    assert!(unknown.contains("sql_db_drop"), "{unknown}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_matches_async() {
    let (_dir, toolkit) = setup().await;

    let listed = toolkit.list_tables().call(ListTablesArgs::default()).await;
    assert_eq!(
        toolkit.list_tables().call_blocking(ListTablesArgs::default()),
        listed
    );

    let schema = toolkit.table_schema().call(schema_args("t_student")).await;
    assert_eq!(
        toolkit.table_schema().call_blocking(schema_args("t_student")),
        schema
    );

    let checked = toolkit
        .query_checker()
        .call(QueryArgs::new("SELECT id FROM t_student"))
        .await;
    let call = assert_ok!(ToolCall::parse(
        "sql_db_query_checker",
        json!({"query": "SELECT id FROM t_student"})
    ));
    assert_eq!(toolkit.dispatch_blocking(call), checked);
}
