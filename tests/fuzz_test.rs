//! Randomized tests for argument normalization and the read-only gate.
//!
//! Inputs are generated with `rand` and must never panic or let a write
//! statement through.

use rand::Rng;
use rand::seq::SliceRandom;
use sql_agent_tools::DbError;
use sql_agent_tools::db::statement::ensure_read_only;
use sql_agent_tools::models::DatabaseType;
use sql_agent_tools::tools::TableNames;
use std::collections::HashSet;

const DIALECTS: [DatabaseType; 3] = [
    DatabaseType::MySQL,
    DatabaseType::PostgreSQL,
    DatabaseType::SQLite,
];

/// Random text built from table-name characters, commas and blanks.
fn random_csv(len: usize) -> String {
    const ALPHABET: &[char] = &['a', 'b', 't', '_', '1', ',', ',', ' ', ' ', '\t'];
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| *ALPHABET.choose(&mut rng).unwrap_or(&','))
        .collect()
}

fn edge_case_sql() -> Vec<String> {
    vec![
        String::new(),
        " ".to_string(),
        ";".to_string(),
        ";;;".to_string(),
        "\n\r\t".to_string(),
        "\0".to_string(),
        "🚀".repeat(100),
        "'OR 1=1--".to_string(),
        "SELECT 1; DROP TABLE users".to_string(),
        "SELECT * FROM t; --".to_string(),
        "/* comment only */".to_string(),
        "-- comment only".to_string(),
        "SELECT (((((((1)))))))".to_string(),
        "SELECT '".to_string(),
        "a".repeat(10_000),
        "\x00\x01\x02".to_string(),
    ]
}

#[test]
fn fuzz_table_names_normalized() {
    let mut rng = rand::thread_rng();
    for _ in 0..500 {
        let input = random_csv(rng.gen_range(0..60));
        let names = TableNames::Csv(input.clone()).into_names();

        let mut seen = HashSet::new();
        for name in &names {
            assert!(!name.is_empty(), "empty name from {input:?}");
            assert_eq!(name.trim(), name, "padded name from {input:?}");
            assert!(!name.contains(','), "comma in name from {input:?}");
            assert!(seen.insert(name.clone()), "duplicate {name} from {input:?}");
        }

        // The list form of the same names yields the same result
        let list: Vec<String> = input.split(',').map(str::to_string).collect();
        assert_eq!(TableNames::List(list).into_names(), names);
    }
}

#[test]
fn fuzz_edge_case_sql_never_panics() {
    for sql in edge_case_sql() {
        for db_type in DIALECTS {
            let _ = ensure_read_only(&sql, db_type);
        }
    }
}

#[test]
fn fuzz_blank_sql_is_invalid_argument() {
    for sql in ["", " ", "\n\t", ";", "-- nothing"] {
        for db_type in DIALECTS {
            let err = ensure_read_only(sql, db_type).unwrap_err();
            assert!(
                matches!(
                    err,
                    DbError::InvalidArgument { .. } | DbError::QuerySyntax { .. }
                ),
                "{sql:?} on {db_type:?}: {err}"
            );
        }
    }
}

#[test]
fn fuzz_writes_hidden_after_reads_are_blocked() {
    let writes = [
        "DELETE FROM t",
        "UPDATE t SET a = 1",
        "INSERT INTO t VALUES (1)",
        "DROP TABLE t",
        "CREATE TABLE x (a INT)",
        "ALTER TABLE t ADD COLUMN b INT",
        "WITH d AS (DELETE FROM t RETURNING *) SELECT * FROM d",
        "WITH x AS (SELECT 1) UPDATE t SET a = 2",
        "SELECT * INTO t_copy FROM t",
        "SELECT a FROM t FOR UPDATE",
    ];
    let mut rng = rand::thread_rng();
    for _ in 0..100 {
        let reads = rng.gen_range(0..4);
        let mut statements: Vec<&str> = (0..reads).map(|_| "SELECT a FROM t").collect();
        let write = writes.choose(&mut rng).unwrap_or(&writes[0]);
        statements.insert(rng.gen_range(0..=statements.len()), write);
        let sql = statements.join("; ");

        for db_type in DIALECTS {
            let err = ensure_read_only(&sql, db_type).unwrap_err();
            assert!(
                matches!(err, DbError::Permission { .. }),
                "{sql} on {db_type:?}: {err}"
            );
        }
    }
}

#[test]
fn fuzz_random_text_never_panics() {
    let mut rng = rand::thread_rng();
    let fragments = [
        "SELECT", "FROM", "WHERE", "t", "a", "*", ",", "(", ")", "'x'", "1", ";", "--", "/*",
        "*/", "JOIN", "ON", "=", "WITH", "AS", "UNION",
    ];
    for _ in 0..300 {
        let len = rng.gen_range(0..20);
        let sql: Vec<&str> = (0..len)
            .map(|_| *fragments.choose(&mut rng).unwrap_or(&"t"))
            .collect();
        let sql = sql.join(" ");
        for db_type in DIALECTS {
            if let Ok(statements) = ensure_read_only(&sql, db_type) {
                assert!(!statements.is_empty(), "{sql}");
            }
        }
    }
}
