//! End-to-end tool scenarios against the in-memory backend.

mod common;

use common::{Harness, row};
use iotdb_mcp_server::config::SqlDialect;
use iotdb_mcp_server::error::DbError;
use iotdb_mcp_server::tools::{DescribeTableInput, OutputFormat, QueryInput};
use serde_json::json;
use tempfile::TempDir;

fn query(sql: &str) -> QueryInput {
    QueryInput {
        query_sql: sql.to_string(),
        format: OutputFormat::Json,
    }
}

#[tokio::test]
async fn test_drop_table_rejected_without_touching_pool() {
    let dir = TempDir::new().unwrap();
    let harness = Harness::new(SqlDialect::Table, dir.path());
    let before = harness.checked_out();

    let err = tokio_test::assert_err!(harness.query.read_query(query("DROP TABLE t1")).await);

    assert!(matches!(err, DbError::InvalidStatementType { .. }), "{err:?}");
    assert_eq!(harness.checked_out(), before);
    assert_eq!(harness.backend.opened(), 0);
    assert!(harness.backend.executed().is_empty());
}

#[tokio::test]
async fn test_describe_missing_table_is_not_found() {
    let dir = TempDir::new().unwrap();
    let harness = Harness::new(SqlDialect::Table, dir.path());
    harness.backend.fail(
        "DESC no_such_table DETAILS",
        "550: Table 'test_db.no_such_table' does not exist.",
        Some(550),
    );

    let err = harness
        .schema
        .describe_table(DescribeTableInput {
            table_name: "no_such_table".to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::NotFound { .. }), "{err:?}");
    assert_eq!(harness.checked_out(), 0);
}

#[tokio::test]
async fn test_describe_with_missing_database_keeps_backend_error() {
    let dir = TempDir::new().unwrap();
    let harness = Harness::new(SqlDialect::Table, dir.path());
    harness.backend.fail(
        "DESC table1 DETAILS",
        "500: Database 'test_db' does not exist.",
        Some(500),
    );

    let err = harness
        .schema
        .describe_table(DescribeTableInput {
            table_name: "table1".to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::QueryExecution { code: Some(500), .. }), "{err:?}");
    assert!(err.to_string().contains("Database 'test_db'"), "{err}");
    assert_eq!(harness.checked_out(), 0);
}

#[tokio::test]
async fn test_list_and_describe_tables() {
    let dir = TempDir::new().unwrap();
    let harness = Harness::new(SqlDialect::Table, dir.path());
    harness.backend.respond(
        "SHOW TABLES",
        &[("TableName", "STRING"), ("TTL(ms)", "STRING")],
        vec![
            row(&[json!("table1"), json!("INF")]),
            row(&[json!("table2"), json!("INF")]),
        ],
    );
    harness.backend.respond(
        "DESC table1 DETAILS",
        &[
            ("ColumnName", "STRING"),
            ("DataType", "STRING"),
            ("Category", "STRING"),
            ("Status", "STRING"),
        ],
        vec![
            row(&[json!("time"), json!("TIMESTAMP"), json!("TIME"), json!("USING")]),
            row(&[json!("region"), json!("STRING"), json!("TAG"), json!("USING")]),
            row(&[json!("temperature"), json!("FLOAT"), json!("FIELD"), json!("USING")]),
        ],
    );

    let tables = harness.schema.list_tables().await.unwrap();
    assert_eq!(tables.tables, vec!["table1", "table2"]);
    assert_eq!(tables.count, 2);

    let described = harness
        .schema
        .describe_table(DescribeTableInput {
            table_name: "table1".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(described.count, 3);
    assert_eq!(described.columns[1].column_name, "region");
    assert_eq!(described.columns[1].category.as_deref(), Some("TAG"));
    assert_eq!(described.columns[2].data_type, "FLOAT");
}

#[tokio::test]
async fn test_tree_select_returns_records_in_column_order() {
    let dir = TempDir::new().unwrap();
    let harness = Harness::new(SqlDialect::Tree, dir.path());
    harness.backend.respond(
        "SELECT status, temperature FROM root.ln.wf01.wt01",
        &[
            ("Time", "TIMESTAMP"),
            ("root.ln.wf01.wt01.status", "BOOLEAN"),
            ("root.ln.wf01.wt01.temperature", "FLOAT"),
        ],
        vec![
            row(&[json!(1509465600000_i64), json!(true), json!(25.96)]),
            row(&[json!(1509465660000_i64), json!(false), json!(null)]),
            row(&[json!(1509465720000_i64), json!(true), json!(24.36)]),
        ],
    );

    let output = harness
        .query
        .select_query(query("SELECT status, temperature FROM root.ln.wf01.wt01"))
        .await
        .unwrap();

    assert_eq!(output.row_count, 3);
    assert_eq!(output.rows.len(), 3);
    let keys: Vec<&String> = output.rows[0].keys().collect();
    assert_eq!(
        keys,
        vec!["Time", "root.ln.wf01.wt01.status", "root.ln.wf01.wt01.temperature"]
    );
    assert_eq!(output.rows[0]["Time"], json!("2017-10-31T16:00:00.000+00:00"));
    assert_eq!(output.rows[1]["root.ln.wf01.wt01.temperature"], json!(null));
    assert_eq!(
        harness.backend.executed(),
        vec!["SELECT status, temperature FROM root.ln.wf01.wt01"]
    );
}

#[tokio::test]
async fn test_tree_metadata_rejects_select() {
    let dir = TempDir::new().unwrap();
    let harness = Harness::new(SqlDialect::Tree, dir.path());

    let err = harness
        .query
        .metadata_query(query("SELECT * FROM root.**"))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidStatementType { .. }));

    harness
        .backend
        .respond("SHOW DATABASES", &[("Database", "TEXT")], vec![row(&[json!("root.ln")])]);
    let output = harness.query.metadata_query(query("SHOW DATABASES")).await.unwrap();
    assert_eq!(output.rows[0]["Database"], json!("root.ln"));
}

#[tokio::test]
async fn test_formatted_output() {
    let dir = TempDir::new().unwrap();
    let harness = Harness::new(SqlDialect::Table, dir.path());
    harness.backend.respond(
        "SELECT region, s1 FROM t1",
        &[("region", "STRING"), ("s1", "INT64")],
        vec![row(&[json!("north"), json!(7)])],
    );

    let output = harness
        .query
        .read_query(QueryInput {
            query_sql: "SELECT region, s1 FROM t1".to_string(),
            format: OutputFormat::Markdown,
        })
        .await
        .unwrap();

    assert!(output.rows.is_empty());
    let text = output.formatted.unwrap();
    assert!(text.contains("| north | 7 |"), "{text}");
}

#[tokio::test]
async fn test_backend_error_surfaces_with_code() {
    let dir = TempDir::new().unwrap();
    let harness = Harness::new(SqlDialect::Table, dir.path());
    harness
        .backend
        .fail("SELECT * FROM t9", "701: Table t9 is not ready", Some(701));

    let err = harness.query.read_query(query("SELECT * FROM t9")).await.unwrap_err();
    assert!(matches!(err, DbError::QueryExecution { code: Some(701), .. }), "{err:?}");
    assert_eq!(harness.checked_out(), 0);
}
