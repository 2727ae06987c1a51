//! Integration tests for the export pipeline.

mod common;

use calamine::{Data, Reader, Xlsx, open_workbook};
use common::{Harness, row};
use iotdb_mcp_server::config::SqlDialect;
use iotdb_mcp_server::db::{RawRow, TimestampConverter};
use iotdb_mcp_server::db::types::{column_categories, decode_row};
use iotdb_mcp_server::error::DbError;
use iotdb_mcp_server::models::{CellValue, ColumnMetadata, ExportFormat};
use iotdb_mcp_server::tools::ExportInput;
use serde_json::json;
use tempfile::TempDir;

const SQL: &str = "SELECT c1, c2 FROM t1";

const TYPED_SQL: &str = "SELECT s1, s2, s3, s4 FROM root.sg.d1";

const TYPED_COLUMNS: [(&str, &str); 5] = [
    ("Time", "TIMESTAMP"),
    ("root.sg.d1.s1", "INT64"),
    ("root.sg.d1.s2", "DOUBLE"),
    ("root.sg.d1.s3", "BOOLEAN"),
    ("root.sg.d1.s4", "TEXT"),
];

fn typed_rows() -> Vec<RawRow> {
    vec![
        row(&[
            json!(1509465600000_i64),
            json!(9007199254740993_i64),
            json!(25.5),
            json!(true),
            json!("ok"),
        ]),
        row(&[json!(1509465660000_i64), json!(42), json!(null), json!(false), json!(null)]),
        row(&[json!(1509465720000_i64), json!(-7), json!(0.25), json!(null), json!("x")]),
    ]
}

fn typed_harness(dir: &TempDir) -> Harness {
    let harness = Harness::new(SqlDialect::Tree, dir.path());
    harness.backend.respond(TYPED_SQL, &TYPED_COLUMNS, typed_rows());
    harness
}

/// What the dispatcher makes of the typed rows, as export text.
fn typed_export_strings() -> Vec<Vec<String>> {
    let columns: Vec<ColumnMetadata> = TYPED_COLUMNS
        .iter()
        .map(|(name, ty)| ColumnMetadata::new(*name, *ty))
        .collect();
    let categories = column_categories(&columns);
    let ts = TimestampConverter::default();
    typed_rows()
        .iter()
        .map(|raw| {
            decode_row(raw, &categories, &ts)
                .iter()
                .map(CellValue::to_export_string)
                .collect()
        })
        .collect()
}

fn read_xlsx(path: &std::path::Path) -> (usize, Vec<Vec<Data>>) {
    let mut workbook: Xlsx<_> = open_workbook(path).unwrap();
    let sheets = workbook.sheet_names().len();
    let range = workbook.worksheet_range_at(0).unwrap().unwrap();
    (sheets, range.rows().map(<[Data]>::to_vec).collect())
}

fn input(sql: &str, format: &str, filename: Option<&str>) -> ExportInput {
    ExportInput {
        query_sql: sql.to_string(),
        format: format.to_string(),
        filename: filename.map(str::to_string),
    }
}

fn harness(dir: &TempDir) -> Harness {
    let harness = Harness::new(SqlDialect::Table, dir.path());
    harness.backend.respond(
        SQL,
        &[("c1", "INT32"), ("c2", "STRING")],
        vec![
            row(&[json!(1), json!("a")]),
            row(&[json!(2), json!("b,c")]),
            row(&[json!(3), json!(null)]),
        ],
    );
    harness
}

#[tokio::test]
async fn test_csv_export_writes_every_row() {
    let dir = TempDir::new().unwrap();
    let harness = harness(&dir);

    let artifact = harness
        .export
        .export(input(SQL, "csv", Some("readings")))
        .await
        .unwrap();

    assert_eq!(artifact.path, dir.path().join("readings.csv"));
    assert!(artifact.path.is_absolute());
    assert_eq!(artifact.format, ExportFormat::Csv);
    assert_eq!(artifact.row_count, 3);
    assert_eq!(artifact.columns, vec!["c1", "c2"]);
    assert_eq!(artifact.preview.len(), 3);
    assert_eq!(artifact.preview[1]["c2"], json!("b,c"));

    let content = std::fs::read_to_string(&artifact.path).unwrap();
    assert_eq!(content, "c1,c2\n1,a\n2,\"b,c\"\n3,\n");
    assert_eq!(artifact.size_bytes, content.len() as u64);

    let mut reader = csv::Reader::from_path(&artifact.path).unwrap();
    let records: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(records.len(), 3);
    assert_eq!(&records[1][1], "b,c");
    assert_eq!(&records[2][1], "");
    assert_eq!(harness.checked_out(), 0);
}

#[tokio::test]
async fn test_preview_is_capped() {
    let dir = TempDir::new().unwrap();
    let harness = Harness::new(SqlDialect::Tree, dir.path());
    let rows = (0..25).map(|i| row(&[json!(i)])).collect();
    harness
        .backend
        .respond("SELECT s1 FROM root.ln.wf01", &[("s1", "INT64")], rows);

    let artifact = harness
        .export
        .export(input("SELECT s1 FROM root.ln.wf01", "csv", None))
        .await
        .unwrap();

    assert_eq!(artifact.row_count, 25);
    assert_eq!(artifact.preview.len(), 10);
}

#[tokio::test]
async fn test_generated_names_do_not_collide() {
    let dir = TempDir::new().unwrap();
    let harness = harness(&dir);

    let first = harness.export.export(input(SQL, "csv", None)).await.unwrap();
    let second = harness.export.export(input(SQL, "csv", None)).await.unwrap();

    assert_ne!(first.path, second.path);
    assert!(first.path.exists());
    assert!(second.path.exists());

    let name = first.path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("select_"), "{name}");
    assert!(name.ends_with(".csv"), "{name}");
}

#[tokio::test]
async fn test_csv_round_trip_matches_decoded_rows() {
    let dir = TempDir::new().unwrap();
    let harness = typed_harness(&dir);

    let artifact = harness
        .export
        .export(input(TYPED_SQL, "csv", Some("typed")))
        .await
        .unwrap();
    assert_eq!(artifact.row_count, 3);

    let mut reader = csv::Reader::from_path(&artifact.path).unwrap();
    let headers: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
    let expected_headers: Vec<&str> = TYPED_COLUMNS.iter().map(|(name, _)| *name).collect();
    assert_eq!(headers, expected_headers);

    let records: Vec<Vec<String>> = reader
        .records()
        .map(|record| record.unwrap().iter().map(str::to_string).collect())
        .collect();
    assert_eq!(records, typed_export_strings());
    assert_eq!(records[0][0], "2017-10-31T16:00:00.000+00:00");
    assert_eq!(records[0][1], "9007199254740993");
    assert_eq!(records[1][4], "");
}

#[tokio::test]
async fn test_excel_export() {
    let dir = TempDir::new().unwrap();
    let harness = harness(&dir);

    let artifact = harness
        .export
        .export(input(SQL, "Excel", Some("readings.xlsx")))
        .await
        .unwrap();

    assert_eq!(artifact.path, dir.path().join("readings.xlsx"));
    assert_eq!(artifact.format, ExportFormat::Excel);
    assert_eq!(artifact.row_count, 3);
    assert!(artifact.size_bytes > 0);

    let (sheets, rows) = read_xlsx(&artifact.path);
    assert_eq!(sheets, 1);
    assert_eq!(
        rows,
        vec![
            vec![Data::String("c1".into()), Data::String("c2".into())],
            vec![Data::Float(1.0), Data::String("a".into())],
            vec![Data::Float(2.0), Data::String("b,c".into())],
            vec![Data::Float(3.0), Data::Empty],
        ]
    );
}

#[tokio::test]
async fn test_excel_export_normalizes_cells() {
    let dir = TempDir::new().unwrap();
    let harness = typed_harness(&dir);

    let artifact = harness
        .export
        .export(input(TYPED_SQL, "excel", Some("typed")))
        .await
        .unwrap();

    let (sheets, rows) = read_xlsx(&artifact.path);
    assert_eq!(sheets, 1);
    assert_eq!(rows.len(), 4);
    let header: Vec<Data> = TYPED_COLUMNS
        .iter()
        .map(|(name, _)| Data::String((*name).to_string()))
        .collect();
    assert_eq!(rows[0], header);
    assert_eq!(
        rows[1],
        vec![
            Data::String("2017-10-31T16:00:00.000+00:00".into()),
            // beyond 2^53, kept exact as text
            Data::String("9007199254740993".into()),
            Data::Float(25.5),
            Data::Bool(true),
            Data::String("ok".into()),
        ]
    );
    assert_eq!(
        rows[2],
        vec![
            Data::String("2017-10-31T16:01:00.000+00:00".into()),
            Data::Float(42.0),
            Data::Empty,
            Data::Bool(false),
            Data::Empty,
        ]
    );
    assert_eq!(rows[3][1], Data::Float(-7.0));
    assert_eq!(rows[3][3], Data::Empty);

    // text cells carry the same strings as the csv export
    let expected = typed_export_strings();
    for (row, expected_row) in rows[1..].iter().zip(&expected) {
        assert_eq!(row[0], Data::String(expected_row[0].clone()));
        let text = match &row[4] {
            Data::String(s) => s.clone(),
            Data::Empty => String::new(),
            other => panic!("unexpected text cell {other:?}"),
        };
        assert_eq!(text, expected_row[4]);
    }
}

#[tokio::test]
async fn test_unsupported_format_checked_before_query() {
    let dir = TempDir::new().unwrap();
    let harness = harness(&dir);

    let err = harness
        .export
        .export(input(SQL, "parquet", None))
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::UnsupportedFormat { .. }), "{err:?}");
    assert!(harness.backend.executed().is_empty());
    assert_eq!(harness.backend.opened(), 0);
}

#[tokio::test]
async fn test_filename_with_directories_rejected() {
    let dir = TempDir::new().unwrap();
    let harness = harness(&dir);

    for name in ["../escape", "sub/dir", "..\\escape"] {
        let err = harness
            .export
            .export(input(SQL, "csv", Some(name)))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }), "{name}: {err:?}");
    }
    assert!(harness.backend.executed().is_empty());
}

#[tokio::test]
async fn test_write_statement_rejected() {
    let dir = TempDir::new().unwrap();
    let harness = harness(&dir);

    let err = harness
        .export
        .export(input("DELETE FROM t1", "csv", None))
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::InvalidStatementType { .. }));
    assert_eq!(harness.backend.opened(), 0);
}

#[tokio::test]
async fn test_table_dialect_exports_describe() {
    let dir = TempDir::new().unwrap();
    let harness = Harness::new(SqlDialect::Table, dir.path());
    harness.backend.respond(
        "DESC t1",
        &[("ColumnName", "STRING"), ("DataType", "STRING"), ("Category", "STRING")],
        vec![row(&[json!("time"), json!("TIMESTAMP"), json!("TIME")])],
    );

    let artifact = harness
        .export
        .export(input("DESC t1", "csv", Some("schema")))
        .await
        .unwrap();
    assert_eq!(artifact.row_count, 1);
}

#[tokio::test]
async fn test_missing_export_directory_fails_cleanly() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent");
    let harness = Harness::new(SqlDialect::Table, &missing);
    harness
        .backend
        .respond(SQL, &[("c1", "INT32"), ("c2", "STRING")], Vec::new());

    let err = harness
        .export
        .export(input(SQL, "csv", Some("out")))
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::ExportIo { .. }), "{err:?}");
    assert!(!missing.join("out.csv").exists());
    assert_eq!(harness.checked_out(), 0);
}
