//! Query-related data models.
//!
//! This module defines the closed value set produced by the type mapping, the
//! intents a statement can be validated for, and query results.

use chrono::{DateTime, FixedOffset, SecondsFormat};
use schemars::JsonSchema;
use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;

pub use crate::config::SqlDialect;

/// What a caller intends to do with a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryIntent {
    /// SHOW / COUNT style introspection
    Metadata,
    /// Plain SELECT
    Read,
    /// Schema operations; these are parameterized and never take raw SQL
    Schema,
    /// Statements whose results are written to a file
    Export,
}

impl QueryIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::Read => "read",
            Self::Schema => "schema",
            Self::Export => "export",
        }
    }
}

impl std::fmt::Display for QueryIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A statement that passed validation for a given intent.
///
/// Only the validator and the schema inspector can build one, so the dispatcher
/// never sees unchecked SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuery {
    sql: String,
    intent: QueryIntent,
    dialect: SqlDialect,
}

impl ValidatedQuery {
    pub(crate) fn new(sql: impl Into<String>, intent: QueryIntent, dialect: SqlDialect) -> Self {
        Self {
            sql: sql.into(),
            intent,
            dialect,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn intent(&self) -> QueryIntent {
        self.intent
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }
}

/// A single cell of a query result.
///
/// Timestamps are kept as offset-aware datetimes and rendered as RFC 3339 with
/// millisecond precision wherever they leave the process.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Timestamp(DateTime<FixedOffset>),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Render a timestamp the way every output surface shows it.
    pub fn format_timestamp(ts: &DateTime<FixedOffset>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Millis, false)
    }

    /// JSON form used in records and previews.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Boolean(b) => JsonValue::Bool(*b),
            Self::Integer(i) => JsonValue::from(*i),
            // NaN and infinities have no JSON form
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or_else(|| JsonValue::String(f.to_string())),
            Self::String(s) => JsonValue::String(s.clone()),
            Self::Timestamp(ts) => JsonValue::String(Self::format_timestamp(ts)),
        }
    }

    /// Text form used by file exports. Nulls become empty cells.
    pub fn to_export_string(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Boolean(b) => b.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::String(s) => s.clone(),
            Self::Timestamp(ts) => Self::format_timestamp(ts),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct ColumnMetadata {
    pub name: String,
    /// IoTDB type name as reported by the backend (e.g. "INT64", "TEXT", "TIMESTAMP")
    pub data_type: String,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// A fully materialized query result, in backend order.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<Vec<CellValue>>,
    pub execution_time_ms: u64,
}

/// A row rendered as column name -> JSON value, preserving column order.
pub type Record = serde_json::Map<String, JsonValue>;

impl QueryResult {
    pub fn new(columns: Vec<ColumnMetadata>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            columns,
            rows,
            execution_time_ms: 0,
        }
    }

    pub fn with_execution_time(mut self, execution_time_ms: u64) -> Self {
        self.execution_time_ms = execution_time_ms;
        self
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Render one row as a record. A repeated column name keeps its first value.
    pub fn record(&self, row: &[CellValue]) -> Record {
        let mut record = Record::with_capacity(self.columns.len());
        for (col, value) in self.columns.iter().zip(row) {
            if !record.contains_key(&col.name) {
                record.insert(col.name.clone(), value.to_json());
            }
        }
        record
    }

    /// Render the first `limit` rows as records.
    pub fn records(&self, limit: usize) -> Vec<Record> {
        self.rows
            .iter()
            .take(limit)
            .map(|row| self.record(row))
            .collect()
    }

    /// Positional JSON rows, used by the text formatters.
    pub fn json_rows(&self) -> Vec<Vec<JsonValue>> {
        self.rows
            .iter()
            .map(|row| row.iter().map(CellValue::to_json).collect())
            .collect()
    }
}
