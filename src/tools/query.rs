//! Query execution tools.
//!
//! This module implements `metadata_query` and `select_query` (tree dialect) and
//! `read_query` (table dialect). Statements outside the intent's allowed keywords
//! are rejected before a session is acquired.

use crate::config::SqlDialect;
use crate::db::QueryDispatcher;
use crate::error::DbResult;
use crate::models::{ColumnMetadata, QueryIntent, QueryResult, Record};
use crate::tools::format::{self, OutputFormat};
use crate::tools::sql_validator;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Input for the query tools.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct QueryInput {
    /// The SQL statement to execute. Times use ISO 8601, e.g. 2017-11-01T00:08:00.000
    #[serde(alias = "query")]
    pub query_sql: String,
    /// Output format: "json" returns records, "table" an ASCII table, "markdown" a markdown table, "csv" CSV text
    #[serde(default)]
    pub format: OutputFormat,
}

/// Output from the query tools.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct QueryOutput {
    /// Column names and IoTDB types, in result order. Empty unless format is json.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<ColumnMetadata>,
    /// Result rows as column name -> value records. Empty unless format is json.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<Record>,
    /// Pre-formatted output when format is table, markdown or csv
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
    /// Number of rows returned
    pub row_count: usize,
    /// Query execution time in milliseconds
    pub execution_time_ms: u64,
}

impl QueryOutput {
    /// Create output from a query result in the requested format.
    pub fn from_result(result: QueryResult, format: OutputFormat) -> DbResult<Self> {
        let row_count = result.row_count();
        let execution_time_ms = result.execution_time_ms;

        match format::render(&result, format)? {
            Some(formatted) => Ok(Self {
                columns: Vec::new(),
                rows: Vec::new(),
                formatted: Some(formatted),
                row_count,
                execution_time_ms,
            }),
            None => Ok(Self {
                rows: result.records(row_count),
                columns: result.columns,
                formatted: None,
                row_count,
                execution_time_ms,
            }),
        }
    }
}

/// Handler for the query tools.
#[derive(Debug, Clone)]
pub struct QueryToolHandler {
    dispatcher: QueryDispatcher,
    dialect: SqlDialect,
}

impl QueryToolHandler {
    pub fn new(dispatcher: QueryDispatcher, dialect: SqlDialect) -> Self {
        Self {
            dispatcher,
            dialect,
        }
    }

    /// SHOW / COUNT statements in the tree dialect.
    pub async fn metadata_query(&self, input: QueryInput) -> DbResult<QueryOutput> {
        self.run(input, QueryIntent::Metadata).await
    }

    /// SELECT statements in the tree dialect.
    pub async fn select_query(&self, input: QueryInput) -> DbResult<QueryOutput> {
        self.run(input, QueryIntent::Read).await
    }

    /// SELECT statements in the table dialect.
    pub async fn read_query(&self, input: QueryInput) -> DbResult<QueryOutput> {
        self.run(input, QueryIntent::Read).await
    }

    async fn run(&self, input: QueryInput, intent: QueryIntent) -> DbResult<QueryOutput> {
        let query = sql_validator::validate(&input.query_sql, intent, self.dialect)?;
        let result = self.dispatcher.execute(&query).await?;

        info!(
            intent = %intent,
            sql = %query.sql(),
            row_count = result.row_count(),
            execution_time_ms = result.execution_time_ms,
            "Query executed"
        );

        QueryOutput::from_result(result, input.format)
    }
}
