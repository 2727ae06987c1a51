//! IoTDB REST backend.
//!
//! Sessions talk to IoTDB's REST service with HTTP basic auth:
//! - `GET  /ping` liveness check when a session is opened
//! - `POST /rest/v2/query` for the tree dialect (column-major result)
//! - `POST /rest/table/v1/query` for the table dialect (row-major result)
//!
//! The REST service returns a whole result in one response, so the data set
//! buffers it and hands it out in `fetch_size` batches.

use crate::config::{Config, SqlDialect};
use crate::db::backend::{BackendSession, Connector, DataSet, RawRow};
use crate::error::{DbError, DbResult};
use crate::models::ColumnMetadata;
use futures_util::future::BoxFuture;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// IoTDB's success status code.
const SUCCESS_STATUS: i64 = 200;

const PING_PATH: &str = "ping";
const TREE_QUERY_PATH: &str = "rest/v2/query";
const TABLE_QUERY_PATH: &str = "rest/table/v1/query";

const CONNECT_SUGGESTION: &str =
    "Check that IoTDB is running, the REST service is enabled and --host/--port point at it";

struct Endpoint {
    client: Client,
    ping_url: Url,
    query_url: Url,
    user: String,
    password: String,
    dialect: SqlDialect,
    database: String,
    row_limit: usize,
}

/// Opens REST sessions against one IoTDB instance.
#[derive(Clone)]
pub struct RestConnector {
    endpoint: Arc<Endpoint>,
}

impl std::fmt::Debug for RestConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestConnector")
            .field("query_url", &self.endpoint.query_url.as_str())
            .field("dialect", &self.endpoint.dialect)
            .finish_non_exhaustive()
    }
}

impl RestConnector {
    pub fn from_config(config: &Config) -> DbResult<Self> {
        let base = config.rest_base_url()?;
        let join = |path: &str| {
            base.join(path)
                .map_err(|e| DbError::config(format!("Invalid IoTDB REST URL: {e}")))
        };
        let query_path = match config.sql_dialect {
            SqlDialect::Tree => TREE_QUERY_PATH,
            SqlDialect::Table => TABLE_QUERY_PATH,
        };

        let client = Client::builder()
            .timeout(config.query_timeout_duration())
            .connect_timeout(config.connect_timeout_duration())
            .build()
            .map_err(|e| DbError::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint: Arc::new(Endpoint {
                client,
                ping_url: join(PING_PATH)?,
                query_url: join(query_path)?,
                user: config.user.clone(),
                password: config.password.clone(),
                dialect: config.sql_dialect,
                database: config.database.clone(),
                row_limit: config.row_limit,
            }),
        })
    }

    async fn ping(&self) -> DbResult<()> {
        let ep = &self.endpoint;
        let response = ep
            .client
            .get(ep.ping_url.clone())
            .basic_auth(&ep.user, Some(&ep.password))
            .send()
            .await
            .map_err(|e| DbError::connection(e.to_string(), CONNECT_SUGGESTION))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(DbError::connection(
                "IoTDB rejected the credentials",
                "Check --user and --password",
            ));
        }
        if !status.is_success() {
            return Err(DbError::connection(
                format!("IoTDB ping returned HTTP {}", status),
                CONNECT_SUGGESTION,
            ));
        }
        Ok(())
    }
}

impl Connector for RestConnector {
    fn connect(&self) -> BoxFuture<'_, DbResult<Box<dyn BackendSession>>> {
        Box::pin(async move {
            self.ping().await?;
            Ok(Box::new(RestSession {
                endpoint: Arc::clone(&self.endpoint),
            }) as Box<dyn BackendSession>)
        })
    }

    fn name(&self) -> &'static str {
        "iotdb-rest"
    }
}

struct RestSession {
    endpoint: Arc<Endpoint>,
}

#[derive(Serialize)]
struct QueryBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<&'a str>,
    sql: &'a str,
    row_limit: usize,
}

impl RestSession {
    async fn run(&self, sql: &str) -> DbResult<(Vec<ColumnMetadata>, Vec<RawRow>)> {
        let ep = &self.endpoint;
        let body = QueryBody {
            database: match ep.dialect {
                SqlDialect::Table => Some(ep.database.as_str()),
                SqlDialect::Tree => None,
            },
            sql,
            row_limit: ep.row_limit,
        };

        let response = ep
            .client
            .post(ep.query_url.clone())
            .basic_auth(&ep.user, Some(&ep.password))
            .json(&body)
            .send()
            .await
            .map_err(|e| DbError::connection(e.to_string(), CONNECT_SUGGESTION))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| DbError::connection(e.to_string(), CONNECT_SUGGESTION))?;

        let value: JsonValue = serde_json::from_slice(&bytes).map_err(|_| {
            DbError::query_execution(
                format!(
                    "IoTDB returned HTTP {} with a non-JSON body: {}",
                    status,
                    String::from_utf8_lossy(&bytes)
                ),
                None,
            )
        })?;

        check_status(&value)?;
        match ep.dialect {
            SqlDialect::Tree => parse_tree_response(value),
            SqlDialect::Table => parse_table_response(value),
        }
    }
}

impl BackendSession for RestSession {
    fn execute_query<'a>(
        &'a mut self,
        sql: &'a str,
        fetch_size: usize,
    ) -> BoxFuture<'a, DbResult<Box<dyn DataSet>>> {
        Box::pin(async move {
            let (columns, rows) = self.run(sql).await?;
            debug!(columns = columns.len(), rows = rows.len(), "REST query returned");
            Ok(Box::new(BufferedDataSet::new(columns, rows, fetch_size)) as Box<dyn DataSet>)
        })
    }

    fn close(self: Box<Self>) -> BoxFuture<'static, ()> {
        // REST sessions hold no server-side state
        Box::pin(async {})
    }
}

/// A fully received result handed out in batches.
pub struct BufferedDataSet {
    columns: Vec<ColumnMetadata>,
    rows: VecDeque<RawRow>,
    fetch_size: usize,
}

impl BufferedDataSet {
    pub fn new(columns: Vec<ColumnMetadata>, rows: Vec<RawRow>, fetch_size: usize) -> Self {
        Self {
            columns,
            rows: rows.into(),
            fetch_size: fetch_size.max(1),
        }
    }
}

impl DataSet for BufferedDataSet {
    fn columns(&self) -> &[ColumnMetadata] {
        &self.columns
    }

    fn next_batch(&mut self) -> BoxFuture<'_, DbResult<Option<Vec<RawRow>>>> {
        Box::pin(async move {
            if self.rows.is_empty() {
                return Ok(None);
            }
            let n = self.fetch_size.min(self.rows.len());
            Ok(Some(self.rows.drain(..n).collect()))
        })
    }
}

#[derive(Deserialize)]
struct StatusBody {
    code: i64,
    #[serde(default)]
    message: Option<String>,
}

/// Error responses are `{"code": <non-200>, "message": "..."}`.
fn check_status(value: &JsonValue) -> DbResult<()> {
    if value.get("code").is_none() {
        return Ok(());
    }
    let status: StatusBody = serde_json::from_value(value.clone())
        .map_err(|e| DbError::query_execution(format!("Malformed IoTDB status: {e}"), None))?;
    if status.code == SUCCESS_STATUS {
        return Ok(());
    }
    let message = status
        .message
        .unwrap_or_else(|| "IoTDB reported an error".to_string());
    Err(DbError::query_execution(
        format!("{}: {}", status.code, message),
        Some(status.code),
    ))
}

#[derive(Deserialize)]
struct TreeQueryResponse {
    #[serde(default)]
    expressions: Option<Vec<String>>,
    #[serde(default)]
    column_names: Option<Vec<String>>,
    #[serde(default)]
    data_types: Option<Vec<String>>,
    #[serde(default)]
    timestamps: Option<Vec<JsonValue>>,
    #[serde(default)]
    values: Vec<Vec<JsonValue>>,
}

/// Tree results are column-major: `values[column][row]`, with an optional
/// `timestamps` array that becomes a leading `Time` column.
fn parse_tree_response(value: JsonValue) -> DbResult<(Vec<ColumnMetadata>, Vec<RawRow>)> {
    let body: TreeQueryResponse = serde_json::from_value(value)
        .map_err(|e| DbError::query_execution(format!("Malformed IoTDB response: {e}"), None))?;

    let names = body
        .expressions
        .filter(|e| !e.is_empty())
        .or(body.column_names)
        .unwrap_or_default();
    let types = body.data_types.unwrap_or_default();

    let mut columns = Vec::with_capacity(names.len() + 1);
    if body.timestamps.is_some() {
        columns.push(ColumnMetadata::new("Time", "TIMESTAMP"));
    }
    columns.extend(names.iter().enumerate().map(|(i, name)| {
        ColumnMetadata::new(name.clone(), types.get(i).cloned().unwrap_or_default())
    }));

    let row_count = match &body.timestamps {
        Some(ts) => ts.len(),
        None => body.values.iter().map(Vec::len).max().unwrap_or(0),
    };

    let rows = (0..row_count)
        .map(|r| {
            let mut row = Vec::with_capacity(columns.len());
            if let Some(ts) = &body.timestamps {
                row.push(ts[r].clone());
            }
            row.extend((0..names.len()).map(|c| {
                body.values
                    .get(c)
                    .and_then(|col| col.get(r))
                    .cloned()
                    .unwrap_or(JsonValue::Null)
            }));
            row
        })
        .collect();

    Ok((columns, rows))
}

#[derive(Deserialize)]
struct TableQueryResponse {
    #[serde(default)]
    column_names: Vec<String>,
    #[serde(default)]
    data_types: Vec<String>,
    #[serde(default)]
    values: Vec<Vec<JsonValue>>,
}

/// Table results are row-major: `values[row][column]`.
fn parse_table_response(value: JsonValue) -> DbResult<(Vec<ColumnMetadata>, Vec<RawRow>)> {
    let body: TableQueryResponse = serde_json::from_value(value)
        .map_err(|e| DbError::query_execution(format!("Malformed IoTDB response: {e}"), None))?;

    let columns = body
        .column_names
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            ColumnMetadata::new(name, body.data_types.get(i).cloned().unwrap_or_default())
        })
        .collect();
    Ok((columns, body.values))
}
