//! Query execution engine.
//!
//! The dispatcher runs validated statements on a pooled session:
//! - acquires a session (the only place a request waits for capacity)
//! - pulls the result in batches of `fetch_size` rows, in backend order. The REST
//!   backend buffers the whole response before handing out batches, so with it the
//!   batch size does not bound peak memory
//! - maps backend types to [`CellValue`]s, including timestamp rendering
//! - releases the session healthy on success and unhealthy on any backend error
//!
//! # Cancellation
//!
//! The statement runs in a spawned task that owns the session. A caller that goes
//! away (client disconnect, dropped future) does not interrupt the backend call, and
//! the session is still released once the call finishes.

use crate::config::Config;
use crate::db::pool::{PooledSession, SessionPool};
use crate::db::types::{TimestampConverter, column_categories, decode_row};
use crate::error::{DbError, DbResult};
use crate::models::{CellValue, ColumnMetadata, QueryResult, ValidatedQuery};
use std::time::Instant;
use tracing::{debug, warn};

/// Executes validated statements on sessions from the pool.
#[derive(Debug, Clone)]
pub struct QueryDispatcher {
    pool: SessionPool,
    fetch_size: usize,
    timestamps: TimestampConverter,
}

impl QueryDispatcher {
    pub fn new(pool: SessionPool, fetch_size: usize, timestamps: TimestampConverter) -> Self {
        Self {
            pool,
            fetch_size: fetch_size.max(1),
            timestamps,
        }
    }

    pub fn from_config(pool: SessionPool, config: &Config) -> DbResult<Self> {
        let timestamps =
            TimestampConverter::new(config.time_zone_offset()?, config.timestamp_precision);
        Ok(Self::new(pool, config.fetch_size, timestamps))
    }

    pub fn pool(&self) -> &SessionPool {
        &self.pool
    }

    /// Run a statement to completion and return every row the backend produced.
    pub async fn execute(&self, query: &ValidatedQuery) -> DbResult<QueryResult> {
        let start = Instant::now();
        let session = self.pool.acquire().await?;
        let session_id = session.id();

        debug!(
            sql = %query.sql(),
            intent = %query.intent(),
            session_id = ?session_id,
            fetch_size = self.fetch_size,
            "Executing query"
        );

        let pool = self.pool.clone();
        let sql = query.sql().to_string();
        let fetch_size = self.fetch_size;
        let timestamps = self.timestamps;
        let task = tokio::spawn(async move {
            let mut session = session;
            let outcome = fetch_all(&mut session, &sql, fetch_size, &timestamps).await;
            pool.release(session, outcome.is_ok()).await;
            outcome
        });

        let (columns, rows) = match task.await {
            Ok(outcome) => outcome?,
            Err(e) => return Err(DbError::internal(format!("Query task failed: {e}"))),
        };

        let execution_time_ms = start.elapsed().as_millis() as u64;
        debug!(
            session_id = ?session_id,
            row_count = rows.len(),
            elapsed_ms = execution_time_ms,
            "Query finished"
        );

        Ok(QueryResult::new(columns, rows).with_execution_time(execution_time_ms))
    }
}

async fn fetch_all(
    session: &mut PooledSession,
    sql: &str,
    fetch_size: usize,
    timestamps: &TimestampConverter,
) -> DbResult<(Vec<ColumnMetadata>, Vec<Vec<CellValue>>)> {
    let mut data_set = session
        .execute_query(sql, fetch_size)
        .await
        .map_err(into_query_error)?;

    let columns = data_set.columns().to_vec();
    let categories = column_categories(&columns);
    let mut rows = Vec::new();
    let mut batch_no = 0usize;

    while let Some(batch) = data_set.next_batch().await.map_err(into_query_error)? {
        batch_no += 1;
        debug!(batch = batch_no, rows = batch.len(), "Fetched batch");
        rows.extend(batch.iter().map(|raw| decode_row(raw, &categories, timestamps)));
    }

    Ok((columns, rows))
}

/// Any failure while a statement runs surfaces as a query execution error.
fn into_query_error(err: DbError) -> DbError {
    match err {
        DbError::QueryExecution { .. } => err,
        other => {
            warn!(error = %other, "Backend failure during query");
            DbError::query_execution(other.to_string(), None)
        }
    }
}
