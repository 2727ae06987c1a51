//! Backend session abstraction.
//!
//! The pool and dispatcher only see these traits. A [`Connector`] opens
//! authenticated sessions; a [`BackendSession`] runs one statement at a time and
//! hands back a [`DataSet`] cursor that yields rows in batches.
//!
//! Rows come back as raw JSON cells plus the backend type name of every column;
//! mapping them to [`CellValue`](crate::models::CellValue) is done by
//! [`types`](super::types) so all backends share one normalization.

use crate::error::DbResult;
use crate::models::ColumnMetadata;
use futures_util::future::BoxFuture;
use serde_json::Value as JsonValue;

/// A raw row as produced by a backend.
pub type RawRow = Vec<JsonValue>;

/// Opens authenticated sessions against the database.
pub trait Connector: Send + Sync {
    /// Open a new session. Called by the pool, which owns retry and backoff.
    fn connect(&self) -> BoxFuture<'_, DbResult<Box<dyn BackendSession>>>;

    /// Short backend name used in logs.
    fn name(&self) -> &'static str;
}

/// One authenticated session. Never shared between requests.
pub trait BackendSession: Send {
    /// Execute a statement and return a cursor over its result.
    fn execute_query<'a>(
        &'a mut self,
        sql: &'a str,
        fetch_size: usize,
    ) -> BoxFuture<'a, DbResult<Box<dyn DataSet>>>;

    /// Close the session. Errors are logged by the implementation, not returned.
    fn close(self: Box<Self>) -> BoxFuture<'static, ()>;
}

/// Cursor over a statement result.
pub trait DataSet: Send {
    fn columns(&self) -> &[ColumnMetadata];

    /// Next batch of at most `fetch_size` rows, or `None` when exhausted.
    fn next_batch(&mut self) -> BoxFuture<'_, DbResult<Option<Vec<RawRow>>>>;
}
