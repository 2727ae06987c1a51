//! In-memory IoTDB stand-in for integration tests.
//!
//! Statements are matched exactly (after trimming) against scripted results or
//! failures. The backend counts opened sessions, executed statements and the
//! peak number of statements running at once.

#![allow(dead_code)]

use futures_util::future::BoxFuture;
use iotdb_mcp_server::config::SqlDialect;
use iotdb_mcp_server::db::{
    BackendSession, BufferedDataSet, Connector, DataSet, PoolOptions, QueryDispatcher, RawRow,
    SchemaInspector, SessionPool, TimestampConverter,
};
use iotdb_mcp_server::error::{DbError, DbResult};
use iotdb_mcp_server::models::ColumnMetadata;
use iotdb_mcp_server::tools::{ExportPipeline, QueryToolHandler, SchemaToolHandler};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

enum Scripted {
    Rows(Vec<ColumnMetadata>, Vec<RawRow>),
    Fail(String, Option<i64>),
}

#[derive(Default)]
pub struct MemoryBackend {
    script: Mutex<HashMap<String, Arc<Scripted>>>,
    executed: Mutex<Vec<String>>,
    delay: Mutex<Option<Duration>>,
    connect_failures: AtomicUsize,
    opened: AtomicUsize,
    closed: AtomicUsize,
    active: AtomicUsize,
    peak_active: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Script a result. Columns are `(name, iotdb type)` pairs.
    pub fn respond(&self, sql: &str, columns: &[(&str, &str)], rows: Vec<RawRow>) {
        let columns = columns
            .iter()
            .map(|(name, ty)| ColumnMetadata::new(*name, *ty))
            .collect();
        self.script
            .lock()
            .unwrap()
            .insert(sql.to_string(), Arc::new(Scripted::Rows(columns, rows)));
    }

    /// Script a backend error.
    pub fn fail(&self, sql: &str, message: &str, code: Option<i64>) {
        self.script
            .lock()
            .unwrap()
            .insert(sql.to_string(), Arc::new(Scripted::Fail(message.to_string(), code)));
    }

    /// Every statement takes this long to run.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// The next `n` connection attempts fail.
    pub fn fail_next_connects(&self, n: usize) {
        self.connect_failures.store(n, Ordering::SeqCst);
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn peak_active(&self) -> usize {
        self.peak_active.load(Ordering::SeqCst)
    }
}

pub struct MemoryConnector(pub Arc<MemoryBackend>);

impl Connector for MemoryConnector {
    fn connect(&self) -> BoxFuture<'_, DbResult<Box<dyn BackendSession>>> {
        Box::pin(async move {
            let backend = &self.0;
            let pending = backend.connect_failures.load(Ordering::SeqCst);
            if pending > 0 {
                backend.connect_failures.store(pending - 1, Ordering::SeqCst);
                return Err(DbError::connection("connection refused", "start IoTDB"));
            }
            backend.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MemorySession(Arc::clone(backend))) as Box<dyn BackendSession>)
        })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

struct MemorySession(Arc<MemoryBackend>);

impl BackendSession for MemorySession {
    fn execute_query<'a>(
        &'a mut self,
        sql: &'a str,
        fetch_size: usize,
    ) -> BoxFuture<'a, DbResult<Box<dyn DataSet>>> {
        Box::pin(async move {
            let backend = &self.0;
            backend.executed.lock().unwrap().push(sql.to_string());

            let now = backend.active.fetch_add(1, Ordering::SeqCst) + 1;
            backend.peak_active.fetch_max(now, Ordering::SeqCst);
            let delay = *backend.delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            backend.active.fetch_sub(1, Ordering::SeqCst);

            let scripted = backend.script.lock().unwrap().get(sql.trim()).cloned();
            match scripted.as_deref() {
                Some(Scripted::Rows(columns, rows)) => Ok(Box::new(BufferedDataSet::new(
                    columns.clone(),
                    rows.clone(),
                    fetch_size,
                )) as Box<dyn DataSet>),
                Some(Scripted::Fail(message, code)) => {
                    Err(DbError::query_execution(message.clone(), *code))
                }
                None => Err(DbError::query_execution(
                    format!("unscripted statement: {sql}"),
                    Some(700),
                )),
            }
        })
    }

    fn close(self: Box<Self>) -> BoxFuture<'static, ()> {
        self.0.closed.fetch_add(1, Ordering::SeqCst);
        Box::pin(async {})
    }
}

pub fn pool(backend: &Arc<MemoryBackend>, max_size: usize, wait: Duration) -> SessionPool {
    let options = PoolOptions::default()
        .with_max_size(max_size)
        .with_wait_timeout(wait)
        .with_max_retry(0);
    SessionPool::new(Arc::new(MemoryConnector(Arc::clone(backend))), options)
}

pub fn dispatcher(pool: SessionPool) -> QueryDispatcher {
    QueryDispatcher::new(pool, 2, TimestampConverter::default())
}

/// Tool handlers sharing one two-session pool over a memory backend.
pub struct Harness {
    pub backend: Arc<MemoryBackend>,
    pub pool: SessionPool,
    pub query: QueryToolHandler,
    pub schema: SchemaToolHandler,
    pub export: ExportPipeline,
}

impl Harness {
    pub fn new(dialect: SqlDialect, export_dir: &Path) -> Self {
        let backend = MemoryBackend::new();
        let pool = pool(&backend, 2, Duration::from_millis(500));
        let dispatcher = dispatcher(pool.clone());
        Self {
            query: QueryToolHandler::new(dispatcher.clone(), dialect),
            schema: SchemaToolHandler::new(SchemaInspector::new(dispatcher.clone())),
            export: ExportPipeline::new(dispatcher, export_dir, dialect),
            backend,
            pool,
        }
    }

    pub fn checked_out(&self) -> usize {
        self.pool.status().checked_out
    }
}

pub fn row(values: &[JsonValue]) -> RawRow {
    values.to_vec()
}
