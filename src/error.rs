//! Error types for the IoTDB MCP Server.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Each error variant carries a stable kind tag and, where useful, an actionable
//! suggestion so AI assistants can understand and recover from error conditions.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Session pool exhausted: no session became available within {waited_ms}ms")]
    PoolExhausted { waited_ms: u64, max_size: usize },

    #[error("Session pool is closed")]
    PoolClosed,

    #[error("Invalid statement type: {message}")]
    InvalidStatementType { message: String },

    #[error("Not found: {object} - {message}")]
    NotFound { object: String, message: String },

    #[error("Query execution failed: {message}")]
    QueryExecution {
        message: String,
        /// IoTDB status code when the backend reported one (e.g. 550 for a missing table)
        code: Option<i64>,
    },

    #[error("Unsupported export format '{format}'. Use 'csv' or 'excel'.")]
    UnsupportedFormat { format: String },

    #[error("Export failed for {path}: {message}")]
    ExportIo { path: String, message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a pool exhausted error.
    pub fn pool_exhausted(waited_ms: u64, max_size: usize) -> Self {
        Self::PoolExhausted {
            waited_ms,
            max_size,
        }
    }

    /// Create an invalid statement type error.
    pub fn invalid_statement(message: impl Into<String>) -> Self {
        Self::InvalidStatementType {
            message: message.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(object: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotFound {
            object: object.into(),
            message: message.into(),
        }
    }

    /// Create a query execution error with an optional backend status code.
    pub fn query_execution(message: impl Into<String>, code: Option<i64>) -> Self {
        Self::QueryExecution {
            message: message.into(),
            code,
        }
    }

    /// Create an unsupported format error.
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    /// Create an export I/O error.
    pub fn export_io(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExportIo {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable machine-readable tag for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config { .. } => "ConfigError",
            Self::Connection { .. } => "ConnectionFailure",
            Self::PoolExhausted { .. } => "PoolExhausted",
            Self::PoolClosed => "PoolClosed",
            Self::InvalidStatementType { .. } => "InvalidStatementType",
            Self::NotFound { .. } => "NotFound",
            Self::QueryExecution { .. } => "QueryExecutionError",
            Self::UnsupportedFormat { .. } => "UnsupportedFormat",
            Self::ExportIo { .. } => "ExportIOError",
            Self::InvalidInput { .. } => "InvalidInput",
            Self::Internal { .. } => "Internal",
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::PoolExhausted { .. } => {
                Some("All sessions are busy. Retry shortly or increase --pool-size")
            }
            Self::PoolClosed => Some("The server is shutting down"),
            Self::UnsupportedFormat { .. } => Some("Supported formats are 'csv' and 'excel'"),
            Self::ExportIo { .. } => {
                Some("Check that the export directory exists, is writable and has free space")
            }
            _ => None,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::PoolExhausted { .. })
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Build the structured `data` payload attached to MCP errors.
fn error_data(err: &DbError) -> Option<serde_json::Value> {
    let mut data = serde_json::json!({ "kind": err.kind() });
    if let Some(suggestion) = err.suggestion() {
        data["suggestion"] = serde_json::Value::String(suggestion.to_string());
    }
    if let DbError::QueryExecution {
        code: Some(code), ..
    } = err
    {
        data["code"] = serde_json::Value::from(*code);
    }
    Some(data)
}

/// Convert DbError to MCP ErrorData for semantic error categorization.
/// The `data` object always carries the error kind, plus the suggestion when available.
impl From<DbError> for rmcp::ErrorData {
    fn from(err: DbError) -> Self {
        let data = error_data(&err);
        match &err {
            // Caller mistakes -> invalid_params
            DbError::InvalidStatementType { .. }
            | DbError::InvalidInput { .. }
            | DbError::UnsupportedFormat { .. }
            | DbError::QueryExecution { .. } => {
                rmcp::ErrorData::invalid_params(err.to_string(), data)
            }

            DbError::NotFound { .. } => rmcp::ErrorData::resource_not_found(err.to_string(), data),

            // Pool and backend faults -> internal_error
            DbError::Config { .. }
            | DbError::Connection { .. }
            | DbError::PoolExhausted { .. }
            | DbError::PoolClosed
            | DbError::ExportIo { .. }
            | DbError::Internal { .. } => rmcp::ErrorData::internal_error(err.to_string(), data),
        }
    }
}
