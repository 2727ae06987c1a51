//! Data models for the IoTDB MCP Server.
//!
//! This module re-exports all model types used throughout the application.

pub mod export;
pub mod query;
pub mod schema;

// Re-export commonly used types
pub use export::{ExportArtifact, ExportFormat, PREVIEW_ROWS};
pub use query::{
    CellValue, ColumnMetadata, QueryIntent, QueryResult, Record, SqlDialect, ValidatedQuery,
};
pub use schema::{ColumnCategory, TableColumn};
