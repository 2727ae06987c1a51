//! MCP tool implementations.
//!
//! This module contains the IoTDB tool handlers:
//! - `query`: metadata_query / select_query (tree) and read_query (table)
//! - `schema`: list_tables and describe_table (table)
//! - `export`: export_query (tree) and export_table_query (table)
//! - `format`: inline rendering of query results
//! - `sql_validator`: statement validation for read-only enforcement

pub mod export;
pub mod format;
pub mod query;
pub mod schema;
pub mod sql_validator;

pub use export::{ExportInput, ExportPipeline};
pub use format::OutputFormat;
pub use query::{QueryInput, QueryOutput, QueryToolHandler};
pub use schema::{DescribeTableInput, DescribeTableOutput, ListTablesOutput, SchemaToolHandler};
