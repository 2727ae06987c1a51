//! Schema introspection tools for the table dialect.
//!
//! This module implements `list_tables` and `describe_table`. Neither tool
//! accepts raw SQL; both issue fixed statements through [`SchemaInspector`].

use crate::db::SchemaInspector;
use crate::error::DbResult;
use crate::models::TableColumn;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Output from the list_tables tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListTablesOutput {
    /// Table names in the configured database
    pub tables: Vec<String>,
    /// Number of tables returned
    pub count: usize,
}

/// Input for the describe_table tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DescribeTableInput {
    /// Name of the table to describe, optionally qualified as database.table
    pub table_name: String,
}

/// Output from the describe_table tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct DescribeTableOutput {
    pub table_name: String,
    /// Columns in declaration order
    pub columns: Vec<TableColumn>,
    pub count: usize,
}

/// Handler for schema tools.
#[derive(Debug, Clone)]
pub struct SchemaToolHandler {
    inspector: SchemaInspector,
}

impl SchemaToolHandler {
    pub fn new(inspector: SchemaInspector) -> Self {
        Self { inspector }
    }

    pub async fn list_tables(&self) -> DbResult<ListTablesOutput> {
        let tables = self.inspector.list_tables().await?;
        info!(count = tables.len(), "Listed tables");

        Ok(ListTablesOutput {
            count: tables.len(),
            tables,
        })
    }

    pub async fn describe_table(&self, input: DescribeTableInput) -> DbResult<DescribeTableOutput> {
        let columns = self.inspector.describe_table(&input.table_name).await?;
        info!(table = %input.table_name, columns = columns.len(), "Described table");

        Ok(DescribeTableOutput {
            table_name: input.table_name,
            count: columns.len(),
            columns,
        })
    }
}
