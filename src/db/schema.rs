//! Schema introspection module.
//!
//! Table-dialect schema operations. They are parameterized: callers pass a table
//! name, never SQL, and the statement is built here from a fixed template.

use crate::config::SqlDialect;
use crate::db::executor::QueryDispatcher;
use crate::error::{DbError, DbResult};
use crate::models::{
    CellValue, ColumnCategory, QueryIntent, QueryResult, TableColumn, ValidatedQuery,
};
use tracing::debug;

/// IoTDB status code for "table does not exist".
const TABLE_NOT_EXIST_CODE: i64 = 550;

mod queries {
    pub const SHOW_TABLES: &str = "SHOW TABLES";

    pub fn describe_details(table: &str) -> String {
        format!("DESC {} DETAILS", table)
    }
}

/// Schema inspector for the table dialect.
#[derive(Debug, Clone)]
pub struct SchemaInspector {
    dispatcher: QueryDispatcher,
}

impl SchemaInspector {
    pub fn new(dispatcher: QueryDispatcher) -> Self {
        Self { dispatcher }
    }

    /// List table names in the configured database, in backend order.
    pub async fn list_tables(&self) -> DbResult<Vec<String>> {
        let query = schema_query(queries::SHOW_TABLES);
        let result = self.dispatcher.execute(&query).await?;

        let tables: Vec<String> = result
            .rows
            .iter()
            .filter_map(|row| row.first())
            .filter(|cell| !cell.is_null())
            .map(CellValue::to_export_string)
            .collect();

        debug!(table_count = tables.len(), "Listed tables");
        Ok(tables)
    }

    /// Describe the columns of a table.
    ///
    /// Fails with `NotFound` when IoTDB reports the table missing or returns no columns.
    pub async fn describe_table(&self, table_name: &str) -> DbResult<Vec<TableColumn>> {
        let quoted = quote_table_name(table_name)?;
        let query = schema_query(&queries::describe_details(&quoted));

        let result = match self.dispatcher.execute(&query).await {
            Ok(result) => result,
            Err(DbError::QueryExecution { message, code })
                if code == Some(TABLE_NOT_EXIST_CODE)
                    || is_missing_table_message(&message, table_name) =>
            {
                return Err(DbError::not_found(
                    table_name,
                    format!("Table '{}' does not exist", table_name),
                ));
            }
            Err(e) => return Err(e),
        };

        let columns = parse_columns(&result);
        if columns.is_empty() {
            return Err(DbError::not_found(
                table_name,
                format!("Table '{}' has no columns or does not exist", table_name),
            ));
        }

        debug!(table = %table_name, column_count = columns.len(), "Described table");
        Ok(columns)
    }
}

fn schema_query(sql: &str) -> ValidatedQuery {
    ValidatedQuery::new(sql, QueryIntent::Schema, SqlDialect::Table)
}

/// A "does not exist" message about this table, not about its database or a column.
fn is_missing_table_message(message: &str, table_name: &str) -> bool {
    let message = message.to_lowercase();
    let table = table_name
        .rsplit('.')
        .next()
        .unwrap_or(table_name)
        .trim_matches('"')
        .to_lowercase();
    !table.is_empty()
        && message.contains("does not exist")
        && message.contains("table")
        && message.contains(&table)
}

/// Validate a possibly database-qualified table name and quote the parts that need it.
///
/// Plain identifiers pass through; anything else is wrapped in double quotes with
/// embedded quotes doubled, so the name can never break out of the statement.
pub fn quote_table_name(name: &str) -> DbResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DbError::invalid_input("Table name must not be empty"));
    }

    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() > 2 {
        return Err(DbError::invalid_input(format!(
            "Invalid table name '{}'. Use 'table' or 'database.table'",
            name
        )));
    }

    parts
        .iter()
        .map(|part| {
            if part.is_empty() {
                Err(DbError::invalid_input(format!(
                    "Invalid table name '{}': empty name part",
                    name
                )))
            } else if is_plain_identifier(part) {
                Ok(part.to_string())
            } else {
                Ok(format!("\"{}\"", part.replace('"', "\"\"")))
            }
        })
        .collect::<DbResult<Vec<String>>>()
        .map(|parts| parts.join("."))
}

fn is_plain_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Map `DESC ... DETAILS` rows to columns. Fields are found by header name and fall
/// back to position (ColumnName, DataType, Category).
fn parse_columns(result: &QueryResult) -> Vec<TableColumn> {
    let find = |wanted: &str, fallback: usize| {
        result
            .columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(wanted))
            .or_else(|| (fallback < result.columns.len()).then_some(fallback))
    };
    let Some(name_idx) = find("ColumnName", 0) else {
        return Vec::new();
    };
    let type_idx = find("DataType", 1);
    let category_idx = find("Category", 2);

    result
        .rows
        .iter()
        .filter_map(|row| {
            let name = row.get(name_idx).filter(|c| !c.is_null())?;
            let data_type = type_idx
                .and_then(|i| row.get(i))
                .map(CellValue::to_export_string)
                .unwrap_or_default();
            let mut column = TableColumn::new(name.to_export_string(), data_type);
            if let Some(category) = category_idx
                .and_then(|i| row.get(i))
                .filter(|c| !c.is_null())
                .map(CellValue::to_export_string)
            {
                let category = ColumnCategory::parse(&category)
                    .map(|c| c.as_str().to_string())
                    .unwrap_or(category);
                column = column.with_category(category);
            }
            Some(column)
        })
        .collect()
}
