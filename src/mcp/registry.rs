//! Dialect-specific tool sets.
//!
//! The tree and table dialects expose different tools. The set is chosen once at
//! startup from the configured dialect and never changes for the process lifetime.

use crate::config::{Config, SqlDialect};
use std::fmt;

/// The tools a server instance exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolSet {
    Tree,
    Table,
}

impl ToolSet {
    pub fn from_dialect(dialect: SqlDialect) -> Self {
        match dialect {
            SqlDialect::Tree => Self::Tree,
            SqlDialect::Table => Self::Table,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::from_dialect(config.sql_dialect)
    }

    pub fn dialect(&self) -> SqlDialect {
        match self {
            Self::Tree => SqlDialect::Tree,
            Self::Table => SqlDialect::Table,
        }
    }

    /// Names of the tools registered for this set.
    pub fn tool_names(&self) -> &'static [&'static str] {
        match self {
            Self::Tree => &["metadata_query", "select_query", "export_query"],
            Self::Table => &["read_query", "list_tables", "describe_table", "export_table_query"],
        }
    }

    /// Server instructions advertised to clients.
    pub fn instructions(&self) -> String {
        match self {
            Self::Tree => "Apache IoTDB tools for the tree model (paths such as root.ln.wf01.wt01).\n\
                \n\
                ## Tools\n\
                - `metadata_query`: SHOW or COUNT statements, e.g. SHOW TIMESERIES root.ln.**, COUNT DEVICES\n\
                - `select_query`: SELECT statements, e.g. SELECT * FROM root.ln.** WHERE time > 2017-11-01T00:08:00\n\
                - `export_query`: run a SELECT or SHOW and write the result to a CSV or Excel file\n\
                \n\
                ## Notes\n\
                - Only read statements are accepted; one statement per call.\n\
                - Times use ISO 8601. Results are returned as records, or pass `format` for table, markdown or csv text.\n\
                - Exports return the absolute file path and a preview of the first rows."
                .to_string(),
            Self::Table => "Apache IoTDB tools for the table model.\n\
                \n\
                ## Workflow\n\
                1. Call `list_tables` to see the tables in the configured database\n\
                2. Call `describe_table` to see columns and their categories (TIME, TAG, ATTRIBUTE, FIELD)\n\
                3. Use `read_query` for SELECT statements\n\
                4. Use `export_table_query` to write a SELECT, SHOW or DESC result to a CSV or Excel file\n\
                \n\
                ## Notes\n\
                - Only read statements are accepted; one statement per call.\n\
                - Times use ISO 8601. Results are returned as records, or pass `format` for table, markdown or csv text.\n\
                - Exports return the absolute file path and a preview of the first rows."
                .to_string(),
        }
    }
}

impl fmt::Display for ToolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dialect())
    }
}
