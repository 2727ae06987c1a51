//! Export tools.
//!
//! This module implements `export_query` (tree dialect) and `export_table_query`
//! (table dialect). Results are written to the configured export directory as
//! CSV or as a single-sheet xlsx workbook, and a short preview is returned.

use crate::config::SqlDialect;
use crate::db::QueryDispatcher;
use crate::error::{DbError, DbResult};
use crate::models::{
    CellValue, ExportArtifact, ExportFormat, PREVIEW_ROWS, QueryIntent, QueryResult,
};
use crate::tools::sql_validator;
use chrono::Utc;
use rust_xlsxwriter::Workbook;
use schemars::JsonSchema;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

/// Largest magnitude an f64 holds exactly; wider integers go to the sheet as text.
const MAX_EXACT_INTEGER: u64 = 1 << 53;

/// Format a byte count as a human-readable size.
///
/// # Examples
///
/// ```
/// use iotdb_mcp_server::tools::export::format_size;
///
/// assert_eq!(format_size(512), "512 B");
/// assert_eq!(format_size(1024), "1 kB");
/// ```
pub fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::WINDOWS)
}

fn default_format() -> String {
    "csv".to_string()
}

/// Input for the export tools.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExportInput {
    /// The SQL statement whose result is exported
    pub query_sql: String,
    /// File format: "csv" (default) or "excel"
    #[serde(default = "default_format")]
    pub format: String,
    /// File name without directory. A generated name is used when omitted.
    #[serde(default)]
    pub filename: Option<String>,
}

/// Runs a query and writes its full result to a file.
#[derive(Debug, Clone)]
pub struct ExportPipeline {
    dispatcher: QueryDispatcher,
    export_dir: PathBuf,
    dialect: SqlDialect,
}

impl ExportPipeline {
    pub fn new(dispatcher: QueryDispatcher, export_dir: impl Into<PathBuf>, dialect: SqlDialect) -> Self {
        Self {
            dispatcher,
            export_dir: export_dir.into(),
            dialect,
        }
    }

    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    pub async fn export(&self, input: ExportInput) -> DbResult<ExportArtifact> {
        let format = ExportFormat::parse(&input.format)?;
        let query = sql_validator::validate(&input.query_sql, QueryIntent::Export, self.dialect)?;
        let stem = match input.filename.as_deref() {
            Some(name) => sanitize_filename(name)?,
            None => generate_stem(&sql_validator::leading_keyword(query.sql())?),
        };

        let result = self.dispatcher.execute(&query).await?;

        let relative = self.export_dir.join(format!("{stem}.{}", format.extension()));
        let path = std::path::absolute(&relative)
            .map_err(|e| DbError::export_io(relative.display().to_string(), e.to_string()))?;

        let target = path.clone();
        let (result, written) = tokio::task::spawn_blocking(move || {
            let written = write_file(&target, format, &result);
            (result, written)
        })
        .await
        .map_err(|e| DbError::internal(format!("Export task failed: {e}")))?;

        if let Err(message) = written {
            match std::fs::remove_file(&path) {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                    warn!(path = %path.display(), error = %e, "Failed to remove partial export");
                }
                _ => {}
            }
            return Err(DbError::export_io(path.display().to_string(), message));
        }

        let size_bytes = std::fs::metadata(&path)
            .map(|m| m.len())
            .map_err(|e| DbError::export_io(path.display().to_string(), e.to_string()))?;

        info!(
            path = %path.display(),
            format = %format,
            row_count = result.row_count(),
            size_bytes,
            "Export written"
        );

        Ok(ExportArtifact {
            preview: result.records(PREVIEW_ROWS),
            columns: result.column_names(),
            row_count: result.row_count(),
            execution_time_ms: result.execution_time_ms,
            size_formatted: format_size(size_bytes),
            size_bytes,
            format,
            path,
        })
    }
}

/// Validate a caller-supplied name and strip a known extension.
fn sanitize_filename(name: &str) -> DbResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DbError::invalid_input("Export filename must not be empty"));
    }
    if name.contains(['/', '\\']) || name.contains("..") {
        return Err(DbError::invalid_input(format!(
            "Export filename '{name}' must not contain path separators or '..'"
        )));
    }

    let stem = [".csv", ".xlsx"]
        .iter()
        .find(|ext| {
            name.len() >= ext.len()
                && name.as_bytes()[name.len() - ext.len()..].eq_ignore_ascii_case(ext.as_bytes())
        })
        .map_or(name, |ext| &name[..name.len() - ext.len()]);

    if stem.is_empty() {
        return Err(DbError::invalid_input(format!(
            "Export filename '{name}' has no name before the extension"
        )));
    }
    Ok(stem.to_string())
}

fn generate_stem(keyword: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}_{}",
        keyword.to_lowercase(),
        Utc::now().format("%Y%m%dT%H%M%S"),
        &suffix[..8]
    )
}

fn write_file(path: &Path, format: ExportFormat, result: &QueryResult) -> Result<(), String> {
    match format {
        ExportFormat::Csv => write_csv(path, result).map_err(|e| e.to_string()),
        ExportFormat::Excel => write_xlsx(path, result).map_err(|e| e.to_string()),
    }
}

fn write_csv(path: &Path, result: &QueryResult) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(result.column_names())?;
    for row in &result.rows {
        writer.write_record(row.iter().map(CellValue::to_export_string))?;
    }
    writer.flush()?;
    Ok(())
}

fn write_xlsx(path: &Path, result: &QueryResult) -> Result<(), rust_xlsxwriter::XlsxError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    for (col, column) in result.columns.iter().enumerate() {
        sheet.write_string(0, col as u16, &column.name)?;
    }

    for (index, row) in result.rows.iter().enumerate() {
        let r = index as u32 + 1;
        for (col, cell) in row.iter().enumerate() {
            let c = col as u16;
            match cell {
                CellValue::Null => {}
                CellValue::Boolean(b) => {
                    sheet.write_boolean(r, c, *b)?;
                }
                CellValue::Integer(i) if i.unsigned_abs() <= MAX_EXACT_INTEGER => {
                    sheet.write_number(r, c, *i as f64)?;
                }
                CellValue::Float(f) if f.is_finite() => {
                    sheet.write_number(r, c, *f)?;
                }
                other => {
                    sheet.write_string(r, c, other.to_export_string())?;
                }
            }
        }
    }

    workbook.save(path)
}
