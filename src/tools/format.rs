//! Output formatting utilities for MCP tools.
//!
//! This module provides the inline rendering options shared by the query tools.
//! Rows are positional so repeated column names (e.g. `SELECT s1, s1`) survive.

use crate::error::{DbError, DbResult};
use crate::models::{CellValue, QueryResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use unicode_width::UnicodeWidthStr;

/// Output format for query results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON records (default)
    #[default]
    Json,
    /// ASCII table format (like a database CLI)
    Table,
    /// Markdown table format
    Markdown,
    /// CSV text with a header row
    Csv,
}

pub fn format_value(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Array(arr) => serde_json::to_string(arr).unwrap_or_default(),
        JsonValue::Object(obj) => serde_json::to_string(obj).unwrap_or_default(),
    }
}

/// Render a result in a text format. `Json` is not a text format and yields `None`.
pub fn render(result: &QueryResult, format: OutputFormat) -> DbResult<Option<String>> {
    let columns = result.column_names();
    match format {
        OutputFormat::Json => Ok(None),
        OutputFormat::Table => Ok(Some(format_as_table(
            &columns,
            &result.json_rows(),
            result.execution_time_ms,
        ))),
        OutputFormat::Markdown => Ok(Some(format_as_markdown(&columns, &result.json_rows()))),
        OutputFormat::Csv => format_as_csv(&columns, &result.rows).map(Some),
    }
}

pub fn format_as_table(
    columns: &[String],
    rows: &[Vec<JsonValue>],
    execution_time_ms: u64,
) -> String {
    if columns.is_empty() {
        return "Empty set".to_string();
    }

    let mut widths: Vec<usize> = columns.iter().map(|c| c.width()).collect();
    for row in rows {
        for (width, value) in widths.iter_mut().zip(row) {
            *width = (*width).max(format_value(value).width());
        }
    }

    let mut output = String::new();
    let separator: String = widths
        .iter()
        .map(|w| format!("+{}", "-".repeat(w + 2)))
        .collect::<String>()
        + "+\n";

    output.push_str(&separator);
    let header: String = columns
        .iter()
        .zip(&widths)
        .map(|(name, w)| pad(name, *w, Align::Center))
        .collect::<String>()
        + "|\n";
    output.push_str(&header);
    output.push_str(&separator);

    for row in rows {
        let row_str: String = widths
            .iter()
            .enumerate()
            .map(|(i, w)| {
                let value = row.get(i).unwrap_or(&JsonValue::Null);
                let align = if value.is_number() {
                    Align::Right
                } else {
                    Align::Left
                };
                pad(&format_value(value), *w, align)
            })
            .collect::<String>()
            + "|\n";
        output.push_str(&row_str);
    }

    output.push_str(&separator);

    let row_text = if rows.len() == 1 { "row" } else { "rows" };
    output.push_str(&format!(
        "{} {} in set ({:.2} sec)\n",
        rows.len(),
        row_text,
        execution_time_ms as f64 / 1000.0
    ));

    output
}

enum Align {
    Left,
    Right,
    Center,
}

// std's width specifiers count chars, not display columns, so CJK text would misalign.
fn pad(text: &str, width: usize, align: Align) -> String {
    let fill = width.saturating_sub(text.width());
    let (left, right) = match align {
        Align::Left => (0, fill),
        Align::Right => (fill, 0),
        Align::Center => (fill / 2, fill - fill / 2),
    };
    format!("| {}{}{} ", " ".repeat(left), text, " ".repeat(right))
}

pub fn format_as_markdown(columns: &[String], rows: &[Vec<JsonValue>]) -> String {
    if columns.is_empty() {
        return "*Empty set*".to_string();
    }

    let mut output = String::new();

    let header: String = columns
        .iter()
        .map(|c| format!("| {} ", escape_markdown(c)))
        .collect::<String>()
        + "|\n";
    output.push_str(&header);

    let sep: String = columns.iter().map(|_| "|---").collect::<String>() + "|\n";
    output.push_str(&sep);

    for row in rows {
        let row_str: String = (0..columns.len())
            .map(|i| {
                let value = row.get(i).unwrap_or(&JsonValue::Null);
                format!("| {} ", escape_markdown(&format_value(value)))
            })
            .collect::<String>()
            + "|\n";
        output.push_str(&row_str);
    }

    output.push_str(&format!("\n*{} rows*", rows.len()));

    output
}

fn escape_markdown(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

/// CSV text with RFC 4180 quoting; nulls are empty fields.
pub fn format_as_csv(columns: &[String], rows: &[Vec<CellValue>]) -> DbResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let to_err = |e: csv::Error| DbError::internal(format!("Failed to render CSV: {e}"));

    writer.write_record(columns).map_err(to_err)?;
    for row in rows {
        writer
            .write_record(row.iter().map(CellValue::to_export_string))
            .map_err(to_err)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| DbError::internal(format!("Failed to render CSV: {e}")))?;
    String::from_utf8(bytes).map_err(|e| DbError::internal(format!("Failed to render CSV: {e}")))
}
