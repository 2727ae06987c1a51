//! IoTDB type mappings.
//!
//! This module maps IoTDB column types onto the closed [`CellValue`] set.
//!
//! # Architecture
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies the backend type name of each column once
//! 2. `decode_cell` converts every raw cell of that column according to its category
//!
//! Columns with a type the server did not report (or one we do not know) fall back
//! to inferring the category from the JSON shape of each cell.

use crate::config::TimestampPrecision;
use crate::db::backend::RawRow;
use crate::models::{CellValue, ColumnMetadata};
use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde_json::Value as JsonValue;

/// Logical category for IoTDB column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Boolean,
    Text,
    Timestamp,
    Unknown,
}

/// Classify an IoTDB type name into a logical category.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    match type_name.trim().to_uppercase().as_str() {
        "INT32" | "INT64" => TypeCategory::Integer,
        "FLOAT" | "DOUBLE" => TypeCategory::Float,
        "BOOLEAN" => TypeCategory::Boolean,
        // DATE comes back as its textual form; BLOB as a hex literal
        "TEXT" | "STRING" | "BLOB" | "DATE" => TypeCategory::Text,
        "TIMESTAMP" => TypeCategory::Timestamp,
        _ => TypeCategory::Unknown,
    }
}

/// Converts raw epoch values into offset-aware datetimes.
#[derive(Debug, Clone, Copy)]
pub struct TimestampConverter {
    offset: FixedOffset,
    precision: TimestampPrecision,
}

impl TimestampConverter {
    pub fn new(offset: FixedOffset, precision: TimestampPrecision) -> Self {
        Self { offset, precision }
    }

    /// Millisecond epochs rendered in UTC.
    pub fn utc_millis() -> Self {
        Self {
            offset: Utc.fix(),
            precision: TimestampPrecision::Ms,
        }
    }

    pub fn from_epoch(&self, raw: i64) -> Option<DateTime<FixedOffset>> {
        let utc = match self.precision {
            TimestampPrecision::Ms => DateTime::<Utc>::from_timestamp_millis(raw)?,
            TimestampPrecision::Us => DateTime::<Utc>::from_timestamp_micros(raw)?,
            TimestampPrecision::Ns => DateTime::<Utc>::from_timestamp_nanos(raw),
        };
        Some(utc.with_timezone(&self.offset))
    }

    fn decode(&self, raw: &JsonValue) -> CellValue {
        match raw {
            JsonValue::Number(n) => match n.as_i64().and_then(|v| self.from_epoch(v)) {
                Some(ts) => CellValue::Timestamp(ts),
                None => CellValue::String(n.to_string()),
            },
            JsonValue::String(s) => match DateTime::parse_from_rfc3339(s) {
                Ok(ts) => CellValue::Timestamp(ts.with_timezone(&self.offset)),
                Err(_) => match s.parse::<i64>().ok().and_then(|v| self.from_epoch(v)) {
                    Some(ts) => CellValue::Timestamp(ts),
                    None => CellValue::String(s.clone()),
                },
            },
            other => infer_cell(other),
        }
    }
}

impl Default for TimestampConverter {
    fn default() -> Self {
        Self::utc_millis()
    }
}

/// Convert one raw cell according to its column category.
pub fn decode_cell(raw: &JsonValue, category: TypeCategory, ts: &TimestampConverter) -> CellValue {
    if raw.is_null() {
        return CellValue::Null;
    }
    match category {
        TypeCategory::Integer => match raw {
            JsonValue::Number(n) => n
                .as_i64()
                .map(CellValue::Integer)
                .or_else(|| n.as_f64().map(CellValue::Float))
                .unwrap_or_else(|| CellValue::String(n.to_string())),
            JsonValue::String(s) => s
                .parse::<i64>()
                .map(CellValue::Integer)
                .unwrap_or_else(|_| CellValue::String(s.clone())),
            other => infer_cell(other),
        },
        TypeCategory::Float => match raw {
            JsonValue::Number(n) => n
                .as_f64()
                .map(CellValue::Float)
                .unwrap_or_else(|| CellValue::String(n.to_string())),
            // NaN / Infinity arrive as strings
            JsonValue::String(s) => s
                .parse::<f64>()
                .map(CellValue::Float)
                .unwrap_or_else(|_| CellValue::String(s.clone())),
            other => infer_cell(other),
        },
        TypeCategory::Boolean => match raw {
            JsonValue::Bool(b) => CellValue::Boolean(*b),
            JsonValue::String(s) if s.eq_ignore_ascii_case("true") => CellValue::Boolean(true),
            JsonValue::String(s) if s.eq_ignore_ascii_case("false") => CellValue::Boolean(false),
            other => infer_cell(other),
        },
        TypeCategory::Text => match raw {
            JsonValue::String(s) => CellValue::String(s.clone()),
            other => CellValue::String(json_text(other)),
        },
        TypeCategory::Timestamp => ts.decode(raw),
        TypeCategory::Unknown => infer_cell(raw),
    }
}

/// Convert a raw row using per-column categories.
pub fn decode_row(raw: &RawRow, categories: &[TypeCategory], ts: &TimestampConverter) -> Vec<CellValue> {
    categories
        .iter()
        .enumerate()
        .map(|(idx, category)| {
            raw.get(idx)
                .map(|cell| decode_cell(cell, *category, ts))
                .unwrap_or(CellValue::Null)
        })
        .collect()
}

/// Categories for a column list, in order.
pub fn column_categories(columns: &[ColumnMetadata]) -> Vec<TypeCategory> {
    columns.iter().map(|c| categorize_type(&c.data_type)).collect()
}

fn infer_cell(raw: &JsonValue) -> CellValue {
    match raw {
        JsonValue::Null => CellValue::Null,
        JsonValue::Bool(b) => CellValue::Boolean(*b),
        JsonValue::Number(n) => n
            .as_i64()
            .map(CellValue::Integer)
            .or_else(|| n.as_f64().map(CellValue::Float))
            .unwrap_or_else(|| CellValue::String(n.to_string())),
        JsonValue::String(s) => CellValue::String(s.clone()),
        other => CellValue::String(json_text(other)),
    }
}

fn json_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}
