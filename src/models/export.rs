//! Export-related data models.

use crate::error::{DbError, DbResult};
use crate::models::query::Record;
use schemars::JsonSchema;
use serde::Serialize;
use std::path::PathBuf;

/// Maximum number of rows echoed back in an export preview.
pub const PREVIEW_ROWS: usize = 10;

/// File format of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Excel,
}

impl ExportFormat {
    /// Parse a user-supplied format name, case-insensitively.
    pub fn parse(s: &str) -> DbResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "excel" => Ok(Self::Excel),
            _ => Err(DbError::unsupported_format(s)),
        }
    }

    /// Canonical file extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Excel => "xlsx",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Csv => write!(f, "csv"),
            Self::Excel => write!(f, "excel"),
        }
    }
}

/// Description of a file written by an export.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ExportArtifact {
    /// Absolute path of the written file
    #[schemars(with = "String")]
    pub path: PathBuf,
    pub format: ExportFormat,
    pub row_count: usize,
    pub columns: Vec<String>,
    /// First rows of the export, same shape as query records
    pub preview: Vec<Record>,
    pub size_bytes: u64,
    /// Human-readable file size (e.g. "1.5 kB")
    pub size_formatted: String,
    pub execution_time_ms: u64,
}
