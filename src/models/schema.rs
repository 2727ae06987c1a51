//! Schema-related data models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One column of a table as reported by `DESC <table> DETAILS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TableColumn {
    pub column_name: String,
    pub data_type: String,
    /// TIME, TAG, ATTRIBUTE or FIELD
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl TableColumn {
    pub fn new(column_name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
            data_type: data_type.into(),
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Column category in the table model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnCategory {
    Time,
    Tag,
    Attribute,
    Field,
}

impl ColumnCategory {
    /// Parse a category string case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "TIME" => Some(Self::Time),
            "TAG" | "ID" => Some(Self::Tag),
            "ATTRIBUTE" => Some(Self::Attribute),
            "FIELD" | "MEASUREMENT" => Some(Self::Field),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Time => "TIME",
            Self::Tag => "TAG",
            Self::Attribute => "ATTRIBUTE",
            Self::Field => "FIELD",
        }
    }
}
